//! Time- and event-driven flushing.
//!
//! The periodic timer is a tokio task holding only a weak reference to the
//! buffer, so it never keeps a dropped buffer alive. Page lifecycle signals
//! (tab hidden, page hide, unload) flush immediately.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::manager::Telemetry;

/// Host lifecycle signals the buffer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    VisibilityHidden,
    VisibilityVisible,
    PageHide,
    Unload,
}

impl LifecycleEvent {
    fn triggers_flush(self) -> bool {
        matches!(
            self,
            LifecycleEvent::VisibilityHidden | LifecycleEvent::PageHide | LifecycleEvent::Unload
        )
    }
}

impl Telemetry {
    /// Spawn the background task that flushes every `flush_interval_ms`.
    ///
    /// Returns `false` without spawning when no tokio runtime is available,
    /// when a timer is already running, or after `destroy()`.
    pub fn start_flush_timer(&self) -> bool {
        if self.inner.destroyed.load(Ordering::SeqCst) {
            return false;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Flush timer not started: {}", e);
                return false;
            }
        };

        let mut timer = self.inner.timer.lock().unwrap_or_else(|e| e.into_inner());
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.config.flush_interval();

        *timer = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                debug!("Periodic telemetry flush");
                inner.flush();
            }
        }));

        debug!("Flush timer started ({:?})", period);
        true
    }

    pub fn is_flush_timer_running(&self) -> bool {
        self.inner
            .timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// React to a host lifecycle signal. Hidden, page-hide and unload flush
    /// right away; becoming visible does nothing.
    pub fn handle_lifecycle_event(&self, event: LifecycleEvent) {
        if event.triggers_flush() {
            debug!("Flushing telemetry on {:?}", event);
            self.flush();
        }
    }
}
