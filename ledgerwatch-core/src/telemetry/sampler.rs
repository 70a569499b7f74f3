//! Head sampling for new spans.

use rand::Rng;

/// Probability sampler: a uniform draw in `[0, 1)` is kept when it falls
/// below the configured rate, so 0 never samples and 1 always does.
#[derive(Debug, Clone, Copy)]
pub struct Sampler {
    rate: f64,
}

impl Sampler {
    pub fn new(rate: f64) -> Self {
        Self {
            rate: rate.clamp(0.0, 1.0),
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn should_sample(&self) -> bool {
        if self.rate >= 1.0 {
            return true;
        }
        if self.rate <= 0.0 {
            return false;
        }
        rand::thread_rng().gen::<f64>() < self.rate
    }
}
