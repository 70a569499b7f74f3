//! Ledgerwatch - inspect client telemetry persisted by the buffer
//!
//! Reads the bounded local store written by `ledgerwatch-core` and renders
//! summaries, filtered log and span tables, or seeds it with a demo session.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use regex::Regex;
use std::path::{Path, PathBuf};
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use ledgerwatch_core::query::{paginate, summarize, LogQuery, Page, SpanQuery, StoreQuery};
use ledgerwatch_core::telemetry::{
    self, FileStore, FlushPayload, PayloadStore, SpanStatus, Telemetry, TelemetryConfig,
};

mod demo;

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "ledgerwatch",
    about = "Inspect client-side telemetry for the ledgerwatch accounting app",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Set log level
    #[clap(long, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Telemetry config file (YAML or JSON)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the telemetry store
    #[clap(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
enum Command {
    /// Summarize the stored flushes
    Inspect {
        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// List stored log entries, newest first
    Logs {
        /// Minimum severity (trace, debug, info, warn, error, fatal)
        #[clap(long)]
        level: Option<telemetry::LogLevel>,

        /// Only entries correlated with this trace
        #[clap(long)]
        trace_id: Option<String>,

        /// Case-insensitive substring of the message
        #[clap(long)]
        contains: Option<String>,

        /// Regular expression the message must match
        #[clap(long = "matches")]
        pattern: Option<String>,

        #[clap(long, default_value_t = 1)]
        page: usize,

        #[clap(long, default_value_t = 20)]
        page_size: usize,

        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// List stored spans, newest first
    Spans {
        /// Substring of the span name
        #[clap(long)]
        name: Option<String>,

        /// ok, error or unset
        #[clap(long)]
        status: Option<SpanStatus>,

        /// Minimum duration in milliseconds
        #[clap(long)]
        min_duration: Option<f64>,

        #[clap(long, default_value_t = 1)]
        page: usize,

        #[clap(long, default_value_t = 20)]
        page_size: usize,

        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// Remove every stored flush
    Clear,

    /// Run a simulated session and persist its telemetry
    Demo {
        /// Number of simulated network requests
        #[clap(long, default_value_t = 12)]
        requests: usize,
    },
}

/// Initialize tracing with CLI flags
fn initialize_tracing(log_level: &LogLevel) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level.to_filter_directive()))
        .with_target(false)
        .with_writer(std::io::stderr) // stdout is reserved for command output
        .init();
}

/// `--data-dir`, else the platform data directory, else `./.ledgerwatch`.
fn resolve_data_dir(data_dir: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = data_dir {
        return dir;
    }

    use directories::ProjectDirs;
    match ProjectDirs::from("", "", "ledgerwatch") {
        Some(proj_dirs) => proj_dirs.data_dir().to_path_buf(),
        None => PathBuf::from(".ledgerwatch"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level);

    let data_dir = resolve_data_dir(cli.data_dir);
    debug!("Using telemetry store in {}", data_dir.display());
    let store = FileStore::new(&data_dir);

    match cli.command {
        Command::Inspect { json } => inspect_command(&store, json),
        Command::Logs {
            level,
            trace_id,
            contains,
            pattern,
            page,
            page_size,
            json,
        } => {
            let pattern = pattern
                .map(|p| Regex::new(&p).with_context(|| format!("Invalid --matches pattern: {p}")))
                .transpose()?;
            let query = LogQuery {
                min_level: level,
                trace_id,
                contains,
                pattern,
                ..Default::default()
            };
            logs_command(&store, &query, page, page_size, json)
        }
        Command::Spans {
            name,
            status,
            min_duration,
            page,
            page_size,
            json,
        } => {
            let query = SpanQuery {
                name_contains: name,
                status,
                min_duration_ms: min_duration,
                trace_id: None,
            };
            spans_command(&store, &query, page, page_size, json)
        }
        Command::Clear => clear_command(&store),
        Command::Demo { requests } => demo_command(store, cli.config.as_deref(), requests).await,
    }
}

fn load_payloads(store: &FileStore) -> Result<Vec<FlushPayload>> {
    store
        .load()
        .with_context(|| format!("Failed to read telemetry store {}", store.path().display()))
}

fn inspect_command(store: &FileStore, json: bool) -> Result<()> {
    let payloads = load_payloads(store)?;
    let summary = summarize(&payloads);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Store: {}", store.path().display());
    println!("Flushes: {}", summary.flushes);
    if let (Some(oldest), Some(newest)) = (summary.oldest, summary.newest) {
        println!("  oldest: {}", oldest.to_rfc3339());
        println!("  newest: {}", newest.to_rfc3339());
    }
    println!(
        "Spans: {} ({} errored)",
        summary.spans, summary.errored_spans
    );
    println!("Metrics: {}", summary.metrics);
    println!("Logs: {}", summary.logs);
    for (level, count) in &summary.logs_by_level {
        println!("  {level}: {count}");
    }
    Ok(())
}

// Table row structure for log display
#[derive(Tabled)]
struct LogTableRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Level")]
    level: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Trace")]
    trace: String,
}

// Table row structure for span display
#[derive(Tabled)]
struct SpanTableRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Duration (ms)")]
    duration: String,
    #[tabled(rename = "Trace")]
    trace: String,
}

fn short_id(id: Option<&str>) -> String {
    match id {
        Some(id) if id.len() > 8 => format!("{}…", &id[..8]),
        Some(id) => id.to_string(),
        None => "-".to_string(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string()
}

fn print_page_footer<T>(page: &Page<T>, noun: &str) {
    println!(
        "Page {} of {} ({} {noun})",
        page.page,
        page.total_pages.max(1),
        page.total
    );
}

fn logs_command(
    store: &FileStore,
    query: &LogQuery,
    page: usize,
    page_size: usize,
    json: bool,
) -> Result<()> {
    let payloads = load_payloads(store)?;
    let results = paginate(StoreQuery::new(&payloads).logs(query), page, page_size);

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.items.is_empty() {
        println!("No log entries found.");
    } else {
        let rows: Vec<LogTableRow> = results
            .items
            .iter()
            .map(|entry| LogTableRow {
                time: entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                level: entry.level.to_string(),
                message: truncate(&entry.message, 60),
                trace: short_id(entry.trace_id.as_deref()),
            })
            .collect();
        println!("{}", render_table(&rows));
    }
    print_page_footer(&results, "entries");
    Ok(())
}

fn spans_command(
    store: &FileStore,
    query: &SpanQuery,
    page: usize,
    page_size: usize,
    json: bool,
) -> Result<()> {
    let payloads = load_payloads(store)?;
    let results = paginate(StoreQuery::new(&payloads).spans(query), page, page_size);

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.items.is_empty() {
        println!("No spans found.");
    } else {
        let rows: Vec<SpanTableRow> = results
            .items
            .iter()
            .map(|span| SpanTableRow {
                name: truncate(&span.name, 40),
                kind: span.kind.to_string(),
                status: span.status.to_string(),
                duration: format!("{:.2}", span.duration_ms()),
                trace: short_id(Some(span.trace_id.as_str())),
            })
            .collect();
        println!("{}", render_table(&rows));
    }
    print_page_footer(&results, "spans");
    Ok(())
}

fn clear_command(store: &FileStore) -> Result<()> {
    store
        .clear()
        .with_context(|| format!("Failed to clear telemetry store {}", store.path().display()))?;
    println!("Cleared telemetry store at {}", store.path().display());
    Ok(())
}

async fn demo_command(store: FileStore, config_path: Option<&Path>, requests: usize) -> Result<()> {
    // An explicitly named config must load; the implicit default may be absent
    let config = match config_path {
        Some(path) => TelemetryConfig::load(path)
            .with_context(|| format!("Failed to load telemetry config {}", path.display()))?,
        None => TelemetryConfig::default(),
    }
    .apply_env_overrides();

    let path = store.path().to_path_buf();
    let telemetry = Telemetry::builder(config)
        .store(store)
        .build()
        .context("Failed to initialize telemetry buffer")?;

    info!("Running demo session against {}", path.display());
    demo::run(&telemetry, requests).await?;

    let stored = telemetry.stored_data();
    println!(
        "Recorded demo session: {} flushes now in {}",
        stored.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_logs_filters() {
        let cli = Cli::try_parse_from([
            "ledgerwatch",
            "logs",
            "--level",
            "warning",
            "--matches",
            "^HTTP",
            "--page",
            "2",
        ])
        .unwrap();

        match cli.command {
            Command::Logs {
                level,
                pattern,
                page,
                page_size,
                json,
                ..
            } => {
                assert_eq!(level, Some(telemetry::LogLevel::Warn));
                assert_eq!(pattern.as_deref(), Some("^HTTP"));
                assert_eq!(page, 2);
                assert_eq!(page_size, 20);
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_spans_status() {
        let cli = Cli::try_parse_from([
            "ledgerwatch",
            "spans",
            "--status",
            "error",
            "--min-duration",
            "250",
        ])
        .unwrap();
        match cli.command {
            Command::Spans {
                status,
                min_duration,
                ..
            } => {
                assert_eq!(status, Some(SpanStatus::Error));
                assert_eq!(min_duration, Some(250.0));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from(["ledgerwatch", "spans", "--status", "pending"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ledgerwatch",
            "inspect",
            "--json",
            "--data-dir",
            "/tmp/lw",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/lw")));
        assert!(matches!(cli.log_level, LogLevel::Debug));
        assert!(matches!(cli.command, Command::Inspect { json: true }));
    }

    #[test]
    fn test_resolve_data_dir_prefers_flag() {
        assert_eq!(
            resolve_data_dir(Some(PathBuf::from("custom"))),
            PathBuf::from("custom")
        );
    }

    #[test]
    fn test_truncate_and_short_id() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long message here", 10), "a long ...");
        assert_eq!(short_id(None), "-");
        assert_eq!(short_id(Some("4bf92f3577b34da6")), "4bf92f35…");
    }
}
