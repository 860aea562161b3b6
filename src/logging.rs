use std::path::PathBuf;

use tracing::Level;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    filter::EnvFilter, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

// Define log targets as constants
pub const PDF_PARSING: &str = "pdf_parse";
pub const HEADINGS: &str = "headings";
pub const RANKING: &str = "ranking";
pub const BATCH: &str = "batch";

const LOG_FILE_NAME: &str = "persona-rank.log";

/// Keeps the non-blocking writers flushing. Drop it last in `main`.
#[must_use = "dropping the guards stops log output"]
pub struct LoggingGuards {
    _stdout: WorkerGuard,
    _file: Option<WorkerGuard>,
}

/// `rust_log` replaces the per-target defaults entirely when it parses.
fn target_filter(rust_log: Option<&str>, verbose: bool) -> EnvFilter {
    if let Some(filter) = rust_log
        .filter(|raw| !raw.trim().is_empty())
        .and_then(|raw| EnvFilter::try_new(raw).ok())
    {
        return filter;
    }

    let level = if verbose { "debug" } else { "info" };
    let mut filter = EnvFilter::default().add_directive(Level::WARN.into());
    for target in [PDF_PARSING, HEADINGS, RANKING, BATCH] {
        if let Ok(directive) = format!("{target}={level}").parse() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

fn env_filter(verbose: bool) -> EnvFilter {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    target_filter(rust_log.as_deref(), verbose)
}

/// Installs the global subscriber: stdout always, plus a never-rotating file
/// in `log_dir` when given. A valid `RUST_LOG` overrides the per-target
/// defaults for both outputs.
///
/// Calling this twice is harmless; the second call leaves the first
/// subscriber in place.
pub fn init_logging(verbose: bool, log_dir: Option<PathBuf>) -> std::io::Result<LoggingGuards> {
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(stdout_writer)
        .with_filter(env_filter(verbose));

    let (file_layer, file_guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            let appender = RollingFileAppender::new(Rotation::NEVER, dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                .with_writer(writer)
                .with_filter(env_filter(true));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init();

    Ok(LoggingGuards {
        _stdout: stdout_guard,
        _file: file_guard,
    })
}
