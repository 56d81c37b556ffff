use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter directives read before `RUST_LOG`.
pub const ENV_LOG: &str = "TAGSCOPE_LOG";
const DEFAULT_DIRECTIVES: &str = "info";

/// Directory holding the rolling log files, `~/.tagscope/logs`.
pub fn log_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tagscope")
        .join("logs")
}

/// Build a filter from the first usable directive string, falling back to
/// `info`.
fn filter_from<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> EnvFilter {
    candidates
        .into_iter()
        .flatten()
        .filter(|d| !d.trim().is_empty())
        .find_map(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Route `tracing` output to `~/.tagscope/logs/<component>.<date>` and,
/// when `to_stderr` is set, to the terminal as well.
///
/// Keep the returned guard alive until exit; dropping it flushes the file
/// writer. A second call in the same process leaves the first subscriber
/// in place.
pub fn init_logging(component: &str, to_stderr: bool) -> WorkerGuard {
    let log_dir = log_dir();
    let _ = std::fs::create_dir_all(&log_dir);

    // One file per component and day: index.2026-10-19, cli.2026-10-19.
    let file_appender = tracing_appender::rolling::daily(&log_dir, component);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let tagscope_log = std::env::var(ENV_LOG).ok();
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = filter_from([tagscope_log.as_deref(), rust_log.as_deref()]);

    // Log files stay plain text and keep the emitting module.
    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    let stderr_layer = to_stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
    });

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init();
    if installed.is_err() {
        tracing::debug!("Logging already initialised; {} keeps the existing subscriber", component);
    }

    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn first_valid_directive_wins() {
        let filter = filter_from([Some("debug"), Some("error")]);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));

        let filter = filter_from([None, Some("  "), Some("warn")]);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn missing_directives_fall_back_to_info() {
        let filter = filter_from([None, None]);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn logs_live_under_the_home_directory() {
        assert!(log_dir().ends_with(".tagscope/logs"));
    }
}
