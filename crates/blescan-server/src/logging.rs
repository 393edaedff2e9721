//! Logging setup for the server.
//!
//! `BLESCAN_ENV=production` writes JSON to daily files and plain lines to
//! stdout for the journal. Anything else logs readable lines to stdout only.
//!
//! The filter comes from `RUST_LOG`, then `BLESCAN_LOG_LEVEL`, then `info`.

use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::{info_span, warn, Span};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Selects the log mode.
pub const ENV_VAR: &str = "BLESCAN_ENV";

/// Filter directive used when `RUST_LOG` is unset.
pub const LOG_LEVEL_VAR: &str = "BLESCAN_LOG_LEVEL";

/// Overrides the production log directory.
pub const LOG_DIR_VAR: &str = "BLESCAN_LOG_DIR";

const FILE_PREFIX: &str = "blescan";

/// Where and how logs are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// Readable lines on stdout.
    Development,
    /// JSON files plus plain stdout.
    Production,
}

impl LogMode {
    /// Mode named by `BLESCAN_ENV`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::parse(std::env::var(ENV_VAR).ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("production") => Self::Production,
            _ => Self::Development,
        }
    }
}

/// Flushes buffered log lines when dropped. Hold it until `main` returns.
#[must_use = "buffered log lines are lost once the guard is dropped"]
pub struct LogGuard {
    _writers: Vec<WorkerGuard>,
}

/// Install the global subscriber.
///
/// If the log directory cannot be created, production mode keeps logging to
/// stdout and says so.
///
/// # Errors
///
/// Returns an error if the filter directive is invalid or a subscriber is
/// already installed.
pub fn init(mode: LogMode) -> anyhow::Result<LogGuard> {
    let directive = filter_directive(
        std::env::var("RUST_LOG").ok(),
        std::env::var(LOG_LEVEL_VAR).ok(),
    );
    let filter = EnvFilter::try_new(&directive)?;

    match mode {
        LogMode::Development => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_target(false))
                .try_init()?;
            Ok(LogGuard {
                _writers: Vec::new(),
            })
        }
        LogMode::Production => init_production(filter),
    }
}

fn init_production(filter: EnvFilter) -> anyhow::Result<LogGuard> {
    let dir = log_dir(std::env::var_os(LOG_DIR_VAR).map(PathBuf::from));
    let mut writers = Vec::with_capacity(2);

    let (file_layer, dir_error) = match std::fs::create_dir_all(&dir) {
        Ok(()) => {
            let appender = RollingFileAppender::new(Rotation::DAILY, &dir, FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            writers.push(guard);
            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_thread_ids(true)
                .with_writer(writer);
            (Some(layer), None)
        }
        Err(e) => (None, Some(e)),
    };

    let (stdout, guard) = tracing_appender::non_blocking(std::io::stdout());
    writers.push(guard);
    // journald adds its own timestamps
    let stdout_layer = fmt::layer()
        .compact()
        .without_time()
        .with_ansi(false)
        .with_writer(stdout);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()?;

    if let Some(e) = dir_error {
        warn!(dir = %dir.display(), error = %e, "Log directory unavailable, logging to stdout only");
    }
    Ok(LogGuard { _writers: writers })
}

/// Span wrapping the serve loop, so every request line names the backend and address.
#[must_use]
pub fn server_span(backend: &str, addr: SocketAddr) -> Span {
    info_span!("blescan", backend, %addr)
}

fn filter_directive(rust_log: Option<String>, level: Option<String>) -> String {
    [rust_log, level]
        .into_iter()
        .flatten()
        .find(|d| !d.trim().is_empty())
        .unwrap_or_else(|| "info".to_string())
}

fn log_dir(configured: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = configured.filter(|d| !d.as_os_str().is_empty()) {
        return dir;
    }
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/var/log/blescan")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "blescan")
            .map_or_else(|| PathBuf::from("logs"), |dirs| dirs.data_local_dir().join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!(LogMode::parse(Some("production")), LogMode::Production);
        assert_eq!(LogMode::parse(Some(" Production ")), LogMode::Production);
        assert_eq!(LogMode::parse(Some("staging")), LogMode::Development);
        assert_eq!(LogMode::parse(None), LogMode::Development);
    }

    #[test]
    fn test_rust_log_wins_over_level() {
        assert_eq!(
            filter_directive(Some("blescan_core=trace".into()), Some("warn".into())),
            "blescan_core=trace"
        );
        assert_eq!(filter_directive(Some("  ".into()), Some("warn".into())), "warn");
        assert_eq!(filter_directive(None, None), "info");
    }

    #[test]
    fn test_directive_is_a_valid_filter() {
        assert!(EnvFilter::try_new(filter_directive(None, Some("debug".into()))).is_ok());
    }

    #[test]
    fn test_log_dir_override() {
        assert_eq!(
            log_dir(Some(PathBuf::from("/tmp/blescan-logs"))),
            PathBuf::from("/tmp/blescan-logs")
        );
        let default = log_dir(Some(PathBuf::new()));
        assert!(default.ends_with("blescan") || default.ends_with("logs"));
    }
}
