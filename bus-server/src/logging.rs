//! Logging setup for RZLBus hosts
//!
//! Library code only emits `tracing` events. A host binary picks a
//! [`LoggingMode`] once at startup; nothing is printed until it does.

use tracing_subscriber::{fmt, EnvFilter, Registry};

pub const ENV_LOG_LEVEL: &str = "RZLBUS_LOG_LEVEL";
pub const ENV_LOG_MODE: &str = "RZLBUS_LOG_MODE";

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber at all
    Silent,
    /// Compact stderr output, `info` by default
    Development,
    /// Verbose output with source locations, `debug` by default
    Debug,
}

impl LoggingMode {
    fn default_level(self) -> &'static str {
        match self {
            LoggingMode::Silent => "off",
            LoggingMode::Development => "info",
            LoggingMode::Debug => "debug",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid log filter {filter:?}: {reason}")]
    InvalidFilter { filter: String, reason: String },
}

/// Initialize logging with the specified mode
///
/// Call this early, before starting the server.
///
/// ```rust,ignore
/// bus_server::logging::init_logging(LoggingMode::Development)?;
/// ```
///
/// # Environment Variables
///
/// - `RZLBUS_LOG_LEVEL`: filter directives, e.g. `debug` or `bus_server=trace`
/// - `RUST_LOG`: used when `RZLBUS_LOG_LEVEL` is unset
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    init_logging_with_level(mode, None)
}

/// Like [`init_logging`], but an explicit `level` wins over the environment
pub fn init_logging_with_level(mode: LoggingMode, level: Option<&str>) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let directives = match level {
        Some(level) => level.to_string(),
        None => filter_directives(mode.default_level(), |name| std::env::var(name).ok()),
    };

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = parse_filter(&directives)?;

            Registry::default()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                        .compact(),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let filter = parse_filter(&directives)?;

            Registry::default()
                .with(
                    fmt::layer()
                        .pretty()
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Initialize logging from `RZLBUS_LOG_MODE`
///
/// `development` and `debug` select those modes; anything else is silent.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = mode_from_name(std::env::var(ENV_LOG_MODE).ok().as_deref());
    init_logging(mode)
}

fn mode_from_name(name: Option<&str>) -> LoggingMode {
    match name {
        Some("development") => LoggingMode::Development,
        Some("debug") => LoggingMode::Debug,
        _ => LoggingMode::Silent,
    }
}

/// `RZLBUS_LOG_LEVEL`, then `RUST_LOG`, then `default_level`
fn filter_directives(default_level: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    lookup(ENV_LOG_LEVEL)
        .or_else(|| lookup("RUST_LOG"))
        .unwrap_or_else(|| default_level.to_string())
}

fn parse_filter(directives: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directives).map_err(|e| LoggingError::InvalidFilter {
        filter: directives.to_string(),
        reason: e.to_string(),
    })
}
