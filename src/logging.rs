//! Structured logging setup.
//!
//! The crate itself only emits `tracing` events; this module is the
//! optional convenience for embedding applications that want a
//! ready-made subscriber with environment-variable filtering.

use tracing::Level;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Most detailed debugging output.
    Trace,
    /// Detailed debugging output.
    Debug,
    /// Notable events.
    Info,
    /// Potential problems.
    Warn,
    /// Errors only.
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    Pretty,
    /// Single-line output.
    Compact,
    /// JSON output for production collectors.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level used when `RUST_LOG` is unset.
    pub level: LogLevel,
    /// Output format.
    pub format: LogFormat,
    /// Whether to include the emitting module path.
    pub show_target: bool,
    /// Whether to include thread ids.
    pub show_thread_ids: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
            show_target: true,
            show_thread_ids: false,
        }
    }
}

impl LogConfig {
    /// Verbose pretty output for development.
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            format: LogFormat::Pretty,
            show_target: true,
            show_thread_ids: false,
        }
    }

    /// JSON output for production.
    pub fn production() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
            show_target: true,
            show_thread_ids: true,
        }
    }

    /// Quiet compact output for tests.
    pub fn test() -> Self {
        Self {
            level: LogLevel::Warn,
            format: LogFormat::Compact,
            show_target: false,
            show_thread_ids: false,
        }
    }
}

fn build_layer<S>(config: &LogConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    let base = fmt::layer()
        .with_target(config.show_target)
        .with_thread_ids(config.show_thread_ids);
    match config.format {
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Compact => base.compact().boxed(),
        LogFormat::Json => base.json().boxed(),
    }
}

fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("courier_core={}", config.level)))
}

/// Initializes the global subscriber.
///
/// # Panics
///
/// Panics when a global subscriber is already installed; use
/// [`try_init_logging`] where that is expected.
pub fn init_logging(config: &LogConfig) {
    tracing_subscriber::registry()
        .with(build_layer(config).with_filter(env_filter(config)))
        .init();
}

/// Initializes the global subscriber, ignoring an already-installed
/// one. Suitable for tests.
pub fn try_init_logging(config: &LogConfig) {
    let _ = tracing_subscriber::registry()
        .with(build_layer(config).with_filter(env_filter(config)))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_conversion_and_display() {
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
        assert_eq!(LogLevel::Debug.to_string(), "debug");
    }

    #[test]
    fn presets() {
        assert_eq!(LogConfig::development().level, LogLevel::Debug);
        assert_eq!(LogConfig::production().format, LogFormat::Json);
        assert_eq!(LogConfig::test().level, LogLevel::Warn);
    }

    #[test]
    fn try_init_is_idempotent() {
        try_init_logging(&LogConfig::test());
        try_init_logging(&LogConfig::test());
    }
}
