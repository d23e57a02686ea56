//! Structured logging configuration
//!
//! Logs always go to stderr: stdout carries the command output that callers
//! parse.

use std::str::FromStr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (pretty, compact)
    pub format: LogFormat,
    /// Include file/line info
    pub file_info: bool,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Pretty multi-line output (for humans)
    Pretty,
    /// Compact single-line format
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("Unknown log format: {}. Use 'pretty' or 'compact'", other)),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
            file_info: false,
        }
    }
}

impl LogConfig {
    /// Verbose configuration used by `--verbose`
    pub fn verbose() -> Self {
        Self {
            level: "debug".to_string(),
            format: LogFormat::Compact,
            file_info: true,
        }
    }

    /// Build from configured level and format names, falling back to the
    /// compact format for an unknown name
    pub fn from_settings(level: &str, format: &str) -> Self {
        Self {
            level: level.to_string(),
            format: format.parse().unwrap_or(LogFormat::Compact),
            file_info: false,
        }
    }
}

/// Initialize logging with the given configuration
pub fn init_logging(config: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .with_file(config.file_info)
                .with_line_number(config.file_info);

            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .init();
        }
        LogFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_file(config.file_info)
                .with_line_number(config.file_info);

            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .init();
        }
    }

    tracing::debug!(
        level = %config.level,
        format = ?config.format,
        "Logging initialized"
    );
}
