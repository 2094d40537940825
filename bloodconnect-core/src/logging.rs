//! Unified logging system
//!
//! Structured logging on top of `tracing-subscriber` with configurable output

use serde::{Deserialize, Serialize};
use std::io;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty, compact)
    pub format: LogFormat,
    /// Whether to include file and line information
    pub include_location: bool,
    /// Whether to include thread information
    pub include_thread: bool,
    /// Custom filter directives
    pub filter_directives: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
            include_location: false,
            include_thread: false,
            filter_directives: vec![
                "bloodconnect=info".to_string(),
                "bloodconnect_core=info".to_string(),
                "bloodconnect_session=info".to_string(),
            ],
        }
    }
}

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence over `config.level`. Logs go to stderr so
/// command output on stdout stays clean.
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    // Add custom filter directives
    for directive in &config.filter_directives {
        filter = filter.add_directive(directive.parse()?);
    }

    let registry = tracing_subscriber::registry().with(filter);

    let layer = fmt::layer()
        .with_writer(io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_thread_ids(config.include_thread)
        .with_thread_names(config.include_thread);

    match config.format {
        LogFormat::Json => registry.with(layer.json()).try_init()?,
        LogFormat::Pretty => registry.with(layer.pretty()).try_init()?,
        LogFormat::Compact => registry.with(layer.compact()).try_init()?,
    }

    Ok(())
}

/// Logging macros for common patterns
#[macro_export]
macro_rules! log_operation_start {
    ($operation:expr) => {
        tracing::info!(
            operation = $operation,
            "Starting operation"
        );
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::info!(
            operation = $operation,
            $($field)*,
            "Starting operation"
        );
    };
}

#[macro_export]
macro_rules! log_operation_success {
    ($operation:expr) => {
        tracing::info!(
            operation = $operation,
            "Operation completed successfully"
        );
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::info!(
            operation = $operation,
            $($field)*,
            "Operation completed successfully"
        );
    };
}

#[macro_export]
macro_rules! log_operation_error {
    ($operation:expr, $error:expr) => {
        tracing::error!(
            operation = $operation,
            error = %$error,
            "Operation failed"
        );
    };
    ($operation:expr, $error:expr, $($field:tt)*) => {
        tracing::error!(
            operation = $operation,
            error = %$error,
            $($field)*,
            "Operation failed"
        );
    };
}
