// ABOUTME: Structured logging setup built on tracing-subscriber
// ABOUTME: Env-driven level and format selection (json, pretty, compact)
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::env;

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON format for production logging
    Json,
    /// Pretty format for development
    Pretty,
    /// Compact format for space-constrained environments
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Pretty,
        }
    }
}

impl LoggingConfig {
    /// Read configuration from `HEARTBRIDGE_LOG_LEVEL` / `HEARTBRIDGE_LOG_FORMAT`
    #[must_use]
    pub fn from_env() -> Self {
        let level = env::var("HEARTBRIDGE_LOG_LEVEL").unwrap_or_else(|_| "info".into());
        let format = match env::var("HEARTBRIDGE_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") => LogFormat::Compact,
            _ => LogFormat::Pretty,
        };
        Self { level, format }
    }
}

/// Initialize the global tracing subscriber
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed or the
/// level filter cannot be parsed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))?;

    match config.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .try_init()?;
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty())
                .try_init()?;
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact())
                .try_init()?;
        }
    }

    Ok(())
}
