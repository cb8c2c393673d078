//! Logging infrastructure for the theme scraper.
//!
//! Structured logging to the console and to a daily-rotated file, with
//! crate-specific log levels overridable through `RUST_LOG`.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log directory path
    pub log_dir: String,
    /// Component name (used for log file naming)
    pub component: String,
    /// Default log level
    pub default_level: Level,
    /// Enable console output
    pub console: bool,
    /// Enable file output
    pub file: bool,
    /// Enable JSON formatting for file logs
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: "data/logs".to_string(),
            component: "theme-scraper".to_string(),
            default_level: Level::INFO,
            console: true,
            file: true,
            json_format: false,
        }
    }
}

impl LogConfig {
    /// Build a logging configuration from the `[logging]` config section
    pub fn from_config(config: &crate::Config, component: &str) -> Self {
        Self {
            log_dir: config.log_dir().to_string_lossy().to_string(),
            component: component.to_string(),
            default_level: parse_level(&config.logging.default_level),
            console: config.logging.console,
            file: config.logging.file,
            json_format: config.logging.json_format,
        }
    }
}

/// Parse a level name, falling back to INFO for unknown values
pub fn parse_level(level: &str) -> Level {
    level.trim().parse().unwrap_or(Level::INFO)
}

/// Initialize logging with the given configuration
///
/// Sets up tracing with:
/// - Daily file rotation
/// - Structured logging with contextual fields
/// - Crate-specific log levels
/// - Optional JSON formatting
pub fn init(config: LogConfig) -> Result<()> {
    let log_dir = Path::new(&config.log_dir);
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", config.log_dir))?;

    // Default to configured level, but allow override via RUST_LOG
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,shared={},theme_scraper={},hyper=warn,reqwest=warn,h2=warn",
            config.default_level,
            config.default_level
        ))
    });

    let mut layers = Vec::new();

    if config.console {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_span_events(FmtSpan::NONE)
            .with_writer(std::io::stdout)
            .boxed();
        layers.push(console_layer);
    }

    if config.file {
        let file_appender = tracing_appender::rolling::daily(log_dir, &config.component);

        let file_layer = if config.json_format {
            fmt::layer()
                .json()
                .with_target(true)
                .with_level(true)
                .with_current_span(true)
                .with_span_list(false)
                .with_writer(file_appender)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(false)
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(file_appender)
                .boxed()
        };

        layers.push(file_layer);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::info!(
        component = %config.component,
        log_dir = %config.log_dir,
        "Logging initialized"
    );

    Ok(())
}
