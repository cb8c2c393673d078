//! Configuration management for the theme scraper.
//!
//! This module handles loading and parsing configuration from TOML files,
//! with sensible defaults for all settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory settings
    pub data: DataConfig,

    /// Database settings
    pub database: DatabaseConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Scratch cache, theme directory and disk backpressure
    #[serde(default)]
    pub storage: StorageConfig,

    /// Wiki content source
    #[serde(default)]
    pub wiki: WikiConfig,

    /// Jikan anime-info service
    #[serde(default)]
    pub jikan: JikanConfig,

    /// Media origin and transcoding
    #[serde(default)]
    pub media: MediaConfig,

    /// Outer cycle loop
    #[serde(default)]
    pub cycle: CycleConfig,
}

/// Data directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root data directory path
    pub root_dir: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path (relative to data directory or absolute)
    pub path: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log directory path (relative to data directory or absolute)
    pub log_dir: String,

    /// Default log level (trace, debug, info, warn, error)
    pub default_level: String,

    /// Enable console output
    pub console: bool,

    /// Enable file output
    pub file: bool,

    /// Enable JSON formatting for file logs
    pub json_format: bool,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Scratch directory for raw downloads (relative to data directory)
    pub cache_dir: String,

    /// Final directory for transcoded themes (relative to data directory)
    pub themes_dir: String,

    /// Downloads halt while free space is below this many megabytes
    pub min_free_mb: f64,

    /// How long to halt before checking free space again
    pub disk_pause_seconds: u64,
}

/// Wiki configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikiConfig {
    /// Reddit base URL
    pub base_url: String,

    /// Subreddit hosting the theme wiki
    pub subreddit: String,

    /// Page listing the year-partitioned sub-pages
    pub index_page: String,

    /// User agent sent to reddit
    pub user_agent: String,
}

/// Jikan configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JikanConfig {
    /// Jikan API base URL
    pub base_url: String,

    /// Minimum spacing between uncached lookups
    pub cooldown_seconds: u64,

    /// Request timeout
    pub timeout_seconds: u64,
}

/// Media configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// URL prefix of theme videos, a stem maps to `<base_url>/<stem>.webm`
    pub base_url: String,

    /// User agent sent to the media origin
    pub user_agent: String,

    /// Download request timeout
    pub download_timeout_seconds: u64,

    /// Wall-clock bound on a single transcode
    pub transcode_timeout_seconds: u64,

    /// Wait applied on 429 when the origin sends no usable Retry-After
    pub default_retry_after_seconds: u64,

    /// MP3 bitrate passed to ffmpeg
    pub audio_bitrate: String,
}

/// Cycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Pause between two cycles
    pub interval_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_dir: "cache".to_string(),
            themes_dir: "themes".to_string(),
            min_free_mb: 2.5,
            disk_pause_seconds: 3 * 60 * 60,
        }
    }
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.reddit.com".to_string(),
            subreddit: "AnimeThemes".to_string(),
            index_page: "year_index".to_string(),
            user_agent: format!("rust:theme-scraper:{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for JikanConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.jikan.moe/v4".to_string(),
            cooldown_seconds: 4,
            timeout_seconds: 30,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            base_url: "https://animethemes.moe/video".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            download_timeout_seconds: 300,
            transcode_timeout_seconds: 60,
            default_retry_after_seconds: 60,
            audio_bitrate: "192k".to_string(),
        }
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 3 * 60 * 60,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig {
                root_dir: "data".to_string(),
            },
            database: DatabaseConfig {
                path: "catalog.db".to_string(),
            },
            logging: LoggingConfig {
                log_dir: "logs".to_string(),
                default_level: "info".to_string(),
                console: true,
                file: true,
                json_format: false,
            },
            storage: StorageConfig::default(),
            wiki: WikiConfig::default(),
            jikan: JikanConfig::default(),
            media: MediaConfig::default(),
            cycle: CycleConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// If the file doesn't exist, returns the default configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration saved successfully"
        );

        Ok(())
    }

    /// Get the absolute path for the data directory
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data.root_dir)
    }

    /// Get the absolute path for the database file
    pub fn database_path(&self) -> PathBuf {
        self.resolve(&self.database.path)
    }

    /// Get the absolute path for the log directory
    pub fn log_dir(&self) -> PathBuf {
        self.resolve(&self.logging.log_dir)
    }

    /// Get the absolute path for the scratch cache directory
    pub fn cache_dir(&self) -> PathBuf {
        self.resolve(&self.storage.cache_dir)
    }

    /// Get the absolute path for the transcoded theme directory
    pub fn themes_dir(&self) -> PathBuf {
        self.resolve(&self.storage.themes_dir)
    }

    /// Free-space low-water mark in bytes
    pub fn min_free_bytes(&self) -> u64 {
        (self.storage.min_free_mb * 1_000_000.0) as u64
    }

    pub fn disk_pause(&self) -> Duration {
        Duration::from_secs(self.storage.disk_pause_seconds)
    }

    pub fn jikan_cooldown(&self) -> Duration {
        Duration::from_secs(self.jikan.cooldown_seconds)
    }

    pub fn transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.media.transcode_timeout_seconds)
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle.interval_seconds)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir().join(path)
        }
    }
}
