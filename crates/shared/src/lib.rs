//! Shared library for the anime theme scraper.
//!
//! This crate provides common functionality used by the scraper components:
//! - Configuration management
//! - Catalog models and SQLite operations
//! - Storage layout (scratch cache and final theme directory)
//! - Disk-space backpressure
//! - Logging infrastructure

pub mod catalog;
pub mod config;
pub mod db;
pub mod disk;
pub mod logging;
pub mod models;
pub mod paths;

// Re-export commonly used types
pub use catalog::Catalog;
pub use config::Config;
pub use db::Database;
pub use disk::{DiskSpaceGuard, FreeSpaceProbe, StatvfsProbe};
pub use logging::LogConfig;
pub use models::*;
pub use paths::StoragePaths;
