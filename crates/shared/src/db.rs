//! Database operations for SQLite.
//!
//! This module handles the catalog connection, schema creation, and migrations.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info};

/// Current schema version, stored in `PRAGMA user_version`
pub const SCHEMA_VERSION: i32 = 1;

/// Database connection wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let is_new = !path.exists();

        debug!(path = %path.display(), "Opening database");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;

        let mut db = Self { conn };

        if is_new {
            info!("Creating new database schema");
            db.create_schema()?;
        } else {
            debug!("Database already exists");
            db.run_migrations()?;
        }

        Ok(db)
    }

    /// Open a fresh in-memory database with the schema applied
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let mut db = Self { conn };
        db.create_schema()?;
        Ok(db)
    }

    /// Create the database schema
    fn create_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(include_str!("../schema.sql"))
            .context("Failed to create database schema")?;
        self.set_version(SCHEMA_VERSION)?;

        info!("Database schema created successfully");
        Ok(())
    }

    /// Get a reference to the underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Get a mutable reference to the underlying connection
    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Check if a table exists
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Get the database version (from user_version pragma)
    pub fn get_version(&self) -> Result<i32> {
        let version: i32 = self.conn.query_row(
            "PRAGMA user_version",
            [],
            |row| row.get(0),
        )?;
        Ok(version)
    }

    /// Set the database version
    pub fn set_version(&self, version: i32) -> Result<()> {
        self.conn.execute_batch(&format!("PRAGMA user_version = {}", version))?;
        Ok(())
    }

    /// Run migrations for existing databases
    fn run_migrations(&mut self) -> Result<()> {
        let version = self.get_version()?;

        // Files created by an empty `Connection::open` have no tables yet
        if version < 1 {
            info!(from = version, to = SCHEMA_VERSION, "Running migration: applying catalog schema");
            self.conn.execute_batch(include_str!("../schema.sql"))
                .context("Failed to apply catalog schema")?;
            self.set_version(SCHEMA_VERSION)?;
            info!("Migration completed");
        }

        Ok(())
    }
}
