//! Catalog of anime and themes.
//!
//! This module provides the operations the pipeline needs on top of the SQLite
//! database: existence checks, upserts keyed by natural ids, and the batched
//! deletes the reconciler uses to restore consistency with the file system.

use crate::models::{Anime, Theme};
use crate::Database;
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Handle to the catalog, cheap to clone and shared by the pipeline components
#[derive(Clone)]
pub struct Catalog {
    db: Arc<Mutex<Database>>,
}

/// Row counts of both collections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub anime: usize,
    pub themes: usize,
}

impl Catalog {
    /// Create a new catalog on the given database
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db.lock().map_err(|_| anyhow!("Catalog lock poisoned"))
    }

    /// Whether a theme with this exact URL is cataloged
    pub fn theme_exists(&self, url: &str) -> Result<bool> {
        let db = self.lock()?;
        let count: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM themes WHERE url = ?1 LIMIT 1",
                params![url],
                |row| row.get(0),
            )
            .context("Failed to check theme existence")?;
        Ok(count > 0)
    }

    /// Insert or replace a theme, keyed by URL
    pub fn upsert_theme(&self, theme: &Theme) -> Result<()> {
        let db = self.lock()?;
        db.conn()
            .execute(
                "INSERT INTO themes (url, mal_id, type, title, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(url) DO UPDATE SET
                     mal_id = excluded.mal_id,
                     type = excluded.type,
                     title = excluded.title,
                     updated_at = excluded.updated_at",
                params![theme.url, theme.mal_id, theme.theme_type, theme.title, Utc::now()],
            )
            .with_context(|| format!("Failed to upsert theme {}", theme.url))?;

        debug!(url = %theme.url, mal_id = theme.mal_id, "Upserted theme");
        Ok(())
    }

    /// Insert or replace an anime, keyed by MAL id
    pub fn upsert_anime(&self, anime: &Anime) -> Result<()> {
        let db = self.lock()?;
        db.conn()
            .execute(
                "INSERT INTO anime (mal_id, title, rank, popularity, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(mal_id) DO UPDATE SET
                     title = excluded.title,
                     rank = excluded.rank,
                     popularity = excluded.popularity,
                     updated_at = excluded.updated_at",
                params![anime.mal_id, anime.title, anime.rank, anime.popularity, Utc::now()],
            )
            .with_context(|| format!("Failed to upsert anime {}", anime.mal_id))?;

        debug!(mal_id = anime.mal_id, title = %anime.title, "Upserted anime");
        Ok(())
    }

    /// Get a theme by URL
    pub fn get_theme(&self, url: &str) -> Result<Option<Theme>> {
        let db = self.lock()?;
        let theme = db
            .conn()
            .query_row(
                "SELECT url, mal_id, type, title FROM themes WHERE url = ?1",
                params![url],
                row_to_theme,
            )
            .optional()
            .context("Failed to query theme")?;
        Ok(theme)
    }

    /// Get an anime by MAL id
    pub fn get_anime(&self, mal_id: u32) -> Result<Option<Anime>> {
        let db = self.lock()?;
        let anime = db
            .conn()
            .query_row(
                "SELECT mal_id, title, rank, popularity FROM anime WHERE mal_id = ?1",
                params![mal_id],
                row_to_anime,
            )
            .optional()
            .context("Failed to query anime")?;
        Ok(anime)
    }

    /// Get all themes, ordered by URL
    pub fn themes(&self) -> Result<Vec<Theme>> {
        let db = self.lock()?;
        let mut stmt = db
            .conn()
            .prepare("SELECT url, mal_id, type, title FROM themes ORDER BY url")?;

        let themes = stmt
            .query_map([], row_to_theme)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list themes")?;

        Ok(themes)
    }

    /// Get all anime, ordered by MAL id
    pub fn anime(&self) -> Result<Vec<Anime>> {
        let db = self.lock()?;
        let mut stmt = db
            .conn()
            .prepare("SELECT mal_id, title, rank, popularity FROM anime ORDER BY mal_id")?;

        let anime = stmt
            .query_map([], row_to_anime)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list anime")?;

        Ok(anime)
    }

    /// Ids of every cataloged anime
    pub fn anime_ids(&self) -> Result<HashSet<u32>> {
        let db = self.lock()?;
        let mut stmt = db.conn().prepare("SELECT mal_id FROM anime")?;

        let ids = stmt
            .query_map([], |row| row.get::<_, u32>(0))?
            .collect::<Result<HashSet<_>, _>>()
            .context("Failed to list anime ids")?;

        Ok(ids)
    }

    /// Delete, in one transaction, every theme whose anime id is not in
    /// `anime_ids` or whose URL is not in `urls`
    ///
    /// Returns the number of deleted themes.
    pub fn delete_orphan_themes(
        &self,
        anime_ids: &HashSet<u32>,
        urls: &HashSet<String>,
    ) -> Result<usize> {
        let mut db = self.lock()?;
        let tx = db
            .conn_mut()
            .transaction()
            .context("Failed to begin transaction")?;

        tx.execute_batch(
            "CREATE TEMP TABLE IF NOT EXISTS keep_anime (mal_id INTEGER PRIMARY KEY);
             CREATE TEMP TABLE IF NOT EXISTS keep_urls (url TEXT PRIMARY KEY);
             DELETE FROM keep_anime;
             DELETE FROM keep_urls;",
        )?;

        {
            let mut insert_id = tx.prepare("INSERT OR IGNORE INTO keep_anime (mal_id) VALUES (?1)")?;
            for mal_id in anime_ids {
                insert_id.execute(params![mal_id])?;
            }

            let mut insert_url = tx.prepare("INSERT OR IGNORE INTO keep_urls (url) VALUES (?1)")?;
            for url in urls {
                insert_url.execute(params![url])?;
            }
        }

        let deleted = tx
            .execute(
                "DELETE FROM themes
                 WHERE mal_id NOT IN (SELECT mal_id FROM keep_anime)
                    OR url NOT IN (SELECT url FROM keep_urls)",
                [],
            )
            .context("Failed to delete orphaned themes")?;

        tx.execute_batch("DROP TABLE keep_anime; DROP TABLE keep_urls;")?;
        tx.commit().context("Failed to commit theme cleanup")?;

        Ok(deleted)
    }

    /// Delete every anime that no theme references
    ///
    /// Returns the number of deleted anime.
    pub fn delete_orphan_anime(&self) -> Result<usize> {
        let db = self.lock()?;
        let deleted = db
            .conn()
            .execute(
                "DELETE FROM anime WHERE mal_id NOT IN (SELECT mal_id FROM themes)",
                [],
            )
            .context("Failed to delete orphaned anime")?;
        Ok(deleted)
    }

    /// Get catalog statistics
    pub fn stats(&self) -> Result<CatalogStats> {
        let db = self.lock()?;
        let conn = db.conn();

        let anime: i64 = conn.query_row("SELECT COUNT(*) FROM anime", [], |row| row.get(0))?;
        let themes: i64 = conn.query_row("SELECT COUNT(*) FROM themes", [], |row| row.get(0))?;

        Ok(CatalogStats {
            anime: anime as usize,
            themes: themes as usize,
        })
    }
}

/// Helper: Convert a database row to a Theme
fn row_to_theme(row: &rusqlite::Row) -> rusqlite::Result<Theme> {
    Ok(Theme {
        url: row.get(0)?,
        mal_id: row.get(1)?,
        theme_type: row.get(2)?,
        title: row.get(3)?,
    })
}

/// Helper: Convert a database row to an Anime
fn row_to_anime(row: &rusqlite::Row) -> rusqlite::Result<Anime> {
    Ok(Anime {
        mal_id: row.get(0)?,
        title: row.get(1)?,
        rank: row.get(2)?,
        popularity: row.get(3)?,
    })
}
