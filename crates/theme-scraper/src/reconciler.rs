//! Catalog and storage reconciliation.
//!
//! Restores the invariants between the catalog and the theme directory at the
//! start of every cycle:
//! - every theme references a cataloged anime and has its audio file
//! - every file in the theme directory is an audio file referenced by a theme
//! - every anime is referenced by a theme
//! - the scratch cache is empty
//!
//! Reconciliation only ever deletes, so running it twice in a row deletes
//! nothing the second time.

use anyhow::{Context, Result};
use shared::paths::url_for_stem;
use shared::{Catalog, StoragePaths};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::{debug, info};

/// Deletion counts for one reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub themes_deleted: usize,
    pub files_deleted: usize,
    pub anime_deleted: usize,
    pub cache_deleted: usize,
}

impl CleanupStats {
    pub fn total(&self) -> usize {
        self.themes_deleted + self.files_deleted + self.anime_deleted + self.cache_deleted
    }
}

/// Deletes catalog rows and files that break the storage invariants
pub struct Reconciler {
    catalog: Catalog,
    paths: StoragePaths,
    /// Base URL theme videos are served from, used to map files back to URLs
    media_base_url: String,
}

impl Reconciler {
    /// Create a new reconciler
    pub fn new(catalog: Catalog, paths: StoragePaths, media_base_url: impl Into<String>) -> Self {
        Self {
            catalog,
            paths,
            media_base_url: media_base_url.into(),
        }
    }

    /// Run one reconciliation; any failure is fatal for the cycle
    pub fn run(&self) -> Result<CleanupStats> {
        let mut stats = CleanupStats::default();

        // Snapshot of anime ids and of the files on disk, keyed by source URL
        let anime_ids = self.catalog.anime_ids()?;
        let files: HashMap<String, PathBuf> = self
            .paths
            .theme_stems()
            .with_context(|| {
                format!(
                    "Failed to list theme directory {}",
                    self.paths.themes_dir().display()
                )
            })?
            .into_iter()
            .map(|(stem, path)| (url_for_stem(&self.media_base_url, &stem), path))
            .collect();
        let strays = self.paths.theme_strays().with_context(|| {
            format!(
                "Failed to list theme directory {}",
                self.paths.themes_dir().display()
            )
        })?;
        debug!(
            anime = anime_ids.len(),
            files = files.len(),
            strays = strays.len(),
            "Loaded reconciliation snapshot"
        );

        let expected_urls: HashSet<String> = files.keys().cloned().collect();
        stats.themes_deleted = self
            .catalog
            .delete_orphan_themes(&anime_ids, &expected_urls)
            .context("Failed to delete orphaned themes")?;
        info!(count = stats.themes_deleted, "Deleted themes without anime or audio file");

        let surviving: HashSet<String> = self
            .catalog
            .themes()?
            .into_iter()
            .map(|theme| theme.url)
            .collect();
        for (url, path) in &files {
            if surviving.contains(url) {
                continue;
            }
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to delete theme file {}", path.display()))?;
            debug!(path = %path.display(), "Deleted unreferenced theme file");
            stats.files_deleted += 1;
        }
        for path in &strays {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to delete stray file {}", path.display()))?;
            debug!(path = %path.display(), "Deleted non-audio file from theme directory");
            stats.files_deleted += 1;
        }
        info!(count = stats.files_deleted, "Deleted theme files without theme");

        stats.anime_deleted = self
            .catalog
            .delete_orphan_anime()
            .context("Failed to delete orphaned anime")?;
        info!(count = stats.anime_deleted, "Deleted anime without themes");

        let cache = self.paths.cache_entries().with_context(|| {
            format!(
                "Failed to list cache directory {}",
                self.paths.cache_dir().display()
            )
        })?;
        for path in cache {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to delete cache entry {}", path.display()))?;
            stats.cache_deleted += 1;
        }
        info!(count = stats.cache_deleted, "Cleared cache entries");

        Ok(stats)
    }
}
