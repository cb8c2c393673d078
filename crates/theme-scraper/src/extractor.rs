//! Theme extraction from the wiki.
//!
//! [`Extractor::run`] starts a pull-based pass over the wiki: each call to
//! [`Extraction::next`] does just enough work (page fetches, catalog checks,
//! one rate-limited anime lookup at most) to produce the next new theme, so the
//! consumer fully processes a theme before the next one is produced.

use crate::api::{AnimeInfoService, AnimeLookup, Cooldown, WikiSource};
use crate::error::LookupError;
use crate::parser;
use anyhow::{Context, Result};
use shared::paths::is_media_url;
use shared::{Anime, Catalog, Theme};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Statistics for one extraction pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub entries_seen: usize,
    pub themes_yielded: usize,
    pub duplicates_skipped: usize,
    /// Themes whose URL is not on the media origin
    pub foreign_skipped: usize,
    pub lookups: usize,
    pub lookups_failed: usize,
}

/// Produces new themes from the wiki, enriched with anime metadata
pub struct Extractor {
    catalog: Catalog,
    wiki: Box<dyn WikiSource>,
    anime_info: Box<dyn AnimeInfoService>,
    index_page: String,
    /// Only theme URLs of the form `<media_base_url>/<stem>.webm` are kept
    media_base_url: String,
    /// Spacing of uncached anime lookups, kept across passes
    cooldown: Cooldown,
    /// Anime id of the most recent lookup in the current pass
    last_anime: Option<u32>,
}

impl Extractor {
    /// Create a new extractor
    pub fn new(
        catalog: Catalog,
        wiki: Box<dyn WikiSource>,
        anime_info: Box<dyn AnimeInfoService>,
        index_page: impl Into<String>,
        media_base_url: impl Into<String>,
        cooldown: Duration,
    ) -> Self {
        Self {
            catalog,
            wiki,
            anime_info,
            index_page: index_page.into(),
            media_base_url: media_base_url.into(),
            cooldown: Cooldown::new(cooldown),
            last_anime: None,
        }
    }

    /// Start a new pass over the wiki
    pub fn run(&mut self) -> Extraction<'_> {
        self.last_anime = None;
        Extraction {
            extractor: self,
            pages: None,
            entries: VecDeque::new(),
            themes: VecDeque::new(),
            stats: ExtractionStats::default(),
        }
    }

    /// Look an anime up, waiting for the cooldown first
    ///
    /// The deadline advances unless the service reports a cached answer;
    /// failed requests count as remote calls.
    async fn resolve_anime(&mut self, mal_id: u32) -> Result<AnimeLookup, LookupError> {
        let service = &self.anime_info;
        self.cooldown
            .guard(service.lookup(mal_id), |result| match result {
                Ok(lookup) => !lookup.request_cached,
                Err(_) => true,
            })
            .await
    }
}

/// One pass over the wiki; finite and not restartable
pub struct Extraction<'a> {
    extractor: &'a mut Extractor,
    /// Year pages not yet fetched; `None` until the index page is read
    pages: Option<VecDeque<String>>,
    /// Entry blocks of the current page not yet parsed
    entries: VecDeque<String>,
    /// Themes of the current entry not yet checked
    themes: VecDeque<Theme>,
    stats: ExtractionStats,
}

impl Extraction<'_> {
    /// Produce the next new theme, or `None` once the wiki is exhausted
    ///
    /// The anime is present only for the theme whose lookup resolved it.
    /// Errors come from the index page or the catalog and end the pass.
    pub async fn next(&mut self) -> Result<Option<(Option<Anime>, Theme)>> {
        loop {
            if let Some(theme) = self.themes.pop_front() {
                if let Some(pair) = self.consider(theme).await? {
                    return Ok(Some(pair));
                }
                continue;
            }

            if let Some(entry) = self.entries.pop_front() {
                self.stats.entries_seen += 1;
                self.themes.extend(parser::extract_themes(&entry));
                continue;
            }

            if !self.load_next_page().await? {
                info!(
                    pages = self.stats.pages_fetched,
                    themes = self.stats.themes_yielded,
                    duplicates = self.stats.duplicates_skipped,
                    lookups = self.stats.lookups,
                    "Extraction finished"
                );
                return Ok(None);
            }
        }
    }

    /// Statistics so far
    pub fn stats(&self) -> &ExtractionStats {
        &self.stats
    }

    /// Fill `entries` from the next year page; false when none is left
    async fn load_next_page(&mut self) -> Result<bool> {
        if self.pages.is_none() {
            let index_page = self.extractor.index_page.clone();
            let index = self
                .extractor
                .wiki
                .fetch_page(&index_page)
                .await
                .with_context(|| format!("Failed to fetch wiki index {}", index_page))?;

            let pages: VecDeque<String> = parser::year_pages(&index).into();
            info!(pages = pages.len(), "Discovered wiki pages");
            self.pages = Some(pages);
        }

        while let Some(page) = self.pages.as_mut().and_then(VecDeque::pop_front) {
            match self.extractor.wiki.fetch_page(&page).await {
                Ok(content) => {
                    self.stats.pages_fetched += 1;
                    self.entries = parser::split_entries(&content).into();
                    debug!(page = %page, entries = self.entries.len(), "Fetched wiki page");
                    return Ok(true);
                }
                Err(e) => {
                    self.stats.pages_failed += 1;
                    warn!(page = %page, error = %e, "Failed to fetch wiki page, skipping");
                }
            }
        }

        Ok(false)
    }

    /// Dedup against the catalog and attach anime metadata when needed
    async fn consider(&mut self, theme: Theme) -> Result<Option<(Option<Anime>, Theme)>> {
        if !is_media_url(&self.extractor.media_base_url, &theme.url) {
            self.stats.foreign_skipped += 1;
            warn!(url = %theme.url, "Theme is not on the media origin, skipping");
            return Ok(None);
        }

        if self.extractor.catalog.theme_exists(&theme.url)? {
            self.stats.duplicates_skipped += 1;
            debug!(url = %theme.url, "Theme already cataloged, skipping");
            return Ok(None);
        }

        let mut anime = None;
        if self.extractor.last_anime != Some(theme.mal_id) {
            self.stats.lookups += 1;
            match self.extractor.resolve_anime(theme.mal_id).await {
                Ok(lookup) => anime = Some(lookup.anime),
                Err(e) => {
                    self.stats.lookups_failed += 1;
                    warn!(mal_id = theme.mal_id, error = %e, "Fetching anime failed");
                }
            }
            self.extractor.last_anime = Some(theme.mal_id);
        }

        self.stats.themes_yielded += 1;
        info!(url = %theme.url, title = %theme.title, mal_id = theme.mal_id, "Extracted theme");
        Ok(Some((anime, theme)))
    }
}
