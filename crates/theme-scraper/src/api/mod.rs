//! Remote services used by the extractor.
//!
//! The extractor only sees the [`WikiSource`] and [`AnimeInfoService`] traits;
//! [`RedditWiki`] and [`JikanClient`] are the production implementations.

pub mod cooldown;
pub mod jikan;
pub mod types;
pub mod wiki;

pub use cooldown::Cooldown;
pub use jikan::JikanClient;
pub use wiki::RedditWiki;

use crate::error::LookupError;
use async_trait::async_trait;
use shared::Anime;

/// Read-only wiki exposing pages as raw markdown
#[async_trait]
pub trait WikiSource: Send + Sync {
    /// Fetch the markdown content of a page by name
    async fn fetch_page(&self, name: &str) -> anyhow::Result<String>;
}

/// Result of an anime lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimeLookup {
    pub anime: Anime,
    /// The service answered from its own cache without contacting MyAnimeList
    pub request_cached: bool,
}

/// Anime metadata lookup by MyAnimeList id
#[async_trait]
pub trait AnimeInfoService: Send + Sync {
    async fn lookup(&self, mal_id: u32) -> Result<AnimeLookup, LookupError>;
}
