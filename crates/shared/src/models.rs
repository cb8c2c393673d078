//! Data models for the catalog.
//!
//! An [`Anime`] is keyed by its MyAnimeList id, a [`Theme`] by the URL of its
//! source video. A theme's audio file and scratch download are both named by
//! the stem of that URL (see [`crate::paths`]).

use serde::{Deserialize, Serialize};

/// Anime metadata from MyAnimeList
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anime {
    pub mal_id: u32,
    /// English title when known, otherwise the default title
    pub title: String,
    pub rank: Option<u32>,
    pub popularity: Option<u32>,
}

/// An opening or ending theme
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    /// Source video URL, unique across the catalog
    pub url: String,
    /// Owning anime
    pub mal_id: u32,
    /// Lower-cased type tag such as `op1` or `ed2 v2`
    #[serde(rename = "type")]
    pub theme_type: String,
    pub title: String,
}

impl Theme {
    /// Stem of the source URL, if it follows the `…/<stem>.webm` layout
    pub fn stem(&self) -> Option<String> {
        crate::paths::stem_from_url(&self.url)
    }
}
