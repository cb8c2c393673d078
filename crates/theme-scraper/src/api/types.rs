//! Response types of the remote services.

use serde::{Deserialize, Serialize};
use shared::Anime;

/// Jikan anime details response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimeDetailsResponse {
    pub data: AnimeDetails,
    /// Set by Jikan when the answer came from its own cache
    #[serde(default)]
    pub request_cached: bool,
}

/// The subset of Jikan anime details the catalog keeps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimeDetails {
    pub mal_id: u32,
    pub title: String,
    #[serde(default, alias = "english_title")]
    pub title_english: Option<String>,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub popularity: Option<u32>,
}

impl From<AnimeDetails> for Anime {
    fn from(details: AnimeDetails) -> Self {
        let title = details
            .title_english
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(details.title);

        Anime {
            mal_id: details.mal_id,
            title,
            rank: details.rank,
            popularity: details.popularity,
        }
    }
}

/// Reddit wiki page listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikiPageResponse {
    pub data: WikiPageData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikiPageData {
    pub content_md: String,
}
