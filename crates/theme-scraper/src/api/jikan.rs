//! Jikan API client for anime lookups.
//!
//! One request per lookup, no retries: a failed lookup leaves the anime
//! absent for this cycle and the theme is retried on a later one.

use super::types::AnimeDetailsResponse;
use super::{AnimeInfoService, AnimeLookup};
use crate::error::LookupError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Header some Jikan deployments use instead of the `request_cached` field
const CACHED_HEADER: &str = "x-request-cached";

/// Jikan API client
pub struct JikanClient {
    /// HTTP client
    client: Client,
    /// Base URL for Jikan API
    base_url: String,
}

impl JikanClient {
    /// Create a new Jikan client
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("theme-scraper/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build the client from the `[jikan]` config section
    pub fn from_config(config: &shared::config::JikanConfig) -> Result<Self> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_seconds))
    }
}

#[async_trait]
impl AnimeInfoService for JikanClient {
    async fn lookup(&self, mal_id: u32) -> Result<AnimeLookup, LookupError> {
        let url = format!("{}/anime/{}", self.base_url, mal_id);
        debug!(url = %url, mal_id, "Fetching anime details");

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound(mal_id));
        }
        if !status.is_success() {
            return Err(LookupError::Service { mal_id, status });
        }

        let cached_header = response
            .headers()
            .get(CACHED_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        let body: AnimeDetailsResponse = response.json().await?;

        Ok(AnimeLookup {
            request_cached: body.request_cached || cached_header,
            anime: body.data.into(),
        })
    }
}
