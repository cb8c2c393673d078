//! Reddit wiki client.
//!
//! Pages are read through the public JSON listing
//! (`/r/<subreddit>/wiki/<page>.json`), which carries the raw markdown in
//! `data.content_md`.

use super::types::WikiPageResponse;
use super::WikiSource;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Wiki of a single subreddit
pub struct RedditWiki {
    client: Client,
    base_url: String,
    subreddit: String,
}

impl RedditWiki {
    /// Create a new wiki client
    pub fn new(
        base_url: impl Into<String>,
        subreddit: impl Into<String>,
        user_agent: &str,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            subreddit: subreddit.into(),
        })
    }

    /// Build the client from the `[wiki]` config section
    pub fn from_config(config: &shared::config::WikiConfig) -> Result<Self> {
        Self::new(&config.base_url, &config.subreddit, &config.user_agent)
    }
}

#[async_trait]
impl WikiSource for RedditWiki {
    async fn fetch_page(&self, name: &str) -> Result<String> {
        let url = format!("{}/r/{}/wiki/{}.json", self.base_url, self.subreddit, name);
        debug!(url = %url, "Fetching wiki page");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch wiki page {}", name))?;

        let status = response.status();
        if !status.is_success() {
            bail!("Wiki page {} answered {}", name, status);
        }

        let page: WikiPageResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse wiki page {}", name))?;

        Ok(unescape_entities(&page.data.content_md))
    }
}

/// Reddit HTML-escapes a few characters inside `content_md`
fn unescape_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/r/AnimeThemes/wiki/year_index.json"))
            .and(header("user-agent", "test-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "kind": "wikipage",
                "data": {"content_md": "###[2020](/r/AnimeThemes/wiki/2020)\r\nTom &amp; Jerry"}
            })))
            .mount(&server)
            .await;

        let wiki = RedditWiki::new(server.uri(), "AnimeThemes", "test-agent").unwrap();
        let content = wiki.fetch_page("year_index").await.unwrap();
        assert_eq!(content, "###[2020](/r/AnimeThemes/wiki/2020)\r\nTom & Jerry");
    }

    #[tokio::test]
    async fn test_fetch_page_fails_on_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let wiki = RedditWiki::new(server.uri(), "AnimeThemes", "test-agent").unwrap();
        assert!(wiki.fetch_page("2020").await.is_err());
    }
}
