//! Theme video downloads.

use crate::error::DownloadError;
use anyhow::Context;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// HTTP downloader for theme videos
#[derive(Clone)]
pub struct Downloader {
    client: Client,
    /// Wait applied when a 429 carries no usable `Retry-After`
    default_retry_after: Duration,
}

impl Downloader {
    /// Create a new downloader
    pub fn new(
        user_agent: &str,
        timeout: Duration,
        default_retry_after: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            default_retry_after,
        })
    }

    /// Build the downloader from the `[media]` config section
    pub fn from_config(config: &shared::config::MediaConfig) -> anyhow::Result<Self> {
        Self::new(
            &config.user_agent,
            Duration::from_secs(config.download_timeout_seconds),
            Duration::from_secs(config.default_retry_after_seconds),
        )
    }

    /// Download `url` into `dest`, returning the number of bytes written
    ///
    /// Nothing is left at `dest` when the download fails.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        debug!(url = %url, dest = %dest.display(), "Downloading theme");

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(self.default_retry_after);
            return Err(DownloadError::RateLimited { retry_after });
        }
        if !status.is_success() {
            return Err(DownloadError::Status(status));
        }

        match write_body(response, dest).await {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                if let Err(rm) = fs::remove_file(dest).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %dest.display(), error = %rm, "Failed to remove partial download");
                    }
                }
                Err(e)
            }
        }
    }
}

async fn write_body(mut response: reqwest::Response, dest: &Path) -> Result<u64, DownloadError> {
    let mut file = fs::File::create(dest).await?;
    let mut written = 0u64;

    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(written)
}
