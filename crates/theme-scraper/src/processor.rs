//! Per-theme processing: download, transcode, persist.
//!
//! The catalog only learns about a theme once its audio file exists, so a
//! cataloged theme always has its `themes/<stem>.mp3`.

use crate::download::Downloader;
use crate::error::DownloadError;
use crate::transcode::{transcode_with_timeout, Transcoder};
use anyhow::Result;
use shared::{Anime, Catalog, DiskSpaceGuard, StoragePaths, Theme};
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};

/// How a single theme ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Audio written and catalog updated
    Persisted,
    /// URL has no `/video/<stem>.webm` form
    InvalidUrl,
    /// Download failed or was rate limited
    DownloadFailed,
    /// Transcode failed or timed out
    TranscodeFailed,
    /// Audio written but the catalog update failed
    PersistFailed,
}

impl ProcessOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, ProcessOutcome::Persisted)
    }
}

/// Turns one extracted theme into a cataloged audio file
pub struct Processor {
    catalog: Catalog,
    paths: StoragePaths,
    disk: DiskSpaceGuard,
    downloader: Downloader,
    transcoder: Box<dyn Transcoder>,
    transcode_timeout: Duration,
}

impl Processor {
    /// Create a new processor
    pub fn new(
        catalog: Catalog,
        paths: StoragePaths,
        disk: DiskSpaceGuard,
        downloader: Downloader,
        transcoder: Box<dyn Transcoder>,
        transcode_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            paths,
            disk,
            downloader,
            transcoder,
            transcode_timeout,
        }
    }

    /// Process one theme; failures only abort this theme
    pub async fn run(&self, anime: Option<Anime>, theme: Theme) -> ProcessOutcome {
        let Some(stem) = theme.stem() else {
            warn!(url = %theme.url, "Theme URL has no video stem, skipping");
            return ProcessOutcome::InvalidUrl;
        };

        let scratch = self.paths.cache_file(&stem);
        let output = self.paths.theme_file(&stem);

        let download = self.downloader.download(&theme.url, &scratch);
        match self.disk.guard(download).await {
            Ok(bytes) => {
                info!(url = %theme.url, size_kb = bytes / 1_000, "Downloaded theme");
            }
            Err(DownloadError::RateLimited { retry_after }) => {
                warn!(
                    url = %theme.url,
                    retry_after_secs = retry_after.as_secs(),
                    "Rate limited by media origin, backing off"
                );
                tokio::time::sleep(retry_after).await;
                return ProcessOutcome::DownloadFailed;
            }
            Err(e) => {
                warn!(url = %theme.url, error = %e, "Download failed");
                return ProcessOutcome::DownloadFailed;
            }
        }

        let transcoded = transcode_with_timeout(
            self.transcoder.as_ref(),
            &scratch,
            &output,
            self.transcode_timeout,
        )
        .await;
        remove_if_exists(&scratch).await;

        if let Err(e) = transcoded {
            remove_if_exists(&output).await;
            warn!(url = %theme.url, error = %e, "Transcode failed");
            return ProcessOutcome::TranscodeFailed;
        }

        if let Err(e) = self.persist(anime.as_ref(), &theme) {
            error!(url = %theme.url, mal_id = theme.mal_id, error = %e, "Failed to persist theme");
            return ProcessOutcome::PersistFailed;
        }

        info!(
            url = %theme.url,
            mal_id = theme.mal_id,
            path = %output.display(),
            "Theme persisted"
        );
        ProcessOutcome::Persisted
    }

    fn persist(&self, anime: Option<&Anime>, theme: &Theme) -> Result<()> {
        self.catalog.upsert_theme(theme)?;
        if let Some(anime) = anime {
            self.catalog.upsert_anime(anime)?;
        }
        Ok(())
    }
}

async fn remove_if_exists(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove file");
        }
    }
}
