//! Error types for the remote services and the media stages.

use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Errors from the anime-info service
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("anime {0} not found")]
    NotFound(u32),

    #[error("anime service answered {status} for anime {mal_id}")]
    Service { mal_id: u32, status: StatusCode },

    #[error("anime service request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors while downloading a theme video
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("rate limited by media origin, retry after {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("media origin answered {0}")]
    Status(StatusCode),

    #[error("download request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to write download: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while transcoding a cached video to audio
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("ffmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("input has no audio track")]
    NoAudioTrack,

    #[error("ffmpeg exited with {exit_code:?}: {stderr}")]
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("transcode timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
