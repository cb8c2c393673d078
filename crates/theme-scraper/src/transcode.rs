//! Audio extraction with FFmpeg.

use crate::error::TranscodeError;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Converts a cached video into an audio file
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError>;
}

/// Transcoder shelling out to `ffmpeg`
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    /// Path or name of the ffmpeg binary
    program: String,
    /// MP3 bitrate, e.g. `192k`
    audio_bitrate: String,
}

impl FfmpegTranscoder {
    pub fn new(audio_bitrate: impl Into<String>) -> Self {
        Self {
            program: "ffmpeg".to_string(),
            audio_bitrate: audio_bitrate.into(),
        }
    }

    /// Use a different ffmpeg binary
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-y", "-v", "error", "-i"])
            .arg(input)
            .args(["-map", "0:a:0", "-vn", "-c:a", "libmp3lame", "-b:a"])
            .arg(&self.audio_bitrate)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            // The child dies with the future when a timeout drops it
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
        debug!(input = %input.display(), output = %output.display(), "Running ffmpeg");

        let result = self.command(input, output).output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TranscodeError::FfmpegNotFound
            } else {
                TranscodeError::Io(e)
            }
        })?;

        if result.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
        if stderr.contains("matches no streams") {
            return Err(TranscodeError::NoAudioTrack);
        }

        Err(TranscodeError::Failed {
            exit_code: result.status.code(),
            stderr,
        })
    }
}

/// Run a transcode, giving up once `limit` has elapsed
pub async fn transcode_with_timeout(
    transcoder: &dyn Transcoder,
    input: &Path,
    output: &Path,
    limit: Duration,
) -> Result<(), TranscodeError> {
    match tokio::time::timeout(limit, transcoder.transcode(input, output)).await {
        Ok(result) => result,
        Err(_) => Err(TranscodeError::Timeout(limit)),
    }
}
