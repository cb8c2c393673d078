//! Disk-space backpressure.
//!
//! The processor runs every download through [`DiskSpaceGuard::guard`], which
//! halts the whole pipeline while the storage volume has less free space than
//! the configured low-water mark.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Source of the free-space figure for a path
pub trait FreeSpaceProbe: Send + Sync {
    /// Bytes available to unprivileged users on the volume holding `path`
    fn free_bytes(&self, path: &Path) -> Result<u64>;
}

/// Probe backed by `statvfs(3)`
#[derive(Debug, Clone, Copy, Default)]
pub struct StatvfsProbe;

impl FreeSpaceProbe for StatvfsProbe {
    fn free_bytes(&self, path: &Path) -> Result<u64> {
        let stat = nix::sys::statvfs::statvfs(path)
            .with_context(|| format!("Failed to stat filesystem of {}", path.display()))?;
        Ok(stat.blocks_available() as u64 * stat.fragment_size() as u64)
    }
}

/// Blocks callers until the storage volume has room again
pub struct DiskSpaceGuard {
    /// Any path on the monitored volume
    path: PathBuf,
    /// Low-water mark in bytes
    min_free_bytes: u64,
    /// Sleep between two checks while below the mark
    pause: Duration,
    probe: Box<dyn FreeSpaceProbe>,
}

impl DiskSpaceGuard {
    /// Create a guard using `statvfs` on the given path
    pub fn new(path: impl AsRef<Path>, min_free_bytes: u64, pause: Duration) -> Self {
        Self::with_probe(path, min_free_bytes, pause, StatvfsProbe)
    }

    /// Create a guard with a custom free-space probe
    pub fn with_probe(
        path: impl AsRef<Path>,
        min_free_bytes: u64,
        pause: Duration,
        probe: impl FreeSpaceProbe + 'static,
    ) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            min_free_bytes,
            pause,
            probe: Box::new(probe),
        }
    }

    /// Wait until free space is at or above the low-water mark
    ///
    /// Returns how many pauses were taken. A failing probe counts as a full
    /// volume: the guard pauses and checks again.
    pub async fn wait_for_space(&self) -> u32 {
        let mut pauses = 0;

        loop {
            match self.probe.free_bytes(&self.path) {
                Ok(free) if free >= self.min_free_bytes => {
                    debug!(free_mb = free / 1_000_000, "Enough disk space");
                    return pauses;
                }
                Ok(free) => {
                    warn!(
                        free_bytes = free,
                        min_free_bytes = self.min_free_bytes,
                        pause_secs = self.pause.as_secs(),
                        "Disk is too full, halting processing"
                    );
                }
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        error = %format!("{:#}", e),
                        pause_secs = self.pause.as_secs(),
                        "Disk space check failed, halting processing"
                    );
                }
            }

            sleep(self.pause).await;
            pauses += 1;
        }
    }

    /// Run `op` once the volume has room
    pub async fn guard<F, T>(&self, op: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        self.wait_for_space().await;
        op.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::time::Instant;

    /// Reports each value in turn, then repeats the last one; `None` fails
    struct ScriptedProbe {
        values: Vec<Option<u64>>,
        calls: Arc<AtomicUsize>,
    }

    impl FreeSpaceProbe for ScriptedProbe {
        fn free_bytes(&self, _path: &Path) -> Result<u64> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.values[call.min(self.values.len() - 1)]
                .ok_or_else(|| anyhow::anyhow!("statvfs failed"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_passes_through_with_enough_space() -> Result<()> {
        let calls = Arc::new(AtomicUsize::new(0));
        let guard = DiskSpaceGuard::with_probe(
            "/",
            2_500_000,
            Duration::from_secs(10800),
            ScriptedProbe { values: vec![Some(2_500_000)], calls: calls.clone() },
        );

        let start = Instant::now();
        assert_eq!(guard.guard(async { 7 }).await, 7);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_halts_until_space_is_freed() -> Result<()> {
        let calls = Arc::new(AtomicUsize::new(0));
        let guard = DiskSpaceGuard::with_probe(
            "/",
            2_500_000,
            Duration::from_secs(10800),
            ScriptedProbe {
                values: vec![Some(1_000), Some(2_499_999), Some(50_000_000)],
                calls: calls.clone(),
            },
        );

        let start = Instant::now();
        let pauses = guard.wait_for_space().await;

        assert_eq!(pauses, 2);
        assert_eq!(start.elapsed(), Duration::from_secs(2 * 10800));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_space_check_pauses_and_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let guard = DiskSpaceGuard::with_probe(
            "/",
            2_500_000,
            Duration::from_secs(10800),
            ScriptedProbe { values: vec![None, Some(50_000_000)], calls: calls.clone() },
        );

        let start = Instant::now();
        let ran_at = guard.guard(async { Instant::now() }).await;

        assert_eq!(ran_at.duration_since(start), Duration::from_secs(10800));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_statvfs_reports_space() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let free = StatvfsProbe.free_bytes(temp_dir.path())?;
        assert!(free > 0);

        let missing = temp_dir.path().join("missing");
        assert!(StatvfsProbe.free_bytes(&missing).is_err());

        Ok(())
    }
}
