//! File path utilities for the storage area.
//!
//! Two flat directories live under the data root:
//! - `cache/<stem>.webm`: raw downloads, removed right after transcoding
//! - `themes/<stem>.mp3`: transcoded audio, kept as long as the catalog
//!   references the stem

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

/// Extension of raw downloads in the cache directory
pub const VIDEO_EXTENSION: &str = "webm";

/// Extension of transcoded themes
pub const AUDIO_EXTENSION: &str = "mp3";

static STEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/video/([^/?#]+)\.webm(?:[?#].*)?$").expect("valid stem regex"));

/// Derive the file stem from a theme video URL (`…/video/<stem>.webm`)
pub fn stem_from_url(url: &str) -> Option<String> {
    STEM_RE
        .captures(url)
        .map(|caps| caps[1].to_string())
}

/// Source URL of the theme video a stem was downloaded from
pub fn url_for_stem(base_url: &str, stem: &str) -> String {
    format!("{}/{}.{}", base_url.trim_end_matches('/'), stem, VIDEO_EXTENSION)
}

/// Whether `url` is exactly the URL `base_url` serves its stem under
///
/// Only such URLs map back from `themes/<stem>.mp3` to the same theme.
pub fn is_media_url(base_url: &str, url: &str) -> bool {
    stem_from_url(url)
        .map(|stem| url_for_stem(base_url, &stem) == url)
        .unwrap_or(false)
}

/// Storage layout for cached downloads and transcoded themes
#[derive(Debug, Clone)]
pub struct StoragePaths {
    cache_dir: PathBuf,
    themes_dir: PathBuf,
}

impl StoragePaths {
    /// Create a new layout from explicit directories
    pub fn new(cache_dir: impl AsRef<Path>, themes_dir: impl AsRef<Path>) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            themes_dir: themes_dir.as_ref().to_path_buf(),
        }
    }

    /// Build the layout from the configured directories
    pub fn from_config(config: &crate::Config) -> Self {
        Self::new(config.cache_dir(), config.themes_dir())
    }

    /// Get the scratch cache directory
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get the transcoded theme directory
    pub fn themes_dir(&self) -> &Path {
        &self.themes_dir
    }

    /// Raw download for a stem
    pub fn cache_file(&self, stem: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", stem, VIDEO_EXTENSION))
    }

    /// Transcoded theme for a stem
    pub fn theme_file(&self, stem: &str) -> PathBuf {
        self.themes_dir
            .join(format!("{}.{}", stem, AUDIO_EXTENSION))
    }

    /// Create both directories
    pub fn create_dirs(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.cache_dir)?;
        std::fs::create_dir_all(&self.themes_dir)?;
        Ok(())
    }

    /// Stems of every audio file in the theme directory, mapped to their paths
    pub fn theme_stems(&self) -> io::Result<BTreeMap<String, PathBuf>> {
        let mut stems = BTreeMap::new();

        for path in self.theme_dir_files()? {
            if !is_audio_file(&path) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                stems.insert(stem.to_string(), path.clone());
            }
        }

        Ok(stems)
    }

    /// Files in the theme directory that are not audio files
    pub fn theme_strays(&self) -> io::Result<Vec<PathBuf>> {
        Ok(self
            .theme_dir_files()?
            .into_iter()
            .filter(|path| !is_audio_file(path))
            .collect())
    }

    fn theme_dir_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in std::fs::read_dir(&self.themes_dir)? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    /// Every file currently in the cache directory
    pub fn cache_entries(&self) -> io::Result<Vec<PathBuf>> {
        let mut entries = Vec::new();

        for entry in std::fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if path.is_file() {
                entries.push(path);
            }
        }

        Ok(entries)
    }
}

fn is_audio_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(AUDIO_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths() {
        let paths = StoragePaths::new("/data/cache", "/data/themes");

        assert_eq!(
            paths.cache_file("Naruto-OP1"),
            PathBuf::from("/data/cache/Naruto-OP1.webm")
        );

        assert_eq!(
            paths.theme_file("Naruto-OP1"),
            PathBuf::from("/data/themes/Naruto-OP1.mp3")
        );
    }

    #[test]
    fn test_stem_from_url() {
        assert_eq!(
            stem_from_url("https://animethemes.moe/video/ed1.webm").as_deref(),
            Some("ed1")
        );
        assert_eq!(
            stem_from_url("http://127.0.0.1:4000/video/Bakemonogatari-OP1v2.webm").as_deref(),
            Some("Bakemonogatari-OP1v2")
        );
        assert_eq!(
            stem_from_url("https://animethemes.moe/video/a.webm?dl=1").as_deref(),
            Some("a")
        );
        assert_eq!(stem_from_url("https://animethemes.moe/video/a.mp4"), None);
        assert_eq!(stem_from_url("https://example.com/a.webm"), None);
    }

    #[test]
    fn test_url_for_stem() {
        assert_eq!(
            url_for_stem("https://animethemes.moe/video/", "ed1"),
            "https://animethemes.moe/video/ed1.webm"
        );
        let url = url_for_stem("https://animethemes.moe/video", "Naruto-OP1");
        assert_eq!(stem_from_url(&url).as_deref(), Some("Naruto-OP1"));
    }

    #[test]
    fn test_is_media_url() {
        let base = "https://animethemes.moe/video";
        assert!(is_media_url(base, "https://animethemes.moe/video/ed1.webm"));
        assert!(!is_media_url(base, "http://animethemes.moe/video/ed1.webm"));
        assert!(!is_media_url(base, "https://mirror.example/video/ed1.webm"));
        assert!(!is_media_url(base, "https://animethemes.moe/video/ed1.webm?dl=1"));
        assert!(!is_media_url(base, "https://animethemes.moe/audio/ed1.ogg"));
    }

    #[test]
    fn test_theme_stems_and_cache_entries() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        let paths = StoragePaths::new(temp_dir.path().join("cache"), temp_dir.path().join("themes"));
        paths.create_dirs()?;

        std::fs::write(paths.theme_file("a"), b"mp3")?;
        std::fs::write(paths.theme_file("b"), b"mp3")?;
        std::fs::create_dir(paths.themes_dir().join("nested"))?;
        std::fs::write(paths.cache_file("c"), b"webm")?;

        std::fs::write(paths.themes_dir().join("a.part"), b"partial")?;
        std::fs::write(paths.themes_dir().join("notes.txt"), b"text")?;

        let stems = paths.theme_stems()?;
        assert_eq!(stems.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(stems["a"], paths.theme_file("a"));
        assert_eq!(
            paths.theme_strays()?,
            vec![paths.themes_dir().join("a.part"), paths.themes_dir().join("notes.txt")]
        );
        assert_eq!(paths.cache_entries()?, vec![paths.cache_file("c")]);

        Ok(())
    }
}
