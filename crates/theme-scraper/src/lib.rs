//! Anime theme scraper.
//!
//! Each cycle reconciles the catalog with the theme directory, then walks the
//! AnimeThemes wiki for themes not cataloged yet, downloads each video,
//! extracts its audio track and records the theme with its anime.

pub mod api;
pub mod download;
pub mod error;
pub mod extractor;
pub mod parser;
pub mod pipeline;
pub mod processor;
pub mod reconciler;
pub mod transcode;

pub use download::Downloader;
pub use error::{DownloadError, LookupError, TranscodeError};
pub use extractor::{Extraction, ExtractionStats, Extractor};
pub use pipeline::{CycleStats, Pipeline};
pub use processor::{ProcessOutcome, Processor};
pub use reconciler::{CleanupStats, Reconciler};
pub use transcode::{FfmpegTranscoder, Transcoder};
