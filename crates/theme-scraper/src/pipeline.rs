//! One ingestion cycle: reconcile, then extract and process theme by theme.

use crate::extractor::{ExtractionStats, Extractor};
use crate::processor::Processor;
use crate::reconciler::{CleanupStats, Reconciler};
use anyhow::{Context, Result};
use tracing::{error, info};

/// Statistics for one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub cleanup: CleanupStats,
    pub extraction: ExtractionStats,
    /// Themes yielded by the extractor
    pub extracted: usize,
    /// Themes written to the catalog
    pub persisted: usize,
    /// Themes that failed processing
    pub skipped: usize,
    /// Extraction stopped early on an error
    pub extraction_aborted: bool,
}

/// The three components of a cycle, run strictly in sequence
pub struct Pipeline {
    reconciler: Reconciler,
    extractor: Extractor,
    processor: Processor,
}

impl Pipeline {
    pub fn new(reconciler: Reconciler, extractor: Extractor, processor: Processor) -> Self {
        Self {
            reconciler,
            extractor,
            processor,
        }
    }

    /// Run one cycle
    ///
    /// Reconciliation failures are returned. An extraction error ends the
    /// cycle early but is only logged, processing failures skip the theme.
    pub async fn run_cycle(&mut self) -> Result<CycleStats> {
        info!("Starting cycle");

        let cleanup = self.reconciler.run().context("Reconciliation failed")?;
        let mut stats = CycleStats {
            cleanup,
            ..Default::default()
        };

        let mut extraction = self.extractor.run();
        loop {
            match extraction.next().await {
                Ok(Some((anime, theme))) => {
                    stats.extracted += 1;
                    if self.processor.run(anime, theme).await.is_persisted() {
                        stats.persisted += 1;
                    } else {
                        stats.skipped += 1;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!(error = %format!("{:#}", e), "Extraction aborted");
                    stats.extraction_aborted = true;
                    break;
                }
            }
        }
        stats.extraction = extraction.stats().clone();

        info!(
            cleaned = stats.cleanup.total(),
            pages = stats.extraction.pages_fetched,
            duplicates = stats.extraction.duplicates_skipped,
            lookups = stats.extraction.lookups,
            extracted = stats.extracted,
            persisted = stats.persisted,
            skipped = stats.skipped,
            "Cycle finished"
        );

        Ok(stats)
    }
}
