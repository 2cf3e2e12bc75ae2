//! Comparator — runs both documents through the pipeline.

use std::sync::Arc;
use std::time::Instant;

use quotediff_core::{
    DiffConfig, Document, Error, RawDocument, Record, Result, UnresolvedBlock,
};
use quotediff_diff::{compute_delta, match_records, text_similarity, DeltaReport};
use quotediff_extract::{BlockOutcome, ExtractionBackend, ExtractionPool};
use quotediff_ingest::{scan_metadata, Block, Normalizer, Segmenter};
use tracing::{debug, info, warn};

use crate::types::*;

/// Compares two versions of a quote.
///
/// Segmentation, normalization, matching and delta computation are pure;
/// extraction of both documents shares one bounded worker pool under a
/// single run deadline.
#[derive(Clone)]
pub struct Comparator {
    config: DiffConfig,
    segmenter: Segmenter,
    normalizer: Normalizer,
    pool: ExtractionPool,
}

impl Comparator {
    pub fn new(config: DiffConfig, backend: Arc<dyn ExtractionBackend>) -> Self {
        let pool = ExtractionPool::from_config(backend, &config);
        let normalizer = Normalizer::new(&config.synonyms);
        info!(
            "Comparator initialized: backend={}, workers={}, threshold={}",
            pool.backend_name(),
            config.worker_count,
            config.similarity_threshold
        );
        Self {
            config,
            segmenter: Segmenter::default(),
            normalizer,
            pool,
        }
    }

    pub fn config(&self) -> &DiffConfig {
        &self.config
    }

    /// Compare two documents and return the report.
    pub async fn compare(&self, old: &RawDocument, new: &RawDocument) -> Result<DeltaReport> {
        Ok(self.run(old, new).await?.report)
    }

    /// Compare two documents and return the report with run statistics.
    ///
    /// Fails only when neither document yields any block.
    pub async fn run(&self, old: &RawDocument, new: &RawDocument) -> Result<ComparisonRun> {
        let started = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Run {}: comparing {} -> {}", run_id, old.version, new.version);

        let old_blocks = self.segment(old);
        let new_blocks = self.segment(new);
        if old_blocks.is_none() && new_blocks.is_none() {
            return Err(Error::NothingToCompare(format!(
                "no line items found in {} or {}",
                old.version, new.version
            )));
        }
        let old_blocks = old_blocks.unwrap_or_default();
        let new_blocks = new_blocks.unwrap_or_default();
        let mut old_stats = DocumentStats {
            blocks: old_blocks.len(),
            segmentation_failed: old_blocks.is_empty(),
            ..Default::default()
        };
        let mut new_stats = DocumentStats {
            blocks: new_blocks.len(),
            segmentation_failed: new_blocks.is_empty(),
            ..Default::default()
        };
        log_stage(Stage::Segment, started);

        let extract_started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.config.run_timeout();
        let (old_outcomes, new_outcomes) = tokio::join!(
            self.pool.extract_blocks(&old_blocks, deadline),
            self.pool.extract_blocks(&new_blocks, deadline)
        );
        let extract_ms = extract_started.elapsed().as_millis() as u64;
        log_stage(Stage::Extract, extract_started);

        let normalize_started = Instant::now();
        let old_doc = self.build_document(old, old_outcomes, &mut old_stats);
        let new_doc = self.build_document(new, new_outcomes, &mut new_stats);
        log_stage(Stage::Normalize, normalize_started);

        let match_started = Instant::now();
        let old_records: Vec<Record> = old_doc.records().cloned().collect();
        let new_records: Vec<Record> = new_doc.records().cloned().collect();
        let correspondence = match_records(&old_records, &new_records, &self.config);
        log_stage(Stage::Match, match_started);

        let delta_started = Instant::now();
        let mut report = compute_delta(&old_doc, &new_doc, &correspondence, &self.config);
        report.run_id = Some(run_id.clone());
        report.generated_at = Some(chrono::Utc::now());
        report.text_similarity = Some(text_similarity(&old.full_text(), &new.full_text()));
        log_stage(Stage::Delta, delta_started);

        let stats = RunStats {
            run_id,
            backend: self.pool.backend_name().to_string(),
            old: old_stats,
            new: new_stats,
            extract_ms,
            total_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            "Run {} done in {}ms: {} entries, {} unresolved",
            stats.run_id,
            stats.total_ms,
            report.entries().count(),
            report.summary.unresolved
        );
        Ok(ComparisonRun { report, stats })
    }

    /// Segment one document; a document with no blocks is treated as empty.
    fn segment(&self, raw: &RawDocument) -> Option<Vec<Block>> {
        match self.segmenter.segment(&raw.pages) {
            Ok(blocks) => Some(blocks),
            Err(e) => {
                warn!("{}: {}; treating as empty", raw.version, e);
                None
            }
        }
    }

    /// Collect extraction outcomes (already in block order) into a
    /// normalized document.
    fn build_document(
        &self,
        raw: &RawDocument,
        outcomes: Vec<BlockOutcome>,
        stats: &mut DocumentStats,
    ) -> Document {
        let mut records = Vec::new();
        let mut unresolved: Vec<UnresolvedBlock> = Vec::new();
        for outcome in outcomes {
            match outcome {
                BlockOutcome::Resolved(record) => records.push(self.normalizer.normalize(&record)),
                BlockOutcome::Unresolved(block) => unresolved.push(block),
            }
        }
        stats.resolved = records.len();
        stats.unresolved = unresolved.len();

        let issues: usize = records.iter().map(|r| r.issues.len()).sum();
        if issues > 0 {
            warn!("{}: {} field values failed type checks", raw.version, issues);
        }

        Document::from_records(raw.version.clone(), scan_metadata(&raw.pages), records, unresolved)
    }
}

fn log_stage(stage: Stage, started: Instant) {
    debug!("Stage {:?} took {:?}", stage, started.elapsed());
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotediff_core::UnresolvedReason;
    use quotediff_extract::HeuristicBackend;

    fn comparator() -> Comparator {
        Comparator::new(DiffConfig::default(), Arc::new(HeuristicBackend::new()))
    }

    #[tokio::test]
    async fn test_both_empty_is_fatal() {
        let old = RawDocument::from_text("v1", "Just prose.");
        let new = RawDocument::from_text("v2", "More prose.");
        let err = comparator().compare(&old, &new).await.unwrap_err();
        assert!(matches!(err, Error::NothingToCompare(_)));
    }

    #[tokio::test]
    async fn test_one_empty_side_reports_everything_added() {
        let old = RawDocument::from_text("v1", "Nothing here.");
        let new = RawDocument::from_text(
            "v2",
            "# Domestic S4HANA\nSystem Name: S4 PRD\nRAM: 1 TB\n\nSystem Name: S4 QAS\nRAM: 512 GB",
        );
        let run = comparator().run(&old, &new).await.unwrap();
        assert!(run.stats.old.segmentation_failed);
        assert_eq!(run.stats.new.resolved, 2);
        assert_eq!(run.report.summary.added, 2);
        assert!(run.report.run_id.is_some());
        assert!(run.report.generated_at.is_some());
    }

    #[tokio::test]
    async fn test_unnamed_block_is_surfaced() {
        let old = RawDocument::from_text("v1", "# Others IaaS\nSystem Name: Backup\nStorage: 2 TB");
        let new = RawDocument::from_text(
            "v2",
            "# Others IaaS\nSystem Name: Backup\nStorage: 2 TB\n\nStorage: 4 TB\nOS: SLES",
        );
        let report = comparator().compare(&old, &new).await.unwrap();
        assert_eq!(report.unresolved.len(), 1);
        assert_eq!(report.unresolved[0].block.reason, UnresolvedReason::MissingRequired);
        assert_eq!(report.summary.unchanged, 1);
    }
}
