//! Runtime types.

use quotediff_diff::DeltaReport;
use serde::Serialize;

/// Pipeline stage, for logs and timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Page text → blocks.
    Segment,
    /// Blocks → records through the backend pool.
    Extract,
    /// Canonical values and match tokens.
    Normalize,
    /// Correspondence between versions.
    Match,
    /// Field deltas and report assembly.
    Delta,
}

/// Per-document extraction counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentStats {
    pub blocks: usize,
    pub resolved: usize,
    pub unresolved: usize,
    /// Segmentation found nothing; the document was treated as empty.
    #[serde(rename = "segmentationFailed")]
    pub segmentation_failed: bool,
}

/// Run statistics.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    #[serde(rename = "runId")]
    pub run_id: String,
    pub backend: String,
    pub old: DocumentStats,
    pub new: DocumentStats,
    #[serde(rename = "extractMs")]
    pub extract_ms: u64,
    #[serde(rename = "totalMs")]
    pub total_ms: u64,
}

/// Result of one comparison run.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonRun {
    pub report: DeltaReport,
    pub stats: RunStats,
}
