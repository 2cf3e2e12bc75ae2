//! quotediff diff — record matching, field deltas and report rendering.
//!
//! Everything here is a pure function of already-normalized documents.

pub mod delta;
pub mod matcher;
pub mod report;
pub mod similarity;
pub mod types;

pub use delta::{compute_delta, diff_documents, field_deltas, metadata_changes};
pub use matcher::{match_records, score_pair};
pub use report::render_markdown;
pub use similarity::text_similarity;
pub use types::*;
