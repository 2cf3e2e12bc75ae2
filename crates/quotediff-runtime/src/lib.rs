//! quotediff runtime — orchestrates a comparison run.
//!
//! Segment → extract (shared bounded pool) → normalize → match → delta.

pub mod orchestrator;
pub mod types;

pub use orchestrator::Comparator;
pub use types::*;
