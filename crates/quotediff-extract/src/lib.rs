//! quotediff extract — field extraction through pluggable backends.
//!
//! Blocks from the segmenter are sent to an [`ExtractionBackend`] (an LLM
//! provider or the label heuristic) through a bounded [`ExtractionPool`].

pub mod backend;
pub mod config;
pub mod heuristic;
pub mod pool;
pub mod providers;
pub mod types;

use std::sync::Arc;

use quotediff_core::DiffConfig;

pub use backend::{assemble, ExtractionBackend, RawRecord};
pub use config::{LlmConfig, ResolvedProvider};
pub use heuristic::HeuristicBackend;
pub use pool::{BlockOutcome, ExtractionPool, RetryPolicy};
pub use providers::ChatBackend;
pub use types::*;

/// Create the best available extraction backend.
///
/// Uses the configured LLM provider when a key is available, falls back to
/// the label heuristic otherwise.
pub fn create_backend(llm: &LlmConfig, config: &DiffConfig) -> Arc<dyn ExtractionBackend> {
    match ChatBackend::from_config(llm, config) {
        Some(backend) => Arc::new(backend),
        None => {
            tracing::warn!("No LLM provider configured. Falling back to heuristic extraction.");
            Arc::new(HeuristicBackend::new())
        }
    }
}
