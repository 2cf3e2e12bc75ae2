//! Heuristic backend — reads `key: value` lines directly.
//!
//! Used when no LLM provider is configured, and as the deterministic
//! backend in tests.

use futures::future::BoxFuture;
use quotediff_core::schema::Label;
use quotediff_core::{ExtractionSchema, Result};
use quotediff_ingest::{parse_field_line, Block};
use tracing::debug;

use crate::backend::{ExtractionBackend, RawRecord};

/// Deterministic label-matching backend.
#[derive(Debug, Clone, Default)]
pub struct HeuristicBackend;

impl HeuristicBackend {
    pub fn new() -> Self {
        Self
    }

    /// Parse a block synchronously. The first occurrence of a key wins; a
    /// leading non-field line stands in for a missing name.
    pub fn parse(block: &Block) -> RawRecord {
        let mut raw = RawRecord::default();
        let mut leading_text: Option<&str> = None;

        for line in block.text.lines() {
            let Some(field) = parse_field_line(line) else {
                if raw.fields.is_empty() && raw.name.is_none() && leading_text.is_none() {
                    leading_text = Some(line.trim());
                }
                continue;
            };
            let value = field.value.to_string();
            match field.label {
                Label::Name => {
                    raw.name.get_or_insert(value);
                }
                Label::Section => {
                    raw.section.get_or_insert(value);
                }
                Label::Field(f) => {
                    raw.fields.entry(f).or_insert(value);
                }
            }
        }

        if raw.name.is_none() {
            raw.name = leading_text.filter(|t| !t.is_empty()).map(String::from);
        }
        debug!("Heuristic parse of block {}: {} fields", block.index, raw.fields.len());
        raw
    }
}

impl ExtractionBackend for HeuristicBackend {
    fn extract<'a>(
        &'a self,
        block: &'a Block,
        _schema: &'a ExtractionSchema,
    ) -> BoxFuture<'a, Result<RawRecord>> {
        Box::pin(async move { Ok(Self::parse(block)) })
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}
