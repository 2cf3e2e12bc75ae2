//! Correspondence and delta report types.

use chrono::{DateTime, Utc};
use quotediff_core::{Field, Record, UnresolvedBlock};
use serde::{Deserialize, Serialize};

/// A one-to-one link between an old and a new record, by position in each
/// document's record order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedPair {
    pub old: usize,
    pub new: usize,
    pub score: f64,
    /// Records sit in different sections.
    pub moved: bool,
}

/// Matcher output. Every old index is in exactly one of `pairs` or
/// `unmatched_old`, and likewise for new indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    /// Sorted by old index.
    pub pairs: Vec<MatchedPair>,
    pub unmatched_old: Vec<usize>,
    pub unmatched_new: Vec<usize>,
}

impl Correspondence {
    pub fn partner_of_new(&self, new: usize) -> Option<&MatchedPair> {
        self.pairs.iter().find(|p| p.new == new)
    }

    /// The same correspondence seen from the other side.
    pub fn transposed(&self) -> Correspondence {
        let mut pairs: Vec<MatchedPair> = self
            .pairs
            .iter()
            .map(|p| MatchedPair {
                old: p.new,
                new: p.old,
                score: p.score,
                moved: p.moved,
            })
            .collect();
        pairs.sort_by_key(|p| p.old);
        Correspondence {
            pairs,
            unmatched_old: self.unmatched_new.clone(),
            unmatched_new: self.unmatched_old.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Changed,
    Added,
    Removed,
}

/// One differing field of a matched pair. Values are display strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDelta {
    pub field: Field,
    pub old: Option<String>,
    pub new: Option<String>,
    pub kind: ChangeKind,
    /// One side failed its type or unit check; compared as text.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unverified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DeltaEntry {
    Matched {
        old: Box<Record>,
        new: Box<Record>,
        renamed: bool,
        moved: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        previous_section: Option<String>,
        changes: Vec<FieldDelta>,
    },
    Added {
        record: Box<Record>,
    },
    Removed {
        record: Box<Record>,
    },
}

impl DeltaEntry {
    /// Display name of the record as it now reads (old name for removals).
    pub fn name(&self) -> &str {
        match self {
            DeltaEntry::Matched { new, .. } => &new.name,
            DeltaEntry::Added { record } | DeltaEntry::Removed { record } => &record.name,
        }
    }
}

/// Entries for one section, plus how many matched records in it did not
/// change at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionDelta {
    pub name: String,
    pub entries: Vec<DeltaEntry>,
    pub unchanged: usize,
}

/// A header attribute that differs between versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataChange {
    pub field: String,
    pub old: Option<String>,
    pub new: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Old,
    New,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedEntry {
    pub side: Side,
    #[serde(flatten)]
    pub block: UnresolvedBlock,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaSummary {
    pub matched: usize,
    pub unchanged: usize,
    pub changed: usize,
    pub moved: usize,
    pub renamed: usize,
    pub added: usize,
    pub removed: usize,
    pub unresolved: usize,
    pub unverified_fields: usize,
}

/// Full comparison result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    pub old_version: String,
    pub new_version: String,
    pub metadata_changes: Vec<MetadataChange>,
    /// Word-level similarity of the full texts, in percent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_similarity: Option<f64>,
    pub sections: Vec<SectionDelta>,
    pub sections_removed: Vec<String>,
    pub sections_added: Vec<String>,
    pub unresolved: Vec<UnresolvedEntry>,
    pub summary: DeltaSummary,
}

impl DeltaReport {
    pub fn entries(&self) -> impl Iterator<Item = &DeltaEntry> {
        self.sections.iter().flat_map(|s| s.entries.iter())
    }

    pub fn section(&self, name: &str) -> Option<&SectionDelta> {
        self.sections.iter().find(|s| s.name == name)
    }
}
