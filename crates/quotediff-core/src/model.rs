//! Documents, sections and line-item records.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::schema::Field;

/// One version of a quote as handed over by the text-extraction collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    /// Caller-chosen label, e.g. the file name.
    pub version: String,
    /// Page texts in reading order.
    pub pages: Vec<String>,
}

impl RawDocument {
    pub fn new(version: impl Into<String>, pages: Vec<String>) -> Self {
        Self {
            version: version.into(),
            pages,
        }
    }

    /// Build from a single text, splitting pages on form feeds.
    pub fn from_text(version: impl Into<String>, text: &str) -> Self {
        let pages = text.split('\x0c').map(|p| p.to_string()).collect();
        Self::new(version, pages)
    }

    pub fn full_text(&self) -> String {
        self.pages.join("\n\n")
    }
}

/// Canonical, comparable form of a field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Canonical {
    Text(String),
    Number(f64),
    Count(u64),
    Flag(bool),
}

impl Canonical {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Canonical::Number(n) => Some(*n),
            Canonical::Count(c) => Some(*c as f64),
            _ => None,
        }
    }
}

/// A field value as extracted, plus its canonical form once normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub display: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical: Option<Canonical>,
}

impl FieldValue {
    pub fn raw(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            canonical: None,
        }
    }
}

/// A field whose value did not meet its type or unit expectation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: Field,
    pub value: String,
    pub reason: String,
}

/// One infrastructure line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Display name as written in the document.
    pub name: String,
    /// Display name of the owning section.
    pub section: String,
    /// Position of the source block in the document.
    pub block_index: usize,
    #[serde(default)]
    pub fields: BTreeMap<Field, FieldValue>,
    /// Canonical name token, used only for matching.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub match_name: String,
    /// Canonical section token, used only for matching.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub match_section: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<FieldIssue>,
}

impl Record {
    pub fn new(name: impl Into<String>, section: impl Into<String>, block_index: usize) -> Self {
        Self {
            name: name.into(),
            section: section.into(),
            block_index,
            fields: BTreeMap::new(),
            match_name: String::new(),
            match_section: String::new(),
            issues: Vec::new(),
        }
    }

    /// Builder-style helper to set a raw display value.
    pub fn with(mut self, field: Field, display: impl Into<String>) -> Self {
        self.fields.insert(field, FieldValue::raw(display));
        self
    }

    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    pub fn canonical(&self, field: Field) -> Option<&Canonical> {
        self.fields.get(&field).and_then(|v| v.canonical.as_ref())
    }

    pub fn has_issue(&self, field: Field) -> bool {
        self.issues.iter().any(|i| i.field == field)
    }
}

/// Document-level header data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub page_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_months: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_center: Option<String>,
}

/// A named grouping of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub records: Vec<Record>,
}

/// Why a block produced no record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// Backend kept failing after all retries.
    BackendFailed,
    /// Per-call timeout hit on the final attempt.
    TimedOut,
    /// Run deadline elapsed before the block finished.
    Cancelled,
    /// Backend answered but name or section could not be determined.
    MissingRequired,
}

/// A block that could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedBlock {
    pub block_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub reason: UnresolvedReason,
    pub detail: String,
    pub text: String,
}

/// One extracted version of a quote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub version: String,
    pub metadata: DocumentMetadata,
    pub sections: Vec<Section>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<UnresolvedBlock>,
}

impl Document {
    /// Group consecutive records of the same section. A heading that comes
    /// back later opens a new section, so `records()` stays in block order.
    pub fn from_records(
        version: impl Into<String>,
        metadata: DocumentMetadata,
        records: Vec<Record>,
        unresolved: Vec<UnresolvedBlock>,
    ) -> Self {
        let mut sections: Vec<Section> = Vec::new();
        for record in records {
            match sections.last_mut().filter(|s| s.name == record.section) {
                Some(section) => section.records.push(record),
                None => sections.push(Section {
                    name: record.section.clone(),
                    records: vec![record],
                }),
            }
        }
        Self {
            version: version.into(),
            metadata,
            sections,
            unresolved,
        }
    }

    /// All records in document order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.sections.iter().flat_map(|s| s.records.iter())
    }

    pub fn record_count(&self) -> usize {
        self.sections.iter().map(|s| s.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_records_groups_by_section() {
        let records = vec![
            Record::new("PRD", "Domestic S4HANA", 0),
            Record::new("QAS", "Domestic S4HANA", 1),
            Record::new("Storage", "Others IaaS", 2),
        ];
        let doc = Document::from_records("v1", DocumentMetadata::default(), records, Vec::new());
        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.sections[0].name, "Domestic S4HANA");
        assert_eq!(doc.sections[0].records.len(), 2);
        assert_eq!(doc.record_count(), 3);
    }

    #[test]
    fn test_repeated_heading_keeps_block_order() {
        let records = vec![
            Record::new("PRD", "Domestic S4HANA", 0),
            Record::new("Storage", "Others IaaS", 1),
            Record::new("QAS", "Domestic S4HANA", 2),
        ];
        let doc = Document::from_records("v1", DocumentMetadata::default(), records, Vec::new());
        assert_eq!(doc.sections.len(), 3);
        assert_eq!(doc.sections[2].name, "Domestic S4HANA");
        let order: Vec<_> = doc.records().map(|r| r.block_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_raw_document_pages() {
        let raw = RawDocument::from_text("v1", "page one\x0cpage two");
        assert_eq!(raw.pages.len(), 2);
        assert_eq!(raw.full_text(), "page one\n\npage two");
    }

    #[test]
    fn test_record_serializes_field_keys() {
        let record = Record::new("PRD", "Domestic", 0).with(Field::TierName, "M");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["fields"]["tier_name"]["display"], "M");
    }
}
