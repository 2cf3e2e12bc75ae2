//! Extraction backend trait and record assembly.
//!
//! The `ExtractionBackend` trait abstracts over whatever turns a block of
//! text into structured fields. Implementations:
//! - `ChatBackend`: external LLM with structured JSON output
//! - `HeuristicBackend`: deterministic `key: value` parsing, no network

use std::collections::BTreeMap;

use futures::future::BoxFuture;
use quotediff_core::schema::{resolve_label, Label};
use quotediff_core::{Error, ExtractionSchema, Field, FieldValue, Record, Result};
use quotediff_ingest::{is_placeholder, Block};
use serde::{Deserialize, Serialize};

/// Backend answer for one block, before typing and normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub name: Option<String>,
    pub section: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<Field, String>,
}

impl RawRecord {
    /// Read a flat JSON object. Keys may be schema keys (`storage`), or
    /// document labels (`"Storage Information"`); unknown keys are ignored.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::Backend(format!("expected a JSON object, got: {}", value)))?;

        let mut raw = RawRecord::default();
        for (key, v) in object {
            let text = match v {
                serde_json::Value::String(s) => s.trim().to_string(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => (if *b { "yes" } else { "no" }).to_string(),
                _ => continue,
            };
            let label = Field::from_key(key)
                .map(Label::Field)
                .or_else(|| resolve_label(key));
            match label {
                Some(Label::Name) => raw.name = Some(text),
                Some(Label::Section) => raw.section = Some(text),
                Some(Label::Field(field)) => {
                    raw.fields.insert(field, text);
                }
                None => {}
            }
        }
        Ok(raw)
    }
}

/// Trait for extraction backends. Calls for different blocks are
/// independent and may run concurrently.
pub trait ExtractionBackend: Send + Sync {
    /// Extract one block against the expected schema.
    fn extract<'a>(
        &'a self,
        block: &'a Block,
        schema: &'a ExtractionSchema,
    ) -> BoxFuture<'a, Result<RawRecord>>;

    /// Short identifier for logs.
    fn name(&self) -> &str;
}

/// Turn a backend answer into a record.
///
/// Name is required. The section comes from the block's heading, falling
/// back to what the backend reported. Placeholder values ("N/A") and fields
/// outside the schema are dropped.
pub fn assemble(block: &Block, raw: RawRecord, schema: &ExtractionSchema) -> Result<Record> {
    let name = raw
        .name
        .filter(|n| !is_placeholder(n))
        .ok_or_else(|| Error::Extraction {
            block: block.index,
            reason: "no line-item name".into(),
        })?;

    let section = block
        .section
        .clone()
        .or(raw.section.filter(|s| !is_placeholder(s)))
        .ok_or_else(|| Error::Extraction {
            block: block.index,
            reason: format!("no section for {:?}", name),
        })?;

    let mut record = Record::new(name, section, block.index);
    for (field, display) in raw.fields {
        if schema.contains(field) && !is_placeholder(&display) {
            record.fields.insert(field, FieldValue::raw(display));
        }
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(section: Option<&str>) -> Block {
        Block {
            index: 4,
            page: 0,
            section: section.map(String::from),
            text: String::new(),
        }
    }

    #[test]
    fn test_from_json_accepts_keys_and_labels() {
        let json = serde_json::json!({
            "System Name": "S4 PRD",
            "ram": "512 GB",
            "No. of add HANA nodes": 2,
            "DR": true,
            "Colour": "blue",
        });
        let raw = RawRecord::from_json(&json).unwrap();
        assert_eq!(raw.name.as_deref(), Some("S4 PRD"));
        assert_eq!(raw.fields.get(&Field::Ram).map(String::as_str), Some("512 GB"));
        assert_eq!(raw.fields.get(&Field::HanaNodes).map(String::as_str), Some("2"));
        assert_eq!(raw.fields.get(&Field::Dr).map(String::as_str), Some("yes"));
        assert_eq!(raw.fields.len(), 3);
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(RawRecord::from_json(&serde_json::json!(["a"])).is_err());
    }

    #[test]
    fn test_assemble_prefers_block_section() {
        let mut raw = RawRecord {
            name: Some("Backup".into()),
            section: Some("Elsewhere".into()),
            ..Default::default()
        };
        raw.fields.insert(Field::Storage, "2 TB".into());
        raw.fields.insert(Field::Os, "N/A".into());

        let record = assemble(&block(Some("Others IaaS")), raw, &ExtractionSchema::default()).unwrap();
        assert_eq!(record.section, "Others IaaS");
        assert_eq!(record.block_index, 4);
        assert!(record.get(Field::Os).is_none());
        assert_eq!(record.get(Field::Storage).unwrap().display, "2 TB");
    }

    #[test]
    fn test_assemble_requires_name_and_section() {
        let raw = RawRecord {
            name: Some("N/A".into()),
            ..Default::default()
        };
        let err = assemble(&block(Some("S")), raw, &ExtractionSchema::default()).unwrap_err();
        assert!(matches!(err, Error::Extraction { block: 4, .. }));

        let raw = RawRecord {
            name: Some("Backup".into()),
            ..Default::default()
        };
        assert!(assemble(&block(None), raw, &ExtractionSchema::default()).is_err());
    }
}
