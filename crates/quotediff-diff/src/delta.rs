//! Field-level deltas and report assembly.

use quotediff_core::{Canonical, DiffConfig, Document, DocumentMetadata, Field, FieldKind, Record};
use quotediff_ingest::Normalizer;
use tracing::info;

use crate::matcher::match_records;
use crate::types::{
    ChangeKind, Correspondence, DeltaEntry, DeltaReport, DeltaSummary, FieldDelta,
    MetadataChange, SectionDelta, Side, UnresolvedEntry,
};

/// Default comparison tolerance for a field, in canonical units.
pub fn default_epsilon(field: Field) -> f64 {
    match field.kind() {
        FieldKind::Count | FieldKind::Ordinal => 0.0,
        FieldKind::Capacity => 0.01,
        FieldKind::Number | FieldKind::Percent => 1e-6,
        FieldKind::Text | FieldKind::Flag => 0.0,
    }
}

fn epsilon(field: Field, config: &DiffConfig) -> f64 {
    config
        .field_epsilon_overrides
        .get(&field)
        .copied()
        .unwrap_or_else(|| default_epsilon(field))
}

fn same_value(a: &Canonical, b: &Canonical, eps: f64) -> bool {
    match (a, b) {
        (Canonical::Text(x), Canonical::Text(y)) => x == y,
        (Canonical::Flag(x), Canonical::Flag(y)) => x == y,
        (Canonical::Count(x), Canonical::Count(y)) if eps == 0.0 => x == y,
        _ => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => (x - y).abs() <= eps,
            _ => false,
        },
    }
}

fn fold(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Compare every schema field of a matched pair, in schema order.
pub fn field_deltas(old: &Record, new: &Record, config: &DiffConfig) -> Vec<FieldDelta> {
    let mut deltas = Vec::new();
    for field in Field::ALL {
        let (o, n) = (old.get(field), new.get(field));
        let delta = match (o, n) {
            (None, None) => continue,
            (Some(o), None) => FieldDelta {
                field,
                old: Some(o.display.clone()),
                new: None,
                kind: ChangeKind::Removed,
                unverified: old.has_issue(field),
            },
            (None, Some(n)) => FieldDelta {
                field,
                old: None,
                new: Some(n.display.clone()),
                kind: ChangeKind::Added,
                unverified: new.has_issue(field),
            },
            (Some(o), Some(n)) => {
                let equal = match (&o.canonical, &n.canonical) {
                    (Some(a), Some(b)) => same_value(a, b, epsilon(field, config)),
                    _ => fold(&o.display) == fold(&n.display),
                };
                if equal {
                    continue;
                }
                FieldDelta {
                    field,
                    old: Some(o.display.clone()),
                    new: Some(n.display.clone()),
                    kind: ChangeKind::Changed,
                    unverified: o.canonical.is_none() || n.canonical.is_none(),
                }
            }
        };
        deltas.push(delta);
    }
    deltas
}

/// Header attributes that differ between the two versions.
pub fn metadata_changes(old: &DocumentMetadata, new: &DocumentMetadata) -> Vec<MetadataChange> {
    fn opt<T: ToString>(v: &Option<T>) -> Option<String> {
        v.as_ref().map(|v| v.to_string())
    }

    let rows = [
        ("date", opt(&old.date), opt(&new.date)),
        ("page_count", Some(old.page_count.to_string()), Some(new.page_count.to_string())),
        ("version_label", opt(&old.version_label), opt(&new.version_label)),
        ("currency", opt(&old.currency), opt(&new.currency)),
        ("customer", opt(&old.customer), opt(&new.customer)),
        ("duration_months", opt(&old.duration_months), opt(&new.duration_months)),
        ("country", opt(&old.country), opt(&new.country)),
        ("data_center", opt(&old.data_center), opt(&new.data_center)),
    ];

    rows.into_iter()
        .filter(|(_, o, n)| o != n)
        .map(|(field, old, new)| MetadataChange {
            field: field.to_string(),
            old,
            new,
        })
        .collect()
}

/// Report sections keyed by canonical section token, in first-seen order.
struct SectionTable {
    normalizer: Normalizer,
    keys: Vec<String>,
    sections: Vec<SectionDelta>,
}

impl SectionTable {
    fn new(normalizer: Normalizer) -> Self {
        Self {
            normalizer,
            keys: Vec::new(),
            sections: Vec::new(),
        }
    }

    fn get(&mut self, display: &str) -> &mut SectionDelta {
        let key = self.normalizer.canonical_name(display);
        let pos = match self.keys.iter().position(|k| *k == key) {
            Some(pos) => pos,
            None => {
                self.keys.push(key);
                self.sections.push(SectionDelta {
                    name: display.to_string(),
                    entries: Vec::new(),
                    unchanged: 0,
                });
                self.keys.len() - 1
            }
        };
        &mut self.sections[pos]
    }
}

/// Build the report for two normalized documents and their correspondence.
///
/// `correspondence` indexes into each document's `records()` order.
pub fn compute_delta(
    old_doc: &Document,
    new_doc: &Document,
    correspondence: &Correspondence,
    config: &DiffConfig,
) -> DeltaReport {
    let normalizer = Normalizer::new(&config.synonyms);
    let old: Vec<&Record> = old_doc.records().collect();
    let new: Vec<&Record> = new_doc.records().collect();
    let mut summary = DeltaSummary::default();

    // New document's sections first so report order follows the new version.
    let mut table = SectionTable::new(normalizer.clone());
    for section in &new_doc.sections {
        table.get(&section.name);
    }

    for (j, record) in new.iter().enumerate() {
        let Some(pair) = correspondence.partner_of_new(j) else {
            summary.added += 1;
            table.get(&record.section).entries.push(DeltaEntry::Added {
                record: Box::new((*record).clone()),
            });
            continue;
        };

        let before = old[pair.old];
        let changes = field_deltas(before, record, config);
        let renamed = fold(&before.name) != fold(&record.name);
        summary.matched += 1;
        summary.unverified_fields += changes.iter().filter(|c| c.unverified).count();

        if changes.is_empty() && !renamed && !pair.moved {
            summary.unchanged += 1;
            table.get(&record.section).unchanged += 1;
            continue;
        }
        if !changes.is_empty() {
            summary.changed += 1;
        }
        if pair.moved {
            summary.moved += 1;
        }
        if renamed {
            summary.renamed += 1;
        }
        table.get(&record.section).entries.push(DeltaEntry::Matched {
            old: Box::new(before.clone()),
            new: Box::new((*record).clone()),
            renamed,
            moved: pair.moved,
            previous_section: pair.moved.then(|| before.section.clone()),
            changes,
        });
    }

    for &i in &correspondence.unmatched_old {
        let record = old[i];
        summary.removed += 1;
        table.get(&record.section).entries.push(DeltaEntry::Removed {
            record: Box::new(record.clone()),
        });
    }

    // A section split by a repeated heading is listed once.
    let section_keys = |doc: &Document| -> Vec<(String, String)> {
        let mut keys: Vec<(String, String)> = Vec::new();
        for s in &doc.sections {
            let key = normalizer.canonical_name(&s.name);
            if !keys.iter().any(|(k, _)| *k == key) {
                keys.push((key, s.name.clone()));
            }
        }
        keys
    };
    let old_sections = section_keys(old_doc);
    let new_sections = section_keys(new_doc);
    let sections_removed: Vec<String> = old_sections
        .iter()
        .filter(|(k, _)| !new_sections.iter().any(|(nk, _)| nk == k))
        .map(|(_, name)| name.clone())
        .collect();
    let sections_added: Vec<String> = new_sections
        .iter()
        .filter(|(k, _)| !old_sections.iter().any(|(ok, _)| ok == k))
        .map(|(_, name)| name.clone())
        .collect();

    let unresolved: Vec<UnresolvedEntry> = old_doc
        .unresolved
        .iter()
        .map(|b| UnresolvedEntry {
            side: Side::Old,
            block: b.clone(),
        })
        .chain(new_doc.unresolved.iter().map(|b| UnresolvedEntry {
            side: Side::New,
            block: b.clone(),
        }))
        .collect();
    summary.unresolved = unresolved.len();

    info!(
        "Delta {} -> {}: {} matched ({} unchanged, {} changed, {} moved), {} added, {} removed, {} unresolved",
        old_doc.version,
        new_doc.version,
        summary.matched,
        summary.unchanged,
        summary.changed,
        summary.moved,
        summary.added,
        summary.removed,
        summary.unresolved
    );

    DeltaReport {
        run_id: None,
        generated_at: None,
        old_version: old_doc.version.clone(),
        new_version: new_doc.version.clone(),
        metadata_changes: metadata_changes(&old_doc.metadata, &new_doc.metadata),
        text_similarity: None,
        sections: table.sections,
        sections_removed,
        sections_added,
        unresolved,
        summary,
    }
}

/// Match and diff two normalized documents.
pub fn diff_documents(old_doc: &Document, new_doc: &Document, config: &DiffConfig) -> DeltaReport {
    let old: Vec<Record> = old_doc.records().cloned().collect();
    let new: Vec<Record> = new_doc.records().cloned().collect();
    let correspondence = match_records(&old, &new, config);
    compute_delta(old_doc, new_doc, &correspondence, config)
}
