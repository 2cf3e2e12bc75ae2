//! Markdown rendering of a delta report.

use std::fmt::Write;

use quotediff_core::Record;

use crate::types::{ChangeKind, DeltaEntry, DeltaReport, FieldDelta, Side};

fn value(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or("—")
}

fn record_summary(record: &Record) -> String {
    let fields: Vec<String> = record
        .fields
        .iter()
        .map(|(field, v)| format!("{}: {}", field.label(), v.display))
        .collect();
    if fields.is_empty() {
        record.name.clone()
    } else {
        format!("{} ({})", record.name, fields.join(", "))
    }
}

fn change_line(delta: &FieldDelta) -> String {
    let flag = if delta.unverified { " ⚠ unverified" } else { "" };
    match delta.kind {
        ChangeKind::Changed => format!(
            "{}: {} → {}{}",
            delta.field.label(),
            value(&delta.old),
            value(&delta.new),
            flag
        ),
        ChangeKind::Added => format!("{}: added {}{}", delta.field.label(), value(&delta.new), flag),
        ChangeKind::Removed => {
            format!("{}: removed (was {}){}", delta.field.label(), value(&delta.old), flag)
        }
    }
}

fn render_entry(out: &mut String, entry: &DeltaEntry) {
    match entry {
        DeltaEntry::Matched {
            old,
            new,
            renamed,
            previous_section,
            changes,
            ..
        } => {
            let mut notes = Vec::new();
            if *renamed {
                notes.push(format!("renamed from \"{}\"", old.name));
            }
            if let Some(section) = previous_section {
                notes.push(format!("moved from {}", section));
            }
            let notes = if notes.is_empty() {
                String::new()
            } else {
                format!(" ({})", notes.join("; "))
            };
            let _ = writeln!(out, "- ~ **{}**{}", new.name, notes);
            for change in changes {
                let _ = writeln!(out, "  - {}", change_line(change));
            }
        }
        DeltaEntry::Added { record } => {
            let _ = writeln!(out, "- + {}", record_summary(record));
        }
        DeltaEntry::Removed { record } => {
            let _ = writeln!(out, "- - {}", record_summary(record));
        }
    }
}

/// Render the report as grouped Markdown: header changes, per-section
/// changes, section moves, items needing review and unchanged areas.
pub fn render_markdown(report: &DeltaReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Delta: {} → {}\n", report.old_version, report.new_version);

    let s = &report.summary;
    let _ = writeln!(
        out,
        "{} matched ({} unchanged, {} changed, {} moved, {} renamed), {} added, {} removed, {} unresolved.\n",
        s.matched, s.unchanged, s.changed, s.moved, s.renamed, s.added, s.removed, s.unresolved
    );

    if !report.metadata_changes.is_empty() || report.text_similarity.is_some() {
        out.push_str("## Header changes\n\n");
        for change in &report.metadata_changes {
            let _ = writeln!(
                out,
                "- {}: {} → {}",
                change.field,
                value(&change.old),
                value(&change.new)
            );
        }
        if let Some(pct) = report.text_similarity {
            let _ = writeln!(out, "- Overall text similarity: {:.1}%", pct);
        }
        out.push('\n');
    }

    for section in report.sections.iter().filter(|s| !s.entries.is_empty()) {
        let _ = writeln!(out, "## {}\n", section.name);
        for entry in &section.entries {
            render_entry(&mut out, entry);
        }
        out.push('\n');
    }

    if !report.sections_removed.is_empty() {
        out.push_str("## Sections removed\n\n");
        for name in &report.sections_removed {
            let _ = writeln!(out, "- {}", name);
        }
        out.push('\n');
    }
    if !report.sections_added.is_empty() {
        out.push_str("## Sections added\n\n");
        for name in &report.sections_added {
            let _ = writeln!(out, "- {}", name);
        }
        out.push('\n');
    }

    let unverified: Vec<(&str, &FieldDelta)> = report
        .entries()
        .filter_map(|e| match e {
            DeltaEntry::Matched { new, changes, .. } => Some((new.name.as_str(), changes)),
            _ => None,
        })
        .flat_map(|(name, changes)| changes.iter().filter(|c| c.unverified).map(move |c| (name, c)))
        .collect();
    if !report.unresolved.is_empty() || !unverified.is_empty() {
        out.push_str("## Needs manual review\n\n");
        for u in &report.unresolved {
            let side = match u.side {
                Side::Old => report.old_version.as_str(),
                Side::New => report.new_version.as_str(),
            };
            let first_line = u.block.text.lines().next().unwrap_or("").trim();
            let _ = writeln!(
                out,
                "- {} block {}: {} ({})",
                side, u.block.block_index, first_line, u.block.detail
            );
        }
        for (name, delta) in unverified {
            let _ = writeln!(out, "- {}: {}", name, change_line(delta));
        }
        out.push('\n');
    }

    let unchanged: Vec<_> = report
        .sections
        .iter()
        .filter(|s| s.entries.is_empty())
        .collect();
    if !unchanged.is_empty() {
        out.push_str("## Unchanged areas\n\n");
        for section in unchanged {
            let _ = writeln!(out, "- {} ({} items)", section.name, section.unchanged);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::diff_documents;
    use quotediff_core::{DiffConfig, Document, DocumentMetadata, Field};
    use quotediff_ingest::Normalizer;

    fn doc(version: &str, records: Vec<Record>) -> Document {
        let n = Normalizer::default();
        let records = records.iter().map(|r| n.normalize(r)).collect();
        Document::from_records(version, DocumentMetadata::default(), records, Vec::new())
    }

    #[test]
    fn test_render_groups() {
        let old = doc(
            "v1",
            vec![
                Record::new("Additional Storage", "DEV Storage", 0).with(Field::Storage, "20480GB"),
                Record::new("S4 PRD", "Domestic S4HANA", 1).with(Field::Ram, "1 TB"),
                Record::new("Web Dispatcher", "Domestic S4HANA", 2),
            ],
        );
        let new = doc(
            "v2",
            vec![
                Record::new("S4 PRD", "Domestic S4HANA", 0).with(Field::Ram, "1 TB"),
                Record::new("Additional Storage for S4 DEV", "Others IaaS", 1)
                    .with(Field::Storage, "10,880 GB"),
                Record::new("Backup Server", "Others IaaS", 2).with(Field::Os, "RHEL"),
            ],
        );
        let mut report = diff_documents(&old, &new, &DiffConfig::default());
        report.text_similarity = Some(72.5);
        let md = render_markdown(&report);

        assert!(md.starts_with("# Delta: v1 → v2"));
        assert!(md.contains("- Overall text similarity: 72.5%"));
        assert!(md.contains("## Others IaaS"));
        assert!(md.contains(
            "- ~ **Additional Storage for S4 DEV** (renamed from \"Additional Storage\"; moved from DEV Storage)"
        ));
        assert!(md.contains("  - Storage Information: 20480GB → 10,880 GB"));
        assert!(md.contains("- + Backup Server (OS: RHEL)"));
        assert!(md.contains("- - Web Dispatcher"));
        assert!(md.contains("## Sections removed\n\n- DEV Storage"));
        assert!(!md.contains("## Unchanged areas"));
    }

    #[test]
    fn test_unchanged_areas() {
        let old = doc("v1", vec![Record::new("S4 PRD", "Domestic S4HANA", 0)]);
        let new = doc("v2", vec![Record::new("S4 PRD", "Domestic S4HANA", 0)]);
        let md = render_markdown(&diff_documents(&old, &new, &DiffConfig::default()));
        assert!(md.contains("## Unchanged areas\n\n- Domestic S4HANA (1 items)"));
        assert!(!md.contains("## Header changes"));
    }
}
