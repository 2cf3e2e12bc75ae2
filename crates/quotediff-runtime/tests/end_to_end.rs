use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use quotediff_core::{DiffConfig, Error, ExtractionSchema, Field, RawDocument, Result, UnresolvedReason};
use quotediff_diff::{render_markdown, ChangeKind, DeltaEntry, DeltaReport, Side};
use quotediff_extract::{ExtractionBackend, HeuristicBackend, RawRecord};
use quotediff_ingest::Block;
use quotediff_runtime::Comparator;

const OLD_QUOTE: &str = "Customer ACME Manufacturing
Date 2024/01/10
Version: 3-1
Currency EUR

# Domestic S4HANA
System Name: S4 PRD
Tier-Name: L
Database: HANA
RAM: 2,048 GB

System Name: S4 QAS
Tier-Name: M
Database: HANA
RAM: 512 GB

# DEV Storage
System Name: Additional Storage
Storage: 20480 GB
";

const NEW_QUOTE: &str = "Customer ACME Manufacturing
Date 2024/03/15
Version: 3-2
Currency EUR

# Domestic S4HANA
System Name: S4 PRD
Tier-Name: L
Database: HANA
RAM: 2 TiB

System Name: S4 QAS
Tier-Name: M
Database: HANA
RAM: 512 GB
\x0c
# Others IaaS
System Name: Additional Storage for S4 DEV
Storage: 10,880 GB
";

fn config() -> DiffConfig {
    DiffConfig {
        retry_backoff_ms: 1,
        ..DiffConfig::default()
    }
}

/// Heuristic answers, delivered slower for earlier blocks.
struct DelayedBackend;

impl ExtractionBackend for DelayedBackend {
    fn extract<'a>(
        &'a self,
        block: &'a Block,
        _schema: &'a ExtractionSchema,
    ) -> BoxFuture<'a, Result<RawRecord>> {
        Box::pin(async move {
            let wait = 4 * (8 - block.index.min(8)) as u64;
            tokio::time::sleep(Duration::from_millis(wait)).await;
            Ok(HeuristicBackend::parse(block))
        })
    }

    fn name(&self) -> &str {
        "delayed"
    }
}

/// Fails every block that mentions QAS.
struct QasOutage;

impl ExtractionBackend for QasOutage {
    fn extract<'a>(
        &'a self,
        block: &'a Block,
        _schema: &'a ExtractionSchema,
    ) -> BoxFuture<'a, Result<RawRecord>> {
        Box::pin(async move {
            if block.text.contains("QAS") {
                return Err(Error::Backend("502 bad gateway".into()));
            }
            Ok(HeuristicBackend::parse(block))
        })
    }

    fn name(&self) -> &str {
        "qas-outage"
    }
}

fn docs() -> (RawDocument, RawDocument) {
    (
        RawDocument::from_text("quote-v1", OLD_QUOTE),
        RawDocument::from_text("quote-v2", NEW_QUOTE),
    )
}

fn strip_run_fields(mut report: DeltaReport) -> DeltaReport {
    report.run_id = None;
    report.generated_at = None;
    report
}

#[tokio::test]
async fn storage_moved_between_sections() {
    let (old, new) = docs();
    let comparator = Comparator::new(config(), Arc::new(HeuristicBackend::new()));
    let report = comparator.compare(&old, &new).await.unwrap();

    let entries: Vec<&DeltaEntry> = report.entries().collect();
    assert_eq!(entries.len(), 1, "report: {:#?}", report);
    let DeltaEntry::Matched {
        old: before,
        new: after,
        moved,
        renamed,
        changes,
        ..
    } = entries[0]
    else {
        panic!("expected matched entry, got {:?}", entries[0]);
    };
    assert!(*moved);
    assert!(*renamed);
    assert_eq!(before.name, "Additional Storage");
    assert_eq!(after.name, "Additional Storage for S4 DEV");
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].field, Field::Storage);
    assert_eq!(changes[0].kind, ChangeKind::Changed);
    assert_eq!(changes[0].old.as_deref(), Some("20480 GB"));
    assert_eq!(changes[0].new.as_deref(), Some("10,880 GB"));

    assert_eq!(report.sections_removed, vec!["DEV Storage".to_string()]);
    assert!(report.section("DEV Storage").is_none());
    let domestic = report.section("Domestic S4HANA").unwrap();
    assert!(domestic.entries.is_empty());
    assert_eq!(domestic.unchanged, 2);

    assert_eq!(report.summary.matched, 3);
    assert_eq!(report.summary.added, 0);
    assert_eq!(report.summary.removed, 0);

    let fields: Vec<&str> = report.metadata_changes.iter().map(|c| c.field.as_str()).collect();
    assert_eq!(fields, vec!["date", "page_count", "version_label"]);
    assert!(report.text_similarity.unwrap() > 50.0);
}

#[tokio::test]
async fn worker_count_does_not_change_result() {
    let (old, new) = docs();
    let serial = Comparator::new(
        DiffConfig {
            worker_count: 1,
            ..config()
        },
        Arc::new(DelayedBackend),
    );
    let parallel = Comparator::new(
        DiffConfig {
            worker_count: 8,
            ..config()
        },
        Arc::new(DelayedBackend),
    );

    let a = strip_run_fields(serial.compare(&old, &new).await.unwrap());
    let b = strip_run_fields(parallel.compare(&old, &new).await.unwrap());
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[tokio::test]
async fn swapped_documents_mirror_the_report() {
    let (old, new) = docs();
    let comparator = Comparator::new(config(), Arc::new(HeuristicBackend::new()));
    let forward = comparator.compare(&old, &new).await.unwrap();
    let backward = comparator.compare(&new, &old).await.unwrap();

    assert_eq!(forward.summary.matched, backward.summary.matched);
    assert_eq!(forward.summary.added, backward.summary.removed);
    assert_eq!(forward.summary.moved, backward.summary.moved);
    assert_eq!(forward.sections_removed, backward.sections_added);
}

#[tokio::test]
async fn failed_blocks_are_reported_not_dropped() {
    let (old, new) = docs();
    let comparator = Comparator::new(config(), Arc::new(QasOutage));
    let run = comparator.run(&old, &new).await.unwrap();
    let report = &run.report;

    assert_eq!(report.unresolved.len(), 2);
    assert_eq!(report.unresolved[0].side, Side::Old);
    assert_eq!(report.unresolved[1].side, Side::New);
    for u in &report.unresolved {
        assert_eq!(u.block.reason, UnresolvedReason::BackendFailed);
        assert_eq!(u.block.section.as_deref(), Some("Domestic S4HANA"));
    }
    assert_eq!(run.stats.old.unresolved, 1);
    assert_eq!(run.stats.new.resolved, 2);
    assert_eq!(run.stats.backend, "qas-outage");

    let md = render_markdown(report);
    assert!(md.contains("## Needs manual review"));
    assert!(md.contains("502 bad gateway"));
}

#[tokio::test]
async fn empty_valued_field_keeps_items_in_place() {
    let old = RawDocument::from_text("quote-v1", OLD_QUOTE);
    let new = RawDocument::from_text(
        "quote-v1b",
        &OLD_QUOTE.replace("System Name: S4 PRD\n", "System Name: S4 PRD\nOS:\n"),
    );
    let comparator = Comparator::new(config(), Arc::new(HeuristicBackend::new()));
    let report = comparator.compare(&old, &new).await.unwrap();

    assert_eq!(report.summary.matched, 3, "report: {:#?}", report);
    assert_eq!(report.summary.moved, 0);
    assert_eq!(report.summary.unresolved, 0);
    assert!(report.sections_added.is_empty());
    assert!(report.sections_removed.is_empty());
    assert_eq!(report.entries().count(), 0);
}
