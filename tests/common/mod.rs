#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use repo_relay::classify::MarkerClassifier;
use repo_relay::runner::{MockOutcome, MockRunner};
use repo_relay::types::{LedgerRow, RowState, WorkItem};

/// Marker strings the mock migrator and classifier agree on.
pub const SUCCESS_MARKER: &str = "Migration completed successfully";
pub const NOOP_MARKER: &str = "skipping migration";

/// Creates a `WorkItem` for `repo-{n}` under a fixed source org/project.
///
/// Source and destination repo names match, destination org is
/// `acme-github`, visibility `private`.
pub fn make_item(n: usize) -> WorkItem {
    WorkItem {
        source_org: "acme".to_string(),
        source_project: "platform".to_string(),
        repo_name: format!("repo-{}", n),
        target_org: "acme-github".to_string(),
        target_repo: format!("repo-{}", n),
        visibility: "private".to_string(),
    }
}

/// Creates `k` work items, `repo-1` through `repo-{k}`.
pub fn make_items(k: usize) -> Vec<WorkItem> {
    (1..=k).map(make_item).collect()
}

/// Classifier matching the shared markers.
pub fn classifier() -> MarkerClassifier {
    MarkerClassifier::new(SUCCESS_MARKER, NOOP_MARKER)
}

/// A mock outcome whose log classifies as Success.
pub fn success_outcome() -> MockOutcome {
    MockOutcome::clean(&format!("cloning...\npushing...\n{}\n", SUCCESS_MARKER))
}

/// A mock outcome with a clean exit but a log that classifies as Failure
/// (no success marker).
pub fn ambiguous_outcome() -> MockOutcome {
    MockOutcome::clean("cloning...\nerror: connection reset\n")
}

/// A mock outcome where the tool reported doing nothing.
pub fn noop_outcome() -> MockOutcome {
    MockOutcome::clean(&format!(
        "target already exists, {}\n{}\n",
        NOOP_MARKER, SUCCESS_MARKER
    ))
}

/// A `MockRunner` where every one of `items` gets the same outcome.
pub fn uniform_runner(items: &[WorkItem], outcome: MockOutcome) -> MockRunner {
    let outcomes: HashMap<String, MockOutcome> = items
        .iter()
        .map(|i| (i.key(), outcome.clone()))
        .collect();
    MockRunner::new(outcomes)
}

/// Write a catalog CSV for the given items, header row included.
pub fn write_catalog(path: &Path, items: &[WorkItem]) {
    let mut writer = csv_writer(path);
    for item in items {
        writer.serialize(item).expect("serialize catalog row");
    }
    writer.flush().expect("flush catalog");
}

/// Write a ledger CSV directly (for stage/verdict tests that need a
/// pre-existing terminal ledger).
pub fn write_ledger(path: &Path, rows: &[(WorkItem, RowState)]) {
    let mut writer = csv_writer(path);
    for (item, state) in rows {
        let mut row = LedgerRow::pending(item.clone());
        row.state = *state;
        writer.serialize(&row).expect("serialize ledger row");
    }
    writer.flush().expect("flush ledger");
}

fn csv_writer(path: &Path) -> csv::Writer<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    csv::Writer::from_path(path).expect("open csv for writing")
}
