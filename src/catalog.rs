use std::collections::HashMap;
use std::path::Path;

use crate::error::RelayError;
use crate::types::WorkItem;

/// Load the work catalog: a CSV file, one row per item, header row required.
///
/// Columns are matched by header name (via serde), so column order is not
/// significant. Validation is all-or-nothing: every problem in the file is
/// collected and reported together, and no items are returned if any row is
/// invalid. Item order follows source order; the scheduler dispatches FIFO.
///
/// Enforced here, before any invocation runs:
/// - every field present and non-empty after trimming
/// - no duplicate destination identity (`target_org/target_repo`); silent
///   last-one-wins would overwrite a migration, so duplicates are rejected
/// - no duplicate source identity (the ledger is keyed by it)
pub fn load(path: &Path) -> Result<Vec<WorkItem>, RelayError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| RelayError::Catalog(format!("Failed to read {}: {}", path.display(), e)))?;

    // Row numbers ride alongside each item so reports stay correct when
    // earlier rows failed to parse. Header is row 1; first data row is 2.
    let mut items: Vec<(usize, WorkItem)> = Vec::new();
    let mut errors: Vec<String> = Vec::new();

    for (idx, record) in reader.deserialize::<WorkItem>().enumerate() {
        let row_num = idx + 2;
        match record {
            Ok(item) => {
                for (field, value) in [
                    ("source_org", &item.source_org),
                    ("source_project", &item.source_project),
                    ("repo_name", &item.repo_name),
                    ("target_org", &item.target_org),
                    ("target_repo", &item.target_repo),
                    ("visibility", &item.visibility),
                ] {
                    if value.trim().is_empty() {
                        errors.push(format!("row {}: field '{}' is empty", row_num, field));
                    }
                }
                items.push((row_num, item));
            }
            Err(e) => errors.push(format!("row {}: {}", row_num, e)),
        }
    }

    if items.is_empty() && errors.is_empty() {
        errors.push("catalog has no data rows".to_string());
    }

    // Duplicate detection over the full set so the report names both rows
    let mut seen_targets: HashMap<String, usize> = HashMap::new();
    let mut seen_sources: HashMap<String, usize> = HashMap::new();
    for (row_num, item) in &items {
        let row_num = *row_num;
        if let Some(first) = seen_targets.insert(item.target_key(), row_num) {
            errors.push(format!(
                "row {}: duplicate destination '{}' (first used in row {})",
                row_num,
                item.target_key(),
                first
            ));
        }
        if let Some(first) = seen_sources.insert(item.key(), row_num) {
            errors.push(format!(
                "row {}: duplicate source '{}' (first used in row {})",
                row_num,
                item.key(),
                first
            ));
        }
    }

    if !errors.is_empty() {
        return Err(RelayError::Catalog(format!(
            "{} in {}:\n{}",
            if errors.len() == 1 {
                "1 problem".to_string()
            } else {
                format!("{} problems", errors.len())
            },
            path.display(),
            errors
                .iter()
                .map(|e| format!("  - {}", e))
                .collect::<Vec<_>>()
                .join("\n")
        )));
    }

    Ok(items.into_iter().map(|(_, item)| item).collect())
}
