use std::fs;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::RelayError;
use crate::types::{LedgerRow, RowState, WorkItem};

/// The stage-scoped status ledger: one row per work item, persisted as CSV.
///
/// The file is rewritten in full on every row update because updates touch
/// arbitrary rows, not just the newest. Each rewrite goes through a temp
/// file in the same directory followed by an atomic rename, so a concurrent
/// reader sees either the previous version or the new one, never a partial
/// write.
///
/// Concurrency discipline: only the scheduler's completion handler calls
/// `update_row`, and completions are processed one at a time. That
/// serializes the cheap bookkeeping step and removes any need for row
/// locking while the expensive migrations run in parallel.
pub struct Ledger {
    path: PathBuf,
    rows: Vec<LedgerRow>,
}

impl Ledger {
    /// Create the ledger for a stage run: one Pending row per item, written
    /// to disk immediately.
    pub fn initialize(path: &Path, items: &[WorkItem]) -> Result<Self, RelayError> {
        let rows: Vec<LedgerRow> = items.iter().cloned().map(LedgerRow::pending).collect();
        save(path, &rows)?;
        Ok(Self {
            path: path.to_path_buf(),
            rows,
        })
    }

    /// Update one row and atomically swap the visible file.
    ///
    /// Rejects transitions the row lifecycle does not allow, in particular
    /// any transition out of a terminal state.
    pub fn update_row(
        &mut self,
        key: &str,
        state: RowState,
        log_path: &str,
    ) -> Result<(), RelayError> {
        let row = self
            .rows
            .iter_mut()
            .find(|r| r.key() == key)
            .ok_or_else(|| RelayError::Ledger(format!("No ledger row for item '{}'", key)))?;

        if !row.state.is_valid_transition(&state) {
            return Err(RelayError::Ledger(format!(
                "Invalid state transition for '{}': {} -> {}",
                key, row.state, state
            )));
        }

        row.state = state;
        if !log_path.is_empty() {
            row.log_path = log_path.to_string();
        }

        save(&self.path, &self.rows)
    }

    pub fn rows(&self) -> &[LedgerRow] {
        &self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True once every row has reached Success or Failure. The verdict is
    /// only meaningful after this holds.
    pub fn all_terminal(&self) -> bool {
        self.rows.iter().all(|r| r.state.is_terminal())
    }

    /// Load a terminal ledger for aggregation or display.
    pub fn load(path: &Path) -> Result<Vec<LedgerRow>, RelayError> {
        read_rows(path).map_err(RelayError::Ledger)
    }
}

/// Read ledger rows from a CSV file. Returns a plain message so callers can
/// wrap it in the error category that fits their context (ledger vs.
/// protocol).
pub fn read_rows(path: &Path) -> Result<Vec<LedgerRow>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    let mut rows = Vec::new();
    for record in reader.deserialize::<LedgerRow>() {
        let row =
            record.map_err(|e| format!("Failed to parse row in {}: {}", path.display(), e))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Write all rows using the write-temp-rename pattern: serialize into a
/// temp file in the target directory, sync to disk, then atomically persist
/// over the visible path.
fn save(path: &Path, rows: &[LedgerRow]) -> Result<(), RelayError> {
    let parent = path.parent().ok_or_else(|| {
        RelayError::Ledger(format!(
            "Cannot determine parent directory of {}",
            path.display()
        ))
    })?;
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };

    fs::create_dir_all(parent).map_err(|e| {
        RelayError::Ledger(format!(
            "Failed to create directory {}: {}",
            parent.display(),
            e
        ))
    })?;

    let temp_file = NamedTempFile::new_in(parent).map_err(|e| {
        RelayError::Ledger(format!(
            "Failed to create temp file in {}: {}",
            parent.display(),
            e
        ))
    })?;

    {
        let mut writer = csv::Writer::from_writer(temp_file.as_file());
        for row in rows {
            writer
                .serialize(row)
                .map_err(|e| RelayError::Ledger(format!("Failed to serialize row: {}", e)))?;
        }
        writer
            .flush()
            .map_err(|e| RelayError::Ledger(format!("Failed to flush ledger: {}", e)))?;
    }

    // sync to disk before rename
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| RelayError::Ledger(format!("Failed to sync temp file: {}", e)))?;

    temp_file.persist(path).map_err(|e| {
        RelayError::Ledger(format!(
            "Failed to rename temp file to {}: {}",
            path.display(),
            e
        ))
    })?;

    Ok(())
}
