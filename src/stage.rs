use std::path::Path;

use crate::error::RelayError;
use crate::ledger;
use crate::types::{RowState, WorkItem};

/// Cross-stage filter protocol: compute the set of items a downstream stage
/// is allowed to work on.
///
/// A stage's eligible input is exactly the Success subset of its
/// predecessor's terminal ledger. Three distinct failure modes, because the
/// orchestrating layer reacts differently to each:
///
/// - missing ledger file -> `MissingLedger` (broken handoff; never fall back
///   to the unfiltered original catalog)
/// - unreadable/unparsable ledger -> `LedgerParse` (also a broken handoff)
/// - readable ledger with zero Success rows -> `NothingToDo` (the handoff
///   worked; there is simply nothing eligible)
pub fn success_subset(ledger_path: &Path) -> Result<Vec<WorkItem>, RelayError> {
    if !ledger_path.exists() {
        return Err(RelayError::MissingLedger(ledger_path.to_path_buf()));
    }

    let rows = ledger::read_rows(ledger_path).map_err(|reason| RelayError::LedgerParse {
        path: ledger_path.to_path_buf(),
        reason,
    })?;

    let subset: Vec<WorkItem> = rows
        .iter()
        .filter(|r| r.state == RowState::Success)
        .map(|r| r.item())
        .collect();

    if subset.is_empty() {
        return Err(RelayError::NothingToDo(ledger_path.to_path_buf()));
    }

    Ok(subset)
}
