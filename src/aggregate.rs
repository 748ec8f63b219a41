use serde::Serialize;

use crate::error::RelayError;
use crate::types::{LedgerRow, RowState, StageVerdict};

/// Per-state tallies over one ledger, for the human-readable stage summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StageCounts {
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    pub pending: usize,
    pub in_progress: usize,
}

pub fn count(rows: &[LedgerRow]) -> StageCounts {
    let mut counts = StageCounts {
        total: rows.len(),
        ..Default::default()
    };
    for row in rows {
        match row.state {
            RowState::Success => counts.successes += 1,
            RowState::Failure => counts.failures += 1,
            RowState::Pending => counts.pending += 1,
            RowState::InProgress => counts.in_progress += 1,
        }
    }
    counts
}

/// Compute the stage verdict from a ledger snapshot.
///
/// Pure function of the row states; nothing is ever counted incrementally
/// during the run, so there is no race between counting and recording.
///
/// Decision table:
///
/// | successes | failures | verdict             |
/// |-----------|----------|---------------------|
/// | 0         | 0        | Empty               |
/// | 0         | >0       | Failed              |
/// | >0        | 0        | Succeeded           |
/// | >0        | >0       | SucceededWithIssues |
///
/// Non-terminal rows do not count toward either column, so a freshly
/// initialized ledger aggregates to Empty.
pub fn aggregate(rows: &[LedgerRow]) -> StageVerdict {
    let counts = count(rows);
    match (counts.successes, counts.failures) {
        (0, 0) => StageVerdict::Empty,
        (0, _) => StageVerdict::Failed,
        (_, 0) => StageVerdict::Succeeded,
        (_, _) => StageVerdict::SucceededWithIssues,
    }
}

/// Verdict precondition: every row terminal.
///
/// A ledger holding Pending or InProgress rows belongs to a run that never
/// finished (crashed or still running); its verdict would green-light
/// downstream stages on work that never happened.
pub fn require_terminal(rows: &[LedgerRow]) -> Result<(), RelayError> {
    let counts = count(rows);
    let unfinished = counts.pending + counts.in_progress;
    if unfinished > 0 {
        return Err(RelayError::Ledger(format!(
            "{} of {} row(s) never reached a terminal state; the stage did not complete",
            unfinished, counts.total
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WorkItem;

    fn row(repo: &str, state: RowState) -> LedgerRow {
        let mut r = LedgerRow::pending(WorkItem {
            source_org: "acme".to_string(),
            source_project: "platform".to_string(),
            repo_name: repo.to_string(),
            target_org: "acme-gh".to_string(),
            target_repo: repo.to_string(),
            visibility: "private".to_string(),
        });
        r.state = state;
        r
    }

    #[test]
    fn empty_ledger_is_empty() {
        assert_eq!(aggregate(&[]), StageVerdict::Empty);
    }

    #[test]
    fn all_pending_is_empty() {
        let rows = vec![row("a", RowState::Pending), row("b", RowState::Pending)];
        assert_eq!(aggregate(&rows), StageVerdict::Empty);
    }

    #[test]
    fn decision_table() {
        let rows = vec![row("a", RowState::Success), row("b", RowState::Success)];
        assert_eq!(aggregate(&rows), StageVerdict::Succeeded);

        let rows = vec![row("a", RowState::Success), row("b", RowState::Failure)];
        assert_eq!(aggregate(&rows), StageVerdict::SucceededWithIssues);

        let rows = vec![row("a", RowState::Failure), row("b", RowState::Failure)];
        assert_eq!(aggregate(&rows), StageVerdict::Failed);
    }

    #[test]
    fn non_terminal_rows_fail_the_precondition() {
        let rows = vec![row("a", RowState::Success), row("b", RowState::Pending)];
        let err = require_terminal(&rows).unwrap_err();
        assert!(err.to_string().contains("did not complete"));

        let rows = vec![row("a", RowState::Success), row("b", RowState::InProgress)];
        assert!(require_terminal(&rows).is_err());

        let rows = vec![row("a", RowState::Success), row("b", RowState::Failure)];
        assert!(require_terminal(&rows).is_ok());
    }

    #[test]
    fn counts_track_every_state() {
        let rows = vec![
            row("a", RowState::Success),
            row("b", RowState::Failure),
            row("c", RowState::Pending),
            row("d", RowState::InProgress),
        ];
        let counts = count(&rows);
        assert_eq!(counts.total, 4);
        assert_eq!(counts.successes, 1);
        assert_eq!(counts.failures, 1);
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.in_progress, 1);
    }
}
