use serde::{Deserialize, Serialize};

// --- Enums ---

/// Lifecycle state of one ledger row.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RowState {
    #[default]
    Pending,
    InProgress,
    Success,
    Failure,
}

impl RowState {
    /// Validates whether a transition from this state to `to` is allowed.
    ///
    /// Rules:
    /// - Pending -> InProgress (dispatch)
    /// - InProgress -> Success | Failure (completion)
    /// - Success and Failure are terminal; rows never leave them
    pub fn is_valid_transition(&self, to: &RowState) -> bool {
        use RowState::*;

        matches!(
            (self, to),
            (Pending, InProgress) | (InProgress, Success) | (InProgress, Failure)
        )
    }

    /// A row is terminal once the invocation outcome has been recorded.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RowState::Success | RowState::Failure)
    }
}

impl std::fmt::Display for RowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowState::Pending => write!(f, "pending"),
            RowState::InProgress => write!(f, "in_progress"),
            RowState::Success => write!(f, "success"),
            RowState::Failure => write!(f, "failure"),
        }
    }
}

/// Binary verdict the classifier assigns to one invocation log.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

/// Aggregate outcome of one stage, derived from its terminal ledger.
///
/// Never stored, always recomputed from row counts (see `aggregate`).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageVerdict {
    /// Every item succeeded; downstream stages run on the full set.
    Succeeded,
    /// At least one success and at least one failure; downstream stages
    /// run on the success subset only.
    SucceededWithIssues,
    /// Zero successes; downstream stages must not run.
    Failed,
    /// Zero items: an error condition, not a clean no-op.
    Empty,
}

impl std::fmt::Display for StageVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageVerdict::Succeeded => write!(f, "succeeded"),
            StageVerdict::SucceededWithIssues => write!(f, "succeeded_with_issues"),
            StageVerdict::Failed => write!(f, "failed"),
            StageVerdict::Empty => write!(f, "empty"),
        }
    }
}

// --- Structs ---

/// One unit of migration work: a source-system triple plus the destination
/// descriptor. Immutable once read from the catalog.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct WorkItem {
    pub source_org: String,
    pub source_project: String,
    pub repo_name: String,
    pub target_org: String,
    pub target_repo: String,
    pub visibility: String,
}

impl WorkItem {
    /// Identity key: the source triple, unique per catalog.
    pub fn key(&self) -> String {
        format!(
            "{}/{}/{}",
            self.source_org, self.source_project, self.repo_name
        )
    }

    /// Destination identity, used for duplicate-destination rejection.
    pub fn target_key(&self) -> String {
        format!("{}/{}", self.target_org, self.target_repo)
    }
}

/// One ledger row: the work item's fields plus its lifecycle state and the
/// path of its per-item invocation log (empty until dispatch).
///
/// Fields are inlined rather than nesting a `WorkItem` because the ledger is
/// a flat CSV table and the `csv` deserializer does not support
/// `#[serde(flatten)]`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LedgerRow {
    pub source_org: String,
    pub source_project: String,
    pub repo_name: String,
    pub target_org: String,
    pub target_repo: String,
    pub visibility: String,
    pub state: RowState,
    #[serde(default)]
    pub log_path: String,
}

impl LedgerRow {
    pub fn pending(item: WorkItem) -> Self {
        Self {
            source_org: item.source_org,
            source_project: item.source_project,
            repo_name: item.repo_name,
            target_org: item.target_org,
            target_repo: item.target_repo,
            visibility: item.visibility,
            state: RowState::Pending,
            log_path: String::new(),
        }
    }

    /// Identity key matching `WorkItem::key()`.
    pub fn key(&self) -> String {
        format!(
            "{}/{}/{}",
            self.source_org, self.source_project, self.repo_name
        )
    }

    /// Reconstruct the immutable work item carried by this row.
    pub fn item(&self) -> WorkItem {
        WorkItem {
            source_org: self.source_org.clone(),
            source_project: self.source_project.clone(),
            repo_name: self.repo_name.clone(),
            target_org: self.target_org.clone(),
            target_repo: self.target_repo.clone(),
            visibility: self.visibility.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions() {
        use RowState::*;

        assert!(Pending.is_valid_transition(&InProgress));
        assert!(InProgress.is_valid_transition(&Success));
        assert!(InProgress.is_valid_transition(&Failure));

        // No skipping dispatch, no leaving a terminal state
        assert!(!Pending.is_valid_transition(&Success));
        assert!(!Success.is_valid_transition(&Failure));
        assert!(!Failure.is_valid_transition(&InProgress));
        assert!(!InProgress.is_valid_transition(&Pending));
    }

    #[test]
    fn terminal_states() {
        assert!(!RowState::Pending.is_terminal());
        assert!(!RowState::InProgress.is_terminal());
        assert!(RowState::Success.is_terminal());
        assert!(RowState::Failure.is_terminal());
    }
}
