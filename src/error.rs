use std::path::PathBuf;

/// Error enum for stage-fatal failures, grouped by the taxonomy the pipeline
/// orchestrator branches on.
///
/// Categories:
/// - Input: malformed catalog, missing fields, duplicate destinations
/// - Ledger: ledger I/O or an invalid row transition
/// - Aggregate: zero items or zero successes at stage end
/// - Protocol: predecessor ledger missing or unparsable, a broken handoff,
///   deliberately distinct from "no successful items"
/// - Config: bad repo-relay.toml
///
/// Per-item invocation failures are never represented here: they are absorbed
/// into ledger row state and only surface through the stage verdict.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    // Input
    #[error("Catalog error: {0}")]
    Catalog(String),

    // Ledger
    #[error("Ledger error: {0}")]
    Ledger(String),

    // Aggregate
    #[error("Stage has no items: empty catalog is an error, not a no-op")]
    EmptyStage,

    #[error("Stage failed: all {failed} item(s) failed, downstream stages must not run")]
    AllFailed { failed: usize },

    // Protocol
    #[error("Predecessor ledger not found: {0}. The handoff is broken; refusing to fall back to the unfiltered catalog")]
    MissingLedger(PathBuf),

    #[error("Predecessor ledger {path} is unreadable: {reason}")]
    LedgerParse { path: PathBuf, reason: String },

    // Handoff with zero eligible items
    #[error("Nothing to do: predecessor ledger {0} has no success rows")]
    NothingToDo(PathBuf),

    // Config
    #[error("Config error: {0}")]
    Config(String),
}

/// Process exit code for a protocol error (broken handoff).
pub const EXIT_PROTOCOL: i32 = 2;

/// Process exit code signalling "proceed, but only on the success subset".
pub const EXIT_PARTIAL: i32 = 3;

impl RelayError {
    /// Returns true when the error indicates a broken cross-stage handoff
    /// rather than a migration outcome.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            RelayError::MissingLedger(_) | RelayError::LedgerParse { .. }
        )
    }

    /// Exit code contract: 1 for ordinary fatal errors, 2 for protocol
    /// errors so the orchestrating layer can tell a broken handoff apart
    /// from a failed stage.
    pub fn exit_code(&self) -> i32 {
        if self.is_protocol() {
            EXIT_PROTOCOL
        } else {
            1
        }
    }
}

/// Bridge so `?` can convert `RelayError` into `String` in code that still
/// returns `Result<T, String>` (CLI handlers).
impl From<RelayError> for String {
    fn from(err: RelayError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_errors_get_their_own_exit_code() {
        let missing = RelayError::MissingLedger(PathBuf::from("a.csv"));
        let parse = RelayError::LedgerParse {
            path: PathBuf::from("a.csv"),
            reason: "bad header".to_string(),
        };
        assert_eq!(missing.exit_code(), EXIT_PROTOCOL);
        assert_eq!(parse.exit_code(), EXIT_PROTOCOL);
    }

    #[test]
    fn operational_errors_exit_one() {
        assert_eq!(RelayError::EmptyStage.exit_code(), 1);
        assert_eq!(RelayError::AllFailed { failed: 4 }.exit_code(), 1);
        assert_eq!(
            RelayError::NothingToDo(PathBuf::from("a.csv")).exit_code(),
            1
        );
        assert!(!RelayError::NothingToDo(PathBuf::from("a.csv")).is_protocol());
    }
}
