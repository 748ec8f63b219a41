use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::aggregate::{self, StageCounts};
use crate::classify::OutcomeClassifier;
use crate::error::RelayError;
use crate::ledger::Ledger;
use crate::runner::{MigrationRunner, RunStatus};
use crate::types::{Outcome, RowState, StageVerdict, WorkItem};
use crate::{log_debug, log_info, log_warn};

/// Result of a stage run, returned to the caller for summary display and
/// exit-code mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub counts: StageCounts,
    pub verdict: StageVerdict,
}

/// Run one stage: dispatch every catalog item through the bounded scheduler
/// and return the aggregate verdict over the terminal ledger.
///
/// The loop:
/// 1. Initialize the ledger (all rows Pending)
/// 2. While the in-flight set has capacity and the queue is non-empty, pop
///    the head, mark its row InProgress, and spawn one invocation writing
///    to its own log file
/// 3. Await one completion via `JoinSet::join_next` (fan-in wait-any), so a
///    long-running item never blocks bookkeeping for its siblings
/// 4. Classify, record the terminal row state, free the slot
/// 5. Repeat until the queue and the in-flight set are both empty
///
/// At most `max_concurrent` invocations are ever in flight. Completions are
/// handled serially on this loop, which is the only writer of the ledger.
///
/// Invocation failures of any kind (crash, non-zero exit, spawn error,
/// timeout, panicked worker, unreadable log) become Failure rows; they are
/// never returned as errors. The error return covers stage-fatal conditions
/// only: ledger I/O and the Empty / all-failed aggregate outcomes.
pub async fn run_stage(
    items: Vec<WorkItem>,
    ledger_path: &Path,
    logs_dir: &Path,
    runner: Arc<impl MigrationRunner + 'static>,
    classifier: &dyn OutcomeClassifier,
    max_concurrent: usize,
) -> Result<RunSummary, RelayError> {
    if items.is_empty() {
        return Err(RelayError::EmptyStage);
    }

    std::fs::create_dir_all(logs_dir).map_err(|e| {
        RelayError::Ledger(format!(
            "Failed to create logs directory {}: {}",
            logs_dir.display(),
            e
        ))
    })?;

    let total = items.len();
    let mut ledger = Ledger::initialize(ledger_path, &items)?;
    let mut pending: VecDeque<(usize, WorkItem)> = items.into_iter().enumerate().collect();

    let mut join_set: JoinSet<(String, PathBuf, RunStatus)> = JoinSet::new();
    // join_next_with_id ties panicked tasks back to their item
    let mut task_items: HashMap<tokio::task::Id, (String, PathBuf)> = HashMap::new();
    let mut completed = 0usize;

    log_info!(
        "Scheduler started ({} item(s), max_concurrent={}).",
        total,
        max_concurrent
    );

    loop {
        // Dispatch: fill free slots from the head of the queue (FIFO,
        // catalog order)
        while join_set.len() < max_concurrent {
            let Some((idx, item)) = pending.pop_front() else {
                break;
            };
            let key = item.key();
            let log_path = logs_dir.join(log_file_name(idx, &key));

            ledger.update_row(&key, RowState::InProgress, &log_path.display().to_string())?;
            log_info!("[{}] Dispatching, log: {}", key, log_path.display());

            let runner = runner.clone();
            let task_log = log_path.clone();
            let handle = join_set.spawn(async move {
                let status = runner.run_migration(&item, &log_path).await;
                (item.key(), log_path, status)
            });
            task_items.insert(handle.id(), (key, task_log));
        }

        // Fan-in: wait for whichever invocation finishes first
        let Some(joined) = join_set.join_next_with_id().await else {
            break; // queue drained and nothing in flight
        };

        let (key, log_path, status) = match joined {
            Ok((id, (key, log_path, status))) => {
                task_items.remove(&id);
                (key, log_path, status)
            }
            Err(join_err) => {
                // A panicked worker still owes its item a terminal state
                let (key, log_path) = task_items
                    .remove(&join_err.id())
                    .unwrap_or_else(|| ("<unknown>".to_string(), PathBuf::new()));
                log_warn!("[{}] Worker task failed: {}", key, join_err);
                (
                    key,
                    log_path,
                    RunStatus::Error(format!("worker task failed: {}", join_err)),
                )
            }
        };

        let outcome = classify_completion(&key, &log_path, status, classifier);
        let state = match outcome {
            Outcome::Success => RowState::Success,
            Outcome::Failure => RowState::Failure,
        };
        ledger.update_row(&key, state, "")?;

        completed += 1;
        log_info!("[{}] Recorded {} ({}/{})", key, state, completed, total);
    }

    debug_assert!(ledger.all_terminal());

    let counts = aggregate::count(ledger.rows());
    let verdict = aggregate::aggregate(ledger.rows());

    log_info!(
        "Stage finished: {} succeeded, {} failed ({} total), verdict: {}",
        counts.successes,
        counts.failures,
        counts.total,
        verdict
    );

    match verdict {
        StageVerdict::Empty => Err(RelayError::EmptyStage),
        StageVerdict::Failed => Err(RelayError::AllFailed {
            failed: counts.failures,
        }),
        _ => Ok(RunSummary { counts, verdict }),
    }
}

/// Map one finished invocation to its binary outcome.
///
/// Abnormal termination is Failure without consulting the log; a clean exit
/// defers to the classifier over the final log text. An unreadable log on a
/// clean exit is Failure too; the log may simply never have been written.
fn classify_completion(
    key: &str,
    log_path: &Path,
    status: RunStatus,
    classifier: &dyn OutcomeClassifier,
) -> Outcome {
    match status {
        RunStatus::CleanExit => match std::fs::read_to_string(log_path) {
            Ok(text) => classifier.classify(&text),
            Err(e) => {
                log_warn!("[{}] Cannot read log {}: {}", key, log_path.display(), e);
                Outcome::Failure
            }
        },
        RunStatus::DirtyExit(code) => {
            log_debug!("[{}] Migrator exited non-zero (code {:?})", key, code);
            Outcome::Failure
        }
        RunStatus::Error(reason) => {
            log_warn!("[{}] Invocation error: {}", key, reason);
            Outcome::Failure
        }
    }
}

/// Log file name for the item at catalog position `idx`.
///
/// The position prefix keeps names injective: sanitization can flatten two
/// distinct keys into the same string, and two items must never share a log
/// file.
fn log_file_name(idx: usize, key: &str) -> String {
    format!("{:03}_{}.log", idx + 1, sanitize_key(key))
}

/// Item keys contain '/' separators; flatten them for log file names.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            c
        } else {
            '_'
        })
        .collect()
}
