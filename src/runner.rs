use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::MigratorConfig;
use crate::log_debug;
use crate::types::WorkItem;

/// How one external invocation ended, before classification.
///
/// The scheduler maps `DirtyExit` and `Error` straight to a Failure row;
/// `CleanExit` defers to the log classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Process exited with status zero.
    CleanExit,
    /// Process exited non-zero (code, when one was reported).
    DirtyExit(Option<i32>),
    /// The invocation never produced an exit status: spawn failure, wait
    /// error, or timeout. Treated identically to DirtyExit downstream.
    Error(String),
}

/// Trait for running the external migration tool. Enables mocking in
/// scheduler and pipeline tests.
pub trait MigrationRunner: Send + Sync {
    /// Run one migration, directing all of its output to `log_path`.
    ///
    /// Implementations must never write item output to the shared console;
    /// the per-item log is the only channel, so concurrent invocations
    /// cannot interleave.
    fn run_migration(
        &self,
        item: &WorkItem,
        log_path: &Path,
    ) -> impl std::future::Future<Output = RunStatus> + Send;
}

/// Real implementation that spawns the configured migrator command.
pub struct CommandRunner {
    config: MigratorConfig,
    timeout: Option<Duration>,
}

impl CommandRunner {
    pub fn new(config: MigratorConfig, timeout: Option<Duration>) -> Self {
        Self { config, timeout }
    }

    /// Verify that the configured migrator is spawnable at all.
    pub async fn verify_available(&self) -> Result<(), String> {
        match tokio::process::Command::new(&self.config.program)
            .arg("--version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => Err(format!(
                "Migrator '{}' not found on PATH ({})",
                self.config.program, e
            )),
        }
    }

    /// Substitute `{field}` placeholders in the arg template from the item.
    fn build_args(&self, item: &WorkItem) -> Vec<String> {
        self.config
            .args
            .iter()
            .map(|arg| {
                arg.replace("{source_org}", &item.source_org)
                    .replace("{source_project}", &item.source_project)
                    .replace("{repo_name}", &item.repo_name)
                    .replace("{target_org}", &item.target_org)
                    .replace("{target_repo}", &item.target_repo)
                    .replace("{visibility}", &item.visibility)
            })
            .collect()
    }
}

impl MigrationRunner for CommandRunner {
    async fn run_migration(&self, item: &WorkItem, log_path: &Path) -> RunStatus {
        let log_file = match std::fs::File::create(log_path) {
            Ok(f) => f,
            Err(e) => {
                return RunStatus::Error(format!(
                    "Failed to create log file {}: {}",
                    log_path.display(),
                    e
                ))
            }
        };
        // stderr shares the same file so the tool's diagnostics land in the
        // per-item log too
        let log_file_err = match log_file.try_clone() {
            Ok(f) => f,
            Err(e) => return RunStatus::Error(format!("Failed to clone log handle: {}", e)),
        };

        let mut cmd = tokio::process::Command::new(&self.config.program);
        cmd.args(self.build_args(item));
        cmd.stdin(std::process::Stdio::null());
        cmd.stdout(std::process::Stdio::from(log_file));
        cmd.stderr(std::process::Stdio::from(log_file_err));
        cmd.kill_on_drop(true);

        log_debug!("[runner] Spawning migrator for {}", item.key());
        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => return RunStatus::Error(format!("Failed to spawn migrator: {}", e)),
        };

        let wait_result = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, child.wait()).await {
                Ok(r) => r,
                Err(_) => {
                    let _ = child.kill().await;
                    let _ = child.wait().await;
                    return RunStatus::Error(format!(
                        "Invocation timed out after {}s",
                        timeout.as_secs()
                    ));
                }
            },
            None => child.wait().await,
        };

        match wait_result {
            Ok(status) if status.success() => RunStatus::CleanExit,
            Ok(status) => RunStatus::DirtyExit(status.code()),
            Err(e) => RunStatus::Error(format!("Error waiting for migrator: {}", e)),
        }
    }
}

// --- Mock runner ---

/// Scripted behavior for one item under `MockRunner`.
#[derive(Debug, Clone)]
pub struct MockOutcome {
    pub status: RunStatus,
    /// Written to the per-item log before returning.
    pub log_text: String,
}

impl MockOutcome {
    pub fn clean(log_text: &str) -> Self {
        Self {
            status: RunStatus::CleanExit,
            log_text: log_text.to_string(),
        }
    }

    pub fn crashed(code: i32) -> Self {
        Self {
            status: RunStatus::DirtyExit(Some(code)),
            log_text: "fatal: remote hung up unexpectedly\n".to_string(),
        }
    }
}

/// Mock migration runner for scheduler and pipeline tests.
///
/// Returns scripted outcomes per item key and tracks a concurrency
/// high-water mark so tests can assert the bound was never exceeded.
pub struct MockRunner {
    outcomes: HashMap<String, MockOutcome>,
    delay: Duration,
    in_flight: AtomicUsize,
    high_water: Arc<AtomicUsize>,
}

impl MockRunner {
    pub fn new(outcomes: HashMap<String, MockOutcome>) -> Self {
        Self {
            outcomes,
            delay: Duration::from_millis(20),
            in_flight: AtomicUsize::new(0),
            high_water: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Maximum number of invocations ever observed running at once.
    pub fn high_water_mark(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.high_water)
    }
}

impl MigrationRunner for MockRunner {
    async fn run_migration(&self, item: &WorkItem, log_path: &Path) -> RunStatus {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        let outcome = self
            .outcomes
            .get(&item.key())
            .cloned()
            .unwrap_or_else(|| MockOutcome::clean(""));

        let write_result = tokio::fs::write(log_path, &outcome.log_text).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Err(e) = write_result {
            return RunStatus::Error(format!("mock log write failed: {}", e));
        }
        outcome.status
    }
}
