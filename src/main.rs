use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use repo_relay::aggregate;
use repo_relay::catalog;
use repo_relay::classify::MarkerClassifier;
use repo_relay::config::{self, MAX_CONCURRENT_CEILING};
use repo_relay::error::{RelayError, EXIT_PARTIAL};
use repo_relay::ledger::Ledger;
use repo_relay::log::parse_log_level;
use repo_relay::runner::CommandRunner;
use repo_relay::scheduler::{self, RunSummary};
use repo_relay::stage;
use repo_relay::types::{StageVerdict, WorkItem};
use repo_relay::{log_error, log_info};

const MAX_CATALOG_PREVIEW_ITEMS: usize = 3;

fn log_banner() {
    log_info!(
        "--- repo-relay ({}) ---",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    log_info!("");
}

#[derive(Parser)]
#[command(name = "repo-relay", about = "Batch repository migration runner")]
struct Cli {
    /// Working directory (defaults to current directory)
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Path to config file (defaults to {root}/repo-relay.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log verbosity level (error, warn, info, debug)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default repo-relay.toml
    Init,
    /// Run a stage from a CSV work catalog
    Run {
        /// Work catalog CSV (header row required; columns matched by name)
        #[arg(long)]
        catalog: PathBuf,
        /// Where to write this stage's ledger
        #[arg(long)]
        ledger: PathBuf,
        /// Directory for per-item invocation logs
        #[arg(long)]
        logs_dir: PathBuf,
        /// Concurrency override (1..=5; defaults to execution.max_concurrent)
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Run a downstream stage on the predecessor ledger's success subset
    Next {
        /// Predecessor stage's terminal ledger
        #[arg(long)]
        from: PathBuf,
        /// Where to write this stage's ledger
        #[arg(long)]
        ledger: PathBuf,
        /// Directory for per-item invocation logs
        #[arg(long)]
        logs_dir: PathBuf,
        /// Concurrency override (1..=5; defaults to execution.max_concurrent)
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Print the verdict of a terminal ledger and exit-code it
    Verdict {
        /// Ledger file to aggregate
        #[arg(long)]
        ledger: PathBuf,
        /// Emit the summary as JSON on stdout
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match parse_log_level(&cli.log_level) {
        Ok(level) => repo_relay::log::set_log_level(level),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }

    let root = &cli.root;

    let result = match cli.command {
        Commands::Init => handle_init(root),
        Commands::Run {
            catalog,
            ledger,
            logs_dir,
            limit,
        } => {
            handle_run(
                root,
                cli.config.as_deref(),
                &catalog,
                &ledger,
                &logs_dir,
                limit,
            )
            .await
        }
        Commands::Next {
            from,
            ledger,
            logs_dir,
            limit,
        } => {
            handle_next(
                root,
                cli.config.as_deref(),
                &from,
                &ledger,
                &logs_dir,
                limit,
            )
            .await
        }
        Commands::Verdict { ledger, json } => handle_verdict(&ledger, json),
    };

    match result {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            log_error!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

fn handle_init(root: &Path) -> Result<i32, RelayError> {
    let config_path = root.join("repo-relay.toml");
    if config_path.exists() {
        return Err(RelayError::Config(format!(
            "{} already exists",
            config_path.display()
        )));
    }

    std::fs::write(&config_path, config::default_config_toml()).map_err(|e| {
        RelayError::Config(format!("Failed to write {}: {}", config_path.display(), e))
    })?;

    println!("Initialized repo-relay config at {}", config_path.display());
    Ok(0)
}

async fn handle_run(
    root: &Path,
    config_path: Option<&Path>,
    catalog_path: &Path,
    ledger_path: &Path,
    logs_dir: &Path,
    limit: Option<u32>,
) -> Result<i32, RelayError> {
    log_banner();

    let config = config::load_config_from(config_path, root)?;
    let max_concurrent = resolve_limit(&config, limit)?;

    log_info!("[pre] Loading catalog {}...", catalog_path.display());
    let items = catalog::load(catalog_path)?;
    log_catalog_summary(&items);

    run_stage_with_config(&config, items, ledger_path, logs_dir, max_concurrent).await
}

async fn handle_next(
    root: &Path,
    config_path: Option<&Path>,
    predecessor_ledger: &Path,
    ledger_path: &Path,
    logs_dir: &Path,
    limit: Option<u32>,
) -> Result<i32, RelayError> {
    log_banner();

    let config = config::load_config_from(config_path, root)?;
    let max_concurrent = resolve_limit(&config, limit)?;

    // Precondition: the predecessor's terminal ledger is the only legitimate
    // input. Its absence is a broken handoff, never a cue to reprocess the
    // original catalog.
    log_info!(
        "[pre] Filtering predecessor ledger {}...",
        predecessor_ledger.display()
    );
    let items = stage::success_subset(predecessor_ledger)?;
    log_info!(
        "[pre] {} item(s) eligible from predecessor stage",
        items.len()
    );
    log_catalog_summary(&items);

    run_stage_with_config(&config, items, ledger_path, logs_dir, max_concurrent).await
}

async fn run_stage_with_config(
    config: &config::RelayConfig,
    items: Vec<WorkItem>,
    ledger_path: &Path,
    logs_dir: &Path,
    max_concurrent: u32,
) -> Result<i32, RelayError> {
    log_info!(
        "[config] Execution: max_concurrent={}, timeout={}",
        max_concurrent,
        if config.execution.invocation_timeout_minutes == 0 {
            "none".to_string()
        } else {
            format!("{}min", config.execution.invocation_timeout_minutes)
        }
    );
    log_info!("[config] Migrator: {}", config.migrator.program);
    log_info!("");

    let timeout = match config.execution.invocation_timeout_minutes {
        0 => None,
        minutes => Some(Duration::from_secs(minutes as u64 * 60)),
    };

    let runner = CommandRunner::new(config.migrator.clone(), timeout);
    if let Err(e) = runner.verify_available().await {
        return Err(RelayError::Config(e));
    }

    let classifier = MarkerClassifier::from_config(&config.migrator);

    let summary = scheduler::run_stage(
        items,
        ledger_path,
        logs_dir,
        Arc::new(runner),
        &classifier,
        max_concurrent as usize,
    )
    .await?;

    log_info!("");
    log_info!("Ledger written to {}", ledger_path.display());
    Ok(summary_exit_code(&summary))
}

fn handle_verdict(ledger_path: &Path, json: bool) -> Result<i32, RelayError> {
    if !ledger_path.exists() {
        return Err(RelayError::MissingLedger(ledger_path.to_path_buf()));
    }

    let rows = Ledger::load(ledger_path)?;
    aggregate::require_terminal(&rows)?;
    let counts = aggregate::count(&rows);
    let verdict = aggregate::aggregate(&rows);

    if json {
        let payload = serde_json::json!({
            "verdict": verdict,
            "total": counts.total,
            "successes": counts.successes,
            "failures": counts.failures,
            "pending": counts.pending,
            "in_progress": counts.in_progress,
        });
        println!("{}", payload);
    } else {
        println!(
            "{}: {} succeeded, {} failed, {} total",
            verdict, counts.successes, counts.failures, counts.total
        );
    }

    match verdict {
        StageVerdict::Empty => Err(RelayError::EmptyStage),
        StageVerdict::Failed => Err(RelayError::AllFailed {
            failed: counts.failures,
        }),
        StageVerdict::Succeeded => Ok(0),
        StageVerdict::SucceededWithIssues => Ok(EXIT_PARTIAL),
    }
}

fn resolve_limit(config: &config::RelayConfig, limit: Option<u32>) -> Result<u32, RelayError> {
    let effective = limit.unwrap_or(config.execution.max_concurrent);
    if effective < 1 || effective > MAX_CONCURRENT_CEILING {
        return Err(RelayError::Config(format!(
            "Concurrency limit {} out of range (1..={})",
            effective, MAX_CONCURRENT_CEILING
        )));
    }
    Ok(effective)
}

/// Exit-code contract: 0 = proceed on the full set, 3 = proceed on the
/// success subset only. Fatal verdicts never reach here; run_stage returns
/// them as errors.
fn summary_exit_code(summary: &RunSummary) -> i32 {
    match summary.verdict {
        StageVerdict::SucceededWithIssues => EXIT_PARTIAL,
        _ => 0,
    }
}

fn log_catalog_summary(items: &[WorkItem]) {
    log_info!("[catalog] {} item(s)", items.len());
    for item in items.iter().take(MAX_CATALOG_PREVIEW_ITEMS) {
        log_info!("  {} -> {}", item.key(), item.target_key());
    }
    if items.len() > MAX_CATALOG_PREVIEW_ITEMS {
        log_info!("  ...");
    }
}
