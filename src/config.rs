use std::path::Path;

use serde::Deserialize;

use crate::error::RelayError;

/// Hard ceiling on concurrent invocations. The remote system rate-limits;
/// above this the throttling errors it returns are indistinguishable from
/// genuine migration failures to the marker classifier.
pub const MAX_CONCURRENT_CEILING: u32 = 5;

/// Placeholders the migrator arg template may reference.
const KNOWN_PLACEHOLDERS: [&str; 6] = [
    "source_org",
    "source_project",
    "repo_name",
    "target_org",
    "target_repo",
    "visibility",
];

#[derive(Default, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    pub execution: ExecutionConfig,
    pub migrator: MigratorConfig,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    pub max_concurrent: u32,
    /// Optional per-invocation timeout. 0 disables it: the external system
    /// enforces its own timeouts, so the default is off; a wedged invocation
    /// then occupies one slot until it exits.
    pub invocation_timeout_minutes: u32,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct MigratorConfig {
    /// External migration command. Opaque to the core: it receives the item's
    /// descriptor fields via `args`, writes progress to the log path we give
    /// it, and exits.
    pub program: String,
    /// Argument template; `{field}` placeholders are substituted from the
    /// work item before spawning.
    pub args: Vec<String>,
    /// Terminal marker that must appear in the log for a Success verdict.
    pub success_marker: String,
    /// Marker meaning the tool did nothing (e.g. destination already exists).
    /// Classified as Failure (fail-closed).
    pub noop_marker: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            invocation_timeout_minutes: 0,
        }
    }
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            program: "gh-repo-migrate".to_string(),
            args: vec![
                "--source-org".to_string(),
                "{source_org}".to_string(),
                "--source-project".to_string(),
                "{source_project}".to_string(),
                "--repo".to_string(),
                "{repo_name}".to_string(),
                "--target-org".to_string(),
                "{target_org}".to_string(),
                "--target-repo".to_string(),
                "{target_repo}".to_string(),
                "--visibility".to_string(),
                "{visibility}".to_string(),
            ],
            success_marker: "Migration completed successfully".to_string(),
            noop_marker: "skipping migration".to_string(),
        }
    }
}

pub fn validate(config: &RelayConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.execution.max_concurrent < 1 {
        errors.push("execution.max_concurrent must be >= 1".to_string());
    }

    if config.execution.max_concurrent > MAX_CONCURRENT_CEILING {
        errors.push(format!(
            "execution.max_concurrent must be <= {} (remote rate limit)",
            MAX_CONCURRENT_CEILING
        ));
    }

    if config.migrator.program.trim().is_empty() {
        errors.push("migrator.program must not be empty".to_string());
    }

    if config.migrator.success_marker.trim().is_empty() {
        errors.push("migrator.success_marker must not be empty".to_string());
    }

    if config.migrator.noop_marker.trim().is_empty() {
        errors.push("migrator.noop_marker must not be empty".to_string());
    }

    for arg in &config.migrator.args {
        for placeholder in extract_placeholders(arg) {
            if !KNOWN_PLACEHOLDERS.contains(&placeholder.as_str()) {
                errors.push(format!(
                    "migrator.args: unknown placeholder '{{{}}}' in '{}'. Supported: {}",
                    placeholder,
                    arg,
                    KNOWN_PLACEHOLDERS.join(", ")
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Pull `{name}` placeholder names out of one arg template token.
fn extract_placeholders(arg: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = arg;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start + 1..].find('}') else {
            break;
        };
        found.push(rest[start + 1..start + 1 + len].to_string());
        rest = &rest[start + 1 + len + 1..];
    }
    found
}

/// Load config from `repo-relay.toml` under `root`, or defaults when absent.
pub fn load_config(root: &Path) -> Result<RelayConfig, RelayError> {
    load_config_from(None, root)
}

/// Load config from an explicit path, or `{root}/repo-relay.toml` when none
/// is given. A missing default-path file yields defaults; a missing explicit
/// path is an error.
pub fn load_config_from(
    config_path: Option<&Path>,
    root: &Path,
) -> Result<RelayConfig, RelayError> {
    let (path, explicit) = match config_path {
        Some(p) => (p.to_path_buf(), true),
        None => (root.join("repo-relay.toml"), false),
    };

    if !path.exists() {
        if explicit {
            return Err(RelayError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return Ok(RelayConfig::default());
    }

    let contents = std::fs::read_to_string(&path)
        .map_err(|e| RelayError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

    let config: RelayConfig = toml::from_str(&contents)
        .map_err(|e| RelayError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    validate(&config).map_err(|errors| {
        RelayError::Config(format!(
            "Config validation failed:\n{}",
            errors
                .iter()
                .map(|e| format!("  - {}", e))
                .collect::<Vec<_>>()
                .join("\n")
        ))
    })?;

    Ok(config)
}

/// Contents written by `repo-relay init`.
pub fn default_config_toml() -> String {
    r#"[execution]
max_concurrent = 3            # 1..=5; the remote system throttles above 5
invocation_timeout_minutes = 0  # 0 = rely on the external tool's own timeout

[migrator]
program = "gh-repo-migrate"
args = [
    "--source-org", "{source_org}",
    "--source-project", "{source_project}",
    "--repo", "{repo_name}",
    "--target-org", "{target_org}",
    "--target-repo", "{target_repo}",
    "--visibility", "{visibility}",
]
success_marker = "Migration completed successfully"
noop_marker = "skipping migration"
"#
    .to_string()
}
