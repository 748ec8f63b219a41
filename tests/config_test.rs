use std::path::Path;

use tempfile::TempDir;

use repo_relay::config::{
    load_config, load_config_from, validate, RelayConfig, MAX_CONCURRENT_CEILING,
};
use repo_relay::error::RelayError;

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("repo-relay.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn missing_default_path_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = load_config(dir.path()).unwrap();
    assert_eq!(config, RelayConfig::default());
    assert_eq!(config.execution.max_concurrent, 3);
    assert_eq!(config.execution.invocation_timeout_minutes, 0);
}

#[test]
fn missing_explicit_path_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = load_config_from(Some(Path::new("/nonexistent/relay.toml")), dir.path())
        .unwrap_err();
    match err {
        RelayError::Config(msg) => assert!(msg.contains("not found"), "{}", msg),
        other => panic!("expected Config error, got {:?}", other),
    }
}

#[test]
fn partial_toml_fills_in_defaults() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        r#"
[execution]
max_concurrent = 2
"#,
    );

    let config = load_config(dir.path()).unwrap();
    assert_eq!(config.execution.max_concurrent, 2);
    // Untouched sections keep their defaults
    assert_eq!(config.migrator.program, "gh-repo-migrate");
    assert_eq!(
        config.migrator.success_marker,
        "Migration completed successfully"
    );
}

#[test]
fn full_toml_round_trip() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        r#"
[execution]
max_concurrent = 5
invocation_timeout_minutes = 90

[migrator]
program = "custom-migrate"
args = ["--from", "{source_org}/{repo_name}", "--to", "{target_org}/{target_repo}"]
success_marker = "DONE"
noop_marker = "SKIPPED"
"#,
    );

    let config = load_config(dir.path()).unwrap();
    assert_eq!(config.execution.max_concurrent, 5);
    assert_eq!(config.execution.invocation_timeout_minutes, 90);
    assert_eq!(config.migrator.program, "custom-migrate");
    assert_eq!(config.migrator.args.len(), 4);
    assert_eq!(config.migrator.success_marker, "DONE");
}

#[test]
fn concurrency_above_ceiling_is_rejected() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        r#"
[execution]
max_concurrent = 6
"#,
    );

    let err = load_config(dir.path()).unwrap_err();
    match err {
        RelayError::Config(msg) => {
            assert!(msg.contains(&MAX_CONCURRENT_CEILING.to_string()), "{}", msg)
        }
        other => panic!("expected Config error, got {:?}", other),
    }
}

#[test]
fn zero_concurrency_is_rejected() {
    let mut config = RelayConfig::default();
    config.execution.max_concurrent = 0;
    let errors = validate(&config).unwrap_err();
    assert!(errors.iter().any(|e| e.contains(">= 1")));
}

#[test]
fn empty_markers_are_rejected() {
    let mut config = RelayConfig::default();
    config.migrator.success_marker = "  ".to_string();
    config.migrator.noop_marker = String::new();
    let errors = validate(&config).unwrap_err();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().any(|e| e.contains("success_marker")));
    assert!(errors.iter().any(|e| e.contains("noop_marker")));
}

#[test]
fn unknown_placeholder_is_rejected() {
    let mut config = RelayConfig::default();
    config.migrator.args.push("--team".to_string());
    config.migrator.args.push("{team_name}".to_string());
    let errors = validate(&config).unwrap_err();
    assert!(errors.iter().any(|e| e.contains("team_name")), "{:?}", errors);
}

#[test]
fn malformed_toml_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "[execution\nmax_concurrent = 3");
    let err = load_config(dir.path()).unwrap_err();
    assert!(matches!(err, RelayError::Config(_)));
}
