//! Black-box tests of the `flowsmith` binary: output shape and exit codes

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const ISOLATED_ENV: &[&str] = &[
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "GEMINI_API_KEY",
    "FLOWSMITH_PROVIDER",
    "FLOWSMITH_STORE",
    "FLOWSMITH_ARTIFACTS_ROOT",
    "FLOWSMITH_SHARED_DIRS",
    "FLOWSMITH_SSH_HOST",
    "FLOWSMITH_SSH_PORT",
    "FLOWSMITH_SSH_PASSWORD",
    "RUST_LOG",
];

/// The binary run inside `dir`, with store and artifacts rooted there and no
/// ambient credentials or overrides.
fn flowsmith(dir: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_flowsmith"));
    cmd.current_dir(dir.path())
        .arg("--store")
        .arg(dir.path().join("store"))
        .arg("--artifacts-root")
        .arg(dir.path().join("generated_workflows"));
    for key in ISOLATED_ENV {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn test_help_lists_command_groups() {
    let dir = TempDir::new().unwrap();
    flowsmith(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("improve"))
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("connection"));
}

#[test]
fn test_unknown_subcommand_is_an_argument_error() {
    let dir = TempDir::new().unwrap();
    flowsmith(&dir).arg("frobnicate").assert().code(2);
}

#[test]
fn test_models_json_lists_catalog() {
    let dir = TempDir::new().unwrap();
    flowsmith(&dir)
        .args(["models", "--provider", "anthropic", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("claude-3-5-sonnet-20241022"))
        .stdout(predicate::str::contains("gpt-4o").not());
}

#[test]
fn test_models_with_unknown_provider_exits_2() {
    let dir = TempDir::new().unwrap();
    flowsmith(&dir)
        .args(["models", "--provider", "mistral"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not supported"));
}

#[test]
fn test_artifacts_list_on_empty_root() {
    let dir = TempDir::new().unwrap();
    flowsmith(&dir)
        .args(["artifacts", "list", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::diff("[]\n"));
}

#[test]
fn test_artifacts_resolve_without_keys_exits_2() {
    let dir = TempDir::new().unwrap();
    flowsmith(&dir).args(["artifacts", "resolve"]).assert().code(2);
}

#[test]
fn test_artifacts_show_finds_file_by_workflow_id() {
    let dir = TempDir::new().unwrap();
    let workflow = dir.path().join("generated_workflows").join("42");
    fs::create_dir_all(&workflow).unwrap();
    fs::write(workflow.join("model.py"), "x = 1\n").unwrap();

    flowsmith(&dir)
        .args(["artifacts", "show", "--workflow-id", "42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("model.py"))
        .stdout(predicate::str::contains("x = 1"));
}

#[test]
fn test_ask_without_credential_persists_failed_request() {
    let dir = TempDir::new().unwrap();
    flowsmith(&dir)
        .args(["ask", "hello"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("[failed]"))
        .stdout(predicate::str::contains("OPENAI_API_KEY"));

    flowsmith(&dir)
        .args(["request", "list", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"failed\""));
}

#[test]
fn test_request_show_rejects_malformed_id() {
    let dir = TempDir::new().unwrap();
    flowsmith(&dir)
        .args(["request", "show", "not-a-uuid"])
        .assert()
        .code(2);
}

#[test]
fn test_explicit_missing_config_file_exits_2() {
    let dir = TempDir::new().unwrap();
    flowsmith(&dir)
        .args(["--config", "nope.toml", "models"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nope.toml"));
}

#[test]
fn test_deploy_show_unknown_id_fails() {
    let dir = TempDir::new().unwrap();
    flowsmith(&dir)
        .args(["deploy", "show", "6f1c2a8e-3b7d-4c1e-9a2f-5d8e7b6c4a31"])
        .assert()
        .failure();
}
