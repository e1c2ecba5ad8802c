//! CLI integration tests
//!
//! Tests the pty-tunnel CLI surface using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;

fn pty_tunnel() -> Command {
    Command::cargo_bin("pty-tunnel")
        .expect("Failed to locate pty-tunnel binary - ensure it's built before running tests")
}

#[test]
fn test_cli_help() {
    pty_tunnel()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("pty-tunnel"))
        .stdout(predicate::str::contains("front"))
        .stdout(predicate::str::contains("host"));
}

#[test]
fn test_cli_version() {
    pty_tunnel()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pty-tunnel"));
}

#[test]
fn test_cli_front_help() {
    pty_tunnel()
        .args(["front", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--base64"))
        .stdout(predicate::str::contains("--no-eof"))
        .stdout(predicate::str::contains("--expect-greeting"))
        .stdout(predicate::str::contains("--cbreak"));
}

#[test]
fn test_cli_host_help() {
    pty_tunnel()
        .args(["host", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--pipe"))
        .stdout(predicate::str::contains("--greeting"));
}

#[test]
fn test_cli_front_requires_transport() {
    pty_tunnel()
        .arg("front")
        .assert()
        .failure()
        .stderr(predicate::str::contains("CMD"));
}

#[test]
fn test_cli_no_subcommand() {
    pty_tunnel().assert().failure();
}

#[test]
fn test_cli_bad_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "base64 = \"not a bool\"").unwrap();

    pty_tunnel()
        .args(["--config", path.to_str().unwrap(), "host", "--pipe", "--", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("configuration"));
}

#[test]
fn test_cli_missing_transport_program() {
    pty_tunnel()
        .args(["front", "--", "/nonexistent/pty-tunnel-transport"])
        .write_stdin("")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("/nonexistent/pty-tunnel-transport"));
}

#[test]
fn test_cli_config_init_and_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let path_arg = path.to_str().unwrap();

    pty_tunnel()
        .args(["--config", path_arg, "config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains(path_arg));
    assert!(path.exists());

    pty_tunnel()
        .args(["--config", path_arg, "config", "init"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already exists"));

    std::fs::write(&path, "greeting = \"HELLO\"\n").unwrap();
    pty_tunnel()
        .args(["--config", path_arg, "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("greeting = \"HELLO\""))
        .stdout(predicate::str::contains("[front]"));

    pty_tunnel()
        .args(["--config", path_arg, "config", "init", "--force"])
        .assert()
        .success();
    assert!(std::fs::read_to_string(&path)
        .unwrap()
        .contains("PTY_SLAVE_GREETING"));
}

#[test]
fn test_cli_config_path() {
    pty_tunnel()
        .args(["--config", "/tmp/somewhere.toml", "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::diff("/tmp/somewhere.toml\n"));
}
