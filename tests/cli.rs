// ABOUTME: Integration tests for the caravel CLI commands.
// ABOUTME: Validates --help output, init behavior and argument checking.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn caravel_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("caravel"))
}

#[test]
fn help_shows_commands() {
    caravel_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("register"))
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn init_creates_config_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("caravel.yml");

    caravel_cmd()
        .current_dir(temp_dir.path())
        .arg("init")
        .assert()
        .success();

    assert!(config_path.exists(), "caravel.yml should be created");
    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("namespace:"), "config should name a namespace");
}

#[test]
fn init_uses_given_namespace_and_domain() {
    let temp_dir = tempfile::tempdir().unwrap();

    caravel_cmd()
        .current_dir(temp_dir.path())
        .args(["init", "--namespace", "team", "--root-domain", "paas.example.org"])
        .assert()
        .success();

    let content = fs::read_to_string(temp_dir.path().join("caravel.yml")).unwrap();
    assert!(content.contains("namespace: team"));
    assert!(content.contains("root_domain: paas.example.org"));
}

#[test]
fn init_refuses_to_overwrite_existing_config() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("caravel.yml");

    fs::write(&config_path, "existing: config").unwrap();

    caravel_cmd()
        .current_dir(temp_dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    let content = fs::read_to_string(&config_path).unwrap();
    assert_eq!(content, "existing: config", "file should be unchanged");
}

#[test]
fn init_force_overwrites_existing_config() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("caravel.yml");

    fs::write(&config_path, "existing: config").unwrap();

    caravel_cmd()
        .current_dir(temp_dir.path())
        .args(["init", "--force"])
        .assert()
        .success();

    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("namespace:"));
}

#[test]
fn deploy_without_source_fails() {
    let temp_dir = tempfile::tempdir().unwrap();

    caravel_cmd()
        .current_dir(temp_dir.path())
        .args(["deploy", "demo"])
        .assert()
        .failure();
}

#[test]
fn deploy_with_two_sources_fails() {
    let temp_dir = tempfile::tempdir().unwrap();

    caravel_cmd()
        .current_dir(temp_dir.path())
        .args(["deploy", "demo", "--image", "nginx:latest", "--tarball", "app.tar"])
        .assert()
        .failure();
}

#[test]
fn git_source_requires_branch() {
    let temp_dir = tempfile::tempdir().unwrap();

    caravel_cmd()
        .current_dir(temp_dir.path())
        .args(["deploy", "demo", "--git", "https://example.com/app.git"])
        .assert()
        .failure();
}

#[test]
fn invalid_app_name_is_rejected() {
    let temp_dir = tempfile::tempdir().unwrap();

    caravel_cmd()
        .current_dir(temp_dir.path())
        .args(["status", "Not_Valid"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid name"));
}

#[test]
fn status_without_config_fails() {
    let temp_dir = tempfile::tempdir().unwrap();

    caravel_cmd()
        .current_dir(temp_dir.path())
        .args(["status", "demo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration file not found"));
}
