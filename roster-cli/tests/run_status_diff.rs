use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn roster_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("roster"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("RUST_LOG", "warn");
    cmd
}

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/band.json")
}

fn document(home: &TempDir) -> PathBuf {
    home.path().join(".roster").join("roster.md")
}

fn init_band(home: &TempDir) {
    roster_cmd(home.path())
        .args(["init", "--identity", "admin@example.org", "--snapshot"])
        .arg(fixture())
        .assert()
        .success()
        .stdout(contains("config.yaml"));
}

fn status_json(home: &TempDir) -> serde_json::Value {
    let output = roster_cmd(home.path())
        .args(["status", "--json"])
        .output()
        .expect("run status");
    assert!(output.status.success(), "status failed: {output:?}");
    serde_json::from_slice(&output.stdout).expect("status JSON")
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let home = TempDir::new().expect("home");
    init_band(&home);

    roster_cmd(home.path())
        .args(["init", "--identity", "other@example.org"])
        .assert()
        .failure()
        .stderr(contains("already exists"));

    roster_cmd(home.path())
        .args(["init", "--force", "--identity", "admin@example.org", "--snapshot"])
        .arg(fixture())
        .assert()
        .success();
}

#[test]
fn dry_run_writes_nothing() {
    let home = TempDir::new().expect("home");
    init_band(&home);

    roster_cmd(home.path())
        .args(["run", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("[dry-run]"))
        .stdout(contains("no sync baseline"));

    assert!(!document(&home).exists());
    assert!(!home.path().join(".roster/properties.yaml").exists());
    let status = status_json(&home);
    assert_eq!(status["document_state"], "missing");
    assert!(status["sync_token"].is_null());
}

#[test]
fn run_then_status_reports_current_document() {
    let home = TempDir::new().expect("home");
    init_band(&home);

    roster_cmd(home.path())
        .arg("run")
        .assert()
        .success()
        .stdout(contains("roster regenerated"));

    let text = fs::read_to_string(document(&home)).expect("document");
    assert!(text.contains("- Pipe Major: Angus Bell"));
    assert!(text.contains("**Drummers**"));

    roster_cmd(home.path())
        .arg("run")
        .assert()
        .success()
        .stdout(contains("roster up to date"));

    let status = status_json(&home);
    assert_eq!(status["document_state"], "current");
    assert_eq!(status["sync_token"], "t2");
    assert_eq!(status["format"], "markdown");
    assert_eq!(status["last_run"]["ok"], true);
    assert_eq!(status["last_run"]["regenerated"], false);
}

#[test]
fn edited_document_shows_as_modified_and_in_diff() {
    let home = TempDir::new().expect("home");
    init_band(&home);
    roster_cmd(home.path()).arg("run").assert().success();

    let path = document(&home);
    let mut text = fs::read_to_string(&path).expect("document");
    text.push_str("- Rogue Entry\n");
    fs::write(&path, text).expect("edit document");

    assert_eq!(status_json(&home)["document_state"], "modified");

    let assert = roster_cmd(home.path()).arg("diff").assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");
    assert!(
        stdout
            .lines()
            .any(|line| line.starts_with('-') && line.contains("Rogue Entry")),
        "expected the manual edit as a removed line:\n{stdout}"
    );

    roster_cmd(home.path())
        .args(["run", "--force"])
        .assert()
        .success()
        .stdout(contains("forced"));
    assert!(!fs::read_to_string(&path).expect("document").contains("Rogue Entry"));

    roster_cmd(home.path())
        .arg("diff")
        .assert()
        .success()
        .stdout(contains("No differences"));
}

#[test]
fn missing_identity_fails_the_run() {
    let home = TempDir::new().expect("home");
    roster_cmd(home.path())
        .arg("init")
        .arg("--snapshot")
        .arg(fixture())
        .assert()
        .success()
        .stdout(contains("set `identity`"));

    roster_cmd(home.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(contains("no identity configured"));

    let status = status_json(&home);
    assert_eq!(status["last_run"]["ok"], false);
}
