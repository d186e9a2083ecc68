//! Integration tests for the revsync binary.

use std::path::Path;
use std::process::Command as StdCommand;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use revsync::core::payload::RevisionInput;
use revsync::core::revision::{ObjectKind, RawObject, RefUpdateRequest, RevisionBundle};
use revsync::core::types::RefName;

fn revsync() -> Command {
    let mut cmd = Command::cargo_bin("revsync").unwrap();
    cmd.env_remove("REVSYNC_CONFIG")
        .env_remove("XDG_CONFIG_HOME")
        .env_remove("RUST_LOG");
    cmd
}

fn run_git(dir: &Path, args: &[&str]) {
    let output = StdCommand::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Base directory with `project.git` and a config file pointing at it.
struct Setup {
    dir: TempDir,
}

impl Setup {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let repo = dir.path().join("project.git");
        std::fs::create_dir_all(&repo).unwrap();
        run_git(&repo, &["init", "--bare", "--quiet"]);
        std::fs::write(
            dir.path().join("config.toml"),
            format!("base_path = {:?}\n", dir.path().to_string_lossy()),
        )
        .unwrap();
        Self { dir }
    }

    fn config(&self) -> String {
        self.dir.path().join("config.toml").to_string_lossy().into_owned()
    }

    fn write_payload(&self, requests: &[RefUpdateRequest]) -> String {
        let inputs: Vec<RevisionInput> = requests.iter().map(RevisionInput::from_request).collect();
        let path = self.dir.path().join("payload.json");
        std::fs::write(&path, serde_json::to_string(&inputs).unwrap()).unwrap();
        path.to_string_lossy().into_owned()
    }
}

fn content_request(r: &str, content: &str) -> RefUpdateRequest {
    let blob = RawObject::hashed(ObjectKind::Blob, content.as_bytes().to_vec());
    RefUpdateRequest::new(
        RefName::new(r).unwrap(),
        RevisionBundle::content(vec![blob]).unwrap(),
    )
    .with_source("origin")
}

#[test]
fn help_lists_commands() {
    revsync()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn config_shows_defaults_and_file() {
    let setup = Setup::new();
    revsync()
        .args(["config", "--config", &setup.config()])
        .assert()
        .success()
        .stdout(predicate::str::contains("atomic = true"))
        .stdout(predicate::str::contains("refs/draft-comments/"));
}

#[test]
fn config_rejects_unknown_keys() {
    let setup = Setup::new();
    let path = setup.dir.path().join("bad.toml");
    std::fs::write(&path, "colour = \"blue\"\n").unwrap();

    revsync()
        .args(["config", "--config", &path.to_string_lossy()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn apply_creates_ref() {
    let setup = Setup::new();
    let payload = setup.write_payload(&[content_request("refs/meta/config", "v1")]);

    revsync()
        .args([
            "apply",
            "--config",
            &setup.config(),
            "--repo",
            "project",
            &payload,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("refs/meta/config"))
        .stdout(predicate::str::contains("created"));
}

#[test]
fn apply_json_output() {
    let setup = Setup::new();
    let payload = setup.write_payload(&[content_request("refs/meta/config", "v1")]);

    let output = revsync()
        .args([
            "apply",
            "--config",
            &setup.config(),
            "--repo",
            "project",
            "--json",
            &payload,
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["refs"][0]["ref_name"], "refs/meta/config");
    assert_eq!(json["refs"][0]["result"], "created");
}

#[test]
fn apply_unknown_repository_fails() {
    let setup = Setup::new();
    let payload = setup.write_payload(&[content_request("refs/meta/config", "v1")]);

    revsync()
        .args([
            "apply",
            "--config",
            &setup.config(),
            "--repo",
            "elsewhere",
            &payload,
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("repository not found"));
}

#[test]
fn apply_rejects_malformed_payload() {
    let setup = Setup::new();
    let path = setup.dir.path().join("payload.json");
    std::fs::write(&path, "{ not json").unwrap();

    revsync()
        .args([
            "apply",
            "--config",
            &setup.config(),
            "--repo",
            "project",
            &path.to_string_lossy(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse payload"));
}

#[test]
fn completion_generates_script() {
    revsync()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("revsync"));
}
