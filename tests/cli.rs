// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const DEFINITION: &str = r#"
pipelines:
  - name: etl
    steps:
      - name: extract
        run: "echo extracting > extracted.txt"
      - name: transform
        run: "cat extracted.txt && echo \"day=$PIPEFLOW_PARAM_DAY\""
        depends_on: [extract]
      - name: load
        run: "echo loaded"
        depends_on: [transform]
  - name: broken
    steps:
      - name: ok
        run: "echo fine"
      - name: fail
        run: "echo oops >&2; exit 3"
        depends_on: [ok]
      - name: never
        run: "touch never-ran"
        depends_on: [fail]
triggers:
  - id: nightly
    pipeline: etl
    kind: schedule
    schedule: "0 2 * * *"
  - id: hook
    pipeline: etl
    kind: webhook
    endpoint: /hooks/etl
"#;

fn project(definition: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("pipeflow.yaml"), definition).unwrap();
    temp
}

fn pipeflow(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pipeflow").unwrap();
    cmd.arg("-C").arg(dir).env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

#[test]
fn list_shows_pipelines_and_triggers() {
    let temp = project(DEFINITION);

    pipeflow(temp.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("etl"))
        .stdout(predicate::str::contains("broken"))
        .stdout(predicate::str::contains("[depends: extract]"))
        .stdout(predicate::str::contains("cron '0 2 * * *'"))
        .stdout(predicate::str::contains("POST /hooks/etl"));
}

#[test]
fn run_executes_steps_in_order() {
    let temp = project(DEFINITION);

    pipeflow(temp.path())
        .args(["-v", "run", "etl", "--param", "day=mon"])
        .assert()
        .success()
        .stdout(predicate::str::contains("extracting"))
        .stdout(predicate::str::contains("day=mon"))
        .stdout(predicate::str::contains("Pipeline completed successfully"));

    assert!(temp.path().join("extracted.txt").exists());
}

#[test]
fn run_stops_at_failing_step() {
    let temp = project(DEFINITION);

    pipeflow(temp.path())
        .args(["run", "broken"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Pipeline failed"))
        .stderr(predicate::str::contains("fail"));

    assert!(!temp.path().join("never-ran").exists());
}

#[test]
fn run_unknown_pipeline_fails() {
    let temp = project(DEFINITION);

    pipeflow(temp.path())
        .args(["run", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ghost"));
}

#[test]
fn missing_definition_fails() {
    let temp = TempDir::new().unwrap();

    pipeflow(temp.path())
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Definition file not found"));
}

#[test]
fn validate_accepts_good_definition() {
    let temp = project(DEFINITION);

    pipeflow(temp.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Definition is valid!"));
}

#[test]
fn validate_reports_cycles() {
    let temp = project(
        r#"
pipelines:
  - name: loop
    steps:
      - name: a
        run: "true"
        depends_on: [c]
      - name: b
        run: "true"
        depends_on: [a]
      - name: c
        run: "true"
        depends_on: [b]
"#,
    );

    pipeflow(temp.path())
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("contains cycles"))
        .stdout(predicate::str::contains("a -> b -> c"));
}

#[test]
fn validate_warns_about_undefined_pipeline() {
    let temp = project(
        r#"
pipelines:
  - name: real
    steps:
      - name: a
        run: "true"
triggers:
  - id: orphan
    pipeline: imaginary
    kind: webhook
    endpoint: /orphan
"#,
    );

    pipeflow(temp.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("undefined pipeline 'imaginary'"));
}

#[test]
fn graph_renders_formats() {
    let temp = project(DEFINITION);

    pipeflow(temp.path())
        .args(["graph", "etl"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1. extract"))
        .stdout(predicate::str::contains("3. load"));

    pipeflow(temp.path())
        .args(["graph", "etl", "--format", "mermaid"])
        .assert()
        .success()
        .stdout(predicate::str::contains("graph TD"))
        .stdout(predicate::str::contains("n0[\"extract\"]"))
        .stdout(predicate::str::contains("n1[\"transform\"]"))
        .stdout(predicate::str::contains("n0 --> n1"));

    pipeflow(temp.path())
        .args(["graph", "etl", "-f", "dot"])
        .assert()
        .success()
        .stdout(predicate::str::contains("digraph \"etl\""));
}

#[test]
fn toml_definition_is_supported() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("flows.toml"),
        r#"
[[pipelines]]
name = "hello"

[[pipelines.steps]]
name = "greet"
run = "echo hello from toml"
"#,
    )
    .unwrap();

    pipeflow(temp.path())
        .args(["-c", "flows.toml", "-v", "run", "hello"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hello from toml"));
}
