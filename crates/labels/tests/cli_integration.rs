//! Integration tests for the z80-labels CLI.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use env_logger as _;
use glob as _;
use indexmap as _;
use labels as _;
use log as _;
use memory_model as _;
use proptest as _;
use regex as _;
use rstest as _;
use serde as _;
use serde_json as _;
use thiserror as _;

fn binary_path() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.join("z80-labels")
}

fn create_temp_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(binary_path())
        .args(args)
        .output()
        .expect("failed to run z80-labels")
}

fn project(dir: &Path) -> PathBuf {
    create_temp_file(
        dir,
        "game.list",
        "\
; Reverse engineered game
SPEED:  EQU 0x0400
C000 3E 05  start:  LD A,5   ; WPMEM
C002 00     .loop:  NOP
C003 C9             RET
",
    );
    create_temp_file(
        dir,
        "launch.json",
        r#"{ "memoryModel": "RAM", "revEng": [{ "path": "game.list" }] }"#,
    )
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn check_prints_counts() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = project(temp_dir.path());

    let output = run(&["check", config.to_str().unwrap()]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Memory model: RAM"));
    assert!(text.contains("Labels: 3"));
    assert!(text.contains("WPMEM: 1, ASSERTION: 0, LOGPOINT: 0"));
}

#[test]
fn label_prints_value_and_location() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = project(temp_dir.path());

    let output = run(&["label", config.to_str().unwrap(), "start.loop"]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("start.loop = 0xC002 (114690)"));
    assert!(text.contains("game.list:4"));
}

#[test]
fn addr_prints_line_and_nearest_label() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = project(temp_dir.path());

    let output = run(&["addr", config.to_str().unwrap(), "$C003"]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("game.list:5"));
    assert!(text.contains("start.loop+1"));
}

#[test]
fn line_prints_the_address() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = project(temp_dir.path());
    let list = temp_dir.path().join("game.list");

    let output = run(&["line", config.to_str().unwrap(), list.to_str().unwrap(), "3"]);

    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "0xC000");
}

#[test]
fn banks_prints_the_layout() {
    let output = run(&["banks", "ZX128K"]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.starts_with("ZX128K"));
    assert!(text.contains("slot 3: 0xC000-0xFFFF"));
}

#[test]
fn unknown_label_fails() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = project(temp_dir.path());

    let output = run(&["label", config.to_str().unwrap(), "missing"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown label: missing"));
}

#[test]
fn missing_config_fails() {
    let output = run(&["check", "does-not-exist.json"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Could not read"));
}

#[test]
fn unknown_model_fails() {
    let output = run(&["banks", "C64"]);

    assert_eq!(output.status.code(), Some(1));
}
