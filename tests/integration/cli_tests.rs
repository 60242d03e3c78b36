//! CLI integration tests
//!
//! These tests run the binary against snapshots written to a temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use classshrink::model::{AccessFlags, ClassBuilder, ClassPath, Snapshot};

/// Write a snapshot with one entry point, one helper it calls and one dead class
fn write_snapshot(dir: &Path) -> PathBuf {
    let mut path = ClassPath::new();
    let mut main = ClassBuilder::new("com/example/Main", AccessFlags::PUBLIC).super_class("java/lang/Object");
    let helper = main.method_ref("com/example/Helper", "help", "()V");
    main.add_method(
        AccessFlags::PUBLIC | AccessFlags::STATIC,
        "main",
        "([Ljava/lang/String;)V",
        vec![classshrink::model::Instruction::Constant {
            opcode: classshrink::model::opcode::INVOKESTATIC,
            index: helper,
            constant: 0,
        }],
    );
    path.add(main.build());

    let mut helper = ClassBuilder::new("com/example/Helper", AccessFlags::PUBLIC).super_class("java/lang/Object");
    helper.add_method(AccessFlags::PUBLIC | AccessFlags::STATIC, "help", "()V", vec![]);
    helper.add_method(AccessFlags::PUBLIC | AccessFlags::STATIC, "unused", "()V", vec![]);
    path.add(helper.build());

    path.add(ClassBuilder::new("com/example/Dead", AccessFlags::PUBLIC).build());

    let file = dir.join("input.json");
    let json = Snapshot::from_class_path(&path).to_json().unwrap();
    std::fs::write(&file, json).unwrap();
    file
}

fn classshrink(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("classshrink").unwrap();
    cmd.current_dir(dir.path());
    cmd
}

fn read_output(file: &Path) -> Snapshot {
    Snapshot::from_json(&std::fs::read_to_string(file).unwrap()).unwrap()
}

fn program_names(snapshot: &Snapshot) -> Vec<String> {
    let mut names: Vec<String> = snapshot.program.iter().map(|c| c.name().to_string()).collect();
    names.sort();
    names
}

#[test]
fn test_help() {
    Command::cargo_bin("classshrink")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--keep"))
        .stdout(predicate::str::contains("--why-are-you-keeping"));
}

#[test]
fn test_version() {
    Command::cargo_bin("classshrink")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("classshrink"));
}

#[test]
fn test_shrinks_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_snapshot(dir.path());
    let output = dir.path().join("out.json");

    classshrink(&dir)
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .args(["--keep", "com.example.Main#main", "-q"])
        .assert()
        .success();

    let snapshot = read_output(&output);
    assert_eq!(
        program_names(&snapshot),
        vec!["com/example/Helper", "com/example/Main"]
    );
    let helper = snapshot
        .program
        .iter()
        .find(|c| c.name() == "com/example/Helper")
        .unwrap();
    assert_eq!(helper.methods.len(), 1);
}

#[test]
fn test_missing_keep_rules_fail() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_snapshot(dir.path());

    classshrink(&dir)
        .arg(&input)
        .arg("-q")
        .assert()
        .failure()
        .stderr(predicate::str::contains("keep rules"));
}

#[test]
fn test_missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();

    classshrink(&dir)
        .args(["does-not-exist", "--keep", "com.example.Main"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No snapshots found"));
}

#[test]
fn test_print_usage() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_snapshot(dir.path());
    let usage = dir.path().join("usage.txt");

    classshrink(&dir)
        .arg(&input)
        .args(["--keep", "com.example.Main#main", "-q", "--print-usage"])
        .arg(&usage)
        .assert()
        .success();

    let report = classshrink::report::UsageReport::parse(&usage).unwrap();
    assert!(report.is_class_removed("com.example.Dead"));
    assert!(report.is_member_removed("com.example.Helper", "unused"));
    assert!(!report.is_class_removed("com.example.Helper"));
}

#[test]
fn test_json_report() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_snapshot(dir.path());

    let assert = classshrink(&dir)
        .arg(&input)
        .args(["--keep", "com.example.Main#main", "--format", "json", "-q"])
        .args(["--why-are-you-keeping", "com.example.Helper"])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["classes"]["original"], 3);
    assert_eq!(report["classes"]["remaining"], 2);
    assert_eq!(report["removed"]["classes"], 1);
    assert_eq!(report["explanations"][0]["target"], "com.example.Helper");
    assert_eq!(report["explanations"][0]["kept"], true);
}

#[test]
fn test_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_snapshot(dir.path());
    let output = dir.path().join("out.json");
    std::fs::write(
        dir.path().join(".classshrink.yml"),
        "keep:\n  - class: \"com.example.**\"\n",
    )
    .unwrap();

    classshrink(&dir)
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .arg("-q")
        .assert()
        .success();

    let snapshot = read_output(&output);
    assert_eq!(snapshot.program.len(), 3);
}

#[test]
fn test_directory_input_skips_output() {
    let dir = tempfile::tempdir().unwrap();
    write_snapshot(dir.path());
    let output = dir.path().join("out.json");
    std::fs::write(&output, "{}").unwrap();

    classshrink(&dir)
        .arg(dir.path())
        .arg("-o")
        .arg(&output)
        .args(["--keep", "com.example.Main#main", "-q"])
        .assert()
        .success();

    assert_eq!(read_output(&output).program.len(), 2);
}
