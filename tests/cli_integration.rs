// CLI integration tests for the conformance runner.
use std::process::Command;

use serde_json::Value;

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_cl-plugin-conformance");
    Command::new(exe)
}

fn parse_json(value: &str) -> Value {
    serde_json::from_str(value).expect("valid json")
}

#[test]
fn builtin_json_report_is_printed_and_written() {
    let temp = tempfile::tempdir().expect("tempdir");
    let report_path = temp.path().join("report.json");

    let output = cmd()
        .args(["--builtin", "--json", "--output", report_path.to_str().unwrap()])
        .env("RUST_LOG", "off")
        .output()
        .expect("run");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let printed = parse_json(std::str::from_utf8(&output.stdout).expect("utf8"));
    let written = parse_json(&std::fs::read_to_string(&report_path).expect("report file"));
    assert_eq!(printed["checks"], written["checks"]);
    assert_eq!(printed["passed"], true);
    assert_eq!(printed["plugin"]["name"], "RUST-PLUGIN");

    let checks = printed["checks"].as_array().expect("checks array");
    let foo_int = checks
        .iter()
        .find(|check| check["name"] == "foo_int")
        .expect("foo_int");
    assert_eq!(foo_int["outcome"], "returned");
    assert_eq!(foo_int["type"], "int");
    assert_eq!(foo_int["value"], 42);
    let foo_args = checks
        .iter()
        .find(|check| check["name"] == "foo_args")
        .expect("foo_args");
    assert_eq!(foo_args["outcome"], "survived");
}

#[test]
fn builtin_summary_is_human_readable() {
    let output = cmd()
        .arg("--builtin")
        .env("RUST_LOG", "off")
        .output()
        .expect("run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("RUST-PLUGIN "));
    assert!(stdout.contains("ok    foo_double -> double 4.2"));
    assert!(stdout.trim_end().ends_with("checks"));
    assert!(stdout.contains("passed: "));
}

#[test]
fn missing_plugin_path_exits_with_io_status() {
    let temp = tempfile::tempdir().expect("tempdir");
    let missing = temp.path().join("libnothing.so");
    let output = cmd()
        .arg(missing.to_str().unwrap())
        .env("RUST_LOG", "off")
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(8));
    let stderr = String::from_utf8_lossy(&output.stderr);
    let err = parse_json(stderr.lines().next().expect("error line"));
    assert_eq!(err["error"]["kind"], "Io");
}

#[test]
fn plugin_path_is_required_without_builtin() {
    let output = cmd().env("RUST_LOG", "off").output().expect("run");
    assert_eq!(output.status.code(), Some(2));
}
