#![cfg(unix)]

use serde_json::Value;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const ENGINE_SCRIPT: &str = "#!/bin/sh\necho \"Cext = $1\"\necho \"Cabs = $2\"\n";

fn write_engine(root: &Path, name: &str) -> PathBuf {
    let path = root.join(format!("{name}.sh"));
    fs::write(&path, ENGINE_SCRIPT).expect("engine script should be written");
    let mut permissions = fs::metadata(&path)
        .expect("engine script metadata should be readable")
        .permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions).expect("engine script should be executable");
    path
}

fn write_fixture(root: &Path, commands: &str) {
    let alpha = write_engine(root, "alpha");
    let beta = write_engine(root, "beta");
    let config = serde_json::json!({
        "alpha": {
            "detect_substrings": ["alpha"],
            "prefix": "alpha",
            "exe": alpha.to_string_lossy(),
            "outputs": {
                "Cext": {"pattern": "Cext\\s*=\\s*(?P<value>\\S+)"},
                "Cabs": {"pattern": "Cabs\\s*=\\s*(?P<value>\\S+)"}
            },
            "cleanup": {"remove_names": ["stderr.txt"]}
        },
        "beta": {
            "detect_substrings": ["beta"],
            "prefix": "beta",
            "exe": beta.to_string_lossy(),
            "outputs": {
                "Cext": {"pattern": "Cext\\s*=\\s*(?P<value>\\S+)"},
                "Cabs": {"pattern": "Cabs\\s*=\\s*(?P<value>\\S+)"}
            }
        }
    });
    fs::write(
        root.join("dda_codes.json"),
        serde_json::to_string_pretty(&config).expect("config should serialize"),
    )
    .expect("engine config should be written");
    fs::write(root.join("DDA_commands"), commands).expect("command file should be written");
}

fn run_bench(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dda-bench"))
        .args(args)
        .current_dir(root)
        .env("RUST_LOG", "warn")
        .output()
        .expect("dda-bench should start")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

const AGREEING_CASES: &str = "\
# @case: sphere
# @tol: 4 16
# @tol_res: 0 16
alpha 1.0e-12 2.0e-13
beta 1.0e-12 2.0e-13
";

#[test]
fn agreeing_engines_pass_and_write_reports() {
    let temp = TempDir::new().expect("tempdir should be created");
    write_fixture(temp.path(), AGREEING_CASES);

    let output = run_bench(temp.path(), &["run", "--omp", "2"]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

    let printed = stdout(&output);
    assert!(printed.contains("Bench status: PASS"), "stdout: {printed}");
    assert!(printed.contains("JSON report: outputs/report.json"));

    let outputs = temp.path().join("outputs");
    let results: Value = serde_json::from_str(
        &fs::read_to_string(outputs.join("sphere/results.json"))
            .expect("case results should exist"),
    )
    .expect("case results should be json");
    assert_eq!(results["engines"]["alpha"]["Cext"], 1.0e-12);
    assert_eq!(results["engines"]["beta"]["Cabs"], 2.0e-13);
    assert!(outputs.join("summary.csv").is_file());
    assert!(outputs.join("sphere/alpha/cmd000/stdout.txt").is_file());
}

#[test]
fn disagreeing_engines_exit_with_one() {
    let temp = TempDir::new().expect("tempdir should be created");
    write_fixture(
        temp.path(),
        "\
# @case: mismatch
# @tol: 6 16
# @tol_res: 0 16
alpha 1.0e-12 2.0e-13
beta 1.1e-12 2.0e-13
",
    );

    let output = run_bench(temp.path(), &["run", "-o", "results"]);
    assert_eq!(output.status.code(), Some(1), "stderr: {}", stderr(&output));
    let printed = stdout(&output);
    assert!(printed.contains("Bench status: FAIL"));
    assert!(printed.contains("Ext:1C❌"), "stdout: {printed}");

    let report: Value = serde_json::from_str(
        &fs::read_to_string(temp.path().join("results/report.json"))
            .expect("report should exist"),
    )
    .expect("report should be json");
    assert_eq!(report["passed"], false);
    assert_eq!(report["failed_case_count"], 1);
}

#[test]
fn clean_flag_removes_declared_scratch_files() {
    let temp = TempDir::new().expect("tempdir should be created");
    write_fixture(temp.path(), AGREEING_CASES);

    let output = run_bench(temp.path(), &["run", "--clean"]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

    let outputs = temp.path().join("outputs");
    assert!(!outputs.join("sphere/alpha/cmd000/stderr.txt").exists());
    assert!(!outputs.join("sphere/beta/cmd001/stderr.txt").exists());
    assert!(outputs.join("sphere/beta/cmd001/stdout.txt").is_file());
}

#[test]
fn unknown_skip_pair_engine_is_an_input_error() {
    let temp = TempDir::new().expect("tempdir should be created");
    write_fixture(
        temp.path(),
        "\
# @case: sphere
# @tol: 4 16
# @tol_res: 0 16
# @skip_pairs: alpha gamma
alpha 1.0e-12 2.0e-13
beta 1.0e-12 2.0e-13
",
    );

    let output = run_bench(temp.path(), &["run"]);
    assert_eq!(output.status.code(), Some(2));
    let errors = stderr(&output);
    assert!(errors.contains("ERROR: [INPUT.SKIP_PAIR_ENGINE]"), "stderr: {errors}");
    assert!(errors.contains("FATAL EXIT CODE: 2"));
    assert!(!temp.path().join("outputs").exists());
}

#[test]
fn check_reports_routing_without_running_engines() {
    let temp = TempDir::new().expect("tempdir should be created");
    write_fixture(temp.path(), AGREEING_CASES);

    let output = run_bench(temp.path(), &["check", "--json"]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));

    let summary: Value = serde_json::from_str(&stdout(&output)).expect("check output should be json");
    assert_eq!(summary["case_count"], 1);
    assert_eq!(summary["command_count"], 2);
    assert_eq!(summary["cases"][0]["engines"], serde_json::json!(["alpha", "beta"]));
    assert!(!temp.path().join("outputs").exists());
}

#[test]
fn missing_command_file_is_an_io_error() {
    let temp = TempDir::new().expect("tempdir should be created");
    write_fixture(temp.path(), AGREEING_CASES);

    let output = run_bench(temp.path(), &["check", "--commands", "nope"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("ERROR: [IO.CASE_FILE]"));
}

#[test]
fn usage_errors_and_help() {
    let temp = TempDir::new().expect("tempdir should be created");

    let help = run_bench(temp.path(), &["run", "--help"]);
    assert_eq!(help.status.code(), Some(0));
    assert!(stdout(&help).contains("--code-config"));

    let bad = run_bench(temp.path(), &["run", "--jobs", "many"]);
    assert_eq!(bad.status.code(), Some(2));
    assert!(stderr(&bad).contains("ERROR: [INPUT.CLI_USAGE]"));
}
