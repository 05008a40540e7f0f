//! Integration tests for the command-line interface

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn oxpecker(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_oxpecker"))
        .args(args)
        .current_dir(cwd)
        .output()
        .unwrap()
}

fn setup_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input");
    fs::create_dir_all(&input).unwrap();
    fs::write(
        input.join("paper.tex"),
        "\\begin{document}\nIt follows that the claim is very strong.\n\\end{document}\n",
    )
    .unwrap();
    dir
}

#[test]
fn test_help() {
    let dir = TempDir::new().unwrap();
    let output = oxpecker(&["--help"], dir.path());
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Checklist-driven rewriting of LaTeX prose"));
    assert!(stdout.contains("--diff"));
}

#[test]
fn test_missing_input_exits_with_status_1() {
    let dir = TempDir::new().unwrap();
    let output = oxpecker(&["--diff", "none"], dir.path());
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not exist"));
    assert!(!dir.path().join("output").exists());
}

#[test]
fn test_default_input_and_output() {
    let dir = setup_project();
    let output = oxpecker(&["--diff", "builtin"], dir.path());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "{stdout}");
    assert!(stdout.contains("paper.tex"));
    assert!(stdout.contains("Summary:"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("No input path specified, using directory './input/'"),
        "{stderr}"
    );

    let edited = fs::read_to_string(dir.path().join("output/edit/paper.tex")).unwrap();
    assert!(edited.contains("The claim is very strong."));
    let diff = fs::read_to_string(dir.path().join("output/diff/paper.tex")).unwrap();
    assert!(diff.contains("\\colorbox{yellow}{very}"));
}

#[test]
fn test_explicit_path_and_output() {
    let dir = setup_project();
    let src = dir.path().join("input");
    let out = dir.path().join("elsewhere");
    let output = oxpecker(
        &[
            "-p",
            src.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            "--diff",
            "none",
            "-j",
            "1",
        ],
        dir.path(),
    );
    assert!(output.status.success());
    assert!(!String::from_utf8_lossy(&output.stderr).contains("No input path specified"));
    assert!(out.join("edit/paper.tex").is_file());
    assert!(!out.join("diff/paper.tex").exists());
}

#[test]
fn test_output_inside_input_is_rejected() {
    let dir = setup_project();
    let output = oxpecker(
        &["-o", "input/out", "--diff", "none"],
        dir.path(),
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("inside input"), "{stderr}");
}

#[test]
fn test_json_report() {
    let dir = setup_project();
    let output = oxpecker(&["--diff", "none", "--json"], dir.path());
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["summary"]["documents"], 1);
    assert_eq!(report["documents"][0]["status"], "edited_only");
    assert_eq!(report["documents"][0]["relative"], "paper.tex");
}

#[test]
fn test_failing_diff_command_is_reported_not_fatal() {
    let dir = setup_project();
    let output = oxpecker(
        &["--diff-command", "oxpecker-no-such-program"],
        dir.path(),
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("diff skipped"), "{stdout}");
    assert!(dir.path().join("output/edit/paper.tex").is_file());
}

#[test]
fn test_parse_failure_exits_with_status_1() {
    let dir = setup_project();
    fs::write(dir.path().join("input/bad.tex"), "{unclosed").unwrap();
    let output = oxpecker(&["--diff", "none"], dir.path());
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("bad.tex"));
    assert!(dir.path().join("output/edit/paper.tex").is_file());
}

#[test]
fn test_check_and_list() {
    let dir = TempDir::new().unwrap();
    let output = oxpecker(&["check"], dir.path());
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("default"));

    let output = oxpecker(&["list"], dir.path());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("it follows that [title case]"));
    assert!(stdout.contains("Highlights:"));
}

#[test]
fn test_check_reports_every_issue() {
    let dir = TempDir::new().unwrap();
    let checklist = dir.path().join("bad.toml");
    fs::write(
        &checklist,
        r#"
[[rules]]
name = "first"
pattern = "("

[[rules]]
name = "second"
pattern = "x*"
"#,
    )
    .unwrap();
    let output = oxpecker(&["check", "-c", checklist.to_str().unwrap()], dir.path());
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("'first'"), "{stderr}");
    assert!(stderr.contains("'second'"), "{stderr}");
}
