//! Integration tests for the `recc` binary's file/directory processing.

use std::process::Command;

fn recc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_recc"))
}

const SIMPLE_IR: &str = "\
consts:
  %0: i32 = 1
  %1: i32 = 2

locals:

block 0:
  %2:i32 = add %0, %1
  store %2, %2
";

#[test]
fn no_args_prints_help_and_exits_success() {
    let output = recc().output().expect("failed to run recc");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("recc"));
}

#[test]
fn processes_a_single_ir_file_with_default_passes() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("block.ir");
    std::fs::write(&file, SIMPLE_IR).unwrap();

    let output = recc().arg(&file).output().expect("failed to run recc");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("IR after cfa"));
    assert!(stdout.contains("IR after ra"));
}

#[test]
fn processes_a_directory_without_per_pass_dumps() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.ir"), SIMPLE_IR).unwrap();
    std::fs::write(dir.path().join("b.ir"), SIMPLE_IR).unwrap();

    let output = recc().arg(dir.path()).output().expect("failed to run recc");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("IR after"));
    assert!(stdout.contains("processing"));
}

#[test]
fn stats_flag_reports_instruction_counts() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("block.ir");
    std::fs::write(&file, SIMPLE_IR).unwrap();

    let output = recc().arg(&file).arg("--stats").output().expect("failed to run recc");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ir instructions total"));
    assert!(stdout.contains("ir instructions removed"));
}

#[test]
fn custom_pass_list_only_runs_named_passes() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("block.ir");
    std::fs::write(&file, SIMPLE_IR).unwrap();

    let output = recc()
        .arg(&file)
        .arg("--pass=cfa,dce")
        .output()
        .expect("failed to run recc");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("IR after cfa"));
    assert!(stdout.contains("IR after dce"));
    assert!(!stdout.contains("IR after ra"));
}

#[test]
fn unreadable_path_is_reported_but_does_not_fail_the_run() {
    let output = recc()
        .arg("/nonexistent/path/for/recc/tests")
        .output()
        .expect("failed to run recc");
    assert!(output.status.success());
}

#[test]
fn malformed_ir_is_warned_but_does_not_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.ir");
    let bad = dir.path().join("bad.ir");
    std::fs::write(&good, SIMPLE_IR).unwrap();
    std::fs::write(&bad, "this is not valid ir at all").unwrap();

    let output = recc().arg(dir.path()).output().expect("failed to run recc");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("malformed IR"));
}
