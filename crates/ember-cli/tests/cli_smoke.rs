use std::io::Write;
use std::process::{Command, Stdio};

fn run_repl(input: &str) -> String {
    let mut child = Command::new(env!("CARGO_BIN_EXE_ember"))
        .arg("repl")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .as_mut()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();
    let out = child.wait_with_output().unwrap();
    String::from_utf8_lossy(&out.stdout).to_string()
}

#[test]
fn repl_prints_canonical_forms() {
    let out = run_repl("1 + 2\n\"a\" + \"b\"\n");
    assert!(out.contains("3\n"), "stdout: {}", out);
    assert!(out.contains("ab\n"), "stdout: {}", out);
}

#[test]
fn repl_keeps_bindings_between_lines() {
    let out = run_repl("val x = 20\nx + 22\n");
    assert!(out.contains("42\n"), "stdout: {}", out);
}

#[test]
fn repl_reports_errors_and_continues() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_ember"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .as_mut()
        .unwrap()
        .write_all(b"ghost\n1 + 1\n")
        .unwrap();
    let out = child.wait_with_output().unwrap();
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        stderr.contains("Runtime Error") && stderr.contains("Identifier 'ghost' not found"),
        "stderr: {}",
        stderr
    );
    assert!(stdout.contains("2\n"), "stdout: {}", stdout);
}

#[test]
fn run_executes_a_script() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hello.ebr");
    std::fs::write(&path, "echo(\"hi from script\")\n").unwrap();

    let out = Command::new(env!("CARGO_BIN_EXE_ember"))
        .args(["run", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("hi from script\n"), "stdout: {}", stdout);
}

#[test]
fn run_rejects_wrong_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hello.txt");
    std::fs::write(&path, "1\n").unwrap();

    let out = Command::new(env!("CARGO_BIN_EXE_ember"))
        .args(["run", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("file extension"), "stderr: {}", stderr);
}

#[test]
fn run_prints_diagnostics_but_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.ebr");
    std::fs::write(&path, "5 / 0\n").unwrap();

    let out = Command::new(env!("CARGO_BIN_EXE_ember"))
        .args(["run", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains("Runtime Error") && stderr.contains("Division by 0"),
        "stderr: {}",
        stderr
    );
}
