use std::process::Command;

fn run_schemadrift(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_schemadrift"))
        .args(args)
        .output()
        .unwrap_or_else(|error| panic!("failed to run schemadrift: {error}"))
}

#[test]
fn help_lists_the_documented_flags() {
    let output = run_schemadrift(&["--help"]);
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--changelog"));
    assert!(stdout.contains("--database"));
    assert!(stdout.contains("--output-dir"));
    assert!(stdout.contains("--auto-name-constraints"));
    assert!(stdout.contains("--skip-when-empty"));
}

#[test]
fn missing_required_flags_exits_nonzero() {
    let output = run_schemadrift(&[]);
    assert_ne!(output.status.code(), Some(0));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--changelog"));
}
