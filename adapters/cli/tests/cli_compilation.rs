use std::process::Command;

#[test]
fn cli_compiles_without_warnings() {
    let status = Command::new(env!("CARGO"))
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .args(["check", "--quiet", "--bin", "learninator"])
        .status()
        .expect("failed to invoke cargo check for learninator CLI binary");

    assert!(status.success(), "cargo check --bin learninator should succeed");
}

#[test]
fn exported_maze_can_be_imported_again() {
    let export = Command::new(env!("CARGO_BIN_EXE_learninator"))
        .args(["--maze", "--export-maze", "--ticks", "20", "--seed", "5"])
        .output()
        .expect("failed to run learninator");
    assert!(export.status.success());
    let stdout = String::from_utf8(export.stdout).expect("utf-8 output");
    let snapshot = stdout
        .lines()
        .find(|line| line.starts_with("maze:v1:6x6:"))
        .expect("snapshot printed");

    let import = Command::new(env!("CARGO_BIN_EXE_learninator"))
        .args(["--import-maze", snapshot, "--cheats", "--ticks", "20"])
        .output()
        .expect("failed to run learninator");
    assert!(import.status.success());
    let stdout = String::from_utf8(import.stdout).expect("utf-8 output");
    assert!(stdout.lines().any(|line| line.starts_with("solution: 0 -> ")));
    assert!(stdout.contains("\"clock\": 20"));
}

#[test]
fn malformed_snapshot_fails_cleanly() {
    let output = Command::new(env!("CARGO_BIN_EXE_learninator"))
        .args(["--import-maze", "maze:v9:2x2:e30", "--ticks", "1"])
        .output()
        .expect("failed to run learninator");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to decode maze snapshot"));
}
