//! Process-level configuration checks

use std::process::Command;

fn exporter() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_cardinality-exporter"));
    command.env_clear().current_dir(std::env::temp_dir());
    command
}

#[test]
fn test_missing_prometheus_exits_with_one() {
    let output = exporter().output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("PROMETHEUS"));
}

#[test]
fn test_too_short_prometheus_exits_with_one() {
    let output = exporter().env("PROMETHEUS", "http").output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("too short"));
}
