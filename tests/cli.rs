use std::process::Command;
use tempfile::TempDir;

#[test]
fn missing_source_prints_usage_and_exits_1() {
    let output = Command::new(env!("CARGO_BIN_EXE_groove_hvo"))
        .env("RUST_LOG", "off")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage: groove_hvo <SOURCE_DIR>"), "stderr was: {}", stderr);
    assert!(output.stdout.is_empty());
}

#[test]
fn missing_source_directory_fails() {
    let root = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_groove_hvo"))
        .arg(root.path().join("nowhere"))
        .arg("--processed-dir")
        .arg(root.path().join("processed"))
        .env("RUST_LOG", "off")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(!root.path().join("processed").exists());
}
