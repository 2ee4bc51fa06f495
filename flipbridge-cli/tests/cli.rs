use assert_cmd::Command;

#[test]
fn help_lists_options() {
    let output = Command::cargo_bin("flipbridge")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--surface"));
    assert!(stdout.contains("--timeout-secs"));
}

#[test]
fn document_is_required() {
    Command::cargo_bin("flipbridge").unwrap().assert().failure();
}

#[test]
fn surface_and_demo_are_exclusive() {
    Command::cargo_bin("flipbridge")
        .unwrap()
        .args(["doc.pdf", "--surface", "viewer", "--demo-pages", "4"])
        .assert()
        .failure();
}

#[test]
fn unreadable_config_fails_before_starting() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    let output = Command::cargo_bin("flipbridge")
        .unwrap()
        .arg("doc.pdf")
        .arg("--config")
        .arg(&missing)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load config"), "stderr: {stderr}");
}
