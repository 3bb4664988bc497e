mod common;

use std::path::{Path, PathBuf};
use std::process::Command;

use common::*;
use tempfile::TempDir;

fn recall_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_recall"))
}

fn write_config(root: &Path) -> PathBuf {
    let config = format!(
        r#"[db]
path = "{root}/data/recall.sqlite"

[sources]
root = "{root}/logs"

[embedding]
provider = "disabled"
"#,
        root = root.display()
    );
    let path = root.join("recall.toml");
    std::fs::write(&path, config).unwrap();
    path
}

fn run(config: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(recall_binary())
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RECALL_LOG")
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_init_creates_database() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path());

    let (stdout, _, ok) = run(&config, &["init"]);
    assert!(ok);
    assert!(stdout.contains("Database initialized"));
    assert!(tmp.path().join("data").join("recall.sqlite").exists());

    let (_, _, ok) = run(&config, &["init"]);
    assert!(ok, "init must be idempotent");
}

#[test]
fn test_ingest_dry_run_counts_without_writing() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path());
    write_session(tmp.path(), "proj", "s1", &parser_crash_session());
    write_session(tmp.path(), "proj", "quiet", &(noise().join("\n") + "\n"));

    let (stdout, _, ok) = run(&config, &["ingest", "--dry-run"]);
    assert!(ok);
    assert!(stdout.contains("session files found: 2"));
    assert!(stdout.contains("estimated chunks: 1"));

    let (stdout, _, ok) = run(&config, &["stats"]);
    assert!(ok);
    assert!(stdout.contains("Chunks:    0"));
}

#[test]
fn test_ingest_with_disabled_embeddings_reports_failures() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path());
    write_session(tmp.path(), "proj", "s1", &parser_crash_session());

    let (stdout, _, ok) = run(&config, &["ingest", "--no-progress"]);
    assert!(ok);
    assert!(stdout.contains("newly indexed sessions: 0"));
    assert!(stdout.contains("failed: 1"));
    assert!(stdout.contains("disabled"));
}

#[test]
fn test_blank_search_prints_no_results() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path());

    let (stdout, _, ok) = run(&config, &["search", "  "]);
    assert!(ok);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_invalid_config_fails() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bad.toml");
    std::fs::write(&path, "[chunking]\nwindow_pairs = 0\n").unwrap();

    let (_, stderr, ok) = run(&path, &["stats"]);
    assert!(!ok);
    assert!(stderr.contains("window_pairs"));
}
