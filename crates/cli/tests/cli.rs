use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Config keeping every file of the run inside `dir`
fn write_config(dir: &TempDir) -> PathBuf {
    let root = dir.path().display().to_string().replace('\\', "/");
    let content = format!(
        r#"[general]
sources_file = "{root}/sources.toml"
template_file = "{root}/prompt.md"
archive_dir = "{root}/newsletters"
lock_file = "{root}/digest-press.lock"

[ledger]
path = "{root}/processed.json"

[discovery]
item_pause_secs = 0

[llm]
provider = "stub"

[delivery]
channel = "outbox"
outbox_dir = "{root}/outbox"
"#
    );
    let path = dir.path().join("config.toml");
    fs::write(&path, content).expect("write config");
    path
}

fn digest_press(dir: &TempDir, config: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("digest-press");
    cmd.current_dir(dir.path()).arg("--config").arg(config);
    cmd
}

#[test]
fn config_init_writes_example_file() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.toml");

    let mut cmd = cargo_bin_cmd!("digest-press");
    cmd.args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Next steps"));

    let content = fs::read_to_string(&config_path).expect("read config");
    assert!(content.contains("sources_file"));
    assert!(content.contains("provider = \"gemini\""));
}

#[test]
fn config_init_refuses_to_overwrite() {
    let dir = TempDir::new().expect("temp dir");
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "# mine\n").expect("write config");

    let mut cmd = cargo_bin_cmd!("digest-press");
    cmd.args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    assert_eq!(fs::read_to_string(&config_path).unwrap(), "# mine\n");
}

#[test]
fn missing_explicit_config_is_an_error() {
    let dir = TempDir::new().expect("temp dir");
    let missing = dir.path().join("nope.toml");

    digest_press(&dir, &missing)
        .args(["sources", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn sources_add_list_remove() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(&dir);

    digest_press(&dir, &config)
        .args(["sources", "add", "https://www.youtube.com/@veritasium"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added @veritasium (youtube)"));

    digest_press(&dir, &config)
        .args([
            "sources",
            "add",
            "https://www.xiaoyuzhoufm.com/podcast/6013f9f58e2f7ee375cf4216",
        ])
        .assert()
        .success();

    digest_press(&dir, &config)
        .args(["sources", "add", "@Veritasium"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Already following"));

    let output = digest_press(&dir, &config)
        .args(["sources", "list", "--json"])
        .output()
        .expect("run sources list");
    assert!(output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(value["count"], 2);
    assert_eq!(value["sources"][0]["handle"], "@veritasium");
    assert_eq!(value["sources"][1]["kind"], "podcast");

    digest_press(&dir, &config)
        .args(["sources", "remove", "@veritasium"])
        .assert()
        .success();

    let catalog = fs::read_to_string(dir.path().join("sources.toml")).expect("read catalog");
    assert!(!catalog.contains("veritasium"));
    assert!(catalog.contains("6013f9f58e2f7ee375cf4216"));
}

#[test]
fn sources_add_rejects_unrecognized_input() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(&dir);

    digest_press(&dir, &config)
        .args(["sources", "add", "https://example.com/feed"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not recognize"));

    assert!(!dir.path().join("sources.toml").exists());
}

#[test]
fn template_set_validates_before_saving() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(&dir);

    digest_press(&dir, &config)
        .args(["template", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("{{transcript}}"));

    let bad = dir.path().join("bad.md");
    fs::write(&bad, "Summarize {{title}} in {{language}}").expect("write template");
    digest_press(&dir, &config)
        .args(["template", "set", "--file"])
        .arg(&bad)
        .assert()
        .failure()
        .stderr(predicate::str::contains("language"));
    assert!(!dir.path().join("prompt.md").exists());

    let good = dir.path().join("good.md");
    fs::write(&good, "Write up {{title}}:\n{{transcript}}").expect("write template");
    digest_press(&dir, &config)
        .args(["template", "set", "--file"])
        .arg(&good)
        .assert()
        .success();

    digest_press(&dir, &config)
        .args(["template", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Validation passed"));

    digest_press(&dir, &config)
        .args(["template", "reset"])
        .assert()
        .success();
    assert!(!dir.path().join("prompt.md").exists());
}

#[test]
fn run_with_empty_catalog_is_informational() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(&dir);

    let output = digest_press(&dir, &config)
        .args(["run", "--json"])
        .output()
        .expect("run");
    assert!(output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(value["outcome"], "no_sources");
    assert_eq!(value["sources_checked"], 0);

    assert!(!dir.path().join("digest-press.lock").exists());
}

#[test]
fn run_prints_operator_log() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(&dir);

    digest_press(&dir, &config)
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("No sources configured"));
}

#[test]
fn ledger_clear_requires_confirmation() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(&dir);

    digest_press(&dir, &config)
        .args(["ledger", "clear"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));

    let output = digest_press(&dir, &config)
        .args(["ledger", "list", "--json"])
        .output()
        .expect("run ledger list");
    assert!(output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(value["count"], 0);
}

#[test]
fn ledger_clear_refuses_while_a_run_holds_the_lock() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(&dir);
    let lock = dir.path().join("digest-press.lock");
    fs::write(&lock, "").expect("write lock");

    digest_press(&dir, &config)
        .args(["ledger", "clear", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("a run is in progress"));
    assert!(lock.exists());

    fs::remove_file(&lock).expect("remove lock");
    digest_press(&dir, &config)
        .args(["ledger", "clear", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared 0 processed items"));
    assert!(!lock.exists());
}

#[test]
fn archive_list_is_empty_before_first_send() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(&dir);

    digest_press(&dir, &config)
        .args(["archive", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No newsletters sent yet"));
}

#[test]
fn rewrite_with_stub_provider_prints_markdown() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(&dir);

    digest_press(&dir, &config)
        .args([
            "rewrite",
            "--title",
            "Why bridges sing",
            "--source",
            "Practical Engineering",
            "--text",
            "Today we talk about resonance.",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Offline draft"));
}

#[test]
fn episode_rejects_non_episode_input() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(&dir);

    digest_press(&dir, &config)
        .args(["episode", "https://example.com/not-an-episode"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not a podcast episode"));
}

#[test]
fn doctor_outputs_valid_json() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(&dir);

    let output = digest_press(&dir, &config)
        .env("DIGEST_PRESS__LLM__PROVIDER", "stub")
        .args(["doctor", "--json"])
        .output()
        .expect("run doctor");
    assert!(output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(value["config"]["status"], "ok");
    assert_eq!(value["llm"]["status"], "ok");
    assert_eq!(value["delivery"]["status"], "ok");
    assert_ne!(value["overall"], "error");
}

#[test]
fn env_overrides_config_file() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(&dir);

    digest_press(&dir, &config)
        .env("DIGEST_PRESS__LLM__PROVIDER", "carrier-pigeon")
        .args(["rewrite", "--title", "t", "--source", "s", "--text", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown LLM provider"));
}
