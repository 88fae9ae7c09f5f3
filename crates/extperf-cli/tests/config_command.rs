use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::PathBuf;

#[allow(deprecated)]
fn get_extperf_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("extperf")
}

fn config_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_config_json_shows_overrides_and_defaults() {
    let file = config_file(
        r#"{"timeouts": {"navigationMs": 12000}, "testPages": ["https://shop.example/"]}"#,
    );

    let mut cmd = Command::new(get_extperf_bin());
    cmd.arg("config")
        .arg("--format")
        .arg("json")
        .arg("--config")
        .arg(file.path());

    let output = cmd.assert().success().get_output().stdout.clone();
    let config: serde_json::Value = serde_json::from_slice(&output).unwrap();

    assert_eq!(config["timeouts"]["navigationMs"], 12000);
    assert!(config["timeouts"]["evaluationMs"].as_u64().unwrap() > 0);
    assert_eq!(config["testPages"][0], "https://shop.example/");
    assert!(config["scoring"]["cpu"]["weight"].is_number());
}

#[test]
fn test_config_pretty_names_the_source() {
    let file = config_file("{}");

    let mut cmd = Command::new(get_extperf_bin());
    cmd.arg("config").arg("--config").arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Timeouts (ms):"))
        .stdout(predicate::str::contains(file.path().to_string_lossy().as_ref()));
}

#[test]
fn test_malformed_config_fails() {
    let file = config_file("{ not json");

    let mut cmd = Command::new(get_extperf_bin());
    cmd.arg("config").arg("--config").arg(file.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let mut cmd = Command::new(get_extperf_bin());
    cmd.arg("config").arg("--config").arg("/nonexistent/extperf.json");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("/nonexistent/extperf.json"));
}
