//! Integration tests for `logsift config` behaviour.
//!
//! Exercises config loading and validation with real TOML files.

use std::fs;

use logsift_core::config::LogsiftConfig;
use tempfile::TempDir;

#[tokio::test]
async fn test_config_validate_valid_toml() {
    // Given: A valid config file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("logsift.toml");

    let valid_config = r#"
[general]
log_level = "debug"
log_format = "json"

[engine]
rule_paths = ["/etc/logsift/rules", "extra.yml"]
tz_offset = "+09:00"
workers = 4
batch_size = 256
"#;
    fs::write(&config_path, valid_config).expect("should write config");

    // When: Loading the config
    let config = LogsiftConfig::load(&config_path)
        .await
        .expect("valid config should load successfully");

    // Then: Values are preserved and unset fields keep defaults
    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.engine.rule_paths.len(), 2);
    assert_eq!(config.engine.tz_offset, "+09:00");
    assert_eq!(config.engine.workers, 4);
    assert_eq!(config.engine.batch_size, 256);
    assert!(config.engine.strip_priority, "default should apply");
}

#[tokio::test]
async fn test_config_validate_malformed_toml() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("bad.toml");
    fs::write(&config_path, "[engine\nworkers = 1\n").expect("should write bad config");

    let result = LogsiftConfig::load(&config_path).await;
    assert!(result.is_err(), "malformed TOML should fail to load");
}

#[tokio::test]
async fn test_config_validate_missing_file() {
    let result = LogsiftConfig::load("/nonexistent/logsift.toml").await;
    let err = result.expect_err("missing file should fail");
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn test_config_validate_empty_file_uses_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("empty.toml");
    fs::write(&config_path, "").expect("should write empty config");

    let config = LogsiftConfig::from_file(&config_path)
        .await
        .expect("empty config should load with defaults");
    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.engine.tz_offset, "local");
}

#[tokio::test]
async fn test_config_rejects_invalid_tz_offset() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("tz.toml");
    fs::write(&config_path, "[engine]\ntz_offset = \"Asia/Seoul\"\n").expect("write");

    let err = LogsiftConfig::from_file(&config_path)
        .await
        .expect_err("named zones are not supported");
    assert!(err.to_string().contains("engine.tz_offset"));
}

#[tokio::test]
async fn test_config_boundary_values() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("bounds.toml");

    fs::write(&config_path, "[engine]\nbatch_size = 0\n").expect("write");
    assert!(
        LogsiftConfig::from_file(&config_path).await.is_err(),
        "batch_size 0 should be rejected"
    );

    fs::write(&config_path, "[engine]\nmax_line_bytes = 1\nbatch_size = 1\n").expect("write");
    let config = LogsiftConfig::from_file(&config_path)
        .await
        .expect("minimum values should be accepted");
    assert_eq!(config.engine.max_line_bytes, 1);
}

#[tokio::test]
async fn test_config_unicode_and_special_paths() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("paths.toml");
    let content = r#"
[engine]
rule_paths = [
    "/opt/규칙/firewall.yml",
    "/var/lib/logsift/rules with spaces",
]
"#;
    fs::write(&config_path, content).expect("write");

    let config = LogsiftConfig::from_file(&config_path)
        .await
        .expect("unicode paths should load");
    assert_eq!(config.engine.rule_paths[0], "/opt/규칙/firewall.yml");
    assert!(config.engine.rule_paths[1].contains("with spaces"));
}

#[tokio::test]
async fn test_config_rejects_blank_rule_path() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("blank.toml");
    fs::write(&config_path, "[engine]\nrule_paths = [\"  \"]\n").expect("write");

    assert!(LogsiftConfig::from_file(&config_path).await.is_err());
}
