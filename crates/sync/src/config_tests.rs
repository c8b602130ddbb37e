// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use std::collections::HashMap;
use tempfile::TempDir;
use yare::parameterized;

fn with_endpoint(endpoint: &str, api_key: &str) -> SyncConfig {
    let mut config = SyncConfig::default();
    config.api.endpoint = endpoint.to_string();
    config.api.api_key = api_key.to_string();
    config
}

#[test]
fn missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = SyncConfig::read_file(&dir.path().join("config.toml")).unwrap();
    assert_eq!(config, SyncConfig::default());
}

#[test]
fn defaults_match_component_defaults() {
    let config = SyncConfig::default();
    assert_eq!(config.retry_policy(), RetryPolicy::default());
    assert_eq!(config.queue_config().unwrap(), QueueConfig::default());
    assert_eq!(config.log.level, "warn");

    let channel = config.channel_config().unwrap();
    assert_eq!(channel.heartbeat_interval, Duration::from_secs(30));
    assert_eq!(channel.heartbeat_timeout, None);
    assert_eq!(channel.reconnect_base_delay, Duration::from_millis(1000));
    assert_eq!(channel.max_reconnect_attempts, 5);
}

#[test]
fn partial_file_keeps_other_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[api]
endpoint = "https://memory.example.com"
api_key = "k1"

[retry]
delay_ms = 250

[queue]
storage_dir = "/var/lib/cairn"

[realtime]
heartbeat_timeout_ms = 10000
"#,
    )
    .unwrap();

    let config = SyncConfig::read_file(&path).unwrap();

    assert_eq!(config.api.endpoint, "https://memory.example.com");
    assert_eq!(config.api.timeout_secs, 30);
    assert_eq!(config.retry_policy().delay, Duration::from_millis(250));
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.storage_dir(), PathBuf::from("/var/lib/cairn"));
    assert_eq!(
        config.channel_config().unwrap().heartbeat_timeout,
        Some(Duration::from_secs(10))
    );
}

#[test]
fn malformed_file_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[api\nendpoint = ").unwrap();

    let err = SyncConfig::read_file(&path).unwrap_err();

    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("config.toml"));
}

#[test]
fn env_overrides_replace_file_values() {
    let vars: HashMap<&str, &str> = [
        ("CAIRN_ENDPOINT", "https://override.example"),
        ("CAIRN_API_KEY", "from-env"),
        ("CAIRN_LOG", "debug"),
    ]
    .into_iter()
    .collect();
    let mut config = with_endpoint("http://file.example", "from-file");

    config.apply_env_overrides(|name| vars.get(name).map(|v| v.to_string()));

    assert_eq!(config.api.endpoint, "https://override.example");
    assert_eq!(config.api.api_key, "from-env");
    assert_eq!(config.log.level, "debug");
}

#[test]
fn absent_env_vars_leave_config_untouched() {
    let mut config = with_endpoint("http://file.example", "from-file");
    config.apply_env_overrides(|_| None);
    assert_eq!(config, with_endpoint("http://file.example", "from-file"));
}

#[parameterized(
    plain = { "http://localhost:8080", "ws://localhost:8080/v1/ws?token=abc" },
    secure = { "https://memory.example.com", "wss://memory.example.com/v1/ws?token=abc" },
    trailing_slash = { "https://memory.example.com/", "wss://memory.example.com/v1/ws?token=abc" },
    path_prefix = { "https://example.com/brain", "wss://example.com/brain/v1/ws?token=abc" },
)]
fn realtime_url_swaps_scheme(endpoint: &str, expected: &str) {
    let config = with_endpoint(endpoint, "abc");
    assert_eq!(config.realtime_url().unwrap(), expected);
}

#[test]
fn realtime_url_encodes_token() {
    let config = with_endpoint("https://m.example", "a b&c");
    assert_eq!(
        config.realtime_url().unwrap(),
        "wss://m.example/v1/ws?token=a+b%26c"
    );
}

#[parameterized(
    websocket = { "ws://m.example" },
    no_scheme = { "m.example" },
    ftp = { "ftp://m.example" },
)]
fn realtime_url_rejects_non_http_endpoints(endpoint: &str) {
    let config = with_endpoint(endpoint, "abc");
    assert!(matches!(
        config.realtime_url(),
        Err(ConfigError::InvalidEndpoint(_))
    ));
}

#[parameterized(
    max_size = { 0, 3, "queue.max_size" },
    max_attempts = { 1000, 0, "queue.max_attempts" },
)]
fn zero_queue_limits_are_rejected(max_size: usize, max_attempts: u32, key: &str) {
    let mut config = SyncConfig::default();
    config.queue.max_size = max_size;
    config.queue.max_attempts = max_attempts;

    let err = config.queue_config().unwrap_err();

    assert!(matches!(err, ConfigError::Zero { key: k } if k == key));
    assert!(err.to_string().contains("must be at least 1"));
}

#[test]
fn default_paths_end_with_app_dir() {
    assert!(SyncConfig::default_path().ends_with("cairn/config.toml"));
    assert!(SyncConfig::default_state_dir().ends_with("cairn"));
}
