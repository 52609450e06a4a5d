//! Integration test: Configuration utilities
//!
//! Tests the bin_common configuration loading functionality.

use std::env;
use std::time::Duration;
use wsmanager_suite::bin_common::{load_config_from_env, ConfigType, SettingsError, WsEchoSettings};

#[test]
fn test_ws_echo_config_default() {
    // Clear env var to test default
    env::remove_var("WS_ECHO_CONFIG_PATH");

    let config_path = load_config_from_env(ConfigType::WsEcho);
    assert_eq!(config_path.to_str().unwrap(), "config/ws_echo.yaml");
}

#[test]
fn test_custom_config() {
    let custom = ConfigType::Custom("custom/path.yaml".to_string());
    let config_path = load_config_from_env(custom);

    assert_eq!(config_path.to_str().unwrap(), "custom/path.yaml");
}

// Everything touching WS_URL lives in one test so parallel tests can't race
#[test]
fn test_settings_parsing_and_url_override() {
    env::remove_var("WS_URL");

    let yaml = r#"
url: "wss://example.test/socket"
reconnect_policy:
  base_interval_ms: 500
  max_interval_ms: 2000
  max_attempts: 3
transport:
  ping_interval_ms: 10000
  retry_on_failure: false
  headers:
    - ["X-Client", "tests"]
"#;

    let settings = WsEchoSettings::from_yaml(yaml).unwrap();
    assert_eq!(settings.url, "wss://example.test/socket");
    assert!(settings.reconnect);
    assert_eq!(settings.reconnect_policy.base_interval, Duration::from_millis(500));
    assert_eq!(settings.reconnect_policy.max_attempts, Some(3));
    assert_eq!(settings.transport.ping_interval, Some(Duration::from_secs(10)));
    assert!(!settings.transport.retry_on_failure);
    assert_eq!(
        settings.transport.headers,
        vec![("X-Client".to_string(), "tests".to_string())]
    );

    // Minimal file: defaults everywhere but the URL
    let settings = WsEchoSettings::from_yaml("url: ws://127.0.0.1:9001").unwrap();
    assert_eq!(settings.reconnect_policy.max_interval, Duration::from_millis(3000));
    assert_eq!(settings.transport.ping_interval, None);
    assert!(settings.transport.retry_on_failure);

    // Wrong scheme is rejected
    let err = WsEchoSettings::from_yaml("url: https://example.test").unwrap_err();
    assert!(matches!(err, SettingsError::ValidationError(_)));

    // Environment wins over the file
    env::set_var("WS_URL", "wss://override.test/ws");
    let settings = WsEchoSettings::from_yaml("url: https://ignored.test").unwrap();
    assert_eq!(settings.url, "wss://override.test/ws");
    env::remove_var("WS_URL");
}

#[test]
fn test_shipped_config_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/ws_echo.yaml");
    let yaml = std::fs::read_to_string(path).unwrap();
    let settings: WsEchoSettings = serde_yaml::from_str(&yaml).unwrap();

    assert!(settings.url.starts_with("wss://"));
    assert_eq!(settings.transport.ping_interval, Some(Duration::from_secs(15)));
}

#[test]
fn test_invalid_policy_rejected() {
    let yaml = r#"
url: "wss://example.test"
reconnect_policy:
  base_interval_ms: 0
"#;
    // A WS_URL set by the other test only replaces the URL; the policy is
    // still rejected
    let err = WsEchoSettings::from_yaml(yaml).unwrap_err();
    assert!(matches!(err, SettingsError::ValidationError(_)));
}
