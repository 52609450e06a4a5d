//! Settings for the echo client
//!
//! Loaded from YAML; `WS_URL` in the environment (or `.env`) overrides the
//! file's URL.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use wsmanager::{validate_url, ReconnectConfig, TransportConfig};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

#[derive(Debug, Clone, Deserialize)]
pub struct WsEchoSettings {
    /// Endpoint to connect to (ws:// or wss://)
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_reconnect")]
    pub reconnect: bool,

    #[serde(default)]
    pub reconnect_policy: ReconnectConfig,

    #[serde(default)]
    pub transport: TransportConfig,
}

fn default_reconnect() -> bool {
    true
}

impl WsEchoSettings {
    /// Load settings from a YAML file, apply env overrides and validate
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        Self::from_yaml(&yaml_content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut settings: WsEchoSettings = serde_yaml::from_str(yaml)?;

        // Don't fail if .env doesn't exist
        dotenv::dotenv().ok();

        if let Ok(url) = std::env::var("WS_URL") {
            info!("Overriding URL from environment variable");
            settings.url = url;
        }

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        validate_url(&self.url).map_err(|e| SettingsError::ValidationError(e.to_string()))?;

        if self.reconnect_policy.base_interval.is_zero() {
            return Err(SettingsError::ValidationError(
                "reconnect_policy.base_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.reconnect_policy.max_interval < self.reconnect_policy.base_interval {
            return Err(SettingsError::ValidationError(
                "reconnect_policy.max_interval_ms must not be below base_interval_ms".to_string(),
            ));
        }
        if self.transport.ping_interval.is_some_and(|d| d.is_zero()) {
            return Err(SettingsError::ValidationError(
                "transport.ping_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
