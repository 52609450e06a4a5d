use crate::traits::*;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Settings handed to the transport for every connection it opens
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Send a keepalive ping at this interval; `None` disables keepalive
    #[serde(rename = "ping_interval_ms", with = "millis::option")]
    pub ping_interval: Option<Duration>,

    /// Retry a failed TCP/handshake once before reporting failure
    pub retry_on_failure: bool,

    /// Extra headers sent with the upgrade request
    pub headers: Vec<(String, String)>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ping_interval: None,
            retry_on_failure: true,
            headers: Vec::new(),
        }
    }
}

impl TransportConfig {
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = Some(interval);
        self
    }

    pub fn retry_on_failure(mut self, retry: bool) -> Self {
        self.retry_on_failure = retry;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Reconnect schedule parameters for the built-in linear policy
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Delay added per consecutive attempt
    #[serde(rename = "base_interval_ms", with = "millis")]
    pub base_interval: Duration,

    /// Ceiling for any single delay
    #[serde(rename = "max_interval_ms", with = "millis")]
    pub max_interval: Duration,

    /// Stop after this many consecutive attempts (None = unlimited)
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(1000),
            max_interval: Duration::from_millis(3000),
            max_attempts: None,
        }
    }
}

impl ReconnectConfig {
    pub fn strategy(&self) -> LinearBackoff {
        LinearBackoff::new(self.base_interval, self.max_interval, self.max_attempts)
    }
}

/// Immutable manager configuration
///
/// Produced by the builder and owned by the manager for its whole life.
pub struct ManagerConfig {
    /// WebSocket URL (ws:// or wss://), validated at build time
    pub(crate) url: String,

    /// Transport settings passed with every open request
    pub(crate) transport_config: TransportConfig,

    /// Whether failures schedule reconnect attempts
    pub(crate) reconnect_enabled: bool,

    /// Delay schedule between reconnect attempts
    pub(crate) reconnect_strategy: Arc<dyn ReconnectionStrategy>,
}

impl ManagerConfig {
    /// Get a reference to the URL
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn transport_config(&self) -> &TransportConfig {
        &self.transport_config
    }

    pub fn reconnect_enabled(&self) -> bool {
        self.reconnect_enabled
    }

    pub fn reconnect_strategy(&self) -> &dyn ReconnectionStrategy {
        self.reconnect_strategy.as_ref()
    }
}

impl fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("url", &self.url)
            .field("transport_config", &self.transport_config)
            .field("reconnect_enabled", &self.reconnect_enabled)
            .finish_non_exhaustive()
    }
}

/// Check that `raw` parses as an absolute ws:// or wss:// URL
pub fn validate_url(raw: &str) -> Result<url::Url> {
    if raw.trim().is_empty() {
        return Err(WsManagerError::InvalidUrl("URL is empty".into()));
    }

    let parsed = url::Url::parse(raw)
        .map_err(|e| WsManagerError::InvalidUrl(format!("{}: {}", raw, e)))?;

    match parsed.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(WsManagerError::InvalidUrl(format!(
                "unsupported scheme '{}', expected ws or wss",
                other
            )))
        }
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(WsManagerError::InvalidUrl(format!("{}: missing host", raw)));
    }

    Ok(parsed)
}

/// Serde helpers for durations written as integer milliseconds
pub(crate) mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }

    pub mod option {
        use super::*;

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
        }
    }
}
