pub mod states;

use crate::config::{validate_url, ManagerConfig, ReconnectConfig, TransportConfig};
use crate::dispatcher::DispatchMode;
use crate::manager::WsManager;
use crate::traits::*;
use states::*;
use std::marker::PhantomData;
use std::sync::Arc;

/// Type-state builder for [`WsManager`]
///
/// The URL is the only required field; the type system keeps `build()`
/// out of reach until it is set. Everything else has a default:
///
/// - reconnection enabled, linear backoff 1s step / 3s ceiling
/// - a tokio-tungstenite transport created on first connect
/// - interface-table reachability probe
/// - dedicated dispatch thread
pub struct WsManagerBuilder<U: UrlState> {
    _state: PhantomData<U>,
    url: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    transport_config: TransportConfig,
    reconnect_enabled: bool,
    reconnect_strategy: Option<Arc<dyn ReconnectionStrategy>>,
    reconnect_config: ReconnectConfig,
    reachability: Option<Arc<dyn NetworkReachability>>,
    observer: Option<Arc<dyn StatusObserver>>,
    dispatch_mode: DispatchMode,
    runtime: Option<tokio::runtime::Handle>,
}

impl WsManagerBuilder<NoUrl> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: PhantomData,
            url: None,
            transport: None,
            transport_config: TransportConfig::default(),
            reconnect_enabled: true,
            reconnect_strategy: None,
            reconnect_config: ReconnectConfig::default(),
            reachability: None,
            observer: None,
            dispatch_mode: DispatchMode::default(),
            runtime: None,
        }
    }

    pub fn url(self, url: impl Into<String>) -> WsManagerBuilder<HasUrl> {
        WsManagerBuilder {
            _state: PhantomData,
            url: Some(url.into()),
            transport: self.transport,
            transport_config: self.transport_config,
            reconnect_enabled: self.reconnect_enabled,
            reconnect_strategy: self.reconnect_strategy,
            reconnect_config: self.reconnect_config,
            reachability: self.reachability,
            observer: self.observer,
            dispatch_mode: self.dispatch_mode,
            runtime: self.runtime,
        }
    }
}

impl Default for WsManagerBuilder<NoUrl> {
    fn default() -> Self {
        Self::new()
    }
}

// Optional configuration methods
impl<U: UrlState> WsManagerBuilder<U> {
    /// Use a specific transport instead of the default tungstenite one
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport_config = config;
        self
    }

    /// Enable or disable automatic reconnection (default: enabled)
    pub fn reconnect(mut self, enabled: bool) -> Self {
        self.reconnect_enabled = enabled;
        self
    }

    /// Tune the built-in linear reconnect schedule
    pub fn reconnect_config(mut self, config: ReconnectConfig) -> Self {
        self.reconnect_config = config;
        self
    }

    /// Replace the reconnect schedule entirely
    ///
    /// Takes precedence over `reconnect_config`.
    pub fn reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.reconnect_strategy = Some(Arc::new(strategy));
        self
    }

    pub fn reachability(mut self, probe: Arc<dyn NetworkReachability>) -> Self {
        self.reachability = Some(probe);
        self
    }

    /// Register the observer up front; same as calling `set_observer` later
    pub fn observer(mut self, observer: Arc<dyn StatusObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.dispatch_mode = mode;
        self
    }

    /// Runtime used for transport I/O and reconnect timers
    ///
    /// Defaults to the runtime the builder runs in.
    pub fn runtime(mut self, handle: tokio::runtime::Handle) -> Self {
        self.runtime = Some(handle);
        self
    }
}

// Build method - only available once the URL is set
impl WsManagerBuilder<HasUrl> {
    pub fn build(self) -> Result<WsManager> {
        let url = self
            .url
            .ok_or_else(|| WsManagerError::InvalidUrl("URL must be set".into()))?;
        validate_url(&url)?;

        let runtime = match self.runtime {
            Some(handle) => handle,
            None => tokio::runtime::Handle::try_current()
                .map_err(|e| WsManagerError::NoRuntime(e.to_string()))?,
        };

        let reconnect_strategy = self
            .reconnect_strategy
            .unwrap_or_else(|| Arc::new(self.reconnect_config.strategy()));

        let reachability = self
            .reachability
            .unwrap_or_else(|| Arc::new(InterfaceProbe));

        let config = ManagerConfig {
            url,
            transport_config: self.transport_config,
            reconnect_enabled: self.reconnect_enabled,
            reconnect_strategy,
        };

        let manager = WsManager::new(
            config,
            self.transport,
            reachability,
            self.dispatch_mode,
            runtime,
        )?;

        if let Some(observer) = self.observer {
            manager.set_observer(observer);
        }

        Ok(manager)
    }
}
