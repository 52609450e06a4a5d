//! # wsmanager
//!
//! A managed WebSocket client: one logical connection to one URL, kept alive
//! across failures by a delayed reconnect policy.
//!
//! ## Features
//!
//! - **Four-state lifecycle**: Disconnected, Connecting, Connected, Reconnecting
//! - **Type-state builder**: the URL is required at compile time
//! - **Pluggable seams**: transport, reconnect strategy and reachability probe are traits
//! - **Stale-event gating**: callbacks from abandoned connections never reach the observer
//! - **Observer dispatch**: status callbacks delivered on one designated thread
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wsmanager::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let manager = WsManager::builder()
//!         .url("wss://echo.example.com/socket")
//!         .observer(Arc::new(MyObserver))
//!         .build()?;
//!
//!     manager.start_connect();
//!     manager.send_text("hello");
//!     manager.stop_connect();
//!     Ok(())
//! }
//! ```

pub mod traits;
pub mod core;
pub mod manager;
pub mod transport;

// Re-export all traits
pub use traits::*;
pub use traits::{error, message, observer, reachability, reconnect};

// Re-export core functionality
pub use self::core::{
    builder, config, connection_state, dispatcher,
    builder::{states, WsManagerBuilder},
    config::{validate_url, ManagerConfig, ReconnectConfig, TransportConfig},
    connection_state::ConnectionStatus,
    dispatcher::{DispatchMode, ObserverEvent},
};

pub use manager::WsManager;
pub use transport::{KeepaliveTracker, TungsteniteHandle, TungsteniteTransport};
