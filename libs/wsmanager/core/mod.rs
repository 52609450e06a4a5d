//! Building blocks of the manager: configuration, lifecycle states, the
//! observer dispatcher and the builder.

pub mod builder;
pub mod config;
pub mod connection_state;
pub mod dispatcher;

// Re-export main types
pub use builder::{states, WsManagerBuilder};
pub use config::{ManagerConfig, ReconnectConfig, TransportConfig};
pub use connection_state::ConnectionStatus;
pub use dispatcher::{DispatchMode, Dispatcher, ObserverEvent};

/// Create a new manager builder
pub fn builder() -> WsManagerBuilder<builder::states::NoUrl> {
    WsManagerBuilder::new()
}
