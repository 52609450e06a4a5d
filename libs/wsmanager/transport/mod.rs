//! Built-in transport on top of tokio-tungstenite

pub mod keepalive;
pub mod websocket;

pub use self::keepalive::KeepaliveTracker;
pub use self::websocket::{TungsteniteHandle, TungsteniteTransport};
