//! # wsmanager traits
//!
//! Contracts the connection manager is built on:
//!
//! - **Transport / TransportHandle / TransportListener**: the socket binding
//! - **NetworkReachability**: synchronous "is there a network" probe
//! - **ReconnectionStrategy**: delay schedule between reconnect attempts
//! - **StatusObserver**: caller-supplied lifecycle callbacks

pub mod error;
pub mod message;
pub mod observer;
pub mod reachability;
pub mod reconnect;
pub mod transport;

// Re-export commonly used types
pub use error::{Result, WsManagerError};
pub use message::{CloseCode, HandshakeResponse, WsMessage};
pub use observer::{NoOpObserver, StatusObserver};
pub use reachability::{AlwaysReachable, InterfaceProbe, NetworkReachability, StaticReachability};
pub use reconnect::{ExponentialBackoff, FixedDelay, LinearBackoff, ReconnectionStrategy};
pub use transport::{OpenRequest, PendingOpen, Transport, TransportHandle, TransportListener};
