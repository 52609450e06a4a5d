//! Contract between the manager and the socket implementation
//!
//! The manager never touches sockets directly. It asks a [`Transport`] to
//! open a connection and receives everything that happens on it through a
//! [`TransportListener`]. Each open is handed its own listener instance, so
//! events from an abandoned attempt can be told apart from the live one.

use crate::core::config::TransportConfig;
use crate::error::WsManagerError;
use crate::message::{HandshakeResponse, WsMessage};
use std::sync::Arc;

/// Everything a transport needs to open one connection
#[derive(Debug, Clone)]
pub struct OpenRequest {
    pub url: String,
    pub config: TransportConfig,
}

/// A live (or establishing) WebSocket connection
///
/// All methods must return promptly; sending and closing only enqueue work
/// for the transport's own I/O task.
pub trait TransportHandle: Send + Sync {
    /// Queue a message for sending
    ///
    /// Returns `false` if the connection can no longer accept messages.
    fn send(&self, message: WsMessage) -> bool;

    /// Start a graceful close with the given code and reason
    ///
    /// Returns `false` if the connection is already broken or closed.
    fn close(&self, code: u16, reason: &str) -> bool;
}

/// An in-flight connection attempt
pub trait PendingOpen: Send {
    /// Abort the attempt if it has not opened yet
    fn cancel(&self);
}

/// Receiver of inbound transport events
///
/// Implementations are invoked from transport-owned tasks, in the order the
/// transport observed the events.
pub trait TransportListener: Send + Sync {
    fn on_open(&self, handle: Arc<dyn TransportHandle>, response: HandshakeResponse);

    fn on_message(&self, message: WsMessage);

    fn on_closing(&self, code: u16, reason: String);

    fn on_closed(&self, code: u16, reason: String);

    fn on_failure(&self, error: WsManagerError, response: Option<HandshakeResponse>);
}

/// Factory for connections
pub trait Transport: Send + Sync {
    /// Begin opening a connection
    ///
    /// Must not block: the outcome is reported later through `listener`,
    /// either `on_open` or `on_failure`.
    fn open(&self, request: OpenRequest, listener: Arc<dyn TransportListener>)
        -> Box<dyn PendingOpen>;
}
