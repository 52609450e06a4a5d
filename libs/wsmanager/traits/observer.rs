use crate::error::WsManagerError;
use crate::message::HandshakeResponse;

/// Trait for receiving connection lifecycle events
///
/// Every callback runs on the manager's designated dispatch context,
/// never on a transport or timer thread. All methods default to no-ops
/// so implementors only override what they care about.
///
/// Observers must not assume they keep the manager alive; the manager
/// only holds the observer, never the other way around.
pub trait StatusObserver: Send + Sync + 'static {
    /// Connection established
    fn on_open(&self, _response: &HandshakeResponse) {}

    /// Text message received
    fn on_text(&self, _text: &str) {}

    /// Binary message received
    fn on_binary(&self, _data: &[u8]) {}

    /// A scheduled reconnect fired and a new attempt is starting
    fn on_reconnect(&self) {}

    /// The peer started the closing handshake
    fn on_closing(&self, _code: u16, _reason: &str) {}

    /// The connection is fully closed
    fn on_closed(&self, _code: u16, _reason: &str) {}

    /// The transport failed; `response` is set when the failure happened
    /// after an HTTP response was received
    fn on_failure(&self, _error: &WsManagerError, _response: Option<&HandshakeResponse>) {}
}

/// An observer that ignores every event
pub struct NoOpObserver;

impl StatusObserver for NoOpObserver {}
