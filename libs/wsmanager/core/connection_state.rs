use std::fmt;

/// Connection lifecycle status
///
/// Allowed transitions:
///
/// ```text
/// Disconnected -> Connecting -> Connected -> Reconnecting -> Connecting
///                      |                          ^
///                      +--------------------------+   (open failed)
/// any -> Disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ConnectionStatus {
    #[default]
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Reconnecting = 3,
}

impl ConnectionStatus {
    /// Check whether moving from `self` to `next` is a legal transition
    ///
    /// Staying in the same status is always allowed and is a no-op.
    pub fn can_transition_to(self, next: ConnectionStatus) -> bool {
        use ConnectionStatus::*;

        if self == next {
            return true;
        }

        matches!(
            (self, next),
            (_, Disconnected)
                | (Disconnected, Connecting)
                | (Reconnecting, Connecting)
                | (Connecting, Connected)
                | (Connecting, Reconnecting)
                | (Connected, Reconnecting)
        )
    }

    #[inline]
    pub fn is_connected(self) -> bool {
        self == ConnectionStatus::Connected
    }

    /// Connecting or Connected: a new connect request is redundant
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, ConnectionStatus::Connecting | ConnectionStatus::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}
