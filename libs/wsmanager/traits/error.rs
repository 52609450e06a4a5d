use thiserror::Error;

/// Main error type for wsmanager
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WsManagerError {
    /// URL missing, unparsable, or not a WebSocket scheme
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No tokio runtime available to drive transport and timers
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection closed unexpectedly
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Generic error
    #[error("Error: {0}")]
    Other(String),
}

/// Result type for wsmanager operations
pub type Result<T> = std::result::Result<T, WsManagerError>;
