//! Error types for `FerroSocket`

use thiserror::Error;

/// Main error type for `FerroSocket` operations
#[derive(Error, Debug)]
pub enum SocketError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level fault reported by the underlying connection
    #[error("Transport error: {0}")]
    Transport(String),

    /// WebSocket protocol or socket failure
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Operation not permitted in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Operation was cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Connection has been closed or aborted
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Protocol violation by the peer
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl SocketError {
    /// Whether this error is an ordinary way for a pump to stop.
    ///
    /// Cancellation, transport faults and invalid-state faults (such as
    /// writing to a connection that is already closing) end a pump quietly.
    /// Everything else is a genuine fault and is surfaced to the caller.
    pub fn is_expected_termination(&self) -> bool {
        matches!(
            self,
            SocketError::Io(_)
                | SocketError::Transport(_)
                | SocketError::WebSocket(_)
                | SocketError::InvalidState(_)
                | SocketError::Cancelled
                | SocketError::ConnectionClosed(_)
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SocketError>;
