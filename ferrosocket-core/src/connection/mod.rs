//! Message-oriented connection capability
//!
//! The duplex adapter drives any full-duplex message transport through the
//! [`Connection`] trait. Two implementations ship with the crate:
//!
//! - [`MemoryConnection`]: in-process peers, used for loopback and tests
//! - [`WebSocketConnection`]: a `tokio-tungstenite` WebSocket stream

use async_trait::async_trait;
use ferrosocket_common::Result;
use std::fmt;
use tokio_util::sync::CancellationToken;

pub mod memory;
mod tracker;
pub mod websocket;

pub use memory::MemoryConnection;
pub(crate) use tracker::StateTracker;
pub use websocket::WebSocketConnection;

/// Lifecycle of a connection's close handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Connecting,
    Open,
    /// Local close frame sent, waiting for the peer's
    CloseSent,
    /// Peer's close frame received, ours not sent yet
    CloseReceived,
    Closed,
    Aborted,
}

impl ConnectionState {
    /// No further frames can be exchanged
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Aborted)
    }

    /// Receiving is permitted
    pub fn can_receive(self) -> bool {
        matches!(self, ConnectionState::Open | ConnectionState::CloseSent)
    }

    /// Sending data or a close frame is permitted
    pub fn can_send(self) -> bool {
        matches!(self, ConnectionState::Open | ConnectionState::CloseReceived)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::CloseSent => "close-sent",
            ConnectionState::CloseReceived => "close-received",
            ConnectionState::Closed => "closed",
            ConnectionState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Payload kind of a frame fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Binary,
    Text,
    /// The fragment is the peer's close frame
    Close,
}

/// WebSocket close status code (RFC 6455 §7.4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloseStatus(u16);

impl CloseStatus {
    pub const NORMAL_CLOSURE: Self = Self(1000);
    pub const ENDPOINT_UNAVAILABLE: Self = Self(1001);
    pub const PROTOCOL_ERROR: Self = Self(1002);
    pub const INVALID_MESSAGE_TYPE: Self = Self(1003);
    /// No status code was present in the close frame
    pub const EMPTY: Self = Self(1005);
    pub const INVALID_PAYLOAD_DATA: Self = Self(1007);
    pub const POLICY_VIOLATION: Self = Self(1008);
    pub const MESSAGE_TOO_BIG: Self = Self(1009);
    pub const MANDATORY_EXTENSION: Self = Self(1010);
    pub const INTERNAL_SERVER_ERROR: Self = Self(1011);

    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    pub const fn code(self) -> u16 {
        self.0
    }
}

impl From<u16> for CloseStatus {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl From<CloseStatus> for u16 {
    fn from(status: CloseStatus) -> Self {
        status.0
    }
}

impl fmt::Display for CloseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of receiving one fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveResult {
    /// Bytes written into the caller's buffer
    pub count: usize,
    /// This fragment ends a logical message
    pub end_of_message: bool,
    pub kind: MessageKind,
}

impl ReceiveResult {
    pub fn close() -> Self {
        Self {
            count: 0,
            end_of_message: true,
            kind: MessageKind::Close,
        }
    }
}

/// Full-duplex message transport with an explicit close handshake.
///
/// One task may receive while another sends; implementations must tolerate
/// that, but need not support two concurrent receives or two concurrent sends.
#[async_trait]
pub trait Connection: Send + Sync {
    fn state(&self) -> ConnectionState;

    /// Status of the close frame received from (or, failing that, sent to) the peer
    fn close_status(&self) -> Option<CloseStatus>;

    fn close_status_description(&self) -> Option<String>;

    /// Negotiated sub-protocol, if any
    fn sub_protocol(&self) -> Option<String>;

    /// Receive the next fragment into `buf`.
    async fn receive(&self, buf: &mut [u8], cancel: &CancellationToken) -> Result<ReceiveResult>;

    /// Send one fragment; `end_of_message` terminates the logical message.
    async fn send(
        &self,
        data: &[u8],
        kind: MessageKind,
        end_of_message: bool,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Full close handshake: send a close frame and wait for the peer's.
    async fn close(
        &self,
        status: CloseStatus,
        description: &str,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Half close: send a close frame without waiting for the peer's.
    async fn close_output(
        &self,
        status: CloseStatus,
        description: &str,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Abort the connection. Pending operations fail.
    fn dispose(&self);
}
