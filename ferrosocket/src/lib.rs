//! # `FerroSocket`
//!
//! Duplex byte-stream adapter over WebSocket-style message connections.
//!
//! ## Overview
//!
//! A [`DuplexSocket`] sits between a message-oriented connection (binary and
//! text frames with a close handshake) and code that wants two plain byte
//! channels. Inbound fragments are reassembled and published once per
//! complete message; outbound bytes are pumped into frames. Shutdown from
//! either direction closes the connection exactly once, with a bounded wait
//! for the peer's acknowledgement.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ferrosocket::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> ferrosocket::Result<()> {
//! let connection = WebSocketConnection::connect("ws://127.0.0.1:9001").await?;
//! let socket = DuplexBuilder::new()
//!     .role(Role::Initiator)
//!     .close_on_complete(true)
//!     .build(Arc::new(connection))?;
//!
//! let runner = socket.clone();
//! tokio::spawn(async move { runner.run(CancellationToken::new()).await });
//!
//! socket.output().write(b"hello").await?;
//! let result = socket.input().read().await?;
//! println!("received {} bytes", result.buffer.len());
//! socket.complete(Some(CloseStatus::NORMAL_CLOSURE), None).await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`ferrosocket-common`] - Errors, options and defaults
//! - [`ferrosocket-core`] - Pipes, connections and the duplex adapter
//! - `ferrosocket-observability` - Tracing setup and Prometheus counters
//!   (behind the `metrics` feature)

mod builder;

pub use builder::DuplexBuilder;

// Re-export subcrates
pub use ferrosocket_common as common;
pub use ferrosocket_core as adapter;
#[cfg(feature = "metrics")]
pub use ferrosocket_observability as observability;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapter::{
        CloseStatus, Connection, ConnectionState, DuplexSocket, MemoryConnection, Output,
        PipeReader, WebSocketConnection,
    };
    pub use crate::builder::DuplexBuilder;
    pub use crate::common::{DuplexOptions, OutboundMode, PipeOptions, Result, Role, SocketError};
    pub use tokio_util::sync::CancellationToken;
}

// Convenience re-exports at crate root
pub use adapter::{
    CloseStatus, Connection, ConnectionState, DuplexSocket, MemoryConnection, MessageKind, Output,
    Pipe, PipeReader, PipeWriter, WebSocketConnection,
};
pub use common::{DuplexOptions, OutboundMode, PipeOptions, Result, Role, SocketError};
