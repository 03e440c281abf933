//! Builder for duplex sockets.
//!
//! # Example
//!
//! ```rust
//! use ferrosocket::{DuplexBuilder, MemoryConnection, OutboundMode};
//! use std::sync::Arc;
//!
//! let (local, _peer) = MemoryConnection::pair();
//! let socket = DuplexBuilder::new()
//!     .outbound_mode(OutboundMode::PassThrough)
//!     .build(Arc::new(local))
//!     .unwrap();
//! assert!(socket.output().is_pass_through());
//! ```

use ferrosocket_common::{DuplexOptions, OutboundMode, PipeOptions, Result, Role};
use ferrosocket_core::{Connection, DuplexSocket};
use std::sync::Arc;
use std::time::Duration;

/// Builder for constructing a [`DuplexSocket`] with ergonomic configuration.
#[derive(Debug, Clone, Default)]
pub struct DuplexBuilder {
    options: DuplexOptions,
}

impl DuplexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing set of options.
    pub fn from_options(options: DuplexOptions) -> Self {
        Self { options }
    }

    /// Close the connection whenever the socket completes.
    ///
    /// Default: `false`
    #[must_use]
    pub fn close_on_complete(mut self, enabled: bool) -> Self {
        self.options.close_on_complete = enabled;
        self
    }

    /// Set the close handshake role.
    ///
    /// Default: [`Role::Acceptor`]
    #[must_use]
    pub fn role(mut self, role: Role) -> Self {
        self.options.role = role;
        self
    }

    #[must_use]
    pub fn outbound_mode(mut self, mode: OutboundMode) -> Self {
        self.options.outbound_mode = mode;
        self
    }

    #[must_use]
    pub fn inbound_pipe(mut self, options: PipeOptions) -> Self {
        self.options.inbound = options;
        self
    }

    #[must_use]
    pub fn outbound_pipe(mut self, options: PipeOptions) -> Self {
        self.options.outbound = options;
        self
    }

    /// Buffer size requested for each received fragment.
    ///
    /// Default: 4 KiB
    #[must_use]
    pub fn receive_segment_size(mut self, size: usize) -> Self {
        self.options.receive_segment_size = size;
        self
    }

    /// Upper bound on waiting for the close handshake.
    ///
    /// Default: 250 ms
    #[must_use]
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.options.close_timeout = timeout;
        self
    }

    pub fn options(&self) -> &DuplexOptions {
        &self.options
    }

    /// Build the socket over `connection`.
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::Config`](ferrosocket_common::SocketError::Config)
    /// if the options do not validate.
    pub fn build<C>(self, connection: Arc<C>) -> Result<DuplexSocket<C>>
    where
        C: Connection + ?Sized + 'static,
    {
        DuplexSocket::create(connection, self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrosocket_common::SocketError;
    use ferrosocket_core::MemoryConnection;

    #[test]
    fn test_builder_sets_options() {
        let builder = DuplexBuilder::new()
            .close_on_complete(true)
            .role(Role::Initiator)
            .receive_segment_size(1024)
            .close_timeout(Duration::from_millis(100));

        let options = builder.options();
        assert!(options.close_on_complete);
        assert_eq!(options.role, Role::Initiator);
        assert_eq!(options.receive_segment_size, 1024);
        assert_eq!(options.close_timeout, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_pipe() {
        let (local, _peer) = MemoryConnection::pair();
        let result = DuplexBuilder::new()
            .outbound_pipe(PipeOptions::bounded(8, 16))
            .build(Arc::new(local));
        assert!(matches!(result, Err(SocketError::Config(_))));
    }

    #[tokio::test]
    async fn test_build_dyn_connection() {
        let (local, _peer) = MemoryConnection::pair();
        let connection: Arc<dyn Connection> = Arc::new(local);
        let socket = DuplexBuilder::new().build(connection).unwrap();
        assert!(!socket.is_completed());
        assert!(!socket.output().is_pass_through());
    }
}
