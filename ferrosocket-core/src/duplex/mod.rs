//! Duplex byte-stream adapter over a message connection
//!
//! A [`DuplexSocket`] turns a [`Connection`] into two byte channels:
//! [`input`](DuplexSocket::input) yields inbound bytes, reassembled from
//! fragments and published once per complete message, and
//! [`output`](DuplexSocket::output) accepts outbound bytes.
//!
//! [`run`](DuplexSocket::run) drives the inbound pump and, in
//! [`OutboundMode::Pump`], the outbound pump until either side shuts down.
//! Shutdown goes through [`complete`](DuplexSocket::complete), which runs at
//! most once per socket and closes the connection when configured to.

mod inbound;
mod outbound;
mod output;

pub use output::Output;

use crate::connection::{CloseStatus, Connection, ConnectionState};
use crate::pipe::{Pipe, PipeReader, PipeWriter};
use ferrosocket_common::{DuplexOptions, OutboundMode, Result, Role, SocketError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Duplex byte-stream adapter bound to one connection for its lifetime.
pub struct DuplexSocket<C: ?Sized> {
    inner: Arc<Inner<C>>,
}

impl<C: ?Sized> Clone for DuplexSocket<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: ?Sized> std::fmt::Debug for DuplexSocket<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplexSocket")
            .field("id", &self.inner.id)
            .field("outbound_mode", &self.inner.options.outbound_mode)
            .field("completed", &self.inner.completed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

pub(crate) struct Inner<C: ?Sized> {
    id: Uuid,
    options: DuplexOptions,
    inbound: Pipe,
    /// Owned outbound pipe in pump mode
    outbound: Option<Pipe>,
    outbound_writer: Option<Arc<Mutex<PipeWriter>>>,
    completed: AtomicBool,
    running: AtomicBool,
    /// Cancelled by `complete` so both pumps leave their suspension points
    shutdown: CancellationToken,
    connection: Arc<C>,
}

impl<C> DuplexSocket<C>
where
    C: Connection + ?Sized + 'static,
{
    /// Wrap an open (or opening) connection.
    pub fn create(connection: Arc<C>, options: DuplexOptions) -> Result<Self> {
        options.validate()?;

        let inbound = Pipe::new(options.inbound.clone())?;
        let (outbound, outbound_writer) = match options.outbound_mode {
            OutboundMode::Pump => {
                let pipe = Pipe::new(options.outbound.clone())?;
                let writer = Arc::new(Mutex::new(pipe.writer()));
                (Some(pipe), Some(writer))
            }
            OutboundMode::PassThrough => (None, None),
        };

        let id = Uuid::new_v4();
        debug!(
            socket = %id,
            mode = ?options.outbound_mode,
            role = ?options.role,
            "Created duplex socket"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                id,
                options,
                inbound,
                outbound,
                outbound_writer,
                completed: AtomicBool::new(false),
                running: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
                connection,
            }),
        })
    }

    /// Consumer side of the inbound byte channel
    pub fn input(&self) -> PipeReader {
        self.inner.inbound.reader()
    }

    /// Producer side of the outbound path
    pub fn output(&self) -> Output {
        match &self.inner.outbound_writer {
            Some(writer) => Output::buffered(writer.clone()),
            None => Output::direct(self.inner.clone()),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    pub fn close_status(&self) -> Option<CloseStatus> {
        self.inner.connection.close_status()
    }

    pub fn close_status_description(&self) -> Option<String> {
        self.inner.connection.close_status_description()
    }

    pub fn sub_protocol(&self) -> Option<String> {
        self.inner.connection.sub_protocol()
    }

    pub fn is_completed(&self) -> bool {
        self.inner.completed.load(Ordering::Acquire)
    }

    /// Pump both directions until shutdown.
    ///
    /// Fails immediately with [`SocketError::InvalidState`] unless the
    /// connection is open. Cancellation, transport faults and peer closes
    /// end the run with `Ok(())`; other faults are returned.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let state = self.inner.connection.state();
        if state != ConnectionState::Open {
            return Err(SocketError::InvalidState(format!(
                "connection must be open to run, but it is {state}"
            )));
        }
        if self.inner.running.swap(true, Ordering::AcqRel) {
            return Err(SocketError::InvalidState(
                "duplex socket is already running".into(),
            ));
        }

        debug!(socket = %self.inner.id, "Starting duplex pumps");
        let pump_cancel = self.inner.shutdown.child_token();
        let link = async {
            tokio::select! {
                () = cancel.cancelled() => pump_cancel.cancel(),
                () = pump_cancel.cancelled() => {}
            }
        };

        let result = match &self.inner.outbound {
            Some(pipe) => {
                let (inbound, outbound, ()) = tokio::join!(
                    self.inner.run_inbound(&pump_cancel),
                    self.inner.run_outbound(pipe.reader(), &pump_cancel),
                    link
                );
                inbound.and(outbound)
            }
            None => {
                let (inbound, ()) = tokio::join!(self.inner.run_inbound(&pump_cancel), link);
                inbound
            }
        };

        debug!(socket = %self.inner.id, "Duplex pumps exited");
        result
    }

    /// Shut the socket down. Only the first call has any effect.
    ///
    /// Completes the inbound channel, stops both pumps and, when
    /// `close_on_complete` is set or `status` is given, closes the connection
    /// within the configured close timeout.
    pub async fn complete(&self, status: Option<CloseStatus>, description: Option<String>) {
        self.inner.complete(status, description).await;
    }

    /// Dispose the underlying connection without a close handshake.
    pub fn dispose(&self) {
        self.inner.connection.dispose();
    }
}

impl<C> Inner<C>
where
    C: Connection + ?Sized,
{
    pub(crate) async fn complete(&self, status: Option<CloseStatus>, description: Option<String>) {
        if self
            .completed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        debug!(socket = %self.id, ?status, "Completing duplex socket");
        self.inbound.complete_writer();
        self.inbound.complete_reader();
        if let Some(outbound) = &self.outbound {
            // Late writes fail with InvalidState, as in pass-through mode.
            outbound.complete_writer();
            outbound.reader().cancel_pending_read();
            outbound.complete_reader();
        }
        self.shutdown.cancel();

        #[cfg(feature = "metrics")]
        if let Some(m) = ferrosocket_observability::socket_metrics() {
            m.record_shutdown(if status.is_some() { "closed" } else { "completed" });
        }

        if self.options.close_on_complete || status.is_some() {
            self.close_connection(
                status.unwrap_or(CloseStatus::NORMAL_CLOSURE),
                description.unwrap_or_default(),
            )
            .await;
        }
    }

    async fn close_connection(&self, status: CloseStatus, description: String) {
        let state = self.connection.state();
        if matches!(
            state,
            ConnectionState::Closed | ConnectionState::CloseSent | ConnectionState::Aborted
        ) {
            debug!(socket = %self.id, %state, "Connection already closing, skipping close");
            return;
        }

        info!(
            socket = %self.id,
            role = ?self.options.role,
            "Closing connection: {} {:?}", status, description
        );

        let cancel = CancellationToken::new();
        let close = async {
            match self.options.role {
                Role::Initiator => self.connection.close(status, &description, &cancel).await,
                Role::Acceptor => {
                    self.connection
                        .close_output(status, &description, &cancel)
                        .await
                }
            }
        };

        match tokio::time::timeout(self.options.close_timeout, close).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(socket = %self.id, "Failed to close connection: {}", e),
            Err(_) => warn!(
                socket = %self.id,
                "Close handshake not acknowledged within {:?}", self.options.close_timeout
            ),
        }
    }

    /// Fold a pump outcome: expected termination causes become `Ok(())`.
    fn classify(&self, direction: &str, outcome: Result<()>) -> Result<()> {
        match outcome {
            Ok(()) => Ok(()),
            Err(e) if e.is_expected_termination() => {
                debug!(socket = %self.id, "{} pump stopped: {}", direction, e);
                Ok(())
            }
            Err(e) => {
                warn!(socket = %self.id, "{} pump failed: {}", direction, e);
                Err(e)
            }
        }
    }
}
