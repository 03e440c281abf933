//! In-process connection pair
//!
//! Each peer's sends land in the other peer's inbox as fragments. The close
//! handshake follows the same state machine as a WebSocket.

use super::{
    CloseStatus, Connection, ConnectionState, MessageKind, ReceiveResult, StateTracker,
};
use async_trait::async_trait;
use bytes::Bytes;
use ferrosocket_common::{Result, SocketError};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug)]
enum WireFrame {
    Data {
        kind: MessageKind,
        payload: Bytes,
        end_of_message: bool,
    },
    Close {
        status: CloseStatus,
        description: String,
    },
}

#[derive(Debug)]
struct Inbox {
    rx: mpsc::UnboundedReceiver<WireFrame>,
    /// Remainder of a fragment larger than the caller's buffer
    partial: Option<(MessageKind, Bytes, bool)>,
}

/// One end of an in-memory connection pair
#[derive(Debug)]
pub struct MemoryConnection {
    tracker: StateTracker,
    tx: mpsc::UnboundedSender<WireFrame>,
    inbox: Mutex<Inbox>,
    sub_protocol: Option<String>,
    max_fragment_size: Option<usize>,
}

impl MemoryConnection {
    /// Create two connected peers, both already open.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (Self::new(a_tx, a_rx), Self::new(b_tx, b_rx))
    }

    fn new(tx: mpsc::UnboundedSender<WireFrame>, rx: mpsc::UnboundedReceiver<WireFrame>) -> Self {
        Self {
            tracker: StateTracker::new(ConnectionState::Open),
            tx,
            inbox: Mutex::new(Inbox { rx, partial: None }),
            sub_protocol: None,
            max_fragment_size: None,
        }
    }

    #[must_use]
    pub fn with_sub_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.sub_protocol = Some(protocol.into());
        self
    }

    /// Split every sent payload into wire fragments of at most `size` bytes.
    #[must_use]
    pub fn with_max_fragment_size(mut self, size: usize) -> Self {
        self.max_fragment_size = Some(size.max(1));
        self
    }

    fn push(&self, frame: WireFrame) -> Result<()> {
        self.tx
            .send(frame)
            .map_err(|_| SocketError::ConnectionClosed("peer has gone away".into()))
    }

    /// Read frames until the peer's close frame arrives or the peer goes away.
    async fn drain_until_close(&self) {
        let mut inbox = self.inbox.lock().await;
        inbox.partial = None;
        loop {
            match inbox.rx.recv().await {
                Some(WireFrame::Close {
                    status,
                    description,
                }) => {
                    self.tracker.on_close_received(status, description);
                    return;
                }
                Some(WireFrame::Data { .. }) => continue,
                None => {
                    self.tracker.on_stream_end();
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    fn state(&self) -> ConnectionState {
        self.tracker.state()
    }

    fn close_status(&self) -> Option<CloseStatus> {
        self.tracker.close_status()
    }

    fn close_status_description(&self) -> Option<String> {
        self.tracker.close_status_description()
    }

    fn sub_protocol(&self) -> Option<String> {
        self.sub_protocol.clone()
    }

    async fn receive(&self, buf: &mut [u8], cancel: &CancellationToken) -> Result<ReceiveResult> {
        self.tracker.ensure_can_receive()?;
        let aborted = self.tracker.aborted();

        let mut inbox = tokio::select! {
            guard = self.inbox.lock() => guard,
            () = cancel.cancelled() => return Err(SocketError::Cancelled),
            () = aborted.cancelled() => return Err(SocketError::ConnectionClosed("connection aborted".into())),
        };

        let (kind, payload, fragment_end) = match inbox.partial.take() {
            Some(partial) => partial,
            None => {
                let frame = tokio::select! {
                    frame = inbox.rx.recv() => frame,
                    () = cancel.cancelled() => return Err(SocketError::Cancelled),
                    () = aborted.cancelled() => return Err(SocketError::ConnectionClosed("connection aborted".into())),
                };
                match frame {
                    Some(WireFrame::Data {
                        kind,
                        payload,
                        end_of_message,
                    }) => (kind, payload, end_of_message),
                    Some(WireFrame::Close {
                        status,
                        description,
                    }) => {
                        debug!("Received close frame: {} {:?}", status, description);
                        self.tracker.on_close_received(status, description);
                        return Ok(ReceiveResult::close());
                    }
                    None => {
                        self.tracker.on_stream_end();
                        return Err(SocketError::ConnectionClosed(
                            "peer has gone away".into(),
                        ));
                    }
                }
            }
        };

        let count = buf.len().min(payload.len());
        buf[..count].copy_from_slice(&payload[..count]);
        let rest = payload.slice(count..);
        let end_of_message = rest.is_empty() && fragment_end;
        if !rest.is_empty() {
            inbox.partial = Some((kind, rest, fragment_end));
        }

        Ok(ReceiveResult {
            count,
            end_of_message,
            kind,
        })
    }

    async fn send(
        &self,
        data: &[u8],
        kind: MessageKind,
        end_of_message: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(SocketError::Cancelled);
        }
        if kind == MessageKind::Close {
            return Err(SocketError::InvalidState(
                "close frames are sent with close or close_output".into(),
            ));
        }
        self.tracker.ensure_can_send()?;

        let payload = Bytes::copy_from_slice(data);
        let fragment_size = self.max_fragment_size.unwrap_or(usize::MAX);
        if payload.len() <= fragment_size {
            return self.push(WireFrame::Data {
                kind,
                payload,
                end_of_message,
            });
        }

        let mut offset = 0;
        while offset < payload.len() {
            let end = (offset + fragment_size).min(payload.len());
            self.push(WireFrame::Data {
                kind,
                payload: payload.slice(offset..end),
                end_of_message: end_of_message && end == payload.len(),
            })?;
            offset = end;
        }
        Ok(())
    }

    async fn close(
        &self,
        status: CloseStatus,
        description: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if self.state() != ConnectionState::CloseSent {
            self.close_output(status, description, cancel).await?;
        }

        tokio::select! {
            () = self.tracker.wait_terminal() => Ok(()),
            () = self.drain_until_close() => Ok(()),
            () = cancel.cancelled() => Err(SocketError::Cancelled),
        }
    }

    async fn close_output(
        &self,
        status: CloseStatus,
        description: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(SocketError::Cancelled);
        }
        self.tracker.ensure_can_send()?;

        self.push(WireFrame::Close {
            status,
            description: description.to_string(),
        })?;
        self.tracker.on_close_sent(status, description);
        Ok(())
    }

    fn dispose(&self) {
        self.tracker.abort();
    }
}
