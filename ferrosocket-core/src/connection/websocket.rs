//! WebSocket connection over `tokio-tungstenite`
//!
//! Complete messages read from the socket are served into caller buffers one
//! fragment at a time; `end_of_message` is reported on the fragment that
//! drains the message. Outbound fragments are accumulated and written as a
//! single WebSocket message when `end_of_message` is set.

use super::{
    CloseStatus, Connection, ConnectionState, MessageKind, ReceiveResult, StateTracker,
};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use ferrosocket_common::{Result, SocketError};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct Inbox<S> {
    /// Dropped on dispose together with the sink to release the transport
    stream: Option<SplitStream<WebSocketStream<S>>>,
    partial: Option<(MessageKind, Bytes)>,
}

struct Outbox<S> {
    sink: Option<SplitSink<WebSocketStream<S>, Message>>,
    /// Fragments of the message being assembled
    pending: BytesMut,
    pending_kind: Option<MessageKind>,
}

/// A [`Connection`] backed by a `tokio-tungstenite` WebSocket stream
pub struct WebSocketConnection<S> {
    tracker: StateTracker,
    inbox: Mutex<Inbox<S>>,
    outbox: Mutex<Outbox<S>>,
    sub_protocol: Option<String>,
}

impl<S> std::fmt::Debug for WebSocketConnection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketConnection")
            .field("state", &self.tracker.state())
            .field("sub_protocol", &self.sub_protocol)
            .finish_non_exhaustive()
    }
}

impl WebSocketConnection<MaybeTlsStream<TcpStream>> {
    /// Connect to a `ws://` or `wss://` URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws_stream, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(map_ws_error)?;

        let sub_protocol = response
            .headers()
            .get("sec-websocket-protocol")
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let mut connection = Self::new(ws_stream);
        connection.sub_protocol = sub_protocol;
        Ok(connection)
    }
}

impl<S> WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap an already-open WebSocket stream.
    pub fn new(ws_stream: WebSocketStream<S>) -> Self {
        let (sink, stream) = ws_stream.split();
        Self {
            tracker: StateTracker::new(ConnectionState::Open),
            inbox: Mutex::new(Inbox {
                stream: Some(stream),
                partial: None,
            }),
            outbox: Mutex::new(Outbox {
                sink: Some(sink),
                pending: BytesMut::new(),
                pending_kind: None,
            }),
            sub_protocol: None,
        }
    }

    /// Run the server side of the WebSocket handshake over `stream`.
    pub async fn accept(stream: S) -> Result<Self> {
        let ws_stream = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(map_ws_error)?;
        Ok(Self::new(ws_stream))
    }

    #[must_use]
    pub fn with_sub_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.sub_protocol = Some(protocol.into());
        self
    }

    /// Next data message, or `None` once the peer's close frame was consumed.
    async fn next_message(&self, inbox: &mut Inbox<S>) -> Result<Option<(MessageKind, Bytes)>> {
        let Some(stream) = inbox.stream.as_mut() else {
            return Err(disposed());
        };
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Some((MessageKind::Binary, data))),
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some((
                        MessageKind::Text,
                        Bytes::copy_from_slice(text.as_bytes()),
                    )));
                }
                // tungstenite answers pings itself
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(frame))) => {
                    let (status, description) = match frame {
                        Some(frame) => (
                            CloseStatus::from(u16::from(frame.code)),
                            frame.reason.as_str().to_owned(),
                        ),
                        None => (CloseStatus::EMPTY, String::new()),
                    };
                    debug!("Received close frame: {} {:?}", status, description);
                    self.tracker.on_close_received(status, description);
                    return Ok(None);
                }
                Some(Err(e)) => {
                    self.tracker.on_stream_end();
                    return Err(map_ws_error(e));
                }
                None => {
                    self.tracker.on_stream_end();
                    return Err(SocketError::ConnectionClosed("stream ended".into()));
                }
            }
        }
    }

    async fn drain_until_close(&self) {
        let mut inbox = self.inbox.lock().await;
        inbox.partial = None;
        while !self.tracker.state().is_terminal() {
            match self.next_message(&mut inbox).await {
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => return,
            }
        }
    }
}

fn disposed() -> SocketError {
    SocketError::ConnectionClosed("connection aborted".into())
}

fn map_ws_error(err: tungstenite::Error) -> SocketError {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            SocketError::ConnectionClosed(err.to_string())
        }
        tungstenite::Error::Io(e) => SocketError::Io(e),
        other => SocketError::WebSocket(other.to_string()),
    }
}

#[async_trait]
impl<S> Connection for WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
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
            () = aborted.cancelled() => return Err(disposed()),
        };

        let (kind, payload) = match inbox.partial.take() {
            Some(partial) => partial,
            None => {
                let next = tokio::select! {
                    next = self.next_message(&mut inbox) => next?,
                    () = cancel.cancelled() => return Err(SocketError::Cancelled),
                    () = aborted.cancelled() => {
                        inbox.stream = None;
                        return Err(disposed());
                    }
                };
                match next {
                    Some(message) => message,
                    None => return Ok(ReceiveResult::close()),
                }
            }
        };

        let count = buf.len().min(payload.len());
        buf[..count].copy_from_slice(&payload[..count]);
        let rest = payload.slice(count..);
        let end_of_message = rest.is_empty();
        if !end_of_message {
            inbox.partial = Some((kind, rest));
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
        if kind == MessageKind::Close {
            return Err(SocketError::InvalidState(
                "close frames are sent with close or close_output".into(),
            ));
        }
        self.tracker.ensure_can_send()?;

        let mut outbox = self.outbox.lock().await;
        if let Some(pending_kind) = outbox.pending_kind {
            if pending_kind != kind {
                return Err(SocketError::Protocol(format!(
                    "fragment kind {kind:?} does not match message kind {pending_kind:?}"
                )));
            }
        }
        outbox.pending_kind = Some(kind);
        outbox.pending.extend_from_slice(data);
        if !end_of_message {
            return Ok(());
        }

        outbox.pending_kind = None;
        let payload = outbox.pending.split().freeze();
        let message = match kind {
            MessageKind::Text => {
                let text = String::from_utf8(payload.to_vec()).map_err(|e| {
                    SocketError::Protocol(format!("text message is not valid UTF-8: {e}"))
                })?;
                Message::Text(text.into())
            }
            _ => Message::Binary(payload),
        };

        let aborted = self.tracker.aborted();
        let Some(sink) = outbox.sink.as_mut() else {
            return Err(disposed());
        };
        let result = tokio::select! {
            result = sink.send(message) => result.map_err(map_ws_error),
            () = cancel.cancelled() => Err(SocketError::Cancelled),
            () = aborted.cancelled() => Err(disposed()),
        };
        if aborted.is_cancelled() {
            outbox.sink = None;
        }
        result
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
        self.tracker.ensure_can_send()?;

        let frame = CloseFrame {
            code: CloseCode::from(status.code()),
            reason: description.to_owned().into(),
        };

        let mut outbox = self.outbox.lock().await;
        let Some(sink) = outbox.sink.as_mut() else {
            return Err(disposed());
        };
        let reply_only = self.tracker.state() == ConnectionState::CloseReceived;
        let send = async {
            // Once the peer's close frame was read, tungstenite has queued the
            // reply itself and refuses another close; flushing pushes it out.
            if reply_only {
                return sink.flush().await;
            }
            match sink.send(Message::Close(Some(frame))).await {
                Err(tungstenite::Error::Protocol(ProtocolError::SendAfterClosing)) => {
                    sink.flush().await
                }
                other => other,
            }
        };
        let aborted = self.tracker.aborted();
        let result = tokio::select! {
            result = send => result,
            () = cancel.cancelled() => return Err(SocketError::Cancelled),
            () = aborted.cancelled() => {
                outbox.sink = None;
                return Err(disposed());
            }
        };

        match result {
            Ok(())
            | Err(
                tungstenite::Error::ConnectionClosed
                | tungstenite::Error::AlreadyClosed
                | tungstenite::Error::Protocol(ProtocolError::SendAfterClosing),
            ) => {
                self.tracker.on_close_sent(status, description);
                Ok(())
            }
            Err(e) => Err(map_ws_error(e)),
        }
    }

    fn dispose(&self) {
        self.tracker.abort();
        // Both split halves must go for the socket to drop. A half that is
        // locked by an in-flight call is released by that call on abort.
        if let Ok(mut inbox) = self.inbox.try_lock() {
            inbox.stream = None;
            inbox.partial = None;
        }
        if let Ok(mut outbox) = self.outbox.try_lock() {
            outbox.sink = None;
            outbox.pending.clear();
            outbox.pending_kind = None;
        }
    }
}
