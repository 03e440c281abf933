#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for `FerroSocket`
//!
//! These tests drive duplex sockets over in-memory and real TCP WebSocket
//! connections.

mod memory_test;
mod metrics_test;
mod websocket_test;

use bytes::Bytes;
use ferrosocket::prelude::*;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::MaybeTlsStream;

pub const WAIT: Duration = Duration::from_secs(5);

pub type ClientConnection = WebSocketConnection<MaybeTlsStream<TcpStream>>;
pub type ServerConnection = WebSocketConnection<TcpStream>;

pub fn init_logging() {
    ferrosocket_observability::init_minimal_logging();
}

/// Bind a listener on an ephemeral port
pub async fn bind_local() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Accept one WebSocket client and wrap it as an acceptor-side socket.
pub fn accept_one(
    listener: TcpListener,
    builder: DuplexBuilder,
) -> JoinHandle<DuplexSocket<ServerConnection>> {
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept failed");
        let connection = WebSocketConnection::accept(stream)
            .await
            .expect("WebSocket handshake failed");
        builder
            .role(Role::Acceptor)
            .build(Arc::new(connection))
            .expect("Failed to build server socket")
    })
}

/// Connect a client socket and the matching server socket over loopback TCP.
pub async fn websocket_pair(
    server: DuplexBuilder,
    client: DuplexBuilder,
) -> (DuplexSocket<ServerConnection>, DuplexSocket<ClientConnection>) {
    let (listener, addr) = bind_local().await;
    let accept = accept_one(listener, server);

    let connection = WebSocketConnection::connect(&format!("ws://{addr}"))
        .await
        .expect("Failed to connect");
    let client = client
        .role(Role::Initiator)
        .build(Arc::new(connection))
        .expect("Failed to build client socket");
    let server = tokio::time::timeout(WAIT, accept).await.unwrap().unwrap();
    (server, client)
}

/// Run a socket in the background until it shuts down.
pub fn spawn_run<C>(socket: &DuplexSocket<C>) -> JoinHandle<ferrosocket::Result<()>>
where
    C: Connection + ?Sized + 'static,
{
    let socket = socket.clone();
    tokio::spawn(async move { socket.run(CancellationToken::new()).await })
}

/// Wait for a background run and return its outcome.
pub async fn join_run(run: JoinHandle<ferrosocket::Result<()>>) -> ferrosocket::Result<()> {
    tokio::time::timeout(WAIT, run)
        .await
        .expect("run did not finish")
        .expect("run task panicked")
}

/// Read until at least `len` bytes are available, then consume them all.
pub async fn read_at_least(reader: &PipeReader, len: usize) -> Bytes {
    let read = async {
        loop {
            let result = reader.read().await.unwrap();
            let available = result.buffer.len();
            if available >= len {
                let bytes = result.buffer.to_bytes();
                reader.advance(available).unwrap();
                return bytes;
            }
            assert!(!result.is_completed, "input completed early");
            reader.advance_to(0, available).unwrap();
        }
    };
    tokio::time::timeout(WAIT, read)
        .await
        .expect("timed out waiting for input")
}
