//! Duplex sockets over real WebSocket connections

use super::{
    accept_one, bind_local, init_logging, join_run, read_at_least, spawn_run, websocket_pair, WAIT,
};
use ferrosocket::prelude::*;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn test_echo_then_client_close() {
    init_logging();
    let (server, client) = websocket_pair(DuplexBuilder::new(), DuplexBuilder::new()).await;
    let server_run = spawn_run(&server);
    let client_run = spawn_run(&client);

    let echo = {
        let server = server.clone();
        tokio::spawn(async move {
            let message = read_at_least(&server.input(), 5).await;
            server.output().write(&message).await.unwrap();
        })
    };

    client.output().write(b"hello").await.unwrap();
    assert_eq!(&read_at_least(&client.input(), 5).await[..], b"hello");
    echo.await.unwrap();

    let started = Instant::now();
    client
        .complete(
            Some(CloseStatus::NORMAL_CLOSURE),
            Some("Client Done".to_string()),
        )
        .await;

    // Acknowledged by the server rather than cut off by the close timeout.
    assert!(started.elapsed() < Duration::from_millis(200));
    assert_eq!(client.state(), ConnectionState::Closed);
    assert_eq!(
        client.close_status_description().as_deref(),
        Some("Client Done")
    );

    join_run(client_run).await.unwrap();
    join_run(server_run).await.unwrap();

    assert_eq!(server.state(), ConnectionState::Closed);
    assert_eq!(server.close_status(), Some(CloseStatus::NORMAL_CLOSURE));
    assert!(matches!(
        server.input().read().await,
        Err(SocketError::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_small_receive_segments_keep_message_whole() {
    let (server, client) = websocket_pair(
        DuplexBuilder::new().receive_segment_size(1),
        DuplexBuilder::new(),
    )
    .await;
    let server_run = spawn_run(&server);
    let _client_run = spawn_run(&client);

    let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    client.output().write(&payload).await.unwrap();

    let received = read_at_least(&server.input(), payload.len()).await;
    assert_eq!(&received[..], &payload[..]);

    server
        .complete(
            Some(CloseStatus::ENDPOINT_UNAVAILABLE),
            Some("server leaving".into()),
        )
        .await;
    join_run(server_run).await.unwrap();
}

#[tokio::test]
async fn test_raw_peer_close_is_reported() {
    let (listener, addr) = bind_local().await;
    let accept = accept_one(listener, DuplexBuilder::new());

    let (mut peer, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .unwrap();
    let server = tokio::time::timeout(WAIT, accept).await.unwrap().unwrap();
    let run = spawn_run(&server);

    peer.send(Message::binary(&b"ping"[..])).await.unwrap();
    assert_eq!(&read_at_least(&server.input(), 4).await[..], b"ping");

    peer.send(Message::Close(Some(CloseFrame {
        code: CloseCode::Away,
        reason: "peer going away".into(),
    })))
    .await
    .unwrap();

    join_run(run).await.unwrap();
    assert_eq!(server.state(), ConnectionState::Closed);
    assert_eq!(server.close_status(), Some(CloseStatus::ENDPOINT_UNAVAILABLE));
    assert_eq!(
        server.close_status_description().as_deref(),
        Some("peer going away")
    );

    // The acceptor answered the handshake.
    let reply = tokio::time::timeout(WAIT, peer.next()).await.unwrap();
    assert!(matches!(reply, Some(Ok(Message::Close(_)))));
}

#[tokio::test]
async fn test_pass_through_over_websocket() {
    let (server, client) = websocket_pair(
        DuplexBuilder::new(),
        DuplexBuilder::new().outbound_mode(OutboundMode::PassThrough),
    )
    .await;
    let _server_run = spawn_run(&server);
    let client_run = spawn_run(&client);

    let output = client.output();
    assert!(output.is_pass_through());
    output.write(b"one").await.unwrap();
    output.write(b"two").await.unwrap();

    let input = server.input();
    let mut received = Vec::new();
    while received.len() < 6 {
        received.extend_from_slice(&read_at_least(&input, 1).await);
    }
    assert_eq!(received, b"onetwo");

    output.complete().await;
    join_run(client_run).await.unwrap();
    assert!(client.is_completed());
}

#[tokio::test]
async fn test_dyn_connection_socket() {
    let (listener, addr) = bind_local().await;
    let accept = accept_one(listener, DuplexBuilder::new());

    let connection: Arc<dyn Connection> = Arc::new(
        WebSocketConnection::connect(&format!("ws://{addr}"))
            .await
            .unwrap(),
    );
    let client = DuplexBuilder::new()
        .role(Role::Initiator)
        .close_on_complete(true)
        .build(connection)
        .unwrap();
    let server = tokio::time::timeout(WAIT, accept).await.unwrap().unwrap();
    let server_run = spawn_run(&server);
    let client_run = spawn_run(&client);

    client.output().write(b"dyn").await.unwrap();
    assert_eq!(&read_at_least(&server.input(), 3).await[..], b"dyn");

    client.output().complete().await;
    join_run(client_run).await.unwrap();
    join_run(server_run).await.unwrap();
    assert_eq!(client.state(), ConnectionState::Closed);
}
