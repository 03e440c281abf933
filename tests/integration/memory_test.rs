//! Duplex sockets over in-memory connections

use super::{join_run, read_at_least, spawn_run, WAIT};
use ferrosocket::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;

fn pair(
    client: DuplexBuilder,
    server: DuplexBuilder,
) -> (
    DuplexSocket<MemoryConnection>,
    DuplexSocket<MemoryConnection>,
) {
    let (a, b) = MemoryConnection::pair();
    (
        client.role(Role::Initiator).build(Arc::new(a)).unwrap(),
        server.build(Arc::new(b)).unwrap(),
    )
}

#[tokio::test]
async fn test_input_as_async_read() {
    let (client, server) = pair(DuplexBuilder::new(), DuplexBuilder::new());
    let _client_run = spawn_run(&client);
    let _server_run = spawn_run(&server);

    let output = client.output();
    output.write(b"hello ").await.unwrap();
    output.write(b"world").await.unwrap();

    let mut reader = server.input().into_async_read();
    let mut buf = [0u8; 11];
    tokio::time::timeout(WAIT, reader.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"hello world");
}

#[tokio::test]
async fn test_backpressure_preserves_order() {
    let (client, server) = pair(
        DuplexBuilder::new().outbound_pipe(PipeOptions::bounded(64, 16)),
        DuplexBuilder::new().inbound_pipe(PipeOptions::bounded(64, 16)),
    );
    let _client_run = spawn_run(&client);
    let _server_run = spawn_run(&server);

    let writer = {
        let output = client.output();
        tokio::spawn(async move {
            for i in 0..200u8 {
                output.write(&[i; 8]).await.unwrap();
            }
        })
    };

    let input = server.input();
    let mut received = Vec::new();
    while received.len() < 200 * 8 {
        let chunk = read_at_least(&input, 1).await;
        received.extend_from_slice(&chunk);
        // Slow consumer keeps the pipes near their thresholds.
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    tokio::time::timeout(WAIT, writer).await.unwrap().unwrap();

    for (i, chunk) in received.chunks(8).enumerate() {
        assert_eq!(chunk, &[i as u8; 8]);
    }
}

#[tokio::test]
async fn test_fragmented_transport_round_trip() {
    let (a, b) = MemoryConnection::pair();
    let client = DuplexBuilder::new()
        .build(Arc::new(a.with_max_fragment_size(3)))
        .unwrap();
    let server = DuplexBuilder::new().build(Arc::new(b)).unwrap();
    let _client_run = spawn_run(&client);
    let _server_run = spawn_run(&server);

    client.output().write(b"fragmented payload").await.unwrap();
    assert_eq!(
        &read_at_least(&server.input(), 18).await[..],
        b"fragmented payload"
    );
}

#[tokio::test]
async fn test_client_close_with_close_on_complete() {
    let (client, server) = pair(
        DuplexBuilder::new().close_on_complete(true),
        DuplexBuilder::new().close_on_complete(true),
    );
    let client_run = spawn_run(&client);
    let server_run = spawn_run(&server);

    client.output().complete().await;

    join_run(client_run).await.unwrap();
    join_run(server_run).await.unwrap();
    assert_eq!(client.state(), ConnectionState::Closed);
    assert_eq!(server.state(), ConnectionState::Closed);
    assert_eq!(server.close_status(), Some(CloseStatus::NORMAL_CLOSURE));
}

#[tokio::test]
async fn test_dispose_stops_run() {
    let (client, _server) = pair(DuplexBuilder::new(), DuplexBuilder::new());
    let run = spawn_run(&client);
    tokio::time::sleep(Duration::from_millis(20)).await;

    client.dispose();
    join_run(run).await.unwrap();
    assert_eq!(client.state(), ConnectionState::Aborted);
    assert!(client.is_completed());
}
