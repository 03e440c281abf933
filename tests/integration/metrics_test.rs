//! Counters recorded by the duplex pumps

use super::{read_at_least, spawn_run};
use ferrosocket::prelude::*;
use ferrosocket_observability::{gather_metrics, init_metrics};
use std::sync::Arc;

#[tokio::test]
async fn test_round_trip_updates_counters() {
    let metrics = init_metrics();
    let messages_before = metrics.messages_received();
    let frames_before = metrics.frames_sent();

    let (a, b) = MemoryConnection::pair();
    let client = DuplexBuilder::new().build(Arc::new(a)).unwrap();
    let server = DuplexBuilder::new().build(Arc::new(b)).unwrap();
    let _client_run = spawn_run(&client);
    let _server_run = spawn_run(&server);

    client.output().write(b"counted").await.unwrap();
    read_at_least(&server.input(), 7).await;

    assert!(metrics.messages_received() > messages_before);
    assert!(metrics.frames_sent() > frames_before);

    server
        .complete(Some(CloseStatus::NORMAL_CLOSURE), None)
        .await;
    assert!(metrics.shutdowns("closed") >= 1);

    let text = gather_metrics();
    assert!(text.contains("ferrosocket_bytes_sent_total"));
    assert!(text.contains("ferrosocket_shutdowns_total"));
}
