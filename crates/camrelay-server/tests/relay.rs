//! End-to-end tests against a real listener with WebSocket clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use camrelay_server::{RelayConfig, RelayServer, ServerConfig};
use camrelay_settings::TakeoverPolicy;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::USER_AGENT;

const TIMEOUT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(200);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Boot a server on an ephemeral port.
async fn boot_server(relay_config: RelayConfig) -> (SocketAddr, Arc<RelayServer>, JoinHandle<()>) {
    let server = Arc::new(RelayServer::new(ServerConfig::default(), relay_config, None));
    let (addr, handle) = server.listen().await.unwrap();
    (addr, server, handle)
}

async fn connect_consumer(addr: SocketAddr) -> WsStream {
    let (ws, _) = connect_async(format!("ws://{addr}/")).await.unwrap();
    ws
}

async fn connect_producer(addr: SocketAddr) -> WsStream {
    let mut req = format!("ws://{addr}/").into_client_request().unwrap();
    let _ = req.headers_mut().insert(
        USER_AGENT,
        HeaderValue::from_static("Python/3.11 websockets/12.0"),
    );
    let (ws, _) = connect_async(req).await.unwrap();
    ws
}

/// Next data or close message, skipping pings.
async fn next_message(ws: &mut WsStream) -> Message {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream closed")
            .expect("ws error");
        if !matches!(msg, Message::Ping(_) | Message::Pong(_)) {
            return msg;
        }
    }
}

async fn read_json(ws: &mut WsStream) -> Value {
    match next_message(ws).await {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected text message, got {other:?}"),
    }
}

/// Read the status message a consumer gets on connect.
async fn read_status(ws: &mut WsStream) -> bool {
    let status = read_json(ws).await;
    assert_eq!(status["type"], "status");
    status["connected"].as_bool().unwrap()
}

/// Assert nothing arrives within [`QUIET`].
async fn assert_quiet(ws: &mut WsStream) {
    if let Ok(Some(Ok(msg))) = timeout(QUIET, ws.next()).await {
        panic!("unexpected message: {msg:?}");
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    timeout(TIMEOUT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached");
}

#[tokio::test]
async fn consumer_without_producer_gets_waiting_status() {
    let (addr, _server, _handle) = boot_server(RelayConfig::default()).await;
    let mut consumer = connect_consumer(addr).await;

    assert_eq!(
        read_json(&mut consumer).await,
        json!({"type": "status", "connected": false, "message": "Waiting for camera..."})
    );
}

#[tokio::test]
async fn consumer_with_producer_gets_streaming_status() {
    let (addr, server, _handle) = boot_server(RelayConfig::default()).await;
    let _producer = connect_producer(addr).await;
    wait_until(|| server.relay().producer_connected()).await;

    let mut consumer = connect_consumer(addr).await;
    assert_eq!(
        read_json(&mut consumer).await,
        json!({"type": "status", "connected": true, "message": "Camera is streaming"})
    );
}

#[tokio::test]
async fn query_parameter_marks_producer() {
    let (addr, server, _handle) = boot_server(RelayConfig::default()).await;
    let (_producer, _) = connect_async(format!("ws://{addr}/?source=rpi")).await.unwrap();
    wait_until(|| server.relay().producer_connected()).await;
    assert_eq!(server.relay().consumer_count(), 0);
}

#[tokio::test]
async fn frames_reach_every_consumer_unchanged() {
    let (addr, server, _handle) = boot_server(RelayConfig::default()).await;
    let mut producer = connect_producer(addr).await;
    wait_until(|| server.relay().producer_connected()).await;

    let mut consumers = Vec::new();
    for _ in 0..3 {
        let mut c = connect_consumer(addr).await;
        assert!(read_status(&mut c).await);
        consumers.push(c);
    }

    let jpeg = vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10, 0x4a, 0x46];
    producer.send(Message::binary(jpeg.clone())).await.unwrap();
    producer.send(Message::text("frame-meta")).await.unwrap();

    for c in &mut consumers {
        assert_eq!(next_message(c).await, Message::binary(jpeg.clone()));
        assert_eq!(next_message(c).await, Message::text("frame-meta"));
    }
}

#[tokio::test]
async fn late_consumer_only_receives_later_frames() {
    let (addr, server, _handle) = boot_server(RelayConfig::default()).await;
    let mut producer = connect_producer(addr).await;
    wait_until(|| server.relay().producer_connected()).await;

    let mut c1 = connect_consumer(addr).await;
    assert!(read_status(&mut c1).await);

    producer.send(Message::binary(vec![1])).await.unwrap();
    producer.send(Message::binary(vec![2])).await.unwrap();
    assert_eq!(next_message(&mut c1).await, Message::binary(vec![1]));
    assert_eq!(next_message(&mut c1).await, Message::binary(vec![2]));

    let mut c2 = connect_consumer(addr).await;
    assert!(read_status(&mut c2).await);

    producer.send(Message::binary(vec![3])).await.unwrap();
    assert_eq!(next_message(&mut c1).await, Message::binary(vec![3]));
    assert_eq!(next_message(&mut c2).await, Message::binary(vec![3]));

    assert_quiet(&mut c1).await;
    assert_quiet(&mut c2).await;
}

#[tokio::test]
async fn replaced_producer_is_orphaned() {
    let (addr, server, _handle) = boot_server(RelayConfig::default()).await;
    let mut first = connect_producer(addr).await;
    wait_until(|| server.relay().stats().producers_installed == 1).await;

    let mut consumer = connect_consumer(addr).await;
    assert!(read_status(&mut consumer).await);

    let mut second = connect_producer(addr).await;
    wait_until(|| server.relay().stats().producers_installed == 2).await;

    first.send(Message::text("old")).await.unwrap();
    wait_until(|| server.relay().stats().frames_orphaned == 1).await;
    second.send(Message::text("new")).await.unwrap();

    assert_eq!(next_message(&mut consumer).await, Message::text("new"));
    assert_quiet(&mut consumer).await;

    drop(first);
    tokio::time::sleep(QUIET).await;
    assert!(server.relay().producer_connected());
}

#[tokio::test]
async fn close_previous_policy_closes_replaced_producer() {
    let config = RelayConfig {
        takeover: TakeoverPolicy::ClosePrevious,
        ..RelayConfig::default()
    };
    let (addr, server, _handle) = boot_server(config).await;
    let mut first = connect_producer(addr).await;
    wait_until(|| server.relay().producer_connected()).await;

    let _second = connect_producer(addr).await;

    match next_message(&mut first).await {
        Message::Close(Some(frame)) => {
            assert_eq!(u16::from(frame.code), 4000);
            assert_eq!(frame.reason.as_str(), "superseded");
        }
        other => panic!("expected close frame, got {other:?}"),
    }
    assert!(server.relay().producer_connected());
}

#[tokio::test]
async fn producer_departure_resets_status() {
    let (addr, server, _handle) = boot_server(RelayConfig::default()).await;
    let mut producer = connect_producer(addr).await;
    wait_until(|| server.relay().producer_connected()).await;

    producer.close(None).await.unwrap();
    wait_until(|| !server.relay().producer_connected()).await;

    let mut consumer = connect_consumer(addr).await;
    assert!(!read_status(&mut consumer).await);
}

#[tokio::test]
async fn health_tracks_consumer_count() {
    let (addr, server, _handle) = boot_server(RelayConfig::default()).await;
    let _producer = connect_producer(addr).await;
    let mut a = connect_consumer(addr).await;
    let mut b = connect_consumer(addr).await;
    let _ = read_status(&mut a).await;
    let _ = read_status(&mut b).await;

    let url = format!("http://{addr}/health");
    let body: Value = reqwest::get(&url).await.unwrap().json().await.unwrap();
    assert_eq!(body, json!({"status": "ok", "clients": 2}));

    a.close(None).await.unwrap();
    wait_until(|| server.relay().consumer_count() == 1).await;

    let body: Value = reqwest::get(&url).await.unwrap().json().await.unwrap();
    assert_eq!(body["clients"], 1);
}

#[tokio::test]
async fn dropped_consumer_does_not_disturb_others() {
    let (addr, server, _handle) = boot_server(RelayConfig::default()).await;
    let mut producer = connect_producer(addr).await;
    wait_until(|| server.relay().producer_connected()).await;

    let mut keep = connect_consumer(addr).await;
    let mut gone = connect_consumer(addr).await;
    let _ = read_status(&mut keep).await;
    let _ = read_status(&mut gone).await;
    drop(gone);

    for i in 0..5u8 {
        producer.send(Message::binary(vec![i])).await.unwrap();
    }
    for i in 0..5u8 {
        assert_eq!(next_message(&mut keep).await, Message::binary(vec![i]));
    }
    wait_until(|| server.relay().consumer_count() == 1).await;
}

#[tokio::test]
async fn shutdown_closes_sessions() {
    let (addr, server, handle) = boot_server(RelayConfig::default()).await;
    let mut consumer = connect_consumer(addr).await;
    let _ = read_status(&mut consumer).await;

    assert_eq!(server.shutdown().active_sessions(), 1);

    let finished = server.shutdown().drain(handle, TIMEOUT).await;
    assert!(finished);
    // Drain waits for sessions, so they have already deregistered.
    assert_eq!(server.shutdown().active_sessions(), 0);
    assert_eq!(server.relay().consumer_count(), 0);

    match next_message(&mut consumer).await {
        Message::Close(Some(frame)) => {
            assert_eq!(u16::from(frame.code), 1001);
            assert_eq!(frame.reason.as_str(), "server shutting down");
        }
        other => panic!("expected close 1001 after shutdown, got {other:?}"),
    }
}
