//! Integration tests against a loopback WebSocket server.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use console_realtime::{
    ConnectionState, ConsoleClient, ConsoleClientOptions, EntitySync, Frame, FrameType,
};

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

fn fast_reconnect_options() -> ConsoleClientOptions {
    ConsoleClientOptions {
        reconnect_base_ms: 25,
        reconnect_ceiling_ms: 200,
        max_reconnect_attempts: 5,
        heartbeat_interval_ms: 60_000,
        ..Default::default()
    }
}

fn wire_frame(frame_type: &str, payload: serde_json::Value) -> String {
    serde_json::json!({
        "type": frame_type,
        "payload": payload,
        "timestamp": "2026-08-24T12:00:00Z",
        "messageId": uuid::Uuid::new_v4().to_string(),
    })
    .to_string()
}

async fn wait_for<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if condition().await {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within deadline"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn connect_then_disconnect_is_idempotent() {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(msg) = ws.next().await {
            if msg.is_err() {
                break;
            }
        }
    });

    let client = ConsoleClient::new(&url, fast_reconnect_options()).unwrap();
    client.connect().await.unwrap();
    assert!(client.is_connected().await);
    assert_eq!(client.state().await, ConnectionState::Connected);

    // A second connect while Connected is a no-op.
    client.connect().await.unwrap();
    assert!(client.is_connected().await);

    client.disconnect().await.unwrap();
    assert_eq!(client.state().await, ConnectionState::Disconnected);

    // Safe to call again on an already-disconnected client.
    client.disconnect().await.unwrap();
    assert_eq!(client.state().await, ConnectionState::Disconnected);
}

#[tokio::test]
async fn send_while_disconnected_returns_false() {
    let client =
        ConsoleClient::new("ws://127.0.0.1:9", fast_reconnect_options()).unwrap();
    assert!(!client.send(&Frame::heartbeat()).await);
}

#[tokio::test]
async fn pushed_frames_reach_the_registered_handler() {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(
            wire_frame(
                "status_update",
                serde_json::json!({"id": "a1", "status": "busy"}),
            )
            .into(),
        ))
        .await
        .unwrap();
        while let Some(msg) = ws.next().await {
            if msg.is_err() {
                break;
            }
        }
    });

    let client = ConsoleClient::new(&url, fast_reconnect_options()).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    client
        .on_frame(FrameType::StatusUpdate, move |frame| {
            let _ = tx.send(frame);
        })
        .await;
    client.connect().await.unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("frame not delivered in time")
        .unwrap();
    assert_eq!(frame.frame_type, FrameType::StatusUpdate);
    assert_eq!(frame.payload["id"], "a1");

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn push_delta_merges_into_attached_store() {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(
            wire_frame(
                "task_assignment",
                serde_json::json!({"id": "t9", "title": "probe", "status": "delegated"}),
            )
            .into(),
        ))
        .await
        .unwrap();
        while let Some(msg) = ws.next().await {
            if msg.is_err() {
                break;
            }
        }
    });

    let client = ConsoleClient::new(&url, fast_reconnect_options()).unwrap();
    let sync = EntitySync::new();
    sync.attach(&client).await;
    client.connect().await.unwrap();

    let tasks = sync.tasks();
    wait_for(|| {
        let tasks = tasks.clone();
        async move { tasks.read().unwrap().get("t9").is_some() }
    })
    .await;

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn inbound_heartbeat_is_answered() {
    let (listener, url) = bind().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(
            wire_frame("heartbeat", serde_json::json!({})).into(),
        ))
        .await
        .unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                let _ = tx.send(value);
            }
        }
    });

    let client = ConsoleClient::new(&url, fast_reconnect_options()).unwrap();
    client.connect().await.unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no heartbeat reply in time")
        .unwrap();
    assert_eq!(reply["type"], "heartbeat");

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn clean_server_close_settles_disconnected_and_clears_handlers() {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "shutting down".into(),
        }))
        .await
        .unwrap();
    });

    let client = ConsoleClient::new(&url, fast_reconnect_options()).unwrap();
    client.on_frame(FrameType::TaskResult, |_| {}).await;
    client.connect().await.unwrap();

    let client_for_wait = client.clone();
    wait_for(|| {
        let client = client_for_wait.clone();
        async move { client.state().await == ConnectionState::Disconnected }
    })
    .await;

    // Clean close clears the handler table and never reconnects.
    assert_eq!(client.router().handler_count().await, 0);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(client.state().await, ConnectionState::Disconnected);
}

#[tokio::test]
async fn unclean_close_reconnects_automatically() {
    let (listener, url) = bind().await;
    tokio::spawn(async move {
        // First connection is dropped abruptly, without a close handshake.
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        drop(ws);

        // The client should come back on its own.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(msg) = ws.next().await {
            if msg.is_err() {
                break;
            }
        }
    });

    let client = ConsoleClient::new(&url, fast_reconnect_options()).unwrap();
    client.connect().await.unwrap();

    let client_for_wait = client.clone();
    wait_for(|| {
        let client = client_for_wait.clone();
        async move { client.is_connected().await }
    })
    .await;

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn reconnect_does_not_stack_heartbeat_timers() {
    let (listener, url) = bind().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        // First connection is dropped abruptly to force a reconnect.
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        drop(ws);

        // Count the heartbeats arriving on the replacement connection.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                if value["type"] == "heartbeat" {
                    let _ = tx.send(());
                }
            }
        }
    });

    let options = ConsoleClientOptions {
        heartbeat_interval_ms: 150,
        reconnect_base_ms: 25,
        reconnect_ceiling_ms: 100,
        max_reconnect_attempts: 5,
        ..Default::default()
    };
    let client = ConsoleClient::new(&url, options).unwrap();
    client.connect().await.unwrap();

    // First beat on the new socket confirms the reconnect completed.
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no heartbeat after reconnect")
        .unwrap();

    // A single 150ms timer yields at most 7-8 beats in one second; a leaked
    // timer from the first connection would roughly double that.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    let mut beats = 0;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Some(())) => beats += 1,
            _ => break,
        }
    }
    assert!(beats <= 9, "heartbeat timers stacked: {} beats in window", beats);

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn failed_reconnect_attempts_stay_out_of_disconnected() {
    let (listener, url) = bind().await;

    // Accept once, then drop both the connection and the listener so every
    // retry is refused.
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        drop(ws);
    });

    let options = ConsoleClientOptions {
        reconnect_base_ms: 20,
        reconnect_ceiling_ms: 100,
        max_reconnect_attempts: 3,
        heartbeat_interval_ms: 60_000,
        ..Default::default()
    };
    let client = ConsoleClient::new(&url, options).unwrap();
    let mut states = client.state_changes().await;
    client.connect().await.unwrap();
    server.await.unwrap();

    // Record every published transition until the terminal Disconnected.
    let mut observed = Vec::new();
    loop {
        tokio::time::timeout(Duration::from_secs(5), states.changed())
            .await
            .expect("state stream stalled")
            .unwrap();
        let state = *states.borrow_and_update();
        observed.push(state);
        if state == ConnectionState::Disconnected {
            break;
        }
    }

    // Disconnected appears exactly once, as the terminal state; retries in
    // between only publish Reconnecting and Connecting.
    let disconnects = observed
        .iter()
        .filter(|s| **s == ConnectionState::Disconnected)
        .count();
    assert_eq!(disconnects, 1, "transient Disconnected published: {:?}", observed);
    assert!(observed.contains(&ConnectionState::Reconnecting));
}

#[tokio::test]
async fn exhausted_reconnect_attempts_go_terminal() {
    let (listener, url) = bind().await;

    // Accept once, then drop both the connection and the listener so every
    // retry is refused.
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        drop(ws);
    });

    let options = ConsoleClientOptions {
        reconnect_base_ms: 20,
        reconnect_ceiling_ms: 100,
        max_reconnect_attempts: 2,
        heartbeat_interval_ms: 60_000,
        ..Default::default()
    };
    let client = ConsoleClient::new(&url, options).unwrap();
    client.connect().await.unwrap();
    server.await.unwrap();

    let client_for_wait = client.clone();
    wait_for(|| {
        let client = client_for_wait.clone();
        async move { client.state().await == ConnectionState::Disconnected }
    })
    .await;

    // Terminal: no further attempts resurrect the connection.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(client.state().await, ConnectionState::Disconnected);
    assert!(!client.is_connected().await);
}
