//! End-to-end sync against a local socket.io-speaking WebSocket server

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use folio_core::sync::{spawn_connection, ConnectionConfig, ConnectionStatus};
use folio_core::{Action, AppState, EngineProtocol, Store};

const OPEN: &str = r#"0{"sid":"test-sid","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;
const TIMEOUT: Duration = Duration::from_secs(5);

async fn listen() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

async fn accept(listener: &TcpListener) -> WebSocketStream<tokio::net::TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    accept_async(stream).await.unwrap()
}

async fn send_all(ws: &mut WebSocketStream<tokio::net::TcpStream>, frames: &[&str]) {
    for frame in frames {
        ws.send(Message::Text(frame.to_string())).await.unwrap();
    }
}

/// Collect text frames until the client goes away
async fn drain(mut ws: WebSocketStream<tokio::net::TcpStream>) -> Vec<String> {
    let mut received = Vec::new();
    while let Some(Ok(msg)) = ws.next().await {
        match msg {
            Message::Text(text) => received.push(text),
            Message::Close(_) => break,
            _ => {}
        }
    }
    received
}

fn client_config(addr: SocketAddr, protocol: EngineProtocol) -> ConnectionConfig {
    ConnectionConfig {
        url: format!(
            "ws://{}/socket.io/?EIO={}&transport=websocket",
            addr,
            protocol.revision()
        ),
        protocol,
        initial_reconnect_delay: Duration::from_millis(50),
        max_reconnect_delay: Duration::from_millis(200),
        handshake_timeout: Duration::from_secs(2),
    }
}

async fn wait_for_state(store: &Store, predicate: impl FnMut(&AppState) -> bool) {
    let mut rx = store.subscribe();
    tokio::time::timeout(TIMEOUT, rx.wait_for(predicate))
        .await
        .expect("timed out waiting for state")
        .expect("store dropped");
}

#[tokio::test]
async fn test_actions_are_applied_in_order() {
    let (listener, addr) = listen().await;

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        send_all(
            &mut ws,
            &[
                OPEN,
                "40",
                r#"42["action",{"type":"userCount","data":5}]"#,
                r#"42["action",{"type":"donation","data":"gift"}]"#,
                r#"42["action",{"type":"donationEnds"}]"#,
                "this is not a frame",
                r#"42["chat","hello"]"#,
                r#"42["action",{"type":"pollUpdate","data":[{"option":"A","votes":3}]}]"#,
                r#"42["action",{"type":"confetti","data":true}]"#,
            ],
        )
        .await;
        drain(ws).await
    });

    let store = Store::new();
    let handle = spawn_connection(client_config(addr, EngineProtocol::V3), store.clone());

    let expected = AppState {
        donation_active: false,
        donation: None,
        count: json!(5),
        polls: json!([{"option": "A", "votes": 3}]),
    };
    wait_for_state(&store, |state| *state == expected).await;
    assert_eq!(handle.status(), ConnectionStatus::Connected);

    handle.shutdown().await.unwrap();
    let received = tokio::time::timeout(TIMEOUT, server).await.unwrap().unwrap();

    // v3 clients don't join explicitly; they only say goodbye
    assert!(!received.iter().any(|f| f == "40"));
    assert_eq!(received.last().map(String::as_str), Some("1"));
    assert_eq!(store.snapshot(), expected);
}

#[tokio::test]
async fn test_v4_join_heartbeat_and_emit() {
    let (listener, addr) = listen().await;

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        send_all(&mut ws, &[OPEN]).await;

        // The v4 client joins the default namespace itself
        let join = ws.next().await.unwrap().unwrap();
        assert_eq!(join, Message::Text("40".to_string()));

        send_all(
            &mut ws,
            &[
                r#"40{"sid":"socket-sid"}"#,
                "2",
                r#"42["action",{"type":"userCount","data":9}]"#,
            ],
        )
        .await;
        drain(ws).await
    });

    let store = Store::new();
    let handle = spawn_connection(client_config(addr, EngineProtocol::V4), store.clone());

    tokio::time::timeout(TIMEOUT, handle.wait_connected())
        .await
        .unwrap()
        .unwrap();
    wait_for_state(&store, |state| state.visitor_count() == Some(9)).await;

    let vote = Action::with_data("server/vote", json!({"option": "A"}));
    let state = handle.emit(vote).await.unwrap();
    assert_eq!(state.visitor_count(), Some(9));

    // Local-only actions never reach the server
    handle.emit(Action::new("localOnly")).await.unwrap();

    handle.shutdown().await.unwrap();
    let received = tokio::time::timeout(TIMEOUT, server).await.unwrap().unwrap();

    assert!(received.iter().any(|f| f == "3"));
    assert!(received
        .iter()
        .any(|f| f == r#"42["action",{"data":{"option":"A"},"type":"server/vote"}]"#));
    assert!(!received.iter().any(|f| f.contains("localOnly")));
}

#[tokio::test]
async fn test_reconnects_after_server_closes() {
    let (listener, addr) = listen().await;

    let server = tokio::spawn(async move {
        let mut first = accept(&listener).await;
        send_all(
            &mut first,
            &[OPEN, "40", r#"42["action",{"type":"userCount","data":1}]"#, "1"],
        )
        .await;
        drop(first);

        let mut second = accept(&listener).await;
        send_all(
            &mut second,
            &[OPEN, "40", r#"42["action",{"type":"userCount","data":2}]"#],
        )
        .await;
        drain(second).await
    });

    let store = Store::new();
    let handle = spawn_connection(client_config(addr, EngineProtocol::V3), store.clone());

    wait_for_state(&store, |state| state.visitor_count() == Some(2)).await;

    handle.shutdown().await.unwrap();
    tokio::time::timeout(TIMEOUT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_emits_while_waiting_do_not_cut_the_backoff_short() {
    let (listener, addr) = listen().await;
    let attempts = Arc::new(AtomicUsize::new(0));

    // Accept TCP and hang up before the WebSocket upgrade, so every attempt fails
    let counter = attempts.clone();
    let server = tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });

    let config = ConnectionConfig {
        initial_reconnect_delay: Duration::from_secs(2),
        max_reconnect_delay: Duration::from_secs(2),
        ..client_config(addr, EngineProtocol::V3)
    };
    let handle = spawn_connection(config, Store::new());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    for i in 0..10 {
        handle
            .emit(Action::with_data("server/vote", json!(i)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // Still inside the first delay
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(handle.status(), ConnectionStatus::Disconnected);

    handle.shutdown().await.unwrap();
    server.abort();
}

#[tokio::test]
async fn test_emit_confirmed_waits_for_the_join() {
    let (listener, addr) = listen().await;

    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        send_all(&mut ws, &[OPEN]).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        send_all(&mut ws, &["40"]).await;
        drain(ws).await
    });

    let store = Store::new();
    let handle = spawn_connection(client_config(addr, EngineProtocol::V3), store.clone());

    let vote = Action::with_data("server/vote", json!({"option": "B"}));
    tokio::time::timeout(TIMEOUT, handle.emit_confirmed(vote))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(handle.status(), ConnectionStatus::Connected);

    handle.shutdown().await.unwrap();
    let received = tokio::time::timeout(TIMEOUT, server).await.unwrap().unwrap();
    assert_eq!(
        received.first().map(String::as_str),
        Some(r#"42["action",{"data":{"option":"B"},"type":"server/vote"}]"#)
    );
}
