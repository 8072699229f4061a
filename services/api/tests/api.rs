use futures_util::{SinkExt, StreamExt};
use lesson_api::{config::Config, router::create_router, state::AppState};
use lesson_core::{Lesson, Pacing};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::Level;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const LESSON: &str = r#"{
    "title": "Dough",
    "defaults": {"pick": null},
    "steps": [
        {"id": "hello", "module": 1, "type": "message", "content": "Hello", "auto_advance": false},
        {"id": "pick", "module": 1, "type": "choice", "prompt": "Warm or cold?",
         "options": [{"label": "Warm", "value": "warm"}, {"label": "Cold", "value": "cold"}],
         "state_key": "pick"},
        {"id": "bye", "module": 2, "type": "message", "content": "Bye", "auto_advance": false}
    ]
}"#;

async fn serve() -> SocketAddr {
    let config = Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        log_level: Level::INFO,
        lesson_path: None,
        pacing: Pacing::INSTANT,
    };
    let state = Arc::new(AppState::new(Lesson::from_json(LESSON).unwrap(), config));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });
    addr
}

async fn next_json(ws: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("server went quiet")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Reads messages until one of type `kind` matching `pred` arrives.
async fn wait_for(ws: &mut Socket, kind: &str, pred: impl Fn(&Value) -> bool) -> Value {
    loop {
        let msg = next_json(ws).await;
        if msg["type"] == kind && pred(&msg) {
            return msg;
        }
    }
}

async fn send(ws: &mut Socket, msg: Value) {
    ws.send(Message::Text(msg.to_string())).await.unwrap();
}

#[tokio::test]
async fn test_health_and_course_outline() {
    let addr = serve().await;

    let health: Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health, json!({"status": "ok"}));

    let outline: Value = reqwest::get(format!("http://{}/api/course", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(outline["title"], "Dough");
    assert_eq!(outline["modules"], json!([1, 2]));
    assert_eq!(outline["steps"][1], json!({"id": "pick", "module": 1, "kind": "choice"}));
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let addr = serve().await;
    let doc: Value = reqwest::get(format!("http://{}/api-docs/openapi.json", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(doc["paths"].get("/api/course").is_some());
    assert!(doc["paths"].get("/health").is_some());
}

#[tokio::test]
async fn test_websocket_plays_lesson() {
    let addr = serve().await;
    let (mut ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();

    let init = next_json(&mut ws).await;
    assert_eq!(init["type"], "initialized");
    assert_eq!(init["title"], "Dough");
    assert_eq!(init["total_steps"], 3);

    // Nothing to choose before the lesson starts.
    send(&mut ws, json!({"type": "choose", "index": 0})).await;
    let rejected = wait_for(&mut ws, "rejected", |_| true).await;
    assert!(rejected["message"].as_str().unwrap().contains("idle"));

    send(&mut ws, json!({"type": "start"})).await;
    wait_for(&mut ws, "message", |m| m["content"] == "Hello").await;

    send(&mut ws, json!({"type": "advance"})).await;
    let choices = wait_for(&mut ws, "choices", |_| true).await;
    assert_eq!(choices["options"][1]["label"], "Cold");
    wait_for(&mut ws, "phase", |m| m["phase"] == "awaiting_choice").await;

    send(&mut ws, json!({"type": "choose", "index": 1})).await;
    // The echo is shown before the answer is recorded.
    let echo = next_json(&mut ws).await;
    assert_eq!(echo["type"], "user_echo");
    assert_eq!(echo["text"], "Cold");
    let update = next_json(&mut ws).await;
    assert_eq!(update["type"], "state_update");
    assert_eq!(update["key"], "pick");
    assert_eq!(update["value"], "cold");
    wait_for(&mut ws, "progress", |m| m["module"] == 2).await;

    send(&mut ws, json!({"type": "advance"})).await;
    let complete = wait_for(&mut ws, "course_complete", |_| true).await;
    assert_eq!(complete["summary"]["title"], "Dough");
    assert_eq!(complete["summary"]["answers"]["pick"], "cold");
}

#[tokio::test]
async fn test_websocket_rejects_blank_answers_and_garbage() {
    let addr = serve().await;
    let (mut ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    next_json(&mut ws).await;

    send(&mut ws, json!({"type": "answer", "text": "   "})).await;
    let rejected = wait_for(&mut ws, "rejected", |_| true).await;
    assert_eq!(rejected["message"], "answer is empty");

    ws.send(Message::Text("not json".to_string())).await.unwrap();
    let rejected = wait_for(&mut ws, "rejected", |_| true).await;
    assert!(
        rejected["message"]
            .as_str()
            .unwrap()
            .starts_with("Unrecognised message")
    );
}

#[tokio::test]
async fn test_websocket_reset_waits_for_start() {
    let addr = serve().await;
    let (mut ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    next_json(&mut ws).await;

    send(&mut ws, json!({"type": "start"})).await;
    wait_for(&mut ws, "phase", |m| m["phase"] == "running").await;

    send(&mut ws, json!({"type": "reset"})).await;
    let update = wait_for(&mut ws, "state_update", |m| m["key"] == "reset").await;
    assert_eq!(update["value"], Value::Null);
    wait_for(&mut ws, "cleared", |_| true).await;
    let phase = wait_for(&mut ws, "phase", |_| true).await;
    assert_eq!(phase, json!({"type": "phase", "phase": "idle", "index": 0}));

    send(&mut ws, json!({"type": "advance"})).await;
    let rejected = wait_for(&mut ws, "rejected", |_| true).await;
    assert!(rejected["message"].as_str().unwrap().contains("idle"));

    send(&mut ws, json!({"type": "start"})).await;
    wait_for(&mut ws, "message", |m| m["content"] == "Hello").await;
}
