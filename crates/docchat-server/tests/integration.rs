//! End-to-end integration tests using a real WebSocket client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use docchat_core::Role;
use docchat_llm::{AnswerError, AnswerResult, AnswerService};
use docchat_server::metrics::detached_handle;
use docchat_server::{DocchatServer, GatewayConfig, GatewayTask};
use docchat_store::{DocumentStore, NewDocument};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Replies with a fixed string and counts calls.
struct FixedAnswers {
    reply: &'static str,
    calls: AtomicUsize,
}

#[async_trait]
impl AnswerService for FixedAnswers {
    fn model(&self) -> &str {
        "fixed"
    }

    async fn answer(&self, _prompt: &str) -> AnswerResult<String> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.to_string())
    }
}

/// Always fails.
struct FailingAnswers;

#[async_trait]
impl AnswerService for FailingAnswers {
    fn model(&self) -> &str {
        "failing"
    }

    async fn answer(&self, _prompt: &str) -> AnswerResult<String> {
        Err(AnswerError::Api {
            status: 429,
            message: "quota exceeded".into(),
        })
    }
}

struct TestServer {
    addr: SocketAddr,
    server: DocchatServer,
    store: Arc<DocumentStore>,
    _uploads: tempfile::TempDir,
}

fn new_doc(id: &str, user: &str) -> NewDocument {
    NewDocument {
        id: id.into(),
        user_id: user.into(),
        email: format!("{user}@example.com"),
        file_name: format!("{id}.txt"),
        storage_path: format!("/tmp/{id}.txt"),
        size_bytes: 0,
    }
}

/// Boot a gateway on an ephemeral port with `d1` (one segment) and an empty `d2`.
async fn boot_server(answers: Arc<dyn AnswerService>) -> TestServer {
    let store = Arc::new(DocumentStore::open_in_memory().unwrap());
    let _ = store
        .ingest_document(
            &new_doc("d1", "u1"),
            &["Paris is the capital of France.".to_string()],
        )
        .unwrap();
    let _ = store.ingest_document(&new_doc("d2", "u1"), &[]).unwrap();

    let uploads = tempfile::tempdir().unwrap();
    let config = GatewayConfig {
        uploads_dir: uploads.path().to_path_buf(),
        ..GatewayConfig::default()
    };
    let server = DocchatServer::new(config, store.clone(), answers, detached_handle());
    let addr = server.listen().await.unwrap();
    TestServer {
        addr,
        server,
        store,
        _uploads: uploads,
    }
}

fn fixed(reply: &'static str) -> Arc<FixedAnswers> {
    Arc::new(FixedAnswers {
        reply,
        calls: AtomicUsize::new(0),
    })
}

async fn connect(addr: SocketAddr, doc: &str, user: &str) -> WsStream {
    let url = format!("ws://{addr}/ws?documentId={doc}&userId={user}");
    let (ws, _) = timeout(TIMEOUT, connect_async(url)).await.unwrap().unwrap();
    ws
}

async fn send_json(ws: &mut WsStream, value: &Value) {
    ws.send(Message::text(value.to_string())).await.unwrap();
}

/// Next text frame as JSON, skipping control frames.
async fn read_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("read failed");
        match msg {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Resolves once the server closes the channel.
async fn expect_closed(ws: &mut WsStream) {
    loop {
        match timeout(TIMEOUT, ws.next()).await.expect("socket stayed open") {
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
            Some(Ok(_)) => {}
        }
    }
}

async fn admission_status(addr: SocketAddr, query: &str) -> u16 {
    let url = format!("ws://{addr}/ws{query}");
    match connect_async(url).await {
        Ok(_) => panic!("admission unexpectedly succeeded"),
        Err(tungstenite::Error::Http(resp)) => resp.status().as_u16(),
        Err(other) => panic!("unexpected error: {other}"),
    }
}

async fn wait_for_connections(addr: SocketAddr, expected: u64) {
    let client = reqwest::Client::new();
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        let body: Value = client
            .get(format!("http://{addr}/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if body["connections"].as_u64() == Some(expected) {
            return;
        }
        assert!(tokio::time::Instant::now() < deadline, "connections never reached {expected}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn query_round_trip_persists_assistant_exchange() {
    let answers = fixed("The capital is Paris.");
    let ts = boot_server(answers.clone()).await;
    let mut ws = connect(ts.addr, "d1", "u1").await;

    send_json(
        &mut ws,
        &json!({"type": "query", "content": "What is the capital?", "documentId": "d1", "userId": "u1"}),
    )
    .await;
    let frame = read_json(&mut ws).await;
    assert_eq!(frame["type"], "response");
    assert_eq!(frame["content"], "The capital is Paris.");
    assert!(frame["id"].is_string());
    assert!(chrono::DateTime::parse_from_rfc3339(frame["timestamp"].as_str().unwrap()).is_ok());
    assert_eq!(answers.calls.load(Ordering::SeqCst), 1);

    let log = ts.store.conversation("d1", "u1").unwrap();
    let assistant: Vec<_> = log.iter().filter(|e| e.role == Role::Assistant).collect();
    assert_eq!(assistant.len(), 1);
    assert_eq!(assistant[0].content, "The capital is Paris.");
    assert_eq!(assistant[0].id.as_str(), frame["id"].as_str().unwrap());
}

#[tokio::test]
async fn unknown_document_is_rejected_before_upgrade() {
    let ts = boot_server(fixed("x")).await;
    assert_eq!(admission_status(ts.addr, "?documentId=nope&userId=u1").await, 404);
    assert_eq!(admission_status(ts.addr, "?documentId=d1&userId=intruder").await, 404);
    assert_eq!(ts.server.hub().len().await, 0);
}

#[tokio::test]
async fn missing_parameters_are_bad_request() {
    let ts = boot_server(fixed("x")).await;
    assert_eq!(admission_status(ts.addr, "?userId=u1").await, 400);
    assert_eq!(admission_status(ts.addr, "?documentId=d1&userId=").await, 400);
}

#[tokio::test]
async fn empty_document_yields_error_without_answer_call() {
    let answers = fixed("unused");
    let ts = boot_server(answers.clone()).await;
    let mut ws = connect(ts.addr, "d2", "u1").await;

    send_json(&mut ws, &json!({"type": "query", "content": "anything?"})).await;
    let frame = read_json(&mut ws).await;
    assert_eq!(frame["type"], "error");
    assert_eq!(frame["content"], "No content found for this document");
    assert_eq!(answers.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn answer_failure_keeps_session_alive() {
    let ts = boot_server(Arc::new(FailingAnswers)).await;
    let mut ws = connect(ts.addr, "d1", "u1").await;

    for _ in 0..2 {
        send_json(&mut ws, &json!({"type": "query", "content": "q"})).await;
        let frame = read_json(&mut ws).await;
        assert_eq!(frame["type"], "error");
        assert!(frame["content"].as_str().unwrap().contains("quota exceeded"));
    }
    wait_for_connections(ts.addr, 1).await;
}

#[tokio::test]
async fn unknown_frame_type_is_ignored() {
    let ts = boot_server(fixed("still here")).await;
    let mut ws = connect(ts.addr, "d1", "u1").await;

    send_json(&mut ws, &json!({"type": "typing", "content": ""})).await;
    send_json(&mut ws, &json!({"type": "query", "content": "q"})).await;
    let frame = read_json(&mut ws).await;
    assert_eq!(frame["type"], "response");
    assert_eq!(frame["content"], "still here");
}

#[tokio::test]
async fn malformed_frame_closes_session() {
    let ts = boot_server(fixed("x")).await;
    let mut ws = connect(ts.addr, "d1", "u1").await;
    wait_for_connections(ts.addr, 1).await;

    ws.send(Message::text("{not json")).await.unwrap();
    expect_closed(&mut ws).await;
    wait_for_connections(ts.addr, 0).await;
}

#[tokio::test]
async fn health_counts_live_sessions() {
    let ts = boot_server(fixed("x")).await;
    wait_for_connections(ts.addr, 0).await;

    let mut a = connect(ts.addr, "d1", "u1").await;
    let _b = connect(ts.addr, "d2", "u1").await;
    wait_for_connections(ts.addr, 2).await;

    a.close(None).await.unwrap();
    wait_for_connections(ts.addr, 1).await;
}

#[tokio::test]
async fn shutdown_closes_open_sessions() {
    let ts = boot_server(fixed("x")).await;
    let mut ws = connect(ts.addr, "d1", "u1").await;
    wait_for_connections(ts.addr, 1).await;

    ts.server.shutdown().trigger();
    expect_closed(&mut ws).await;
    assert_eq!(ts.server.hub().live_count(), 0);

    let report = ts.server.shutdown().drain(TIMEOUT).await;
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(report.finished, [GatewayTask::Registry, GatewayTask::Listener]);
}

#[tokio::test]
async fn upload_then_list_and_chunks() {
    let ts = boot_server(fixed("x")).await;
    let client = reqwest::Client::new();

    let form = reqwest::multipart::Form::new()
        .text("user_id", "u2")
        .text("email", "u2@example.com")
        .part(
            "file",
            reqwest::multipart::Part::bytes(b"Rust is a systems language.".to_vec())
                .file_name("About.TXT"),
        );
    let resp = client
        .post(format!("http://{}/upload", ts.addr))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(
        body["message"],
        "Document uploaded successfully. Extracted 1 chunks of text."
    );
    let document_id = body["document_id"].as_str().unwrap().to_string();
    let stored = body["document"]["storage_path"].as_str().unwrap();
    assert!(std::path::Path::new(stored).exists());

    let docs: Value = client
        .get(format!("http://{}/users/u2/documents", ts.addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(docs["documents"][0]["id"], document_id.as_str());

    let chunks: Value = client
        .get(format!("http://{}/documents/{document_id}/chunks", ts.addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(chunks["chunks"][0]["content"], "Rust is a systems language.");

    // The uploaded document is immediately chat-ready.
    let mut ws = connect(ts.addr, &document_id, "u2").await;
    send_json(&mut ws, &json!({"type": "query", "content": "What is Rust?"})).await;
    assert_eq!(read_json(&mut ws).await["type"], "response");
}

#[tokio::test]
async fn upload_rejects_non_text_and_empty_files() {
    let ts = boot_server(fixed("x")).await;
    let client = reqwest::Client::new();

    for (name, bytes) in [("report.pdf", b"%PDF".to_vec()), ("blank.txt", b"   \n".to_vec())] {
        let form = reqwest::multipart::Form::new()
            .text("user_id", "u2")
            .text("email", "u2@example.com")
            .part("file", reqwest::multipart::Part::bytes(bytes).file_name(name));
        let resp = client
            .post(format!("http://{}/upload", ts.addr))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "{name}");
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], false);
    }
}

#[tokio::test]
async fn ask_endpoint_answers_once() {
    let ts = boot_server(fixed("Paris.")).await;
    let resp = reqwest::Client::new()
        .post(format!("http://{}/ask", ts.addr))
        .json(&json!({"document_id": "d1", "query": "Capital?", "user_id": "u1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["answer"], "Paris.");
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let ts = boot_server(fixed("x")).await;
    let resp = reqwest::get(format!("http://{}/nope", ts.addr)).await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Route not found");
    assert_eq!(body["path"], "/nope");
}
