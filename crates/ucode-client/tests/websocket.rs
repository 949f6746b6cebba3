//! End-to-end tests over a real WebSocket server and a mocked HTTP side channel.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{WebSocketStream, accept_async, accept_hdr_async};
use ucode_client::{AgentSession, HttpFileService, SessionConfig, WsConnector};
use ucode_core::{ConnectionStatus, MessageKind, SessionState};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

type ServerStream = WebSocketStream<TcpStream>;

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, format!("ws://{addr}/ws"))
}

fn config(ws_url: &str, api_url: &str) -> SessionConfig {
    let mut config = SessionConfig::default();
    config.ws_url = ws_url.to_string();
    config.api_base_url = api_url.to_string();
    config.token = Some("tok en".into());
    config.heartbeat_interval = Duration::from_secs(3600);
    config.reconnect.delay = Duration::from_millis(50);
    config
}

fn spawn_session(config: SessionConfig) -> AgentSession {
    let files = HttpFileService::new(&config.api_base_url, Duration::from_secs(5)).unwrap();
    AgentSession::spawn(config, Arc::new(WsConnector::default()), Arc::new(files))
}

async fn wait_until(session: &AgentSession, pred: impl Fn(&SessionState) -> bool) -> SessionState {
    let mut rx = session.subscribe();
    let result = timeout(TIMEOUT, rx.wait_for(|s| pred(s))).await;
    result.expect("timed out waiting for state").expect("driver exited").clone()
}

/// Read the next text frame as JSON, skipping control frames.
async fn read_json(ws: &mut ServerStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream closed")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn accept(listener: &TcpListener) -> ServerStream {
    let (stream, _) = timeout(TIMEOUT, listener.accept()).await.unwrap().unwrap();
    accept_async(stream).await.unwrap()
}

#[tokio::test]
async fn full_session_over_websocket() {
    let (listener, ws_url) = bind().await;
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/files/read"))
        .and(query_param("session_id", "s1"))
        .and(query_param("path", "src/main.rs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": "fn main() {}" })))
        .mount(&api)
        .await;

    let (uri_tx, uri_rx) = oneshot::channel();
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel::<Value>();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            let _ = uri_tx.send(req.uri().to_string());
            Ok(resp)
        };
        let mut ws = accept_hdr_async(stream, callback)
        .await
        .unwrap();

        let _ = frames_tx.send(read_json(&mut ws).await);
        ws.send(Message::text(
            json!({ "type": "status", "status": "ready", "sessionId": "s1" }).to_string(),
        ))
        .await
        .unwrap();
        // binary frames are decoded as text
        let message = json!({ "type": "message", "content": "Looking at the code" }).to_string();
        ws.send(Message::binary(message.into_bytes())).await.unwrap();
        ws.send(Message::text("npm WARN deprecated")).await.unwrap();

        let _ = frames_tx.send(read_json(&mut ws).await);

        // wait for the client's close
        loop {
            match timeout(TIMEOUT, ws.next()).await.unwrap() {
                Some(Ok(Message::Close(frame))) => return frame.map(|f| u16::from(f.code)),
                Some(Ok(_)) => {}
                _ => return None,
            }
        }
    });

    let session = spawn_session(config(&ws_url, &api.uri()));
    session.start(Some("fix the bug"));

    assert_eq!(uri_rx.await.unwrap(), "/ws?token=tok+en");
    let handshake = frames_rx.recv().await.unwrap();
    assert_eq!(handshake["task"], "fix the bug");
    assert_eq!(handshake["token"], "tok en");

    let state = wait_until(&session, |s| {
        s.terminal.iter().any(|e| e.content == "npm WARN deprecated")
    })
    .await;
    assert_eq!(state.status(), ConnectionStatus::Connected);
    assert_eq!(state.session.session_id.as_deref(), Some("s1"));
    assert!(
        state
            .chat
            .iter()
            .any(|m| m.kind == MessageKind::Agent && m.content == "Looking at the code")
    );

    session.send_message("also add tests");
    assert_eq!(
        frames_rx.recv().await.unwrap(),
        json!({ "type": "action", "content": "also add tests" })
    );

    session.select_file("src/main.rs");
    let state = wait_until(&session, |s| s.active_file.as_ref().is_some_and(|f| !f.loading)).await;
    assert_eq!(state.active_file.unwrap().content, "fn main() {}");

    session.stop();
    assert_eq!(server.await.unwrap(), Some(1000));
    let state = wait_until(&session, |s| s.status() == ConnectionStatus::Idle).await;
    assert!(state.session.session_id.is_none());
}

#[tokio::test]
async fn policy_close_from_server_goes_idle() {
    let (listener, ws_url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        let _ = read_json(&mut ws).await;
        ws.close(Some(CloseFrame {
            code: CloseCode::from(4001),
            reason: "Task is required".into(),
        }))
        .await
        .unwrap();
        // a reconnect would show up as a second connection
        timeout(Duration::from_millis(300), listener.accept()).await.is_err()
    });

    let session = spawn_session(config(&ws_url, "http://127.0.0.1:9"));
    session.start(None);

    let state = wait_until(&session, |s| {
        s.status() == ConnectionStatus::Idle && s.terminal.iter().any(|e| e.content.contains("4001"))
    })
    .await;
    assert_eq!(state.session.reconnect_attempts, 0);
    assert!(server.await.unwrap(), "client reconnected after a policy close");
}

#[tokio::test]
async fn abrupt_disconnect_reconnects_with_same_task() {
    let (listener, ws_url) = bind().await;
    let (tasks_tx, mut tasks_rx) = mpsc::unbounded_channel::<Value>();
    let server = tokio::spawn(async move {
        let mut first = accept(&listener).await;
        let _ = tasks_tx.send(read_json(&mut first).await["task"].clone());
        // drop the TCP stream without a close frame
        drop(first);

        let mut second = accept(&listener).await;
        let _ = tasks_tx.send(read_json(&mut second).await["task"].clone());
        second
    });

    let session = spawn_session(config(&ws_url, "http://127.0.0.1:9"));
    session.start(Some("fix the bug"));

    assert_eq!(tasks_rx.recv().await.unwrap(), "fix the bug");
    assert_eq!(tasks_rx.recv().await.unwrap(), "fix the bug");
    let _second = server.await.unwrap();

    let state = wait_until(&session, |s| {
        s.status() == ConnectionStatus::Connected && s.session.reconnect_attempts == 0
    })
    .await;
    assert!(state.terminal.iter().any(|e| e.content.contains("attempt 1/3")));
    session.shutdown().await;
}

#[tokio::test]
async fn unreachable_backend_ends_in_error() {
    // bind then drop to get a port nothing listens on
    let (listener, ws_url) = bind().await;
    drop(listener);

    let mut cfg = config(&ws_url, "http://127.0.0.1:9");
    cfg.reconnect.delay = Duration::from_millis(10);
    let session = spawn_session(cfg);
    session.start(Some("task"));

    let state = wait_until(&session, |s| s.status() == ConnectionStatus::Error).await;
    assert_eq!(state.session.reconnect_attempts, 3);
    assert!(state.terminal.iter().any(|e| e.content.starts_with("Connection error")));
}

#[tokio::test]
async fn invalid_utf8_binary_frame_reaches_terminal() {
    let (listener, ws_url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        let _ = read_json(&mut ws).await;
        ws.send(Message::binary(vec![0xff, 0xfe])).await.unwrap();
        ws
    });

    let session = spawn_session(config(&ws_url, "http://127.0.0.1:9"));
    session.start(Some("task"));

    let state = wait_until(&session, |s| s.terminal.iter().any(|e| e.content == "\u{fffd}\u{fffd}")).await;
    assert_eq!(state.status(), ConnectionStatus::Connected);
    let _ws = server.await.unwrap();
    session.shutdown().await;
}
