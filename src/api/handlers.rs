//! HTTP request handlers

use super::pages::{serve_page, PAGES};
use super::types::{AgentFrame, ErrorResponse, VisitorFrame};
use super::AppState;
use crate::router::DisconnectReason;
use crate::session::SessionId;
use crate::transport::WsVisitor;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use std::path::Path as FsPath;
use std::sync::Arc;
use tower_http::services::ServeDir;

/// Create the HTTP router
pub fn create_router(state: AppState, static_dir: &FsPath) -> Router {
    let mut router = Router::new()
        // Visitor chat sockets
        .route("/ws", get(connect_anonymous))
        .route("/ws/:client_id", get(connect_client))
        .route("/version", get(get_version))
        // Static assets
        .nest_service("/static", ServeDir::new(static_dir));

    for (path, _) in PAGES {
        router = router.route(path, get(serve_page));
    }

    router.with_state(state)
}

// ============================================================
// Visitor WebSocket
// ============================================================

/// Socket whose session id the server assigns
async fn connect_anonymous(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let session_id = SessionId::generate();
    ws.on_upgrade(move |socket| handle_socket(socket, session_id, state))
}

/// Socket addressed by the id the browser keeps across page loads
async fn connect_client(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let session_id =
        SessionId::parse(&client_id).map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, session_id, state)))
}

async fn handle_socket(socket: WebSocket, id: SessionId, state: AppState) {
    let (visitor, mut outbound) = WsVisitor::new();
    let shutdown = visitor.shutdown_token();
    let (mut sink, mut stream) = socket.split();

    let connection = match state.relay.connect(id.clone(), Arc::new(visitor)).await {
        Ok(connection) => connection,
        Err(e) => {
            tracing::warn!(session_id = %id, error = %e, "Visitor connection refused");
            let frame = AgentFrame::message(e.visitor_notice()).to_json();
            let _ = sink.send(Message::Text(frame)).await;
            let _ = sink.send(Message::Close(None)).await;
            return;
        }
    };

    // Drains until the session drops its channel
    let writer_id = id.clone();
    tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            let frame = AgentFrame::message(&text).to_json();
            if let Err(e) = sink.send(Message::Text(frame)).await {
                tracing::debug!(session_id = %writer_id, error = %e, "Visitor socket write failed");
                break;
            }
        }
        let _ = sink.send(Message::Close(None)).await;
    });

    loop {
        let next = tokio::select! {
            () = shutdown.cancelled() => break,
            next = stream.next() => next,
        };

        let text = match next {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_)) | Err(_)) | None => break,
            Some(Ok(_)) => continue,
        };

        let Some(content) = VisitorFrame::content_of(&text) else {
            continue;
        };

        if let Err(e) = state.relay.on_visitor_text(&id, &content).await {
            tracing::warn!(session_id = %id, error = %e, "Dropping visitor connection");
            break;
        }
    }

    state
        .relay
        .disconnect(&id, connection, DisconnectReason::Closed)
        .await;
}

async fn get_version() -> &'static str {
    concat!("support-relay ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use crate::intake::{Phase, GREETING};
    use crate::router::Router as Relay;
    use crate::transport::testing::MockOperator;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::net::SocketAddr;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
    use tower::ServiceExt;

    fn app(pages: &FsPath, assets: &FsPath) -> Router {
        let relay = Arc::new(Relay::new(Arc::new(MockOperator::new()), None));
        create_router(AppState::new(relay, pages.to_path_buf()), assets)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn pages_are_served_from_pages_dir() {
        let pages = tempfile::tempdir().unwrap();
        let assets = tempfile::tempdir().unwrap();
        std::fs::write(pages.path().join("index.html"), "<h1>Home</h1>").unwrap();
        std::fs::write(pages.path().join("terms.html"), "<h1>Terms</h1>").unwrap();

        let (status, body) = get(app(pages.path(), assets.path()), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>Home</h1>");

        let (status, body) = get(app(pages.path(), assets.path()), "/terms").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>Terms</h1>");
    }

    #[tokio::test]
    async fn missing_page_is_404() {
        let pages = tempfile::tempdir().unwrap();
        let assets = tempfile::tempdir().unwrap();

        let (status, _) = get(app(pages.path(), assets.path()), "/about").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = get(app(pages.path(), assets.path()), "/not-a-page").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn static_assets_are_served() {
        let pages = tempfile::tempdir().unwrap();
        let assets = tempfile::tempdir().unwrap();
        std::fs::create_dir(assets.path().join("js")).unwrap();
        std::fs::write(assets.path().join("js/chat.js"), "let ws;").unwrap();

        let (status, body) = get(app(pages.path(), assets.path()), "/static/js/chat.js").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "let ws;");
    }

    #[tokio::test]
    async fn version_reports_package() {
        let pages = tempfile::tempdir().unwrap();
        let (status, body) = get(app(pages.path(), pages.path()), "/version").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("support-relay "));
    }

    #[test]
    fn bad_request_renders_json_error() {
        let response = AppError::BadRequest("invalid session id".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // ------------------------------------------------------------
    // Live sockets
    // ------------------------------------------------------------

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn serve(relay: Arc<Relay>) -> SocketAddr {
        let app = create_router(
            AppState::new(relay, PathBuf::from("pages")),
            FsPath::new("static"),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn relay(max_sessions: Option<usize>) -> (Arc<Relay>, Arc<MockOperator>) {
        let operator = Arc::new(MockOperator::new());
        let relay = Arc::new(Relay::new(operator.clone(), max_sessions));
        (relay, operator)
    }

    async fn open(addr: SocketAddr, path: &str) -> Client {
        let (ws, _) = connect_async(format!("ws://{addr}{path}")).await.unwrap();
        ws
    }

    /// Content of the next agent frame, `None` once the server closes
    async fn next_content(ws: &mut Client) -> Option<String> {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("timed out waiting for a frame");
            match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                    assert_eq!(value["type"], "message");
                    assert_eq!(value["sender"], "agent");
                    return Some(value["content"].as_str().unwrap().to_string());
                }
                Some(Ok(WsMessage::Close(_)) | Err(_)) | None => return None,
                Some(Ok(_)) => {}
            }
        }
    }

    async fn say(ws: &mut Client, raw: &str) {
        ws.send(WsMessage::Text(raw.into())).await.unwrap();
    }

    async fn wait_until<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..200 {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    fn sid(raw: &str) -> SessionId {
        SessionId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn socket_runs_intake_and_receives_replies() {
        let (relay, operator) = relay(None);
        let addr = serve(Arc::clone(&relay)).await;
        let mut ws = open(addr, "/ws/alice").await;

        assert_eq!(next_content(&mut ws).await.as_deref(), Some(GREETING));

        say(&mut ws, r#"{"content": "pricing question"}"#).await;
        assert!(next_content(&mut ws).await.unwrap().starts_with("Thank you."));
        say(&mut ws, r#"{"content": "Alice/a@x.com"}"#).await;
        assert!(next_content(&mut ws).await.unwrap().starts_with("Great!"));
        say(&mut ws, r#"{"content": "555-0100"}"#).await;
        assert!(next_content(&mut ws)
            .await
            .unwrap()
            .starts_with("Redirecting to next available agent!"));

        wait_until(|| {
            let relay = Arc::clone(&relay);
            async move { relay.is_bridged(&sid("alice")).await }
        })
        .await;
        assert_eq!(operator.summaries().len(), 1);

        relay.on_operator_text(None, "Hi Alice").await.unwrap();
        assert_eq!(next_content(&mut ws).await.as_deref(), Some("Hi Alice"));
    }

    #[tokio::test]
    async fn blank_and_malformed_frames_do_not_advance_intake() {
        let (relay, operator) = relay(None);
        let addr = serve(Arc::clone(&relay)).await;
        let mut ws = open(addr, "/ws/alice").await;
        next_content(&mut ws).await;

        say(&mut ws, r#"{"content": "   "}"#).await;
        say(&mut ws, "not json").await;
        say(&mut ws, r#"{"other": 1}"#).await;
        say(&mut ws, r#"{"content": "real question"}"#).await;

        // Only the last frame produced a prompt
        assert!(next_content(&mut ws).await.unwrap().starts_with("Thank you."));
        assert_eq!(
            relay.phase_of(&sid("alice")).await,
            Some(Phase::AwaitingContact)
        );
        let record = relay.record_of(&sid("alice")).await.unwrap();
        assert_eq!(record.inquiry.as_deref(), Some("real question"));
        assert!(operator.sent().is_empty());
    }

    #[tokio::test]
    async fn closing_socket_ends_session_and_notifies_operator() {
        let (relay, operator) = relay(None);
        let addr = serve(Arc::clone(&relay)).await;
        let mut ws = open(addr, "/ws/alice").await;
        next_content(&mut ws).await;
        for answer in ["q", "Alice", "1"] {
            say(&mut ws, &format!(r#"{{"content": "{answer}"}}"#)).await;
            next_content(&mut ws).await;
        }
        wait_until(|| {
            let relay = Arc::clone(&relay);
            async move { relay.is_bridged(&sid("alice")).await }
        })
        .await;

        ws.close(None).await.unwrap();

        wait_until(|| {
            let relay = Arc::clone(&relay);
            async move { relay.session_count().await == 0 }
        })
        .await;
        wait_until(|| {
            let operator = Arc::clone(&operator);
            async move {
                operator
                    .last()
                    .is_some_and(|m| m.text == "Client alice disconnected.")
            }
        })
        .await;
        assert_eq!(relay.focus().await, None);
    }

    #[tokio::test]
    async fn duplicate_id_gets_notice_then_close() {
        let (relay, _operator) = relay(None);
        let addr = serve(Arc::clone(&relay)).await;
        let mut first = open(addr, "/ws/alice").await;
        next_content(&mut first).await;

        let mut second = open(addr, "/ws/alice").await;
        assert_eq!(
            next_content(&mut second).await.as_deref(),
            Some(RelayError::SessionExists(sid("alice")).visitor_notice())
        );
        assert_eq!(next_content(&mut second).await, None);

        // The original connection is untouched
        assert_eq!(relay.session_count().await, 1);
        say(&mut first, r#"{"content": "still here"}"#).await;
        assert!(next_content(&mut first).await.unwrap().starts_with("Thank you."));
    }

    #[tokio::test]
    async fn full_relay_refuses_with_notice() {
        let (relay, _operator) = relay(Some(1));
        let addr = serve(Arc::clone(&relay)).await;
        let mut first = open(addr, "/ws").await;
        assert_eq!(next_content(&mut first).await.as_deref(), Some(GREETING));

        let mut second = open(addr, "/ws/bob").await;
        assert_eq!(
            next_content(&mut second).await.as_deref(),
            Some(RelayError::AtCapacity { limit: 1 }.visitor_notice())
        );
        assert_eq!(next_content(&mut second).await, None);
        assert_eq!(relay.session_count().await, 1);
    }

    #[tokio::test]
    async fn invalid_client_id_is_rejected_before_upgrade() {
        let (relay, _operator) = relay(None);
        let addr = serve(Arc::clone(&relay)).await;

        let err = connect_async(format!("ws://{addr}/ws/bad.id"))
            .await
            .unwrap_err();
        match err {
            WsError::Http(response) => assert_eq!(response.status().as_u16(), 400),
            other => panic!("expected HTTP rejection, got {other:?}"),
        }
        assert_eq!(relay.session_count().await, 0);
    }

    #[tokio::test]
    async fn eviction_closes_socket_and_id_can_reconnect() {
        let (relay, _operator) = relay(None);
        let addr = serve(Arc::clone(&relay)).await;
        let mut old = open(addr, "/ws/alice").await;
        next_content(&mut old).await;

        let evicted = relay
            .evict_idle_before(Instant::now() + Duration::from_secs(1))
            .await;
        assert_eq!(evicted, vec![sid("alice")]);
        assert_eq!(next_content(&mut old).await, None);

        let mut fresh = open(addr, "/ws/alice").await;
        assert_eq!(next_content(&mut fresh).await.as_deref(), Some(GREETING));

        // The old socket task unwinding must not end the new session
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(relay.session_count().await, 1);
        say(&mut fresh, r#"{"content": "back again"}"#).await;
        assert!(next_content(&mut fresh).await.unwrap().starts_with("Thank you."));
    }
}
