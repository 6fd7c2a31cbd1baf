// HTTP surface: the stream-open and message-post endpoints.
use axum::{
    body::Body,
    extract::State,
    http::{Response, StatusCode},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use futures::StreamExt;
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::config::BridgeConfig;
use crate::engine::McpEngine;
use crate::session::{Session, SessionRegistry};

/// Shared state behind the router.
pub struct AppState {
    pub engine: Arc<McpEngine>,
    pub sessions: Arc<SessionRegistry>,
    pub config: BridgeConfig,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/sse", get(open_stream))
        .route("/messages", post(post_message).options(preflight))
        .with_state(state)
}

/// Open the long-lived stream: create a session, bind it as the current one
/// and hand the connection a streaming `text/event-stream` body.
///
/// The first event is the MCP `endpoint` event telling the client where to
/// post command messages. The response body stays open for the life of the
/// connection; a newer stream supersedes this one without closing it.
async fn open_stream(State(state): State<Arc<AppState>>) -> Response<Body> {
    let (session, rx) = Session::channel();
    let session = Arc::new(session);

    // First event on a fresh channel, so the send cannot block.
    let endpoint = format!("/messages?sessionId={}", session.id());
    let _ = session.send_event("endpoint", &endpoint).await;

    state.sessions.replace(Arc::clone(&session)).await;
    info!(session_id = %session.id(), "stream opened");

    let stream = ReceiverStream::new(rx).map(|frame| Ok::<_, Infallible>(Bytes::from(frame)));

    response_with_cors(&state.config)
        .status(StatusCode::OK)
        .header("Content-Type", "text/event-stream")
        .header("Cache-Control", "no-cache")
        .header("Connection", "keep-alive")
        .body(Body::wrap_stream(stream))
        .expect("static response headers are valid")
}

/// Accept one command message and route it to the current session.
///
/// Results are written to the session's stream, never to this response. With
/// no stream open the message is silently dropped; the client still gets an
/// empty 202 either way.
async fn post_message(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Response<Body> {
    match state.sessions.current().await {
        Some(session) => state.engine.handle_message(&session, body).await,
        None => debug!("command message received with no open stream, dropping"),
    }

    response_with_cors(&state.config)
        .status(StatusCode::ACCEPTED)
        .body(Body::empty())
        .expect("static response headers are valid")
}

async fn preflight(State(state): State<Arc<AppState>>) -> Response<Body> {
    response_with_cors(&state.config)
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type")
        .body(Body::empty())
        .expect("static response headers are valid")
}

fn response_with_cors(config: &BridgeConfig) -> axum::http::response::Builder {
    Response::builder()
        .header("Access-Control-Allow-Origin", config.allowed_origin.as_str())
        .header("Access-Control-Allow-Credentials", "true")
}
