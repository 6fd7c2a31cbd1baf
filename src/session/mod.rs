// Session: one open SSE connection and its outbound event sink.
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Frames queued per session before the stream applies backpressure.
const SESSION_CHANNEL_CAPACITY: usize = 64;

/// One open streaming connection.
///
/// Owns the outbound sink; every protocol response for this connection is
/// written here as a pre-framed SSE event. The session does not detect
/// closure: once the receiving stream is dropped, sends fail and the caller
/// ignores the failure.
pub struct Session {
    id: String,
    tx: mpsc::Sender<String>,
}

impl Session {
    /// Create a session and the receiver feeding the streaming response body.
    pub fn channel() -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        (
            Self {
                id: Uuid::new_v4().to_string(),
                tx,
            },
            rx,
        )
    }

    /// Opaque identifier of the reply channel, advertised in the endpoint
    /// event.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Write one SSE event onto the stream.
    pub async fn send_event(&self, event: &str, data: &str) -> Result<()> {
        let frame = format!("event: {}\ndata: {}\n\n", event, data);
        self.tx
            .send(frame)
            .await
            .map_err(|_| anyhow!("session stream closed"))
    }

    /// Write a protocol message as an SSE `message` event.
    pub async fn send_message<T: Serialize>(&self, message: &T) -> Result<()> {
        let data = serde_json::to_string(message)?;
        self.send_event("message", &data).await
    }
}

/// Single-slot holder for the current session.
///
/// Opening a new stream silently replaces the prior reference without closing
/// it; the old stream is only discovered dead when a send fails, and send
/// failures are ignored. Single-tenancy is by construction, not an oversight.
#[derive(Default)]
pub struct SessionRegistry {
    current: RwLock<Option<Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new current session, dropping the previous reference.
    pub async fn replace(&self, session: Arc<Session>) {
        *self.current.write().await = Some(session);
    }

    /// The session messages are currently routed to, if any stream is open.
    pub async fn current(&self) -> Option<Arc<Session>> {
        self.current.read().await.clone()
    }
}
