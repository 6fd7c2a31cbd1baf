// MCP protocol engine: routes command messages and dispatches tool calls.
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::BridgeError;
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeResult, JsonRpcRequest, JsonRpcResponse, RequestId,
    ServerCapabilities, ServerInfo, INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR,
    PROTOCOL_VERSION,
};
use crate::session::Session;
use crate::tools::ToolRegistry;

/// Drives the MCP exchange over whichever session is bound to it per call.
///
/// The engine owns the tool registry and the server identity; it holds no
/// per-connection state, so replacing the session does not touch it.
#[derive(Clone)]
pub struct McpEngine {
    registry: Arc<ToolRegistry>,
    server_name: String,
    server_version: String,
}

impl McpEngine {
    pub fn new(
        registry: Arc<ToolRegistry>,
        server_name: impl Into<String>,
        server_version: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            server_name: server_name.into(),
            server_version: server_version.into(),
        }
    }

    /// Handle one inbound command message, writing any response onto the
    /// session's stream.
    ///
    /// Tool calls are spawned as independent tasks, so completion order may
    /// differ from arrival order; responses are correlated by request id.
    /// Send failures are ignored: a dead stream is superseded, not repaired.
    pub async fn handle_message(&self, session: &Arc<Session>, raw: Value) {
        let request: JsonRpcRequest = match serde_json::from_value(raw) {
            Ok(request) => request,
            Err(e) => {
                warn!("discarding unparsable command message: {e}");
                let response =
                    JsonRpcResponse::error(None, PARSE_ERROR, format!("parse error: {e}"));
                let _ = session.send_message(&response).await;
                return;
            }
        };

        let Some(id) = request.id else {
            // Notifications expect no reply.
            debug!(method = %request.method, "notification received");
            return;
        };

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::result(id, self.initialize_result()),
            "ping" => JsonRpcResponse::result(id, json!({})),
            "tools/list" => JsonRpcResponse::result(id, json!({ "tools": self.registry.list() })),
            "tools/call" => {
                let engine = self.clone();
                let session = Arc::clone(session);
                tokio::spawn(async move {
                    let response = engine.dispatch_call(id, request.params).await;
                    let _ = session.send_message(&response).await;
                });
                return;
            }
            method => {
                debug!(%method, "unknown method");
                JsonRpcResponse::error(
                    Some(id),
                    METHOD_NOT_FOUND,
                    format!("Method not found: {method}"),
                )
            }
        };

        let _ = session.send_message(&response).await;
    }

    fn initialize_result(&self) -> Value {
        json!(InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities::default(),
            server_info: ServerInfo {
                name: self.server_name.clone(),
                version: self.server_version.clone(),
            },
        })
    }

    async fn dispatch_call(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        match self.call_tool(params).await {
            Ok(envelope) => match serde_json::to_value(&envelope) {
                Ok(result) => JsonRpcResponse::result(id, result),
                Err(e) => JsonRpcResponse::error(
                    Some(id),
                    INVALID_PARAMS,
                    format!("failed to serialize tool result: {e}"),
                ),
            },
            Err(e) => JsonRpcResponse::error(Some(id), INVALID_PARAMS, e.to_string()),
        }
    }

    /// Resolve, validate and invoke a tool.
    ///
    /// Validation failures short-circuit before the handler runs. A handler
    /// that returns `Err` is substituted with an error-text envelope here, so
    /// no failure can escape to the transport layer.
    async fn call_tool(&self, params: Option<Value>) -> Result<CallToolResult, BridgeError> {
        let params: CallToolParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|e| BridgeError::MalformedRequest(e.to_string()))?;

        let descriptor = self
            .registry
            .resolve(&params.name)
            .ok_or_else(|| BridgeError::ToolNotFound(params.name.clone()))?;

        let args: HashMap<String, Value> = match params.arguments {
            Some(Value::Object(map)) => map.into_iter().collect(),
            Some(other) => {
                return Err(BridgeError::InvalidArguments(format!(
                    "arguments must be an object, got {other}"
                )))
            }
            None => HashMap::new(),
        };

        descriptor
            .input_schema
            .validate(&args)
            .map_err(BridgeError::InvalidArguments)?;

        let envelope = descriptor.handler.call(args).await.unwrap_or_else(|e| {
            warn!(tool = %params.name, "handler failed: {e:#}");
            CallToolResult::text(format!("Tool '{}' failed: {e}", params.name))
        });
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolDescriptor, ToolHandler, ToolInputSchema};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    struct StaticHandler {
        text: &'static str,
        delay: Duration,
        invoked: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ToolHandler for StaticHandler {
        async fn call(&self, _args: HashMap<String, Value>) -> anyhow::Result<CallToolResult> {
            self.invoked.store(true, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(CallToolResult::text(self.text))
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl ToolHandler for FailingHandler {
        async fn call(&self, _args: HashMap<String, Value>) -> anyhow::Result<CallToolResult> {
            Err(anyhow!("backend exploded"))
        }
    }

    fn descriptor(name: &str, handler: Arc<dyn ToolHandler>) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            description: "test tool".to_string(),
            input_schema: ToolInputSchema::string_object(&[("query", "q")]),
            handler,
        }
    }

    fn engine_with(descriptors: Vec<ToolDescriptor>) -> Arc<McpEngine> {
        let mut registry = ToolRegistry::new();
        for d in descriptors {
            registry.register(d);
        }
        Arc::new(McpEngine::new(Arc::new(registry), "test-bridge", "0.0.0"))
    }

    async fn next_response(rx: &mut mpsc::Receiver<String>) -> Value {
        let frame = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for response")
            .expect("stream closed");
        let data = frame
            .strip_prefix("event: message\ndata: ")
            .expect("not a message event")
            .trim_end();
        serde_json::from_str(data).expect("response is not JSON")
    }

    fn call_request(id: i64, name: &str, arguments: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": {"name": name, "arguments": arguments}
        })
    }

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let engine = engine_with(vec![]);
        let (session, mut rx) = Session::channel();
        let session = Arc::new(session);

        let request = json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}});
        engine.handle_message(&session, request).await;

        let response = next_response(&mut rx).await;
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["serverInfo"]["name"], "test-bridge");
        assert_eq!(response["result"]["protocolVersion"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn tools_list_enumerates_registered_tools() {
        let invoked = Arc::new(AtomicBool::new(false));
        let engine = engine_with(vec![descriptor(
            "lookup",
            Arc::new(StaticHandler {
                text: "hit",
                delay: Duration::ZERO,
                invoked,
            }),
        )]);
        let (session, mut rx) = Session::channel();
        let session = Arc::new(session);

        engine
            .handle_message(
                &session,
                json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
            )
            .await;

        let response = next_response(&mut rx).await;
        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "lookup");
        assert_eq!(tools[0]["inputSchema"]["type"], "object");
    }

    #[tokio::test]
    async fn unknown_method_yields_method_not_found() {
        let engine = engine_with(vec![]);
        let (session, mut rx) = Session::channel();
        let session = Arc::new(session);

        engine
            .handle_message(
                &session,
                json!({"jsonrpc": "2.0", "id": 3, "method": "resources/list"}),
            )
            .await;

        let response = next_response(&mut rx).await;
        assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn notifications_produce_no_response() {
        let engine = engine_with(vec![]);
        let (session, mut rx) = Session::channel();
        let session = Arc::new(session);

        engine
            .handle_message(
                &session,
                json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            )
            .await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unparsable_message_yields_parse_error() {
        let engine = engine_with(vec![]);
        let (session, mut rx) = Session::channel();
        let session = Arc::new(session);

        engine.handle_message(&session, json!(["not", "a", "request"])).await;

        let response = next_response(&mut rx).await;
        assert_eq!(response["error"]["code"], PARSE_ERROR);
        assert_eq!(response["id"], Value::Null);
    }

    #[tokio::test]
    async fn call_returns_envelope_with_content() {
        let invoked = Arc::new(AtomicBool::new(false));
        let engine = engine_with(vec![descriptor(
            "lookup",
            Arc::new(StaticHandler {
                text: "hit",
                delay: Duration::ZERO,
                invoked,
            }),
        )]);
        let (session, mut rx) = Session::channel();
        let session = Arc::new(session);

        engine
            .handle_message(&session, call_request(4, "lookup", json!({"query": "x"})))
            .await;

        let response = next_response(&mut rx).await;
        assert_eq!(response["id"], 4);
        let content = response["result"]["content"].as_array().unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0]["text"], "hit");
    }

    #[tokio::test]
    async fn unknown_tool_yields_invalid_params() {
        let engine = engine_with(vec![]);
        let (session, mut rx) = Session::channel();
        let session = Arc::new(session);

        engine
            .handle_message(&session, call_request(5, "nope", json!({"query": "x"})))
            .await;

        let response = next_response(&mut rx).await;
        assert_eq!(response["error"]["code"], INVALID_PARAMS);
        assert!(response["error"]["message"]
            .as_str()
            .unwrap()
            .contains("nope"));
    }

    #[tokio::test]
    async fn validation_failure_short_circuits_before_handler() {
        let invoked = Arc::new(AtomicBool::new(false));
        let engine = engine_with(vec![descriptor(
            "lookup",
            Arc::new(StaticHandler {
                text: "hit",
                delay: Duration::ZERO,
                invoked: invoked.clone(),
            }),
        )]);
        let (session, mut rx) = Session::channel();
        let session = Arc::new(session);

        engine
            .handle_message(&session, call_request(6, "lookup", json!({"query": 42})))
            .await;

        let response = next_response(&mut rx).await;
        assert_eq!(response["error"]["code"], INVALID_PARAMS);
        assert!(!invoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failing_handler_is_substituted_with_error_text_envelope() {
        let engine = engine_with(vec![ToolDescriptor {
            name: "fragile".to_string(),
            description: "always fails".to_string(),
            input_schema: ToolInputSchema::string_object(&[]),
            handler: Arc::new(FailingHandler),
        }]);
        let (session, mut rx) = Session::channel();
        let session = Arc::new(session);

        engine
            .handle_message(&session, call_request(7, "fragile", json!({})))
            .await;

        let response = next_response(&mut rx).await;
        assert!(response.get("error").is_none());
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("backend exploded"));
    }

    #[tokio::test]
    async fn fast_call_completes_before_earlier_slow_call() {
        let engine = engine_with(vec![
            descriptor(
                "slow",
                Arc::new(StaticHandler {
                    text: "slow-done",
                    delay: Duration::from_millis(300),
                    invoked: Arc::new(AtomicBool::new(false)),
                }),
            ),
            descriptor(
                "fast",
                Arc::new(StaticHandler {
                    text: "fast-done",
                    delay: Duration::ZERO,
                    invoked: Arc::new(AtomicBool::new(false)),
                }),
            ),
        ]);
        let (session, mut rx) = Session::channel();
        let session = Arc::new(session);

        engine
            .handle_message(&session, call_request(10, "slow", json!({"query": "a"})))
            .await;
        engine
            .handle_message(&session, call_request(11, "fast", json!({"query": "b"})))
            .await;

        let first = next_response(&mut rx).await;
        let second = next_response(&mut rx).await;
        assert_eq!(first["id"], 11);
        assert_eq!(second["id"], 10);
    }
}
