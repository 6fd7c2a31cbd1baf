// The two applique RAG tools exposed over the bridge.
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::{BackendClient, BackendOperation};
use crate::protocol::CallToolResult;
use crate::tools::{ToolDescriptor, ToolHandler, ToolInputSchema, ToolRegistry};

/// Bound on the image description call; the vision pipeline is slow.
const DESCRIBE_IMAGE_TIMEOUT: Duration = Duration::from_secs(180);

/// Proxies a semantic query to the backend's /query endpoint.
pub struct QueryTool {
    backend: Arc<BackendClient>,
}

impl QueryTool {
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ToolHandler for QueryTool {
    async fn call(&self, args: HashMap<String, Value>) -> Result<CallToolResult> {
        let query = args.get("query").and_then(Value::as_str).unwrap_or_default();

        match self
            .backend
            .call(BackendOperation::Query, &json!({ "query": query }), None)
            .await
        {
            Ok(data) => Ok(CallToolResult::text(serde_json::to_string(&data)?)),
            Err(e) => {
                warn!("semantic query failed: {e:#}");
                Ok(CallToolResult::text("Error occurred while fetching data."))
            }
        }
    }
}

/// Proxies an image description request to the backend's /describe-image
/// endpoint, bounded by [`DESCRIBE_IMAGE_TIMEOUT`].
pub struct DescribeImageTool {
    backend: Arc<BackendClient>,
    timeout: Duration,
}

impl DescribeImageTool {
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self {
            backend,
            timeout: DESCRIBE_IMAGE_TIMEOUT,
        }
    }
}

#[async_trait]
impl ToolHandler for DescribeImageTool {
    async fn call(&self, args: HashMap<String, Value>) -> Result<CallToolResult> {
        let image_url = args
            .get("base64ImageUrl")
            .and_then(Value::as_str)
            .unwrap_or_default();
        debug!(bytes = image_url.len(), "forwarding image for description");

        match self
            .backend
            .call(
                BackendOperation::DescribeImage,
                &json!({ "image_url": image_url }),
                Some(self.timeout),
            )
            .await
        {
            Ok(data) => {
                // The backend reports its own failures via a success flag;
                // surface the raw payload so the caller sees the detail.
                let text = if data.get("success").and_then(Value::as_bool) == Some(true) {
                    data.get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                } else {
                    serde_json::to_string(&data)?
                };
                Ok(CallToolResult::text(text))
            }
            Err(e) => {
                warn!("image description failed: {e:#}");
                Ok(CallToolResult::text(format!(
                    "Error getting image description: {e}"
                )))
            }
        }
    }
}

/// Build the registry with the bridge's tool set.
pub fn build_registry(backend: Arc<BackendClient>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(ToolDescriptor {
        name: "getAppliqueComponentDetails".to_string(),
        description: "Look up applique component details with a semantic query.".to_string(),
        input_schema: ToolInputSchema::string_object(&[(
            "query",
            "Natural-language query over the applique component index",
        )]),
        handler: Arc::new(QueryTool::new(backend.clone())),
    });

    registry.register(ToolDescriptor {
        name: "getDescriptionOfTheImage".to_string(),
        description: "Describe an image supplied as a base64 data URL.".to_string(),
        input_schema: ToolInputSchema::string_object(&[(
            "base64ImageUrl",
            "Image to describe, as a base64 data URL",
        )]),
        handler: Arc::new(DescribeImageTool::new(backend)),
    });

    registry
}
