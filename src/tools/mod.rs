pub mod applique;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::protocol::CallToolResult;

/// Structural description of a tool's input object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl ToolInputSchema {
    /// Schema for an object whose fields are all required strings.
    pub fn string_object(fields: &[(&str, &str)]) -> Self {
        let mut properties = HashMap::new();
        for (name, description) in fields {
            properties.insert(
                name.to_string(),
                serde_json::json!({"type": "string", "description": description}),
            );
        }
        Self {
            type_: "object".to_string(),
            properties: Some(properties),
            required: Some(fields.iter().map(|(name, _)| name.to_string()).collect()),
        }
    }

    /// Validate an inbound arguments object against this schema.
    ///
    /// Checks that every required field is present and that declared
    /// primitive types match. Returns the first violation found.
    pub fn validate(&self, args: &HashMap<String, Value>) -> Result<(), String> {
        if let Some(required) = &self.required {
            for field in required {
                if !args.contains_key(field) {
                    return Err(format!("missing required field '{}'", field));
                }
            }
        }

        if let Some(properties) = &self.properties {
            for (field, value) in args {
                let Some(declared) = properties.get(field) else {
                    continue;
                };
                let Some(expected) = declared.get("type").and_then(Value::as_str) else {
                    continue;
                };
                let matches = match expected {
                    "string" => value.is_string(),
                    "number" => value.is_number(),
                    "integer" => value.is_i64() || value.is_u64(),
                    "boolean" => value.is_boolean(),
                    "object" => value.is_object(),
                    "array" => value.is_array(),
                    _ => true,
                };
                if !matches {
                    return Err(format!("field '{}' must be of type {}", field, expected));
                }
            }
        }

        Ok(())
    }
}

/// Async handler behind one registered tool.
///
/// Handlers convert their own backend failures into error-text envelopes; an
/// `Err` escaping here is a bug and is caught by the dispatch layer so it can
/// never reach the transport.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: HashMap<String, Value>) -> Result<CallToolResult>;
}

/// Registered metadata for one callable tool.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
    pub handler: Arc<dyn ToolHandler>,
}

/// Listing entry served to tools/list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
}

/// Maps tool names to descriptors.
///
/// Built once at process start and read-only afterwards; registering the same
/// name twice overwrites the prior descriptor (last registration wins).
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ToolDescriptor) {
        self.tools.insert(descriptor.name.clone(), descriptor);
    }

    pub fn resolve(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    pub fn list(&self) -> Vec<ToolInfo> {
        let mut infos: Vec<ToolInfo> = self
            .tools
            .values()
            .map(|d| ToolInfo {
                name: d.name.clone(),
                description: d.description.clone(),
                input_schema: d.input_schema.clone(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }
}
