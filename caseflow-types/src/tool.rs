use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A tool advertised by a provider session, as discovered via `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

impl From<async_mcp::types::Tool> for ToolDescriptor {
    fn from(tool: async_mcp::types::Tool) -> Self {
        Self {
            name: tool.name,
            description: tool.description,
            input_schema: tool.input_schema,
        }
    }
}

/// A tool-call directive extracted from an LLM response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub tool_call_id: String,
    pub tool_name: String,
    pub input: Value,
}

/// The function-calling shape handed to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<&ToolDescriptor> for ToolDefinition {
    /// Carry `type`/`properties`/`required` through verbatim; a provider that
    /// advertises no schema gets an empty object with nothing required.
    fn from(descriptor: &ToolDescriptor) -> Self {
        let schema = descriptor.input_schema.as_object();
        let parameters = json!({
            "type": schema
                .and_then(|s| s.get("type").cloned())
                .unwrap_or_else(|| Value::String("object".to_string())),
            "properties": schema
                .and_then(|s| s.get("properties").cloned())
                .unwrap_or_else(|| json!({})),
            "required": schema
                .and_then(|s| s.get("required").cloned())
                .unwrap_or_else(|| json!([])),
        });
        Self {
            name: descriptor.name.clone(),
            description: descriptor.description.clone().unwrap_or_default(),
            parameters,
        }
    }
}

impl From<ToolDefinition> for async_openai::types::chat::ChatCompletionTools {
    fn from(definition: ToolDefinition) -> Self {
        async_openai::types::chat::ChatCompletionTools::Function(
            async_openai::types::chat::ChatCompletionTool {
                function: async_openai::types::chat::FunctionObject {
                    name: definition.name,
                    description: Some(definition.description),
                    parameters: Some(definition.parameters),
                    strict: None,
                },
            },
        )
    }
}
