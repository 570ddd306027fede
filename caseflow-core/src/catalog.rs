//! Merged tool schema and name-based routing across provider sessions.

use std::collections::HashMap;
use std::sync::Arc;

use async_openai::types::chat::ChatCompletionTools;

use crate::session::ToolProvider;
use crate::types::{ToolDefinition, ToolDescriptor};
use crate::AgentError;

/// The union of every tool the worker's sessions advertise, rendered for the
/// LLM's function-calling interface, plus a routing table resolving each tool
/// name to its owning session.
pub struct ToolCatalog {
    tools: Vec<ChatCompletionTools>,
    routes: HashMap<String, Arc<dyn ToolProvider>>,
}

impl ToolCatalog {
    /// Discover each session's tools and build the routing table. Two
    /// providers advertising the same tool name would make dispatch
    /// ambiguous; that is a configuration error, not retried.
    pub async fn merge(sessions: &[Arc<dyn ToolProvider>]) -> Result<Self, AgentError> {
        let mut tools = Vec::new();
        let mut routes: HashMap<String, Arc<dyn ToolProvider>> = HashMap::new();

        for session in sessions {
            let descriptors = session.list_tools().await?;
            tracing::debug!(
                "merging {} tools from provider '{}'",
                descriptors.len(),
                session.provider_name()
            );
            for descriptor in descriptors {
                if routes.contains_key(&descriptor.name) {
                    return Err(AgentError::SchemaAmbiguity(descriptor.name));
                }
                tools.push(render(&descriptor));
                routes.insert(descriptor.name, session.clone());
            }
        }

        tracing::debug!("tool catalog holds {} tool definitions", tools.len());
        Ok(Self { tools, routes })
    }

    /// The owning session for `name`; fails closed on unknown names.
    pub fn route(&self, name: &str) -> Result<&Arc<dyn ToolProvider>, AgentError> {
        self.routes
            .get(name)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))
    }

    pub fn tools(&self) -> &[ChatCompletionTools] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn render(descriptor: &ToolDescriptor) -> ChatCompletionTools {
    ToolDefinition::from(descriptor).into()
}
