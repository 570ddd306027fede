//! Long-lived client sessions to the external tool providers.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_mcp::client::{Client, ClientBuilder};
use async_mcp::protocol::RequestOptions;
use async_mcp::transport::{
    ClientInMemoryTransport, ClientSseTransport, ClientStdioTransport, ServerInMemoryTransport,
    Transport,
};
use async_mcp::types::{CallToolRequest, CallToolResponse, ToolResponseContent, ToolsListResponse};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use crate::types::{ProviderConfig, ToolCall, ToolDescriptor, TransportType};
use crate::AgentError;

/// One external service exposing named, schema-described operations.
///
/// `ToolSession` is the process-boundary implementation; tests substitute
/// in-process fakes.
#[async_trait::async_trait]
pub trait ToolProvider: Send + Sync {
    fn provider_name(&self) -> &str;

    /// The tools the provider advertises; stable for the session's lifetime.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, AgentError>;

    /// Invoke one tool and return its structured result.
    async fn call_tool(&self, call: &ToolCall) -> Result<Value, AgentError>;

    /// Release the underlying connection. Idempotent; never raises.
    async fn close(&self);
}

enum SessionClient {
    Stdio(Client<ClientStdioTransport>),
    Sse(Client<ClientSseTransport>),
    InMemory(Client<ClientInMemoryTransport>),
}

macro_rules! with_client {
    ($session:expr, $client:ident => $body:expr) => {
        match &$session.client {
            SessionClient::Stdio($client) => $body,
            SessionClient::Sse($client) => $body,
            SessionClient::InMemory($client) => $body,
        }
    };
}

/// A live session to one tool provider process.
pub struct ToolSession {
    name: String,
    client: SessionClient,
    listen_handle: Mutex<Option<JoinHandle<()>>>,
    list_timeout: Duration,
    call_timeout: Duration,
}

impl ToolSession {
    /// Spawn/handshake the provider described by `config` and start the
    /// client's message loop.
    pub async fn connect(
        config: &ProviderConfig,
        list_timeout: Duration,
        call_timeout: Duration,
    ) -> Result<Self, AgentError> {
        let client = match &config.transport {
            TransportType::Stdio {
                command,
                args,
                env_vars,
            } => {
                let transport = ClientStdioTransport::new(
                    command.as_str(),
                    args.iter().map(|s| s.as_str()).collect::<Vec<_>>().as_ref(),
                    env_vars.clone(),
                )
                .map_err(|e| connection_error(&config.name, e))?;
                transport
                    .open()
                    .await
                    .map_err(|e| connection_error(&config.name, e))?;
                SessionClient::Stdio(ClientBuilder::new(transport).build())
            }
            TransportType::SSE {
                server_url,
                headers,
            } => {
                let mut builder = ClientSseTransport::builder(server_url.clone());
                if let Some(headers) = headers {
                    for (key, value) in headers.iter() {
                        builder = builder.with_header(key, value);
                    }
                }
                let transport = builder.build();
                transport
                    .open()
                    .await
                    .map_err(|e| connection_error(&config.name, e))?;
                SessionClient::Sse(ClientBuilder::new(transport).build())
            }
        };

        Ok(Self::started(
            config.name.clone(),
            client,
            list_timeout,
            call_timeout,
        ))
    }

    /// Session over an in-memory transport, with `server_task` spawning the
    /// provider end. Used by tests.
    pub async fn in_memory<F>(
        name: impl Into<String>,
        server_task: F,
        list_timeout: Duration,
        call_timeout: Duration,
    ) -> Result<Self, AgentError>
    where
        F: Fn(ServerInMemoryTransport) -> JoinHandle<()> + Send + Sync + 'static,
    {
        let name = name.into();
        let transport = ClientInMemoryTransport::new(server_task);
        transport
            .open()
            .await
            .map_err(|e| connection_error(&name, e))?;
        let client = SessionClient::InMemory(ClientBuilder::new(transport).build());
        Ok(Self::started(name, client, list_timeout, call_timeout))
    }

    fn started(
        name: String,
        client: SessionClient,
        list_timeout: Duration,
        call_timeout: Duration,
    ) -> Self {
        let listen_handle = match &client {
            SessionClient::Stdio(c) => spawn_listener(c.clone()),
            SessionClient::Sse(c) => spawn_listener(c.clone()),
            SessionClient::InMemory(c) => spawn_listener(c.clone()),
        };
        Self {
            name,
            client,
            listen_handle: Mutex::new(Some(listen_handle)),
            list_timeout,
            call_timeout,
        }
    }
}

fn spawn_listener<T: Transport + Clone + Send + Sync + 'static>(client: Client<T>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = client.start().await {
            tracing::debug!("tool session message loop ended: {e}");
        }
    })
}

fn connection_error(provider: &str, e: impl std::fmt::Display) -> AgentError {
    AgentError::Connection(format!("provider '{provider}': {e}"))
}

#[async_trait::async_trait]
impl ToolProvider for ToolSession {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, AgentError> {
        let response = with_client!(self, client => {
            client
                .request(
                    "tools/list",
                    Some(json!({})),
                    RequestOptions::default().timeout(self.list_timeout),
                )
                .await
        })
        .map_err(|e| connection_error(&self.name, e))?;

        let response: ToolsListResponse = serde_json::from_value(response)?;
        tracing::debug!(
            "provider '{}' advertises {} tools",
            self.name,
            response.tools.len()
        );
        Ok(response.tools.into_iter().map(ToolDescriptor::from).collect())
    }

    async fn call_tool(&self, call: &ToolCall) -> Result<Value, AgentError> {
        let args: HashMap<String, Value> =
            serde_json::from_value(call.input.clone()).map_err(|e| {
                AgentError::ToolInvocation(format!(
                    "tool '{}': arguments are not a JSON object: {e}",
                    call.tool_name
                ))
            })?;

        let request = CallToolRequest {
            name: call.tool_name.clone(),
            arguments: Some(args),
            meta: None,
        };
        let params = serde_json::to_value(request)?;

        tracing::debug!(
            "calling tool '{}' on provider '{}' (call id {})",
            call.tool_name,
            self.name,
            call.tool_call_id
        );
        let response = with_client!(self, client => {
            client
                .request(
                    "tools/call",
                    Some(params),
                    RequestOptions::default().timeout(self.call_timeout),
                )
                .await
        })
        .map_err(|e| {
            AgentError::ToolInvocation(format!("tool '{}': {e}", call.tool_name))
        })?;

        let response: CallToolResponse = serde_json::from_value(response)?;

        if response.is_error == Some(true) {
            let error_text = response
                .content
                .first()
                .and_then(|c| match c {
                    ToolResponseContent::Text { text } => Some(text.clone()),
                    _ => None,
                })
                .unwrap_or_else(|| "unknown provider error".to_string());
            return Err(AgentError::ToolInvocation(format!(
                "tool '{}': {error_text}",
                call.tool_name
            )));
        }

        response
            .content
            .first()
            .and_then(|c| match c {
                ToolResponseContent::Text { text } => Some(Value::String(text.clone())),
                _ => None,
            })
            .ok_or_else(|| {
                AgentError::ToolInvocation(format!(
                    "tool '{}': no text content in response",
                    call.tool_name
                ))
            })
    }

    async fn close(&self) {
        if let Ok(mut handle) = self.listen_handle.lock() {
            if let Some(handle) = handle.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for ToolSession {
    fn drop(&mut self) {
        if let Ok(mut handle) = self.listen_handle.lock() {
            if let Some(handle) = handle.take() {
                handle.abort();
            }
        }
    }
}
