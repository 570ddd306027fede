//! Chat-completion glue between the agent loop and the model endpoint.

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionMessageToolCall, ChatCompletionMessageToolCalls,
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestToolMessage, ChatCompletionRequestToolMessageContent,
    ChatCompletionRequestUserMessageArgs, ChatCompletionTools, CreateChatCompletionRequest,
    FunctionCall,
};
use async_openai::Client;

use crate::types::{Settings, ToolCall};
use crate::AgentError;

/// One model turn: free text plus any tool-call directives.
#[derive(Debug, Clone)]
pub struct LlmTurn {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatCompletionRequestMessage],
        tools: &[ChatCompletionTools],
    ) -> Result<LlmTurn, AgentError>;
}

/// Client for any OpenAI-compatible chat endpoint.
pub struct ChatClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl ChatClient {
    pub fn new(settings: &Settings) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(settings.api_key.clone());
        if let Some(base_url) = &settings.base_url {
            config = config.with_api_base(base_url.clone());
        }
        Self {
            client: Client::with_config(config),
            model: settings.model.clone(),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for ChatClient {
    async fn complete(
        &self,
        messages: &[ChatCompletionRequestMessage],
        tools: &[ChatCompletionTools],
    ) -> Result<LlmTurn, AgentError> {
        let request = CreateChatCompletionRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            tools: if tools.is_empty() {
                None
            } else {
                Some(tools.to_vec())
            },
            ..Default::default()
        };

        tracing::debug!(
            "chat completion request: model={}, messages={}, tools={}",
            self.model,
            request.messages.len(),
            tools.len()
        );
        let response = self.client.chat().create(request).await.map_err(|e| {
            tracing::error!("LLM request failed: {e}");
            AgentError::LLMError(e.to_string())
        })?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| AgentError::LLMError("response carried no choices".to_string()))?;

        let content = choice.message.content.clone().unwrap_or_default();
        let mut tool_calls = choice
            .message
            .tool_calls
            .as_ref()
            .map(|calls| calls.iter().map(map_tool_call).collect::<Vec<_>>())
            .unwrap_or_default();
        ensure_tool_call_ids(&mut tool_calls);

        Ok(LlmTurn {
            content,
            tool_calls,
        })
    }
}

fn map_tool_call(tool_call: &ChatCompletionMessageToolCalls) -> ToolCall {
    let (tool_call_id, tool_name, input) = match tool_call {
        ChatCompletionMessageToolCalls::Function(tool_call) => (
            tool_call.id.clone(),
            tool_call.function.name.clone(),
            tool_call.function.arguments.clone(),
        ),
        ChatCompletionMessageToolCalls::Custom(tool_call) => (
            tool_call.id.clone(),
            tool_call.custom_tool.name.clone(),
            tool_call.custom_tool.input.clone(),
        ),
    };

    // Providers send arguments as a JSON-encoded string; keep the raw text
    // if it does not parse.
    let parsed_args =
        serde_json::from_str(&input).unwrap_or_else(|_| serde_json::Value::String(input));

    ToolCall {
        tool_call_id,
        tool_name,
        input: parsed_args,
    }
}

fn ensure_tool_call_ids(tool_calls: &mut [ToolCall]) {
    for tc in tool_calls.iter_mut() {
        if tc.tool_call_id.is_empty() {
            tracing::warn!("tool_call_id empty; generating fallback uuid");
            tc.tool_call_id = uuid::Uuid::new_v4().to_string();
        }
    }
}

pub fn user_message(text: &str) -> Result<ChatCompletionRequestMessage, AgentError> {
    Ok(ChatCompletionRequestMessage::User(
        ChatCompletionRequestUserMessageArgs::default()
            .content(text.to_string())
            .build()?,
    ))
}

pub fn assistant_message(turn: &LlmTurn) -> Result<ChatCompletionRequestMessage, AgentError> {
    let mut args = ChatCompletionRequestAssistantMessageArgs::default();
    if !turn.content.is_empty() {
        args.content(turn.content.clone());
    }
    if !turn.tool_calls.is_empty() {
        let tool_calls: Vec<ChatCompletionMessageToolCalls> = turn
            .tool_calls
            .iter()
            .map(|tc| {
                ChatCompletionMessageToolCalls::Function(ChatCompletionMessageToolCall {
                    id: tc.tool_call_id.clone(),
                    function: FunctionCall {
                        name: tc.tool_name.clone(),
                        arguments: serde_json::to_string(&tc.input).unwrap_or_default(),
                    },
                })
            })
            .collect();
        args.tool_calls(tool_calls);
    }
    Ok(ChatCompletionRequestMessage::Assistant(args.build()?))
}

/// The result message paired with one tool call, tagged by the call's id.
pub fn tool_message(tool_call_id: &str, content: String) -> ChatCompletionRequestMessage {
    ChatCompletionRequestMessage::Tool(ChatCompletionRequestToolMessage {
        content: ChatCompletionRequestToolMessageContent::Text(content),
        tool_call_id: tool_call_id.to_string(),
    })
}
