#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Connection to tool provider failed: {0}")]
    Connection(String),
    #[error("Tool invocation failed: {0}")]
    ToolInvocation(String),
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Tool '{0}' advertised by more than one provider")]
    SchemaAmbiguity(String),
    #[error("Tool round-trip limit of {0} reached without a final answer")]
    LoopExceeded(usize),
    #[error("Run deadline of {0:?} exceeded")]
    DeadlineExceeded(std::time::Duration),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Test case not found: {0}")]
    CaseNotFound(i64),
    #[error("Queue is full (capacity {0})")]
    QueueFull(usize),
    #[error("LLM error: {0}")]
    LLMError(String),
    #[error("{0}")]
    OpenAIError(#[from] async_openai::error::OpenAIError),
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
