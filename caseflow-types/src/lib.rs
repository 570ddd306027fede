pub mod config;
pub mod errors;
pub mod mcp;
pub mod records;
pub mod tool;

pub use config::{BrowserFlavor, PoolSettings, Settings};
pub use errors::AgentError;
pub use mcp::{ProviderConfig, TransportType};
pub use records::{
    merge_params, RecordEnvelope, TestCase, TestResult, TestTemplate, TestTemplateStep,
};
pub use tool::{ToolCall, ToolDefinition, ToolDescriptor};
