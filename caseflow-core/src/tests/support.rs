#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_openai::types::chat::{ChatCompletionRequestMessage, ChatCompletionTools};
use serde_json::{json, Value};
use tokio::sync::{Notify, Semaphore};

use crate::llm::{LlmClient, LlmTurn};
use crate::run::PersistenceGateway;
use crate::session::ToolProvider;
use crate::types::{TestCase, TestTemplate, ToolCall, ToolDescriptor};
use crate::AgentError;

/// In-process stand-in for one tool provider session.
pub struct FakeProvider {
    name: String,
    tools: Vec<ToolDescriptor>,
    /// Canned response text per tool name; anything else answers "ok".
    responses: HashMap<String, String>,
    pub calls: Mutex<Vec<ToolCall>>,
}

impl FakeProvider {
    pub fn new(name: &str, tool_names: &[&str]) -> Self {
        let tools = tool_names
            .iter()
            .map(|tool| ToolDescriptor {
                name: tool.to_string(),
                description: Some(format!("fake tool {tool}")),
                input_schema: json!({
                    "type": "object",
                    "properties": {"selector": {"type": "string"}},
                    "required": []
                }),
            })
            .collect();
        Self {
            name: name.to_string(),
            tools,
            responses: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(mut self, tool: &str, response: &str) -> Self {
        self.responses.insert(tool.to_string(), response.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl ToolProvider for FakeProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, AgentError> {
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, call: &ToolCall) -> Result<Value, AgentError> {
        self.calls.lock().unwrap().push(call.clone());
        let text = self
            .responses
            .get(&call.tool_name)
            .cloned()
            .unwrap_or_else(|| "ok".to_string());
        Ok(Value::String(text))
    }

    async fn close(&self) {}
}

/// A persistence provider session answering the gateway's record tools with
/// well-formed envelopes.
pub fn fake_persistence_session(case_id: i64, template_id: i64, result_id: i64) -> FakeProvider {
    FakeProvider::new("persistence", &["save_test_case_result", "get_test_template_steps"])
        .with_response(
            "get_test_case",
            &json!({
                "success": true,
                "data": {
                    "TEST_CASE_ID": case_id,
                    "TEST_TEMPLATE_ID": template_id,
                    "PARAMS": "{\"retries\":3}"
                }
            })
            .to_string(),
        )
        .with_response(
            "get_test_template",
            &json!({
                "success": true,
                "data": {
                    "TEST_TEMPLATE_ID": template_id,
                    "PARAMS": "{\"url\":\"https://example.test\",\"retries\":1}"
                }
            })
            .to_string(),
        )
        .with_response(
            "create_test_result",
            &json!({
                "success": true,
                "data": {"TEST_RESULT_ID": result_id, "TEST_CASE_ID": case_id}
            })
            .to_string(),
        )
        .with_response("update_test_result", &json!({"success": true}).to_string())
}

/// In-memory `PersistenceGateway` recording every write.
pub struct MemoryGateway {
    pub cases: HashMap<i64, TestCase>,
    pub templates: HashMap<i64, TestTemplate>,
    next_result_id: AtomicI64,
    pub created: Mutex<Vec<(i64, Value)>>,
    pub screenshot_paths: Mutex<Vec<(i64, String)>>,
    pub failures: Mutex<Vec<(i64, i64, String, String)>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            cases: HashMap::new(),
            templates: HashMap::new(),
            next_result_id: AtomicI64::new(1),
            created: Mutex::new(Vec::new()),
            screenshot_paths: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn with_case(mut self, case_id: i64, template_id: i64, params: &str) -> Self {
        self.cases.insert(
            case_id,
            TestCase {
                test_case_id: case_id,
                test_case_name: Some(format!("case {case_id}")),
                test_template_id: template_id,
                params: Some(params.to_string()),
                status: None,
            },
        );
        self
    }

    pub fn with_template(mut self, template_id: i64, params: &str) -> Self {
        self.templates.insert(
            template_id,
            TestTemplate {
                test_template_id: template_id,
                test_template_name: Some(format!("template {template_id}")),
                params: Some(params.to_string()),
            },
        );
        self
    }

    pub fn failure_count(&self) -> usize {
        self.failures.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn get_test_case(&self, case_id: i64) -> Result<TestCase, AgentError> {
        self.cases
            .get(&case_id)
            .cloned()
            .ok_or(AgentError::CaseNotFound(case_id))
    }

    async fn get_test_template(&self, template_id: i64) -> Result<TestTemplate, AgentError> {
        self.templates.get(&template_id).cloned().ok_or_else(|| {
            AgentError::Persistence(format!("test template {template_id} not found"))
        })
    }

    async fn create_test_result(&self, case_id: i64, params: &Value) -> Result<i64, AgentError> {
        let result_id = self.next_result_id.fetch_add(1, Ordering::SeqCst);
        self.created
            .lock()
            .unwrap()
            .push((case_id, params.clone()));
        Ok(result_id)
    }

    async fn set_screenshot_path(&self, result_id: i64, path: &str) -> Result<(), AgentError> {
        self.screenshot_paths
            .lock()
            .unwrap()
            .push((result_id, path.to_string()));
        Ok(())
    }

    async fn record_failure(
        &self,
        result_id: i64,
        step_id: i64,
        step_name: &str,
        error_info: &str,
    ) -> Result<(), AgentError> {
        self.failures.lock().unwrap().push((
            result_id,
            step_id,
            step_name.to_string(),
            error_info.to_string(),
        ));
        Ok(())
    }
}

/// LLM stub that parks inside `complete` until the test releases it, so the
/// test can observe a run in flight.
pub struct BlockingLlm {
    pub started: Notify,
    pub release: Semaphore,
}

impl BlockingLlm {
    pub fn new() -> Self {
        Self {
            started: Notify::new(),
            release: Semaphore::new(0),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for BlockingLlm {
    async fn complete(
        &self,
        _messages: &[ChatCompletionRequestMessage],
        _tools: &[ChatCompletionTools],
    ) -> Result<LlmTurn, AgentError> {
        self.started.notify_one();
        let permit = self
            .release
            .acquire()
            .await
            .map_err(|e| AgentError::LLMError(e.to_string()))?;
        permit.forget();
        Ok(LlmTurn {
            content: "released".to_string(),
            tool_calls: vec![],
        })
    }
}
