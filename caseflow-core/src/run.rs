//! One end-to-end execution of a single test case.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::catalog::ToolCatalog;
use crate::llm::{self, LlmClient};
use crate::prompt;
use crate::session::ToolProvider;
use crate::types::{merge_params, RecordEnvelope, TestCase, TestResult, TestTemplate, ToolCall};
use crate::AgentError;

/// Cap on PROMPTING/DISPATCHING cycles per run. Exceeding it is an
/// infrastructure failure, distinct from a model-judged test failure.
pub const MAX_TOOL_ROUND_TRIPS: usize = 200;

/// The record operations a run performs itself, before and after the model
/// loop. Everything else touching persisted records goes through the model's
/// own tool calls.
#[async_trait::async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn get_test_case(&self, case_id: i64) -> Result<TestCase, AgentError>;
    async fn get_test_template(&self, template_id: i64) -> Result<TestTemplate, AgentError>;
    async fn create_test_result(&self, case_id: i64, params: &Value) -> Result<i64, AgentError>;
    async fn set_screenshot_path(&self, result_id: i64, path: &str) -> Result<(), AgentError>;
    async fn record_failure(
        &self,
        result_id: i64,
        step_id: i64,
        step_name: &str,
        error_info: &str,
    ) -> Result<(), AgentError>;
}

/// Gateway backed by the worker's persistence tool session.
pub struct McpPersistence {
    session: Arc<dyn ToolProvider>,
}

impl McpPersistence {
    pub fn new(session: Arc<dyn ToolProvider>) -> Self {
        Self { session }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        tool_name: &str,
        args: Value,
    ) -> Result<RecordEnvelope<T>, AgentError> {
        let call = ToolCall {
            tool_call_id: uuid::Uuid::new_v4().to_string(),
            tool_name: tool_name.to_string(),
            input: args,
        };
        let payload = self.session.call_tool(&call).await.map_err(|e| {
            AgentError::Persistence(format!("{tool_name}: {e}"))
        })?;
        let text = payload
            .as_str()
            .ok_or_else(|| AgentError::Persistence(format!("{tool_name}: non-text payload")))?;
        serde_json::from_str(text)
            .map_err(|e| AgentError::Persistence(format!("{tool_name}: {e}")))
    }
}

#[async_trait::async_trait]
impl PersistenceGateway for McpPersistence {
    async fn get_test_case(&self, case_id: i64) -> Result<TestCase, AgentError> {
        let envelope: RecordEnvelope<TestCase> = self
            .call("get_test_case", json!({ "test_case_id": case_id }))
            .await?;
        envelope
            .into_data()
            .ok_or(AgentError::CaseNotFound(case_id))
    }

    async fn get_test_template(&self, template_id: i64) -> Result<TestTemplate, AgentError> {
        let envelope: RecordEnvelope<TestTemplate> = self
            .call(
                "get_test_template",
                json!({ "test_template_id": template_id }),
            )
            .await?;
        envelope.into_data().ok_or_else(|| {
            AgentError::Persistence(format!("test template {template_id} not found"))
        })
    }

    async fn create_test_result(&self, case_id: i64, params: &Value) -> Result<i64, AgentError> {
        let envelope: RecordEnvelope<TestResult> = self
            .call(
                "create_test_result",
                json!({
                    "test_case_id": case_id,
                    "params": params.to_string(),
                }),
            )
            .await?;
        envelope
            .into_data()
            .map(|result| result.test_result_id)
            .ok_or_else(|| {
                AgentError::Persistence("failed to create result record".to_string())
            })
    }

    async fn set_screenshot_path(&self, result_id: i64, path: &str) -> Result<(), AgentError> {
        let envelope: RecordEnvelope<Value> = self
            .call(
                "update_test_result",
                json!({
                    "test_result_id": result_id,
                    "screen_shot_path": path,
                }),
            )
            .await?;
        if envelope.success {
            Ok(())
        } else {
            Err(AgentError::Persistence(format!(
                "failed to record screenshot path on result {result_id}"
            )))
        }
    }

    async fn record_failure(
        &self,
        result_id: i64,
        step_id: i64,
        step_name: &str,
        error_info: &str,
    ) -> Result<(), AgentError> {
        let envelope: RecordEnvelope<Value> = self
            .call(
                "update_test_result",
                json!({
                    "test_result_id": result_id,
                    "result_ok": 0,
                    "error_step_id": step_id,
                    "error_step_name": step_name,
                    "error_info": error_info,
                }),
            )
            .await?;
        if envelope.success {
            Ok(())
        } else {
            Err(AgentError::Persistence(format!(
                "failed to record failure on result {result_id}"
            )))
        }
    }
}

/// Drives the LLM/tool-call loop for one test case, from result-record
/// creation to the final pass/fail write.
pub struct AgentRun {
    gateway: Arc<dyn PersistenceGateway>,
    llm: Arc<dyn LlmClient>,
    catalog: Arc<ToolCatalog>,
    screenshot_root: String,
    work_dir: String,
    /// Wall-clock ceiling per run; the round-trip cap alone cannot bound a
    /// hung provider call.
    run_deadline: Duration,
}

impl AgentRun {
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        llm: Arc<dyn LlmClient>,
        catalog: Arc<ToolCatalog>,
        screenshot_root: impl Into<String>,
        work_dir: impl Into<String>,
        run_deadline: Duration,
    ) -> Self {
        Self {
            gateway,
            llm,
            catalog,
            screenshot_root: screenshot_root.into(),
            work_dir: work_dir.into(),
            run_deadline,
        }
    }

    /// Run the case to completion. On success the returned text is the
    /// model's closing message; the result record was already finalized by
    /// the model's own tool calls. On failure, if a result record exists it
    /// is marked failed with sentinel step id 0 before the error is returned.
    pub async fn execute(&self, case_id: i64) -> Result<String, AgentError> {
        if case_id <= 0 {
            return Err(AgentError::Validation(format!(
                "test case id must be a positive integer, got {case_id}"
            )));
        }

        let mut result_id = None;
        let outcome = match tokio::time::timeout(
            self.run_deadline,
            self.run_inner(case_id, &mut result_id),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(AgentError::DeadlineExceeded(self.run_deadline)),
        };
        match outcome {
            Ok(answer) => Ok(answer),
            Err(e) => {
                if let Some(result_id) = result_id {
                    // Best-effort write; a failure here is only logged.
                    if let Err(write_err) = self
                        .gateway
                        .record_failure(result_id, 0, "unknown", &e.to_string())
                        .await
                    {
                        tracing::error!(
                            "could not record failure on result {result_id}: {write_err}"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    async fn run_inner(
        &self,
        case_id: i64,
        result_id_out: &mut Option<i64>,
    ) -> Result<String, AgentError> {
        let case = self.gateway.get_test_case(case_id).await?;
        let template = self.gateway.get_test_template(case.test_template_id).await?;
        let params = merge_params(template.params.as_deref(), case.params.as_deref());

        let result_id = self.gateway.create_test_result(case_id, &params).await?;
        *result_id_out = Some(result_id);

        let screenshot_dir = format!("{}/{}/{}", self.screenshot_root, case_id, result_id);
        tokio::fs::create_dir_all(&screenshot_dir).await?;
        self.gateway
            .set_screenshot_path(result_id, &screenshot_dir)
            .await?;

        tracing::info!(
            "starting run for case {case_id}: result {result_id}, screenshots in {screenshot_dir}"
        );

        let instructions = prompt::build_instructions(result_id, &screenshot_dir, &self.work_dir);
        let mut messages = vec![llm::user_message(&instructions)?];
        let mut turn = self.llm.complete(&messages, self.catalog.tools()).await?;

        let mut round_trips = 0;
        while !turn.tool_calls.is_empty() {
            if round_trips >= MAX_TOOL_ROUND_TRIPS {
                return Err(AgentError::LoopExceeded(MAX_TOOL_ROUND_TRIPS));
            }

            messages.push(llm::assistant_message(&turn)?);
            for call in &turn.tool_calls {
                // An invocation failure goes back to the model as the tool
                // result, so it can adapt; it does not fail the run.
                let content = match self.dispatch(call).await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("tool call '{}' failed: {e}", call.tool_name);
                        e.to_string()
                    }
                };
                messages.push(llm::tool_message(&call.tool_call_id, content));
            }

            turn = self.llm.complete(&messages, self.catalog.tools()).await?;
            round_trips += 1;
        }

        tracing::info!("run for case {case_id} finished after {round_trips} tool round trips");
        Ok(turn.content)
    }

    async fn dispatch(&self, call: &ToolCall) -> Result<String, AgentError> {
        let session = self.catalog.route(&call.tool_name)?;
        let value = session.call_tool(call).await?;
        Ok(match value {
            Value::String(text) => text,
            other => other.to_string(),
        })
    }
}
