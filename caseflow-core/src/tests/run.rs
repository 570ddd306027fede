use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::catalog::ToolCatalog;
use crate::llm::LlmTurn;
use crate::run::{AgentRun, MAX_TOOL_ROUND_TRIPS};
use crate::session::ToolProvider;
use crate::tests::mock_llm::{MockLlm, MockLlmScenario};
use crate::tests::support::{FakeProvider, MemoryGateway};
use crate::types::ToolCall;
use crate::AgentError;

struct Harness {
    gateway: Arc<MemoryGateway>,
    llm: Arc<MockLlm>,
    browser: Arc<FakeProvider>,
    run: AgentRun,
    _workspace: tempfile::TempDir,
}

async fn harness(scenario: MockLlmScenario) -> Harness {
    harness_with_gateway(
        scenario,
        MemoryGateway::new()
            .with_case(42, 1, r#"{"retries":3}"#)
            .with_template(1, r#"{"url":"https://example.test","retries":1}"#),
    )
    .await
}

async fn harness_with_gateway(scenario: MockLlmScenario, gateway: MemoryGateway) -> Harness {
    let gateway = Arc::new(gateway);
    let llm = Arc::new(MockLlm::new(scenario));
    let browser = Arc::new(FakeProvider::new(
        "browser",
        &["playwright_click", "playwright_screenshot"],
    ));
    let sessions: Vec<Arc<dyn ToolProvider>> = vec![browser.clone()];
    let catalog = Arc::new(ToolCatalog::merge(&sessions).await.unwrap());
    let workspace = tempfile::tempdir().unwrap();
    let run = AgentRun::new(
        gateway.clone(),
        llm.clone(),
        catalog,
        workspace.path().join("shots").display().to_string(),
        workspace.path().join("work").display().to_string(),
        Duration::from_secs(600),
    );
    Harness {
        gateway,
        llm,
        browser,
        run,
        _workspace: workspace,
    }
}

#[tokio::test]
async fn zero_tool_calls_completes_in_one_round_trip() {
    let h = harness(MockLlmScenario::NoToolCalls).await;
    let answer = h.run.execute(42).await.unwrap();

    assert_eq!(answer, "All steps passed.");
    assert_eq!(h.llm.call_count(), 1);
    assert_eq!(h.browser.call_count(), 0);
    // The run is COMPLETED; no pass/fail update was written by the core.
    assert_eq!(h.gateway.failure_count(), 0);
}

#[tokio::test]
async fn loading_merges_params_with_case_overriding_template() {
    let h = harness(MockLlmScenario::NoToolCalls).await;
    h.run.execute(42).await.unwrap();

    let created = h.gateway.created.lock().unwrap();
    let (case_id, params) = &created[0];
    assert_eq!(*case_id, 42);
    assert_eq!(*params, json!({"url": "https://example.test", "retries": 3}));
}

#[tokio::test]
async fn screenshot_directory_is_created_and_recorded() {
    let h = harness(MockLlmScenario::NoToolCalls).await;
    h.run.execute(42).await.unwrap();

    let paths = h.gateway.screenshot_paths.lock().unwrap();
    let (result_id, path) = &paths[0];
    assert_eq!(*result_id, 1);
    assert!(path.ends_with("42/1"), "path keyed by case and result: {path}");
    assert!(std::path::Path::new(path).is_dir());
}

#[tokio::test]
async fn tool_calls_are_dispatched_then_run_completes() {
    let h = harness(MockLlmScenario::ToolCallThenFinish).await;
    let answer = h.run.execute(42).await.unwrap();

    assert_eq!(answer, "Test finished; result saved.");
    assert_eq!(h.llm.call_count(), 2);
    let calls = h.browser.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].tool_name, "playwright_click");
}

#[tokio::test]
async fn loop_cap_fails_at_exactly_the_two_hundredth_round_trip() {
    let h = harness(MockLlmScenario::RepeatToolCall).await;
    match h.run.execute(42).await {
        Err(AgentError::LoopExceeded(cap)) => assert_eq!(cap, MAX_TOOL_ROUND_TRIPS),
        other => panic!("expected LoopExceeded, got {other:?}"),
    }

    // 200 dispatch cycles ran; the follow-up that would start the 201st did not.
    assert_eq!(h.browser.call_count(), MAX_TOOL_ROUND_TRIPS);
    assert_eq!(h.llm.call_count(), MAX_TOOL_ROUND_TRIPS + 1);

    // An infrastructure failure lands on the result with the sentinel step.
    let failures = h.gateway.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    let (result_id, step_id, step_name, error_info) = &failures[0];
    assert_eq!(*result_id, 1);
    assert_eq!(*step_id, 0);
    assert_eq!(step_name, "unknown");
    assert!(error_info.contains("200"));
}

#[tokio::test]
async fn unknown_case_fails_without_touching_any_record() {
    let h = harness_with_gateway(MockLlmScenario::NoToolCalls, MemoryGateway::new()).await;
    match h.run.execute(42).await {
        Err(AgentError::CaseNotFound(42)) => {}
        other => panic!("expected CaseNotFound, got {other:?}"),
    }
    assert_eq!(h.llm.call_count(), 0);
    assert!(h.gateway.created.lock().unwrap().is_empty());
    // No result record exists, so no failure write was possible either.
    assert_eq!(h.gateway.failure_count(), 0);
}

#[tokio::test]
async fn llm_failure_after_result_creation_records_the_sentinel_failure() {
    let h = harness(MockLlmScenario::Error).await;
    match h.run.execute(42).await {
        Err(AgentError::LLMError(_)) => {}
        other => panic!("expected LLMError, got {other:?}"),
    }

    let failures = h.gateway.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].1, 0);
    assert_eq!(failures[0].2, "unknown");
}

#[tokio::test]
async fn invalid_case_id_is_rejected_before_any_resource_is_allocated() {
    let h = harness(MockLlmScenario::NoToolCalls).await;
    match h.run.execute(0).await {
        Err(AgentError::Validation(_)) => {}
        other => panic!("expected Validation, got {other:?}"),
    }
    assert!(h.gateway.created.lock().unwrap().is_empty());
    assert_eq!(h.llm.call_count(), 0);
}

#[tokio::test]
async fn failed_tool_invocation_is_surfaced_to_the_model_not_escalated() {
    // First turn asks for a tool nobody advertises; the error must come back
    // as that call's tool-result message and the run must still complete.
    let scripted = MockLlmScenario::Scripted(vec![LlmTurn {
        content: String::new(),
        tool_calls: vec![ToolCall {
            tool_call_id: "call-1".to_string(),
            tool_name: "no_such_tool".to_string(),
            input: json!({}),
        }],
    }]);
    let h = harness(scripted).await;
    let answer = h.run.execute(42).await.unwrap();

    assert_eq!(answer, "Scripted scenario completed.");
    assert_eq!(h.llm.call_count(), 2);
    assert_eq!(h.gateway.failure_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn a_hung_model_call_is_cut_off_at_the_run_deadline() {
    use crate::tests::support::BlockingLlm;

    let gateway = Arc::new(
        MemoryGateway::new()
            .with_case(42, 1, "{}")
            .with_template(1, "{}"),
    );
    let llm = Arc::new(BlockingLlm::new());
    let sessions: Vec<Arc<dyn ToolProvider>> =
        vec![Arc::new(FakeProvider::new("browser", &["playwright_click"]))];
    let catalog = Arc::new(ToolCatalog::merge(&sessions).await.unwrap());
    let workspace = tempfile::tempdir().unwrap();
    let run = AgentRun::new(
        gateway.clone(),
        llm,
        catalog,
        workspace.path().join("shots").display().to_string(),
        workspace.path().join("work").display().to_string(),
        Duration::from_secs(5),
    );

    match run.execute(42).await {
        Err(AgentError::DeadlineExceeded(_)) => {}
        other => panic!("expected DeadlineExceeded, got {other:?}"),
    }
    // The deadline is an infrastructure failure like any other.
    assert_eq!(gateway.failure_count(), 1);
}

#[tokio::test]
async fn several_calls_in_one_turn_each_get_their_own_result_message() {
    let scripted = MockLlmScenario::Scripted(vec![LlmTurn {
        content: String::new(),
        tool_calls: vec![
            ToolCall {
                tool_call_id: "call-a".to_string(),
                tool_name: "playwright_click".to_string(),
                input: json!({"selector": "#a"}),
            },
            ToolCall {
                tool_call_id: "call-b".to_string(),
                tool_name: "playwright_screenshot".to_string(),
                input: json!({"name": "step_002"}),
            },
        ],
    }]);
    let h = harness(scripted).await;
    h.run.execute(42).await.unwrap();

    let calls = h.browser.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].tool_call_id, "call-a");
    assert_eq!(calls[1].tool_call_id, "call-b");
}
