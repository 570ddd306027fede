//! Logical records owned by the persistence tool provider.
//!
//! Field casing follows the provider's wire format, which exposes the
//! underlying `flow.t_test_*` column names verbatim.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope every persistence tool wraps its payload in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct RecordEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> RecordEnvelope<T> {
    pub fn into_data(self) -> Option<T> {
        if self.success {
            self.data
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TestCase {
    #[serde(rename = "TEST_CASE_ID")]
    pub test_case_id: i64,
    #[serde(rename = "TEST_CASE_NAME", default)]
    pub test_case_name: Option<String>,
    #[serde(rename = "TEST_TEMPLATE_ID")]
    pub test_template_id: i64,
    /// Parameter overrides as a JSON object serialized to a string.
    #[serde(rename = "PARAMS", default)]
    pub params: Option<String>,
    #[serde(rename = "STATUS", default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TestTemplate {
    #[serde(rename = "TEST_TEMPLATE_ID")]
    pub test_template_id: i64,
    #[serde(rename = "TEST_TEMPLATE_NAME", default)]
    pub test_template_name: Option<String>,
    /// Default parameters as a JSON object serialized to a string.
    #[serde(rename = "PARAMS", default)]
    pub params: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TestTemplateStep {
    #[serde(rename = "TEST_TEMPLATE_STEP_ID")]
    pub test_template_step_id: i64,
    #[serde(rename = "TEST_TEMPLATE_ID")]
    pub test_template_id: i64,
    #[serde(rename = "TEST_TEMPLATE_STEP_NAME", default)]
    pub test_template_step_name: Option<String>,
    #[serde(rename = "TEST_ORDER")]
    pub test_order: i64,
    /// Instruction text, possibly containing `{param}` placeholders.
    #[serde(rename = "TEST_CONTENT")]
    pub test_content: String,
    #[serde(rename = "HTML_SELECTOR", default)]
    pub html_selector: Option<String>,
    #[serde(rename = "EXPECTED_RESULT", default)]
    pub expected_result: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TestResult {
    #[serde(rename = "TEST_RESULT_ID")]
    pub test_result_id: i64,
    #[serde(rename = "TEST_CASE_ID")]
    pub test_case_id: i64,
    #[serde(rename = "PARAMS", default)]
    pub params: Option<String>,
    /// 1 = passed, 0 = failed, absent while the run is in flight.
    #[serde(rename = "RESULT_OK", default)]
    pub result_ok: Option<i64>,
    #[serde(rename = "ERROR_STEP_ID", default)]
    pub error_step_id: Option<i64>,
    #[serde(rename = "ERROR_STEP_NAME", default)]
    pub error_step_name: Option<String>,
    #[serde(rename = "ERROR_INFO", default)]
    pub error_info: Option<String>,
    #[serde(rename = "SCREEN_SHOT_PATH", default)]
    pub screen_shot_path: Option<String>,
    #[serde(rename = "CREATE_TIME", default)]
    pub create_time: Option<String>,
    #[serde(rename = "UPDATE_TIME", default)]
    pub update_time: Option<String>,
}

/// Merge template defaults with case overrides; case keys win on conflict.
pub fn merge_params(template_params: Option<&str>, case_params: Option<&str>) -> Value {
    let mut merged = parse_object(template_params);
    if let Value::Object(overrides) = parse_object(case_params) {
        if let Value::Object(base) = &mut merged {
            for (key, value) in overrides {
                base.insert(key, value);
            }
        }
    }
    merged
}

fn parse_object(raw: Option<&str>) -> Value {
    raw.and_then(|s| serde_json::from_str::<Value>(s).ok())
        .filter(Value::is_object)
        .unwrap_or_else(|| Value::Object(Default::default()))
}
