use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How a worker reaches one tool provider process.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, tag = "type", rename_all = "lowercase")]
pub enum TransportType {
    Stdio {
        command: String,
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        env_vars: Option<HashMap<String, String>>,
    },
    SSE {
        server_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        headers: Option<HashMap<String, String>>,
    },
}

/// One of the three provider endpoints a worker connects to.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProviderConfig {
    pub name: String,
    #[serde(flatten)]
    pub transport: TransportType,
}

impl ProviderConfig {
    pub fn stdio(
        name: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
        env_vars: Option<HashMap<String, String>>,
    ) -> Self {
        Self {
            name: name.into(),
            transport: TransportType::Stdio {
                command: command.into(),
                args,
                env_vars,
            },
        }
    }
}
