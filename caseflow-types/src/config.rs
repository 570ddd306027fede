//! Process settings, loaded from the environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::AgentError;
use crate::mcp::ProviderConfig;

const DEFAULT_MODEL: &str = "DeepSeek-R1-671B";
const DEFAULT_POOL_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserFlavor {
    Playwright,
    Puppeteer,
    Selenium,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    pub on_demand_size: usize,
    pub scheduled_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub browser: BrowserFlavor,
    pub browser_install_path: Option<String>,
    pub screenshot_dir: String,
    pub work_dir: String,
    pub persistence_command: String,
    pub captcha_command: String,
    pub pools: PoolSettings,
    pub tool_list_timeout_secs: u64,
    pub tool_call_timeout_secs: u64,
    /// Wall-clock ceiling for one whole run; the tool round-trip cap alone
    /// cannot bound a hung provider call.
    pub run_timeout_secs: u64,
}

impl Settings {
    /// Read settings from the environment. Only the LLM API key is mandatory.
    pub fn from_env() -> Result<Self, AgentError> {
        let api_key = std::env::var("LLM_API_KEY").map_err(|_| {
            AgentError::InvalidConfiguration("LLM_API_KEY is not set".to_string())
        })?;

        let browser = match env_or("DEFAULT_BROWSER", "playwright").to_lowercase().as_str() {
            "puppeteer" => BrowserFlavor::Puppeteer,
            "selenium" => BrowserFlavor::Selenium,
            _ => BrowserFlavor::Playwright,
        };

        Ok(Self {
            api_key,
            base_url: std::env::var("LLM_BASE_URL").ok(),
            model: env_or("LLM_MODEL", DEFAULT_MODEL),
            browser,
            browser_install_path: std::env::var("BROWSER_INSTALL_PATH")
                .ok()
                .map(|p| p.replace('\\', "/")),
            screenshot_dir: env_or("SCREEN_SHOT_DIR", "screenshots"),
            work_dir: env_or("WORK_DIR", "workdir"),
            persistence_command: env_or("PERSISTENCE_MCP_COMMAND", "python db_mcp_server.py"),
            captcha_command: env_or("CAPTCHA_MCP_COMMAND", "python captcha_code_mcp_server.py"),
            pools: PoolSettings {
                on_demand_size: env_usize("TEST_TASK_THREAD_COUNT", DEFAULT_POOL_SIZE),
                scheduled_size: env_usize("SCHEDULE_TASK_THREAD_COUNT", DEFAULT_POOL_SIZE),
            },
            tool_list_timeout_secs: env_usize("TOOL_LIST_TIMEOUT_SECS", 10) as u64,
            tool_call_timeout_secs: env_usize("TOOL_CALL_TIMEOUT_SECS", 120) as u64,
            run_timeout_secs: env_usize("RUN_TIMEOUT_SECS", 1800) as u64,
        })
    }

    pub fn tool_list_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_list_timeout_secs)
    }

    pub fn tool_call_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_call_timeout_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    /// The browser provider's launch line depends on the configured flavor.
    pub fn browser_provider(&self) -> ProviderConfig {
        match self.browser {
            BrowserFlavor::Playwright => ProviderConfig::stdio(
                "browser",
                "npx",
                vec![
                    "-y".to_string(),
                    "@executeautomation/playwright-mcp-server".to_string(),
                    "--timeout=120000".to_string(),
                ],
                None,
            ),
            BrowserFlavor::Puppeteer => {
                let executable = self.browser_install_path.clone().unwrap_or_default();
                let launch_options = format!(
                    "{{ \"headless\": false, \"executablePath\": \"{executable}\", \"args\": [] }}"
                );
                ProviderConfig::stdio(
                    "browser",
                    "npx",
                    vec![
                        "-y".to_string(),
                        "@modelcontextprotocol/server-puppeteer".to_string(),
                    ],
                    Some(
                        [
                            ("PUPPETEER_LAUNCH_OPTIONS".to_string(), launch_options),
                            ("ALLOW_DANGEROUS".to_string(), "true".to_string()),
                        ]
                        .into_iter()
                        .collect(),
                    ),
                )
            }
            BrowserFlavor::Selenium => ProviderConfig::stdio(
                "browser",
                "npx",
                vec!["-y".to_string(), "@angiejones/mcp-selenium".to_string()],
                None,
            ),
        }
    }

    pub fn persistence_provider(&self) -> ProviderConfig {
        command_provider("persistence", &self.persistence_command)
    }

    pub fn captcha_provider(&self) -> ProviderConfig {
        command_provider("captcha", &self.captcha_command)
    }
}

fn command_provider(name: &str, command_line: &str) -> ProviderConfig {
    let mut parts = command_line.split_whitespace().map(str::to_string);
    let command = parts.next().unwrap_or_default();
    ProviderConfig::stdio(name, command, parts.collect(), None)
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
