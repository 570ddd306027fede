use std::sync::Arc;

use anyhow::Result;

use caseflow_core::llm::ChatClient;
use caseflow_core::logging::init_logging;
use caseflow_core::worker::McpConnector;
use caseflow_core::Manager;
use caseflow_server::CaseflowServer;
use caseflow_types::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_logging("info");

    let settings = Arc::new(Settings::from_env()?);
    tokio::fs::create_dir_all(&settings.work_dir).await?;
    tokio::fs::create_dir_all(&settings.screenshot_dir).await?;

    let llm = Arc::new(ChatClient::new(&settings));
    let connector = Arc::new(McpConnector::new(settings.clone()));
    let manager = Arc::new(Manager::new(settings.clone(), connector, llm));

    // Workers outlive every request; their handles are only dropped at exit.
    let _workers = manager.start();

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5001);

    CaseflowServer::new(manager).start(&host, port).await
}
