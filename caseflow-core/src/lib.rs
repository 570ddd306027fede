pub mod catalog;
pub mod llm;
pub mod logging;
pub mod manager;
pub mod prompt;
pub mod queue;
pub mod run;
pub mod session;
pub mod worker;

pub mod types {
    pub use caseflow_types::*;
}

pub use caseflow_types::AgentError;

pub use catalog::ToolCatalog;
pub use manager::{Manager, PoolKind};
pub use queue::DedupQueue;
pub use run::{AgentRun, PersistenceGateway};
pub use session::{ToolProvider, ToolSession};
pub use worker::Worker;

#[cfg(test)]
mod tests;
