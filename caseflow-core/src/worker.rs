//! Long-running consumers of a pool's queue.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::catalog::ToolCatalog;
use crate::llm::LlmClient;
use crate::queue::DedupQueue;
use crate::run::{AgentRun, McpPersistence};
use crate::session::{ToolProvider, ToolSession};
use crate::types::Settings;
use crate::AgentError;

/// Marker value while a worker has no case in flight.
pub const IDLE: i64 = -1;

/// The three provider sessions a worker owns exclusively for its lifetime.
pub struct SessionTriple {
    pub persistence: Arc<dyn ToolProvider>,
    pub browser: Arc<dyn ToolProvider>,
    pub captcha: Arc<dyn ToolProvider>,
}

impl SessionTriple {
    pub fn providers(&self) -> [Arc<dyn ToolProvider>; 3] {
        [
            self.persistence.clone(),
            self.browser.clone(),
            self.captcha.clone(),
        ]
    }
}

/// Establishes a worker's three provider sessions.
#[async_trait::async_trait]
pub trait SessionConnector: Send + Sync {
    async fn establish(&self) -> Result<SessionTriple, AgentError>;
}

/// Connector spawning the real provider processes over stdio.
pub struct McpConnector {
    settings: Arc<Settings>,
}

impl McpConnector {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }
}

#[async_trait::async_trait]
impl SessionConnector for McpConnector {
    async fn establish(&self) -> Result<SessionTriple, AgentError> {
        let list_timeout = self.settings.tool_list_timeout();
        let call_timeout = self.settings.tool_call_timeout();

        let browser =
            ToolSession::connect(&self.settings.browser_provider(), list_timeout, call_timeout)
                .await?;
        let captcha =
            ToolSession::connect(&self.settings.captcha_provider(), list_timeout, call_timeout)
                .await?;
        let persistence = ToolSession::connect(
            &self.settings.persistence_provider(),
            list_timeout,
            call_timeout,
        )
        .await?;

        Ok(SessionTriple {
            persistence: Arc::new(persistence),
            browser: Arc::new(browser),
            captcha: Arc::new(captcha),
        })
    }
}

/// One queue consumer. Sessions are established lazily on the first item and
/// reused for every subsequent run; a provider that dies afterwards is not
/// reconnected, so later runs on this worker fail until restart.
pub struct Worker {
    id: usize,
    pool: String,
    queue: Arc<DedupQueue<i64>>,
    running: Arc<AtomicI64>,
    connector: Arc<dyn SessionConnector>,
    llm: Arc<dyn LlmClient>,
    settings: Arc<Settings>,
}

impl Worker {
    pub fn new(
        id: usize,
        pool: impl Into<String>,
        queue: Arc<DedupQueue<i64>>,
        running: Arc<AtomicI64>,
        connector: Arc<dyn SessionConnector>,
        llm: Arc<dyn LlmClient>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            id,
            pool: pool.into(),
            queue,
            running,
            connector,
            llm,
            settings,
        }
    }

    /// The unbounded worker loop: back off while the queue is empty, else
    /// take the head, mark it running, execute one run, go idle.
    pub async fn run(self) {
        let mut runtime: Option<AgentRun> = None;
        loop {
            if self.queue.is_empty() {
                let backoff = { rand::thread_rng().gen_range(3..=10) };
                tokio::time::sleep(Duration::from_secs(backoff)).await;
                continue;
            }

            let Some(case_id) = self.queue.try_dequeue().await else {
                continue;
            };

            self.running.store(case_id, Ordering::SeqCst);
            self.process(case_id, &mut runtime).await;
            self.running.store(IDLE, Ordering::SeqCst);
        }
    }

    async fn process(&self, case_id: i64, runtime: &mut Option<AgentRun>) {
        tracing::info!("[{}:{}] picked up case {case_id}", self.pool, self.id);

        if runtime.is_none() {
            match self.establish().await {
                Ok(run) => *runtime = Some(run),
                Err(e) => {
                    // Fatal to this run, not to the worker.
                    tracing::error!(
                        "[{}:{}] could not establish tool sessions: {e}",
                        self.pool,
                        self.id
                    );
                    return;
                }
            }
        }
        let Some(run) = runtime.as_ref() else {
            return;
        };

        match run.execute(case_id).await {
            Ok(answer) => {
                tracing::info!(
                    "[{}:{}] case {case_id} finished: {answer}",
                    self.pool,
                    self.id
                );
            }
            Err(e) => {
                tracing::error!("[{}:{}] case {case_id} failed: {e}", self.pool, self.id);
            }
        }
    }

    /// Establish the session triple and build the run machinery around it.
    /// Done once per worker; the sessions are reused by every later run.
    async fn establish(&self) -> Result<AgentRun, AgentError> {
        let sessions = self.connector.establish().await?;
        let catalog = Arc::new(ToolCatalog::merge(&sessions.providers()).await?);
        let gateway = Arc::new(McpPersistence::new(sessions.persistence.clone()));
        tracing::info!("[{}:{}] tool sessions established", self.pool, self.id);
        Ok(AgentRun::new(
            gateway,
            self.llm.clone(),
            catalog,
            self.settings.screenshot_dir.clone(),
            self.settings.work_dir.clone(),
            self.settings.run_timeout(),
        ))
    }
}
