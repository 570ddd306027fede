//! Owns the two worker pools and their queues.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::llm::LlmClient;
use crate::queue::DedupQueue;
use crate::types::Settings;
use crate::worker::{SessionConnector, Worker, IDLE};
use crate::AgentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    /// Interactive enqueues from the front door.
    OnDemand,
    /// Enqueues placed by the scheduling layer.
    Scheduled,
}

impl PoolKind {
    fn label(self) -> &'static str {
        match self {
            PoolKind::OnDemand => "on-demand",
            PoolKind::Scheduled => "scheduled",
        }
    }
}

struct Pool {
    kind: PoolKind,
    queue: Arc<DedupQueue<i64>>,
    /// One running marker per worker slot; IDLE when the slot has no case.
    running: Vec<Arc<AtomicI64>>,
}

impl Pool {
    fn new(kind: PoolKind, size: usize) -> Self {
        Self {
            kind,
            queue: Arc::new(DedupQueue::bounded(size)),
            running: (0..size).map(|_| Arc::new(AtomicI64::new(IDLE))).collect(),
        }
    }

    fn holds_running(&self, case_id: i64) -> bool {
        self.running
            .iter()
            .any(|marker| marker.load(Ordering::SeqCst) == case_id)
    }
}

/// The process-wide execution orchestrator. Constructed once at startup and
/// handed to the HTTP layer by reference; there is no ambient global.
pub struct Manager {
    on_demand: Pool,
    scheduled: Pool,
    connector: Arc<dyn SessionConnector>,
    llm: Arc<dyn LlmClient>,
    settings: Arc<Settings>,
}

impl Manager {
    pub fn new(
        settings: Arc<Settings>,
        connector: Arc<dyn SessionConnector>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            on_demand: Pool::new(PoolKind::OnDemand, settings.pools.on_demand_size),
            scheduled: Pool::new(PoolKind::Scheduled, settings.pools.scheduled_size),
            connector,
            llm,
            settings,
        }
    }

    fn pool(&self, kind: PoolKind) -> &Pool {
        match kind {
            PoolKind::OnDemand => &self.on_demand,
            PoolKind::Scheduled => &self.scheduled,
        }
    }

    /// Admit `case_id` into a pool's queue unless it is already queued there
    /// or some worker of that pool is running it. Returns whether the id was
    /// admitted; a duplicate is a silent no-op.
    pub async fn enqueue(&self, kind: PoolKind, case_id: i64) -> Result<bool, AgentError> {
        if case_id <= 0 {
            return Err(AgentError::Validation(format!(
                "test case id must be a positive integer, got {case_id}"
            )));
        }

        let pool = self.pool(kind);
        if pool.holds_running(case_id) || pool.queue.contains(&case_id).await {
            tracing::debug!(
                "case {case_id} already pending or running in {} pool",
                kind.label()
            );
            return Ok(false);
        }
        pool.queue.push(case_id).await
    }

    /// Empty a pool's queue. Workers already mid-run are unaffected.
    pub async fn clear(&self, kind: PoolKind) {
        self.pool(kind).queue.clear().await;
        tracing::info!("{} queue cleared", kind.label());
    }

    /// Whether `case_id` is pending or in flight in the given pool.
    pub async fn is_running(&self, kind: PoolKind, case_id: i64) -> bool {
        let pool = self.pool(kind);
        pool.holds_running(case_id) || pool.queue.contains(&case_id).await
    }

    pub fn queue_size(&self, kind: PoolKind) -> usize {
        self.pool(kind).queue.size()
    }

    /// Launch every worker of both pools as independently progressing tasks.
    /// Returns once all are launched; the handles never resolve on their own.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        for pool in [&self.on_demand, &self.scheduled] {
            for (slot, marker) in pool.running.iter().enumerate() {
                let worker = Worker::new(
                    slot,
                    pool.kind.label(),
                    pool.queue.clone(),
                    marker.clone(),
                    self.connector.clone(),
                    self.llm.clone(),
                    self.settings.clone(),
                );
                handles.push(tokio::spawn(worker.run()));
            }
        }
        tracing::info!(
            "started {} on-demand and {} scheduled workers",
            self.on_demand.running.len(),
            self.scheduled.running.len()
        );
        handles
    }
}
