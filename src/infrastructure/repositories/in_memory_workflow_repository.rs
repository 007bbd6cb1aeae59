use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::time::Duration;
use tracing::debug;

use crate::domain::repositories::WorkflowRepository;
use crate::domain::workflow::Workflow;

/// Process-local workflow registry
///
/// Keeps snapshots in a concurrent map for status polling. Finished workflows
/// are dropped once they are older than `ttl`, and the oldest finished ones
/// go first whenever more than `max_retained` are held. Running workflows are
/// never evicted.
pub struct InMemoryWorkflowRepository {
    workflows: DashMap<String, Workflow>,
    ttl: Duration,
    max_retained: usize,
}

impl InMemoryWorkflowRepository {
    pub fn new(ttl: Duration, max_retained: usize) -> Self {
        Self {
            workflows: DashMap::new(),
            ttl,
            max_retained,
        }
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    fn enforce_cap(&self) -> usize {
        let excess = self.workflows.len().saturating_sub(self.max_retained);
        if excess == 0 {
            return 0;
        }

        let mut finished: Vec<_> = self
            .workflows
            .iter()
            .filter(|entry| entry.status().is_terminal())
            .map(|entry| {
                let finished_at = entry.completed_at().unwrap_or_else(|| entry.started_at());
                (finished_at, entry.key().clone())
            })
            .collect();
        finished.sort();

        finished
            .into_iter()
            .take(excess)
            .filter(|(_, id)| self.workflows.remove(id).is_some())
            .count()
    }
}

impl Default for InMemoryWorkflowRepository {
    fn default() -> Self {
        Self::new(Duration::from_secs(3_600), 1_000)
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn save(&self, workflow: &Workflow) -> Result<(), String> {
        self.workflows
            .insert(workflow.id().to_string(), workflow.clone());

        let evicted = self.enforce_cap();
        if evicted > 0 {
            debug!(evicted, "evicted workflows over retention cap");
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Workflow>, String> {
        Ok(self.workflows.get(id).map(|entry| entry.value().clone()))
    }

    async fn list(&self) -> Result<Vec<Workflow>, String> {
        let mut workflows: Vec<Workflow> = self
            .workflows
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        workflows.sort_by_key(|workflow| workflow.started_at());
        Ok(workflows)
    }

    async fn evict_expired(&self) -> Result<usize, String> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| format!("Invalid workflow ttl: {}", e))?;
        let cutoff = Utc::now() - ttl;

        let before = self.workflows.len();
        self.workflows.retain(|_, workflow| {
            !(workflow.status().is_terminal()
                && workflow.completed_at().is_some_and(|at| at <= cutoff))
        });
        Ok(before - self.workflows.len())
    }
}
