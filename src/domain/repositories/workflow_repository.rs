use async_trait::async_trait;

use crate::domain::workflow::Workflow;

/// Repository trait for the Workflow aggregate
///
/// Backs workflow status polling. The orchestrator saves a snapshot after
/// every state transition; implementations decide how long finished
/// workflows are retained.
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Save a workflow snapshot (insert or replace)
    async fn save(&self, workflow: &Workflow) -> Result<(), String>;

    /// Find a workflow by its ID
    async fn find_by_id(&self, id: &str) -> Result<Option<Workflow>, String>;

    /// All retained workflows, oldest first
    async fn list(&self) -> Result<Vec<Workflow>, String>;

    /// Drop finished workflows past their retention window, returning how many were removed
    async fn evict_expired(&self) -> Result<usize, String>;
}
