//! RemoteBackend trait definition
//!
//! Abstract interface over the remote relational backend, one set of
//! operations per table. Implementations map unique-key collisions to
//! [`EngineError::Conflict`](crate::error::EngineError::Conflict) and
//! transport failures to
//! [`EngineError::Connectivity`](crate::error::EngineError::Connectivity);
//! the coordinator's push/pull semantics depend on that distinction.

use super::wire::{ProjectRow, RelationshipRow, TaskRow, WorkspaceRow, WorkstreamRow};
use crate::error::Result;
use async_trait::async_trait;

/// Abstract interface for the remote relational backend
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    // ========================================================================
    // Workspaces
    // ========================================================================

    async fn fetch_workspaces(&self) -> Result<Vec<WorkspaceRow>>;
    async fn insert_workspace(&self, row: &WorkspaceRow) -> Result<()>;
    async fn update_workspace(&self, id: &str, row: &WorkspaceRow) -> Result<()>;

    // ========================================================================
    // Projects
    // ========================================================================

    async fn fetch_projects(&self) -> Result<Vec<ProjectRow>>;
    async fn insert_project(&self, row: &ProjectRow) -> Result<()>;
    async fn update_project(&self, id: &str, row: &ProjectRow) -> Result<()>;

    // ========================================================================
    // Workstreams
    // ========================================================================

    async fn fetch_workstreams(&self) -> Result<Vec<WorkstreamRow>>;
    async fn insert_workstream(&self, row: &WorkstreamRow) -> Result<()>;
    async fn update_workstream(&self, id: &str, row: &WorkstreamRow) -> Result<()>;

    // ========================================================================
    // Tasks
    // ========================================================================

    async fn fetch_tasks(&self) -> Result<Vec<TaskRow>>;
    async fn insert_task(&self, row: &TaskRow) -> Result<()>;
    async fn update_task(&self, id: &str, row: &TaskRow) -> Result<()>;

    // ========================================================================
    // Relationships
    // ========================================================================

    async fn fetch_relationships(&self) -> Result<Vec<RelationshipRow>>;
    async fn insert_relationship(&self, row: &RelationshipRow) -> Result<()>;
    async fn update_relationship(&self, id: &str, row: &RelationshipRow) -> Result<()>;
}
