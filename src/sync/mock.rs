//! In-memory mock implementation of RemoteBackend for testing.
//!
//! Tables are `tokio::sync::RwLock<HashMap<remote_id, Row>>`. Inserting an
//! existing id yields `Conflict`, like the real backend's unique key. The
//! `offline` flag makes every call fail with `Connectivity`, and the insert
//! gate lets a test hold a pass open to exercise the single-flight guard.

use super::backend::RemoteBackend;
use super::wire::{ProjectRow, RelationshipRow, TaskRow, WorkspaceRow, WorkstreamRow};
use crate::error::{EngineError, Result};
use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};

/// In-memory mock of the remote relational backend
#[derive(Default)]
pub struct MockRemoteBackend {
    pub workspaces: RwLock<HashMap<String, WorkspaceRow>>,
    pub projects: RwLock<HashMap<String, ProjectRow>>,
    pub workstreams: RwLock<HashMap<String, WorkstreamRow>>,
    pub tasks: RwLock<HashMap<String, TaskRow>>,
    pub relationships: RwLock<HashMap<String, RelationshipRow>>,
    offline: AtomicBool,
    insert_gate: RwLock<Option<Arc<Notify>>>,
}

impl MockRemoteBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the backend becoming (un)reachable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Block every insert until the returned notify is signalled
    pub async fn hold_inserts(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.insert_gate.write().await = Some(notify.clone());
        notify
    }

    /// Seed a workspace row, as if another client had pushed it
    pub async fn with_workspace_row(self, row: WorkspaceRow) -> Self {
        self.workspaces.write().await.insert(row.id.clone(), row);
        self
    }

    /// Seed a project row
    pub async fn with_project_row(self, row: ProjectRow) -> Self {
        self.projects.write().await.insert(row.id.clone(), row);
        self
    }

    /// Seed a task row
    pub async fn with_task_row(self, row: TaskRow) -> Self {
        self.tasks.write().await.insert(row.id.clone(), row);
        self
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(EngineError::Connectivity("mock backend offline".into()));
        }
        Ok(())
    }

    async fn wait_gate(&self) {
        let gate = self.insert_gate.read().await.clone();
        if let Some(notify) = gate {
            notify.notified().await;
        }
    }
}

#[async_trait]
impl RemoteBackend for MockRemoteBackend {
    async fn fetch_workspaces(&self) -> Result<Vec<WorkspaceRow>> {
        self.check_online()?;
        Ok(self.workspaces.read().await.values().cloned().collect())
    }

    async fn insert_workspace(&self, row: &WorkspaceRow) -> Result<()> {
        self.check_online()?;
        self.wait_gate().await;
        let mut table = self.workspaces.write().await;
        if table.contains_key(&row.id) {
            return Err(EngineError::Conflict(row.id.clone()));
        }
        table.insert(row.id.clone(), row.clone());
        Ok(())
    }

    async fn update_workspace(&self, id: &str, row: &WorkspaceRow) -> Result<()> {
        self.check_online()?;
        let mut table = self.workspaces.write().await;
        if !table.contains_key(id) {
            return Err(EngineError::Internal(anyhow!(
                "update of unknown remote workspace {id}"
            )));
        }
        table.insert(id.to_string(), row.clone());
        Ok(())
    }

    async fn fetch_projects(&self) -> Result<Vec<ProjectRow>> {
        self.check_online()?;
        Ok(self.projects.read().await.values().cloned().collect())
    }

    async fn insert_project(&self, row: &ProjectRow) -> Result<()> {
        self.check_online()?;
        self.wait_gate().await;
        let mut table = self.projects.write().await;
        if table.contains_key(&row.id) {
            return Err(EngineError::Conflict(row.id.clone()));
        }
        table.insert(row.id.clone(), row.clone());
        Ok(())
    }

    async fn update_project(&self, id: &str, row: &ProjectRow) -> Result<()> {
        self.check_online()?;
        let mut table = self.projects.write().await;
        if !table.contains_key(id) {
            return Err(EngineError::Internal(anyhow!(
                "update of unknown remote project {id}"
            )));
        }
        table.insert(id.to_string(), row.clone());
        Ok(())
    }

    async fn fetch_workstreams(&self) -> Result<Vec<WorkstreamRow>> {
        self.check_online()?;
        Ok(self.workstreams.read().await.values().cloned().collect())
    }

    async fn insert_workstream(&self, row: &WorkstreamRow) -> Result<()> {
        self.check_online()?;
        self.wait_gate().await;
        let mut table = self.workstreams.write().await;
        if table.contains_key(&row.id) {
            return Err(EngineError::Conflict(row.id.clone()));
        }
        table.insert(row.id.clone(), row.clone());
        Ok(())
    }

    async fn update_workstream(&self, id: &str, row: &WorkstreamRow) -> Result<()> {
        self.check_online()?;
        let mut table = self.workstreams.write().await;
        if !table.contains_key(id) {
            return Err(EngineError::Internal(anyhow!(
                "update of unknown remote workstream {id}"
            )));
        }
        table.insert(id.to_string(), row.clone());
        Ok(())
    }

    async fn fetch_tasks(&self) -> Result<Vec<TaskRow>> {
        self.check_online()?;
        Ok(self.tasks.read().await.values().cloned().collect())
    }

    async fn insert_task(&self, row: &TaskRow) -> Result<()> {
        self.check_online()?;
        self.wait_gate().await;
        let mut table = self.tasks.write().await;
        if table.contains_key(&row.id) {
            return Err(EngineError::Conflict(row.id.clone()));
        }
        table.insert(row.id.clone(), row.clone());
        Ok(())
    }

    async fn update_task(&self, id: &str, row: &TaskRow) -> Result<()> {
        self.check_online()?;
        let mut table = self.tasks.write().await;
        if !table.contains_key(id) {
            return Err(EngineError::Internal(anyhow!(
                "update of unknown remote task {id}"
            )));
        }
        table.insert(id.to_string(), row.clone());
        Ok(())
    }

    async fn fetch_relationships(&self) -> Result<Vec<RelationshipRow>> {
        self.check_online()?;
        Ok(self.relationships.read().await.values().cloned().collect())
    }

    async fn insert_relationship(&self, row: &RelationshipRow) -> Result<()> {
        self.check_online()?;
        self.wait_gate().await;
        let mut table = self.relationships.write().await;
        if table.contains_key(&row.id) {
            return Err(EngineError::Conflict(row.id.clone()));
        }
        table.insert(row.id.clone(), row.clone());
        Ok(())
    }

    async fn update_relationship(&self, id: &str, row: &RelationshipRow) -> Result<()> {
        self.check_online()?;
        let mut table = self.relationships.write().await;
        if !table.contains_key(id) {
            return Err(EngineError::Internal(anyhow!(
                "update of unknown remote relationship {id}"
            )));
        }
        table.insert(id.to_string(), row.clone());
        Ok(())
    }
}
