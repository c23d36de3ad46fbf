//! REST implementation of [`RemoteBackend`]
//!
//! Talks to a PostgREST-style interface: one route per table, filtered
//! updates via `?id=eq.<id>`, api-key plus bearer auth headers. The client
//! carries a per-request timeout; expiry and transport failures surface as
//! `Connectivity`, a 409 on insert as `Conflict`.

use super::backend::RemoteBackend;
use super::wire::{ProjectRow, RelationshipRow, TaskRow, WorkspaceRow, WorkstreamRow};
use crate::error::{EngineError, Result};
use crate::store::records::EntityKind;
use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// REST client for the remote relational backend
pub struct RestBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestBackend {
    /// Build a client with a per-request timeout
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Internal(anyhow!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn table_url(&self, kind: EntityKind) -> String {
        format!("{}/{}", self.base_url, kind.table())
    }

    fn transport(kind: EntityKind, e: reqwest::Error) -> EngineError {
        EngineError::Connectivity(format!("{}: {e}", kind.table()))
    }

    async fn fetch_all<T: DeserializeOwned>(&self, kind: EntityKind) -> Result<Vec<T>> {
        let resp = self
            .client
            .get(self.table_url(kind))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| Self::transport(kind, e))?;

        // A fetch covers a whole table; anything but success means the pull
        // phase cannot proceed for this pass.
        if !resp.status().is_success() {
            return Err(EngineError::Connectivity(format!(
                "{} fetch returned HTTP {}",
                kind.table(),
                resp.status()
            )));
        }

        resp.json::<Vec<T>>()
            .await
            .map_err(|e| Self::transport(kind, e))
    }

    async fn insert<T: Serialize + Sync>(&self, kind: EntityKind, row: &T) -> Result<()> {
        let resp = self
            .client
            .post(self.table_url(kind))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .json(row)
            .send()
            .await
            .map_err(|e| Self::transport(kind, e))?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(EngineError::Conflict(kind.table().to_string())),
            s => Err(EngineError::Internal(anyhow!(
                "{} insert returned HTTP {s}",
                kind.table()
            ))),
        }
    }

    async fn update<T: Serialize + Sync>(&self, kind: EntityKind, id: &str, row: &T) -> Result<()> {
        let url = format!("{}?id=eq.{id}", self.table_url(kind));
        let resp = self
            .client
            .patch(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .json(row)
            .send()
            .await
            .map_err(|e| Self::transport(kind, e))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(EngineError::Internal(anyhow!(
                "{} update of {id} returned HTTP {}",
                kind.table(),
                resp.status()
            )))
        }
    }
}

#[async_trait]
impl RemoteBackend for RestBackend {
    async fn fetch_workspaces(&self) -> Result<Vec<WorkspaceRow>> {
        self.fetch_all(EntityKind::Workspace).await
    }

    async fn insert_workspace(&self, row: &WorkspaceRow) -> Result<()> {
        self.insert(EntityKind::Workspace, row).await
    }

    async fn update_workspace(&self, id: &str, row: &WorkspaceRow) -> Result<()> {
        self.update(EntityKind::Workspace, id, row).await
    }

    async fn fetch_projects(&self) -> Result<Vec<ProjectRow>> {
        self.fetch_all(EntityKind::Project).await
    }

    async fn insert_project(&self, row: &ProjectRow) -> Result<()> {
        self.insert(EntityKind::Project, row).await
    }

    async fn update_project(&self, id: &str, row: &ProjectRow) -> Result<()> {
        self.update(EntityKind::Project, id, row).await
    }

    async fn fetch_workstreams(&self) -> Result<Vec<WorkstreamRow>> {
        self.fetch_all(EntityKind::Workstream).await
    }

    async fn insert_workstream(&self, row: &WorkstreamRow) -> Result<()> {
        self.insert(EntityKind::Workstream, row).await
    }

    async fn update_workstream(&self, id: &str, row: &WorkstreamRow) -> Result<()> {
        self.update(EntityKind::Workstream, id, row).await
    }

    async fn fetch_tasks(&self) -> Result<Vec<TaskRow>> {
        self.fetch_all(EntityKind::Task).await
    }

    async fn insert_task(&self, row: &TaskRow) -> Result<()> {
        self.insert(EntityKind::Task, row).await
    }

    async fn update_task(&self, id: &str, row: &TaskRow) -> Result<()> {
        self.update(EntityKind::Task, id, row).await
    }

    async fn fetch_relationships(&self) -> Result<Vec<RelationshipRow>> {
        self.fetch_all(EntityKind::Relationship).await
    }

    async fn insert_relationship(&self, row: &RelationshipRow) -> Result<()> {
        self.insert(EntityKind::Relationship, row).await
    }

    async fn update_relationship(&self, id: &str, row: &RelationshipRow) -> Result<()> {
        self.update(EntityKind::Relationship, id, row).await
    }
}
