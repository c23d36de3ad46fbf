//! Entity records held by the local store
//!
//! Every record embeds a [`RecordMeta`]: the engine-generated local id, the
//! remote id assigned on first successful push, millisecond-epoch
//! created/updated timestamps, and the soft-delete tombstone.

use super::database::StoreState;
use crate::error::{EngineError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Current wall-clock time as millisecond epoch
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// ============================================================================
// Entity kinds
// ============================================================================

/// The entity kinds the store holds, one collection each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Workspace,
    Project,
    Workstream,
    Task,
    Relationship,
}

impl EntityKind {
    /// Processing order for sync passes: parents before children so foreign
    /// keys resolve within a single pass.
    pub const DEPENDENCY_ORDER: [EntityKind; 5] = [
        EntityKind::Workspace,
        EntityKind::Project,
        EntityKind::Workstream,
        EntityKind::Task,
        EntityKind::Relationship,
    ];

    /// Remote table name for this kind
    pub fn table(&self) -> &'static str {
        match self {
            Self::Workspace => "workspaces",
            Self::Project => "projects",
            Self::Workstream => "workstreams",
            Self::Task => "tasks",
            Self::Relationship => "relationships",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workspace => write!(f, "workspace"),
            Self::Project => write!(f, "project"),
            Self::Workstream => write!(f, "workstream"),
            Self::Task => write!(f, "task"),
            Self::Relationship => write!(f, "relationship"),
        }
    }
}

/// A typed reference to an entity, used by relationship endpoints.
/// Relationships are task↔task today but the endpoint stays typed so other
/// kinds can participate later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl EntityRef {
    /// Reference a task by local id
    pub fn task(id: Uuid) -> Self {
        Self {
            kind: EntityKind::Task,
            id,
        }
    }
}

// ============================================================================
// Record metadata
// ============================================================================

/// Metadata shared by every record in the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Local id, stable for the lifetime of the record
    pub id: Uuid,
    /// Remote id, assigned at most once on first push and never reassigned
    pub remote_id: Option<String>,
    /// Creation time, millisecond epoch
    pub created_at: i64,
    /// Last local mutation, millisecond epoch, strictly monotonic
    pub updated_at: i64,
    /// Soft-delete tombstone; deleted records stay reconcilable by sync
    #[serde(default)]
    pub deleted: bool,
}

impl RecordMeta {
    /// Fresh metadata for a locally created record
    pub fn new() -> Self {
        let now = now_ms();
        Self {
            id: Uuid::new_v4(),
            remote_id: None,
            created_at: now,
            updated_at: now,
            deleted: false,
        }
    }

    /// Metadata for a record materialized from a remote row during pull
    pub fn from_remote(remote_id: &str, created_at: i64, updated_at: i64, deleted: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            remote_id: Some(remote_id.to_string()),
            created_at,
            updated_at,
            deleted,
        }
    }

    /// Bump `updated_at`. Two mutations within the same millisecond still
    /// strictly increase.
    pub fn touch(&mut self) {
        self.updated_at = now_ms().max(self.updated_at + 1);
    }
}

impl Default for RecordMeta {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Status enums
// ============================================================================

/// Status of a project
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Paused,
    Completed,
    Archived,
}

impl Default for ProjectStatus {
    fn default() -> Self {
        Self::Active
    }
}

/// Status of a workstream
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkstreamStatus {
    Active,
    Completed,
    Archived,
}

impl Default for WorkstreamStatus {
    fn default() -> Self {
        Self::Active
    }
}

/// Status of a task
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
    Cancelled,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Todo
    }
}

/// Typed relationship between two tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipKind {
    Blocks,
    BlockedBy,
    RelatedTo,
}

impl RelationshipKind {
    /// The mirror kind stored on the opposite edge. `BLOCKS`/`BLOCKED_BY`
    /// are mutual inverses; `RELATED_TO` is its own mirror.
    pub fn inverse(&self) -> Self {
        match self {
            Self::Blocks => Self::BlockedBy,
            Self::BlockedBy => Self::Blocks,
            Self::RelatedTo => Self::RelatedTo,
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocks => write!(f, "BLOCKS"),
            Self::BlockedBy => write!(f, "BLOCKED_BY"),
            Self::RelatedTo => write!(f, "RELATED_TO"),
        }
    }
}

// ============================================================================
// Entity records
// ============================================================================

/// Root of the hierarchy; owns projects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    pub meta: RecordMeta,
    pub name: String,
    pub description: Option<String>,
}

/// A project inside a workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub meta: RecordMeta,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub workspace_id: Uuid,
}

/// A workstream grouping tasks inside a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkstreamRecord {
    pub meta: RecordMeta,
    pub name: String,
    pub description: Option<String>,
    pub status: WorkstreamStatus,
    /// Completion percentage, 0–100
    pub progress: u8,
    pub project_id: Uuid,
}

/// A task inside a project, optionally attached to a workstream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub meta: RecordMeta,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    /// Priority (higher = more important)
    pub priority: i32,
    pub project_id: Uuid,
    pub workstream_id: Option<Uuid>,
}

/// A typed directed edge between two tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub meta: RecordMeta,
    pub source: EntityRef,
    pub kind: RelationshipKind,
    pub target: EntityRef,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

// ============================================================================
// Record trait — shared store access for the typed collections
// ============================================================================

/// Behavior every stored record shares: metadata access, validation, and
/// projection onto its table inside [`StoreState`].
pub trait Record: Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn meta(&self) -> &RecordMeta;
    fn meta_mut(&mut self) -> &mut RecordMeta;

    /// Check required fields and parent references against the store
    fn validate(&self, state: &StoreState) -> Result<()>;

    fn table(state: &StoreState) -> &HashMap<Uuid, Self>;
    fn table_mut(state: &mut StoreState) -> &mut HashMap<Uuid, Self>;

    fn id(&self) -> Uuid {
        self.meta().id
    }

    fn is_deleted(&self) -> bool {
        self.meta().deleted
    }
}

impl Record for WorkspaceRecord {
    const KIND: EntityKind = EntityKind::Workspace;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn validate(&self, _state: &StoreState) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::validation("workspace name must not be empty"));
        }
        Ok(())
    }

    fn table(state: &StoreState) -> &HashMap<Uuid, Self> {
        &state.workspaces
    }

    fn table_mut(state: &mut StoreState) -> &mut HashMap<Uuid, Self> {
        &mut state.workspaces
    }
}

impl Record for ProjectRecord {
    const KIND: EntityKind = EntityKind::Project;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn validate(&self, state: &StoreState) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::validation("project name must not be empty"));
        }
        if !state.is_live(EntityKind::Workspace, self.workspace_id) {
            return Err(EngineError::validation(format!(
                "project references missing workspace {}",
                self.workspace_id
            )));
        }
        Ok(())
    }

    fn table(state: &StoreState) -> &HashMap<Uuid, Self> {
        &state.projects
    }

    fn table_mut(state: &mut StoreState) -> &mut HashMap<Uuid, Self> {
        &mut state.projects
    }
}

impl Record for WorkstreamRecord {
    const KIND: EntityKind = EntityKind::Workstream;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn validate(&self, state: &StoreState) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::validation("workstream name must not be empty"));
        }
        if self.progress > 100 {
            return Err(EngineError::validation(format!(
                "workstream progress {} out of range 0–100",
                self.progress
            )));
        }
        if !state.is_live(EntityKind::Project, self.project_id) {
            return Err(EngineError::validation(format!(
                "workstream references missing project {}",
                self.project_id
            )));
        }
        Ok(())
    }

    fn table(state: &StoreState) -> &HashMap<Uuid, Self> {
        &state.workstreams
    }

    fn table_mut(state: &mut StoreState) -> &mut HashMap<Uuid, Self> {
        &mut state.workstreams
    }
}

impl Record for TaskRecord {
    const KIND: EntityKind = EntityKind::Task;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn validate(&self, state: &StoreState) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(EngineError::validation("task title must not be empty"));
        }
        if !state.is_live(EntityKind::Project, self.project_id) {
            return Err(EngineError::validation(format!(
                "task references missing project {}",
                self.project_id
            )));
        }
        if let Some(ws) = self.workstream_id {
            if !state.is_live(EntityKind::Workstream, ws) {
                return Err(EngineError::validation(format!(
                    "task references missing workstream {}",
                    ws
                )));
            }
        }
        Ok(())
    }

    fn table(state: &StoreState) -> &HashMap<Uuid, Self> {
        &state.tasks
    }

    fn table_mut(state: &mut StoreState) -> &mut HashMap<Uuid, Self> {
        &mut state.tasks
    }
}

impl Record for RelationshipRecord {
    const KIND: EntityKind = EntityKind::Relationship;

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn validate(&self, state: &StoreState) -> Result<()> {
        if self.source.kind != EntityKind::Task || self.target.kind != EntityKind::Task {
            return Err(EngineError::validation(
                "relationships currently connect tasks only",
            ));
        }
        if self.source.id == self.target.id {
            return Err(EngineError::validation(format!(
                "self-referential {} relationship on task {}",
                self.kind, self.source.id
            )));
        }
        if !state.is_live(EntityKind::Task, self.source.id) {
            return Err(EngineError::validation(format!(
                "relationship source task {} does not resolve",
                self.source.id
            )));
        }
        if !state.is_live(EntityKind::Task, self.target.id) {
            return Err(EngineError::validation(format!(
                "relationship target task {} does not resolve",
                self.target.id
            )));
        }
        Ok(())
    }

    fn table(state: &StoreState) -> &HashMap<Uuid, Self> {
        &state.relationships
    }

    fn table_mut(state: &mut StoreState) -> &mut HashMap<Uuid, Self> {
        &mut state.relationships
    }
}
