//! Builder for the task context bundle
//!
//! Resolves a task's ancestor chain and relationship neighborhood into one
//! bundle under a single read snapshot. Strictly read-only: nothing it
//! touches gets an `updated_at` bump.

use super::models::{RelationshipNeighborhood, TaskContext, TaskSummary};
use crate::error::{EngineError, Result};
use crate::store::database::{Database, StoreState};
use crate::store::records::{EntityKind, RelationshipKind, TaskRecord};
use std::sync::Arc;
use uuid::Uuid;

/// Read-only traversal over the local store
pub struct ContextAssembler {
    db: Arc<Database>,
}

/// Resolve the live neighbor tasks reachable from `task_id` over edges of
/// `kind`. Dangling edges are omitted rather than failing the call.
fn neighbors(state: &StoreState, task_id: Uuid, kind: RelationshipKind) -> Vec<TaskSummary> {
    state
        .relationships
        .values()
        .filter(|r| !r.meta.deleted && r.source.id == task_id && r.kind == kind)
        .filter_map(|r| {
            state
                .tasks
                .get(&r.target.id)
                .filter(|t| !t.meta.deleted)
                .map(TaskSummary::of)
        })
        .collect()
}

fn live_task(state: &StoreState, id: Uuid) -> Option<&TaskRecord> {
    state.tasks.get(&id).filter(|t| !t.meta.deleted)
}

impl ContextAssembler {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Build the full context bundle for a task.
    ///
    /// The task, its project, and the project's workspace must resolve; a
    /// dangling reference anywhere in that chain is a data-integrity error
    /// surfaced as `NotFound`. A task without a workstream reference gets
    /// `workstream: None`.
    pub async fn task_context(&self, task_id: Uuid) -> Result<TaskContext> {
        self.db
            .read(|state| {
                let task = live_task(state, task_id)
                    .cloned()
                    .ok_or_else(|| EngineError::not_found(EntityKind::Task, task_id))?;

                let project = state
                    .projects
                    .get(&task.project_id)
                    .filter(|p| !p.meta.deleted)
                    .cloned()
                    .ok_or_else(|| {
                        EngineError::not_found(EntityKind::Project, task.project_id)
                    })?;

                let workspace = state
                    .workspaces
                    .get(&project.workspace_id)
                    .filter(|w| !w.meta.deleted)
                    .cloned()
                    .ok_or_else(|| {
                        EngineError::not_found(EntityKind::Workspace, project.workspace_id)
                    })?;

                // Optional tier: absence of the reference itself is not an
                // error, only a dangling one is.
                let workstream = match task.workstream_id {
                    Some(ws_id) => Some(
                        state
                            .workstreams
                            .get(&ws_id)
                            .filter(|w| !w.meta.deleted)
                            .cloned()
                            .ok_or_else(|| {
                                EngineError::not_found(EntityKind::Workstream, ws_id)
                            })?,
                    ),
                    None => None,
                };

                let relationships = RelationshipNeighborhood {
                    blocking: neighbors(state, task_id, RelationshipKind::Blocks),
                    blocked_by: neighbors(state, task_id, RelationshipKind::BlockedBy),
                    related: neighbors(state, task_id, RelationshipKind::RelatedTo),
                };

                Ok(TaskContext {
                    task,
                    project,
                    workspace,
                    workstream,
                    relationships,
                })
            })
            .await?
    }
}
