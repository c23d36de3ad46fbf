//! Context bundle DTOs

use crate::store::records::{
    ProjectRecord, TaskRecord, TaskStatus, WorkspaceRecord, WorkstreamRecord,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The hierarchical + relational snapshot assembled for a single task,
/// consumed downstream for agent prompt construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskContext {
    /// The task itself
    pub task: TaskRecord,

    /// Its project (a dangling project reference is a data-integrity error)
    pub project: ProjectRecord,

    /// The project's workspace
    pub workspace: WorkspaceRecord,

    /// The task's workstream, when it references one
    pub workstream: Option<WorkstreamRecord>,

    /// Relationship neighborhood of the task
    pub relationships: RelationshipNeighborhood,
}

/// Neighbor tasks grouped by relationship kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationshipNeighborhood {
    /// Tasks this task blocks
    pub blocking: Vec<TaskSummary>,
    /// Tasks blocking this task
    pub blocked_by: Vec<TaskSummary>,
    /// Tasks related to this task
    pub related: Vec<TaskSummary>,
}

/// Lightweight reference to a neighbor task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: Uuid,
    pub title: String,
    pub status: TaskStatus,
}

impl TaskSummary {
    pub fn of(task: &TaskRecord) -> Self {
        Self {
            id: task.meta.id,
            title: task.title.clone(),
            status: task.status,
        }
    }
}
