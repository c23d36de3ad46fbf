//! Wire rows for the remote relational backend
//!
//! One row struct per table, snake_case columns, ISO-8601 timestamps,
//! foreign keys as opaque string identifiers. Conversion to and from local
//! records is explicit so local-id ↔ remote-id mapping stays in the
//! coordinator where the correlation index lives.

use crate::store::records::{
    EntityKind, ProjectRecord, ProjectStatus, RelationshipKind, RelationshipRecord, TaskRecord,
    TaskStatus, WorkspaceRecord, WorkstreamRecord, WorkstreamStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Millisecond epoch → wire timestamp
pub fn ms_to_timestamp(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Wire timestamp → millisecond epoch
pub fn timestamp_to_ms(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub workspace_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkstreamRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: WorkstreamStatus,
    pub progress: u8,
    pub project_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: i32,
    pub project_id: String,
    #[serde(default)]
    pub workstream_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipRow {
    pub id: String,
    pub source_type: EntityKind,
    pub source_id: String,
    pub relationship_type: RelationshipKind,
    pub target_type: EntityKind,
    pub target_id: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted: bool,
}

// ============================================================================
// Record → row conversions (foreign keys already mapped to remote ids)
// ============================================================================

impl WorkspaceRow {
    pub fn from_record(record: &WorkspaceRecord, remote_id: &str) -> Self {
        Self {
            id: remote_id.to_string(),
            name: record.name.clone(),
            description: record.description.clone(),
            created_at: ms_to_timestamp(record.meta.created_at),
            updated_at: ms_to_timestamp(record.meta.updated_at),
            deleted: record.meta.deleted,
        }
    }
}

impl ProjectRow {
    pub fn from_record(record: &ProjectRecord, remote_id: &str, workspace_remote_id: &str) -> Self {
        Self {
            id: remote_id.to_string(),
            name: record.name.clone(),
            description: record.description.clone(),
            status: record.status,
            workspace_id: workspace_remote_id.to_string(),
            created_at: ms_to_timestamp(record.meta.created_at),
            updated_at: ms_to_timestamp(record.meta.updated_at),
            deleted: record.meta.deleted,
        }
    }
}

impl WorkstreamRow {
    pub fn from_record(
        record: &WorkstreamRecord,
        remote_id: &str,
        project_remote_id: &str,
    ) -> Self {
        Self {
            id: remote_id.to_string(),
            name: record.name.clone(),
            description: record.description.clone(),
            status: record.status,
            progress: record.progress,
            project_id: project_remote_id.to_string(),
            created_at: ms_to_timestamp(record.meta.created_at),
            updated_at: ms_to_timestamp(record.meta.updated_at),
            deleted: record.meta.deleted,
        }
    }
}

impl TaskRow {
    pub fn from_record(
        record: &TaskRecord,
        remote_id: &str,
        project_remote_id: &str,
        workstream_remote_id: Option<&str>,
    ) -> Self {
        Self {
            id: remote_id.to_string(),
            title: record.title.clone(),
            description: record.description.clone(),
            status: record.status,
            priority: record.priority,
            project_id: project_remote_id.to_string(),
            workstream_id: workstream_remote_id.map(str::to_string),
            created_at: ms_to_timestamp(record.meta.created_at),
            updated_at: ms_to_timestamp(record.meta.updated_at),
            deleted: record.meta.deleted,
        }
    }
}

impl RelationshipRow {
    pub fn from_record(
        record: &RelationshipRecord,
        remote_id: &str,
        source_remote_id: &str,
        target_remote_id: &str,
    ) -> Self {
        Self {
            id: remote_id.to_string(),
            source_type: record.source.kind,
            source_id: source_remote_id.to_string(),
            relationship_type: record.kind,
            target_type: record.target.kind,
            target_id: target_remote_id.to_string(),
            metadata: record.metadata.clone(),
            created_at: ms_to_timestamp(record.meta.created_at),
            updated_at: ms_to_timestamp(record.meta.updated_at),
            deleted: record.meta.deleted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::records::RecordMeta;

    #[test]
    fn test_workspace_row_columns_are_snake_case() {
        let record = WorkspaceRecord {
            meta: RecordMeta::new(),
            name: "W1".to_string(),
            description: Some("desc".to_string()),
        };
        let row = WorkspaceRow::from_record(&record, "r-1");
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["id"], "r-1");
        assert!(json.get("created_at").is_some());
        assert!(json.get("updated_at").is_some());
        // ISO-8601 text on the wire
        assert!(json["updated_at"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_timestamp_roundtrip_preserves_millis() {
        let ms = 1_722_470_400_123i64;
        assert_eq!(timestamp_to_ms(ms_to_timestamp(ms)), ms);
    }

    #[test]
    fn test_task_row_optional_workstream() {
        let json = r#"{
            "id": "t-1",
            "title": "T1",
            "status": "todo",
            "priority": 2,
            "project_id": "p-1",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:01Z"
        }"#;
        let row: TaskRow = serde_json::from_str(json).unwrap();
        assert!(row.workstream_id.is_none());
        assert!(!row.deleted);
        assert_eq!(row.status, TaskStatus::Todo);
    }

    #[test]
    fn test_relationship_row_wire_kinds() {
        let json = r#"{
            "id": "rel-1",
            "source_type": "task",
            "source_id": "t-1",
            "relationship_type": "BLOCKED_BY",
            "target_type": "task",
            "target_id": "t-2",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        }"#;
        let row: RelationshipRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.relationship_type, RelationshipKind::BlockedBy);
        assert_eq!(row.source_type, EntityKind::Task);
    }
}
