//! Embedded local store: typed records, collections, and the staged-write
//! database.

pub mod collection;
pub mod database;
pub mod records;

pub use collection::{Collection, QueryBuilder};
pub use database::{Database, StoreState};
pub use records::{
    EntityKind, EntityRef, ProjectRecord, ProjectStatus, Record, RecordMeta, RelationshipKind,
    RelationshipRecord, TaskRecord, TaskStatus, WorkspaceRecord, WorkstreamRecord,
    WorkstreamStatus,
};
