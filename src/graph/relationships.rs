//! Typed task-to-task relationship edges
//!
//! `BLOCKS`/`BLOCKED_BY` are maintained as a mutual pair and `RELATED_TO` is
//! symmetric. Both rows of a pair are written inside one store write block,
//! so no code path can observe an edge without its mirror.

use crate::error::{EngineError, Result};
use crate::store::database::{Database, StoreState};
use crate::store::records::{
    EntityRef, Record, RecordMeta, RelationshipKind, RelationshipRecord,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Graph layer enforcing the edge invariants
pub struct RelationshipGraph {
    db: Arc<Database>,
}

/// Find a live edge matching the exact (source, kind, target) triple
fn find_edge(
    state: &StoreState,
    source: Uuid,
    kind: RelationshipKind,
    target: Uuid,
) -> Option<RelationshipRecord> {
    state
        .relationships
        .values()
        .find(|r| {
            !r.meta.deleted && r.source.id == source && r.kind == kind && r.target.id == target
        })
        .cloned()
}

fn insert_edge(
    state: &mut StoreState,
    source: Uuid,
    kind: RelationshipKind,
    target: Uuid,
) -> Result<RelationshipRecord> {
    let record = RelationshipRecord {
        meta: RecordMeta::new(),
        source: EntityRef::task(source),
        kind,
        target: EntityRef::task(target),
        metadata: serde_json::Value::Null,
    };
    record.validate(state)?;
    state.relationships.insert(record.meta.id, record.clone());
    Ok(record)
}

impl RelationshipGraph {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a typed edge between two tasks, together with its mirror:
    /// `A BLOCKS B` implies `B BLOCKED_BY A`, `A RELATED_TO B` implies
    /// `B RELATED_TO A`. Creating an edge whose pair already exists is a
    /// no-op returning the existing primary edge.
    pub async fn create_edge(
        &self,
        source: Uuid,
        kind: RelationshipKind,
        target: Uuid,
    ) -> Result<RelationshipRecord> {
        self.db
            .write(|state| {
                if let Some(existing) = find_edge(state, source, kind, target) {
                    debug!(%source, %target, kind = %kind, "edge already exists");
                    return Ok(existing);
                }

                let primary = insert_edge(state, source, kind, target)?;

                // Mirror row: skip when a prior creation in the opposite
                // direction already produced it.
                let inverse = kind.inverse();
                if find_edge(state, target, inverse, source).is_none() {
                    insert_edge(state, target, inverse, source)?;
                }

                debug!(%source, %target, kind = %kind, "created edge pair");
                Ok(primary)
            })
            .await
    }

    /// Tombstone an edge and its mirror in one atomic block
    pub async fn delete_edge(&self, edge_id: Uuid) -> Result<()> {
        self.db
            .write(|state| {
                let edge = state
                    .relationships
                    .get(&edge_id)
                    .filter(|r| !r.meta.deleted)
                    .cloned()
                    .ok_or_else(|| {
                        EngineError::not_found(RelationshipRecord::KIND, edge_id)
                    })?;

                let mirror = find_edge(state, edge.target.id, edge.kind.inverse(), edge.source.id);

                if let Some(r) = state.relationships.get_mut(&edge_id) {
                    r.meta.deleted = true;
                    r.meta.touch();
                }
                if let Some(m) = mirror {
                    if let Some(r) = state.relationships.get_mut(&m.meta.id) {
                        r.meta.deleted = true;
                        r.meta.touch();
                    }
                }
                Ok(())
            })
            .await
    }

    /// Live outgoing edges of one kind from a task
    pub async fn edges_from(
        &self,
        task_id: Uuid,
        kind: RelationshipKind,
    ) -> Result<Vec<RelationshipRecord>> {
        self.db
            .read(|state| {
                state
                    .relationships
                    .values()
                    .filter(|r| !r.meta.deleted && r.source.id == task_id && r.kind == kind)
                    .cloned()
                    .collect()
            })
            .await
    }
}
