//! Embedded collection store
//!
//! [`Database`] is an explicitly constructed store object with an
//! open/close lifecycle, passed by reference to the sync coordinator and
//! context assembler. All state lives in a single [`StoreState`] behind a
//! `tokio::sync::RwLock`; collections are typed views over it.
//!
//! Writes go through [`Database::write`]: the closure mutates a staged clone
//! of the state, and the clone replaces the live state only when the whole
//! block completes without error. A failing block leaves the store untouched.

use super::collection::Collection;
use super::records::{
    EntityKind, ProjectRecord, Record, RelationshipRecord, TaskRecord, WorkspaceRecord,
    WorkstreamRecord,
};
use crate::error::{EngineError, Result};
use anyhow::anyhow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

// ============================================================================
// StoreState — one table per entity kind plus the remote-id index
// ============================================================================

/// The full store contents. Cloneable so a write scope can stage against a
/// shadow copy and commit by swap.
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub(crate) workspaces: HashMap<Uuid, WorkspaceRecord>,
    pub(crate) projects: HashMap<Uuid, ProjectRecord>,
    pub(crate) workstreams: HashMap<Uuid, WorkstreamRecord>,
    pub(crate) tasks: HashMap<Uuid, TaskRecord>,
    pub(crate) relationships: HashMap<Uuid, RelationshipRecord>,
    /// Durable remote-id → local-id correlation, maintained by push (on id
    /// assignment) and pull (on match/create) so references to entities not
    /// touched in the current pass still resolve.
    pub(crate) remote_index: HashMap<(EntityKind, String), Uuid>,
}

impl StoreState {
    /// True when `id` resolves to an existing, non-deleted record of `kind`
    pub fn is_live(&self, kind: EntityKind, id: Uuid) -> bool {
        match kind {
            EntityKind::Workspace => self.workspaces.get(&id).is_some_and(|r| !r.meta.deleted),
            EntityKind::Project => self.projects.get(&id).is_some_and(|r| !r.meta.deleted),
            EntityKind::Workstream => self.workstreams.get(&id).is_some_and(|r| !r.meta.deleted),
            EntityKind::Task => self.tasks.get(&id).is_some_and(|r| !r.meta.deleted),
            EntityKind::Relationship => {
                self.relationships.get(&id).is_some_and(|r| !r.meta.deleted)
            }
        }
    }

    /// Resolve a remote id to its local record id through the durable index
    pub fn resolve_remote(&self, kind: EntityKind, remote_id: &str) -> Option<Uuid> {
        self.remote_index
            .get(&(kind, remote_id.to_string()))
            .copied()
    }

    /// Register a remote-id correlation
    pub fn index_remote(&mut self, kind: EntityKind, remote_id: &str, local_id: Uuid) {
        self.remote_index
            .insert((kind, remote_id.to_string()), local_id);
    }
}

// ============================================================================
// Database
// ============================================================================

/// The embedded store. Shared via `Arc`; single-writer by construction (the
/// UI thread owns mutations, sync batches its own writes).
pub struct Database {
    state: RwLock<StoreState>,
    closed: AtomicBool,
}

impl Database {
    /// Open an empty store
    pub fn open() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            closed: AtomicBool::new(false),
        }
    }

    /// Close the store. Later reads and writes fail; the data itself is kept
    /// until drop so in-flight readers finish cleanly.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineError::Internal(anyhow!("database is closed")));
        }
        Ok(())
    }

    /// Run a read-only closure against the current state
    pub async fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> Result<T> {
        self.check_open()?;
        let guard = self.state.read().await;
        Ok(f(&guard))
    }

    /// Scoped mutation block. The closure mutates a staged clone of the
    /// state; the clone is committed only if the closure returns `Ok`,
    /// otherwise it is discarded and the store is left unchanged.
    pub async fn write<T>(&self, f: impl FnOnce(&mut StoreState) -> Result<T>) -> Result<T> {
        self.check_open()?;
        let mut guard = self.state.write().await;
        let mut staged = guard.clone();
        let out = f(&mut staged)?;
        *guard = staged;
        Ok(out)
    }

    // ========================================================================
    // Typed collection handles
    // ========================================================================

    pub fn workspaces(&self) -> Collection<'_, WorkspaceRecord> {
        Collection::new(self)
    }

    pub fn projects(&self) -> Collection<'_, ProjectRecord> {
        Collection::new(self)
    }

    pub fn workstreams(&self) -> Collection<'_, WorkstreamRecord> {
        Collection::new(self)
    }

    pub fn tasks(&self) -> Collection<'_, TaskRecord> {
        Collection::new(self)
    }

    pub fn relationships(&self) -> Collection<'_, RelationshipRecord> {
        Collection::new(self)
    }

    /// Generic handle, used by code written against the [`Record`] trait
    pub fn collection<R: Record>(&self) -> Collection<'_, R> {
        Collection::new(self)
    }
}
