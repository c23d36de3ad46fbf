//! Bidirectional sync coordinator
//!
//! One `sync()` call runs push then pull, each walking the entity kinds in
//! dependency order (workspace, project, workstream, task, relationship) so
//! foreign keys resolve within a single pass.
//!
//! Push uploads records that have never been pushed or changed since the
//! last completed pass; a unique-key conflict means a prior pass already
//! uploaded the record and counts as success. Pull merges remote rows by
//! last-write-wins. Per-record failures are logged and skipped; only a
//! connectivity failure aborts the pass, leaving `last_sync` untouched so
//! the next pass re-selects the same records from local state alone.

use super::backend::RemoteBackend;
use super::wire::{
    timestamp_to_ms, ProjectRow, RelationshipRow, TaskRow, WorkspaceRow, WorkstreamRow,
};
use crate::error::{EngineError, Result};
use crate::store::database::{Database, StoreState};
use crate::store::records::{
    now_ms, EntityKind, EntityRef, ProjectRecord, Record, RecordMeta, RelationshipRecord,
    TaskRecord, WorkspaceRecord, WorkstreamRecord,
};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Counters for one pass, logged on completion
#[derive(Debug, Default, Clone, Copy)]
struct PassStats {
    pushed: usize,
    pulled_created: usize,
    pulled_updated: usize,
    skipped: usize,
}

/// A record needs pushing when it was never uploaded or changed since the
/// last completed pass.
fn needs_push(meta: &RecordMeta, since: i64) -> bool {
    meta.remote_id.is_none() || meta.updated_at > since
}

/// Coordinates push-then-pull reconciliation with the remote backend
pub struct SyncCoordinator {
    db: Arc<Database>,
    backend: Arc<dyn RemoteBackend>,
    /// Start time of the last completed pass, millisecond epoch; 0 = never
    last_sync_ms: AtomicI64,
    /// Single-flight guard: an overlapping `sync()` is rejected, never run
    /// concurrently (it would corrupt the correlation index and duplicate
    /// inserts).
    in_flight: Mutex<()>,
}

impl SyncCoordinator {
    pub fn new(db: Arc<Database>, backend: Arc<dyn RemoteBackend>) -> Self {
        Self {
            db,
            backend,
            last_sync_ms: AtomicI64::new(0),
            in_flight: Mutex::new(()),
        }
    }

    /// Millisecond epoch of the last completed pass, 0 if never synced
    pub fn last_sync_timestamp(&self) -> i64 {
        self.last_sync_ms.load(Ordering::SeqCst)
    }

    /// Run one push-then-pull pass.
    ///
    /// Returns `Ok(true)` when the pass completed (possibly with per-record
    /// skips), `Ok(false)` when the backend was unreachable — local data is
    /// untouched and `last_sync` keeps its previous value. A concurrent call
    /// fails with [`EngineError::SyncInFlight`].
    pub async fn sync(&self) -> Result<bool> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| EngineError::SyncInFlight)?;

        let started = now_ms();
        let since = self.last_sync_ms.load(Ordering::SeqCst);
        let mut stats = PassStats::default();

        match self.run_pass(since, &mut stats).await {
            Ok(()) => {
                self.last_sync_ms.store(started, Ordering::SeqCst);
                info!(
                    pushed = stats.pushed,
                    created = stats.pulled_created,
                    updated = stats.pulled_updated,
                    skipped = stats.skipped,
                    "sync pass completed"
                );
                Ok(true)
            }
            Err(EngineError::Connectivity(msg)) => {
                warn!("sync aborted, backend unreachable: {msg}");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn run_pass(&self, since: i64, stats: &mut PassStats) -> Result<()> {
        debug!(since, "sync pass: push phase");
        self.push_workspaces(since, stats).await?;
        self.push_projects(since, stats).await?;
        self.push_workstreams(since, stats).await?;
        self.push_tasks(since, stats).await?;
        self.push_relationships(since, stats).await?;

        debug!("sync pass: pull phase");
        self.pull_workspaces(stats).await?;
        self.pull_projects(stats).await?;
        self.pull_workstreams(stats).await?;
        self.pull_tasks(stats).await?;
        self.pull_relationships(stats).await?;
        Ok(())
    }

    // ========================================================================
    // Remote id assignment
    // ========================================================================

    /// Return the record's remote id, generating and persisting one if it
    /// was never assigned. The id is written back before the insert attempt
    /// so a retried pass reuses it and the remote unique key deduplicates.
    async fn ensure_remote_id<R: Record>(&self, id: Uuid) -> Result<String> {
        let candidate = Uuid::new_v4().to_string();
        self.db
            .write(move |state| {
                let existing = {
                    let record = R::table_mut(state)
                        .get_mut(&id)
                        .ok_or_else(|| EngineError::not_found(R::KIND, id))?;
                    match &record.meta().remote_id {
                        Some(rid) => Some(rid.clone()),
                        None => {
                            record.meta_mut().remote_id = Some(candidate.clone());
                            None
                        }
                    }
                };
                match existing {
                    Some(rid) => Ok(rid),
                    None => {
                        state.index_remote(R::KIND, &candidate, id);
                        Ok(candidate)
                    }
                }
            })
            .await
    }

    /// Insert for first-time uploads (conflict = already uploaded by a
    /// partial pass, success), update otherwise.
    fn use_insert(meta: &RecordMeta, since: i64) -> bool {
        meta.created_at > since || meta.remote_id.is_none()
    }

    // ========================================================================
    // Push — one function per kind, parents first
    // ========================================================================

    async fn push_workspaces(&self, since: i64, stats: &mut PassStats) -> Result<()> {
        let pending: Vec<WorkspaceRecord> = self
            .db
            .read(|s| {
                s.workspaces
                    .values()
                    .filter(|r| needs_push(&r.meta, since))
                    .cloned()
                    .collect()
            })
            .await?;

        for record in pending {
            let insert = Self::use_insert(&record.meta, since);
            let result = async {
                let remote_id = self.ensure_remote_id::<WorkspaceRecord>(record.meta.id).await?;
                let row = WorkspaceRow::from_record(&record, &remote_id);
                if insert {
                    match self.backend.insert_workspace(&row).await {
                        Err(EngineError::Conflict(_)) => {
                            debug!(workspace = %record.meta.id, "already uploaded, conflict treated as success");
                            Ok(())
                        }
                        other => other,
                    }
                } else {
                    self.backend.update_workspace(&remote_id, &row).await
                }
            }
            .await;

            match result {
                Ok(()) => stats.pushed += 1,
                Err(e) if e.is_connectivity() => return Err(e),
                Err(e) => {
                    warn!(workspace = %record.meta.id, "push skipped: {e}");
                    stats.skipped += 1;
                }
            }
        }
        Ok(())
    }

    async fn push_projects(&self, since: i64, stats: &mut PassStats) -> Result<()> {
        let pending: Vec<(ProjectRecord, Option<String>)> = self
            .db
            .read(|s| {
                s.projects
                    .values()
                    .filter(|r| needs_push(&r.meta, since))
                    .map(|r| {
                        let ws = s
                            .workspaces
                            .get(&r.workspace_id)
                            .and_then(|w| w.meta.remote_id.clone());
                        (r.clone(), ws)
                    })
                    .collect()
            })
            .await?;

        for (record, workspace_remote) in pending {
            let Some(workspace_remote) = workspace_remote else {
                warn!(project = %record.meta.id, "push skipped: workspace not uploaded yet");
                stats.skipped += 1;
                continue;
            };
            let insert = Self::use_insert(&record.meta, since);
            let result = async {
                let remote_id = self.ensure_remote_id::<ProjectRecord>(record.meta.id).await?;
                let row = ProjectRow::from_record(&record, &remote_id, &workspace_remote);
                if insert {
                    match self.backend.insert_project(&row).await {
                        Err(EngineError::Conflict(_)) => Ok(()),
                        other => other,
                    }
                } else {
                    self.backend.update_project(&remote_id, &row).await
                }
            }
            .await;

            match result {
                Ok(()) => stats.pushed += 1,
                Err(e) if e.is_connectivity() => return Err(e),
                Err(e) => {
                    warn!(project = %record.meta.id, "push skipped: {e}");
                    stats.skipped += 1;
                }
            }
        }
        Ok(())
    }

    async fn push_workstreams(&self, since: i64, stats: &mut PassStats) -> Result<()> {
        let pending: Vec<(WorkstreamRecord, Option<String>)> = self
            .db
            .read(|s| {
                s.workstreams
                    .values()
                    .filter(|r| needs_push(&r.meta, since))
                    .map(|r| {
                        let project = s
                            .projects
                            .get(&r.project_id)
                            .and_then(|p| p.meta.remote_id.clone());
                        (r.clone(), project)
                    })
                    .collect()
            })
            .await?;

        for (record, project_remote) in pending {
            let Some(project_remote) = project_remote else {
                warn!(workstream = %record.meta.id, "push skipped: project not uploaded yet");
                stats.skipped += 1;
                continue;
            };
            let insert = Self::use_insert(&record.meta, since);
            let result = async {
                let remote_id = self
                    .ensure_remote_id::<WorkstreamRecord>(record.meta.id)
                    .await?;
                let row = WorkstreamRow::from_record(&record, &remote_id, &project_remote);
                if insert {
                    match self.backend.insert_workstream(&row).await {
                        Err(EngineError::Conflict(_)) => Ok(()),
                        other => other,
                    }
                } else {
                    self.backend.update_workstream(&remote_id, &row).await
                }
            }
            .await;

            match result {
                Ok(()) => stats.pushed += 1,
                Err(e) if e.is_connectivity() => return Err(e),
                Err(e) => {
                    warn!(workstream = %record.meta.id, "push skipped: {e}");
                    stats.skipped += 1;
                }
            }
        }
        Ok(())
    }

    async fn push_tasks(&self, since: i64, stats: &mut PassStats) -> Result<()> {
        // (record, project remote id, workstream remote id if referenced)
        type Pending = (TaskRecord, Option<String>, Option<Option<String>>);
        let pending: Vec<Pending> = self
            .db
            .read(|s| {
                s.tasks
                    .values()
                    .filter(|r| needs_push(&r.meta, since))
                    .map(|r| {
                        let project = s
                            .projects
                            .get(&r.project_id)
                            .and_then(|p| p.meta.remote_id.clone());
                        let workstream = r.workstream_id.map(|ws| {
                            s.workstreams
                                .get(&ws)
                                .and_then(|w| w.meta.remote_id.clone())
                        });
                        (r.clone(), project, workstream)
                    })
                    .collect()
            })
            .await?;

        for (record, project_remote, workstream_remote) in pending {
            let Some(project_remote) = project_remote else {
                warn!(task = %record.meta.id, "push skipped: project not uploaded yet");
                stats.skipped += 1;
                continue;
            };
            // A referenced workstream must itself be uploaded first
            let workstream_remote = match workstream_remote {
                Some(None) => {
                    warn!(task = %record.meta.id, "push skipped: workstream not uploaded yet");
                    stats.skipped += 1;
                    continue;
                }
                Some(Some(ws)) => Some(ws),
                None => None,
            };
            let insert = Self::use_insert(&record.meta, since);
            let result = async {
                let remote_id = self.ensure_remote_id::<TaskRecord>(record.meta.id).await?;
                let row = TaskRow::from_record(
                    &record,
                    &remote_id,
                    &project_remote,
                    workstream_remote.as_deref(),
                );
                if insert {
                    match self.backend.insert_task(&row).await {
                        Err(EngineError::Conflict(_)) => Ok(()),
                        other => other,
                    }
                } else {
                    self.backend.update_task(&remote_id, &row).await
                }
            }
            .await;

            match result {
                Ok(()) => stats.pushed += 1,
                Err(e) if e.is_connectivity() => return Err(e),
                Err(e) => {
                    warn!(task = %record.meta.id, "push skipped: {e}");
                    stats.skipped += 1;
                }
            }
        }
        Ok(())
    }

    async fn push_relationships(&self, since: i64, stats: &mut PassStats) -> Result<()> {
        let pending: Vec<(RelationshipRecord, Option<String>, Option<String>)> = self
            .db
            .read(|s| {
                s.relationships
                    .values()
                    .filter(|r| needs_push(&r.meta, since))
                    .map(|r| {
                        let source = s
                            .tasks
                            .get(&r.source.id)
                            .and_then(|t| t.meta.remote_id.clone());
                        let target = s
                            .tasks
                            .get(&r.target.id)
                            .and_then(|t| t.meta.remote_id.clone());
                        (r.clone(), source, target)
                    })
                    .collect()
            })
            .await?;

        for (record, source_remote, target_remote) in pending {
            let (Some(source_remote), Some(target_remote)) = (source_remote, target_remote) else {
                warn!(relationship = %record.meta.id, "push skipped: endpoint task not uploaded yet");
                stats.skipped += 1;
                continue;
            };
            let insert = Self::use_insert(&record.meta, since);
            let result = async {
                let remote_id = self
                    .ensure_remote_id::<RelationshipRecord>(record.meta.id)
                    .await?;
                let row = RelationshipRow::from_record(
                    &record,
                    &remote_id,
                    &source_remote,
                    &target_remote,
                );
                if insert {
                    match self.backend.insert_relationship(&row).await {
                        Err(EngineError::Conflict(_)) => Ok(()),
                        other => other,
                    }
                } else {
                    self.backend.update_relationship(&remote_id, &row).await
                }
            }
            .await;

            match result {
                Ok(()) => stats.pushed += 1,
                Err(e) if e.is_connectivity() => return Err(e),
                Err(e) => {
                    warn!(relationship = %record.meta.id, "push skipped: {e}");
                    stats.skipped += 1;
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Pull — one function per kind, same order; each kind applies atomically
    // ========================================================================

    async fn pull_workspaces(&self, stats: &mut PassStats) -> Result<()> {
        let rows = self.backend.fetch_workspaces().await?;
        let counts = self
            .db
            .write(|state| {
                let mut c = PullCounts::default();
                for row in &rows {
                    apply_workspace_row(state, row, &mut c);
                }
                Ok(c)
            })
            .await?;
        counts.fold_into(stats);
        Ok(())
    }

    async fn pull_projects(&self, stats: &mut PassStats) -> Result<()> {
        let rows = self.backend.fetch_projects().await?;
        let counts = self
            .db
            .write(|state| {
                let mut c = PullCounts::default();
                for row in &rows {
                    apply_project_row(state, row, &mut c);
                }
                Ok(c)
            })
            .await?;
        counts.fold_into(stats);
        Ok(())
    }

    async fn pull_workstreams(&self, stats: &mut PassStats) -> Result<()> {
        let rows = self.backend.fetch_workstreams().await?;
        let counts = self
            .db
            .write(|state| {
                let mut c = PullCounts::default();
                for row in &rows {
                    apply_workstream_row(state, row, &mut c);
                }
                Ok(c)
            })
            .await?;
        counts.fold_into(stats);
        Ok(())
    }

    async fn pull_tasks(&self, stats: &mut PassStats) -> Result<()> {
        let rows = self.backend.fetch_tasks().await?;
        let counts = self
            .db
            .write(|state| {
                let mut c = PullCounts::default();
                for row in &rows {
                    apply_task_row(state, row, &mut c);
                }
                Ok(c)
            })
            .await?;
        counts.fold_into(stats);
        Ok(())
    }

    async fn pull_relationships(&self, stats: &mut PassStats) -> Result<()> {
        let rows = self.backend.fetch_relationships().await?;
        let counts = self
            .db
            .write(|state| {
                let mut c = PullCounts::default();
                for row in &rows {
                    apply_relationship_row(state, row, &mut c);
                }
                Ok(c)
            })
            .await?;
        counts.fold_into(stats);
        Ok(())
    }
}

// ============================================================================
// Row application (pull merge)
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
struct PullCounts {
    created: usize,
    updated: usize,
    skipped: usize,
}

impl PullCounts {
    fn fold_into(self, stats: &mut PassStats) {
        stats.pulled_created += self.created;
        stats.pulled_updated += self.updated;
        stats.skipped += self.skipped;
    }
}

/// Resolve a remote id to an existing local record id: durable index first,
/// then a scan of the table as a fallback (and repair the index on a hit).
fn resolve_local<R: Record>(state: &mut StoreState, remote_id: &str) -> Option<Uuid> {
    if let Some(id) = state.resolve_remote(R::KIND, remote_id) {
        if R::table(state).contains_key(&id) {
            return Some(id);
        }
    }
    let found = R::table(state)
        .values()
        .find(|r| r.meta().remote_id.as_deref() == Some(remote_id))
        .map(|r| r.id());
    if let Some(id) = found {
        state.index_remote(R::KIND, remote_id, id);
    }
    found
}

/// Remote wins only when strictly newer (last-write-wins)
fn remote_wins(local: &RecordMeta, remote_updated_ms: i64) -> bool {
    remote_updated_ms > local.updated_at
}

fn apply_workspace_row(state: &mut StoreState, row: &WorkspaceRow, c: &mut PullCounts) {
    let remote_ms = timestamp_to_ms(row.updated_at);
    match resolve_local::<WorkspaceRecord>(state, &row.id) {
        Some(local_id) => {
            if let Some(record) = state.workspaces.get_mut(&local_id) {
                if remote_wins(&record.meta, remote_ms) {
                    record.name = row.name.clone();
                    record.description = row.description.clone();
                    record.meta.deleted = row.deleted;
                    record.meta.updated_at = remote_ms;
                    c.updated += 1;
                }
            }
        }
        None => {
            let meta = RecordMeta::from_remote(
                &row.id,
                timestamp_to_ms(row.created_at),
                remote_ms,
                row.deleted,
            );
            let local_id = meta.id;
            state.workspaces.insert(
                local_id,
                WorkspaceRecord {
                    meta,
                    name: row.name.clone(),
                    description: row.description.clone(),
                },
            );
            state.index_remote(EntityKind::Workspace, &row.id, local_id);
            c.created += 1;
        }
    }
}

fn apply_project_row(state: &mut StoreState, row: &ProjectRow, c: &mut PullCounts) {
    let remote_ms = timestamp_to_ms(row.updated_at);
    let Some(workspace_id) = resolve_local::<WorkspaceRecord>(state, &row.workspace_id) else {
        warn!(project = %row.id, "pull skipped: workspace {} not resolvable", row.workspace_id);
        c.skipped += 1;
        return;
    };
    match resolve_local::<ProjectRecord>(state, &row.id) {
        Some(local_id) => {
            if let Some(record) = state.projects.get_mut(&local_id) {
                if remote_wins(&record.meta, remote_ms) {
                    record.name = row.name.clone();
                    record.description = row.description.clone();
                    record.status = row.status;
                    record.workspace_id = workspace_id;
                    record.meta.deleted = row.deleted;
                    record.meta.updated_at = remote_ms;
                    c.updated += 1;
                }
            }
        }
        None => {
            let meta = RecordMeta::from_remote(
                &row.id,
                timestamp_to_ms(row.created_at),
                remote_ms,
                row.deleted,
            );
            let local_id = meta.id;
            state.projects.insert(
                local_id,
                ProjectRecord {
                    meta,
                    name: row.name.clone(),
                    description: row.description.clone(),
                    status: row.status,
                    workspace_id,
                },
            );
            state.index_remote(EntityKind::Project, &row.id, local_id);
            c.created += 1;
        }
    }
}

fn apply_workstream_row(state: &mut StoreState, row: &WorkstreamRow, c: &mut PullCounts) {
    let remote_ms = timestamp_to_ms(row.updated_at);
    let Some(project_id) = resolve_local::<ProjectRecord>(state, &row.project_id) else {
        warn!(workstream = %row.id, "pull skipped: project {} not resolvable", row.project_id);
        c.skipped += 1;
        return;
    };
    match resolve_local::<WorkstreamRecord>(state, &row.id) {
        Some(local_id) => {
            if let Some(record) = state.workstreams.get_mut(&local_id) {
                if remote_wins(&record.meta, remote_ms) {
                    record.name = row.name.clone();
                    record.description = row.description.clone();
                    record.status = row.status;
                    record.progress = row.progress.min(100);
                    record.project_id = project_id;
                    record.meta.deleted = row.deleted;
                    record.meta.updated_at = remote_ms;
                    c.updated += 1;
                }
            }
        }
        None => {
            let meta = RecordMeta::from_remote(
                &row.id,
                timestamp_to_ms(row.created_at),
                remote_ms,
                row.deleted,
            );
            let local_id = meta.id;
            state.workstreams.insert(
                local_id,
                WorkstreamRecord {
                    meta,
                    name: row.name.clone(),
                    description: row.description.clone(),
                    status: row.status,
                    progress: row.progress.min(100),
                    project_id,
                },
            );
            state.index_remote(EntityKind::Workstream, &row.id, local_id);
            c.created += 1;
        }
    }
}

fn apply_task_row(state: &mut StoreState, row: &TaskRow, c: &mut PullCounts) {
    let remote_ms = timestamp_to_ms(row.updated_at);
    let Some(project_id) = resolve_local::<ProjectRecord>(state, &row.project_id) else {
        warn!(task = %row.id, "pull skipped: project {} not resolvable", row.project_id);
        c.skipped += 1;
        return;
    };
    let workstream_id = match &row.workstream_id {
        Some(ws_remote) => match resolve_local::<WorkstreamRecord>(state, ws_remote) {
            Some(id) => Some(id),
            None => {
                warn!(task = %row.id, "pull skipped: workstream {ws_remote} not resolvable");
                c.skipped += 1;
                return;
            }
        },
        None => None,
    };
    match resolve_local::<TaskRecord>(state, &row.id) {
        Some(local_id) => {
            if let Some(record) = state.tasks.get_mut(&local_id) {
                if remote_wins(&record.meta, remote_ms) {
                    record.title = row.title.clone();
                    record.description = row.description.clone();
                    record.status = row.status;
                    record.priority = row.priority;
                    record.project_id = project_id;
                    record.workstream_id = workstream_id;
                    record.meta.deleted = row.deleted;
                    record.meta.updated_at = remote_ms;
                    c.updated += 1;
                }
            }
        }
        None => {
            let meta = RecordMeta::from_remote(
                &row.id,
                timestamp_to_ms(row.created_at),
                remote_ms,
                row.deleted,
            );
            let local_id = meta.id;
            state.tasks.insert(
                local_id,
                TaskRecord {
                    meta,
                    title: row.title.clone(),
                    description: row.description.clone(),
                    status: row.status,
                    priority: row.priority,
                    project_id,
                    workstream_id,
                },
            );
            state.index_remote(EntityKind::Task, &row.id, local_id);
            c.created += 1;
        }
    }
}

fn apply_relationship_row(state: &mut StoreState, row: &RelationshipRow, c: &mut PullCounts) {
    let remote_ms = timestamp_to_ms(row.updated_at);
    let Some(source_id) = resolve_local::<TaskRecord>(state, &row.source_id) else {
        warn!(relationship = %row.id, "pull skipped: source task {} not resolvable", row.source_id);
        c.skipped += 1;
        return;
    };
    let Some(target_id) = resolve_local::<TaskRecord>(state, &row.target_id) else {
        warn!(relationship = %row.id, "pull skipped: target task {} not resolvable", row.target_id);
        c.skipped += 1;
        return;
    };
    match resolve_local::<RelationshipRecord>(state, &row.id) {
        Some(local_id) => {
            if let Some(record) = state.relationships.get_mut(&local_id) {
                if remote_wins(&record.meta, remote_ms) {
                    record.source = EntityRef::task(source_id);
                    record.kind = row.relationship_type;
                    record.target = EntityRef::task(target_id);
                    record.metadata = row.metadata.clone();
                    record.meta.deleted = row.deleted;
                    record.meta.updated_at = remote_ms;
                    c.updated += 1;
                }
            }
        }
        None => {
            let meta = RecordMeta::from_remote(
                &row.id,
                timestamp_to_ms(row.created_at),
                remote_ms,
                row.deleted,
            );
            let local_id = meta.id;
            state.relationships.insert(
                local_id,
                RelationshipRecord {
                    meta,
                    source: EntityRef::task(source_id),
                    kind: row.relationship_type,
                    target: EntityRef::task(target_id),
                    metadata: row.metadata.clone(),
                },
            );
            state.index_remote(EntityKind::Relationship, &row.id, local_id);
            c.created += 1;
        }
    }
}
