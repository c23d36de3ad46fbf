//! Typed collection handles over the store
//!
//! A [`Collection`] is a view of one entity kind: create, point lookup,
//! predicate query, scoped update, and soft delete. Every mutation routes
//! through [`Database::write`], so a multi-record operation composed inside
//! one write block applies atomically.

use super::database::Database;
use super::records::{Record, RecordMeta};
use crate::error::{EngineError, Result};
use std::marker::PhantomData;
use uuid::Uuid;

/// Typed handle for one entity kind
pub struct Collection<'db, R: Record> {
    db: &'db Database,
    _kind: PhantomData<R>,
}

impl<'db, R: Record> Collection<'db, R> {
    pub(crate) fn new(db: &'db Database) -> Self {
        Self {
            db,
            _kind: PhantomData,
        }
    }

    /// Create a record: allocate fresh metadata, run the initializer,
    /// validate, insert. Returns the stored record.
    pub async fn create(&self, init: impl FnOnce(RecordMeta) -> R) -> Result<R> {
        self.db
            .write(|state| {
                let record = init(RecordMeta::new());
                record.validate(state)?;
                R::table_mut(state).insert(record.id(), record.clone());
                Ok(record)
            })
            .await
    }

    /// Point lookup. Soft-deleted records are not found.
    pub async fn find(&self, id: Uuid) -> Result<R> {
        self.db
            .read(|state| {
                R::table(state)
                    .get(&id)
                    .filter(|r| !r.is_deleted())
                    .cloned()
                    .ok_or_else(|| EngineError::not_found(R::KIND, id))
            })
            .await?
    }

    /// Start a predicate query over the live records of this kind
    pub fn query(&self) -> QueryBuilder<'db, R> {
        QueryBuilder {
            db: self.db,
            predicates: Vec::new(),
        }
    }

    /// Scoped mutation of one record: the closure edits a copy, `updated_at`
    /// is bumped, the result is re-validated and swapped in atomically.
    pub async fn update(&self, id: Uuid, apply: impl FnOnce(&mut R)) -> Result<R> {
        self.db
            .write(|state| {
                let mut record = R::table(state)
                    .get(&id)
                    .filter(|r| !r.is_deleted())
                    .cloned()
                    .ok_or_else(|| EngineError::not_found(R::KIND, id))?;
                apply(&mut record);
                record.meta_mut().touch();
                record.validate(state)?;
                R::table_mut(state).insert(id, record.clone());
                Ok(record)
            })
            .await
    }

    /// Tombstone a record. The record stays in the store so the deletion can
    /// itself be synchronized.
    pub async fn mark_deleted(&self, id: Uuid) -> Result<()> {
        self.db
            .write(|state| {
                let record = R::table_mut(state)
                    .get_mut(&id)
                    .filter(|r| !r.is_deleted())
                    .ok_or_else(|| EngineError::not_found(R::KIND, id))?;
                record.meta_mut().deleted = true;
                record.meta_mut().touch();
                Ok(())
            })
            .await
    }
}

// ============================================================================
// QueryBuilder
// ============================================================================

/// Accumulates exact-match predicates; `fetch` applies them all over the
/// live records. No predicates means "all live records".
pub struct QueryBuilder<'db, R: Record> {
    db: &'db Database,
    predicates: Vec<Box<dyn Fn(&R) -> bool + Send>>,
}

impl<'db, R: Record> QueryBuilder<'db, R> {
    /// Add a predicate; chainable
    pub fn filter(mut self, pred: impl Fn(&R) -> bool + Send + 'static) -> Self {
        self.predicates.push(Box::new(pred));
        self
    }

    /// Run the query
    pub async fn fetch(self) -> Result<Vec<R>> {
        let predicates = self.predicates;
        self.db
            .read(move |state| {
                R::table(state)
                    .values()
                    .filter(|r| !r.is_deleted())
                    .filter(|r| predicates.iter().all(|p| p(r)))
                    .cloned()
                    .collect()
            })
            .await
    }
}
