//! Engine error taxonomy
//!
//! Structural errors (validation, not-found on direct access) propagate to
//! the immediate caller. Per-record sync errors are caught and logged by the
//! coordinator; only connectivity-level failures abort a sync pass.

use crate::store::records::EntityKind;
use thiserror::Error;
use uuid::Uuid;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine error type
#[derive(Debug, Error)]
pub enum EngineError {
    /// Required field missing or invariant violated at the point of mutation.
    /// Rejected synchronously; the caller must fix the input and retry.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Requested id does not resolve to a live (non-deleted) record.
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: Uuid },

    /// Remote insert collided with an existing remote record. Not an
    /// application error during push — it signals a prior pass already
    /// uploaded the record.
    #[error("remote conflict on {0}")]
    Conflict(String),

    /// The remote backend is unreachable (transport failure or timeout).
    #[error("remote backend unreachable: {0}")]
    Connectivity(String),

    /// A sync pass is already in flight; the call was rejected rather than
    /// queued.
    #[error("sync already in flight")]
    SyncInFlight,

    /// Anything unexpected from the lower layers.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    /// Shorthand for a validation failure
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Shorthand for a missing record
    pub fn not_found(kind: EntityKind, id: Uuid) -> Self {
        Self::NotFound { kind, id }
    }

    /// True for errors that abort an entire sync pass
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}
