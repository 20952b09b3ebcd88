//! Engine error taxonomy.
//!
//! Every failure surfaces as a typed error - an illegal transition is never
//! downgraded to a no-op, and a multi-row mutation that fails partway is
//! rolled back by the store before the error reaches the caller.

use thiserror::Error;

use crate::store::RepositoryError;

/// Engine-level error type.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An entity id does not resolve within the tenant's scope.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Aggregation or window lookup was requested for an unknown tenant.
    #[error("Tenant not found: {0}")]
    TenantNotFound(String),

    /// A status change outside the defined state-machine edges.
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// Status the entity is currently in.
        from: String,
        /// Status that was requested.
        to: String,
    },

    /// A reposition target outside `[1, count]`.
    #[error("Invalid position: {given} (queue holds positions 1..={max})")]
    InvalidPosition {
        /// Position that was requested.
        given: i32,
        /// Highest currently valid position.
        max: i32,
    },

    /// Malformed input: negative duration, non-positive price, missing
    /// required field.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The store detected a lost update during a guarded mutation.
    #[error("Concurrent update conflict")]
    ConcurrencyConflict,

    /// Backend storage failure.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Result type alias for `EngineError`.
pub type Result<T> = std::result::Result<T, EngineError>;
