//! Domain error taxonomy shared across crates.

use crate::types::Id;

/// A domain-level error.
///
/// Lock contention is deliberately *not* an error variant: a denied lock is
/// an expected outcome the caller must branch on, so the lock registry
/// returns it as data. [`CoreError::Conflict`] covers the remaining cases
/// (stale-version writes, duplicate active sessions).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The referenced row does not exist (unknown session, participant,
    /// lock, connection).
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: Id },

    /// Malformed input: bad message envelope, out-of-range field path,
    /// unknown enum string.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation contradicts current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing or invalid credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The caller's role does not permit the requested mutation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// An unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for the common not-found case.
    pub fn not_found(entity: &'static str, id: Id) -> Self {
        Self::NotFound { entity, id }
    }
}
