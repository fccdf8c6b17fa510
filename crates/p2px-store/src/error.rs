//! Store error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Version conflict on {id}: expected {expected}, found {found}")]
    VersionConflict { id: String, expected: u64, found: u64 },

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Conflicts are retried on the next attempt rather than surfaced as faults.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. } | Self::DuplicateKey(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
