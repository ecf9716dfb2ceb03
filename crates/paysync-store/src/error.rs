//! Error types for paysync storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// A record with the same id or the same external key already exists.
    #[error("duplicate {entity}: {key}")]
    Duplicate {
        /// Kind of record.
        entity: &'static str,
        /// The conflicting key.
        key: String,
    },

    /// The stored record moved on since it was read.
    #[error("version conflict on {entity} {id}: expected {expected}, found {actual}")]
    VersionConflict {
        /// Kind of record.
        entity: &'static str,
        /// Internal id.
        id: String,
        /// Version the writer read.
        expected: i64,
        /// Version currently stored.
        actual: i64,
    },

    /// The record cannot be stored as given.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl StoreError {
    /// Whether this is a unique-key violation.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }

    /// Whether this is an optimistic version mismatch.
    #[must_use]
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}
