//! Storage error types.

use trace_core::validation::ValidationError;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested entity was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g., "record", "status").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// A record or filter failed validation before reaching the database.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A protected record is still referenced and cannot be deleted.
    #[error("cannot delete {entity} {id}: {reason}")]
    ReferentialIntegrity {
        /// The kind of entity being deleted.
        entity: String,
        /// The identifier of the protected entity.
        id: String,
        /// What still references it.
        reason: String,
    },

    /// A record references a status that belongs to another owner type.
    #[error("status {status_id} belongs to {status_owner}, not {record_owner}")]
    StatusOwnerMismatch {
        status_id: String,
        status_owner: String,
        record_owner: String,
    },

    /// A walk over parent links revisited a record.
    #[error("cycle detected at record {node_id}")]
    CycleDetected {
        /// The first record seen twice.
        node_id: String,
    },

    /// The database is locked by another process.
    #[error("database locked: {0}")]
    DatabaseLocked(String),

    /// Failed to establish or maintain a database connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// A transaction operation failed.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// A schema migration failed.
    #[error("migration {name} failed: {reason}")]
    Migration {
        /// Name of the migration that failed.
        name: String,
        /// Underlying error description.
        reason: String,
    },

    /// A raw SQLite query error.
    #[error("query error: {0}")]
    Query(#[from] rusqlite::Error),

    /// JSON serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catch-all for unexpected internal errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the storage crate.
pub type Result<T> = std::result::Result<T, StorageError>;

impl StorageError {
    // -- Constructors --------------------------------------------------------

    /// Creates a [`StorageError::NotFound`] for the given entity kind and id.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a [`StorageError::ReferentialIntegrity`].
    pub fn protected(
        entity: impl Into<String>,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ReferentialIntegrity {
            entity: entity.into(),
            id: id.into(),
            reason: reason.into(),
        }
    }

    // -- Predicates ----------------------------------------------------------

    /// Returns `true` if this is a [`StorageError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a [`StorageError::ReferentialIntegrity`].
    pub fn is_referential_integrity(&self) -> bool {
        matches!(self, Self::ReferentialIntegrity { .. })
    }

    /// Returns `true` if the error is transient and the operation may succeed
    /// on retry (e.g., database locked, connection errors).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DatabaseLocked(_) | Self::Connection(_) | Self::Transaction(_)
        )
    }
}

/// Lifts SQLite busy/locked and foreign-key failures into typed variants.
pub(crate) fn classify(err: rusqlite::Error) -> StorageError {
    use rusqlite::ffi::ErrorCode;

    if let rusqlite::Error::SqliteFailure(ref failure, ref msg) = err {
        let detail = msg.clone().unwrap_or_else(|| failure.to_string());
        match failure.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                return StorageError::DatabaseLocked(detail);
            }
            ErrorCode::ConstraintViolation
                if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
            {
                return StorageError::protected("record", "", detail);
            }
            _ => {}
        }
    }
    StorageError::Query(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates() {
        assert!(StorageError::not_found("record", "x").is_not_found());
        assert!(StorageError::protected("status", "s", "in use").is_referential_integrity());
        assert!(StorageError::DatabaseLocked("busy".into()).is_retryable());
        assert!(!StorageError::Internal("boom".into()).is_retryable());
    }

    #[test]
    fn messages() {
        let err = StorageError::protected("record", "dir-1", "2 child records reference it");
        assert_eq!(
            err.to_string(),
            "cannot delete record dir-1: 2 child records reference it"
        );
    }
}
