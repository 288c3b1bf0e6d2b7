//! Capability error types.

use trace_core::validation::ValidationError;
use trace_storage::StorageError;

/// Errors raised by the capabilities.
///
/// Store failures pass through as [`CapabilityError::Storage`], so a
/// referential-integrity rejection reaches the caller unchanged.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    /// A traversal revisited a record through its parent links.
    #[error("cycle detected at record {node_id}")]
    CycleDetected { node_id: String },

    /// A traversal went deeper than the configured bound.
    #[error("hierarchy below {node_id} is deeper than {max_depth} levels")]
    DepthLimitExceeded { node_id: String, max_depth: usize },

    /// The status belongs to a different owner type than the record.
    #[error("status {status_id} belongs to {status_owner}, not {owner_type}")]
    InvalidStatusAssignment {
        status_id: String,
        status_owner: String,
        owner_type: String,
    },

    /// No status was given and the owner type has no default.
    #[error("{owner_type} has no default status; assign one explicitly")]
    StatusRequired { owner_type: String },

    /// A record was handed to a capability scoped to another owner type.
    #[error("record {record_id} is a {actual}, expected {expected}")]
    OwnerTypeMismatch {
        record_id: String,
        expected: String,
        actual: String,
    },

    /// The owner type was never registered with the schema.
    #[error("entity type {0} is not registered")]
    UnregisteredType(String),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(StorageError),
}

/// Convenience alias used throughout the capabilities crate.
pub type Result<T> = std::result::Result<T, CapabilityError>;

impl From<StorageError> for CapabilityError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::CycleDetected { node_id } => Self::CycleDetected { node_id },
            StorageError::StatusOwnerMismatch {
                status_id,
                status_owner,
                record_owner,
            } => Self::InvalidStatusAssignment {
                status_id,
                status_owner,
                owner_type: record_owner,
            },
            StorageError::Validation(inner) => Self::Validation(inner),
            other => Self::Storage(other),
        }
    }
}

impl CapabilityError {
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::CycleDetected { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_not_found())
    }

    /// Returns `true` for a store-side referential-integrity rejection.
    pub fn is_referential_integrity(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_referential_integrity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_cycle_is_lifted() {
        let err = CapabilityError::from(StorageError::CycleDetected {
            node_id: "x".into(),
        });
        assert!(err.is_cycle());
    }

    #[test]
    fn status_mismatch_becomes_invalid_assignment() {
        let err = CapabilityError::from(StorageError::StatusOwnerMismatch {
            status_id: "st-1".into(),
            status_owner: "shop.order".into(),
            record_owner: "shop.invoice".into(),
        });
        assert!(matches!(err, CapabilityError::InvalidStatusAssignment { .. }));
        assert_eq!(
            err.to_string(),
            "status st-1 belongs to shop.order, not shop.invoice"
        );
    }

    #[test]
    fn referential_integrity_passes_through() {
        let err = CapabilityError::from(StorageError::protected("record", "a", "in use"));
        assert!(err.is_referential_integrity());
        assert_eq!(err.to_string(), "cannot delete record a: in use");
    }
}
