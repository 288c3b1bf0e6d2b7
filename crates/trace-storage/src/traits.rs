//! EntityStore and Transaction traits -- the surface the capabilities consume.
//!
//! Capabilities depend on these traits rather than on concrete backends so
//! that an application's own store can be substituted for [`SqliteStore`].
//!
//! [`SqliteStore`]: crate::SqliteStore

use serde_json::{Map, Value};

use trace_core::filter::{RecordFilter, StatusFilter};
use trace_core::record::Record;
use trace_core::status::StatusDefinition;
use trace_core::window::TimeWindow;

use crate::error::Result;

// ---------------------------------------------------------------------------
// Update types
// ---------------------------------------------------------------------------

/// Typed partial update for records.
///
/// Only `Some` fields are applied; `None` fields are left unchanged. Nullable
/// columns use `Option<Option<_>>` so they can be cleared.
#[derive(Debug, Clone, Default)]
pub struct RecordUpdates {
    pub label: Option<String>,
    pub parent_id: Option<Option<String>>,
    pub window: Option<Option<TimeWindow>>,
    pub status_id: Option<Option<String>>,
    /// Replaces the whole attribute map.
    pub attributes: Option<Map<String, Value>>,
}

impl RecordUpdates {
    /// Applies the updates to an in-memory record.
    pub fn apply_to(&self, record: &mut Record) {
        if let Some(ref label) = self.label {
            record.label = label.clone();
        }
        if let Some(ref parent_id) = self.parent_id {
            record.parent_id = parent_id.clone();
        }
        if let Some(window) = self.window {
            record.window = window;
        }
        if let Some(ref status_id) = self.status_id {
            record.status_id = status_id.clone();
        }
        if let Some(ref attributes) = self.attributes {
            record.attributes = attributes.clone();
        }
    }
}

/// Typed partial update for statuses. The owner type is immutable.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdates {
    pub label: Option<String>,
    pub is_default: Option<bool>,
}

// ---------------------------------------------------------------------------
// EntityStore trait
// ---------------------------------------------------------------------------

/// Persistence and query interface for records and statuses.
///
/// Referential integrity is the store's job: deleting a status that is still
/// assigned, or a record with live children under the protect policy, fails
/// with [`StorageError::ReferentialIntegrity`].
///
/// [`StorageError::ReferentialIntegrity`]: crate::StorageError::ReferentialIntegrity
pub trait EntityStore: Send + Sync {
    // -- Records -------------------------------------------------------------

    /// Inserts a record and returns its id, generating one when empty.
    fn insert_record(&self, record: &Record) -> Result<String>;

    /// Retrieves a record by its id.
    fn get_record(&self, id: &str) -> Result<Record>;

    /// Applies partial updates to a record.
    ///
    /// Parent links are checked for existence and owner type but not for
    /// cycles; reparenting through the hierarchy capability checks those.
    fn update_record(&self, id: &str, updates: &RecordUpdates) -> Result<()>;

    /// Deletes a record, applying the configured parent delete policy.
    /// Returns the number of rows removed.
    fn delete_record(&self, id: &str) -> Result<usize>;

    /// Returns the distinct records matching the filter.
    fn query_records(&self, filter: &RecordFilter) -> Result<Vec<Record>>;

    /// Counts the records matching the filter (ignores `limit`).
    fn count_records(&self, filter: &RecordFilter) -> Result<usize>;

    /// Returns `true` if at least one record matches the filter.
    fn exists_records(&self, filter: &RecordFilter) -> Result<bool>;

    // -- Statuses ------------------------------------------------------------

    /// Inserts a status definition and returns its id.
    fn insert_status(&self, status: &StatusDefinition) -> Result<String>;

    /// Retrieves a status definition by its id.
    fn get_status(&self, id: &str) -> Result<StatusDefinition>;

    /// Returns statuses matching the filter in insertion order.
    fn query_statuses(&self, filter: &StatusFilter) -> Result<Vec<StatusDefinition>>;

    /// Applies partial updates to a status definition.
    fn update_status(&self, id: &str, updates: &StatusUpdates) -> Result<()>;

    /// Deletes a status definition that no record references.
    fn delete_status(&self, id: &str) -> Result<()>;

    // -- Transactions --------------------------------------------------------

    /// Executes a closure within a database transaction.
    ///
    /// If the closure returns `Ok`, the transaction is committed.
    /// If it returns `Err` or panics, the transaction is rolled back.
    fn run_in_transaction(&self, f: &dyn Fn(&dyn Transaction) -> Result<()>) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Transaction trait
// ---------------------------------------------------------------------------

/// Subset of [`EntityStore`] methods available inside a transaction.
pub trait Transaction {
    fn insert_record(&self, record: &Record) -> Result<String>;
    fn get_record(&self, id: &str) -> Result<Record>;
    fn update_record(&self, id: &str, updates: &RecordUpdates) -> Result<()>;
    fn delete_record(&self, id: &str) -> Result<usize>;
    fn query_records(&self, filter: &RecordFilter) -> Result<Vec<Record>>;
    fn get_status(&self, id: &str) -> Result<StatusDefinition>;
}
