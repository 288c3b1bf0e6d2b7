//! Storage backend for the trace capability layer.
//!
//! Provides the [`EntityStore`] trait and a SQLite implementation
//! ([`SqliteStore`]).

pub mod error;
pub mod sqlite;
pub mod traits;

// Re-exports for convenience.
pub use error::{Result, StorageError};
pub use sqlite::{SqliteStore, StoreOptions};
pub use traits::{EntityStore, RecordUpdates, StatusUpdates, Transaction};

// ---------------------------------------------------------------------------
// EntityStore trait implementation for SqliteStore
// ---------------------------------------------------------------------------

use trace_core::filter::{RecordFilter, StatusFilter};
use trace_core::record::Record;
use trace_core::status::StatusDefinition;

impl EntityStore for SqliteStore {
    fn insert_record(&self, record: &Record) -> Result<String> {
        self.insert_record_impl(record)
    }

    fn get_record(&self, id: &str) -> Result<Record> {
        self.get_record_impl(id)
    }

    fn update_record(&self, id: &str, updates: &RecordUpdates) -> Result<()> {
        self.update_record_impl(id, updates)
    }

    fn delete_record(&self, id: &str) -> Result<usize> {
        self.delete_record_impl(id)
    }

    fn query_records(&self, filter: &RecordFilter) -> Result<Vec<Record>> {
        self.query_records_impl(filter)
    }

    fn count_records(&self, filter: &RecordFilter) -> Result<usize> {
        self.count_records_impl(filter)
    }

    fn exists_records(&self, filter: &RecordFilter) -> Result<bool> {
        self.exists_records_impl(filter)
    }

    fn insert_status(&self, status: &StatusDefinition) -> Result<String> {
        self.insert_status_impl(status)
    }

    fn get_status(&self, id: &str) -> Result<StatusDefinition> {
        self.get_status_impl(id)
    }

    fn query_statuses(&self, filter: &StatusFilter) -> Result<Vec<StatusDefinition>> {
        self.query_statuses_impl(filter)
    }

    fn update_status(&self, id: &str, updates: &StatusUpdates) -> Result<()> {
        self.update_status_impl(id, updates)
    }

    fn delete_status(&self, id: &str) -> Result<()> {
        self.delete_status_impl(id)
    }

    fn run_in_transaction(&self, f: &dyn Fn(&dyn Transaction) -> Result<()>) -> Result<()> {
        self.run_in_transaction_impl(f)
    }
}
