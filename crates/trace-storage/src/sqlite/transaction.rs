//! Transaction wrapper for [`SqliteStore`].

use rusqlite::Connection;

use trace_core::filter::RecordFilter;
use trace_core::record::Record;
use trace_core::status::StatusDefinition;

use crate::error::{Result, StorageError};
use crate::sqlite::records;
use crate::sqlite::statuses;
use crate::sqlite::store::{SqliteStore, StoreOptions};
use crate::traits::{RecordUpdates, Transaction};

/// A thin wrapper around a SQLite connection that is inside a transaction.
///
/// Delegates to the same connection-level helpers used by [`SqliteStore`].
pub(crate) struct SqliteTx<'a> {
    pub(crate) conn: &'a Connection,
    pub(crate) options: &'a StoreOptions,
}

impl Transaction for SqliteTx<'_> {
    fn insert_record(&self, record: &Record) -> Result<String> {
        records::insert_record_on_conn(self.conn, self.options, record)
    }

    fn get_record(&self, id: &str) -> Result<Record> {
        records::get_record_on_conn(self.conn, id)
    }

    fn update_record(&self, id: &str, updates: &RecordUpdates) -> Result<()> {
        records::update_record_on_conn(self.conn, id, updates)
    }

    fn delete_record(&self, id: &str) -> Result<usize> {
        records::delete_record_on_conn(self.conn, self.options, id)
    }

    fn query_records(&self, filter: &RecordFilter) -> Result<Vec<Record>> {
        records::query_records_on_conn(self.conn, filter)
    }

    fn get_status(&self, id: &str) -> Result<StatusDefinition> {
        statuses::get_status_on_conn(self.conn, id)
    }
}

// ---------------------------------------------------------------------------
// SqliteStore::run_in_transaction
// ---------------------------------------------------------------------------

impl SqliteStore {
    /// Runs a closure inside a database transaction.
    pub fn run_in_transaction_impl(
        &self,
        f: &dyn Fn(&dyn Transaction) -> Result<()>,
    ) -> Result<()> {
        let conn = self.lock_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| StorageError::Transaction(format!("failed to begin: {e}")))?;

        let sqlite_tx = SqliteTx {
            conn: &tx,
            options: &self.options,
        };
        // Rolled back on drop when the closure fails.
        f(&sqlite_tx)?;
        tx.commit()
            .map_err(|e| StorageError::Transaction(format!("failed to commit: {e}")))?;
        Ok(())
    }
}
