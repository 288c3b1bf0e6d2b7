//! Status definition CRUD for [`SqliteStore`].

use chrono::Utc;
use rusqlite::{Connection, Row, params};
use tracing::{debug, warn};

use trace_core::filter::StatusFilter;
use trace_core::owner::OwnerType;
use trace_core::status::StatusDefinition;
use trace_core::validation::validate_status;

use crate::error::{Result, StorageError, classify};
use crate::sqlite::filter::status_where;
use crate::sqlite::records::generate_unique_id;
use crate::sqlite::store::{SqliteStore, StoreOptions};
use crate::traits::StatusUpdates;

const STATUS_COLUMNS: &str = "id, label, owner_type, is_default";

fn scan_status(row: &Row<'_>) -> rusqlite::Result<StatusDefinition> {
    let owner_type: String = row.get(2)?;
    Ok(StatusDefinition {
        id: row.get(0)?,
        label: row.get(1)?,
        owner_type: OwnerType::from(owner_type),
        is_default: row.get(3)?,
    })
}

// ---------------------------------------------------------------------------
// Connection-level helpers
// ---------------------------------------------------------------------------

pub(crate) fn insert_status_on_conn(
    conn: &Connection,
    options: &StoreOptions,
    status: &StatusDefinition,
) -> Result<String> {
    validate_status(status)?;

    let id = if status.id.is_empty() {
        generate_unique_id(
            conn,
            options,
            "statuses",
            "status",
            &status.owner_type,
            &status.label,
            Utc::now(),
        )?
    } else {
        status.id.clone()
    };

    conn.execute(
        "INSERT INTO statuses (id, label, owner_type, is_default) VALUES (?1, ?2, ?3, ?4)",
        params![id, status.label, status.owner_type.as_str(), status.is_default],
    )
    .map_err(classify)?;

    debug!(id = %id, owner_type = %status.owner_type, is_default = status.is_default, "status inserted");
    Ok(id)
}

pub(crate) fn get_status_on_conn(conn: &Connection, id: &str) -> Result<StatusDefinition> {
    let sql = format!("SELECT {STATUS_COLUMNS} FROM statuses WHERE id = ?1");
    conn.query_row(&sql, params![id], scan_status)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StorageError::not_found("status", id),
            other => StorageError::Query(other),
        })
}

/// Returns matching statuses in insertion order.
pub(crate) fn query_statuses_on_conn(
    conn: &Connection,
    filter: &StatusFilter,
) -> Result<Vec<StatusDefinition>> {
    let clause = status_where(filter);
    let limit = filter
        .limit
        .map(|l| format!(" LIMIT {l}"))
        .unwrap_or_default();
    let sql = format!(
        "SELECT {STATUS_COLUMNS} FROM statuses WHERE {} ORDER BY seq ASC{limit}",
        clause.sql
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs = clause.params.as_refs();
    let rows = stmt.query_map(param_refs.as_slice(), scan_status)?;

    let mut statuses = Vec::new();
    for row in rows {
        statuses.push(row?);
    }
    Ok(statuses)
}

pub(crate) fn update_status_on_conn(
    conn: &Connection,
    id: &str,
    updates: &StatusUpdates,
) -> Result<()> {
    let mut status = get_status_on_conn(conn, id)?;
    if let Some(ref label) = updates.label {
        status.label = label.clone();
    }
    if let Some(is_default) = updates.is_default {
        status.is_default = is_default;
    }
    validate_status(&status)?;

    conn.execute(
        "UPDATE statuses SET label = ?2, is_default = ?3 WHERE id = ?1",
        params![id, status.label, status.is_default],
    )
    .map_err(classify)?;
    Ok(())
}

/// Deletes a status no record references.
pub(crate) fn delete_status_on_conn(conn: &Connection, id: &str) -> Result<()> {
    let in_use: i64 = conn.query_row(
        "SELECT COUNT(*) FROM records WHERE status_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    if in_use > 0 {
        warn!(id, in_use, "refusing to delete status in use");
        return Err(StorageError::protected(
            "status",
            id,
            format!("{in_use} records use it"),
        ));
    }

    let affected = conn
        .execute("DELETE FROM statuses WHERE id = ?1", params![id])
        .map_err(classify)?;
    if affected == 0 {
        return Err(StorageError::not_found("status", id));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// SqliteStore methods
// ---------------------------------------------------------------------------

impl SqliteStore {
    pub fn insert_status_impl(&self, status: &StatusDefinition) -> Result<String> {
        let conn = self.lock_conn()?;
        insert_status_on_conn(&conn, &self.options, status)
    }

    pub fn get_status_impl(&self, id: &str) -> Result<StatusDefinition> {
        let conn = self.lock_conn()?;
        get_status_on_conn(&conn, id)
    }

    pub fn query_statuses_impl(&self, filter: &StatusFilter) -> Result<Vec<StatusDefinition>> {
        let conn = self.lock_conn()?;
        query_statuses_on_conn(&conn, filter)
    }

    pub fn update_status_impl(&self, id: &str, updates: &StatusUpdates) -> Result<()> {
        let conn = self.lock_conn()?;
        update_status_on_conn(&conn, id, updates)
    }

    pub fn delete_status_impl(&self, id: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        delete_status_on_conn(&conn, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use trace_core::record::RecordBuilder;

    fn test_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[test]
    fn insert_generates_status_id() {
        let store = test_store();
        let id = store
            .insert_status_impl(&StatusDefinition::new("shop.order", "Placed"))
            .unwrap();
        assert!(id.starts_with("status-"));
        let status = store.get_status_impl(&id).unwrap();
        assert_eq!(status.label, "Placed");
        assert!(!status.is_default);
    }

    #[test]
    fn query_keeps_insertion_order() {
        let store = test_store();
        for (id, label) in [("s-z", "Zeta"), ("s-a", "Alpha"), ("s-m", "Mu")] {
            store
                .insert_status_impl(&StatusDefinition::new("shop.order", label).with_id(id))
                .unwrap();
        }
        store
            .insert_status_impl(&StatusDefinition::new("shop.invoice", "Draft").with_id("s-i"))
            .unwrap();

        let ids: Vec<String> = store
            .query_statuses_impl(&StatusFilter::for_owner(&OwnerType::from("shop.order")))
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["s-z", "s-a", "s-m"]);
    }

    #[test]
    fn filter_by_default_flag() {
        let store = test_store();
        let owner = OwnerType::from("shop.order");
        store
            .insert_status_impl(&StatusDefinition::new(owner.clone(), "Placed").with_id("a"))
            .unwrap();
        store
            .insert_status_impl(
                &StatusDefinition::new(owner.clone(), "New")
                    .with_id("b")
                    .default_status(),
            )
            .unwrap();

        let filter = StatusFilter {
            is_default: Some(true),
            ..StatusFilter::for_owner(&owner)
        };
        let defaults = store.query_statuses_impl(&filter).unwrap();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, "b");
    }

    #[test]
    fn update_toggles_default() {
        let store = test_store();
        store
            .insert_status_impl(&StatusDefinition::new("shop.order", "Placed").with_id("a"))
            .unwrap();
        let updates = StatusUpdates {
            is_default: Some(true),
            ..StatusUpdates::default()
        };
        store.update_status_impl("a", &updates).unwrap();
        assert!(store.get_status_impl("a").unwrap().is_default);
    }

    #[test]
    fn status_in_use_cannot_be_deleted() {
        let store = test_store();
        store
            .insert_status_impl(&StatusDefinition::new("shop.order", "Placed").with_id("placed"))
            .unwrap();
        let order = RecordBuilder::new("shop.order", "O-1").status("placed").build();
        let order_id = store.insert_record_impl(&order).unwrap();

        let err = store.delete_status_impl("placed").unwrap_err();
        assert!(err.is_referential_integrity());

        store.delete_record_impl(&order_id).unwrap();
        store.delete_status_impl("placed").unwrap();
        assert!(store.get_status_impl("placed").unwrap_err().is_not_found());
    }

    #[test]
    fn delete_missing_status_is_not_found() {
        let err = test_store().delete_status_impl("nope").unwrap_err();
        assert!(err.is_not_found());
    }
}
