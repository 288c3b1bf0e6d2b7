//! Record CRUD and query operations for [`SqliteStore`].

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use trace_core::filter::RecordFilter;
use trace_core::idgen::{compute_adaptive_length, generate_hash_id};
use trace_core::owner::OwnerType;
use trace_core::record::{DeletePolicy, Record};
use trace_core::validation::{ValidationError, validate_record};
use trace_core::window::TimeWindow;

use crate::error::{Result, StorageError, classify};
use crate::sqlite::filter::{record_order, record_where};
use crate::sqlite::store::{SqliteStore, StoreOptions};
use crate::traits::RecordUpdates;

/// Hash attempts per id length before growing the id.
const ID_ATTEMPTS_PER_LENGTH: u32 = 10;

// ---------------------------------------------------------------------------
// Column list and row scanning
// ---------------------------------------------------------------------------

/// Record columns in the order [`scan_record`] reads them.
pub(crate) const RECORD_COLUMNS: &str = "id, owner_type, label, parent_id, start_at, end_at, \
     status_id, attributes, created_at, updated_at";

/// Formats a timestamp as fixed-width UTC TEXT for SQLite.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Parses a TEXT timestamp written by [`format_datetime`].
pub(crate) fn parse_datetime(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    s.parse::<DateTime<Utc>>().or_else(|_| {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ").map(|ndt| ndt.and_utc())
    })
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn datetime_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw).map_err(|e| conversion_error(idx, e))
}

fn optional_datetime_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_datetime(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

/// Deserialises a row into a [`Record`].
///
/// The column order MUST match [`RECORD_COLUMNS`].
pub(crate) fn scan_record(row: &Row<'_>) -> rusqlite::Result<Record> {
    let id: String = row.get(0)?;
    let owner_type: String = row.get(1)?;
    let label: String = row.get(2)?;
    let parent_id: Option<String> = row.get(3)?;
    let start = optional_datetime_at(row, 4)?;
    let end = optional_datetime_at(row, 5)?;
    let status_id: Option<String> = row.get(6)?;
    let attributes_str: String = row.get(7)?;
    let attributes: Map<String, Value> =
        serde_json::from_str(&attributes_str).map_err(|e| conversion_error(7, e))?;

    Ok(Record {
        id,
        owner_type: OwnerType::from(owner_type),
        label,
        parent_id,
        window: start.map(|start| TimeWindow { start, end }),
        status_id,
        attributes,
        created_at: datetime_at(row, 8)?,
        updated_at: datetime_at(row, 9)?,
    })
}

fn window_columns(window: Option<TimeWindow>) -> (Option<String>, Option<String>) {
    match window {
        Some(w) => (
            Some(format_datetime(&w.start)),
            w.end.as_ref().map(format_datetime),
        ),
        None => (None, None),
    }
}

// ---------------------------------------------------------------------------
// Id generation (shared with statuses)
// ---------------------------------------------------------------------------

/// Generates an id for `table` that is not yet taken, growing the hash length
/// when repeated attempts collide.
pub(crate) fn generate_unique_id(
    conn: &Connection,
    options: &StoreOptions,
    table: &str,
    prefix: &str,
    owner_type: &OwnerType,
    label: &str,
    timestamp: DateTime<Utc>,
) -> Result<String> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {table} WHERE owner_type = ?1"),
        params![owner_type.as_str()],
        |row| row.get(0),
    )?;
    let ids = &options.ids;
    let base = compute_adaptive_length(
        usize::try_from(count).unwrap_or(usize::MAX),
        ids.min_length,
        ids.max_length,
        ids.max_collision_prob,
    );
    let exists_sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1)");

    for length in base..=ids.max_length.max(base) {
        for nonce in 0..ID_ATTEMPTS_PER_LENGTH {
            let candidate =
                generate_hash_id(prefix, owner_type.as_str(), label, timestamp, length, nonce);
            let taken: bool = conn.query_row(&exists_sql, params![candidate], |row| row.get(0))?;
            if !taken {
                return Ok(candidate);
            }
            debug!(candidate = %candidate, "generated id collides, retrying");
        }
    }

    Err(StorageError::Internal(format!(
        "could not generate a unique {table} id for {owner_type}"
    )))
}

// ---------------------------------------------------------------------------
// Reference checks
// ---------------------------------------------------------------------------

/// The parent must exist and share the child's owner type.
fn check_parent(
    conn: &Connection,
    id: &str,
    owner_type: &OwnerType,
    parent_id: Option<&str>,
) -> Result<()> {
    let Some(parent_id) = parent_id else {
        return Ok(());
    };
    if parent_id == id {
        return Err(ValidationError::SelfParent(id.to_owned()).into());
    }
    let parent_owner: Option<String> = conn
        .query_row(
            "SELECT owner_type FROM records WHERE id = ?1",
            params![parent_id],
            |row| row.get(0),
        )
        .optional()?;
    match parent_owner {
        None => Err(StorageError::not_found("record", parent_id)),
        Some(owner) if owner != owner_type.as_str() => Err(ValidationError::DescriptorMismatch {
            expected: owner_type.to_string(),
            actual: owner,
        }
        .into()),
        Some(_) => Ok(()),
    }
}

/// The status must exist and belong to the record's owner type.
fn check_status(conn: &Connection, owner_type: &OwnerType, status_id: Option<&str>) -> Result<()> {
    let Some(status_id) = status_id else {
        return Ok(());
    };
    let status_owner: Option<String> = conn
        .query_row(
            "SELECT owner_type FROM statuses WHERE id = ?1",
            params![status_id],
            |row| row.get(0),
        )
        .optional()?;
    match status_owner {
        None => Err(StorageError::not_found("status", status_id)),
        Some(owner) if owner != owner_type.as_str() => Err(StorageError::StatusOwnerMismatch {
            status_id: status_id.to_owned(),
            status_owner: owner,
            record_owner: owner_type.to_string(),
        }),
        Some(_) => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Connection-level helpers (used by both SqliteStore and Transaction)
// ---------------------------------------------------------------------------

/// Inserts a record, generating its id when empty. Returns the stored id.
pub(crate) fn insert_record_on_conn(
    conn: &Connection,
    options: &StoreOptions,
    record: &Record,
) -> Result<String> {
    validate_record(record)?;

    let id = if record.id.is_empty() {
        generate_unique_id(
            conn,
            options,
            "records",
            record.owner_type.model_name(),
            &record.owner_type,
            &record.label,
            record.created_at,
        )?
    } else {
        record.id.clone()
    };

    check_parent(conn, &id, &record.owner_type, record.parent_id.as_deref())?;
    check_status(conn, &record.owner_type, record.status_id.as_deref())?;

    let (start_at, end_at) = window_columns(record.window);
    let attributes = serde_json::to_string(&record.attributes)?;

    conn.execute(
        "INSERT INTO records (
            id, owner_type, label, parent_id, start_at, end_at,
            status_id, attributes, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            id,
            record.owner_type.as_str(),
            record.label,
            record.parent_id,
            start_at,
            end_at,
            record.status_id,
            attributes,
            format_datetime(&record.created_at),
            format_datetime(&record.updated_at),
        ],
    )
    .map_err(classify)?;

    debug!(id = %id, owner_type = %record.owner_type, "record inserted");
    Ok(id)
}

/// Retrieves a single record by id.
pub(crate) fn get_record_on_conn(conn: &Connection, id: &str) -> Result<Record> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1");
    conn.query_row(&sql, params![id], scan_record)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StorageError::not_found("record", id),
            other => StorageError::Query(other),
        })
}

/// Applies partial updates to a record.
pub(crate) fn update_record_on_conn(
    conn: &Connection,
    id: &str,
    updates: &RecordUpdates,
) -> Result<()> {
    let mut record = get_record_on_conn(conn, id)?;
    updates.apply_to(&mut record);
    validate_record(&record)?;

    if updates.parent_id.is_some() {
        check_parent(conn, id, &record.owner_type, record.parent_id.as_deref())?;
    }
    if updates.status_id.is_some() {
        check_status(conn, &record.owner_type, record.status_id.as_deref())?;
    }

    record.updated_at = Utc::now();
    let (start_at, end_at) = window_columns(record.window);
    let attributes = serde_json::to_string(&record.attributes)?;

    conn.execute(
        "UPDATE records SET
            label = ?2, parent_id = ?3, start_at = ?4, end_at = ?5,
            status_id = ?6, attributes = ?7, updated_at = ?8
         WHERE id = ?1",
        params![
            id,
            record.label,
            record.parent_id,
            start_at,
            end_at,
            record.status_id,
            attributes,
            format_datetime(&record.updated_at),
        ],
    )
    .map_err(classify)?;

    debug!(id, "record updated");
    Ok(())
}

/// Deletes a record under the store's parent delete policy.
pub(crate) fn delete_record_on_conn(
    conn: &Connection,
    options: &StoreOptions,
    id: &str,
) -> Result<usize> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM records WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(StorageError::not_found("record", id));
    }

    let removed = match options.parent_on_delete {
        DeletePolicy::Protect => {
            let children: i64 = conn.query_row(
                "SELECT COUNT(*) FROM records WHERE parent_id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            if children > 0 {
                warn!(id, children, "refusing to delete protected record");
                return Err(StorageError::protected(
                    "record",
                    id,
                    format!("{children} child records reference it"),
                ));
            }
            conn.execute("DELETE FROM records WHERE id = ?1", params![id])
                .map_err(classify)?
        }
        DeletePolicy::Cascade => conn
            .execute(
                "WITH RECURSIVE subtree(id) AS (
                    SELECT ?1
                    UNION
                    SELECT r.id FROM records r JOIN subtree s ON r.parent_id = s.id
                 )
                 DELETE FROM records WHERE id IN (SELECT id FROM subtree)",
                params![id],
            )
            .map_err(classify)?,
    };

    debug!(id, removed, "record deleted");
    Ok(removed)
}

/// Returns the records matching the filter.
pub(crate) fn query_records_on_conn(conn: &Connection, filter: &RecordFilter) -> Result<Vec<Record>> {
    let clause = record_where(filter)?;
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM records WHERE {}{}",
        clause.sql,
        record_order(filter)
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs = clause.params.as_refs();
    let rows = stmt.query_map(param_refs.as_slice(), scan_record)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

/// Counts the records matching the filter, ignoring its limit.
pub(crate) fn count_records_on_conn(conn: &Connection, filter: &RecordFilter) -> Result<usize> {
    let clause = record_where(filter)?;
    let sql = format!("SELECT COUNT(*) FROM records WHERE {}", clause.sql);
    let param_refs = clause.params.as_refs();
    let count: i64 = conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?;
    Ok(usize::try_from(count).unwrap_or_default())
}

/// Returns `true` if any record matches the filter.
pub(crate) fn exists_records_on_conn(conn: &Connection, filter: &RecordFilter) -> Result<bool> {
    let clause = record_where(filter)?;
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM records WHERE {})",
        clause.sql
    );
    let param_refs = clause.params.as_refs();
    let exists: bool = conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?;
    Ok(exists)
}

// ---------------------------------------------------------------------------
// SqliteStore methods
// ---------------------------------------------------------------------------

impl SqliteStore {
    /// Inserts a record and returns its id.
    pub fn insert_record_impl(&self, record: &Record) -> Result<String> {
        let conn = self.lock_conn()?;
        insert_record_on_conn(&conn, &self.options, record)
    }

    /// Retrieves a record by id.
    pub fn get_record_impl(&self, id: &str) -> Result<Record> {
        let conn = self.lock_conn()?;
        get_record_on_conn(&conn, id)
    }

    /// Applies partial updates to a record.
    pub fn update_record_impl(&self, id: &str, updates: &RecordUpdates) -> Result<()> {
        let conn = self.lock_conn()?;
        update_record_on_conn(&conn, id, updates)
    }

    /// Deletes a record and, under the cascade policy, its descendants.
    pub fn delete_record_impl(&self, id: &str) -> Result<usize> {
        let conn = self.lock_conn()?;
        delete_record_on_conn(&conn, &self.options, id)
    }

    pub fn query_records_impl(&self, filter: &RecordFilter) -> Result<Vec<Record>> {
        let conn = self.lock_conn()?;
        query_records_on_conn(&conn, filter)
    }

    pub fn count_records_impl(&self, filter: &RecordFilter) -> Result<usize> {
        let conn = self.lock_conn()?;
        count_records_on_conn(&conn, filter)
    }

    pub fn exists_records_impl(&self, filter: &RecordFilter) -> Result<bool> {
        let conn = self.lock_conn()?;
        exists_records_on_conn(&conn, filter)
    }
}
