//! DDL statements for the SQLite schema.
//!
//! Timestamps are stored as fixed-width UTC TEXT (`%Y-%m-%dT%H:%M:%S%.6fZ`)
//! so that string comparison orders them chronologically. Booleans are
//! INTEGER (0/1). Record attributes are a JSON object in TEXT.
//!
//! Foreign keys use `NO ACTION`, which SQLite checks at the end of each
//! statement. Protect semantics are enforced in code before the delete so the
//! caller gets a descriptive error; the constraint is the backstop. A cascade
//! delete removes a whole subtree in one statement, which `NO ACTION` allows.

/// Current schema version. Bumped whenever the DDL changes.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Core DDL statements executed during `init_schema`.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    // -- Statuses table ------------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS statuses (
        seq         INTEGER PRIMARY KEY AUTOINCREMENT,
        id          TEXT NOT NULL UNIQUE,
        label       TEXT NOT NULL,
        owner_type  TEXT NOT NULL,
        is_default  INTEGER NOT NULL DEFAULT 0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_statuses_owner ON statuses(owner_type, is_default)",
    // -- Records table -------------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS records (
        id          TEXT PRIMARY KEY,
        owner_type  TEXT NOT NULL,
        label       TEXT NOT NULL,
        parent_id   TEXT REFERENCES records(id) ON DELETE NO ACTION,
        start_at    TEXT,
        end_at      TEXT,
        status_id   TEXT REFERENCES statuses(id) ON DELETE NO ACTION,
        attributes  TEXT NOT NULL DEFAULT '{}',
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_records_owner ON records(owner_type)",
    "CREATE INDEX IF NOT EXISTS idx_records_parent ON records(parent_id)",
    "CREATE INDEX IF NOT EXISTS idx_records_status ON records(status_id)",
    "CREATE INDEX IF NOT EXISTS idx_records_window ON records(owner_type, start_at, end_at)",
    // -- Metadata table ------------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS metadata (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
];

