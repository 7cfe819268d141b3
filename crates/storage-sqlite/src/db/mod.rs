//! Database bootstrap: open, pragmas, schema init, and the writer actor.

mod write_actor;

pub use write_actor::{spawn_writer, StoreHandle};

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use crate::errors::StorageError;

/// Ledger DDL, applied idempotently on every open.
///
/// Dates are ISO-8601 TEXT so `MAX()` over them is chronological;
/// timestamps are RFC 3339 TEXT for the same reason.
const LEDGER_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS ingestion_ledger (
    run_id              TEXT NOT NULL,
    file_id             TEXT NOT NULL,
    domain              TEXT NOT NULL,
    source              TEXT NOT NULL,
    dataset             TEXT NOT NULL,
    discriminator       TEXT NOT NULL DEFAULT '',
    "key"               TEXT NOT NULL DEFAULT '',

    bronze_file         TEXT,
    bronze_error        TEXT,
    bronze_rows         INTEGER,
    bronze_from_date    TEXT,
    bronze_to_date      TEXT,
    bronze_started_at   TEXT,
    bronze_finished_at  TEXT,
    bronze_can_promote  INTEGER,

    silver_table        TEXT,
    silver_error        TEXT,
    silver_rows_seen    INTEGER,
    silver_rows_written INTEGER,
    silver_rows_failed  INTEGER,
    silver_from_date    TEXT,
    silver_to_date      TEXT,
    silver_started_at   TEXT,
    silver_finished_at  TEXT,

    gold_table          TEXT,
    gold_error          TEXT,
    gold_rows           INTEGER,
    gold_from_date      TEXT,
    gold_to_date        TEXT,
    gold_started_at     TEXT,
    gold_finished_at    TEXT,

    PRIMARY KEY (run_id, file_id)
);

CREATE INDEX IF NOT EXISTS idx_ledger_identity
    ON ingestion_ledger (domain, source, dataset, discriminator, "key");

CREATE INDEX IF NOT EXISTS idx_ledger_promotable
    ON ingestion_ledger (bronze_can_promote, bronze_finished_at);
"#;

/// Opens (or creates) the database file and applies pragmas.
pub fn open(path: &Path) -> Result<Connection, StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Connection(format!("{}: {e}", parent.display())))?;
        }
    }
    let conn = Connection::open(path)
        .map_err(|e| StorageError::Connection(format!("{}: {e}", path.display())))?;
    apply_pragmas(&conn)?;
    Ok(conn)
}

/// In-memory database for tests.
pub fn open_in_memory() -> Result<Connection, StorageError> {
    let conn = Connection::open_in_memory()
        .map_err(|e| StorageError::Connection(e.to_string()))?;
    apply_pragmas(&conn)?;
    Ok(conn)
}

fn apply_pragmas(conn: &Connection) -> Result<(), StorageError> {
    // journal_mode returns its new value as a row, so execute_batch rather
    // than pragma_update.
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;",
    )?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(())
}

/// Creates the ledger schema. Idempotent.
pub fn init(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(LEDGER_DDL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let conn = open_in_memory().unwrap();
        init(&conn).unwrap();
        init(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='ingestion_ledger'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("data").join("tidemark.db");
        let conn = open(&nested).unwrap();
        init(&conn).unwrap();
        assert!(nested.exists());
    }
}
