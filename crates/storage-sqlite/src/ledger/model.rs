//! Row mapping between `LedgerEntry` and the ledger table.

use rusqlite::{named_params, Row, ToSql, Transaction};

use tidemark_core::ledger::LedgerEntry;

use crate::errors::StorageError;

/// Column list shared by every SELECT, in `entry_from_row` order.
pub(crate) const SELECT_COLUMNS: &str = r#"
    run_id, file_id, domain, source, dataset, discriminator, "key",
    bronze_file, bronze_error, bronze_rows, bronze_from_date, bronze_to_date,
    bronze_started_at, bronze_finished_at, bronze_can_promote,
    silver_table, silver_error, silver_rows_seen, silver_rows_written,
    silver_rows_failed, silver_from_date, silver_to_date, silver_started_at,
    silver_finished_at,
    gold_table, gold_error, gold_rows, gold_from_date, gold_to_date,
    gold_started_at, gold_finished_at
"#;

/// Upsert keyed by `(run_id, file_id)`.
///
/// Stage fields merge with COALESCE so a partially-filled entry never
/// blanks what an earlier upsert stored; identity columns are immutable
/// per primary key and simply rewritten.
const UPSERT_SQL: &str = r#"
INSERT INTO ingestion_ledger (
    run_id, file_id, domain, source, dataset, discriminator, "key",
    bronze_file, bronze_error, bronze_rows, bronze_from_date, bronze_to_date,
    bronze_started_at, bronze_finished_at, bronze_can_promote,
    silver_table, silver_error, silver_rows_seen, silver_rows_written,
    silver_rows_failed, silver_from_date, silver_to_date, silver_started_at,
    silver_finished_at,
    gold_table, gold_error, gold_rows, gold_from_date, gold_to_date,
    gold_started_at, gold_finished_at
) VALUES (
    :run_id, :file_id, :domain, :source, :dataset, :discriminator, :key,
    :bronze_file, :bronze_error, :bronze_rows, :bronze_from_date, :bronze_to_date,
    :bronze_started_at, :bronze_finished_at, :bronze_can_promote,
    :silver_table, :silver_error, :silver_rows_seen, :silver_rows_written,
    :silver_rows_failed, :silver_from_date, :silver_to_date, :silver_started_at,
    :silver_finished_at,
    :gold_table, :gold_error, :gold_rows, :gold_from_date, :gold_to_date,
    :gold_started_at, :gold_finished_at
)
ON CONFLICT (run_id, file_id) DO UPDATE SET
    bronze_file         = COALESCE(excluded.bronze_file, ingestion_ledger.bronze_file),
    bronze_error        = COALESCE(excluded.bronze_error, ingestion_ledger.bronze_error),
    bronze_rows         = COALESCE(excluded.bronze_rows, ingestion_ledger.bronze_rows),
    bronze_from_date    = COALESCE(excluded.bronze_from_date, ingestion_ledger.bronze_from_date),
    bronze_to_date      = COALESCE(excluded.bronze_to_date, ingestion_ledger.bronze_to_date),
    bronze_started_at   = COALESCE(excluded.bronze_started_at, ingestion_ledger.bronze_started_at),
    bronze_finished_at  = COALESCE(excluded.bronze_finished_at, ingestion_ledger.bronze_finished_at),
    bronze_can_promote  = COALESCE(excluded.bronze_can_promote, ingestion_ledger.bronze_can_promote),
    silver_table        = COALESCE(excluded.silver_table, ingestion_ledger.silver_table),
    silver_error        = COALESCE(excluded.silver_error, ingestion_ledger.silver_error),
    silver_rows_seen    = COALESCE(excluded.silver_rows_seen, ingestion_ledger.silver_rows_seen),
    silver_rows_written = COALESCE(excluded.silver_rows_written, ingestion_ledger.silver_rows_written),
    silver_rows_failed  = COALESCE(excluded.silver_rows_failed, ingestion_ledger.silver_rows_failed),
    silver_from_date    = COALESCE(excluded.silver_from_date, ingestion_ledger.silver_from_date),
    silver_to_date      = COALESCE(excluded.silver_to_date, ingestion_ledger.silver_to_date),
    silver_started_at   = COALESCE(excluded.silver_started_at, ingestion_ledger.silver_started_at),
    silver_finished_at  = COALESCE(excluded.silver_finished_at, ingestion_ledger.silver_finished_at),
    gold_table          = COALESCE(excluded.gold_table, ingestion_ledger.gold_table),
    gold_error          = COALESCE(excluded.gold_error, ingestion_ledger.gold_error),
    gold_rows           = COALESCE(excluded.gold_rows, ingestion_ledger.gold_rows),
    gold_from_date      = COALESCE(excluded.gold_from_date, ingestion_ledger.gold_from_date),
    gold_to_date        = COALESCE(excluded.gold_to_date, ingestion_ledger.gold_to_date),
    gold_started_at     = COALESCE(excluded.gold_started_at, ingestion_ledger.gold_started_at),
    gold_finished_at    = COALESCE(excluded.gold_finished_at, ingestion_ledger.gold_finished_at)
"#;

/// Executes the upsert for one entry inside the caller's transaction.
pub(crate) fn upsert_entry(
    tx: &Transaction<'_>,
    entry: &LedgerEntry,
) -> Result<(), StorageError> {
    let params: &[(&str, &dyn ToSql)] = named_params! {
        ":run_id": entry.run_id,
        ":file_id": entry.file_id,
        ":domain": entry.domain,
        ":source": entry.source,
        ":dataset": entry.dataset,
        ":discriminator": entry.discriminator,
        ":key": entry.key,
        ":bronze_file": entry.bronze_file,
        ":bronze_error": entry.bronze_error,
        ":bronze_rows": entry.bronze_rows,
        ":bronze_from_date": entry.bronze_from_date,
        ":bronze_to_date": entry.bronze_to_date,
        ":bronze_started_at": entry.bronze_started_at,
        ":bronze_finished_at": entry.bronze_finished_at,
        ":bronze_can_promote": entry.bronze_can_promote,
        ":silver_table": entry.silver_table,
        ":silver_error": entry.silver_error,
        ":silver_rows_seen": entry.silver_rows_seen,
        ":silver_rows_written": entry.silver_rows_written,
        ":silver_rows_failed": entry.silver_rows_failed,
        ":silver_from_date": entry.silver_from_date,
        ":silver_to_date": entry.silver_to_date,
        ":silver_started_at": entry.silver_started_at,
        ":silver_finished_at": entry.silver_finished_at,
        ":gold_table": entry.gold_table,
        ":gold_error": entry.gold_error,
        ":gold_rows": entry.gold_rows,
        ":gold_from_date": entry.gold_from_date,
        ":gold_to_date": entry.gold_to_date,
        ":gold_started_at": entry.gold_started_at,
        ":gold_finished_at": entry.gold_finished_at,
    };
    tx.execute(UPSERT_SQL, params)?;
    Ok(())
}

/// Maps one SELECT row (in `SELECT_COLUMNS` order) to a `LedgerEntry`.
pub(crate) fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<LedgerEntry> {
    Ok(LedgerEntry {
        run_id: row.get(0)?,
        file_id: row.get(1)?,
        domain: row.get(2)?,
        source: row.get(3)?,
        dataset: row.get(4)?,
        discriminator: row.get(5)?,
        key: row.get(6)?,
        bronze_file: row.get(7)?,
        bronze_error: row.get(8)?,
        bronze_rows: row.get(9)?,
        bronze_from_date: row.get(10)?,
        bronze_to_date: row.get(11)?,
        bronze_started_at: row.get(12)?,
        bronze_finished_at: row.get(13)?,
        bronze_can_promote: row.get(14)?,
        silver_table: row.get(15)?,
        silver_error: row.get(16)?,
        silver_rows_seen: row.get(17)?,
        silver_rows_written: row.get(18)?,
        silver_rows_failed: row.get(19)?,
        silver_from_date: row.get(20)?,
        silver_to_date: row.get(21)?,
        silver_started_at: row.get(22)?,
        silver_finished_at: row.get(23)?,
        gold_table: row.get(24)?,
        gold_error: row.get(25)?,
        gold_rows: row.get(26)?,
        gold_from_date: row.get(27)?,
        gold_to_date: row.get(28)?,
        gold_started_at: row.get(29)?,
        gold_finished_at: row.get(30)?,
    })
}
