//! Repository for ingestion ledger persistence.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::params;

use tidemark_core::errors::Result;
use tidemark_core::identity::UnitIdentity;
use tidemark_core::ledger::{LedgerEntry, LedgerRepositoryTrait, Stage};

use crate::db::StoreHandle;

use super::model::{entry_from_row, upsert_entry, SELECT_COLUMNS};

/// SQLite-backed ingestion ledger.
///
/// Every operation runs as one job on the writer actor, which wraps it in
/// its own transaction - concurrent fetch workers never share a
/// transaction and never conflict on distinct `(run_id, file_id)` pairs.
pub struct LedgerRepository {
    store: StoreHandle,
}

impl LedgerRepository {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }
}

#[async_trait]
impl LedgerRepositoryTrait for LedgerRepository {
    async fn upsert(&self, entry: LedgerEntry) -> Result<()> {
        self.store.exec(move |tx| upsert_entry(tx, &entry)).await
    }

    async fn latest_watermark(
        &self,
        identity: &UnitIdentity,
        stage: Stage,
    ) -> Result<Option<NaiveDate>> {
        let identity = identity.clone();
        // Stage prefixes are a closed set, so the column name is static.
        let sql = format!(
            r#"SELECT MAX({prefix}_to_date) FROM ingestion_ledger
               WHERE domain = ?1 AND source = ?2 AND dataset = ?3
                 AND discriminator = ?4 AND "key" = ?5"#,
            prefix = stage.prefix()
        );
        self.store
            .exec(move |tx| {
                let watermark = tx.query_row(
                    &sql,
                    params![
                        identity.domain,
                        identity.source,
                        identity.dataset,
                        identity.discriminator,
                        identity.key
                    ],
                    |row| row.get::<_, Option<NaiveDate>>(0),
                )?;
                Ok(watermark)
            })
            .await
    }

    async fn latest_ingestion_ts(
        &self,
        identity: &UnitIdentity,
    ) -> Result<Option<DateTime<Utc>>> {
        let identity = identity.clone();
        self.store
            .exec(move |tx| {
                let ts = tx.query_row(
                    r#"SELECT MAX(bronze_started_at) FROM ingestion_ledger
                       WHERE domain = ?1 AND source = ?2 AND dataset = ?3
                         AND discriminator = ?4 AND "key" = ?5
                         AND bronze_error IS NULL"#,
                    params![
                        identity.domain,
                        identity.source,
                        identity.dataset,
                        identity.discriminator,
                        identity.key
                    ],
                    |row| row.get::<_, Option<DateTime<Utc>>>(0),
                )?;
                Ok(ts)
            })
            .await
    }

    async fn list_promotable(&self, domain: Option<&str>) -> Result<Vec<LedgerEntry>> {
        let domain = domain.map(str::to_string);
        self.store
            .exec(move |tx| {
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM ingestion_ledger
                     WHERE bronze_can_promote = 1
                       AND (silver_finished_at IS NULL
                            OR COALESCE(silver_rows_written, 0) = 0)
                       AND (?1 IS NULL OR domain = ?1)
                     ORDER BY (bronze_finished_at IS NULL) ASC,
                              bronze_finished_at ASC"
                );
                let mut statement = tx.prepare(&sql)?;
                let entries = statement
                    .query_map(params![domain], entry_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(entries)
            })
            .await
    }

    async fn list_failed_keys(&self, error_marker: &str) -> Result<Vec<String>> {
        let marker = error_marker.to_string();
        self.store
            .exec(move |tx| {
                let mut statement = tx.prepare(
                    r#"SELECT DISTINCT "key" FROM ingestion_ledger
                       WHERE "key" != ''
                         AND bronze_error LIKE '%' || ?1 || '%'
                       ORDER BY "key""#,
                )?;
                let keys = statement
                    .query_map(params![marker], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(keys)
            })
            .await
    }

    async fn list_seen_keys(&self) -> Result<Vec<String>> {
        self.store
            .exec(|tx| {
                let mut statement = tx.prepare(
                    r#"SELECT DISTINCT "key" FROM ingestion_ledger
                       WHERE "key" != ''
                         AND bronze_error IS NULL
                         AND bronze_file IS NOT NULL
                       ORDER BY "key""#,
                )?;
                let keys = statement
                    .query_map([], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(keys)
            })
            .await
    }

    async fn get(&self, run_id: &str, file_id: &str) -> Result<Option<LedgerEntry>> {
        let run_id = run_id.to_string();
        let file_id = file_id.to_string();
        self.store
            .exec(move |tx| {
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM ingestion_ledger
                     WHERE run_id = ?1 AND file_id = ?2"
                );
                let mut statement = tx.prepare(&sql)?;
                let mut rows = statement.query_map(params![run_id, file_id], entry_from_row)?;
                match rows.next() {
                    Some(entry) => Ok(Some(entry?)),
                    None => Ok(None),
                }
            })
            .await
    }
}
