//! Silver promotion engine.
//!
//! Projects promotable Bronze payloads into typed rows and merges them
//! into their target tables: contract resolution, projection, provenance,
//! watermark filtering, dedup, anti-join, chunked merge, ledger bookkeeping.
//! Failures are isolated per entry - one bad payload never aborts the
//! batch.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::bronze::PayloadStore;
use crate::config::{PipelineConfig, WatermarkMode};
use crate::constants::{
    COL_INGESTED_AT, COL_RUN_ID, COL_SOURCE_FILE_ID, DEFAULT_ROW_DATE_COLUMN,
};
use crate::errors::{PromotionError, Result};
use crate::ledger::{LedgerEntry, LedgerRepositoryTrait, Stage};
use crate::pipeline::RunContext;
use crate::rows::{project_rows, CellValue, ContractCatalog, MapperRegistry, Projector};

use super::chunk::partition_by_date;
use super::dedupe::{anti_join, dedupe_keep_last};
use super::silver_traits::SilverStoreTrait;

/// What one successfully promoted entry produced.
struct EntryResult {
    table: String,
    rows_seen: i64,
    rows_written: i64,
    coverage_from: Option<NaiveDate>,
    coverage_to: Option<NaiveDate>,
}

/// The Silver service.
pub struct PromotionEngine {
    config: Arc<PipelineConfig>,
    ledger: Arc<dyn LedgerRepositoryTrait>,
    payloads: Arc<PayloadStore>,
    contracts: Arc<ContractCatalog>,
    mappers: Arc<MapperRegistry>,
    tables: Arc<dyn SilverStoreTrait>,
}

impl PromotionEngine {
    pub fn new(
        config: Arc<PipelineConfig>,
        ledger: Arc<dyn LedgerRepositoryTrait>,
        payloads: Arc<PayloadStore>,
        contracts: Arc<ContractCatalog>,
        mappers: Arc<MapperRegistry>,
        tables: Arc<dyn SilverStoreTrait>,
    ) -> Self {
        Self {
            config,
            ledger,
            payloads,
            contracts,
            mappers,
            tables,
        }
    }

    /// Promotes every eligible ledger entry, optionally filtered by
    /// domain. Returns the file ids that completed and the total rows
    /// written.
    ///
    /// Entries are processed strictly sequentially in ledger order
    /// (oldest Bronze first): later entries may depend on watermarks
    /// advanced by earlier entries of the same identity.
    pub async fn promote(
        &self,
        ctx: &RunContext,
        domain: Option<&str>,
    ) -> Result<(Vec<String>, u64)> {
        let entries = self.ledger.list_promotable(domain).await?;
        debug!(run_id = %ctx.run_id, candidates = entries.len(), "promotion pass starting");

        let mut promoted_file_ids = Vec::new();
        let mut total_rows: u64 = 0;

        for entry in entries {
            let identity = entry.identity();

            // Silver status updates are log-and-continue: the Bronze
            // record stays the durable source of truth.
            let start_marker =
                LedgerEntry::silver_start_marker(&entry.run_id, &entry.file_id, &identity);
            if let Err(e) = self.ledger.upsert(start_marker).await {
                warn!(run_id = %ctx.run_id, unit = %identity, "silver start upsert failed: {e}");
            }

            match self.promote_entry(ctx, &entry).await {
                Ok(result) => {
                    info!(
                        run_id = %ctx.run_id,
                        unit = %identity,
                        file_id = %entry.file_id,
                        table = %result.table,
                        rows_seen = result.rows_seen,
                        rows_written = result.rows_written,
                        "silver promoted"
                    );
                    total_rows += result.rows_written as u64;
                    ctx.counters.rows_promoted(result.rows_written as u64);

                    let mut finish =
                        LedgerEntry::new(&entry.run_id, &entry.file_id, &identity);
                    // Explicitly clear a stale failure from an earlier
                    // attempt; COALESCE-merge keeps None fields untouched.
                    finish.silver_error = Some(String::new());
                    finish.silver_table = Some(result.table);
                    finish.silver_rows_seen = Some(result.rows_seen);
                    finish.silver_rows_written = Some(result.rows_written);
                    finish.silver_rows_failed =
                        Some((result.rows_seen - result.rows_written).max(0));
                    finish.silver_from_date = result.coverage_from;
                    finish.silver_to_date = result.coverage_to;
                    finish.silver_finished_at = Some(Utc::now());
                    if let Err(e) = self.ledger.upsert(finish).await {
                        warn!(run_id = %ctx.run_id, unit = %identity, "silver finish upsert failed: {e}");
                    }

                    promoted_file_ids.push(entry.file_id.clone());
                }
                Err(promotion_error) => {
                    warn!(
                        run_id = %ctx.run_id,
                        unit = %identity,
                        file_id = %entry.file_id,
                        "silver promotion failed: {promotion_error}"
                    );
                    ctx.counters.entry_failed();

                    let failure = LedgerEntry::silver_failure_marker(
                        &entry.run_id,
                        &entry.file_id,
                        &identity,
                        promotion_error.to_string(),
                    );
                    if let Err(e) = self.ledger.upsert(failure).await {
                        warn!(run_id = %ctx.run_id, unit = %identity, "silver failure upsert failed: {e}");
                    }
                }
            }
        }

        Ok((promoted_file_ids, total_rows))
    }

    /// Steps 2-10 for one ledger entry. Every error returned here is
    /// recorded as that entry's Silver failure by the caller.
    async fn promote_entry(
        &self,
        ctx: &RunContext,
        entry: &LedgerEntry,
    ) -> std::result::Result<EntryResult, PromotionError> {
        let identity = entry.identity();

        // Contract resolution: exact identity, then ignoring the
        // discriminator, then ignoring the key.
        let contract = self
            .contracts
            .resolve(&identity)
            .ok_or_else(|| PromotionError::MissingSchemaContract(identity.clone()))?;
        if contract.requires_key && entry.key.is_empty() {
            return Err(PromotionError::KeyRequiredButAbsent(identity.clone()));
        }

        // Load the raw payload the entry points at.
        let path = entry
            .bronze_file
            .as_deref()
            .ok_or_else(|| PromotionError::PayloadMissing {
                path: "<no bronze file recorded>".to_string(),
            })?;
        let payload = self.payloads.load(path)?;
        let raw_rows = payload
            .content
            .rows()
            .ok_or_else(|| PromotionError::PayloadShape {
                path: path.to_string(),
                message: "content is not a row list".to_string(),
            })?;

        // Typed projection: contract columns, or the registered mapper
        // when the contract declares none.
        let mapper;
        let projector = if !contract.columns.is_empty() {
            Projector::Columns(&contract.columns)
        } else {
            mapper = self
                .mappers
                .resolve(&contract.dataset)
                .ok_or_else(|| PromotionError::MissingSchemaContract(identity.clone()))?;
            Projector::Mapper(mapper.as_ref())
        };
        let mut batch = project_rows(raw_rows, &projector);
        let rows_seen = batch.len() as i64;

        // Provenance columns.
        batch.add_column(COL_SOURCE_FILE_ID, CellValue::Str(entry.file_id.clone()));
        batch.add_column(COL_RUN_ID, CellValue::Str(ctx.run_id.clone()));
        batch.add_column(
            COL_INGESTED_AT,
            CellValue::DateTime(payload.fetched_at.naive_utc()),
        );

        // Row-date column, with the ledger-coverage fallback chain.
        let row_date_column = contract
            .row_date_column
            .clone()
            .unwrap_or_else(|| DEFAULT_ROW_DATE_COLUMN.to_string());
        if !batch.has_column(&row_date_column) {
            let fill = entry
                .bronze_to_date
                .or(entry.bronze_from_date)
                .map(CellValue::Date)
                .unwrap_or(CellValue::DateTime(payload.fetched_at.naive_utc()));
            batch.add_column(&row_date_column, fill);
        }

        // Declared key columns must exist in the projected rows.
        let key_columns = contract.key_columns.clone();
        let key_indices = batch
            .key_indices(&key_columns)
            .map_err(|column| PromotionError::MissingKeyColumn { column })?;

        // Watermark filter: keep rows strictly newer than the prior
        // Silver watermark.
        if self.config.run.watermark_mode == WatermarkMode::Strict {
            let watermark = self
                .ledger
                .latest_watermark(&identity, Stage::Silver)
                .await
                .map_err(|e| PromotionError::Store(e.to_string()))?;
            if let Some(watermark) = watermark {
                if let Some(date_index) = batch.column_index(&row_date_column) {
                    batch.retain_rows(|row| {
                        row.get(date_index)
                            .and_then(CellValue::as_date)
                            .map(|date| date > watermark)
                            .unwrap_or(false)
                    });
                }
            }
        }

        let table = self.config.silver_table_name(&contract.dataset);

        if batch.is_empty() {
            return Ok(EntryResult {
                table,
                rows_seen: 0,
                rows_written: 0,
                coverage_from: None,
                coverage_to: None,
            });
        }

        // In-memory dedup, then the anti-join against the target table.
        // A keyless dataset has no grain to dedup on and merges as append.
        if !key_columns.is_empty() {
            batch = dedupe_keep_last(batch, &key_indices);
            if self
                .tables
                .table_exists(&table)
                .await
                .map_err(|e| PromotionError::Store(e.to_string()))?
            {
                let existing = self
                    .tables
                    .existing_keys(&table, &key_columns)
                    .await
                    .map_err(|e| PromotionError::Store(e.to_string()))?;
                batch = anti_join(batch, &existing, &key_indices);
            }
        }

        let (coverage_from, coverage_to) = batch.date_range(&row_date_column);

        // Chunked merge: one transaction per non-empty chunk.
        let mut rows_written: usize = 0;
        for chunk in partition_by_date(batch, self.config.run.chunk_strategy, &row_date_column) {
            debug!(
                run_id = %ctx.run_id,
                table = %table,
                partition = %chunk.partition,
                rows = chunk.rows.len(),
                "merging chunk"
            );
            rows_written += self
                .tables
                .merge_chunk(&table, &key_columns, &chunk.rows)
                .await
                .map_err(|e| PromotionError::Store(e.to_string()))?;
        }

        Ok(EntryResult {
            table,
            rows_seen,
            rows_written: rows_written as i64,
            coverage_from,
            coverage_to,
        })
    }
}
