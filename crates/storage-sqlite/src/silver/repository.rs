//! Repository for dynamic Silver target tables.
//!
//! Target tables have no compile-time schema: each one is created inside
//! the first merge transaction from the chunk being merged, with a unique
//! index over the declared key columns backing the merge-upsert.

use std::collections::HashSet;

use async_trait::async_trait;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params, params_from_iter, Transaction};

use tidemark_core::errors::Result;
use tidemark_core::rows::{CellValue, RowBatch};
use tidemark_core::silver::SilverStoreTrait;

use crate::db::StoreHandle;
use crate::errors::StorageError;

pub struct SilverTableRepository {
    store: StoreHandle,
}

impl SilverTableRepository {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }
}

/// Quotes an identifier after validating its syntax. Identifiers reach
/// this crate from configuration (table prefixes, contract column names),
/// so structural validation is enough.
fn quote_ident(name: &str) -> std::result::Result<String, StorageError> {
    let valid = !name.is_empty()
        && name.len() <= 128
        && name
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false)
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(StorageError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{name}\""))
}

/// Column affinity derived from the first non-null cell of the column.
fn column_affinity(batch: &RowBatch, index: usize) -> &'static str {
    for row in &batch.rows {
        match row.get(index) {
            Some(CellValue::Int(_)) | Some(CellValue::Bool(_)) => return "INTEGER",
            Some(CellValue::Float(_)) => return "REAL",
            Some(CellValue::Null) | None => continue,
            Some(_) => return "TEXT",
        }
    }
    "TEXT"
}

/// Cell to SQLite value. Must stay consistent with
/// [`CellValue::render_key`] so anti-join reads match what merges wrote.
fn cell_to_value(cell: &CellValue) -> Value {
    match cell {
        CellValue::Null => Value::Null,
        CellValue::Str(s) => Value::Text(s.clone()),
        CellValue::Int(i) => Value::Integer(*i),
        CellValue::Float(f) => Value::Real(*f),
        CellValue::Bool(b) => Value::Integer(i64::from(*b)),
        CellValue::Date(d) => Value::Text(d.format("%Y-%m-%d").to_string()),
        CellValue::DateTime(dt) => Value::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        CellValue::Json(v) => Value::Text(v.to_string()),
    }
}

/// Canonical text of a stored value, matching `CellValue::render_key`.
fn render_stored_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(_) => String::new(),
    }
}

fn table_exists_tx(
    tx: &Transaction<'_>,
    table: &str,
) -> std::result::Result<bool, StorageError> {
    let count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn create_table_from_batch(
    tx: &Transaction<'_>,
    table: &str,
    key_columns: &[String],
    batch: &RowBatch,
) -> std::result::Result<(), StorageError> {
    let table_quoted = quote_ident(table)?;
    let definitions = batch
        .columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            Ok(format!(
                "{} {}",
                quote_ident(column)?,
                column_affinity(batch, index)
            ))
        })
        .collect::<std::result::Result<Vec<_>, StorageError>>()?
        .join(", ");
    tx.execute(&format!("CREATE TABLE {table_quoted} ({definitions})"), [])?;

    if !key_columns.is_empty() {
        let index_quoted = quote_ident(&format!("idx_{table}_grain"))?;
        let keys = key_columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<std::result::Result<Vec<_>, StorageError>>()?
            .join(", ");
        tx.execute(
            &format!("CREATE UNIQUE INDEX {index_quoted} ON {table_quoted} ({keys})"),
            [],
        )?;
    }
    Ok(())
}

fn merge_sql(
    table: &str,
    key_columns: &[String],
    columns: &[String],
) -> std::result::Result<String, StorageError> {
    let table_quoted = quote_ident(table)?;
    let quoted_columns = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<std::result::Result<Vec<_>, StorageError>>()?;
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "INSERT INTO {table_quoted} ({}) VALUES ({placeholders})",
        quoted_columns.join(", ")
    );

    if !key_columns.is_empty() {
        let conflict_target = key_columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<std::result::Result<Vec<_>, StorageError>>()?
            .join(", ");
        let updates: Vec<String> = columns
            .iter()
            .zip(&quoted_columns)
            .filter(|(name, _)| !key_columns.contains(name))
            .map(|(_, quoted)| format!("{quoted} = excluded.{quoted}"))
            .collect();
        if updates.is_empty() {
            sql.push_str(&format!(" ON CONFLICT ({conflict_target}) DO NOTHING"));
        } else {
            sql.push_str(&format!(
                " ON CONFLICT ({conflict_target}) DO UPDATE SET {}",
                updates.join(", ")
            ));
        }
    }
    Ok(sql)
}

#[async_trait]
impl SilverStoreTrait for SilverTableRepository {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        let table = table.to_string();
        self.store
            .exec(move |tx| table_exists_tx(tx, &table))
            .await
    }

    async fn existing_keys(
        &self,
        table: &str,
        key_columns: &[String],
    ) -> Result<HashSet<Vec<String>>> {
        let table = table.to_string();
        let key_columns = key_columns.to_vec();
        self.store
            .exec(move |tx| {
                if !table_exists_tx(tx, &table)? {
                    return Ok(HashSet::new());
                }
                let selected = key_columns
                    .iter()
                    .map(|c| quote_ident(c))
                    .collect::<std::result::Result<Vec<_>, StorageError>>()?
                    .join(", ");
                let mut statement =
                    tx.prepare(&format!("SELECT {selected} FROM {}", quote_ident(&table)?))?;
                let mut keys = HashSet::new();
                let mut rows = statement.query([])?;
                while let Some(row) = rows.next()? {
                    let tuple = (0..key_columns.len())
                        .map(|i| row.get_ref(i).map(render_stored_value))
                        .collect::<rusqlite::Result<Vec<String>>>()?;
                    keys.insert(tuple);
                }
                Ok(keys)
            })
            .await
    }

    async fn merge_chunk(
        &self,
        table: &str,
        key_columns: &[String],
        chunk: &RowBatch,
    ) -> Result<usize> {
        if chunk.is_empty() {
            return Ok(0);
        }
        let table = table.to_string();
        let key_columns = key_columns.to_vec();
        let chunk = chunk.clone();
        self.store
            .exec(move |tx| {
                if !table_exists_tx(tx, &table)? {
                    create_table_from_batch(tx, &table, &key_columns, &chunk)?;
                }

                let sql = merge_sql(&table, &key_columns, &chunk.columns)?;
                let mut statement = tx.prepare(&sql)?;
                let mut written = 0usize;
                for row in &chunk.rows {
                    written += statement.execute(params_from_iter(row.iter().map(cell_to_value)))?;
                }
                Ok(written)
            })
            .await
    }

    async fn count_rows(&self, table: &str) -> Result<i64> {
        let table = table.to_string();
        self.store
            .exec(move |tx| {
                if !table_exists_tx(tx, &table)? {
                    return Ok(0);
                }
                let count: i64 = tx.query_row(
                    &format!("SELECT COUNT(*) FROM {}", quote_ident(&table)?),
                    [],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init, open_in_memory, spawn_writer};
    use chrono::NaiveDate;

    fn repository() -> SilverTableRepository {
        let conn = open_in_memory().unwrap();
        init(&conn).unwrap();
        SilverTableRepository::new(spawn_writer(conn))
    }

    fn key_columns() -> Vec<String> {
        vec!["ticker".to_string(), "date".to_string()]
    }

    fn batch(rows: &[(&str, u32, f64)]) -> RowBatch {
        let mut b = RowBatch::new(vec![
            "ticker".to_string(),
            "date".to_string(),
            "market_cap".to_string(),
        ]);
        for (ticker, day, value) in rows {
            b.push_row(vec![
                CellValue::Str(ticker.to_string()),
                CellValue::Date(NaiveDate::from_ymd_opt(2026, 1, *day).unwrap()),
                CellValue::Float(*value),
            ]);
        }
        b
    }

    #[tokio::test]
    async fn test_merge_creates_table_and_writes_rows() {
        let repo = repository();
        let written = repo
            .merge_chunk(
                "silver_company_market_cap",
                &key_columns(),
                &batch(&[("AAPL", 15, 1.0), ("AAPL", 16, 2.0)]),
            )
            .await
            .unwrap();
        assert_eq!(written, 2);
        assert!(repo.table_exists("silver_company_market_cap").await.unwrap());
        assert_eq!(repo.count_rows("silver_company_market_cap").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_merge_updates_on_key_match() {
        let repo = repository();
        let table = "silver_company_market_cap";

        repo.merge_chunk(table, &key_columns(), &batch(&[("AAPL", 15, 1.0)]))
            .await
            .unwrap();
        // Same key, corrected value: the merge updates instead of
        // inserting a duplicate.
        repo.merge_chunk(table, &key_columns(), &batch(&[("AAPL", 15, 9.0)]))
            .await
            .unwrap();

        assert_eq!(repo.count_rows(table).await.unwrap(), 1);

        let keys = repo.existing_keys(table, &key_columns()).await.unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys.contains(&vec!["AAPL".to_string(), "2026-01-15".to_string()]));
    }

    #[tokio::test]
    async fn test_existing_keys_render_matches_cell_render() {
        let repo = repository();
        let table = "silver_company_market_cap";
        let chunk = batch(&[("AAPL", 15, 1.0), ("MSFT", 16, 2.0)]);
        repo.merge_chunk(table, &key_columns(), &chunk).await.unwrap();

        let stored = repo.existing_keys(table, &key_columns()).await.unwrap();
        let indices = [0, 1];
        for row in &chunk.rows {
            assert!(stored.contains(&RowBatch::key_tuple(row, &indices)));
        }
    }

    #[tokio::test]
    async fn test_existing_keys_of_missing_table_is_empty() {
        let repo = repository();
        let keys = repo.existing_keys("silver_nothing", &key_columns()).await.unwrap();
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn test_keyless_merge_appends() {
        let repo = repository();
        let table = "silver_event_log";
        repo.merge_chunk(table, &[], &batch(&[("AAPL", 15, 1.0)]))
            .await
            .unwrap();
        repo.merge_chunk(table, &[], &batch(&[("AAPL", 15, 1.0)]))
            .await
            .unwrap();
        assert_eq!(repo.count_rows(table).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_invalid_identifier_is_rejected() {
        let repo = repository();
        let result = repo
            .merge_chunk("bad; drop table", &[], &batch(&[("AAPL", 15, 1.0)]))
            .await;
        assert!(result.is_err());
    }
}
