//! Silver-side storage traits, implemented by the storage crate.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::errors::Result;
use crate::rows::RowBatch;

/// Target-table operations of the Silver store.
///
/// Tables are created at runtime from projected batches; there is no
/// compile-time schema. Each `merge_chunk` call is one transaction.
#[async_trait]
pub trait SilverStoreTrait: Send + Sync {
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// The key tuples already present in the table, rendered with the same
    /// canonical text encoding as
    /// [`CellValue::render_key`](crate::rows::CellValue::render_key).
    /// Empty when the table does not exist.
    async fn existing_keys(
        &self,
        table: &str,
        key_columns: &[String],
    ) -> Result<HashSet<Vec<String>>>;

    /// Merges one chunk into the table inside a single transaction:
    /// creates the table (and its unique key index) from the chunk when it
    /// does not exist, otherwise updates on key match and inserts on miss,
    /// writing all projected columns. Returns the number of rows written.
    async fn merge_chunk(
        &self,
        table: &str,
        key_columns: &[String],
        chunk: &RowBatch,
    ) -> Result<usize>;

    /// Row count of a table; diagnostics and tests.
    async fn count_rows(&self, table: &str) -> Result<i64>;
}

/// Resolves the key universe (tickers) from the instrument dimension.
#[async_trait]
pub trait KeyCatalogTrait: Send + Sync {
    /// Known keys in deterministic order, optionally bounded.
    async fn list_keys(&self, limit: Option<usize>) -> Result<Vec<String>>;
}
