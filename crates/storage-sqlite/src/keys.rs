//! Key catalog reader backing discovery.

use async_trait::async_trait;
use rusqlite::params;

use tidemark_core::config::KeyCatalogSource;
use tidemark_core::errors::Result;
use tidemark_core::silver::KeyCatalogTrait;

use crate::db::StoreHandle;
use crate::errors::StorageError;

/// Reads the key universe from the instrument dimension table.
///
/// Before the first discovery run the table does not exist yet; that is an
/// empty universe, not an error.
pub struct KeyCatalogRepository {
    store: StoreHandle,
    source: KeyCatalogSource,
}

impl KeyCatalogRepository {
    pub fn new(store: StoreHandle, source: KeyCatalogSource) -> Self {
        Self { store, source }
    }
}

fn quote_ident(name: &str) -> std::result::Result<String, StorageError> {
    let valid = !name.is_empty()
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

#[async_trait]
impl KeyCatalogTrait for KeyCatalogRepository {
    async fn list_keys(&self, limit: Option<usize>) -> Result<Vec<String>> {
        let source = self.source.clone();
        self.store
            .exec(move |tx| {
                let exists: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    params![source.table],
                    |row| row.get(0),
                )?;
                if exists == 0 {
                    return Ok(Vec::new());
                }

                let sql = format!(
                    "SELECT DISTINCT {column} FROM {table}
                     WHERE {column} IS NOT NULL AND {column} != ''
                     ORDER BY {column}",
                    column = quote_ident(&source.column)?,
                    table = quote_ident(&source.table)?,
                );
                let mut statement = tx.prepare(&sql)?;
                let mut keys = statement
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                if let Some(limit) = limit {
                    keys.truncate(limit);
                }
                Ok(keys)
            })
            .await
    }
}
