//! Storage error types and conversion to core errors.
//!
//! Driver-specific errors never leave this crate: they are converted to
//! the database-agnostic `tidemark_core::errors::DatabaseError` at the
//! boundary.

use thiserror::Error;

use tidemark_core::errors::{DatabaseError, Error};

/// SQLite-side error type.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to open database: {0}")]
    Connection(String),

    #[error("Invalid SQL identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Writer actor unavailable: {0}")]
    WriterGone(String),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        let database = match err {
            StorageError::Connection(message) => DatabaseError::ConnectionFailed(message),
            StorageError::Sqlite(rusqlite::Error::QueryReturnedNoRows) => {
                DatabaseError::NotFound("query returned no rows".to_string())
            }
            StorageError::Sqlite(e) => DatabaseError::QueryFailed(e.to_string()),
            StorageError::InvalidIdentifier(message) => DatabaseError::QueryFailed(message),
            StorageError::WriterGone(message) => DatabaseError::Internal(message),
        };
        Error::Database(database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_to_core_error() {
        let err: Error = StorageError::Connection("no such file".to_string()).into();
        assert!(matches!(
            err,
            Error::Database(DatabaseError::ConnectionFailed(_))
        ));

        let err: Error = StorageError::InvalidIdentifier("drop table".to_string()).into();
        assert!(matches!(err, Error::Database(DatabaseError::QueryFailed(_))));
    }
}
