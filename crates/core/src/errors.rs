//! Core error types for the Tidemark pipeline.
//!
//! This module defines database-agnostic error types. Storage-specific
//! errors (from SQLite) are converted to these types by the storage layer.

use thiserror::Error;

use crate::identity::UnitIdentity;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the pipeline.
///
/// Database-specific errors are wrapped in string form to keep this type
/// database-agnostic.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Promotion failed: {0}")]
    Promotion(#[from] PromotionError),

    #[error("Recipe catalog error: {0}")]
    Catalog(String),

    #[error("Raw payload store error: {0}")]
    Payload(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Failed to load configuration: {0}")]
    ConfigIO(String),

    #[error("Invalid configuration value: {0}")]
    InvalidConfigValue(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Database-agnostic error type for storage operations.
///
/// This enum uses `String` for all error details, allowing the storage
/// layer to convert driver-specific errors into this format.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open the database.
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// A database query failed to execute.
    #[error("Database query failed: {0}")]
    QueryFailed(String),

    /// The requested record was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A database transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Internal/unexpected database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

/// Validation errors for recipes, requests, and keys.
///
/// A "too soon" cooldown miss is deliberately NOT an error: it is a silent
/// skip modeled by [`RequestGate::TooSoon`](crate::recipes::RequestGate).
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Unknown domain '{0}'")]
    UnknownDomain(String),

    #[error("Unknown cadence '{0}'")]
    UnknownCadence(String),

    #[error("Recipe '{0}' is malformed: {1}")]
    MalformedRecipe(String, String),

    #[error("Malformed key '{0}'")]
    MalformedKey(String),

    #[error("Required field '{0}' is missing")]
    MissingField(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Errors raised while promoting one ledger entry to Silver.
///
/// These are caught per-entry by the promotion engine, recorded on the
/// entry's Silver fields, and never abort the batch.
#[derive(Error, Debug)]
pub enum PromotionError {
    #[error("No schema contract matches {0}")]
    MissingSchemaContract(UnitIdentity),

    #[error("Contract for {0} requires a key but the entry has none")]
    KeyRequiredButAbsent(UnitIdentity),

    #[error("Declared key column '{column}' is absent from the projected rows")]
    MissingKeyColumn { column: String },

    #[error("Raw payload file missing: {path}")]
    PayloadMissing { path: String },

    #[error("Raw payload at {path} is not a recognized payload shape: {message}")]
    PayloadShape { path: String, message: String },

    #[error("Target table write failed: {0}")]
    Store(String),
}

// === From implementations for common error types ===

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Payload(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Validation(ValidationError::InvalidInput(err.to_string()))
    }
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}
