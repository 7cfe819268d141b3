//! Shared constants for the pipeline.

/// Domain that discovers tradable instruments. It always runs first so the
/// downstream domains can resolve keys against the refreshed catalog.
pub const DOMAIN_INSTRUMENTS: &str = "instruments";

/// Default domain execution order. Discovery first, then the keyed domains.
pub const DEFAULT_DOMAIN_ORDER: &[&str] = &[
    DOMAIN_INSTRUMENTS,
    "prices",
    "fundamentals",
    "corporate-actions",
    "estimates",
];

/// Marker embedded in Bronze error text when an API rejects a key as
/// permanently invalid. The discovery run filters these keys out.
pub const INVALID_KEY_MARKER: &str = "invalid key";

/// Provenance columns attached to every projected Silver row.
pub const COL_SOURCE_FILE_ID: &str = "source_file_id";
pub const COL_RUN_ID: &str = "run_id";
pub const COL_INGESTED_AT: &str = "ingested_at";

/// Fallback row-date column name when a contract does not declare one.
pub const DEFAULT_ROW_DATE_COLUMN: &str = "date";

/// Date formats accepted when scanning payload rows for business dates.
pub const ROW_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%z",
];

/// Default number of keys fetched per orchestrator chunk.
pub const DEFAULT_TICKER_CHUNK_SIZE: usize = 10;

/// Query variable names that are redacted in persisted request snapshots.
pub const SECRET_QUERY_VARS: &[&str] = &["apikey", "api_key", "token"];

/// Replacement for redacted secret values.
pub const REDACTED: &str = "***";
