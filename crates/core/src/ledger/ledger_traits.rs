//! Ledger persistence trait, implemented by the storage crate.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::errors::Result;
use crate::identity::UnitIdentity;

use super::ledger_model::{LedgerEntry, Stage};

/// Persistence operations of the ingestion ledger.
///
/// Every operation is transactional against the embedded store. Callers
/// must treat upsert failures on Bronze writes as fatal for the current
/// request (data-loss risk); Silver/Gold status updates may be
/// log-and-continue since the Bronze record remains the durable source of
/// truth.
#[async_trait]
pub trait LedgerRepositoryTrait: Send + Sync {
    /// Insert-or-update by `(run_id, file_id)`. Fields the entry does not
    /// carry (`None`) never blank previously stored values.
    async fn upsert(&self, entry: LedgerEntry) -> Result<()>;

    /// `MAX(<stage>_to_date)` for the identity, or `None` when the
    /// identity has no coverage yet.
    async fn latest_watermark(
        &self,
        identity: &UnitIdentity,
        stage: Stage,
    ) -> Result<Option<NaiveDate>>;

    /// Most recent successful (non-errored) Bronze start time for the
    /// identity; backs the same-day duplicate-fetch guard.
    async fn latest_ingestion_ts(&self, identity: &UnitIdentity)
        -> Result<Option<DateTime<Utc>>>;

    /// Entries eligible for promotion: Bronze succeeded and Silver is
    /// unrecorded or wrote zero rows. Ordered oldest-fetched-first, nulls
    /// last. Optionally filtered by domain.
    async fn list_promotable(&self, domain: Option<&str>) -> Result<Vec<LedgerEntry>>;

    /// Distinct keys whose Bronze error marks them permanently invalid.
    async fn list_failed_keys(&self, error_marker: &str) -> Result<Vec<String>>;

    /// Distinct keys that have at least one successful Bronze record.
    async fn list_seen_keys(&self) -> Result<Vec<String>>;

    /// Point lookup, mainly for tests and diagnostics.
    async fn get(&self, run_id: &str, file_id: &str) -> Result<Option<LedgerEntry>>;
}
