//! Ledger domain models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::UnitIdentity;

/// Pipeline stage of a ledger column group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Bronze,
    Silver,
    Gold,
}

impl Stage {
    /// Column-name prefix of this stage's field group.
    pub fn prefix(&self) -> &'static str {
        match self {
            Stage::Bronze => "bronze",
            Stage::Silver => "silver",
            Stage::Gold => "gold",
        }
    }
}

/// One ledger row: the lifecycle of a single ingested unit within a run.
///
/// Exactly one row exists per `(run_id, file_id)`. All stage fields are
/// `Option` so partially-filled entries can be upserted as each stage
/// progresses - the storage layer merges with COALESCE semantics and never
/// blanks a field the entry does not carry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub run_id: String,
    pub file_id: String,

    // Unit identity
    pub domain: String,
    pub source: String,
    pub dataset: String,
    pub discriminator: String,
    pub key: String,

    // Bronze stage
    pub bronze_file: Option<String>,
    pub bronze_error: Option<String>,
    pub bronze_rows: Option<i64>,
    pub bronze_from_date: Option<NaiveDate>,
    pub bronze_to_date: Option<NaiveDate>,
    pub bronze_started_at: Option<DateTime<Utc>>,
    pub bronze_finished_at: Option<DateTime<Utc>>,
    pub bronze_can_promote: Option<bool>,

    // Silver stage
    pub silver_table: Option<String>,
    pub silver_error: Option<String>,
    pub silver_rows_seen: Option<i64>,
    pub silver_rows_written: Option<i64>,
    pub silver_rows_failed: Option<i64>,
    pub silver_from_date: Option<NaiveDate>,
    pub silver_to_date: Option<NaiveDate>,
    pub silver_started_at: Option<DateTime<Utc>>,
    pub silver_finished_at: Option<DateTime<Utc>>,

    // Gold stage (maintained by the aggregation layer, external to this core)
    pub gold_table: Option<String>,
    pub gold_error: Option<String>,
    pub gold_rows: Option<i64>,
    pub gold_from_date: Option<NaiveDate>,
    pub gold_to_date: Option<NaiveDate>,
    pub gold_started_at: Option<DateTime<Utc>>,
    pub gold_finished_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    /// A fresh entry carrying only identity.
    pub fn new(run_id: &str, file_id: &str, identity: &UnitIdentity) -> Self {
        Self {
            run_id: run_id.to_string(),
            file_id: file_id.to_string(),
            domain: identity.domain.clone(),
            source: identity.source.clone(),
            dataset: identity.dataset.clone(),
            discriminator: identity.discriminator.clone(),
            key: identity.key.clone(),
            ..Default::default()
        }
    }

    pub fn identity(&self) -> UnitIdentity {
        UnitIdentity::new(
            self.domain.clone(),
            self.source.clone(),
            self.dataset.clone(),
            self.discriminator.clone(),
            self.key.clone(),
        )
    }

    /// A minimal entry updating only the Silver-start marker.
    pub fn silver_start_marker(run_id: &str, file_id: &str, identity: &UnitIdentity) -> Self {
        let mut entry = Self::new(run_id, file_id, identity);
        entry.silver_started_at = Some(Utc::now());
        entry
    }

    /// A minimal entry recording a Silver failure.
    pub fn silver_failure_marker(
        run_id: &str,
        file_id: &str,
        identity: &UnitIdentity,
        error: String,
    ) -> Self {
        let mut entry = Self::new(run_id, file_id, identity);
        entry.silver_error = Some(error);
        entry.silver_finished_at = Some(Utc::now());
        entry
    }
}
