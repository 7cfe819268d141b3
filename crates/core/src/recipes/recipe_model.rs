//! Recipe domain model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How a dataset advances over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    /// Incremental date-window dataset: each fetch covers
    /// `[from_date, to_date]` and the watermark advances.
    Interval,
    /// Point-in-time snapshot dataset: each fetch captures the state as of
    /// the ingestion date, discriminated by that date.
    Calendar,
}

/// Wire format of the endpoint's response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Json,
    Csv,
}

fn default_row_date_field() -> String {
    "date".to_string()
}

fn default_lookback_days() -> i64 {
    30
}

/// A declarative definition of one fetchable dataset endpoint.
///
/// Recipes are configuration: they are deserialized from the catalog file
/// and never constructed ad hoc by pipeline code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub domain: String,
    pub source: String,
    pub dataset: String,
    /// Endpoint path template, e.g.
    /// `/v3/historical-market-capitalization/{ticker}`.
    pub endpoint: String,
    /// Query variables with named placeholders (`{ticker}`, `{from_date}`,
    /// `{to_date}`, `{one_month_back}`, `{limit}`, `{period}`) resolved at
    /// request-build time.
    #[serde(default)]
    pub query_template: BTreeMap<String, String>,
    pub cadence: Cadence,
    /// Cooldown: a window younger than this many days is skipped as "too
    /// soon" rather than fetched.
    #[serde(default)]
    pub min_age_days: i64,
    /// Whether the dataset is fetched once per key (ticker) or globally.
    #[serde(default)]
    pub per_key: bool,
    /// Declared key columns of the Silver grain.
    #[serde(default)]
    pub key_columns: Vec<String>,
    /// Payload field scanned for business dates.
    #[serde(default = "default_row_date_field")]
    pub row_date_field: String,
    #[serde(default)]
    pub format: ResponseFormat,
    /// Whether an empty-but-successful payload is still promotable.
    #[serde(default)]
    pub allows_empty_content: bool,
    /// Days of history requested when no watermark exists yet.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
    /// Value substituted for `{limit}`.
    #[serde(default)]
    pub limit: Option<u32>,
    /// Value substituted for `{period}` (e.g. `quarter`).
    #[serde(default)]
    pub period: Option<String>,
    /// Subscription tier required by the endpoint; runs can filter on it.
    #[serde(default)]
    pub plan: Option<String>,
    /// Marks the recipe that populates the instrument key catalog.
    #[serde(default)]
    pub discovery: bool,
}
