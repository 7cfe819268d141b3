//! Run-scoped fetch requests derived from recipes.

use chrono::{Duration, NaiveDate};

use crate::constants::{REDACTED, SECRET_QUERY_VARS};
use crate::errors::ValidationError;
use crate::identity::UnitIdentity;

use super::recipe_model::{Cadence, Recipe};

/// Outcome of the pre-flight request gate.
///
/// "Too soon" is deliberately not an error: it is a silent skip with no
/// payload write and no ledger row, distinguishing a cooldown miss from a
/// hard failure.
#[derive(Debug)]
pub enum RequestGate {
    Runnable,
    TooSoon {
        elapsed_days: i64,
        min_age_days: i64,
    },
    Invalid(ValidationError),
}

/// One concrete fetch: a recipe plus the run-scoped values resolved for it.
#[derive(Clone, Debug)]
pub struct FetchRequest {
    pub recipe: Recipe,
    pub run_id: String,
    pub ingestion_date: NaiveDate,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    /// Resolved key; empty for global datasets.
    pub key: String,
}

impl FetchRequest {
    /// Builds the request for one recipe and (optional) key.
    ///
    /// The initial window is `[ingestion_date - lookback_days,
    /// ingestion_date]`; the fetch coordinator overrides `from_date` from
    /// the ledger watermark before gating.
    pub fn build(recipe: &Recipe, run_id: &str, ingestion_date: NaiveDate, key: &str) -> Self {
        Self {
            recipe: recipe.clone(),
            run_id: run_id.to_string(),
            ingestion_date,
            from_date: ingestion_date - Duration::days(recipe.lookback_days.max(0)),
            to_date: ingestion_date,
            key: key.to_string(),
        }
    }

    /// The run-scoped discriminator: calendar-cadence snapshots are
    /// discriminated by the ingestion date, interval datasets are not.
    pub fn discriminator(&self) -> String {
        match self.recipe.cadence {
            Cadence::Calendar => self.ingestion_date.format("%Y-%m-%d").to_string(),
            Cadence::Interval => String::new(),
        }
    }

    pub fn identity(&self) -> UnitIdentity {
        UnitIdentity::new(
            self.recipe.domain.clone(),
            self.recipe.source.clone(),
            self.recipe.dataset.clone(),
            self.discriminator(),
            self.key.clone(),
        )
    }

    /// Pre-flight gate: structural validity first, then the cooldown.
    pub fn gate(&self) -> RequestGate {
        if self.recipe.domain.is_empty()
            || self.recipe.source.is_empty()
            || self.recipe.dataset.is_empty()
        {
            return RequestGate::Invalid(ValidationError::MalformedRecipe(
                self.recipe.dataset.clone(),
                "domain, source and dataset must be non-empty".to_string(),
            ));
        }
        if self.recipe.endpoint.is_empty() {
            return RequestGate::Invalid(ValidationError::MalformedRecipe(
                self.recipe.dataset.clone(),
                "endpoint must be non-empty".to_string(),
            ));
        }
        if self.recipe.per_key && !is_well_formed_key(&self.key) {
            return RequestGate::Invalid(ValidationError::MalformedKey(self.key.clone()));
        }

        let elapsed_days = (self.ingestion_date - self.from_date).num_days();
        if elapsed_days <= self.recipe.min_age_days {
            return RequestGate::TooSoon {
                elapsed_days,
                min_age_days: self.recipe.min_age_days,
            };
        }

        RequestGate::Runnable
    }

    /// The endpoint path with placeholders substituted.
    pub fn resolved_path(&self) -> String {
        self.substitute(&self.recipe.endpoint)
    }

    /// The full URL against a base.
    pub fn resolved_url(&self, base_url: &str) -> String {
        format!(
            "{}{}",
            base_url.trim_end_matches('/'),
            self.resolved_path()
        )
    }

    /// Query variables with placeholders substituted and the API key
    /// appended.
    pub fn resolved_query(&self, api_key: &str) -> Vec<(String, String)> {
        let mut query: Vec<(String, String)> = self
            .recipe
            .query_template
            .iter()
            .map(|(name, template)| (name.clone(), self.substitute(template)))
            .collect();
        if !api_key.is_empty() {
            query.push(("apikey".to_string(), api_key.to_string()));
        }
        query
    }

    /// Query variables as persisted in the payload snapshot: same shape,
    /// secrets redacted.
    pub fn redacted_query(&self, api_key: &str) -> Vec<(String, String)> {
        self.resolved_query(api_key)
            .into_iter()
            .map(|(name, value)| {
                if SECRET_QUERY_VARS.contains(&name.as_str()) {
                    (name, REDACTED.to_string())
                } else {
                    (name, value)
                }
            })
            .collect()
    }

    fn substitute(&self, template: &str) -> String {
        let one_month_back = self.from_date - Duration::days(30);
        template
            .replace("{ticker}", &self.key)
            .replace("{from_date}", &self.from_date.format("%Y-%m-%d").to_string())
            .replace("{to_date}", &self.to_date.format("%Y-%m-%d").to_string())
            .replace(
                "{one_month_back}",
                &one_month_back.format("%Y-%m-%d").to_string(),
            )
            .replace(
                "{limit}",
                &self
                    .recipe
                    .limit
                    .map(|l| l.to_string())
                    .unwrap_or_default(),
            )
            .replace("{period}", self.recipe.period.as_deref().unwrap_or(""))
    }
}

/// Key syntax: non-empty, starts alphanumeric, uppercase alphanumerics with
/// `.` and `-` only, bounded length.
fn is_well_formed_key(key: &str) -> bool {
    if key.is_empty() || key.len() > 24 {
        return false;
    }
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    key.chars().all(|c| {
        (c.is_ascii_alphanumeric() && !c.is_ascii_lowercase()) || c == '.' || c == '-'
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn recipe() -> Recipe {
        let mut query_template = BTreeMap::new();
        query_template.insert("from".to_string(), "{from_date}".to_string());
        query_template.insert("to".to_string(), "{to_date}".to_string());

        Recipe {
            domain: "prices".to_string(),
            source: "finprices".to_string(),
            dataset: "company-market-cap".to_string(),
            endpoint: "/v3/historical-market-capitalization/{ticker}".to_string(),
            query_template,
            cadence: Cadence::Interval,
            min_age_days: 0,
            per_key: true,
            key_columns: vec!["ticker".to_string(), "date".to_string()],
            row_date_field: "date".to_string(),
            format: Default::default(),
            allows_empty_content: false,
            lookback_days: 30,
            limit: Some(500),
            period: None,
            plan: None,
            discovery: false,
        }
    }

    fn ingestion_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()
    }

    #[test]
    fn test_window_defaults_to_lookback() {
        let request = FetchRequest::build(&recipe(), "run-1", ingestion_date(), "AAPL");
        assert_eq!(request.from_date, ingestion_date() - Duration::days(30));
        assert_eq!(request.to_date, ingestion_date());
    }

    #[test]
    fn test_too_soon_gate() {
        let mut r = recipe();
        r.min_age_days = 90;
        let request = FetchRequest::build(&r, "run-1", ingestion_date(), "AAPL");
        match request.gate() {
            RequestGate::TooSoon {
                elapsed_days,
                min_age_days,
            } => {
                assert_eq!(elapsed_days, 30);
                assert_eq!(min_age_days, 90);
            }
            other => panic!("expected TooSoon, got {other:?}"),
        }
    }

    #[test]
    fn test_elapsed_equal_to_min_age_is_too_soon() {
        let mut r = recipe();
        r.min_age_days = 30;
        let request = FetchRequest::build(&r, "run-1", ingestion_date(), "AAPL");
        assert!(matches!(request.gate(), RequestGate::TooSoon { .. }));
    }

    #[test]
    fn test_malformed_key_is_invalid() {
        for bad in ["", "aapl", "AAPL$", ".AAPL", "A234567890123456789012345"] {
            let request = FetchRequest::build(&recipe(), "run-1", ingestion_date(), bad);
            assert!(
                matches!(request.gate(), RequestGate::Invalid(_)),
                "key {bad:?} should be invalid"
            );
        }
        let request = FetchRequest::build(&recipe(), "run-1", ingestion_date(), "BRK-B");
        assert!(matches!(request.gate(), RequestGate::Runnable));
    }

    #[test]
    fn test_url_and_query_resolution() {
        let request = FetchRequest::build(&recipe(), "run-1", ingestion_date(), "AAPL");
        assert_eq!(
            request.resolved_url("https://api.finprices.example/"),
            "https://api.finprices.example/v3/historical-market-capitalization/AAPL"
        );

        let query = request.resolved_query("secret-key");
        assert!(query.contains(&("from".to_string(), "2026-07-08".to_string())));
        assert!(query.contains(&("to".to_string(), "2026-08-07".to_string())));
        assert!(query.contains(&("apikey".to_string(), "secret-key".to_string())));
    }

    #[test]
    fn test_secrets_are_redacted_in_snapshot_query() {
        let request = FetchRequest::build(&recipe(), "run-1", ingestion_date(), "AAPL");
        let redacted = request.redacted_query("secret-key");
        assert!(redacted.contains(&("apikey".to_string(), "***".to_string())));
        assert!(!redacted
            .iter()
            .any(|(_, value)| value.contains("secret-key")));
    }

    #[test]
    fn test_calendar_cadence_discriminator_is_ingestion_date() {
        let mut r = recipe();
        r.cadence = Cadence::Calendar;
        let request = FetchRequest::build(&r, "run-1", ingestion_date(), "AAPL");
        assert_eq!(request.discriminator(), "2026-08-07");
        assert_eq!(request.identity().discriminator, "2026-08-07");

        let interval = FetchRequest::build(&recipe(), "run-1", ingestion_date(), "AAPL");
        assert_eq!(interval.discriminator(), "");
    }
}
