//! Raw payload domain model.
//!
//! A payload captures one fetch attempt in full: the request context, the
//! transport envelope, the parsed content, and the derived metadata
//! (content hash, business date range). It is written once and never
//! mutated.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tidemark_fetch::TransportReply;

use crate::constants::INVALID_KEY_MARKER;
use crate::recipes::{FetchRequest, Recipe, ResponseFormat};
use crate::rows::{parse_row_date, RawRow};

/// Snapshot of the request that produced a payload, persisted alongside it.
/// Secrets in the query are redacted before the snapshot is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSnapshot {
    pub recipe: Recipe,
    pub run_id: String,
    pub ticker: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl RequestSnapshot {
    pub fn from_request(request: &FetchRequest, url: String, redacted_query: Vec<(String, String)>) -> Self {
        Self {
            recipe: request.recipe.clone(),
            run_id: request.run_id.clone(),
            ticker: request.key.clone(),
            from_date: request.from_date,
            to_date: request.to_date,
            url,
            query: redacted_query,
        }
    }
}

/// Parsed payload content: a list of row-maps on success, the raw response
/// text when the body was not list-shaped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadContent {
    Rows(Vec<RawRow>),
    Text(String),
}

impl PayloadContent {
    pub fn rows(&self) -> Option<&[RawRow]> {
        match self {
            PayloadContent::Rows(rows) => Some(rows),
            PayloadContent::Text(_) => None,
        }
    }
}

/// One Bronze record: the full envelope of one fetch attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPayload {
    pub file_id: String,
    pub request: RequestSnapshot,

    // Transport envelope
    pub status_code: u16,
    pub reason: String,
    /// Response headers rendered `key=value; key=value`.
    pub headers: String,
    pub elapsed_ms: u64,

    pub content: PayloadContent,
    /// md5 of the raw response body; empty when no body was received.
    pub content_hash: String,
    /// Earliest business date found in the rows.
    pub first_date: Option<NaiveDate>,
    /// Latest business date found in the rows.
    pub last_date: Option<NaiveDate>,
    pub error: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl RawPayload {
    /// Builds the payload for a transport reply, parsing the body per the
    /// recipe's response format and deriving hash and date range.
    ///
    /// Parsing never raises: a body that is not list-shaped is retained as
    /// text with the error recorded, and unparseable business dates fall
    /// back to the fetch date.
    pub fn from_reply(
        request: &FetchRequest,
        snapshot: RequestSnapshot,
        file_id: String,
        reply: &TransportReply,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let content_hash = format!("{:x}", md5::compute(reply.body.as_bytes()));

        let (content, mut error) = match parse_body(&reply.body, request.recipe.format) {
            Ok(rows) => (PayloadContent::Rows(rows), None),
            Err(message) => (PayloadContent::Text(reply.body.clone()), Some(message)),
        };

        if reply.status != 200 {
            let http_error = if reply.status == 404 && request.recipe.per_key {
                format!("{INVALID_KEY_MARKER}: HTTP 404 for {}", request.key)
            } else {
                format!("HTTP {} {}", reply.status, reply.reason)
            };
            error = Some(match error {
                Some(parse_error) => format!("{http_error}; {parse_error}"),
                None => http_error,
            });
        }

        let (first_date, last_date) = match content.rows() {
            Some(rows) if !rows.is_empty() => {
                scan_business_dates(rows, &request.recipe.row_date_field, request.ingestion_date)
            }
            _ => (None, None),
        };

        Self {
            file_id,
            request: snapshot,
            status_code: reply.status,
            reason: reply.reason.clone(),
            headers: reply.headers.clone(),
            elapsed_ms: reply.elapsed_ms,
            content,
            content_hash,
            first_date,
            last_date,
            error,
            fetched_at,
        }
    }

    /// Builds the archived record of an attempt that produced no transport
    /// reply at all (validation failure or exhausted transport error).
    pub fn from_failure(
        snapshot: RequestSnapshot,
        file_id: String,
        error: String,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            file_id,
            request: snapshot,
            status_code: 0,
            reason: String::new(),
            headers: String::new(),
            elapsed_ms: 0,
            content: PayloadContent::Rows(Vec::new()),
            content_hash: String::new(),
            first_date: None,
            last_date: None,
            error: Some(error),
            fetched_at,
        }
    }

    pub fn row_count(&self) -> usize {
        self.content.rows().map(<[RawRow]>::len).unwrap_or(0)
    }

    /// Acceptance gate: valid-for-storage. Failures are archived too, so
    /// this only requires well-formed transport metadata and list-shaped
    /// (possibly empty) content.
    pub fn is_storable(&self) -> bool {
        !self.file_id.is_empty() && self.content.rows().is_some()
    }

    /// Promotion-eligibility gate, stricter than storage: HTTP 200, no
    /// error, a non-empty hash, and non-empty content unless the dataset
    /// explicitly allows empty content.
    pub fn is_promotable(&self, allows_empty_content: bool) -> bool {
        self.status_code == 200
            && self.error.is_none()
            && !self.content_hash.is_empty()
            && (self.row_count() > 0 || allows_empty_content)
    }
}

/// Parses a response body into row-maps.
///
/// JSON: an array of objects is the normal shape; a lone object is treated
/// as a one-row list. CSV: every record becomes a string-valued row-map.
fn parse_body(body: &str, format: ResponseFormat) -> Result<Vec<RawRow>, String> {
    match format {
        ResponseFormat::Json => match serde_json::from_str::<serde_json::Value>(body) {
            Ok(serde_json::Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    serde_json::Value::Object(map) => Ok(map),
                    other => Err(format!("array element is not an object: {other}")),
                })
                .collect(),
            Ok(serde_json::Value::Object(map)) => Ok(vec![map]),
            Ok(other) => Err(format!("body is not list-shaped: {other}")),
            Err(e) => Err(format!("unparseable JSON body: {e}")),
        },
        ResponseFormat::Csv => {
            let mut reader = csv::ReaderBuilder::new()
                .flexible(true)
                .from_reader(body.as_bytes());
            let headers = reader
                .headers()
                .map_err(|e| format!("unparseable CSV header: {e}"))?
                .clone();
            let mut rows = Vec::new();
            for record in reader.records() {
                let record = record.map_err(|e| format!("unparseable CSV record: {e}"))?;
                let mut row = RawRow::new();
                for (name, value) in headers.iter().zip(record.iter()) {
                    row.insert(
                        name.to_string(),
                        serde_json::Value::String(value.to_string()),
                    );
                }
                rows.push(row);
            }
            Ok(rows)
        }
    }
}

/// Scans rows for the configured date field and returns the min/max
/// business dates. Rows without a parseable date contribute the fallback
/// fetch date, so a non-empty payload always has a range.
fn scan_business_dates(
    rows: &[RawRow],
    date_field: &str,
    fallback: NaiveDate,
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let mut min = None;
    let mut max = None;
    for row in rows {
        let date = row
            .get(date_field)
            .and_then(|v| v.as_str())
            .and_then(parse_row_date)
            .unwrap_or(fallback);
        min = Some(date.min(min.unwrap_or(date)));
        max = Some(date.max(max.unwrap_or(date)));
    }
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::Cadence;
    use std::collections::BTreeMap;

    fn recipe(format: ResponseFormat) -> Recipe {
        Recipe {
            domain: "prices".to_string(),
            source: "finprices".to_string(),
            dataset: "company-market-cap".to_string(),
            endpoint: "/v3/historical-market-capitalization/{ticker}".to_string(),
            query_template: BTreeMap::new(),
            cadence: Cadence::Interval,
            min_age_days: 0,
            per_key: true,
            key_columns: vec!["ticker".to_string(), "date".to_string()],
            row_date_field: "date".to_string(),
            format,
            allows_empty_content: false,
            lookback_days: 30,
            limit: None,
            period: None,
            plan: None,
            discovery: false,
        }
    }

    fn request(format: ResponseFormat) -> FetchRequest {
        FetchRequest::build(
            &recipe(format),
            "run-1",
            NaiveDate::from_ymd_opt(2026, 8, 7).unwrap(),
            "AAPL",
        )
    }

    fn snapshot(request: &FetchRequest) -> RequestSnapshot {
        RequestSnapshot::from_request(request, "https://example/x".to_string(), Vec::new())
    }

    fn reply(status: u16, body: &str) -> TransportReply {
        TransportReply {
            status,
            reason: if status == 200 { "OK" } else { "Not Found" }.to_string(),
            headers: "content-type=application/json".to_string(),
            body: body.to_string(),
            elapsed_ms: 12,
        }
    }

    #[test]
    fn test_json_rows_parse_and_date_scan() {
        let request = request(ResponseFormat::Json);
        let body = r#"[
            {"symbol": "AAPL", "date": "2026-01-16", "marketCap": 1.0},
            {"symbol": "AAPL", "date": "2026-01-15", "marketCap": 2.0},
            {"symbol": "AAPL", "date": "2026-01-17", "marketCap": 3.0}
        ]"#;
        let payload = RawPayload::from_reply(
            &request,
            snapshot(&request),
            "file-1".to_string(),
            &reply(200, body),
            Utc::now(),
        );

        assert_eq!(payload.row_count(), 3);
        assert_eq!(payload.first_date, NaiveDate::from_ymd_opt(2026, 1, 15));
        assert_eq!(payload.last_date, NaiveDate::from_ymd_opt(2026, 1, 17));
        assert!(payload.error.is_none());
        assert!(payload.is_storable());
        assert!(payload.is_promotable(false));
        assert!(!payload.content_hash.is_empty());
    }

    #[test]
    fn test_lone_object_is_a_one_row_list() {
        let request = request(ResponseFormat::Json);
        let payload = RawPayload::from_reply(
            &request,
            snapshot(&request),
            "file-1".to_string(),
            &reply(200, r#"{"symbol": "AAPL", "date": "2026-01-15"}"#),
            Utc::now(),
        );
        assert_eq!(payload.row_count(), 1);
        assert!(payload.is_promotable(false));
    }

    #[test]
    fn test_unparseable_body_is_retained_as_text() {
        let request = request(ResponseFormat::Json);
        let payload = RawPayload::from_reply(
            &request,
            snapshot(&request),
            "file-1".to_string(),
            &reply(200, "<html>maintenance</html>"),
            Utc::now(),
        );
        assert!(payload.error.is_some());
        assert!(matches!(payload.content, PayloadContent::Text(_)));
        assert!(!payload.is_storable());
        assert!(!payload.is_promotable(false));
    }

    #[test]
    fn test_missing_date_field_falls_back_to_fetch_date() {
        let request = request(ResponseFormat::Json);
        let payload = RawPayload::from_reply(
            &request,
            snapshot(&request),
            "file-1".to_string(),
            &reply(200, r#"[{"symbol": "AAPL", "marketCap": 1.0}]"#),
            Utc::now(),
        );
        let fetch_date = NaiveDate::from_ymd_opt(2026, 8, 7);
        assert_eq!(payload.first_date, fetch_date);
        assert_eq!(payload.last_date, fetch_date);
    }

    #[test]
    fn test_http_failure_is_archived_not_promotable() {
        let request = request(ResponseFormat::Json);
        let payload = RawPayload::from_reply(
            &request,
            snapshot(&request),
            "file-1".to_string(),
            &reply(404, "[]"),
            Utc::now(),
        );
        let error = payload.error.as_deref().unwrap();
        assert!(error.contains("invalid key"), "got {error}");
        assert!(payload.is_storable());
        assert!(!payload.is_promotable(false));
    }

    #[test]
    fn test_empty_content_promotable_only_when_allowed() {
        let request = request(ResponseFormat::Json);
        let payload = RawPayload::from_reply(
            &request,
            snapshot(&request),
            "file-1".to_string(),
            &reply(200, "[]"),
            Utc::now(),
        );
        assert!(payload.error.is_none());
        assert!(!payload.is_promotable(false));
        assert!(payload.is_promotable(true));
        assert!(payload.first_date.is_none());
    }

    #[test]
    fn test_csv_body_parses_into_string_rows() {
        let request = request(ResponseFormat::Csv);
        let body = "date,close\n2026-01-15,187.2\n2026-01-16,188.0\n";
        let payload = RawPayload::from_reply(
            &request,
            snapshot(&request),
            "file-1".to_string(),
            &reply(200, body),
            Utc::now(),
        );
        assert_eq!(payload.row_count(), 2);
        assert_eq!(payload.first_date, NaiveDate::from_ymd_opt(2026, 1, 15));
        assert_eq!(payload.last_date, NaiveDate::from_ymd_opt(2026, 1, 16));
    }

    #[test]
    fn test_failure_record_shape() {
        let request = request(ResponseFormat::Json);
        let payload = RawPayload::from_failure(
            snapshot(&request),
            "file-1".to_string(),
            "transport failure: timeout".to_string(),
            Utc::now(),
        );
        assert_eq!(payload.status_code, 0);
        assert_eq!(payload.row_count(), 0);
        assert!(payload.is_storable());
        assert!(!payload.is_promotable(true));
    }
}
