//! Cell values and schema-driven coercion.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::ROW_DATE_FORMATS;

/// Declared type of a contract column.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Str,
    Int,
    /// Alias of `Int`; kept because upstream contracts distinguish them.
    Bigint,
    Float,
    Bool,
    Date,
    Datetime,
    List,
    Dict,
}

/// One typed cell of a projected row.
///
/// `List` and `Dict` values are carried as raw JSON; the Silver store
/// serializes them to text.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Json(Value),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Canonical text rendering used for dedup keys and anti-join matching.
    ///
    /// Must agree with how the Silver store renders values read back from
    /// the database: integers without decimal point, dates as `%Y-%m-%d`,
    /// booleans as `0`/`1`.
    pub fn render_key(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Str(s) => s.clone(),
            CellValue::Int(i) => i.to_string(),
            CellValue::Float(f) => f.to_string(),
            CellValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            CellValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            CellValue::Json(v) => v.to_string(),
        }
    }

    /// The business date carried by this cell, if any.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Date(d) => Some(*d),
            CellValue::DateTime(dt) => Some(dt.date()),
            CellValue::Str(s) => parse_row_date(s),
            _ => None,
        }
    }
}

/// Parses a business date from payload text, trying the accepted formats
/// in order. Never panics; unparseable input yields `None`.
pub fn parse_row_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in ROW_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime.date());
        }
    }
    None
}

/// Parses a datetime from payload text; a date-only value becomes midnight.
pub fn parse_row_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in ROW_DATE_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime);
        }
    }
    parse_row_date(trimmed).and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Coerces one raw JSON field into a typed cell.
///
/// Coercion rules: missing/unparseable numeric -> `Null`; missing or
/// unparseable boolean -> `false`; missing string -> `""`; missing or
/// unparseable date/datetime -> `Null`; non-list for `list` and non-object
/// for `dict` -> `Null`.
pub fn coerce(raw: Option<&Value>, field_type: FieldType) -> CellValue {
    match field_type {
        FieldType::Str => match raw {
            Some(Value::String(s)) => CellValue::Str(s.clone()),
            Some(Value::Number(n)) => CellValue::Str(n.to_string()),
            Some(Value::Bool(b)) => CellValue::Str(b.to_string()),
            _ => CellValue::Str(String::new()),
        },
        FieldType::Int | FieldType::Bigint => match raw {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(CellValue::Int)
                .unwrap_or(CellValue::Null),
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(CellValue::Int)
                .unwrap_or(CellValue::Null),
            _ => CellValue::Null,
        },
        FieldType::Float => match raw {
            Some(Value::Number(n)) => n
                .as_f64()
                .map(CellValue::Float)
                .unwrap_or(CellValue::Null),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(CellValue::Float)
                .unwrap_or(CellValue::Null),
            _ => CellValue::Null,
        },
        FieldType::Bool => match raw {
            Some(Value::Bool(b)) => CellValue::Bool(*b),
            Some(Value::Number(n)) => CellValue::Bool(n.as_f64().unwrap_or(0.0) != 0.0),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => CellValue::Bool(true),
                _ => CellValue::Bool(false),
            },
            _ => CellValue::Bool(false),
        },
        FieldType::Date => match raw {
            Some(Value::String(s)) => parse_row_date(s)
                .map(CellValue::Date)
                .unwrap_or(CellValue::Null),
            _ => CellValue::Null,
        },
        FieldType::Datetime => match raw {
            Some(Value::String(s)) => parse_row_datetime(s)
                .map(CellValue::DateTime)
                .unwrap_or(CellValue::Null),
            _ => CellValue::Null,
        },
        FieldType::List => match raw {
            Some(v @ Value::Array(_)) => CellValue::Json(v.clone()),
            _ => CellValue::Null,
        },
        FieldType::Dict => match raw {
            Some(v @ Value::Object(_)) => CellValue::Json(v.clone()),
            _ => CellValue::Null,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_string_becomes_empty() {
        assert_eq!(coerce(None, FieldType::Str), CellValue::Str(String::new()));
        assert_eq!(
            coerce(Some(&Value::Null), FieldType::Str),
            CellValue::Str(String::new())
        );
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(coerce(Some(&json!(42)), FieldType::Int), CellValue::Int(42));
        assert_eq!(
            coerce(Some(&json!("42")), FieldType::Int),
            CellValue::Int(42)
        );
        assert_eq!(coerce(Some(&json!("n/a")), FieldType::Int), CellValue::Null);
        assert_eq!(coerce(None, FieldType::Float), CellValue::Null);
        assert_eq!(
            coerce(Some(&json!("3.25")), FieldType::Float),
            CellValue::Float(3.25)
        );
        assert_eq!(
            coerce(Some(&json!(2.5e12)), FieldType::Float),
            CellValue::Float(2.5e12)
        );
    }

    #[test]
    fn test_bool_defaults_to_false() {
        assert_eq!(coerce(None, FieldType::Bool), CellValue::Bool(false));
        assert_eq!(
            coerce(Some(&json!("garbage")), FieldType::Bool),
            CellValue::Bool(false)
        );
        assert_eq!(
            coerce(Some(&json!("true")), FieldType::Bool),
            CellValue::Bool(true)
        );
        assert_eq!(coerce(Some(&json!(1)), FieldType::Bool), CellValue::Bool(true));
    }

    #[test]
    fn test_date_coercion() {
        assert_eq!(
            coerce(Some(&json!("2026-01-15")), FieldType::Date),
            CellValue::Date(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap())
        );
        assert_eq!(
            coerce(Some(&json!("2026-01-15 16:00:00")), FieldType::Date),
            CellValue::Date(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap())
        );
        assert_eq!(coerce(Some(&json!("not-a-date")), FieldType::Date), CellValue::Null);
        assert_eq!(coerce(None, FieldType::Datetime), CellValue::Null);
    }

    #[test]
    fn test_list_and_dict() {
        assert_eq!(
            coerce(Some(&json!([1, 2])), FieldType::List),
            CellValue::Json(json!([1, 2]))
        );
        assert_eq!(coerce(Some(&json!("x")), FieldType::List), CellValue::Null);
        assert_eq!(
            coerce(Some(&json!({"a": 1})), FieldType::Dict),
            CellValue::Json(json!({"a": 1}))
        );
        assert_eq!(coerce(Some(&json!([1])), FieldType::Dict), CellValue::Null);
    }

    #[test]
    fn test_render_key_is_stable() {
        assert_eq!(CellValue::Int(5).render_key(), "5");
        assert_eq!(CellValue::Float(3.0).render_key(), "3");
        assert_eq!(
            CellValue::Date(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()).render_key(),
            "2026-01-15"
        );
        assert_eq!(CellValue::Bool(true).render_key(), "1");
        assert_eq!(CellValue::Null.render_key(), "");
    }
}
