//! Column-ordered batch of projected rows.

use chrono::NaiveDate;

use super::cell::CellValue;

/// A batch of typed rows sharing one column header.
///
/// This is the unit of work between projection and the Silver store: one
/// payload projects into one batch, which is filtered, deduplicated,
/// chunked and merged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RowBatch {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Appends a row. The row must match the column header width.
    pub fn push_row(&mut self, row: Vec<CellValue>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    /// Adds a column filled with `fill` for every existing row. No-op when
    /// the column already exists.
    pub fn add_column(&mut self, name: &str, fill: CellValue) {
        if self.has_column(name) {
            return;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(fill.clone());
        }
    }

    /// Cell lookup by row index and column name.
    pub fn get(&self, row: usize, column: &str) -> Option<&CellValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// Keeps only rows for which the predicate holds.
    pub fn retain_rows<F>(&mut self, mut predicate: F)
    where
        F: FnMut(&[CellValue]) -> bool,
    {
        self.rows.retain(|row| predicate(row));
    }

    /// Resolves column names to indices, failing on the first missing one.
    pub fn key_indices(&self, key_columns: &[String]) -> Result<Vec<usize>, String> {
        key_columns
            .iter()
            .map(|name| {
                self.column_index(name)
                    .ok_or_else(|| name.clone())
            })
            .collect()
    }

    /// The canonical key tuple of one row, for dedup and anti-join.
    pub fn key_tuple(row: &[CellValue], indices: &[usize]) -> Vec<String> {
        indices
            .iter()
            .map(|&i| row.get(i).map(CellValue::render_key).unwrap_or_default())
            .collect()
    }

    /// Min and max business date observed in a date-bearing column.
    pub fn date_range(&self, column: &str) -> (Option<NaiveDate>, Option<NaiveDate>) {
        let Some(idx) = self.column_index(column) else {
            return (None, None);
        };
        let mut min = None;
        let mut max = None;
        for row in &self.rows {
            if let Some(date) = row.get(idx).and_then(CellValue::as_date) {
                min = Some(min.map_or(date, |m: NaiveDate| m.min(date)));
                max = Some(max.map_or(date, |m: NaiveDate| m.max(date)));
            }
        }
        (min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> RowBatch {
        let mut b = RowBatch::new(vec!["ticker".into(), "date".into(), "value".into()]);
        b.push_row(vec![
            CellValue::Str("AAPL".into()),
            CellValue::Date(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()),
            CellValue::Float(100.0),
        ]);
        b.push_row(vec![
            CellValue::Str("MSFT".into()),
            CellValue::Date(NaiveDate::from_ymd_opt(2026, 1, 17).unwrap()),
            CellValue::Float(200.0),
        ]);
        b
    }

    #[test]
    fn test_add_column_fills_existing_rows() {
        let mut b = batch();
        b.add_column("run_id", CellValue::Str("run-1".into()));
        assert_eq!(b.columns.len(), 4);
        assert_eq!(b.get(0, "run_id"), Some(&CellValue::Str("run-1".into())));
        assert_eq!(b.get(1, "run_id"), Some(&CellValue::Str("run-1".into())));

        // Re-adding is a no-op.
        b.add_column("run_id", CellValue::Str("other".into()));
        assert_eq!(b.get(0, "run_id"), Some(&CellValue::Str("run-1".into())));
    }

    #[test]
    fn test_date_range() {
        let b = batch();
        let (min, max) = b.date_range("date");
        assert_eq!(min, NaiveDate::from_ymd_opt(2026, 1, 15));
        assert_eq!(max, NaiveDate::from_ymd_opt(2026, 1, 17));

        let (none_min, none_max) = b.date_range("missing");
        assert!(none_min.is_none() && none_max.is_none());
    }

    #[test]
    fn test_key_indices_reports_missing_column() {
        let b = batch();
        assert_eq!(
            b.key_indices(&["ticker".into(), "date".into()]).unwrap(),
            vec![0, 1]
        );
        assert_eq!(
            b.key_indices(&["absent".into()]).unwrap_err(),
            "absent".to_string()
        );
    }
}
