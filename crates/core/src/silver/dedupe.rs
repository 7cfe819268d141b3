//! Deduplication for promotion: in-batch keep-last, and the anti-join
//! against the target table.
//!
//! Both are pure and stateless; the promotion engine supplies the batch
//! and the existing-key set.

use std::collections::HashSet;

use crate::rows::RowBatch;

/// Deduplicates a batch by its key columns, keeping the last occurrence of
/// each key tuple.
///
/// Key columns are compared jointly: one tuple per row, all columns at
/// once. Row order of the survivors is preserved.
pub fn dedupe_keep_last(batch: RowBatch, key_indices: &[usize]) -> RowBatch {
    // No key columns means no grain to compare on.
    if key_indices.is_empty() {
        return batch;
    }
    let mut survivors: Vec<Option<Vec<crate::rows::CellValue>>> =
        batch.rows.into_iter().map(Some).collect();
    let mut seen: HashSet<Vec<String>> = HashSet::with_capacity(survivors.len());

    // Walk backwards so the last occurrence of a key wins.
    for slot in survivors.iter_mut().rev() {
        let Some(row) = slot else { continue };
        let key = RowBatch::key_tuple(row, key_indices);
        if !seen.insert(key) {
            *slot = None;
        }
    }

    RowBatch {
        columns: batch.columns,
        rows: survivors.into_iter().flatten().collect(),
    }
}

/// Drops candidate rows whose key tuple already exists in the target
/// table.
///
/// After this step a merge never has to ask "is this a genuine insert"
/// beyond the key match it performs anyway.
pub fn anti_join(
    batch: RowBatch,
    existing: &HashSet<Vec<String>>,
    key_indices: &[usize],
) -> RowBatch {
    if existing.is_empty() {
        return batch;
    }
    let rows = batch
        .rows
        .into_iter()
        .filter(|row| !existing.contains(&RowBatch::key_tuple(row, key_indices)))
        .collect();
    RowBatch {
        columns: batch.columns,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::CellValue;
    use chrono::NaiveDate;

    fn day(d: u32) -> CellValue {
        CellValue::Date(NaiveDate::from_ymd_opt(2026, 1, d).unwrap())
    }

    fn batch() -> RowBatch {
        let mut b = RowBatch::new(vec!["ticker".into(), "date".into(), "value".into()]);
        b.push_row(vec![CellValue::Str("AAPL".into()), day(15), CellValue::Float(1.0)]);
        b.push_row(vec![CellValue::Str("AAPL".into()), day(16), CellValue::Float(2.0)]);
        // Duplicate key of the first row with a corrected value.
        b.push_row(vec![CellValue::Str("AAPL".into()), day(15), CellValue::Float(9.0)]);
        b
    }

    #[test]
    fn test_keep_last_wins_on_duplicate_keys() {
        let deduped = dedupe_keep_last(batch(), &[0, 1]);
        assert_eq!(deduped.len(), 2);
        // The surviving 01-15 row is the later one.
        let jan15: Vec<_> = deduped
            .rows
            .iter()
            .filter(|r| r[1] == day(15))
            .collect();
        assert_eq!(jan15.len(), 1);
        assert_eq!(jan15[0][2], CellValue::Float(9.0));
    }

    #[test]
    fn test_keep_last_preserves_order_of_survivors() {
        let deduped = dedupe_keep_last(batch(), &[0, 1]);
        assert_eq!(deduped.rows[0][1], day(16));
        assert_eq!(deduped.rows[1][1], day(15));
    }

    #[test]
    fn test_anti_join_drops_existing_keys() {
        let mut existing = HashSet::new();
        existing.insert(vec!["AAPL".to_string(), "2026-01-15".to_string()]);

        let joined = anti_join(dedupe_keep_last(batch(), &[0, 1]), &existing, &[0, 1]);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined.rows[0][1], day(16));
    }

    #[test]
    fn test_anti_join_against_everything_empties_the_batch() {
        let deduped = dedupe_keep_last(batch(), &[0, 1]);
        let existing: HashSet<Vec<String>> = deduped
            .rows
            .iter()
            .map(|r| RowBatch::key_tuple(r, &[0, 1]))
            .collect();

        let joined = anti_join(deduped, &existing, &[0, 1]);
        assert!(joined.is_empty());
    }

    #[test]
    fn test_no_key_columns_keeps_every_row() {
        let deduped = dedupe_keep_last(batch(), &[]);
        assert_eq!(deduped.len(), 3);
    }

    #[test]
    fn test_anti_join_with_no_existing_keys_is_identity() {
        let before = dedupe_keep_last(batch(), &[0, 1]);
        let after = anti_join(before.clone(), &HashSet::new(), &[0, 1]);
        assert_eq!(before, after);
    }
}
