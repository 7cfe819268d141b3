//! Date-based row partitioning for bounded-size merges.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::rows::{CellValue, RowBatch};

/// How promotion partitions projected rows before merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// One chunk, one merge transaction.
    None,
    /// One chunk per calendar year of the row-date column.
    Year,
    /// One chunk per calendar month of the row-date column.
    #[default]
    Month,
}

/// A contiguous slice of projected rows sharing a partition key, merged in
/// its own transaction.
#[derive(Debug, Clone)]
pub struct PromotionChunk {
    /// `all` for strategy `none`, `2026` / `2026-01` for year/month, and
    /// `unknown` for rows without a parseable row-date.
    pub partition: String,
    pub rows: RowBatch,
}

/// Partitions a batch by the truncated row-date column.
///
/// Rows with an unparseable or missing row-date all land in a single
/// `unknown` chunk. Concatenating the returned chunks reproduces the input
/// rows exactly - nothing is lost or duplicated.
pub fn partition_by_date(
    batch: RowBatch,
    strategy: ChunkStrategy,
    row_date_column: &str,
) -> Vec<PromotionChunk> {
    if batch.is_empty() {
        return Vec::new();
    }
    if strategy == ChunkStrategy::None {
        return vec![PromotionChunk {
            partition: "all".to_string(),
            rows: batch,
        }];
    }

    let date_index = batch.column_index(row_date_column);
    let columns = batch.columns.clone();
    let mut buckets: BTreeMap<String, Vec<Vec<CellValue>>> = BTreeMap::new();

    for row in batch.rows {
        let partition = date_index
            .and_then(|i| row.get(i))
            .and_then(CellValue::as_date)
            .map(|date| match strategy {
                ChunkStrategy::Year => date.format("%Y").to_string(),
                ChunkStrategy::Month => date.format("%Y-%m").to_string(),
                ChunkStrategy::None => unreachable!("handled above"),
            })
            .unwrap_or_else(|| "unknown".to_string());
        buckets.entry(partition).or_default().push(row);
    }

    buckets
        .into_iter()
        .map(|(partition, rows)| PromotionChunk {
            partition,
            rows: RowBatch {
                columns: columns.clone(),
                rows,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn batch() -> RowBatch {
        let mut b = RowBatch::new(vec!["date".into(), "value".into()]);
        for (y, m, d, v) in [
            (2025, 12, 31, 1.0),
            (2026, 1, 15, 2.0),
            (2026, 1, 16, 3.0),
            (2026, 2, 1, 4.0),
        ] {
            b.push_row(vec![
                CellValue::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap()),
                CellValue::Float(v),
            ]);
        }
        b.push_row(vec![CellValue::Null, CellValue::Float(5.0)]);
        b
    }

    #[test]
    fn test_month_partitioning() {
        let chunks = partition_by_date(batch(), ChunkStrategy::Month, "date");
        let partitions: Vec<_> = chunks.iter().map(|c| c.partition.as_str()).collect();
        assert_eq!(partitions, vec!["2025-12", "2026-01", "2026-02", "unknown"]);
        assert_eq!(chunks[1].rows.len(), 2);
    }

    #[test]
    fn test_year_partitioning() {
        let chunks = partition_by_date(batch(), ChunkStrategy::Year, "date");
        let partitions: Vec<_> = chunks.iter().map(|c| c.partition.as_str()).collect();
        assert_eq!(partitions, vec!["2025", "2026", "unknown"]);
    }

    #[test]
    fn test_none_is_a_single_chunk() {
        let chunks = partition_by_date(batch(), ChunkStrategy::None, "date");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].partition, "all");
        assert_eq!(chunks[0].rows.len(), 5);
    }

    #[test]
    fn test_concatenation_reproduces_the_input() {
        for strategy in [ChunkStrategy::Year, ChunkStrategy::Month] {
            let input = batch();
            let chunks = partition_by_date(input.clone(), strategy, "date");

            let total: usize = chunks.iter().map(|c| c.rows.len()).sum();
            assert_eq!(total, input.len());

            // Every input row appears in exactly one chunk.
            let mut reassembled: Vec<Vec<CellValue>> =
                chunks.into_iter().flat_map(|c| c.rows.rows).collect();
            let mut expected = input.rows;
            let key = |r: &Vec<CellValue>| format!("{r:?}");
            reassembled.sort_by_key(key);
            expected.sort_by_key(key);
            assert_eq!(reassembled, expected);
        }
    }

    #[test]
    fn test_empty_batch_yields_no_chunks() {
        let empty = RowBatch::new(vec!["date".into()]);
        assert!(partition_by_date(empty, ChunkStrategy::Month, "date").is_empty());
    }
}
