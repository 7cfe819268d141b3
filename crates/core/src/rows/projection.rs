//! Projection of raw payload rows into a typed batch.

use super::batch::RowBatch;
use super::cell::coerce;
use super::contract::ColumnSpec;
use super::mapper::RowMapper;
use super::RawRow;

/// How a dataset's raw rows become typed cells: either declarative contract
/// columns, or a registered row mapper.
pub enum Projector<'a> {
    Columns(&'a [ColumnSpec]),
    Mapper(&'a dyn RowMapper),
}

impl Projector<'_> {
    fn columns(&self) -> &[ColumnSpec] {
        match self {
            Projector::Columns(columns) => columns,
            Projector::Mapper(mapper) => mapper.columns(),
        }
    }
}

/// Projects raw rows through the projector into a column-ordered batch.
///
/// Coercion never fails a row: unparseable fields degrade to the
/// type-specific defaults (`Null`, `false`, `""`), so the batch always has
/// the same row count as the input.
pub fn project_rows(rows: &[RawRow], projector: &Projector<'_>) -> RowBatch {
    let columns = projector.columns();
    let mut batch = RowBatch::new(columns.iter().map(|c| c.name.clone()).collect());

    for raw in rows {
        let cells = match projector {
            Projector::Columns(columns) => columns
                .iter()
                .map(|spec| coerce(raw.get(spec.source_field()), spec.field_type))
                .collect(),
            Projector::Mapper(mapper) => mapper.map_row(raw),
        };
        batch.push_row(cells);
    }

    batch
}
