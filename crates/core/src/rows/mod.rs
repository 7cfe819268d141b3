//! Typed row handling: cell values, coercion, schema contracts, projection.
//!
//! Raw payload rows are untyped JSON maps at the boundary. Every internal
//! consumer goes through the typed projection step before use: a
//! [`SchemaContract`] (or a registered [`RowMapper`]) drives coercion of
//! each raw field into a [`CellValue`], producing a column-ordered
//! [`RowBatch`].

mod batch;
mod cell;
mod contract;
mod mapper;
mod projection;

pub use batch::RowBatch;
pub use cell::{coerce, parse_row_date, parse_row_datetime, CellValue, FieldType};
pub use contract::{ColumnSpec, ContractCatalog, ContractCatalogEntry, SchemaContract};
pub use mapper::{MapperRegistry, RowMapper};
pub use projection::{project_rows, Projector};

/// An untyped row as parsed from a payload body.
pub type RawRow = serde_json::Map<String, serde_json::Value>;
