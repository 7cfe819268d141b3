//! Row mapper registry.
//!
//! A dataset whose contract declares no explicit columns is projected by a
//! type-mapper registered under the dataset name. Mappers are the code-side
//! escape hatch for payloads too irregular for a declarative contract.

use std::collections::HashMap;
use std::sync::Arc;

use super::cell::{coerce, CellValue};
use super::contract::ColumnSpec;
use super::RawRow;

/// Converts one raw row-map into typed cells for a declared column set.
pub trait RowMapper: Send + Sync {
    /// Dataset name this mapper is registered under.
    fn dataset(&self) -> &str;

    /// The columns this mapper produces, in order.
    fn columns(&self) -> &[ColumnSpec];

    /// Maps one raw row. The default implementation coerces each declared
    /// column from its source field; override for irregular payloads.
    fn map_row(&self, raw: &RawRow) -> Vec<CellValue> {
        self.columns()
            .iter()
            .map(|spec| coerce(raw.get(spec.source_field()), spec.field_type))
            .collect()
    }
}

/// Name-keyed registry of row mappers.
#[derive(Default)]
pub struct MapperRegistry {
    mappers: HashMap<String, Arc<dyn RowMapper>>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a mapper under its dataset name. The latest registration
    /// for a name wins.
    pub fn register(&mut self, mapper: Arc<dyn RowMapper>) {
        self.mappers.insert(mapper.dataset().to_string(), mapper);
    }

    pub fn resolve(&self, dataset: &str) -> Option<Arc<dyn RowMapper>> {
        self.mappers.get(dataset).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::cell::FieldType;
    use serde_json::json;

    struct SplitMapper {
        columns: Vec<ColumnSpec>,
    }

    impl SplitMapper {
        fn new() -> Self {
            Self {
                columns: vec![
                    ColumnSpec {
                        name: "ticker".to_string(),
                        field_type: FieldType::Str,
                        nullable: false,
                        source_alias: Some("symbol".to_string()),
                    },
                    ColumnSpec {
                        name: "ratio".to_string(),
                        field_type: FieldType::Float,
                        nullable: true,
                        source_alias: None,
                    },
                ],
            }
        }
    }

    impl RowMapper for SplitMapper {
        fn dataset(&self) -> &str {
            "stock-splits"
        }

        fn columns(&self) -> &[ColumnSpec] {
            &self.columns
        }
    }

    #[test]
    fn test_default_map_row_coerces_by_source_field() {
        let mapper = SplitMapper::new();
        let raw: RawRow = json!({"symbol": "AAPL", "ratio": "4.0"})
            .as_object()
            .unwrap()
            .clone();

        let cells = mapper.map_row(&raw);
        assert_eq!(cells[0], CellValue::Str("AAPL".to_string()));
        assert_eq!(cells[1], CellValue::Float(4.0));
    }

    #[test]
    fn test_registry_resolution() {
        let mut registry = MapperRegistry::new();
        assert!(registry.resolve("stock-splits").is_none());

        registry.register(Arc::new(SplitMapper::new()));
        assert!(registry.resolve("stock-splits").is_some());
        assert!(registry.resolve("other").is_none());
    }
}
