//! Schema contracts - the declarative column mapping of a dataset.
//!
//! Contracts are data, not code: they are deserialized from JSON
//! configuration and keyed by unit identity. Resolution walks a three-step
//! fallback so run-scoped discriminators and per-key overrides both work.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::identity::UnitIdentity;

use super::cell::FieldType;

fn default_nullable() -> bool {
    true
}

/// One declared column of a contract.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Field name in the raw payload when it differs from `name`.
    #[serde(default)]
    pub source_alias: Option<String>,
}

impl ColumnSpec {
    /// The raw payload field this column reads from.
    pub fn source_field(&self) -> &str {
        self.source_alias.as_deref().unwrap_or(&self.name)
    }
}

/// The schema contract of one dataset.
///
/// A contract with an empty `columns` list delegates projection to a
/// registered row mapper resolved by dataset name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchemaContract {
    pub dataset: String,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    /// Business/grain key columns the Silver merge matches on.
    #[serde(default)]
    pub key_columns: Vec<String>,
    /// Row-date column; defaults to `date` when absent.
    #[serde(default)]
    pub row_date_column: Option<String>,
    /// Whether promotion must fail when the ledger entry carries no key.
    #[serde(default)]
    pub requires_key: bool,
}

/// One entry of the contract configuration file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContractCatalogEntry {
    pub domain: String,
    pub source: String,
    pub dataset: String,
    #[serde(default)]
    pub discriminator: String,
    #[serde(default)]
    pub key: String,
    pub contract: SchemaContract,
}

/// Identity-keyed collection of schema contracts.
#[derive(Debug, Default)]
pub struct ContractCatalog {
    entries: HashMap<UnitIdentity, SchemaContract>,
}

impl ContractCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<ContractCatalogEntry>) -> Self {
        let mut catalog = Self::new();
        for entry in entries {
            let identity = UnitIdentity::new(
                entry.domain,
                entry.source,
                entry.dataset,
                entry.discriminator,
                entry.key,
            );
            catalog.entries.insert(identity, entry.contract);
        }
        catalog
    }

    /// Loads the contract configuration file (a JSON array of entries).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigIO(format!("{}: {e}", path.display())))?;
        let entries: Vec<ContractCatalogEntry> = serde_json::from_str(&raw)
            .map_err(|e| Error::ConfigIO(format!("{}: {e}", path.display())))?;
        Ok(Self::from_entries(entries))
    }

    pub fn insert(&mut self, identity: UnitIdentity, contract: SchemaContract) {
        self.entries.insert(identity, contract);
    }

    /// Resolves the contract for an identity.
    ///
    /// Fallback chain: exact match, then ignoring the run-scoped
    /// discriminator, then ignoring the key.
    pub fn resolve(&self, identity: &UnitIdentity) -> Option<&SchemaContract> {
        self.entries
            .get(identity)
            .or_else(|| self.entries.get(&identity.without_discriminator()))
            .or_else(|| self.entries.get(&identity.without_discriminator().without_key()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(dataset: &str) -> SchemaContract {
        SchemaContract {
            dataset: dataset.to_string(),
            columns: vec![ColumnSpec {
                name: "ticker".to_string(),
                field_type: FieldType::Str,
                nullable: false,
                source_alias: Some("symbol".to_string()),
            }],
            key_columns: vec!["ticker".to_string()],
            row_date_column: Some("date".to_string()),
            requires_key: true,
        }
    }

    #[test]
    fn test_resolve_fallback_chain() {
        let mut catalog = ContractCatalog::new();
        catalog.insert(
            UnitIdentity::new("prices", "finprices", "company-market-cap", "", ""),
            contract("company-market-cap"),
        );

        // Exact global identity.
        let global = UnitIdentity::new("prices", "finprices", "company-market-cap", "", "");
        assert!(catalog.resolve(&global).is_some());

        // Keyed + discriminated identity falls through both fallbacks.
        let keyed = UnitIdentity::new(
            "prices",
            "finprices",
            "company-market-cap",
            "2026-08-07",
            "AAPL",
        );
        assert!(catalog.resolve(&keyed).is_some());

        // Unknown dataset resolves to nothing.
        let unknown = UnitIdentity::new("prices", "finprices", "unknown", "", "AAPL");
        assert!(catalog.resolve(&unknown).is_none());
    }

    #[test]
    fn test_exact_match_wins_over_fallback() {
        let mut catalog = ContractCatalog::new();
        let general = contract("company-market-cap");
        let mut specific = contract("company-market-cap");
        specific.row_date_column = Some("as_of".to_string());

        catalog.insert(
            UnitIdentity::new("prices", "finprices", "company-market-cap", "", ""),
            general,
        );
        catalog.insert(
            UnitIdentity::new("prices", "finprices", "company-market-cap", "", "AAPL"),
            specific,
        );

        let keyed = UnitIdentity::new("prices", "finprices", "company-market-cap", "", "AAPL");
        assert_eq!(
            catalog.resolve(&keyed).unwrap().row_date_column.as_deref(),
            Some("as_of")
        );
    }

    #[test]
    fn test_source_field_defaults_to_name() {
        let spec = ColumnSpec {
            name: "value".to_string(),
            field_type: FieldType::Float,
            nullable: true,
            source_alias: None,
        };
        assert_eq!(spec.source_field(), "value");
    }

    #[test]
    fn test_contract_deserializes_from_json() {
        let raw = r#"
        [{
            "domain": "prices",
            "source": "finprices",
            "dataset": "company-market-cap",
            "contract": {
                "dataset": "company-market-cap",
                "columns": [
                    {"name": "ticker", "type": "str", "nullable": false, "source_alias": "symbol"},
                    {"name": "date", "type": "date"},
                    {"name": "market_cap", "type": "float", "source_alias": "marketCap"}
                ],
                "key_columns": ["ticker", "date"],
                "requires_key": true
            }
        }]
        "#;
        let entries: Vec<ContractCatalogEntry> = serde_json::from_str(raw).unwrap();
        let catalog = ContractCatalog::from_entries(entries);
        assert_eq!(catalog.len(), 1);

        let identity = UnitIdentity::new("prices", "finprices", "company-market-cap", "", "AAPL");
        let resolved = catalog.resolve(&identity).unwrap();
        assert_eq!(resolved.columns.len(), 3);
        assert_eq!(resolved.columns[2].source_field(), "marketCap");
        assert!(resolved.columns[1].nullable);
    }
}
