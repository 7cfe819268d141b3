//! Validated, deduplicated collection of dataset recipes.

use std::path::Path;

use crate::errors::{Error, Result, ValidationError};

use super::recipe_model::Recipe;

/// The recipe catalog of a run.
///
/// Loading validates every recipe against the configured domain order and
/// rejects duplicates, so downstream code can treat catalog membership as
/// structural validity.
#[derive(Debug, Default)]
pub struct RecipeCatalog {
    recipes: Vec<Recipe>,
}

impl RecipeCatalog {
    /// Builds the catalog from raw recipes, validating and deduplicating.
    pub fn from_recipes(recipes: Vec<Recipe>, domain_order: &[String]) -> Result<Self> {
        let mut seen: Vec<(String, String, String)> = Vec::new();

        for recipe in &recipes {
            if !domain_order.iter().any(|d| d == &recipe.domain) {
                return Err(ValidationError::UnknownDomain(recipe.domain.clone()).into());
            }
            if recipe.dataset.is_empty() || recipe.source.is_empty() || recipe.endpoint.is_empty() {
                return Err(ValidationError::MalformedRecipe(
                    recipe.dataset.clone(),
                    "source, dataset and endpoint must be non-empty".to_string(),
                )
                .into());
            }
            if recipe.per_key && recipe.key_columns.is_empty() {
                return Err(ValidationError::MalformedRecipe(
                    recipe.dataset.clone(),
                    "per-key recipes must declare key columns".to_string(),
                )
                .into());
            }

            let id = (
                recipe.domain.clone(),
                recipe.source.clone(),
                recipe.dataset.clone(),
            );
            if seen.contains(&id) {
                return Err(Error::Catalog(format!(
                    "duplicate recipe {}/{}/{}",
                    id.0, id.1, id.2
                )));
            }
            seen.push(id);
        }

        Ok(Self { recipes })
    }

    /// Loads the catalog file (a JSON array of recipes).
    pub fn load_from_file(path: &Path, domain_order: &[String]) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigIO(format!("{}: {e}", path.display())))?;
        let recipes: Vec<Recipe> = serde_json::from_str(&raw)
            .map_err(|e| Error::ConfigIO(format!("{}: {e}", path.display())))?;
        Self::from_recipes(recipes, domain_order)
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    /// Recipes of one domain, optionally filtered by plan tier.
    pub fn for_domain(&self, domain: &str, plan_filter: Option<&str>) -> Vec<&Recipe> {
        self.recipes
            .iter()
            .filter(|r| r.domain == domain)
            .filter(|r| match (plan_filter, &r.plan) {
                (Some(wanted), Some(plan)) => plan == wanted,
                (Some(_), None) => true,
                (None, _) => true,
            })
            .collect()
    }

    /// The single discovery recipe, when the catalog declares one.
    pub fn discovery_recipe(&self) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.discovery)
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}
