//! Recipe API request/response DTOs, backing the in-memory recipe registry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use mywant_core::{Recipe, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRecipeRequest {
    pub name: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    pub template: mywant_core::Config,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeResponse {
    pub name: String,
    pub parameters: BTreeMap<String, Value>,
}

impl From<&Recipe> for RecipeResponse {
    fn from(recipe: &Recipe) -> Self {
        Self {
            name: recipe.name.clone(),
            parameters: recipe.parameters.clone(),
        }
    }
}
