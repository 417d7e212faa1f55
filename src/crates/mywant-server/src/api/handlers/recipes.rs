//! Recipe CRUD endpoint handlers, backing the CLI's `recipes` subcommand.
//!
//! The distilled HTTP table (spec §6) doesn't list these — the CLI surface
//! names a `recipes` subcommand, so the server needs somewhere for it to
//! land. Recipes live in an in-memory registry; they're templates, not
//! running state, so they don't need `mywant-snapshot` persistence.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

use mywant_core::Recipe;

use crate::api::{
    error::{ApiError, ApiResult},
    models::{CreateRecipeRequest, RecipeResponse},
    response,
    routes::AppState,
};

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateRecipeRequest>,
) -> ApiResult<impl IntoResponse> {
    let recipe = Recipe {
        name: req.name.clone(),
        parameters: req.parameters,
        template: req.template,
    };
    state.recipes.write().insert(req.name, recipe.clone());
    Ok(response::created(RecipeResponse::from(&recipe)))
}

pub async fn list(State(state): State<AppState>) -> impl IntoResponse {
    let recipes: Vec<RecipeResponse> = state.recipes.read().values().map(RecipeResponse::from).collect();
    response::ok(serde_json::json!({ "recipes": recipes }))
}

pub async fn get(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<impl IntoResponse> {
    let recipes = state.recipes.read();
    let recipe = recipes
        .get(&name)
        .ok_or_else(|| ApiError::Want(mywant_core::WantError::NotFound(name.clone())))?;
    Ok(response::ok(RecipeResponse::from(recipe)))
}

pub async fn delete(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<impl IntoResponse> {
    let removed = state.recipes.write().remove(&name).is_some();
    if !removed {
        return Err(ApiError::Want(mywant_core::WantError::NotFound(name)));
    }
    Ok(response::no_content())
}
