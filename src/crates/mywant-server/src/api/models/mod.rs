//! HTTP request/response DTOs.

pub mod recipes;
pub mod wants;

pub use recipes::{CreateRecipeRequest, RecipeResponse};
pub use wants::{
    CreateWantsResponse, ListWantsQuery, StatusResponse, SuspendedResponse, WantResponse,
};

use serde::Serialize;

/// `GET /health` response body (spec §6: `{status, wants, version}`).
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub wants: usize,
    pub version: &'static str,
}

impl HealthResponse {
    pub fn new(wants: usize) -> Self {
        Self {
            status: "ok",
            wants,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
