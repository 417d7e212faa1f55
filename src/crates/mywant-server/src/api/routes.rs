//! HTTP route table: the exact surface of spec §6 plus the recipe CRUD
//! expansion.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use parking_lot::RwLock;

use mywant_core::{Orchestrator, Recipe};

use crate::api::{handlers, middleware};

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub recipes: Arc<RwLock<BTreeMap<String, Recipe>>>,
}

/// Build the complete API router.
pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = AppState {
        orchestrator,
        recipes: Arc::new(RwLock::new(BTreeMap::new())),
    };

    Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/api/v1/wants",
            post(handlers::wants::create).get(handlers::wants::list),
        )
        .route(
            "/api/v1/wants/:id",
            get(handlers::wants::get)
                .put(handlers::wants::update)
                .delete(handlers::wants::delete),
        )
        .route("/api/v1/wants/:id/status", get(handlers::wants::status))
        .route("/api/v1/wants/:id/results", get(handlers::wants::results))
        .route("/api/v1/wants/:id/suspend", post(handlers::wants::suspend))
        .route("/api/v1/wants/:id/resume", post(handlers::wants::resume))
        .route(
            "/api/v1/recipes",
            post(handlers::recipes::create).get(handlers::recipes::list),
        )
        .route(
            "/api/v1/recipes/:name",
            get(handlers::recipes::get).delete(handlers::recipes::delete),
        )
        .layer(middleware::logging_layer())
        .layer(middleware::cors_layer())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mywant_core::TypeRegistry;

    fn orchestrator() -> Arc<Orchestrator> {
        Arc::new(Orchestrator::new(TypeRegistry::new()))
    }

    #[tokio::test]
    async fn router_builds_and_serves_health() {
        let app = create_router(orchestrator());
        let response = axum::Router::into_make_service(app);
        // Smoke test: building the router and its make-service must not panic.
        let _ = response;
    }
}
