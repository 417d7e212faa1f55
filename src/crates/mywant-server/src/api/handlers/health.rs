//! Health check endpoint handler.

use axum::extract::State;
use axum::response::IntoResponse;

use crate::api::{models::HealthResponse, response, routes::AppState};

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let count = state.orchestrator.snapshot_wants().len();
    response::ok(HealthResponse::new(count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_reports_status_ok() {
        let body = HealthResponse::new(3);
        assert_eq!(body.status, "ok");
        assert_eq!(body.wants, 3);
    }
}
