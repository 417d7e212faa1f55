//! Want CRUD and lifecycle endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use std::collections::BTreeMap;

use mywant_core::{Config, Value};

use crate::api::{
    error::{ApiError, ApiResult},
    models::{CreateWantsResponse, ListWantsQuery, StatusResponse, SuspendedResponse, WantResponse},
    response,
    routes::AppState,
};

/// POST /api/v1/wants — body is a [`Config`], JSON by default or YAML when
/// `Content-Type: application/yaml` (spec §6).
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> ApiResult<impl IntoResponse> {
    let config = parse_config(&headers, &body)?;
    let ids = state.orchestrator.create(config)?;
    Ok(response::created(CreateWantsResponse { want_ids: ids }))
}

/// GET /api/v1/wants — `type`, repeatable `label=k=v`, repeatable `using=k=v`.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListWantsQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = query
        .into_filter()
        .map_err(ApiError::BadRequest)?;
    let wants: Vec<WantResponse> = state
        .orchestrator
        .list(&filter)
        .iter()
        .map(WantResponse::from)
        .collect();
    Ok(response::ok(serde_json::json!({ "wants": wants })))
}

/// GET /api/v1/wants/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let want = state.orchestrator.get(&id)?;
    Ok(response::ok(WantResponse::from(&want)))
}

/// PUT /api/v1/wants/{id} — merges `params` into the want's spec and drives
/// the parameter-update protocol (spec §4.5).
///
/// `Orchestrator::update` blocks the calling thread (it polls for a
/// cancelled task to actually exit, up to `CANCEL_DEADLINE`) when the want
/// is `Reaching` or `Suspended`; run it on the blocking pool so it never
/// ties up an async worker thread.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(params): Json<BTreeMap<String, Value>>,
) -> ApiResult<impl IntoResponse> {
    let orchestrator = state.orchestrator.clone();
    let update_id = id.clone();
    tokio::task::spawn_blocking(move || orchestrator.update(&update_id, params))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))??;
    let want = state.orchestrator.get(&id)?;
    Ok(response::ok(WantResponse::from(&want)))
}

/// DELETE /api/v1/wants/{id}
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.orchestrator.delete(&id)?;
    Ok(response::no_content())
}

/// GET /api/v1/wants/{id}/status
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let want = state.orchestrator.get(&id)?;
    Ok(response::ok(StatusResponse {
        id: want.id().to_string(),
        status: want.status,
        suspended: want.status == mywant_core::WantStatus::Suspended,
    }))
}

/// GET /api/v1/wants/{id}/results — the want's live state bag.
pub async fn results(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let want = state.orchestrator.get(&id)?;
    let value: serde_json::Value = want.state.get().into();
    Ok(response::ok(value))
}

/// POST /api/v1/wants/{id}/suspend — idempotent.
pub async fn suspend(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.orchestrator.suspend(&id)?;
    Ok(response::ok(SuspendedResponse { suspended: true }))
}

/// POST /api/v1/wants/{id}/resume — idempotent.
pub async fn resume(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.orchestrator.resume(&id)?;
    Ok(response::ok(SuspendedResponse { suspended: false }))
}

fn parse_config(headers: &HeaderMap, body: &[u8]) -> ApiResult<Config> {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json");

    if content_type.contains("yaml") {
        serde_yaml::from_slice(body)
            .map_err(|err| ApiError::BadRequest(format!("invalid YAML body: {err}")))
    } else {
        serde_json::from_slice(body)
            .map_err(|err| ApiError::BadRequest(format!("invalid JSON body: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::CONTENT_TYPE;
    use axum::http::HeaderValue;

    #[test]
    fn defaults_to_json_without_a_content_type() {
        let headers = HeaderMap::new();
        let body = br#"{"wants": []}"#;
        let config = parse_config(&headers, body).unwrap();
        assert!(config.wants.is_empty());
    }

    #[test]
    fn honours_a_yaml_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/yaml"));
        let body = b"wants: []\n";
        let config = parse_config(&headers, body).unwrap();
        assert!(config.wants.is_empty());
    }
}
