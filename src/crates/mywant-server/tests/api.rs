//! End-to-end HTTP tests: drive the router with [`tower::ServiceExt::oneshot`]
//! against a real [`Orchestrator`] wired up with the builtin want types.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use mywant_core::{Orchestrator, TypeRegistry};
use tower::ServiceExt;

fn app() -> axum::Router {
    let registry = TypeRegistry::new();
    mywant_core::builtins::register_all(&registry);
    mywant_server::create_router(Arc::new(Orchestrator::new(registry)))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_zero_wants_on_a_fresh_orchestrator() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["wants"], 0);
}

#[tokio::test]
async fn creating_a_source_and_sink_then_querying_status_and_results() {
    let app = app();

    let config = serde_json::json!({
        "wants": [
            {
                "metadata": { "name": "source", "type": "numbers", "labels": { "role": "source" } },
                "spec": { "params": { "count": 5 } }
            },
            {
                "metadata": { "name": "sink", "type": "sink" },
                "spec": { "using": [{ "role": "source" }] }
            }
        ]
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/wants")
                .header("content-type", "application/json")
                .body(Body::from(config.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let ids: Vec<String> = created["want_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids.len(), 2);

    for _ in 0..200 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/wants/sink/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = body_json(response).await;
        if status["status"] == "achieved" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/wants/sink/results")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let results = body_json(response).await;
    assert_eq!(results["total_processed"], 5);
}

#[tokio::test]
async fn deleting_an_unknown_want_is_a_404() {
    let response = app()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/v1/wants/missing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn recipe_crud_round_trips_through_the_api() {
    let app = app();

    let recipe = serde_json::json!({
        "name": "counter",
        "parameters": { "count": 10 },
        "template": { "wants": [] }
    });
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/recipes")
                .header("content-type", "application/json")
                .body(Body::from(recipe.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/recipes/counter")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["name"], "counter");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/v1/recipes/counter")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
