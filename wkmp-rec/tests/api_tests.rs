//! Integration tests for the wkmp-rec HTTP API

mod helpers;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use helpers::{context, seeded_store, wait_for_model, ScriptedEngine};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wkmp_rec::api::{create_router, AppState};
use wkmp_rec::diagnostics::DiagnosticsHub;
use wkmp_rec::RecService;

/// Router over 2 users and 6 songs; the engine ranks songs 1..=6
async fn setup_test_server() -> (axum::Router, RecService) {
    let store = seeded_store(2, 6).await;
    let engine = Arc::new(ScriptedEngine::empty((1..=6).collect()));
    let service = RecService::start(
        context(store, engine, Arc::new(DiagnosticsHub::default())),
        None,
    );

    let router = create_router(AppState::new(&service, 3));
    (router, service)
}

/// Send one request and decode the JSON body, if any
async fn make_request(
    app: &axum::Router,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Option<Value>) {
    let request = Request::builder().method(method).uri(path);
    let request = match body {
        Some(json_body) => request
            .header("content-type", "application/json")
            .body(Body::from(json_body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).ok();

    (status, json)
}

#[tokio::test]
async fn health_reports_model_state() {
    let (app, _service) = setup_test_server().await;

    let (status, body) = make_request(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);

    let body = body.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["module"], "wkmp-rec");
    assert_eq!(body["model"]["state"], "no_model");
    assert!(body["model"]["model_id"].is_null());
}

#[tokio::test]
async fn training_data_endpoints_return_created() {
    let (app, _service) = setup_test_server().await;

    let (status, body) = make_request(
        &app,
        Method::POST,
        "/api/v1/users",
        Some(json!({ "id": 10, "segment": "premium" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body.unwrap()["status"], "ok");

    let (status, _) = make_request(
        &app,
        Method::POST,
        "/api/v1/songs",
        Some(json!({ "id": 20, "title": "Heroes", "artist": "David Bowie", "tags": ["rock"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = make_request(
        &app,
        Method::POST,
        "/api/v1/ratings",
        Some(json!({ "user_id": 10, "song_id": 20, "value": 4.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn recommendations_before_training_are_unavailable() {
    let (app, _service) = setup_test_server().await;

    let (status, body) = make_request(&app, Method::GET, "/api/v1/recommendations/1", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body.unwrap()["error"]["code"], "MODEL_NOT_TRAINED");
}

#[tokio::test]
async fn recommendations_after_retrain() {
    let (app, service) = setup_test_server().await;

    let (status, _) = make_request(&app, Method::POST, "/api/v1/retrain", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    wait_for_model(service.supervisor()).await;

    // Default count from AppState
    let (status, body) = make_request(&app, Method::GET, "/api/v1/recommendations/1", None).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["user_id"], 1);
    assert_eq!(body["songs"].as_array().unwrap().len(), 3);

    let (status, body) = make_request(
        &app,
        Method::GET,
        "/api/v1/recommendations/2?count=5",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let songs = body.unwrap()["songs"].as_array().unwrap().clone();
    assert_eq!(songs.len(), 5);
    assert_eq!(songs[0]["id"], 1);
    assert_eq!(songs[0]["title"], "Song 1");

    let (_, body) = make_request(&app, Method::GET, "/health", None).await;
    assert_eq!(body.unwrap()["model"]["state"], "has_model");
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let (app, service) = setup_test_server().await;
    service.supervisor().retrain().unwrap();
    wait_for_model(service.supervisor()).await;

    let (status, body) = make_request(&app, Method::GET, "/api/v1/recommendations/404", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let body = body.unwrap();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(body["error"]["message"], "user not found: 404");
}

#[tokio::test]
async fn zero_count_is_bad_request() {
    let (app, _service) = setup_test_server().await;

    let (status, body) = make_request(
        &app,
        Method::GET,
        "/api/v1/recommendations/1?count=0",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.unwrap()["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let (app, _service) = setup_test_server().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/ratings")
        .header("content-type", "application/json")
        .body(Body::from("{\"user_id\": 1, \"song_id\":"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, body) = make_request(
        &app,
        Method::POST,
        "/api/v1/users",
        Some(json!({ "segment": "free" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.unwrap()["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn malformed_path_and_query_are_bad_request() {
    let (app, _service) = setup_test_server().await;

    let (status, body) =
        make_request(&app, Method::GET, "/api/v1/recommendations/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.unwrap()["error"]["code"], "BAD_REQUEST");

    let (status, body) = make_request(
        &app,
        Method::GET,
        "/api/v1/recommendations/1?count=many",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.unwrap()["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn health_degrades_after_shutdown() {
    let (app, service) = setup_test_server().await;
    let supervisor = service.supervisor().clone();
    service.shutdown();

    assert!(helpers::eventually(|| supervisor.is_closed()).await);

    let (status, body) = make_request(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["model"]["state"], "unavailable");
}
