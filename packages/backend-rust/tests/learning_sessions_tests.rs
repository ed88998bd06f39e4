use std::sync::Arc;

use axum::http::StatusCode;
use pecs_backend::db::MemoryActivityStore;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;

async fn start_session(app: &axum::Router, body: Value) -> String {
    let response = app
        .clone()
        .oneshot(common::json_request("POST", "/api/sessions", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = common::body_json(response).await;
    body["data"]["sessionId"].as_str().unwrap().to_string()
}

async fn record(app: &axum::Router, id: &str, success: bool) -> Value {
    let response = app
        .clone()
        .oneshot(common::json_request(
            "POST",
            &format!("/api/sessions/{id}/trials"),
            json!({ "success": success, "responseTimeMs": 1200 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    common::body_json(response).await
}

#[tokio::test]
async fn test_session_flow_raises_then_persists() {
    let store = Arc::new(MemoryActivityStore::new());
    let service = common::service_with_store(store.clone());
    let app = common::app_with_service(service);

    let id = start_session(&app, json!({ "learnerId": "ana", "initialDifficulty": 3 })).await;

    for _ in 0..4 {
        let body = record(&app, &id, true).await;
        assert_eq!(body["data"]["difficultyChanged"], false);
    }
    let body = record(&app, &id, true).await;
    assert_eq!(body["data"]["difficultyChanged"], true);
    assert_eq!(body["data"]["newDifficulty"], 4);
    assert_eq!(body["data"]["sequence"], 5);

    let response = app
        .clone()
        .oneshot(common::empty_request(
            "GET",
            &format!("/api/sessions/{id}/performance"),
        ))
        .await
        .unwrap();
    let body = common::body_json(response).await;
    assert_eq!(body["data"]["successRate"], 1.0);
    assert_eq!(body["data"]["trend"], "stable");

    let response = app
        .clone()
        .oneshot(common::empty_request("POST", &format!("/api/sessions/{id}/end")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["data"]["persisted"], true);
    assert_eq!(body["data"]["report"]["totalTrials"], 5);
    assert_eq!(body["data"]["report"]["finalDifficulty"], 4);

    assert_eq!(store.activities(&id).len(), 5);
    let stored = store.session(&id).unwrap();
    assert_eq!(stored.record.learner_id, "ana");
    assert_eq!(stored.summary.unwrap().final_difficulty, 4);

    let response = app
        .clone()
        .oneshot(common::empty_request("GET", &format!("/api/sessions/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_start_without_body_uses_defaults() {
    let app = common::create_test_app();

    let response = app
        .clone()
        .oneshot(common::empty_request("POST", "/api/sessions"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = common::body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["currentDifficulty"], 2);
    assert_eq!(body["data"]["learnerId"], "guest");
    assert_eq!(body["data"]["settings"]["windowSize"], 10);

    let response = app
        .oneshot(common::empty_request("GET", "/api/sessions"))
        .await
        .unwrap();
    let body = common::body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_settings_are_rejected() {
    let app = common::create_test_app();

    let response = app
        .oneshot(common::json_request(
            "POST",
            "/api/sessions",
            json!({ "settings": { "minArraySize": 5, "maxArraySize": 3 } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_override_is_clamped_and_reset_restarts() {
    let app = common::create_test_app();
    let id = start_session(&app, json!({})).await;

    let response = app
        .clone()
        .oneshot(common::json_request(
            "PUT",
            &format!("/api/sessions/{id}/difficulty"),
            json!({ "difficulty": 42 }),
        ))
        .await
        .unwrap();
    let body = common::body_json(response).await;
    assert_eq!(body["data"]["currentDifficulty"], 6);

    record(&app, &id, false).await;

    let response = app
        .clone()
        .oneshot(common::json_request(
            "POST",
            &format!("/api/sessions/{id}/reset"),
            json!({ "initialDifficulty": 4 }),
        ))
        .await
        .unwrap();
    let body = common::body_json(response).await;
    assert_eq!(body["data"]["currentDifficulty"], 4);
    assert_eq!(body["data"]["totalTrials"], 0);
}

#[tokio::test]
async fn test_unknown_session_returns_404() {
    let app = common::create_test_app();

    let response = app
        .clone()
        .oneshot(common::json_request(
            "POST",
            "/api/sessions/missing/trials",
            json!({ "success": true, "responseTimeMs": 10 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = common::body_json(response).await;
    assert_eq!(body["code"], "NOT_FOUND");

    let response = app
        .oneshot(common::empty_request("GET", "/api/sessions/missing/events"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_trial_body_is_bad_request() {
    let app = common::create_test_app();
    let id = start_session(&app, json!({})).await;

    let response = app
        .oneshot(common::json_request(
            "POST",
            &format!("/api/sessions/{id}/trials"),
            json!({ "success": "yes" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["code"], "BAD_REQUEST");
}
