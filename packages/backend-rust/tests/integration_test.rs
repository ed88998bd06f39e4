use axum::http::StatusCode;
use tower::ServiceExt;

mod common;

#[tokio::test]
async fn test_health_root() {
    let app = common::create_test_app();

    let response = app
        .oneshot(common::empty_request("GET", "/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
    assert_eq!(body["activeSessions"], 0);
}

#[tokio::test]
async fn test_health_live() {
    let app = common::create_test_app();

    let response = app
        .oneshot(common::empty_request("GET", "/health/live"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_info() {
    let app = common::create_test_app();

    let response = app
        .oneshot(common::empty_request("GET", "/health/info"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["service"], "pecs-backend");
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let app = common::create_test_app();

    let response = app
        .oneshot(common::empty_request("GET", "/api/nope"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = common::body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_FOUND");
}
