mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::TestApp;

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::spawn().await;
    let response = app
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["status"], "ok");
    assert_eq!(response.json()["service"], "storage-service");
}

#[tokio::test]
async fn ready_and_request_id() {
    let app = TestApp::spawn().await;
    let response = app
        .send(
            Request::builder()
                .uri("/ready")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers.get("x-request-id").unwrap(), "req-42");
}
