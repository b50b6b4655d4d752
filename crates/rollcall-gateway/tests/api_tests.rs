// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway routes driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use rollcall_core::{AttendanceStore, TransportError};
use rollcall_gateway::{GatewayState, router};
use rollcall_test_utils::TestHarness;
use serde_json::{Value, json};
use tower::ServiceExt;

fn state(h: &TestHarness) -> GatewayState {
    let store: Arc<dyn AttendanceStore> = h.store.clone();
    GatewayState::new(h.sessions.clone(), h.recorder.clone(), store, h.client.clone())
}

async fn call(h: &TestHarness, request: Request<Body>) -> (StatusCode, Value) {
    let response = router(state(h)).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

async fn create(h: &TestHarness) -> Value {
    let (status, body) = call(h, post("/v1/sessions", json!({"class_id": "CLS1", "duration_secs": 300}))).await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

#[tokio::test]
async fn session_create_and_lookup() {
    let h = TestHarness::new().await.unwrap();
    let session = create(&h).await;
    let code = session["session_code"].as_str().unwrap();
    assert_eq!(
        session["token"],
        format!("CLS1|{code}|{}", session["expires_at"])
    );
    assert_eq!(session["status"], "active");

    let (status, body) = call(&h, get(&format!("/v1/sessions/{code}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);

    let (status, body) = call(&h, get("/v1/sessions?class_id=CLS1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessions"].as_array().unwrap().len(), 1);

    let (status, _) = call(&h, get("/v1/sessions/unknown")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn session_create_maps_errors() {
    let h = TestHarness::builder().with_max_attempts(1).build().await.unwrap();
    let (status, _) = call(&h, post("/v1/sessions", json!({"class_id": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    h.ledger
        .fail_sends([TransportError::Unreachable("refused".into())])
        .await;
    let (status, body) = call(&h, post("/v1/sessions", json!({"class_id": "CLS1"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("ledger unavailable"));
}

#[tokio::test]
async fn scan_outcomes_map_to_status_codes() {
    let h = TestHarness::new().await.unwrap();
    let session = create(&h).await;
    let token = session["token"].as_str().unwrap().to_string();

    let (status, body) = call(&h, post("/v1/attendance", json!({"token": token, "student_id": "stu1"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "recorded");
    assert_eq!(body["record"]["state"], "confirmed");

    let (status, body) = call(&h, post("/v1/attendance", json!({"token": token, "student_id": "stu1"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "already_recorded");

    let (status, body) = call(&h, post("/v1/attendance", json!({"token": "a|b", "student_id": "stu1"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["outcome"], "invalid");

    h.ledger.hold_transactions(true).await;
    let (status, body) = call(&h, post("/v1/attendance", json!({"token": token, "student_id": "stu2"}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["outcome"], "pending");
    h.ledger.hold_transactions(false).await;

    h.ledger.require_registration(true).await;
    let (status, body) = call(&h, post("/v1/attendance", json!({"token": token, "student_id": "stu3"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["outcome"], "rejected");
    h.ledger.require_registration(false).await;

    h.ledger
        .fail_sends([
            TransportError::Unreachable("refused".into()),
            TransportError::Unreachable("refused".into()),
            TransportError::Unreachable("refused".into()),
        ])
        .await;
    let (status, body) = call(&h, post("/v1/attendance", json!({"token": token, "student_id": "stu4"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["outcome"], "ledger_unavailable");

    h.clock.advance(301);
    let (status, body) = call(&h, post("/v1/attendance", json!({"token": token, "student_id": "stu5"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["outcome"], "expired");
}

#[tokio::test]
async fn records_are_listed_with_filters() {
    let h = TestHarness::new().await.unwrap();
    let session = create(&h).await;
    let token = session["token"].as_str().unwrap().to_string();
    for student in ["stu1", "stu2"] {
        call(&h, post("/v1/attendance", json!({"token": token, "student_id": student}))).await;
    }

    let code = session["session_code"].as_str().unwrap();
    let (status, body) = call(&h, get(&format!("/v1/attendance?session_code={code}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["records"].as_array().unwrap().len(), 2);

    let (_, body) = call(&h, get("/v1/attendance?student_id=stu2&state=confirmed")).await;
    assert_eq!(body["records"].as_array().unwrap().len(), 1);

    let (status, _) = call(&h, get("/v1/attendance?limit=0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_components() {
    let h = TestHarness::new().await.unwrap();
    let (status, body) = call(&h, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    h.ledger.set_healthy(false).await;
    let (status, body) = call(&h, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert!(body["ledger"].as_str().unwrap().starts_with("unhealthy"));
}

#[tokio::test]
async fn metrics_endpoint_renders_when_enabled() {
    let h = TestHarness::new().await.unwrap();
    let (status, _) = call(&h, get("/metrics")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let app = router(state(&h).with_prometheus(Arc::new(|| "rollcall_marks_total 3\n".to_string())));
    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"rollcall_marks_total 3\n");
}
