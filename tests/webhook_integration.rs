// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook endpoint behavior: subscription verification and event handling.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt; // for oneshot

fn post_event(payload: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook/strava")
        .header("Content-Type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

#[tokio::test]
async fn verification_echoes_challenge_with_valid_token() {
    let (app, state) = common::create_test_app();

    let uri = format!(
        "/webhook/strava?hub.mode=subscribe&hub.challenge=ch-123&hub.verify_token={}",
        state.config.webhook_verify_token
    );
    let response = app
        .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["hub.challenge"], "ch-123");
}

#[tokio::test]
async fn verification_with_bad_token_is_forbidden() {
    let (app, _state) = common::create_test_app();

    let uri = "/webhook/strava?hub.mode=subscribe&hub.challenge=ch-123&hub.verify_token=wrong";
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn malformed_event_is_acknowledged() {
    // Strava retries on non-200; a payload we cannot parse is logged and
    // acknowledged rather than bounced forever.
    let (app, _state) = common::create_test_app();

    let response = app
        .oneshot(post_event(serde_json::json!({"unexpected": "shape"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unhandled_event_types_are_acknowledged() {
    let (app, _state) = common::create_test_app();

    let response = app
        .oneshot(post_event(serde_json::json!({
            "object_type": "athlete",
            "object_id": 77,
            "aspect_type": "create",
            "owner_id": 77
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn activity_create_without_connection_is_acknowledged() {
    // The offline DB errors on lookup; the webhook logs and still answers
    // 200 so the provider does not retry into a wall.
    let (app, _state) = common::create_test_app();

    let response = app
        .oneshot(post_event(serde_json::json!({
            "object_type": "activity",
            "object_id": 123456,
            "aspect_type": "create",
            "owner_id": 77
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn deauthorization_event_is_acknowledged() {
    let (app, _state) = common::create_test_app();

    let response = app
        .oneshot(post_event(serde_json::json!({
            "object_type": "athlete",
            "object_id": 77,
            "aspect_type": "update",
            "owner_id": 77,
            "updates": {"authorized": "false"}
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
