// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authorization and parameter validation on the /cron/* routes.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt; // for oneshot

fn cron_request(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("Authorization", auth);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn cron_without_auth_is_rejected() {
    let (app, _state) = common::create_test_app();

    let response = app
        .oneshot(cron_request(
            "/cron/sync-activities?after_date=2024-05-01",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cron_with_wrong_secret_is_rejected() {
    let (app, _state) = common::create_test_app();

    let response = app
        .oneshot(cron_request(
            "/cron/sync-fitness?after_date=2024-05-01",
            Some("Bearer not-the-secret"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cron_with_malformed_scheme_is_rejected() {
    let (app, _state) = common::create_test_app();

    let response = app
        .oneshot(cron_request(
            "/cron/sync-activities?after_date=2024-05-01",
            Some("Basic dXNlcjpwYXNz"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn inverted_date_range_is_a_validation_error() {
    let (app, state) = common::create_test_app();
    let auth = format!("Bearer {}", state.config.cron_secret);

    let response = app
        .oneshot(cron_request(
            "/cron/sync-activities?after_date=2024-05-10&before_date=2024-05-01",
            Some(&auth),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_after_date_is_rejected() {
    let (app, state) = common::create_test_app();
    let auth = format!("Bearer {}", state.config.cron_secret);

    let response = app
        .oneshot(cron_request("/cron/sync-activities", Some(&auth)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn authorized_run_surfaces_setup_failure_as_500() {
    // The offline mock DB fails target enumeration, which is a setup-level
    // failure: the whole run errors instead of reporting partial stats.
    let (app, state) = common::create_test_app();
    let auth = format!("Bearer {}", state.config.cron_secret);

    let response = app
        .oneshot(cron_request(
            "/cron/sync-activities?after_date=2024-05-01&dry_run=true",
            Some(&auth),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["error"], "database_error");
}

#[tokio::test]
async fn fitness_run_surfaces_setup_failure_as_500() {
    let (app, state) = common::create_test_app();
    let auth = format!("Bearer {}", state.config.cron_secret);

    let response = app
        .oneshot(cron_request(
            "/cron/sync-fitness?after_date=2024-05-01",
            Some(&auth),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
