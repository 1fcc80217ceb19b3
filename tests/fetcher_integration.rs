// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fetcher tests against a stub Strava server.
//!
//! The stub serves the pagination and stream endpoints on a local port so
//! the fetcher's paging, burst batching and per-id error isolation can be
//! exercised end to end without touching the real API.

mod common;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use velotrend::config::SyncConfig;
use velotrend::services::ActivityFetcher;

const USER: &str = "user-1";

/// Ids with special behavior in the stub stream endpoint.
const MISSING_STREAM_ID: u64 = 9404;
const BROKEN_STREAM_ID: u64 = 9500;

#[derive(Clone, Default)]
struct StubState {
    list_requests: Arc<AtomicU32>,
    stream_requests: Arc<AtomicU32>,
}

fn ride(id: u64, activity_type: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Activity {}", id),
        "type": activity_type,
        "sport_type": activity_type,
        "start_date": "2024-05-01T08:00:00Z",
        "distance": 25000.0,
        "moving_time": 3600,
        "elapsed_time": 3700,
        "total_elevation_gain": 300.0,
        "average_watts": 200.0
    })
}

/// Paginated activity listing: two full pages of 2, then a short page of 1.
async fn list_activities(
    State(state): State<StubState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    state.list_requests.fetch_add(1, Ordering::SeqCst);

    let page: u32 = params
        .get("page")
        .and_then(|p| p.parse().ok())
        .unwrap_or(1);

    let body = match page {
        1 => json!([ride(1, "Ride"), ride(2, "Run")]),
        2 => json!([ride(3, "Ride"), ride(4, "VirtualRide")]),
        3 => json!([ride(5, "Ride")]),
        _ => json!([]),
    };

    Json(body)
}

async fn get_streams(
    State(state): State<StubState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    state.stream_requests.fetch_add(1, Ordering::SeqCst);

    match id {
        MISSING_STREAM_ID => (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"}))),
        BROKEN_STREAM_ID => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "boom"})),
        ),
        _ => (
            StatusCode::OK,
            Json(json!({
                "watts": {
                    "data": vec![Some(210.0); 60],
                    "series_type": "time",
                    "original_size": 60,
                    "resolution": "high"
                }
            })),
        ),
    }
}

async fn spawn_stub() -> (String, StubState) {
    let state = StubState::default();
    let app = Router::new()
        .route("/athlete/activities", get(list_activities))
        .route("/activities/{id}/streams", get(get_streams))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });

    (format!("http://{}", addr), state)
}

fn test_config() -> SyncConfig {
    SyncConfig {
        batch_size: 2,
        stream_batch_size: 10,
        stream_batch_delay_ms: 50,
        ..SyncConfig::default()
    }
}

#[tokio::test]
async fn pagination_stops_on_short_page_and_keeps_rides_only() {
    let (base_url, stub) = spawn_stub().await;
    let strava = common::stub_strava_service(base_url, USER);
    let fetcher = ActivityFetcher::new(strava, test_config());

    let after = chrono::Utc::now() - chrono::Duration::days(30);
    let before = chrono::Utc::now();

    let rides = fetcher
        .list_ride_activities(USER, after, before)
        .await
        .expect("listing should succeed");

    // Pages of 2, 2, 1: the short third page terminates the loop
    assert_eq!(stub.list_requests.load(Ordering::SeqCst), 3);
    // The Run on page 1 is filtered out, both Ride variants are kept
    let ids: Vec<&str> = rides.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(rides.len(), 4, "expected rides only, got {:?}", ids);
    assert!(rides.iter().all(|r| r.is_ride()));
}

#[tokio::test]
async fn stream_bursts_are_batched_and_paced() {
    let (base_url, stub) = spawn_stub().await;
    let strava = common::stub_strava_service(base_url, USER);
    let fetcher = ActivityFetcher::new(strava, test_config());

    let ids: Vec<String> = (1..=25).map(|i| i.to_string()).collect();

    let started = Instant::now();
    let result = fetcher
        .fetch_streams(USER, &ids)
        .await
        .expect("stream fetch should succeed");
    let elapsed = started.elapsed();

    // 25 ids at burst size 10: three bursts, so exactly two pauses
    assert_eq!(stub.stream_requests.load(Ordering::SeqCst), 25);
    assert!(
        elapsed >= Duration::from_millis(100),
        "two inter-burst delays expected, finished in {:?}",
        elapsed
    );

    assert_eq!(result.succeeded, 25);
    assert_eq!(result.failed, 0);
    assert_eq!(result.streams.len(), 25);
    assert!(result.streams.values().all(|s| s.is_some()));
}

#[tokio::test]
async fn missing_stream_is_null_not_failure() {
    let (base_url, _stub) = spawn_stub().await;
    let strava = common::stub_strava_service(base_url, USER);
    let fetcher = ActivityFetcher::new(strava, test_config());

    let ids = vec!["1".to_string(), MISSING_STREAM_ID.to_string()];
    let result = fetcher.fetch_streams(USER, &ids).await.unwrap();

    assert_eq!(result.succeeded, 2);
    assert_eq!(result.failed, 0);
    assert!(result.streams[&MISSING_STREAM_ID.to_string()].is_none());
    assert!(result.streams["1"].is_some());
    assert!(result.is_complete_success());
}

#[tokio::test]
async fn broken_stream_fails_alone_without_aborting_the_batch() {
    let (base_url, _stub) = spawn_stub().await;
    let strava = common::stub_strava_service(base_url, USER);
    let fetcher = ActivityFetcher::new(strava, test_config());

    let ids = vec![
        "1".to_string(),
        BROKEN_STREAM_ID.to_string(),
        "2".to_string(),
    ];
    let result = fetcher.fetch_streams(USER, &ids).await.unwrap();

    assert_eq!(result.succeeded, 2);
    assert_eq!(result.failed, 1);
    assert_eq!(result.failed_ids, vec![BROKEN_STREAM_ID.to_string()]);
    assert!(result.streams[&BROKEN_STREAM_ID.to_string()].is_none());
    assert!(!result.is_complete_success());
}

#[tokio::test]
async fn empty_id_list_is_a_noop() {
    let (base_url, stub) = spawn_stub().await;
    let strava = common::stub_strava_service(base_url, USER);
    let fetcher = ActivityFetcher::new(strava, test_config());

    let result = fetcher.fetch_streams(USER, &[]).await.unwrap();

    assert_eq!(result.succeeded, 0);
    assert_eq!(result.failed, 0);
    assert!(result.streams.is_empty());
    assert_eq!(stub.stream_requests.load(Ordering::SeqCst), 0);
}
