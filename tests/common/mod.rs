// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{Duration, Utc};
use std::sync::Arc;
use velotrend::config::Config;
use velotrend::db::FirestoreDb;
use velotrend::routes::create_router;
use velotrend::services::strava::{CachedToken, RefreshLocks, StravaClient, TokenCache};
use velotrend::services::StravaService;
use velotrend::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::default();
    let db = test_db_offline();

    let client = StravaClient::new(
        config.strava_client_id.clone(),
        config.strava_client_secret.clone(),
    );
    let token_cache: TokenCache = Arc::new(dashmap::DashMap::new());
    let refresh_locks: RefreshLocks = Arc::new(dashmap::DashMap::new());
    let strava_service = StravaService::new(client, db.clone(), token_cache, refresh_locks);

    let state = Arc::new(AppState {
        config,
        db,
        strava_service,
    });

    (create_router(state.clone()), state)
}

/// Build a StravaService against a stub server, with a pre-seeded token so
/// no database or OAuth round-trip is needed.
#[allow(dead_code)]
pub fn stub_strava_service(base_url: String, user_id: &str) -> StravaService {
    let client = StravaClient::with_base_url(
        "test_client_id".to_string(),
        "test_secret".to_string(),
        base_url,
    );

    let token_cache: TokenCache = Arc::new(dashmap::DashMap::new());
    token_cache.insert(
        user_id.to_string(),
        CachedToken::new("test-token".to_string(), Utc::now() + Duration::hours(1)),
    );
    let refresh_locks: RefreshLocks = Arc::new(dashmap::DashMap::new());

    StravaService::new(client, test_db_offline(), token_cache, refresh_locks)
}
