// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for fetching activities and streams.
//!
//! Handles:
//! - Paginated activity listing
//! - Single-activity and stream fetches
//! - Token refresh when expired
//! - Rate limit detection (429) and token errors (401)

use crate::error::AppError;
use serde::Deserialize;
use std::collections::HashMap;

/// Stream channels requested for every activity.
const STREAM_KEYS: &str = "watts";

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self::with_base_url(
            client_id,
            client_secret,
            "https://www.strava.com/api/v3".to_string(),
        )
    }

    /// Create a client against a different base URL (stub servers in tests).
    pub fn with_base_url(client_id: String, client_secret: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            client_id,
            client_secret,
        }
    }

    /// List a page of the athlete's activities inside a time window.
    pub async fn list_activities(
        &self,
        access_token: &str,
        after: i64, // Unix timestamps
        before: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivity>, AppError> {
        let url = format!("{}/athlete/activities", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("after", after.to_string()),
                ("before", before.to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Get a detailed activity by ID.
    pub async fn get_activity(
        &self,
        access_token: &str,
        activity_id: &str,
    ) -> Result<StravaActivity, AppError> {
        let url = format!("{}/activities/{}", self.base_url, activity_id);
        self.get_json(&url, access_token).await
    }

    /// Get an activity's streams, keyed by channel name.
    pub async fn get_streams(
        &self,
        access_token: &str,
        activity_id: &str,
    ) -> Result<StravaStreamSet, AppError> {
        let url = format!("{}/activities/{}/streams", self.base_url, activity_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("keys", STREAM_KEYS), ("key_by_type", "true")])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, AppError> {
        let url = format!("{}/oauth/token", self.base_url);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token refresh request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Check response status and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("Strava rate limit hit (429)");
                return Err(AppError::StravaApi(AppError::STRAVA_RATE_LIMIT.to_string()));
            }

            if status.as_u16() == 401 {
                return Err(AppError::StravaApi(
                    AppError::STRAVA_TOKEN_ERROR.to_string(),
                ));
            }

            // Streams legitimately 404 for deleted or trainer-only activities;
            // callers match on this marker to treat it as "no stream".
            if status.as_u16() == 404 {
                return Err(AppError::StravaApi(AppError::STRAVA_NOT_FOUND.to_string()));
            }

            return Err(AppError::StravaApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::StravaApi(format!("JSON parse error: {}", e)))
    }
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Activity as returned by the Strava list and detail endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivity {
    pub id: u64,
    pub name: String,
    /// General type ("Ride", "Run", ...)
    #[serde(rename = "type", default)]
    pub activity_type: String,
    /// Specific type ("MountainBikeRide", ...)
    #[serde(default)]
    pub sport_type: String,
    /// UTC date-time, RFC3339
    pub start_date: String,
    pub distance: f64,
    pub moving_time: u32,
    pub elapsed_time: u32,
    pub total_elevation_gain: f64,
    pub average_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub average_cadence: Option<f64>,
    pub average_watts: Option<f64>,
    pub max_watts: Option<f64>,
    pub kilojoules: Option<f64>,
    pub average_heartrate: Option<f64>,
    pub max_heartrate: Option<f64>,
}

impl StravaActivity {
    /// Only cycling counts toward power-based training load.
    pub fn is_ride(&self) -> bool {
        self.activity_type == "Ride" || self.sport_type.ends_with("Ride")
    }

    pub fn source_id(&self) -> String {
        self.id.to_string()
    }
}

/// One stream channel (a per-sample series).
#[derive(Debug, Clone, Deserialize)]
pub struct StravaStream {
    pub data: Vec<Option<f64>>,
    #[serde(default)]
    pub series_type: String,
    #[serde(default)]
    pub original_size: u64,
    #[serde(default)]
    pub resolution: String,
}

/// All requested channels of an activity, keyed by channel name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct StravaStreamSet(pub HashMap<String, StravaStream>);

impl StravaStreamSet {
    /// The power channel, if the activity recorded one.
    pub fn power(&self) -> Option<&[Option<f64>]> {
        self.0.get("watts").map(|s| s.data.as_slice())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StravaService - High-level service with token management
// ─────────────────────────────────────────────────────────────────────────────

use crate::db::FirestoreDb;
use crate::models::ServiceConnection;
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The only provider this deployment syncs from.
pub const PROVIDER: &str = "strava";

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Cached access token with expiry information.
#[derive(Clone)]
pub struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn new(access_token: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token,
            expires_at,
        }
    }
}

/// Shared token cache type for use in AppState, keyed by user id.
pub type TokenCache = Arc<DashMap<String, CachedToken>>;

/// Shared refresh locks type for use in AppState.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// High-level Strava service that manages token lifecycle and API calls.
///
/// This is the "get a valid access token for a user" capability the sync
/// pipeline builds on:
/// - Connection lookup in Firestore
/// - Automatic token refresh when expiring (with 5-minute margin)
/// - In-memory token caching to avoid re-reading the connection per request
/// - Per-user locking to prevent duplicate refresh calls
#[derive(Clone)]
pub struct StravaService {
    client: StravaClient,
    db: FirestoreDb,
    /// In-memory cache of access tokens (shared across requests).
    token_cache: TokenCache,
    /// Per-user mutex to serialize token refresh operations.
    refresh_locks: RefreshLocks,
}

impl StravaService {
    /// Create a new Strava service with shared token cache.
    ///
    /// The `token_cache` and `refresh_locks` should be shared across all
    /// `StravaService` instances within a server instance.
    pub fn new(
        client: StravaClient,
        db: FirestoreDb,
        token_cache: TokenCache,
        refresh_locks: RefreshLocks,
    ) -> Self {
        Self {
            client,
            db,
            token_cache,
            refresh_locks,
        }
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Get a valid (non-expired) access token for the given user.
    ///
    /// 1. Check in-memory cache (fast path - no I/O)
    /// 2. Acquire per-user lock to prevent duplicate refresh calls
    /// 3. Re-check cache after lock (another task may have refreshed)
    /// 4. Fetch the connection from Firestore
    /// 5. If the token is still valid, cache and return
    /// 6. If expired or expiring within the margin, refresh with Strava and
    ///    persist the rotated tokens back to the connection
    pub async fn get_valid_token(&self, user_id: &str) -> Result<String, AppError> {
        let now = Utc::now();
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        if let Some(cached) = self.token_cache.get(user_id) {
            if now + margin < cached.expires_at {
                return Ok(cached.access_token.clone());
            }
            // Token expired or expiring soon - fall through to refresh
        }

        // Only one task per user performs the refresh; the rest wait here.
        let lock = self
            .refresh_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let _guard = lock.lock().await;

        // Another task may have refreshed while we were waiting.
        if let Some(cached) = self.token_cache.get(user_id) {
            if now + margin < cached.expires_at {
                return Ok(cached.access_token.clone());
            }
        }

        let connection = self
            .db
            .find_connection_for_user(user_id, PROVIDER)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("No {} connection for user {}", PROVIDER, user_id))
            })?;

        let expires_at = DateTime::parse_from_rfc3339(&connection.expires_at)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to parse expiry: {}", e)))?
            .with_timezone(&Utc);

        if now + margin < expires_at {
            // Token is still valid - cache and return
            self.token_cache.insert(
                user_id.to_string(),
                CachedToken {
                    access_token: connection.access_token.clone(),
                    expires_at,
                },
            );
            return Ok(connection.access_token);
        }

        tracing::info!(user_id, "Access token expired, refreshing");

        let refreshed = self.client.refresh_token(&connection.refresh_token).await?;

        let new_expires_at = DateTime::from_timestamp(refreshed.expires_at, 0).unwrap_or_default();
        let updated = ServiceConnection {
            access_token: refreshed.access_token.clone(),
            refresh_token: refreshed.refresh_token,
            expires_at: format_utc_rfc3339(new_expires_at),
            ..connection
        };
        self.db.set_connection(&updated).await?;

        self.token_cache.insert(
            user_id.to_string(),
            CachedToken {
                access_token: refreshed.access_token.clone(),
                expires_at: new_expires_at,
            },
        );

        tracing::info!(user_id, "Token refreshed and cached");
        Ok(refreshed.access_token)
    }

    // ─── API Wrappers ────────────────────────────────────────────────────────

    /// List a page of activities for a user.
    pub async fn list_activities(
        &self,
        user_id: &str,
        after: i64,
        before: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivity>, AppError> {
        let access_token = self.get_valid_token(user_id).await?;
        self.client
            .list_activities(&access_token, after, before, page, per_page)
            .await
    }

    /// Get a detailed activity by ID.
    pub async fn get_activity(
        &self,
        user_id: &str,
        activity_id: &str,
    ) -> Result<StravaActivity, AppError> {
        let access_token = self.get_valid_token(user_id).await?;
        self.client.get_activity(&access_token, activity_id).await
    }

    /// Get an activity's streams.
    pub async fn get_streams(
        &self,
        user_id: &str,
        activity_id: &str,
    ) -> Result<StravaStreamSet, AppError> {
        let access_token = self.get_valid_token(user_id).await?;
        self.client.get_streams(&access_token, activity_id).await
    }
}
