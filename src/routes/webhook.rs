// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook routes for Strava events.

use crate::services::strava::PROVIDER;
use crate::services::ActivitySyncService;
use crate::AppState;
use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook/strava", get(verify).post(handle_event))
}

/// Strava webhook verification query params.
#[derive(Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: String,
    #[serde(rename = "hub.challenge")]
    challenge: String,
    #[serde(rename = "hub.verify_token")]
    verify_token: String,
}

/// Verification response.
#[derive(Serialize, Default)]
struct VerifyResponse {
    #[serde(rename = "hub.challenge")]
    challenge: String,
}

/// Verify webhook subscription (GET).
async fn verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    if params.mode == "subscribe" && params.verify_token == state.config.webhook_verify_token {
        tracing::info!("Webhook subscription verified");
        (
            StatusCode::OK,
            Json(VerifyResponse {
                challenge: params.challenge,
            }),
        )
    } else {
        tracing::warn!(
            mode = %params.mode,
            "Webhook verification failed: invalid token"
        );
        (StatusCode::FORBIDDEN, Json(VerifyResponse::default()))
    }
}

/// Strava webhook event payload.
#[derive(Deserialize, Debug)]
struct WebhookEvent {
    object_type: String, // "activity" or "athlete"
    object_id: u64,
    aspect_type: String, // "create", "update", "delete"
    owner_id: u64,
    /// For athlete events, contains {"authorized": "false"} on deauthorization
    #[serde(default)]
    updates: Option<std::collections::HashMap<String, serde_json::Value>>,
}

/// Check if a webhook event represents an athlete deauthorization.
/// Strava sends: object_type="athlete", aspect_type="update", updates={"authorized": "false"}
fn is_deauthorization(event: &WebhookEvent) -> bool {
    event
        .updates
        .as_ref()
        .and_then(|u| u.get("authorized"))
        .is_some_and(|v| v == false || v == "false")
}

/// Handle incoming webhook events (POST).
async fn handle_event(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> StatusCode {
    let event: WebhookEvent = match serde_json::from_value(payload) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse webhook event");
            return StatusCode::OK; // Still return 200 to Strava to avoid retries
        }
    };

    tracing::info!(
        object_type = %event.object_type,
        object_id = event.object_id,
        aspect_type = %event.aspect_type,
        owner_id = event.owner_id,
        "Webhook event received"
    );

    match (event.object_type.as_str(), event.aspect_type.as_str()) {
        // Updates are unconditional overwrites, so create and update share
        // the single-activity sync path.
        ("activity", "create") | ("activity", "update") => {
            let connection = match state
                .db
                .find_connection_by_account(PROVIDER, &event.owner_id.to_string())
                .await
            {
                Ok(Some(c)) => c,
                Ok(None) => {
                    tracing::warn!(
                        owner_id = event.owner_id,
                        "No connection for webhook owner, skipping sync"
                    );
                    return StatusCode::OK;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to look up connection for webhook");
                    return StatusCode::OK;
                }
            };

            let service = ActivitySyncService::new(
                state.db.clone(),
                state.strava_service.clone(),
                state.config.sync.clone(),
            );

            match service
                .sync_activity(&connection.user_id, &event.object_id.to_string())
                .await
            {
                Ok(activity) => {
                    tracing::info!(
                        user_id = %connection.user_id,
                        source_id = %activity.source_id,
                        "Webhook activity synced"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        object_id = event.object_id,
                        "Failed to sync webhook activity"
                    );
                }
            }
        }
        ("activity", "delete") => {
            if let Err(e) = state
                .db
                .delete_activity_by_source(PROVIDER, &event.object_id.to_string())
                .await
            {
                tracing::error!(
                    error = %e,
                    object_id = event.object_id,
                    "Failed to delete activity"
                );
            } else {
                tracing::info!(object_id = event.object_id, "Activity deleted");
            }
        }
        ("athlete", "update") if is_deauthorization(&event) => {
            if let Err(e) = state
                .db
                .delete_connection(PROVIDER, &event.owner_id.to_string())
                .await
            {
                tracing::error!(
                    error = %e,
                    owner_id = event.owner_id,
                    "Failed to remove connection on deauthorization"
                );
            } else {
                tracing::info!(owner_id = event.owner_id, "Connection removed");
            }
        }
        _ => {
            tracing::debug!(
                object_type = %event.object_type,
                aspect_type = %event.aspect_type,
                "Ignoring unhandled event type"
            );
        }
    }

    // Always return 200 OK quickly (Strava requirement)
    StatusCode::OK
}
