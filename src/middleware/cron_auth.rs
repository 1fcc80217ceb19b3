// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authorization middleware for the /cron/* routes.
//!
//! Sync runs are triggered by the platform scheduler, which sends a shared
//! bearer secret. Anything else is rejected before the handler runs.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Require `Authorization: Bearer {CRON_SECRET}` on scheduled-job routes.
pub async fn require_cron_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match token {
        Some(token) if token == state.config.cron_secret => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!("Blocked cron request with invalid secret");
            Err(AppError::Unauthorized)
        }
        None => {
            tracing::warn!("Blocked cron request without authorization header");
            Err(AppError::Unauthorized)
        }
    }
}
