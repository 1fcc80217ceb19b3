// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scheduled-job routes.
//!
//! These endpoints are called by the platform scheduler, not by users, and
//! are protected by the cron bearer secret (see middleware/cron_auth.rs).

use crate::config::SyncConfig;
use crate::error::{AppError, Result};
use crate::services::{ActivitySyncService, DateRange, FitnessSyncService, SyncSummary};
use crate::time_utils::{day_end, day_start};
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::post,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Cron routes (require the cron bearer secret).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cron/sync-activities", post(sync_activities))
        .route("/cron/sync-fitness", post(sync_fitness))
}

/// Query parameters for a sync run.
#[derive(Debug, Deserialize)]
pub struct CronSyncParams {
    /// First day of the range (YYYY-MM-DD)
    pub after_date: NaiveDate,
    /// Last day of the range (YYYY-MM-DD); defaults to today
    pub before_date: Option<NaiveDate>,
    /// Compute everything, write nothing
    #[serde(default)]
    pub dry_run: bool,

    // Optional per-run tunable overrides
    pub concurrency_limit: Option<usize>,
    pub batch_size: Option<u32>,
    pub retry_attempts: Option<u32>,
}

impl CronSyncParams {
    /// Reject inverted ranges before any work starts. Override bounds are
    /// checked by `SyncConfig::validate` inside the orchestrator.
    fn validate(&self) -> Result<()> {
        if let Some(before) = self.before_date {
            if before < self.after_date {
                return Err(AppError::Validation(
                    "before_date must not precede after_date".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn range(&self) -> DateRange {
        DateRange::new(day_start(self.after_date), self.before_date.map(day_end))
    }

    /// Apply per-run overrides on top of the configured defaults.
    fn sync_config(&self, defaults: &SyncConfig) -> SyncConfig {
        let mut config = defaults.clone();
        if let Some(limit) = self.concurrency_limit {
            config.concurrency_limit = limit;
        }
        if let Some(size) = self.batch_size {
            config.batch_size = size;
        }
        if let Some(attempts) = self.retry_attempts {
            config.retry_attempts = attempts;
        }
        config
    }
}

/// Response envelope for sync runs.
#[derive(Serialize)]
pub struct CronResponse {
    pub status: String,
    pub message: String,
    pub data: SyncSummary,
}

impl CronResponse {
    fn success(message: impl Into<String>, data: SyncSummary) -> Json<Self> {
        Json(Self {
            status: "success".to_string(),
            message: message.into(),
            data,
        })
    }
}

/// Run the activity sync (called by the scheduler).
async fn sync_activities(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CronSyncParams>,
) -> Result<Json<CronResponse>> {
    params.validate()?;

    let service = ActivitySyncService::new(
        state.db.clone(),
        state.strava_service.clone(),
        params.sync_config(&state.config.sync),
    );

    let summary = service
        .sync_activities(params.range(), params.dry_run)
        .await?;

    let message = if params.dry_run {
        "Activities synced successfully (dry run)"
    } else {
        "Activities synced successfully"
    };

    Ok(CronResponse::success(message, summary))
}

/// Run the fitness sync (called by the scheduler).
async fn sync_fitness(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CronSyncParams>,
) -> Result<Json<CronResponse>> {
    params.validate()?;

    let service =
        FitnessSyncService::new(state.db.clone(), params.sync_config(&state.config.sync));

    let summary = service.sync_fitness(params.range(), params.dry_run).await?;

    let message = if params.dry_run {
        "Fitness metrics synced successfully (dry run)"
    } else {
        "Fitness metrics synced successfully"
    };

    Ok(CronResponse::success(message, summary))
}
