// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity sync orchestrator.
//!
//! Drives per-user synchronization of provider activities: list pages,
//! look up what's already stored, fetch power streams under the rate limit,
//! derive metrics, then reconcile creates vs updates. Users run with bounded
//! concurrency and per-user retry; one user failing never aborts the rest.

use crate::config::SyncConfig;
use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::Activity;
use crate::services::fetcher::ActivityFetcher;
use crate::services::processor::process_activity;
use crate::services::reconcile::{partition, Reconciler};
use crate::services::strava::{StravaActivity, StravaService, PROVIDER};
use crate::services::sync::{
    bounded_fan_out, with_retry, DateRange, RetryOutcome, SyncSummary, TargetStats,
};
use futures_util::StreamExt;
use std::time::Instant;

/// Orchestrates activity synchronization for all connected users.
#[derive(Clone)]
pub struct ActivitySyncService {
    db: FirestoreDb,
    strava: StravaService,
    fetcher: ActivityFetcher,
    reconciler: Reconciler,
    config: SyncConfig,
}

impl ActivitySyncService {
    pub fn new(db: FirestoreDb, strava: StravaService, config: SyncConfig) -> Self {
        Self {
            fetcher: ActivityFetcher::new(strava.clone(), config.clone()),
            reconciler: Reconciler::new(db.clone()),
            db,
            strava,
            config,
        }
    }

    /// Sync activities for every user with a Strava connection.
    ///
    /// Targets are discovered once at the start; connections created during
    /// the run are picked up by the next one. In dry-run mode every read and
    /// computation happens but nothing is written; the summary reports what
    /// would have been created and updated.
    pub async fn sync_activities(
        &self,
        range: DateRange,
        dry_run: bool,
    ) -> Result<SyncSummary, AppError> {
        self.config
            .validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let started = Instant::now();
        tracing::info!(
            start = %range.start,
            end = %range.end,
            dry_run,
            "Starting activity sync"
        );

        // Setup-level failure: cannot enumerate targets -> the run fails.
        let connections = self.db.find_connections(PROVIDER).await?;

        if connections.is_empty() {
            tracing::info!("No Strava connections found, nothing to sync");
            return Ok(SyncSummary::aggregate(&[], started.elapsed()));
        }

        tracing::info!(count = connections.len(), "Processing connections");

        let outcomes: Vec<RetryOutcome<TargetStats>> =
            bounded_fan_out(connections, self.config.concurrency_limit, |connection| {
                let service = self;
                async move {
                    let user_id = connection.user_id.clone();
                    with_retry(
                        || service.sync_user_activities(&user_id, range, dry_run),
                        service.config.retry_attempts,
                        service.config.retry_delay(),
                    )
                    .await
                }
            })
            .collect()
            .await;

        let summary = SyncSummary::aggregate(&outcomes, started.elapsed());
        tracing::info!(
            total = summary.total_targets,
            succeeded = summary.succeeded,
            failed = summary.failed,
            created = summary.total_created,
            updated = summary.total_updated,
            success_rate = summary.success_rate,
            duration_seconds = summary.duration_seconds,
            dry_run,
            "Activity sync complete"
        );

        Ok(summary)
    }

    /// Sync one user's activities inside the range.
    async fn sync_user_activities(
        &self,
        user_id: &str,
        range: DateRange,
        dry_run: bool,
    ) -> Result<TargetStats, AppError> {
        let rides = self
            .fetcher
            .list_ride_activities(user_id, range.start, range.normalized_end())
            .await?;

        let total = rides.len() as u32;
        if rides.is_empty() {
            tracing::info!(user_id, "No activities in range");
            return Ok(TargetStats::default());
        }

        let ids: Vec<String> = rides.iter().map(StravaActivity::source_id).collect();

        let existing = self.db.find_existing_source_ids(&ids, PROVIDER).await?;
        let ftp_history = self.db.find_ftp_history(user_id).await?;
        let streams = self.fetcher.fetch_streams(user_id, &ids).await?;

        let mut processed = Vec::with_capacity(rides.len());
        for raw in &rides {
            let power = streams
                .streams
                .get(&raw.source_id())
                .and_then(|s| s.as_ref())
                .and_then(|s| s.power());

            match process_activity(user_id, raw, power, &ftp_history) {
                Ok(activity) => processed.push(activity),
                Err(AppError::Validation(msg)) => {
                    // One malformed record is rejected, the batch continues.
                    tracing::warn!(user_id, error = %msg, "Rejecting malformed activity");
                }
                Err(e) => return Err(e),
            }
        }

        let plan = partition(processed, &existing);

        if dry_run {
            let stats = TargetStats {
                items: total,
                created: plan.creates.len() as u32,
                updated: plan.updates.len() as u32,
            };
            tracing::info!(
                user_id,
                would_create = stats.created,
                would_update = stats.updated,
                "Dry run complete for user"
            );
            return Ok(stats);
        }

        let (created, updated) = self.reconciler.apply(&plan).await?;

        tracing::info!(
            user_id,
            total,
            created,
            updated,
            stream_failures = streams.failed,
            "User activity sync complete"
        );

        Ok(TargetStats {
            items: total,
            created,
            updated,
        })
    }

    /// Sync one activity by external id (webhook create/update path).
    pub async fn sync_activity(
        &self,
        user_id: &str,
        source_id: &str,
    ) -> Result<Activity, AppError> {
        let raw = self.strava.get_activity(user_id, source_id).await?;

        let streams = match self.strava.get_streams(user_id, source_id).await {
            Ok(s) => Some(s),
            Err(e) if e.is_strava_not_found() => {
                // The stream may legitimately not exist
                tracing::warn!(user_id, source_id, "Activity stream not found on Strava");
                None
            }
            Err(e) => return Err(e),
        };

        let ftp_history = self.db.find_ftp_history(user_id).await?;

        let activity = process_activity(
            user_id,
            &raw,
            streams.as_ref().and_then(|s| s.power()),
            &ftp_history,
        )?;

        let existing = self
            .db
            .find_existing_source_ids(std::slice::from_ref(&activity.source_id), PROVIDER)
            .await?;

        if existing.contains(&activity.source_id) {
            self.db.update_activity_by_source(&activity).await?;
            tracing::info!(user_id, source_id, "Activity updated");
        } else {
            self.db
                .create_activities(std::slice::from_ref(&activity))
                .await?;
            tracing::info!(user_id, source_id, "Activity created");
        }

        Ok(activity)
    }
}
