// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitness sync orchestrator.
//!
//! Rebuilds each user's daily fitness/fatigue/form series over a date range
//! from their stored activities. The series is seeded with the most recent
//! stored day strictly before the range, recomputed day by day in strict
//! date order, then diffed against the stored rows and written in bounded
//! batches.

use crate::config::SyncConfig;
use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::metrics::{acwr, continuous_metrics, TrainingConstants, TrainingMetrics};
use crate::models::DailyFitness;
use crate::services::sync::{
    bounded_fan_out, with_retry, DateRange, RetryOutcome, SyncSummary, TargetStats,
};
use crate::time_utils::{format_utc_rfc3339, utc_day};
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::StreamExt;
use std::collections::HashSet;
use std::time::Instant;

/// Orchestrates daily-metrics synchronization for all users with history.
#[derive(Clone)]
pub struct FitnessSyncService {
    db: FirestoreDb,
    config: SyncConfig,
}

impl FitnessSyncService {
    pub fn new(db: FirestoreDb, config: SyncConfig) -> Self {
        Self { db, config }
    }

    /// Recompute daily metrics for every user with training-load history.
    ///
    /// Targets are discovered once at the start of the run. Dry-run computes
    /// the full series and reports would-create/would-update counts without
    /// writing; a live rerun over unchanged activities writes the identical
    /// series back (the computation is deterministic in its inputs).
    pub async fn sync_fitness(
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
            "Starting fitness sync"
        );

        // Setup-level failure: cannot enumerate targets -> the run fails.
        let users = self.db.find_users_with_fitness_history().await?;

        if users.is_empty() {
            tracing::info!("No users with training history, nothing to sync");
            return Ok(SyncSummary::aggregate(&[], started.elapsed()));
        }

        tracing::info!(count = users.len(), "Processing users");

        let outcomes: Vec<RetryOutcome<TargetStats>> =
            bounded_fan_out(users, self.config.concurrency_limit, |user_id| {
                let service = self;
                async move {
                    with_retry(
                        || service.sync_user_fitness(&user_id, range, dry_run),
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
            retries = summary.retries,
            created = summary.total_created,
            updated = summary.total_updated,
            success_rate = summary.success_rate,
            duration_seconds = summary.duration_seconds,
            dry_run,
            "Fitness sync complete"
        );

        Ok(summary)
    }

    /// Rebuild one user's series over the range.
    async fn sync_user_fitness(
        &self,
        user_id: &str,
        range: DateRange,
        dry_run: bool,
    ) -> Result<TargetStats, AppError> {
        let start_day = utc_day(range.start);

        // Seed with the last stored day strictly before the range; a user
        // with no prior history starts the recurrence from zero.
        let seed = match self.db.find_latest_fitness_before(user_id, start_day).await? {
            Some(row) => {
                tracing::debug!(user_id, seed_date = %row.date, "Seeding from stored metrics");
                TrainingMetrics {
                    ctl: row.fitness,
                    atl: row.fatigue,
                    tsb: row.form,
                }
            }
            None => TrainingMetrics::zero(),
        };

        let activities = self
            .db
            .find_activities_in_range(user_id, range.start, range.normalized_end())
            .await?;

        let loads: Vec<(DateTime<Utc>, f64)> = activities
            .iter()
            .filter_map(|a| a.training_load.map(|load| (a.start_date, f64::from(load))))
            .collect();

        let series = continuous_metrics(
            &loads,
            range.start,
            range.end,
            seed,
            TrainingConstants::default(),
        );

        let end_day = utc_day(range.normalized_end());
        let existing: HashSet<NaiveDate> = self
            .db
            .find_fitness_in_range(user_id, start_day, end_day)
            .await?
            .into_iter()
            .map(|row| row.date)
            .collect();

        let now = format_utc_rfc3339(Utc::now());
        let mut created = 0u32;
        let mut updated = 0u32;
        let mut rows = Vec::with_capacity(series.len());

        for entry in &series {
            if existing.contains(&entry.date) {
                updated += 1;
            } else {
                created += 1;
            }

            let m = entry.metrics;
            rows.push(DailyFitness {
                user_id: user_id.to_string(),
                date: entry.date,
                fitness: m.ctl,
                fatigue: m.atl,
                form: m.tsb,
                // Recomputed from the fresh pair, not carried from storage
                acwr: acwr(m.atl, m.ctl),
                updated_at: now.clone(),
            });
        }

        let stats = TargetStats {
            items: series.len() as u32,
            created,
            updated,
        };

        if dry_run {
            tracing::info!(
                user_id,
                days = stats.items,
                would_create = created,
                would_update = updated,
                "Dry run complete for user"
            );
            return Ok(stats);
        }

        self.db.batch_write_fitness(&rows).await?;

        tracing::info!(
            user_id,
            days = stats.items,
            created,
            updated,
            "User fitness sync complete"
        );

        Ok(stats)
    }
}
