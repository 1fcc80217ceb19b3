// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared orchestration primitives for the sync services.
//!
//! Both orchestrators (activities and fitness) follow the same contract:
//! targets are discovered once, processed with bounded concurrency, retried
//! per target with exponential backoff, and aggregated into a summary. A
//! failing target never takes down its siblings; only a setup failure fails
//! the whole run.

use crate::error::AppError;
use crate::time_utils::{day_end, utc_day};
use chrono::{DateTime, Utc};
use futures_util::{stream, Stream, StreamExt};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

/// An inclusive date range for a sync run.
///
/// The end is optional at the API boundary and defaults to "now"; it is
/// normalized to the last instant of its calendar day so date-only inputs
/// cover the full final day.
#[derive(Debug, Clone, Copy)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
        Self {
            start,
            end: end.unwrap_or_else(Utc::now),
        }
    }

    /// End pushed to the last instant of its calendar day.
    pub fn normalized_end(&self) -> DateTime<Utc> {
        day_end(utc_day(self.end))
    }
}

/// Outcome of an operation run under a retry policy.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, attempts_used: u32 },
    Failed { error: AppError, attempts_used: u32 },
}

impl<T> RetryOutcome<T> {
    /// Retries consumed beyond the first attempt.
    pub fn retries(&self) -> u32 {
        match self {
            RetryOutcome::Succeeded { attempts_used, .. }
            | RetryOutcome::Failed { attempts_used, .. } => attempts_used.saturating_sub(1),
        }
    }
}

/// Run an operation up to `max_attempts` times with exponential backoff.
///
/// The delay before attempt `n+1` is `base_delay * 2^(n-1)`. The last error
/// is returned after exhaustion together with the attempt count; callers
/// aggregate rather than propagate.
pub async fn with_retry<T, F, Fut>(
    mut operation: F,
    max_attempts: u32,
    base_delay: Duration,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                return RetryOutcome::Succeeded {
                    value,
                    attempts_used: attempt,
                }
            }
            Err(error) => {
                if attempt >= max_attempts {
                    return RetryOutcome::Failed {
                        error,
                        attempts_used: attempt,
                    };
                }

                let delay = base_delay * 2u32.saturating_pow(attempt - 1);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Retrying after failure"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Fan tasks out over a bounded pool and settle every result.
///
/// At most `concurrency_limit` tasks run at once; the rest queue in arrival
/// order for the next free slot. All outcomes are captured (never
/// first-error-wins) so the caller can aggregate partial failures.
pub fn bounded_fan_out<T, F, Fut, R>(
    targets: Vec<T>,
    concurrency_limit: usize,
    task: F,
) -> impl Stream<Item = R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    stream::iter(targets).map(task).buffer_unordered(concurrency_limit)
}

/// Per-target counters produced by one user's sync.
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetStats {
    /// Items examined (activities fetched, or metric days computed).
    pub items: u32,
    pub created: u32,
    pub updated: u32,
}

/// Aggregated result of a whole sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub total_targets: u32,
    pub succeeded: u32,
    pub failed: u32,
    /// Retries consumed across all targets.
    pub retries: u32,
    /// Total items examined across targets.
    pub total_items: u32,
    pub total_created: u32,
    pub total_updated: u32,
    pub duration_seconds: f64,
    /// succeeded / total, rounded percentage. 100 for an empty run.
    pub success_rate: u32,
}

impl SyncSummary {
    /// Fold settled per-target outcomes into run totals.
    pub fn aggregate(outcomes: &[RetryOutcome<TargetStats>], duration: Duration) -> Self {
        let mut summary = Self {
            total_targets: outcomes.len() as u32,
            succeeded: 0,
            failed: 0,
            retries: 0,
            total_items: 0,
            total_created: 0,
            total_updated: 0,
            duration_seconds: duration.as_secs_f64(),
            success_rate: 100,
        };

        for outcome in outcomes {
            summary.retries += outcome.retries();
            match outcome {
                RetryOutcome::Succeeded { value, .. } => {
                    summary.succeeded += 1;
                    summary.total_items += value.items;
                    summary.total_created += value.created;
                    summary.total_updated += value.updated;
                }
                RetryOutcome::Failed { error, .. } => {
                    summary.failed += 1;
                    tracing::error!(error = %error, "Target failed after retries");
                }
            }
        }

        if summary.total_targets > 0 {
            summary.success_rate = ((f64::from(summary.succeeded)
                / f64::from(summary.total_targets))
                * 100.0)
                .round() as u32;
        }

        summary
    }
}
