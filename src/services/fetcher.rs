// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity fetcher: paginated listing plus rate-limited stream batches.
//!
//! Stream fetches are the expensive part of a sync. Strava allows roughly
//! 100 requests per 15 minutes, so ids are fetched in fixed-size bursts with
//! a pause between bursts. The pause is per user: concurrently syncing users
//! each pace themselves, there is no global limiter across users.

use crate::config::SyncConfig;
use crate::error::AppError;
use crate::services::strava::{StravaActivity, StravaService, StravaStreamSet};
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use std::collections::HashMap;

/// Result of fetching streams for a batch of activity ids.
///
/// Per-id failures are captured here instead of failing the whole fetch, so
/// one broken activity never costs the user their sync.
#[derive(Debug, Default)]
pub struct StreamFetchResult {
    /// Ids that resolved (including legitimate "no stream" answers).
    pub succeeded: u32,
    /// Ids whose fetch failed with a real error.
    pub failed: u32,
    /// The failing ids, for logging and diagnostics.
    pub failed_ids: Vec<String>,
    /// Stream per id; `None` when the stream does not exist or failed.
    pub streams: HashMap<String, Option<StravaStreamSet>>,
}

impl StreamFetchResult {
    pub fn is_complete_success(&self) -> bool {
        self.failed == 0
    }
}

/// Fetches activity lists and streams for one user at a time.
#[derive(Clone)]
pub struct ActivityFetcher {
    strava: StravaService,
    config: SyncConfig,
}

impl ActivityFetcher {
    pub fn new(strava: StravaService, config: SyncConfig) -> Self {
        Self { strava, config }
    }

    /// All ride-type activities for a user inside a time window.
    ///
    /// Pages from 1 upward until the provider returns a short or empty page.
    /// Page order matters: it is the pagination termination condition, so
    /// pages are fetched sequentially, never in parallel.
    pub async fn list_ride_activities(
        &self,
        user_id: &str,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Result<Vec<StravaActivity>, AppError> {
        let per_page = self.config.batch_size;
        let mut page = 1u32;
        let mut rides = Vec::new();

        loop {
            let batch = self
                .strava
                .list_activities(
                    user_id,
                    after.timestamp(),
                    before.timestamp(),
                    page,
                    per_page,
                )
                .await?;

            if batch.is_empty() {
                break;
            }

            let fetched = batch.len();
            rides.extend(batch.into_iter().filter(StravaActivity::is_ride));

            // A short page is the last page
            if fetched < per_page as usize {
                break;
            }
            page += 1;
        }

        tracing::debug!(user_id, count = rides.len(), "Listed ride activities");
        Ok(rides)
    }

    /// Fetch streams for many activity ids, respecting the rate limit.
    ///
    /// Ids are grouped into bursts of `stream_batch_size`; requests within a
    /// burst run concurrently, consecutive bursts are separated by
    /// `stream_batch_delay`. A 404 means the stream legitimately does not
    /// exist (deleted or trainer-recorded activity) and yields `None`; any
    /// other error is recorded against the id without aborting the burst.
    pub async fn fetch_streams(
        &self,
        user_id: &str,
        activity_ids: &[String],
    ) -> Result<StreamFetchResult, AppError> {
        let mut result = StreamFetchResult::default();

        for (index, burst) in activity_ids.chunks(self.config.stream_batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.stream_batch_delay()).await;
            }

            let fetched: Vec<(String, Result<StravaStreamSet, AppError>)> =
                stream::iter(burst.iter().cloned())
                    .map(|id| {
                        let strava = self.strava.clone();
                        let user_id = user_id.to_string();
                        async move {
                            let outcome = strava.get_streams(&user_id, &id).await;
                            (id, outcome)
                        }
                    })
                    .buffer_unordered(burst.len())
                    .collect()
                    .await;

            for (id, outcome) in fetched {
                match outcome {
                    Ok(streams) => {
                        result.succeeded += 1;
                        result.streams.insert(id, Some(streams));
                    }
                    Err(e) if e.is_strava_not_found() => {
                        // The activity has no stream; that's data, not an error.
                        tracing::warn!(user_id, activity_id = %id, "Stream not found on Strava");
                        result.succeeded += 1;
                        result.streams.insert(id, None);
                    }
                    Err(e) => {
                        tracing::warn!(
                            user_id,
                            activity_id = %id,
                            error = %e,
                            "Failed to fetch stream"
                        );
                        result.failed += 1;
                        result.failed_ids.push(id.clone());
                        result.streams.insert(id, None);
                    }
                }
            }
        }

        tracing::debug!(
            user_id,
            succeeded = result.succeeded,
            failed = result.failed,
            "Stream fetch complete"
        );
        Ok(result)
    }
}

/// Number of bursts (and thus inter-burst delays) a fetch will issue.
///
/// Kept as a standalone function so the batching arithmetic is testable
/// without a live client: `n` ids in bursts of `size` means
/// `ceil(n / size)` bursts and one fewer delays.
pub fn burst_count(id_count: usize, burst_size: usize) -> usize {
    if id_count == 0 || burst_size == 0 {
        return 0;
    }
    id_count.div_ceil(burst_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twenty_five_ids_make_three_bursts() {
        // 25 ids at burst size 10: bursts of 10, 10 and 5, with 2 pauses.
        assert_eq!(burst_count(25, 10), 3);
        assert_eq!(burst_count(25, 10) - 1, 2);
    }

    #[test]
    fn burst_count_edges() {
        assert_eq!(burst_count(0, 10), 0);
        assert_eq!(burst_count(10, 10), 1);
        assert_eq!(burst_count(11, 10), 2);
        assert_eq!(burst_count(5, 0), 0);
    }

    #[test]
    fn chunking_matches_burst_count() {
        let ids: Vec<String> = (0..25).map(|i| i.to_string()).collect();
        let chunks: Vec<&[String]> = ids.chunks(10).collect();
        assert_eq!(chunks.len(), burst_count(ids.len(), 10));
        assert_eq!(chunks[0].len(), 10);
        assert_eq!(chunks[2].len(), 5);
    }
}
