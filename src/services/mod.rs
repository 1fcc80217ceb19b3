// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod activity_sync;
pub mod fetcher;
pub mod fitness_sync;
pub mod processor;
pub mod reconcile;
pub mod strava;
pub mod sync;

pub use activity_sync::ActivitySyncService;
pub use fetcher::{ActivityFetcher, StreamFetchResult};
pub use fitness_sync::FitnessSyncService;
pub use reconcile::Reconciler;
pub use strava::{StravaClient, StravaService};
pub use sync::{DateRange, SyncSummary};
