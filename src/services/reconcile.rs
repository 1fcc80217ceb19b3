// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reconciles fetched activities against stored ones.
//!
//! Classification is purely by external-id membership: an id we already have
//! is an update, everything else is a create. No content diffing; updates
//! are unconditional overwrites.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::Activity;
use std::collections::HashSet;

/// A partitioned batch of activities, ready to apply.
#[derive(Debug, Default)]
pub struct ReconcilePlan {
    pub creates: Vec<Activity>,
    pub updates: Vec<Activity>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty()
    }
}

/// Partition processed activities into create and update sets.
pub fn partition(activities: Vec<Activity>, existing_ids: &HashSet<String>) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();

    for activity in activities {
        if existing_ids.contains(&activity.source_id) {
            plan.updates.push(activity);
        } else {
            plan.creates.push(activity);
        }
    }

    plan
}

/// Applies reconcile plans against storage.
#[derive(Clone)]
pub struct Reconciler {
    db: FirestoreDb,
}

impl Reconciler {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// Apply a plan: one bulk duplicate-skipping insert for creates, then
    /// individual overwrites for updates. Returns (created, updated) counts.
    pub async fn apply(&self, plan: &ReconcilePlan) -> Result<(u32, u32), AppError> {
        let mut created = 0;
        let mut updated = 0;

        if !plan.creates.is_empty() {
            created = self.db.create_activities(&plan.creates).await?;
        }

        for activity in &plan.updates {
            self.db.update_activity_by_source(activity).await?;
            updated += 1;
        }

        Ok((created, updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn stored(source_id: &str) -> Activity {
        Activity {
            source: "strava".to_string(),
            source_id: source_id.to_string(),
            user_id: "u1".to_string(),
            name: format!("Ride {}", source_id),
            start_date: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            elapsed_time: 3600,
            moving_time: 3500,
            distance: Some(30000.0),
            elevation_gain: Some(200.0),
            average_watts: Some(180),
            max_watts: Some(520),
            normalized_power: Some(195),
            training_load: Some(70),
            average_hr: Some(140),
            max_hr: Some(175),
            average_cadence: Some(85),
            average_speed: Some(8.5),
            max_speed: Some(15.0),
            kilojoules: Some(630.0),
            calories: Some(620),
            updated_at: "2024-05-01T12:00:00Z".to_string(),
        }
    }

    #[test]
    fn partitions_by_id_membership() {
        let existing: HashSet<String> = ["10", "11"].iter().map(|s| s.to_string()).collect();
        let fetched = vec![stored("10"), stored("12")];

        let plan = partition(fetched, &existing);

        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].source_id, "10");
        assert_eq!(plan.creates.len(), 1);
        assert_eq!(plan.creates[0].source_id, "12");
    }

    #[test]
    fn empty_existing_set_means_all_creates() {
        let plan = partition(vec![stored("1"), stored("2")], &HashSet::new());
        assert_eq!(plan.creates.len(), 2);
        assert!(plan.updates.is_empty());
    }

    #[test]
    fn no_fetched_activities_is_an_empty_plan() {
        let existing: HashSet<String> = ["10"].iter().map(|s| s.to_string()).collect();
        let plan = partition(vec![], &existing);
        assert!(plan.is_empty());
    }
}
