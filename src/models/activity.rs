// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Stored activity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processed activity record in Firestore.
///
/// Keyed by `{source}_{source_id}`, so the (provider, external id) pair is
/// unique by construction. Updates from the provider overwrite the whole
/// document; deletes only happen on an explicit provider delete event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Provider name ("strava")
    pub source: String,
    /// Provider activity ID
    pub source_id: String,
    /// Owning user
    pub user_id: String,
    /// Activity name/title
    pub name: String,
    /// Start date/time (UTC), stored as a Firestore timestamp so range
    /// queries compare correctly
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub start_date: DateTime<Utc>,
    /// Total elapsed time in seconds
    pub elapsed_time: u32,
    /// Moving time in seconds
    pub moving_time: u32,
    /// Distance in meters
    pub distance: Option<f64>,
    /// Elevation gain in meters
    pub elevation_gain: Option<f64>,
    /// Average power in watts
    pub average_watts: Option<u32>,
    /// Max power in watts
    pub max_watts: Option<u32>,
    /// Normalized power in watts (derived from the power stream)
    pub normalized_power: Option<u32>,
    /// Training load (TSS, derived from NP and FTP)
    pub training_load: Option<u32>,
    /// Average heart rate in bpm
    pub average_hr: Option<u32>,
    /// Max heart rate in bpm
    pub max_hr: Option<u32>,
    /// Average cadence in rpm
    pub average_cadence: Option<u32>,
    /// Average speed in m/s
    pub average_speed: Option<f64>,
    /// Max speed in m/s
    pub max_speed: Option<f64>,
    /// Total work in kilojoules (as reported by the provider)
    pub kilojoules: Option<f64>,
    /// Estimated calories (derived from average power and duration)
    pub calories: Option<u32>,
    /// When this record was last written (ISO 8601)
    pub updated_at: String,
}

impl Activity {
    /// Firestore document ID for this record.
    pub fn doc_id(&self) -> String {
        activity_doc_id(&self.source, &self.source_id)
    }
}

/// Document ID for a (provider, external id) pair.
pub fn activity_doc_id(source: &str, source_id: &str) -> String {
    format!("{}_{}", source, source_id)
}
