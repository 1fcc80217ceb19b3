// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily training metrics model (the fitness/fatigue/form time series).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day of training metrics for one user.
///
/// Keyed by `{user_id}_{YYYY-MM-DD}`, so there is exactly one row per user
/// per UTC calendar day. A synchronized window has a row for every day in
/// range, rest days included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyFitness {
    pub user_id: String,
    /// UTC calendar date
    pub date: NaiveDate,
    /// CTL: long-time-constant weighted load average
    pub fitness: f64,
    /// ATL: short-time-constant weighted load average
    pub fatigue: f64,
    /// TSB: fitness - fatigue
    pub form: f64,
    /// Acute:chronic workload ratio; None while fitness is effectively zero
    pub acwr: Option<f64>,
    /// When this row was last written (ISO 8601)
    pub updated_at: String,
}

impl DailyFitness {
    /// Firestore document ID for this row.
    pub fn doc_id(&self) -> String {
        fitness_doc_id(&self.user_id, self.date)
    }
}

/// Document ID for a (user, day) pair.
pub fn fitness_doc_id(user_id: &str, date: NaiveDate) -> String {
    format!("{}_{}", user_id, date.format("%Y-%m-%d"))
}
