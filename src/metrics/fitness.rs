// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily fitness/fatigue/form model and the continuous range builder.
//!
//! The model is a two-pole exponentially weighted average of daily training
//! load: a 42-day constant (fitness/CTL) and a 7-day constant (fatigue/ATL),
//! with form (TSB) as their difference. The recurrence must run once per
//! calendar day in strict date order; days cannot be reordered or skipped.

use crate::time_utils::{day_end, utc_day};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fitness is treated as zero (ACWR undefined) below this value.
const ACWR_MIN_FITNESS: f64 = 0.001;

/// Decimal places kept on stored metric values.
pub const DEFAULT_PRECISION: u32 = 1;

/// One day's fitness/fatigue/form state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// Chronic training load (fitness)
    pub ctl: f64,
    /// Acute training load (fatigue)
    pub atl: f64,
    /// Training stress balance (form), kept redundantly as ctl - atl
    pub tsb: f64,
}

impl TrainingMetrics {
    /// All-zero state, used to seed users with no prior history.
    pub fn zero() -> Self {
        Self {
            ctl: 0.0,
            atl: 0.0,
            tsb: 0.0,
        }
    }
}

/// Time constants for the two weighted averages, in days.
#[derive(Debug, Clone, Copy)]
pub struct TrainingConstants {
    pub ctl_days: f64,
    pub atl_days: f64,
}

impl Default for TrainingConstants {
    fn default() -> Self {
        Self {
            ctl_days: 42.0,
            atl_days: 7.0,
        }
    }
}

/// A day's metrics tagged with its calendar date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatedMetrics {
    pub date: NaiveDate,
    pub metrics: TrainingMetrics,
}

/// Advance the model by one day.
///
/// `new = prev * e^(-1/days) + load * (1 - e^(-1/days))` for each pole,
/// all three outputs rounded to `precision` decimal places.
pub fn step_day(
    load_today: f64,
    prev: TrainingMetrics,
    constants: TrainingConstants,
    precision: u32,
) -> TrainingMetrics {
    let ctl_decay = (-1.0 / constants.ctl_days).exp();
    let atl_decay = (-1.0 / constants.atl_days).exp();

    let new_ctl = prev.ctl * ctl_decay + load_today * (1.0 - ctl_decay);
    let new_atl = prev.atl * atl_decay + load_today * (1.0 - atl_decay);
    let new_tsb = new_ctl - new_atl;

    TrainingMetrics {
        ctl: round_to(new_ctl, precision),
        atl: round_to(new_atl, precision),
        tsb: round_to(new_tsb, precision),
    }
}

/// Build the daily series for an inclusive date range.
///
/// Loads falling on the same UTC day are summed; days with no load step the
/// model with 0. `initial` is the state of the day before the range starts.
/// The end is normalized to the last instant of its calendar day, so a
/// date-only end covers its full day. Output is one entry per day, ascending.
pub fn continuous_metrics(
    loads: &[(DateTime<Utc>, f64)],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    initial: TrainingMetrics,
    constants: TrainingConstants,
) -> Vec<DatedMetrics> {
    let mut load_by_day: HashMap<NaiveDate, f64> = HashMap::new();
    for (date, load) in loads {
        *load_by_day.entry(utc_day(*date)).or_insert(0.0) += load;
    }

    let end = day_end(utc_day(end));

    let mut series = Vec::new();
    let mut current = initial;
    let mut day = utc_day(start);

    while crate::time_utils::day_start(day) <= end {
        let daily_load = load_by_day.get(&day).copied().unwrap_or(0.0);
        current = step_day(daily_load, current, constants, DEFAULT_PRECISION);
        series.push(DatedMetrics {
            date: day,
            metrics: current,
        });

        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    series
}

/// Acute:chronic workload ratio.
///
/// Undefined (`None`) while fitness is effectively zero, regardless of the
/// fatigue value; a ratio against nothing is noise, not risk signal.
pub fn acwr(atl: f64, ctl: f64) -> Option<f64> {
    if ctl <= ACWR_MIN_FITNESS {
        return None;
    }
    Some(atl / ctl)
}

fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}
