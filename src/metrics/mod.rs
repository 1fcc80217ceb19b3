// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pure training-metrics math: per-session power metrics and the daily
//! fitness/fatigue/form model. No I/O in this module.

pub mod fitness;
pub mod power;

pub use fitness::{
    acwr, continuous_metrics, step_day, DatedMetrics, TrainingConstants, TrainingMetrics,
};
pub use power::{
    calories, estimate_ftp, ftp_for_date, intensity_factor, normalized_power,
    training_stress_score, variability_index,
};
