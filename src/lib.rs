// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Velotrend: training-load tracking backend.
//!
//! This crate syncs cycling activities from Strava, derives per-session
//! power metrics, and maintains each user's daily fitness/fatigue/form
//! time series for the dashboard.

pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::StravaService;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub strava_service: StravaService,
}
