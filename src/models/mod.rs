// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod connection;
pub mod fitness;
pub mod ftp;

pub use activity::Activity;
pub use connection::ServiceConnection;
pub use fitness::DailyFitness;
pub use ftp::FtpEntry;
