// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-session power metrics: normalized power, intensity factor, TSS,
//! calories and FTP lookup.

use crate::models::FtpEntry;
use chrono::{DateTime, Utc};

/// Seconds of data required for a valid normalized power value.
const NP_MIN_WINDOW_SECS: f64 = 30.0;

/// Calories = joules / (joules-per-kcal x human efficiency).
/// Cycling efficiency is roughly 24%.
const JOULES_PER_KCAL: f64 = 4184.0;
const HUMAN_EFFICIENCY: f64 = 0.24;

/// Normalized power from a raw power stream.
///
/// The sequence matters: a 30-second rolling mean, each windowed mean raised
/// to the 4th power, averaged, then the 4th root. Weighting the 4th powers
/// makes hard surges count disproportionately, unlike a plain average.
/// Missing samples count as 0 W. Returns `None` below 30 seconds of data.
pub fn normalized_power(power: &[Option<f64>], sample_rate_seconds: f64) -> Option<f64> {
    if sample_rate_seconds <= 0.0 {
        return None;
    }
    if (power.len() as f64) < NP_MIN_WINDOW_SECS / sample_rate_seconds {
        return None;
    }

    let window_size = (NP_MIN_WINDOW_SECS / sample_rate_seconds).round().max(1.0) as usize;
    let watts: Vec<f64> = power.iter().map(|p| p.unwrap_or(0.0)).collect();

    let mean_of_fourth: f64 = watts
        .windows(window_size)
        .map(|w| {
            let mean = w.iter().sum::<f64>() / window_size as f64;
            mean.powi(4)
        })
        .sum::<f64>()
        / (watts.len() - window_size + 1) as f64;

    Some(mean_of_fourth.powf(0.25))
}

/// Intensity factor: NP relative to FTP. 0 on non-positive inputs.
pub fn intensity_factor(normalized_power: f64, ftp: f64) -> f64 {
    if normalized_power <= 0.0 || ftp <= 0.0 {
        return 0.0;
    }
    normalized_power / ftp
}

/// Training stress score: IF² x hours x 100.
///
/// One hour ridden exactly at FTP scores 100. 0 on any invalid input.
pub fn training_stress_score(normalized_power: f64, duration_seconds: u32, ftp: f64) -> f64 {
    if normalized_power <= 0.0 || duration_seconds == 0 || ftp <= 0.0 {
        return 0.0;
    }

    let intensity = intensity_factor(normalized_power, ftp);
    let hours = f64::from(duration_seconds) / 3600.0;

    intensity * intensity * hours * 100.0
}

/// Variability index: NP over average power. 0 on non-positive inputs.
pub fn variability_index(normalized_power: f64, average_power: f64) -> f64 {
    if normalized_power <= 0.0 || average_power <= 0.0 {
        return 0.0;
    }
    normalized_power / average_power
}

/// Estimated calories burned from average power and duration.
///
/// Work in joules divided by the energy conversion factor and efficiency,
/// floored. 0 when no power data is available.
pub fn calories(duration_seconds: u32, average_watts: Option<u32>) -> u32 {
    let Some(watts) = average_watts.filter(|w| *w > 0) else {
        return 0;
    };
    let work = f64::from(watts) * f64::from(duration_seconds);
    (work / (JOULES_PER_KCAL * HUMAN_EFFICIENCY)).floor() as u32
}

/// Estimate FTP from a single known effort.
///
/// Band rules for common test durations, with Coggan's power-duration model
/// (`power x minutes^-0.07`) as the fallback.
pub fn estimate_ftp(power: f64, duration_minutes: f64) -> f64 {
    if power <= 0.0 || duration_minutes <= 0.0 {
        return 0.0;
    }

    if (55.0..=65.0).contains(&duration_minutes) {
        // 1-hour power is approximately 95% of FTP
        power / 0.95
    } else if (18.0..=22.0).contains(&duration_minutes) {
        // 20-minute power is approximately 105% of FTP
        power * 0.95
    } else if (4.5..=5.5).contains(&duration_minutes) {
        // 5-minute power is approximately 150% of FTP
        power / 1.5
    } else {
        power * duration_minutes.powf(-0.07)
    }
}

/// The FTP value effective on a date, from the user's dated history.
///
/// The history is a step function: pick the entry with the latest
/// `effective_from` at or before the date. `None` when the date predates
/// every known value.
pub fn ftp_for_date(date: DateTime<Utc>, history: &[FtpEntry]) -> Option<u32> {
    let mut sorted: Vec<&FtpEntry> = history.iter().collect();
    sorted.sort_by(|a, b| b.effective_from.cmp(&a.effective_from));

    sorted
        .into_iter()
        .find(|entry| entry.effective_from <= date)
        .map(|entry| entry.ftp)
}
