// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Turns a raw provider activity plus its power stream into a stored
//! `Activity` with derived metrics (NP, training load, calories).

use crate::error::AppError;
use crate::metrics::{calories, ftp_for_date, normalized_power, training_stress_score};
use crate::models::{Activity, FtpEntry};
use crate::services::strava::{StravaActivity, PROVIDER};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};

/// Power samples arrive at 1 Hz from the provider.
const SAMPLE_RATE_SECONDS: f64 = 1.0;

/// Build the stored activity record for a user.
///
/// Derived metrics degrade gracefully: no stream or no FTP for the date
/// means `None` for NP/load, never an error. A malformed start date is a
/// validation error; the caller rejects the single record and moves on.
pub fn process_activity(
    user_id: &str,
    raw: &StravaActivity,
    power_stream: Option<&[Option<f64>]>,
    ftp_history: &[FtpEntry],
) -> Result<Activity, AppError> {
    let start_date = parse_start_date(&raw.start_date, raw.id)?;

    let np = power_stream.and_then(|stream| normalized_power(stream, SAMPLE_RATE_SECONDS));

    let ftp = ftp_for_date(start_date, ftp_history);
    if ftp.is_none() && np.is_some() {
        tracing::warn!(
            user_id,
            activity_id = raw.id,
            start_date = %raw.start_date,
            "No FTP known for activity date, skipping training load"
        );
    }

    let training_load = match (np, ftp) {
        (Some(np), Some(ftp)) => {
            let tss = training_stress_score(np, raw.moving_time, f64::from(ftp));
            Some(tss.round() as u32)
        }
        _ => None,
    };

    let average_watts = raw.average_watts.map(|w| w.floor() as u32);
    let estimated_calories = if raw.moving_time > 0 && average_watts.is_some() {
        Some(calories(raw.moving_time, average_watts))
    } else {
        None
    };

    Ok(Activity {
        source: PROVIDER.to_string(),
        source_id: raw.source_id(),
        user_id: user_id.to_string(),
        name: raw.name.clone(),
        start_date,
        elapsed_time: raw.elapsed_time,
        moving_time: raw.moving_time,
        distance: Some(raw.distance),
        elevation_gain: Some(raw.total_elevation_gain),
        average_watts,
        max_watts: raw.max_watts.map(|w| w.floor() as u32),
        normalized_power: np.map(|v| v.round() as u32),
        training_load,
        average_hr: raw.average_heartrate.map(|v| v.floor() as u32),
        max_hr: raw.max_heartrate.map(|v| v.floor() as u32),
        average_cadence: raw.average_cadence.map(|v| v.floor() as u32),
        average_speed: raw.average_speed,
        max_speed: raw.max_speed,
        kilojoules: raw.kilojoules,
        calories: estimated_calories,
        updated_at: format_utc_rfc3339(Utc::now()),
    })
}

fn parse_start_date(raw: &str, activity_id: u64) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            AppError::Validation(format!(
                "Invalid start_date for activity {}: {}",
                activity_id, e
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw_ride() -> StravaActivity {
        StravaActivity {
            id: 42,
            name: "Morning Ride".to_string(),
            activity_type: "Ride".to_string(),
            sport_type: "Ride".to_string(),
            start_date: "2024-05-01T08:00:00Z".to_string(),
            distance: 40000.0,
            moving_time: 3600,
            elapsed_time: 3900,
            total_elevation_gain: 450.0,
            average_speed: Some(11.1),
            max_speed: Some(18.3),
            average_cadence: Some(87.4),
            average_watts: Some(210.6),
            max_watts: Some(650.0),
            kilojoules: Some(758.0),
            average_heartrate: Some(141.9),
            max_heartrate: Some(178.0),
        }
    }

    fn ftp_history(ftp: u32) -> Vec<FtpEntry> {
        vec![FtpEntry {
            user_id: "u1".to_string(),
            ftp,
            effective_from: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }]
    }

    #[test]
    fn derives_np_load_and_calories() {
        let stream: Vec<Option<f64>> = vec![Some(250.0); 3600];
        let history = ftp_history(250);

        let activity = process_activity("u1", &raw_ride(), Some(&stream), &history).unwrap();

        assert_eq!(activity.normalized_power, Some(250));
        // One hour at FTP is exactly 100 TSS
        assert_eq!(activity.training_load, Some(100));
        // 210 W x 3600 s through the efficiency factor, floored
        assert_eq!(activity.calories, Some(752));
        assert_eq!(activity.average_watts, Some(210));
        assert_eq!(activity.average_hr, Some(141));
        assert_eq!(activity.source, "strava");
        assert_eq!(activity.source_id, "42");
    }

    #[test]
    fn no_stream_means_no_derived_load() {
        let activity = process_activity("u1", &raw_ride(), None, &ftp_history(250)).unwrap();
        assert_eq!(activity.normalized_power, None);
        assert_eq!(activity.training_load, None);
        // Calories only need average power, so they still come out
        assert!(activity.calories.is_some());
    }

    #[test]
    fn no_ftp_means_no_training_load() {
        let stream: Vec<Option<f64>> = vec![Some(250.0); 3600];
        let activity = process_activity("u1", &raw_ride(), Some(&stream), &[]).unwrap();
        assert_eq!(activity.normalized_power, Some(250));
        assert_eq!(activity.training_load, None);
    }

    #[test]
    fn malformed_start_date_is_a_validation_error() {
        let mut raw = raw_ride();
        raw.start_date = "yesterday-ish".to_string();

        let err = process_activity("u1", &raw, None, &[]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
