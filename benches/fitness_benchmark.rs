use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use velotrend::metrics::{continuous_metrics, normalized_power, TrainingConstants, TrainingMetrics};

fn benchmark_continuous_metrics(c: &mut Criterion) {
    let start = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
    let end = start + Duration::days(3 * 365);

    // Three years of riding every other day with varying load
    let loads: Vec<_> = (0..3 * 365)
        .step_by(2)
        .map(|i| (start + Duration::days(i), 40.0 + (i % 90) as f64))
        .collect();

    let seed = TrainingMetrics {
        ctl: 35.0,
        atl: 30.0,
        tsb: 5.0,
    };

    c.bench_function("continuous_metrics_three_years", |b| {
        b.iter(|| {
            continuous_metrics(
                black_box(&loads),
                black_box(start),
                black_box(end),
                seed,
                TrainingConstants::default(),
            )
        })
    });
}

fn benchmark_normalized_power(c: &mut Criterion) {
    // A four-hour ride at 1 Hz with some dropouts
    let stream: Vec<Option<f64>> = (0..4 * 3600)
        .map(|i| {
            if i % 97 == 0 {
                None
            } else {
                Some(150.0 + (i % 300) as f64)
            }
        })
        .collect();

    c.bench_function("normalized_power_four_hours", |b| {
        b.iter(|| normalized_power(black_box(&stream), 1.0))
    });
}

criterion_group!(benches, benchmark_continuous_metrics, benchmark_normalized_power);
criterion_main!(benches);
