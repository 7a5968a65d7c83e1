use approx::{assert_abs_diff_eq, assert_relative_eq};
use std::time::Instant;

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use count_sensor::data::{SyntheticSpec, generate_counts};
use count_sensor::domain::{BoundaryKind, DailyCounts, FilterKind, ImputeKind};
use count_sensor::fit::weekday::{self, WeekdayConfig, WeekdayFit};
use count_sensor::math::AdmmSettings;
use count_sensor::fit::{BackfillConfig, backfill};
use count_sensor::smooth::{Smoother, SmootherConfig};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn all_configs() -> Vec<SmootherConfig> {
    let mut out = Vec::new();
    for filter in [
        FilterKind::Savgol,
        FilterKind::MovingAverage,
        FilterKind::LeftGaussLinear,
        FilterKind::Identity,
    ] {
        for impute in [ImputeKind::Savgol, ImputeKind::Zeros, ImputeKind::Identity] {
            for boundary in [BoundaryKind::ShortenedWindow, BoundaryKind::Identity, BoundaryKind::Nan] {
                out.push(SmootherConfig {
                    filter,
                    impute,
                    boundary,
                    window_length: 7,
                    ..Default::default()
                });
            }
        }
    }
    out
}

#[test]
fn backfill_closes_window_on_threshold() {
    let numerator = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 10.0];
    let mut denominator = vec![10.0; 7];
    denominator.push(20.0);
    let config = BackfillConfig {
        max_window: 7,
        min_denominator_to_close_window: 50.0,
    };

    let out = backfill(&numerator, &denominator, &config).unwrap();
    assert_eq!(out.numerator.len(), 8);
    // 20 + 10 + 10 + 10 reaches 50 three days back.
    assert_abs_diff_eq!(out.numerator[7], 10.0);
    assert_abs_diff_eq!(out.denominator[7], 50.0);
    assert!(out.denominator[7] >= config.min_denominator_to_close_window);
}

#[test]
fn all_missing_input_is_returned_unchanged() {
    let signal = [f64::NAN; 12];
    for config in all_configs() {
        let out = Smoother::new(config.clone()).unwrap().smooth(&signal).unwrap();
        assert_eq!(out.len(), signal.len());
        assert!(out.iter().all(|v| v.is_nan()), "{config:?}");
    }
}

#[test]
fn length_and_leading_missing_are_preserved_for_every_config() {
    let mut signal = vec![f64::NAN; 4];
    signal.extend((0..30).map(|i| 10.0 + ((i * 5) % 7) as f64));
    signal[15] = f64::NAN;

    for config in all_configs() {
        let out = Smoother::new(config.clone()).unwrap().smooth(&signal).unwrap();
        assert_eq!(out.len(), signal.len(), "{config:?}");
        assert!(out[..4].iter().all(|v| v.is_nan()), "{config:?}");
        let first_is_defined = match config.filter {
            FilterKind::Identity => true,
            FilterKind::Savgol => config.boundary != BoundaryKind::Nan,
            FilterKind::MovingAverage | FilterKind::LeftGaussLinear => false,
        };
        if first_is_defined {
            assert!(!out[4].is_nan(), "{config:?}");
        }
    }
}

#[test]
fn identity_filter_is_idempotent() {
    let config = SmootherConfig {
        filter: FilterKind::Identity,
        ..Default::default()
    };
    let smoother = Smoother::new(config).unwrap();
    let signal: Vec<f64> = (0..20).map(|i| (i as f64 * 0.7).cos() * 3.0).collect();
    assert_eq!(smoother.smooth(&signal).unwrap(), signal);
}

#[test]
fn savgol_reproduces_polynomials_away_from_boundary() {
    for degree in 0..=3usize {
        let signal: Vec<f64> = (0..60)
            .map(|i| {
                let x = i as f64 / 10.0;
                (0..=degree).map(|k| (k as f64 + 1.0) * x.powi(k as i32)).sum()
            })
            .collect();
        let config = SmootherConfig {
            poly_fit_degree: degree,
            window_length: 14,
            gaussian_bandwidth: None,
            boundary: BoundaryKind::Nan,
            ..Default::default()
        };
        let out = Smoother::new(config).unwrap().smooth(&signal).unwrap();
        for i in 13..60 {
            assert_relative_eq!(out[i], signal[i], epsilon = 1e-8, max_relative = 1e-8);
        }
    }
}

#[test]
fn constant_history_has_no_weekday_signal() {
    let counts = DailyCounts::new(date(2021, 2, 1), vec![50.0; 14], vec![400.0; 14]).unwrap();
    let fit = weekday::fit(&counts);
    let effect = fit.effect().expect("weekday fit");
    for b in effect.fixed_effects() {
        assert_abs_diff_eq!(*b, 0.0, epsilon = 1e-4);
    }
    let total: f64 = effect.fixed_effects().iter().sum::<f64>() + effect.sunday();
    assert_abs_diff_eq!(total, 0.0, epsilon = 1e-12);
}

#[test]
fn weekday_pattern_is_recovered_and_removed() {
    let truth = [0.2, -0.1, 0.05, 0.1, -0.15, 0.0];
    let sunday: f64 = -truth.iter().sum::<f64>();
    let start = date(2020, 1, 6);
    let n = 28;
    let mut numerator = Vec::with_capacity(n);
    for i in 0..n {
        let d = start + Duration::days(i as i64);
        let effect = match d.weekday() {
            Weekday::Sun => sunday,
            wd => truth[wd.num_days_from_monday() as usize],
        };
        numerator.push(1000.0 * effect.exp());
    }
    let counts = DailyCounts::new(start, numerator, vec![10_000.0; n]).unwrap();

    let WeekdayFit::Fitted { effect, .. } = weekday::fit(&counts) else {
        panic!("weekday fit failed");
    };
    for (b, t) in effect.fixed_effects().iter().zip(truth) {
        assert_abs_diff_eq!(*b, t, epsilon = 1e-3);
    }

    let corrected = weekday::apply(&effect, &counts);
    for v in &corrected.numerator {
        assert_relative_eq!(*v, 1000.0, max_relative = 1e-2);
    }
    assert_eq!(corrected.denominator, counts.denominator);
}

#[test]
fn pooled_year_of_history_fits_in_bounded_time() {
    let spec = SyntheticSpec {
        locations: 4,
        days: 365,
        ..Default::default()
    };
    let locations = generate_counts(&spec).unwrap();
    let totals = weekday::aggregate_daily_totals(locations.iter().map(|l| &l.counts)).unwrap();
    assert_eq!(totals.len(), 365);

    // Noisy yearly histories can need a few thousand ADMM iterations.
    let config = WeekdayConfig {
        solver: AdmmSettings {
            max_iter: 50_000,
            ..Default::default()
        },
        ..Default::default()
    };
    let started = Instant::now();
    let fit = weekday::fit_with_scales(&totals, &config);
    let elapsed = started.elapsed();

    let WeekdayFit::Fitted { effect, .. } = fit else {
        panic!("weekday fit failed on a year of history");
    };
    for (b, t) in effect.fixed_effects().iter().zip(spec.weekday_effects) {
        assert_abs_diff_eq!(*b, t, epsilon = 0.05);
    }
    assert!(elapsed.as_secs_f64() < 120.0, "weekday fit took {elapsed:?}");
}

#[test]
fn raising_the_threshold_never_narrows_windows() {
    let denominator: Vec<f64> = (0..40).map(|i| [0.0, 15.0, 40.0, 5.0, 90.0][i % 5]).collect();
    let numerator = vec![1.0; 40];
    let mut previous: Option<Vec<usize>> = None;
    for threshold in [0.0, 20.0, 60.0, 100.0, 250.0, 10_000.0] {
        let config = BackfillConfig {
            max_window: 5,
            min_denominator_to_close_window: threshold,
        };
        let out = backfill(&numerator, &denominator, &config).unwrap();
        if let Some(prev) = &previous {
            assert!(out.windows.iter().zip(prev).all(|(w, p)| w >= p));
        }
        previous = Some(out.windows);
    }
}
