//! Adaptive trailing aggregation against reporting lag.
//!
//! Each day's counts are replaced by the sum over a trailing window. The window
//! for day `i` closes at the first lookback `w` where the denominators of days
//! `i - w ..= i` reach `min_denominator_to_close_window`, capped at
//! `max_window`. Busy days keep short windows; sparse days borrow from their
//! recent past.

use serde::{Deserialize, Serialize};

use crate::error::SensorError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillConfig {
    /// Maximum number of extra days a window may reach back.
    pub max_window: usize,
    pub min_denominator_to_close_window: f64,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            max_window: 7,
            min_denominator_to_close_window: 500.0,
        }
    }
}

impl BackfillConfig {
    pub fn validate(&self) -> Result<(), SensorError> {
        let t = self.min_denominator_to_close_window;
        if !(t.is_finite() && t >= 0.0) {
            return Err(SensorError::config(format!(
                "min_denominator_to_close_window must be non-negative and finite (got {t})"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackfillOutput {
    pub numerator: Vec<f64>,
    pub denominator: Vec<f64>,
    /// Lookback chosen for each day (0 means the day stands alone).
    pub windows: Vec<usize>,
}

/// Lookback for the day at `end`: the first `w` whose trailing denominator sum
/// meets `threshold`, capped at `max_window`.
fn closing_window(denominator: &[f64], end: usize, config: &BackfillConfig) -> usize {
    let mut total = 0.0;
    for (w, den) in denominator[..=end].iter().rev().enumerate() {
        total += den;
        if total >= config.min_denominator_to_close_window {
            return w.min(config.max_window);
        }
    }
    config.max_window
}

/// Re-bin `(numerator, denominator)` into adaptive trailing sums.
///
/// Windows that reach before the first day are truncated there.
pub fn backfill(numerator: &[f64], denominator: &[f64], config: &BackfillConfig) -> Result<BackfillOutput, SensorError> {
    if numerator.len() != denominator.len() {
        return Err(SensorError::LengthMismatch {
            numerator: numerator.len(),
            denominator: denominator.len(),
        });
    }
    config.validate()?;

    let n = denominator.len();
    let mut out = BackfillOutput {
        numerator: Vec::with_capacity(n),
        denominator: Vec::with_capacity(n),
        windows: Vec::with_capacity(n),
    };
    for i in 0..n {
        let w = closing_window(denominator, i, config);
        let from = i.saturating_sub(w);
        out.numerator.push(numerator[from..=i].iter().sum());
        out.denominator.push(denominator[from..=i].iter().sum());
        out.windows.push(w);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> (Vec<f64>, Vec<f64>) {
        let num: Vec<f64> = (0..9).map(|i| i as f64).collect();
        let den = vec![0.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 100.0, 101.0];
        (num, den)
    }

    fn cfg(max_window: usize, threshold: f64) -> BackfillConfig {
        BackfillConfig {
            max_window,
            min_denominator_to_close_window: threshold,
        }
    }

    #[test]
    fn zero_threshold_is_identity() {
        let (num, den) = series();
        let out = backfill(&num, &den, &cfg(7, 0.0)).unwrap();
        assert_eq!(out.numerator, num);
        assert_eq!(out.denominator, den);
        assert!(out.windows.iter().all(|&w| w == 0));
    }

    #[test]
    fn small_threshold_pairs_adjacent_days() {
        let (num, den) = series();
        let out = backfill(&num, &den, &cfg(7, 11.0)).unwrap();
        assert_eq!(out.numerator, vec![0.0, 1.0, 3.0, 5.0, 7.0, 9.0, 11.0, 7.0, 8.0]);
        assert_eq!(out.denominator, vec![0.0, 10.0, 20.0, 20.0, 20.0, 20.0, 20.0, 100.0, 101.0]);
    }

    #[test]
    fn unreachable_threshold_uses_max_window() {
        let (num, den) = series();
        let out = backfill(&num, &den, &cfg(7, 100.0)).unwrap();
        assert_eq!(out.numerator, vec![0.0, 1.0, 3.0, 6.0, 10.0, 15.0, 21.0, 7.0, 8.0]);
        assert_eq!(out.denominator, vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 100.0, 101.0]);

        let out = backfill(&num, &den, &cfg(3, 100.0)).unwrap();
        assert_eq!(out.numerator, vec![0.0, 1.0, 3.0, 6.0, 10.0, 14.0, 18.0, 7.0, 8.0]);
        assert_eq!(out.denominator, vec![0.0, 10.0, 20.0, 30.0, 40.0, 40.0, 40.0, 100.0, 101.0]);
    }

    #[test]
    fn window_closes_once_threshold_is_reached() {
        let num = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 10.0];
        let mut den = vec![10.0; 7];
        den.push(20.0);
        let out = backfill(&num, &den, &cfg(7, 50.0)).unwrap();
        assert_eq!(out.windows[7], 3);
        assert_eq!(out.numerator[7], 10.0);
        assert_eq!(out.denominator[7], 50.0);
    }

    #[test]
    fn higher_threshold_never_shrinks_windows() {
        let den: Vec<f64> = (0..30).map(|i| ((i * 37) % 23) as f64 * 4.0).collect();
        let num = vec![1.0; 30];
        let mut previous = vec![0; 30];
        for threshold in [0.0, 10.0, 50.0, 120.0, 300.0, 1000.0] {
            let out = backfill(&num, &den, &cfg(6, threshold)).unwrap();
            for (w, p) in out.windows.iter().zip(&previous) {
                assert!(w >= p);
            }
            previous = out.windows;
        }
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = backfill(&[1.0], &[1.0, 2.0], &BackfillConfig::default()).unwrap_err();
        assert!(matches!(err, SensorError::LengthMismatch { .. }));
    }
}
