//! Day-of-week reporting effects.
//!
//! Model (Poisson, log link, exposure = denominator):
//!
//! ```text
//! log E[num_t] = log(den_t) + β_wd(t) + α_t
//! ```
//!
//! with six free weekday effects (Mon..Sat; Sunday is minus their sum) and a
//! per-day baseline `α` whose third differences carry an L1 penalty. Only the
//! weekday effects are kept; correcting a series divides each numerator by
//! `exp(β_wd(t))`.
//!
//! The solver can fail on large-magnitude objectives, so fitting walks an
//! ascending list of objective scales and stops at the first success.

use chrono::{Datelike, NaiveDate, Weekday};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::domain::DailyCounts;
use crate::error::SensorError;
use crate::math::{AdmmSettings, DIFF_ORDER, PenalizedPoisson, solve_penalized_poisson};

/// Number of free weekday coefficients.
pub const N_WEEKDAY_EFFECTS: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeekdayConfig {
    /// Objective scales tried in order.
    pub scales: Vec<f64>,
    /// L1 weight on the baseline's third differences (divided by `N - 2`).
    pub penalty: f64,
    pub solver: AdmmSettings,
}

impl Default for WeekdayConfig {
    fn default() -> Self {
        Self {
            scales: vec![1.0, 1e5, 1e10, 1e15],
            penalty: 100.0,
            solver: AdmmSettings::default(),
        }
    }
}

impl WeekdayConfig {
    pub fn validate(&self) -> Result<(), SensorError> {
        if self.scales.is_empty() {
            return Err(SensorError::config("weekday scales must not be empty"));
        }
        if let Some(bad) = self.scales.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(SensorError::config(format!("weekday scale must be positive (got {bad})")));
        }
        if !(self.penalty.is_finite() && self.penalty > 0.0) {
            return Err(SensorError::config(format!(
                "weekday penalty must be positive and finite (got {})",
                self.penalty
            )));
        }
        Ok(())
    }
}

/// Fitted Monday..Saturday effects on the log scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeekdayEffect {
    coefficients: [f64; N_WEEKDAY_EFFECTS],
}

impl WeekdayEffect {
    pub fn new(coefficients: [f64; N_WEEKDAY_EFFECTS]) -> Self {
        Self { coefficients }
    }

    /// No correction at all.
    pub fn neutral() -> Self {
        Self::new([0.0; N_WEEKDAY_EFFECTS])
    }

    pub fn fixed_effects(&self) -> &[f64; N_WEEKDAY_EFFECTS] {
        &self.coefficients
    }

    /// Implied Sunday effect; the seven effects sum to zero.
    pub fn sunday(&self) -> f64 {
        -self.coefficients.iter().sum::<f64>()
    }

    pub fn effect_for(&self, date: NaiveDate) -> f64 {
        match date.weekday() {
            Weekday::Sun => self.sunday(),
            wd => self.coefficients[wd.num_days_from_monday() as usize],
        }
    }

    /// Correct a numerator series starting at `start`.
    pub fn adjust(&self, start: NaiveDate, numerator: &[f64]) -> Vec<f64> {
        numerator
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let date = start + chrono::Duration::days(i as i64);
                v / self.effect_for(date).exp()
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WeekdayFit {
    Fitted { effect: WeekdayEffect, scale: f64 },
    Unfitted,
}

impl WeekdayFit {
    pub fn effect(&self) -> Option<&WeekdayEffect> {
        match self {
            WeekdayFit::Fitted { effect, .. } => Some(effect),
            WeekdayFit::Unfitted => None,
        }
    }
}

/// Per-date totals over every history, on the union of their date ranges.
///
/// Returns `None` when there is nothing to aggregate.
pub fn aggregate_daily_totals<'a>(histories: impl IntoIterator<Item = &'a DailyCounts>) -> Option<DailyCounts> {
    let histories: Vec<&DailyCounts> = histories.into_iter().filter(|h| !h.is_empty()).collect();
    let first = histories.iter().map(|h| h.start).min()?;
    let last = histories.iter().map(|h| h.end()).max()?;
    let n = (last - first).num_days() as usize + 1;

    let mut numerator = vec![0.0; n];
    let mut denominator = vec![0.0; n];
    for h in histories {
        let offset = (h.start - first).num_days() as usize;
        for i in 0..h.len() {
            numerator[offset + i] += h.numerator[i];
            denominator[offset + i] += h.denominator[i];
        }
    }
    Some(DailyCounts {
        start: first,
        numerator,
        denominator,
    })
}

/// `N x 6` weekday indicators; Sunday rows are all `-1`. The per-day baseline
/// completes the design as an implicit identity block.
pub fn weekday_columns(dates: &[NaiveDate]) -> DMatrix<f64> {
    let mut x = DMatrix::zeros(dates.len(), N_WEEKDAY_EFFECTS);
    for (i, date) in dates.iter().enumerate() {
        match date.weekday() {
            Weekday::Sun => x.row_mut(i).fill(-1.0),
            wd => x[(i, wd.num_days_from_monday() as usize)] = 1.0,
        }
    }
    x
}

/// Fit weekday effects with the default configuration.
pub fn fit(totals: &DailyCounts) -> WeekdayFit {
    fit_with_scales(totals, &WeekdayConfig::default())
}

/// Fit weekday effects, retrying at each configured objective scale.
///
/// Days with a zero denominator do not enter the likelihood. Histories too
/// short for a third difference, or with no exposure at all, are unfitted.
pub fn fit_with_scales(totals: &DailyCounts, config: &WeekdayConfig) -> WeekdayFit {
    let n = totals.len();
    if n <= DIFF_ORDER {
        log::error!("unable to calculate weekday correction: only {n} days of history");
        return WeekdayFit::Unfitted;
    }
    if n < 7 {
        log::warn!("fitting weekday effects on {n} days, fewer than a full week");
    }

    let offset: Vec<f64> = totals
        .denominator
        .iter()
        .map(|&d| if d > 0.0 { d.ln() } else { f64::NEG_INFINITY })
        .collect();
    let (sum_num, sum_den) = totals
        .numerator
        .iter()
        .zip(&totals.denominator)
        .filter(|(_, d)| **d > 0.0)
        .fold((0.0, 0.0), |(a, b), (y, d)| (a + y, b + d));
    if sum_den <= 0.0 || !sum_den.is_finite() {
        log::error!("unable to calculate weekday correction: no denominator");
        return WeekdayFit::Unfitted;
    }

    let dates: Vec<NaiveDate> = totals.dates().collect();
    let columns = weekday_columns(&dates);
    let baseline = ((sum_num + 0.5) / (sum_den + 1.0)).ln();
    let mut start = DVector::from_element(N_WEEKDAY_EFFECTS + n, baseline);
    start.rows_mut(0, N_WEEKDAY_EFFECTS).fill(0.0);

    let problem = PenalizedPoisson {
        fixed: &columns,
        counts: &totals.numerator,
        offset: &offset,
        penalty: config.penalty / (n as f64 - 2.0),
        start: &start,
    };

    for &scale in &config.scales {
        match solve_penalized_poisson(&problem, scale, &config.solver) {
            Ok(beta) => {
                let mut coefficients = [0.0; N_WEEKDAY_EFFECTS];
                coefficients.copy_from_slice(&beta.as_slice()[..N_WEEKDAY_EFFECTS]);
                return WeekdayFit::Fitted {
                    effect: WeekdayEffect::new(coefficients),
                    scale,
                };
            }
            Err(err) => log::debug!("weekday fit failed at scale {scale:e}: {err}"),
        }
    }

    log::error!("unable to calculate weekday correction");
    WeekdayFit::Unfitted
}

/// Divide each numerator by its weekday factor; denominators are untouched.
pub fn apply(effect: &WeekdayEffect, counts: &DailyCounts) -> DailyCounts {
    DailyCounts {
        start: counts.start,
        numerator: effect.adjust(counts.start, &counts.numerator),
        denominator: counts.denominator.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekday_columns_follow_dates() {
        // 2020-01-05 is a Sunday, 2020-01-06 a Monday.
        let x = weekday_columns(&[d(2020, 1, 5), d(2020, 1, 6), d(2020, 1, 11)]);
        assert_eq!(x.shape(), (3, 6));
        assert!(x.row(0).iter().all(|v| *v == -1.0));
        assert_eq!(x[(1, 0)], 1.0);
        assert_eq!(x.row(1).sum(), 1.0);
        assert_eq!(x[(2, 5)], 1.0);
        assert_eq!(x.row(2).sum(), 1.0);
    }

    #[test]
    fn apply_matches_reference_values() {
        let effect = WeekdayEffect::new([1.0, -1.0, 1.0, -1.0, 1.0, -1.0]);
        let counts = DailyCounts::new(
            d(2020, 1, 1),
            (1..=10).map(|v| v as f64).collect(),
            vec![1.0; 10],
        )
        .unwrap();
        let out = apply(&effect, &counts);
        let expected = [
            0.36787944, 5.43656366, 1.10363832, 10.87312731, 5.0, 2.20727665, 19.0279728, 2.94303553, 24.46453646,
            3.67879441,
        ];
        for (a, b) in out.numerator.iter().zip(expected) {
            assert!((a - b).abs() < 1e-6, "{a} vs {b}");
        }
        assert_eq!(out.denominator, counts.denominator);
    }

    #[test]
    fn neutral_effect_leaves_counts_alone() {
        let counts = DailyCounts::new(d(2020, 1, 1), vec![3.0, 4.0], vec![5.0, 6.0]).unwrap();
        assert_eq!(apply(&WeekdayEffect::neutral(), &counts), counts);
    }

    #[test]
    fn effects_sum_to_zero_with_sunday() {
        let effect = WeekdayEffect::new([0.3, -0.2, 0.1, 0.05, -0.4, 0.7]);
        let total: f64 = effect.fixed_effects().iter().sum::<f64>() + effect.sunday();
        assert!(total.abs() < 1e-12);
        assert_eq!(effect.effect_for(d(2020, 1, 5)), effect.sunday());
    }

    #[test]
    fn constant_history_has_no_weekday_effect() {
        let counts = DailyCounts::new(d(2020, 1, 6), vec![100.0; 14], vec![1000.0; 14]).unwrap();
        let fit = fit(&counts);
        let effect = fit.effect().expect("fit should succeed");
        assert!(effect.fixed_effects().iter().all(|b| b.abs() < 1e-4));
    }

    fn weekly_pattern(days: usize) -> DailyCounts {
        // Starts on a Monday; the Sunday effect is -0.15.
        let effects = [0.2, 0.1, 0.0, -0.05, -0.1, 0.0, -0.15];
        let numerator = (0..days).map(|i| 100.0 * f64::exp(effects[i % 7])).collect();
        DailyCounts::new(d(2020, 1, 6), numerator, vec![1000.0; days]).unwrap()
    }

    #[test]
    fn failed_scale_is_retried_at_the_next_one() {
        // 1/(scale N) overflows at a subnormal scale, so the first attempt fails.
        let config = WeekdayConfig {
            scales: vec![1e-310, 1.0],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        match fit_with_scales(&weekly_pattern(28), &config) {
            WeekdayFit::Fitted { effect, scale } => {
                assert_eq!(scale, 1.0);
                assert!((effect.fixed_effects()[0] - 0.2).abs() < 1e-3);
                assert!((effect.sunday() + 0.15).abs() < 1e-3);
            }
            WeekdayFit::Unfitted => panic!("second scale should succeed"),
        }
    }

    #[test]
    fn exhausting_every_scale_is_unfitted() {
        let overflowing = WeekdayConfig {
            scales: vec![1e-310, 1e-320],
            ..Default::default()
        };
        assert_eq!(fit_with_scales(&weekly_pattern(28), &overflowing), WeekdayFit::Unfitted);

        let no_iterations = WeekdayConfig {
            solver: AdmmSettings {
                max_iter: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(fit_with_scales(&weekly_pattern(28), &no_iterations), WeekdayFit::Unfitted);
    }

    #[test]
    fn short_or_empty_histories_are_unfitted() {
        let counts = DailyCounts::new(d(2020, 1, 6), vec![1.0; 3], vec![10.0; 3]).unwrap();
        assert_eq!(fit(&counts), WeekdayFit::Unfitted);

        let counts = DailyCounts::new(d(2020, 1, 6), vec![0.0; 10], vec![0.0; 10]).unwrap();
        assert_eq!(fit(&counts), WeekdayFit::Unfitted);
    }

    #[test]
    fn aggregation_spans_union_of_ranges() {
        let a = DailyCounts::new(d(2020, 1, 1), vec![1.0, 2.0], vec![10.0, 20.0]).unwrap();
        let b = DailyCounts::new(d(2020, 1, 2), vec![5.0, 6.0], vec![50.0, 60.0]).unwrap();
        let total = aggregate_daily_totals([&a, &b]).unwrap();
        assert_eq!(total.start, d(2020, 1, 1));
        assert_eq!(total.numerator, vec![1.0, 7.0, 6.0]);
        assert_eq!(total.denominator, vec![10.0, 70.0, 60.0]);
        assert!(aggregate_daily_totals(std::iter::empty::<&DailyCounts>()).is_none());
    }

    #[test]
    fn config_validation() {
        assert!(WeekdayConfig::default().validate().is_ok());
        let bad = WeekdayConfig { scales: vec![], ..Default::default() };
        assert!(matches!(bad.validate(), Err(SensorError::Config(_))));
        let bad = WeekdayConfig { penalty: 0.0, ..Default::default() };
        assert!(bad.validate().is_err());
    }
}
