//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - loaded from JSON run parameters
//! - exported to CSV

use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::SensorError;

/// Which filter the smoother applies after imputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Causal Savitzky–Golay (optionally Gaussian-weighted) polynomial filter.
    #[default]
    Savgol,
    /// Trailing mean; the first `window_length - 1` outputs are missing.
    #[value(name = "moving_average")]
    MovingAverage,
    /// Local linear regression over all prior samples with Gaussian weights.
    #[value(name = "left_gauss_linear")]
    LeftGaussLinear,
    Identity,
}

/// How interior missing values are filled before filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputeKind {
    /// One-step-ahead causal polynomial prediction.
    #[default]
    Savgol,
    Zeros,
    /// Leave missing values in place.
    Identity,
}

/// Savitzky–Golay behavior on the first `window_length - 1` outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    /// Refit on the largest available trailing window.
    #[default]
    ShortenedWindow,
    /// Keep the raw value.
    Identity,
    /// Emit missing values.
    Nan,
}

/// Where (and whether) the weekday correction is applied in the rate pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WeekdayStage {
    #[default]
    Off,
    #[value(name = "before_backfill")]
    BeforeBackfill,
    #[value(name = "after_backfill")]
    AfterBackfill,
}

impl WeekdayStage {
    pub fn is_enabled(self) -> bool {
        self != WeekdayStage::Off
    }
}

impl FromStr for FilterKind {
    type Err = SensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "savgol" => Ok(Self::Savgol),
            "moving_average" => Ok(Self::MovingAverage),
            "left_gauss_linear" => Ok(Self::LeftGaussLinear),
            "identity" => Ok(Self::Identity),
            other => Err(SensorError::config(format!("invalid smoother name '{other}'"))),
        }
    }
}

impl FromStr for ImputeKind {
    type Err = SensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "savgol" => Ok(Self::Savgol),
            "zeros" => Ok(Self::Zeros),
            "identity" => Ok(Self::Identity),
            other => Err(SensorError::config(format!("invalid impute method '{other}'"))),
        }
    }
}

impl FromStr for BoundaryKind {
    type Err = SensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shortened_window" => Ok(Self::ShortenedWindow),
            "identity" => Ok(Self::Identity),
            "nan" => Ok(Self::Nan),
            other => Err(SensorError::config(format!("invalid boundary method '{other}'"))),
        }
    }
}

/// One location's counts for a single date.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CountPair {
    pub numerator: f64,
    pub denominator: f64,
}

impl CountPair {
    pub fn new(numerator: f64, denominator: f64) -> Self {
        Self { numerator, denominator }
    }
}

/// Contiguous daily (numerator, denominator) history for one location.
///
/// Dates are implicit: day `i` is `start + i`. Gaps must be filled by the
/// caller (see [`DailyCounts::zero_filled`]) before the core sees the data.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyCounts {
    pub start: NaiveDate,
    pub numerator: Vec<f64>,
    pub denominator: Vec<f64>,
}

impl DailyCounts {
    pub fn new(start: NaiveDate, numerator: Vec<f64>, denominator: Vec<f64>) -> Result<Self, SensorError> {
        if numerator.len() != denominator.len() {
            return Err(SensorError::LengthMismatch {
                numerator: numerator.len(),
                denominator: denominator.len(),
            });
        }
        Ok(Self {
            start,
            numerator,
            denominator,
        })
    }

    /// Build from explicit `(date, counts)` rows, which must already be
    /// strictly increasing and gap-free.
    pub fn from_rows(rows: &[(NaiveDate, CountPair)]) -> Result<Self, SensorError> {
        let Some(&(start, _)) = rows.first() else {
            return Err(SensorError::Dates("no rows".to_string()));
        };
        for (i, pair) in rows.windows(2).enumerate() {
            let (prev, next) = (pair[0].0, pair[1].0);
            if next - prev != Duration::days(1) {
                return Err(SensorError::Dates(format!(
                    "row {} ({next}) does not follow {prev} by exactly one day",
                    i + 1
                )));
            }
        }
        let numerator = rows.iter().map(|(_, c)| c.numerator).collect();
        let denominator = rows.iter().map(|(_, c)| c.denominator).collect();
        Self::new(start, numerator, denominator)
    }

    /// Reindex sparse rows onto every calendar day in `[first, last]`,
    /// filling absent days with zero counts. Rows outside the range are
    /// ignored; duplicate dates are summed.
    pub fn zero_filled(rows: &[(NaiveDate, CountPair)], first: NaiveDate, last: NaiveDate) -> Result<Self, SensorError> {
        if last < first {
            return Err(SensorError::Dates(format!("range end {last} precedes start {first}")));
        }
        let n = (last - first).num_days() as usize + 1;
        let mut numerator = vec![0.0; n];
        let mut denominator = vec![0.0; n];
        for (date, counts) in rows {
            if *date < first || *date > last {
                continue;
            }
            let i = (*date - first).num_days() as usize;
            numerator[i] += counts.numerator;
            denominator[i] += counts.denominator;
        }
        Self::new(first, numerator, denominator)
    }

    pub fn len(&self) -> usize {
        self.numerator.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numerator.is_empty()
    }

    pub fn date_at(&self, i: usize) -> NaiveDate {
        self.start + Duration::days(i as i64)
    }

    /// Last covered date (`start` for an empty history).
    pub fn end(&self) -> NaiveDate {
        self.date_at(self.len().saturating_sub(1))
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..self.len()).map(|i| self.date_at(i))
    }
}

/// A per-day fitted rate.
///
/// `rate` and `standard_error` are on the 0–100 scale. `standard_error` is
/// NaN on excluded days.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub date: NaiveDate,
    pub rate: f64,
    pub standard_error: f64,
    pub include: bool,
}

/// Fit output for a single location.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationFit {
    pub geo_id: String,
    pub rows: Vec<FitResult>,
}

impl LocationFit {
    pub fn included(&self) -> impl Iterator<Item = &FitResult> + '_ {
        self.rows.iter().filter(|r| r.include)
    }

    pub fn n_included(&self) -> usize {
        self.included().count()
    }
}
