//! Per-location rate estimation.
//!
//! For one location's history:
//!
//! 1. optional weekday correction of the numerator (before or after step 2)
//! 2. adaptive backfill aggregation
//! 3. smoothing of numerator and denominator
//! 4. Jeffreys-style rate `(num + 0.5) / (den + 1)` and binomial standard error
//! 5. inclusion by smoothed denominator (and optionally recent raw activity)
//!
//! Rates and standard errors are reported on the 0–100 scale.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{DailyCounts, FitResult, LocationFit, WeekdayStage};
use crate::error::SensorError;
use crate::fit::backfill::{BackfillConfig, backfill};
use crate::fit::weekday::WeekdayEffect;
use crate::smooth::{Smoother, SmootherConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    pub smoother: SmootherConfig,
    pub backfill: BackfillConfig,
    /// Smallest smoothed denominator for a day to be reported.
    pub min_denominator: f64,
    /// Exclude a day when its trailing `k` raw denominators are all zero.
    pub min_recent_obs: Option<usize>,
    pub weekday: WeekdayStage,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            smoother: SmootherConfig::default(),
            backfill: BackfillConfig::default(),
            min_denominator: 100.0,
            min_recent_obs: None,
            weekday: WeekdayStage::Off,
        }
    }
}

/// Fits rates for individual locations with a fixed configuration.
#[derive(Debug, Clone)]
pub struct RateFitter {
    config: RateConfig,
    smoother: Smoother,
}

impl RateFitter {
    pub fn new(config: RateConfig) -> Result<Self, SensorError> {
        config.backfill.validate()?;
        if !(config.min_denominator.is_finite() && config.min_denominator >= 0.0) {
            return Err(SensorError::config(format!(
                "min_denominator must be non-negative and finite (got {})",
                config.min_denominator
            )));
        }
        if config.min_recent_obs == Some(0) {
            return Err(SensorError::config("min_recent_obs must be at least 1"));
        }
        let smoother = Smoother::new(config.smoother.clone())?;
        Ok(Self { config, smoother })
    }

    pub fn config(&self) -> &RateConfig {
        &self.config
    }

    /// Fit one location.
    ///
    /// `effect` is only used when the configured weekday stage is enabled.
    /// Rows dated before `start_date` are dropped.
    pub fn fit(
        &self,
        geo_id: &str,
        counts: &DailyCounts,
        start_date: Option<NaiveDate>,
        effect: Option<&WeekdayEffect>,
    ) -> Result<LocationFit, SensorError> {
        let stage = self.config.weekday;
        let effect = effect.filter(|_| stage.is_enabled());

        let mut numerator = counts.numerator.clone();
        if let (WeekdayStage::BeforeBackfill, Some(effect)) = (stage, effect) {
            numerator = effect.adjust(counts.start, &numerator);
        }

        let binned = backfill(&numerator, &counts.denominator, &self.config.backfill)?;
        let mut numerator = binned.numerator;
        if let (WeekdayStage::AfterBackfill, Some(effect)) = (stage, effect) {
            numerator = effect.adjust(counts.start, &numerator);
        }

        let den = self.smoother.smooth(&binned.denominator)?;
        let num = self.smoother.smooth(&numerator)?;

        let mut rows = Vec::with_capacity(counts.len());
        for (i, (n, d)) in num.iter().zip(&den).enumerate() {
            let date = counts.date_at(i);
            if start_date.is_some_and(|s| date < s) {
                continue;
            }
            let d = if d.is_nan() { f64::NAN } else { d.max(0.0) };
            let n = if n.is_nan() { f64::NAN } else { n.clamp(0.0, d.max(0.0)) };
            let rate = (n + 0.5) / (d + 1.0);

            let include = d >= self.config.min_denominator && rate.is_finite() && self.recently_active(counts, i);
            let standard_error = if include {
                (rate * (1.0 - rate) / d).sqrt()
            } else {
                f64::NAN
            };
            rows.push(FitResult {
                date,
                rate: rate * 100.0,
                standard_error: standard_error * 100.0,
                include,
            });
        }

        if let Some(last) = rows.last() {
            log::debug!(
                "{geo_id}: {} rows, last {} rate={:.4} se={:.4} include={}",
                rows.len(),
                last.date,
                last.rate,
                last.standard_error,
                last.include
            );
        }
        Ok(LocationFit {
            geo_id: geo_id.to_string(),
            rows,
        })
    }

    fn recently_active(&self, counts: &DailyCounts, i: usize) -> bool {
        match self.config.min_recent_obs {
            Some(k) => {
                let from = (i + 1).saturating_sub(k);
                counts.denominator[from..=i].iter().sum::<f64>() > 0.0
            }
            None => true,
        }
    }
}
