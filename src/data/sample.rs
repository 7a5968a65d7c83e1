//! Synthetic daily count histories.
//!
//! Each location gets a Poisson denominator around its own volume level and a
//! Poisson numerator whose rate follows a slow wave multiplied by a weekday
//! reporting pattern. Draws are seeded per location so results are
//! reproducible for a given spec.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Poisson;
use serde::{Deserialize, Serialize};

use crate::domain::DailyCounts;
use crate::error::SensorError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticSpec {
    pub locations: usize,
    pub days: usize,
    pub start: NaiveDate,
    pub seed: u64,
    /// Mean daily denominator of the busiest location.
    pub base_denominator: f64,
    /// Baseline proportion of the denominator that lands in the numerator.
    pub base_rate: f64,
    /// Relative amplitude of the slow wave in the rate.
    pub wave_amplitude: f64,
    pub wave_period_days: f64,
    /// Log-scale reporting effects for Monday..Saturday; Sunday balances them.
    pub weekday_effects: [f64; 6],
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            locations: 8,
            days: 120,
            start: NaiveDate::from_ymd_opt(2020, 3, 1).unwrap_or_default(),
            seed: 7,
            base_denominator: 4000.0,
            base_rate: 0.04,
            wave_amplitude: 0.5,
            wave_period_days: 90.0,
            weekday_effects: [0.15, 0.1, 0.05, 0.0, -0.05, -0.1],
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticLocation {
    pub geo_id: String,
    pub counts: DailyCounts,
}

pub fn generate_counts(spec: &SyntheticSpec) -> Result<Vec<SyntheticLocation>, SensorError> {
    if spec.locations == 0 || spec.days == 0 {
        return Err(SensorError::config("synthetic data needs at least one location and one day"));
    }
    if !(spec.base_denominator.is_finite() && spec.base_denominator > 0.0) {
        return Err(SensorError::config("base_denominator must be positive"));
    }
    if !(spec.base_rate > 0.0 && spec.base_rate < 1.0) {
        return Err(SensorError::config("base_rate must lie in (0, 1)"));
    }
    if !(spec.wave_period_days.is_finite() && spec.wave_period_days > 0.0) {
        return Err(SensorError::config("wave_period_days must be positive"));
    }

    (0..spec.locations)
        .map(|loc| generate_location(spec, loc))
        .collect()
}

fn generate_location(spec: &SyntheticSpec, loc: usize) -> Result<SyntheticLocation, SensorError> {
    let mut rng = StdRng::seed_from_u64(location_seed(spec, loc));
    // Volumes spread over two orders of magnitude so some locations need backfill.
    let volume = spec.base_denominator * 10f64.powf(-2.0 * rng.gen_range(0.0..1.0));
    let phase = rng.gen_range(0.0..std::f64::consts::TAU);
    let sunday = -spec.weekday_effects.iter().sum::<f64>();

    let mut numerator = Vec::with_capacity(spec.days);
    let mut denominator = Vec::with_capacity(spec.days);
    for day in 0..spec.days {
        let date = spec.start + Duration::days(day as i64);
        let effect = match date.weekday() {
            Weekday::Sun => sunday,
            wd => spec.weekday_effects[wd.num_days_from_monday() as usize],
        };
        let t = day as f64 / spec.wave_period_days;
        let wave = 1.0 + spec.wave_amplitude * (std::f64::consts::TAU * t + phase).sin();
        let rate = (spec.base_rate * wave * effect.exp()).clamp(0.0, 1.0);

        let den = poisson_draw(&mut rng, volume)?;
        let num = poisson_draw(&mut rng, den * rate)?.min(den);
        numerator.push(num);
        denominator.push(den);
    }

    Ok(SyntheticLocation {
        geo_id: format!("{:02}000", loc + 1),
        counts: DailyCounts::new(spec.start, numerator, denominator)?,
    })
}

fn poisson_draw(rng: &mut StdRng, mean: f64) -> Result<f64, SensorError> {
    if mean <= 0.0 {
        return Ok(0.0);
    }
    let dist = Poisson::new(mean).map_err(|e| SensorError::config(format!("poisson mean {mean}: {e}")))?;
    Ok(dist.sample(rng))
}

fn location_seed(spec: &SyntheticSpec, loc: usize) -> u64 {
    let mut hasher = DefaultHasher::new();
    spec.seed.hash(&mut hasher);
    loc.hash(&mut hasher);
    spec.days.hash(&mut hasher);
    spec.start.hash(&mut hasher);
    spec.base_denominator.to_bits().hash(&mut hasher);
    spec.base_rate.to_bits().hash(&mut hasher);
    hasher.finish()
}
