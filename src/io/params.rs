//! JSON run parameters.
//!
//! Every field is optional; missing sections fall back to their defaults:
//!
//! ```json
//! {
//!   "rate": { "smoother": { "window_length": 14 }, "min_denominator": 50 },
//!   "weekday": { "penalty": 100 },
//!   "start_date": "2020-03-01"
//! }
//! ```
//!
//! When no path is given on the command line, `SENSOR_PARAMS` (optionally from
//! a `.env` file) names the file to read.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, SensorError};
use crate::fit::{RateConfig, WeekdayConfig};

/// Environment variable naming the default parameter file.
pub const PARAMS_ENV: &str = "SENSOR_PARAMS";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunParams {
    pub rate: RateConfig,
    pub weekday: WeekdayConfig,
    /// First date to report.
    pub start_date: Option<NaiveDate>,
    /// Input rows after this date are ignored.
    pub end_date: Option<NaiveDate>,
}

impl RunParams {
    pub fn from_json_str(json: &str) -> Result<Self, AppError> {
        let params: RunParams =
            serde_json::from_str(json).map_err(|e| AppError::new(2, format!("Invalid run parameters: {e}")))?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), SensorError> {
        if self.rate.weekday.is_enabled() {
            self.weekday.validate()?;
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(SensorError::config(format!("end_date {end} precedes start_date {start}")));
            }
        }
        Ok(())
    }
}

/// Resolve and load run parameters.
///
/// Order: explicit path, then `SENSOR_PARAMS`, then defaults.
pub fn load_run_params(path: Option<&Path>) -> Result<RunParams, AppError> {
    let path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => {
            dotenvy::dotenv().ok();
            std::env::var(PARAMS_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        }
    };

    let Some(path) = path else {
        log::debug!("no parameter file given; using defaults");
        return Ok(RunParams::default());
    };
    let json = std::fs::read_to_string(&path)
        .map_err(|e| AppError::new(2, format!("Failed to read parameters '{}': {e}", path.display())))?;
    log::info!("loaded run parameters from {}", path.display());
    RunParams::from_json_str(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FilterKind, WeekdayStage};

    #[test]
    fn partial_json_keeps_defaults() {
        let params = RunParams::from_json_str(
            r#"{
                "rate": {
                    "smoother": { "filter": "identity" },
                    "min_denominator": 50,
                    "weekday": "after_backfill"
                },
                "start_date": "2020-03-01"
            }"#,
        )
        .unwrap();
        assert_eq!(params.rate.smoother.filter, FilterKind::Identity);
        assert_eq!(params.rate.smoother.window_length, 28);
        assert_eq!(params.rate.min_denominator, 50.0);
        assert_eq!(params.rate.backfill.max_window, 7);
        assert_eq!(params.rate.weekday, WeekdayStage::AfterBackfill);
        assert_eq!(params.weekday.scales.len(), 4);
        assert_eq!(params.start_date, NaiveDate::from_ymd_opt(2020, 3, 1));
    }

    #[test]
    fn unknown_kind_is_a_config_error() {
        let err = RunParams::from_json_str(r#"{"rate": {"smoother": {"filter": "hamburger"}}}"#).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn reversed_dates_are_rejected() {
        let err = RunParams::from_json_str(r#"{"start_date": "2020-03-02", "end_date": "2020-03-01"}"#).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn explicit_path_is_read() {
        let path = std::env::temp_dir().join(format!("sensor-params-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"rate": {"min_denominator": 10}}"#).unwrap();
        let params = load_run_params(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(params.rate.min_denominator, 10.0);
    }
}
