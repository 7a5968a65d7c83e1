//! Causal smoothing of a single daily series.
//!
//! A [`Smoother`] is built once from a validated [`SmootherConfig`] and then
//! applied to any number of series. Savitzky–Golay coefficients are computed
//! eagerly at construction so a smoother can be shared read-only across
//! threads.
//!
//! Per call:
//! 1. leading missing values are set aside and re-attached at the end
//! 2. a suffix shorter than the polynomial degree (or of length 1) passes through
//! 3. remaining gaps are imputed
//! 4. the selected filter runs, followed by the optional floor

pub mod filters;
pub mod savgol;

use serde::{Deserialize, Serialize};

use crate::domain::{BoundaryKind, FilterKind, ImputeKind};
use crate::error::SensorError;

pub use filters::{left_gauss_linear, moving_average};
pub use savgol::{savgol_coeffs, savgol_filter, savgol_impute, savgol_predict};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmootherConfig {
    pub filter: FilterKind,
    /// Polynomial degree for the Savitzky–Golay filter.
    pub poly_fit_degree: usize,
    pub window_length: usize,
    /// Gaussian kernel bandwidth in variance units; `None` means uniform weights.
    pub gaussian_bandwidth: Option<f64>,
    pub impute: ImputeKind,
    /// Polynomial order used by `savgol` imputation.
    pub impute_order: usize,
    pub boundary: BoundaryKind,
    /// Values at or below this floor are raised to it after filtering.
    pub minval: Option<f64>,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            filter: FilterKind::Savgol,
            poly_fit_degree: 2,
            window_length: 28,
            gaussian_bandwidth: Some(144.0),
            impute: ImputeKind::Savgol,
            impute_order: 2,
            boundary: BoundaryKind::ShortenedWindow,
            minval: None,
        }
    }
}

impl SmootherConfig {
    pub fn validate(&self) -> Result<(), SensorError> {
        if self.window_length <= 1 {
            return Err(SensorError::config(format!(
                "window_length must be greater than 1 (got {})",
                self.window_length
            )));
        }
        if let Some(h) = self.gaussian_bandwidth {
            if !(h.is_finite() && h > 0.0) {
                return Err(SensorError::config(format!(
                    "gaussian_bandwidth must be positive and finite (got {h})"
                )));
            }
        }
        if let Some(floor) = self.minval {
            if !(floor.is_finite() && floor >= 0.0) {
                return Err(SensorError::config(format!(
                    "minval must be non-negative and finite (got {floor})"
                )));
            }
        }
        if self.impute == ImputeKind::Savgol && self.impute_order >= self.window_length {
            return Err(SensorError::config(format!(
                "impute_order ({}) must be less than window_length ({})",
                self.impute_order, self.window_length
            )));
        }
        Ok(())
    }
}

/// A validated smoother with precomputed filter coefficients.
#[derive(Debug, Clone)]
pub struct Smoother {
    config: SmootherConfig,
    coeffs: Option<Vec<f64>>,
}

impl Smoother {
    pub fn new(config: SmootherConfig) -> Result<Self, SensorError> {
        config.validate()?;
        let coeffs = match config.filter {
            FilterKind::Savgol => {
                let nl = -(config.window_length as i64 - 1);
                let coeffs = savgol_coeffs(nl, 0, config.poly_fit_degree, config.gaussian_bandwidth)?;
                Some(coeffs.ok_or_else(|| {
                    SensorError::config(format!(
                        "a degree {} polynomial cannot be fitted on a window of {}",
                        config.poly_fit_degree, config.window_length
                    ))
                })?)
            }
            _ => None,
        };
        Ok(Self { config, coeffs })
    }

    pub fn config(&self) -> &SmootherConfig {
        &self.config
    }

    /// Savitzky–Golay coefficients, oldest sample first.
    pub fn coeffs(&self) -> Option<&[f64]> {
        self.coeffs.as_deref()
    }

    /// Smooth `signal`, returning a series of the same length.
    ///
    /// # Errors
    /// `Precondition` only through imputation; see [`Smoother::impute`].
    pub fn smooth(&self, signal: &[f64]) -> Result<Vec<f64>, SensorError> {
        let Some(first) = signal.iter().position(|v| !v.is_nan()) else {
            return Ok(signal.to_vec());
        };
        let tail = &signal[first..];

        let smoothed = if tail.len() < self.config.poly_fit_degree || tail.len() == 1 {
            tail.to_vec()
        } else {
            let imputed = self.impute(tail)?;
            let mut out = self.filter(&imputed);
            if let Some(floor) = self.config.minval {
                for v in out.iter_mut().filter(|v| **v <= floor) {
                    *v = floor;
                }
            }
            out
        };

        let mut out = vec![f64::NAN; first];
        out.extend(smoothed);
        Ok(out)
    }

    /// Fill missing values according to the configured imputation kind.
    ///
    /// # Errors
    /// `Precondition` when `savgol` imputation sees a missing first value.
    pub fn impute(&self, signal: &[f64]) -> Result<Vec<f64>, SensorError> {
        match self.config.impute {
            ImputeKind::Savgol => {
                if signal.first().is_some_and(|v| v.is_nan()) {
                    return Err(SensorError::precondition(
                        "savgol imputation requires the first value to be present",
                    ));
                }
                Ok(savgol_impute(
                    signal,
                    self.config.window_length,
                    self.config.impute_order,
                    self.config.gaussian_bandwidth,
                ))
            }
            ImputeKind::Zeros => Ok(signal.iter().map(|v| if v.is_nan() { 0.0 } else { *v }).collect()),
            ImputeKind::Identity => Ok(signal.to_vec()),
        }
    }

    fn filter(&self, signal: &[f64]) -> Vec<f64> {
        let c = &self.config;
        match (c.filter, self.coeffs.as_deref()) {
            (FilterKind::Savgol, Some(coeffs)) => {
                savgol_filter(signal, coeffs, c.boundary, c.poly_fit_degree, c.gaussian_bandwidth)
            }
            (FilterKind::MovingAverage, _) => moving_average(signal, c.window_length),
            (FilterKind::LeftGaussLinear, _) => {
                left_gauss_linear(signal, c.gaussian_bandwidth, c.impute != ImputeKind::Identity)
            }
            _ => signal.to_vec(),
        }
    }
}
