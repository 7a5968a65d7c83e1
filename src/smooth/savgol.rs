//! Causal Savitzky–Golay coefficients, prediction and filtering.
//!
//! A window is described by its bounds `nl..=nr` relative to the position being
//! estimated (`nl < nr <= 0`). The coefficients `c` satisfy
//!
//! ```text
//! ŷ(0) = Σ_i c_i y_i
//! ```
//!
//! i.e. they are row 0 (the constant term) of the weighted pseudo-inverse of the
//! polynomial design matrix. With `nr = 0` this smooths the newest sample; with
//! `nr = -1` it predicts one step ahead, which is what imputation uses.

use nalgebra::DMatrix;

use crate::domain::BoundaryKind;
use crate::error::SensorError;
use crate::math::weighted_pseudo_inverse;

/// Gaussian weight for offset `x` from the estimated position.
fn gaussian_weight(x: f64, bandwidth: Option<f64>) -> f64 {
    match bandwidth {
        Some(h) => (-(x * x) / h).exp(),
        None => 1.0,
    }
}

/// Savitzky–Golay coefficients for the window `nl..=nr`.
///
/// Returns `Ok(None)` when the (weighted) design matrix is singular, e.g. a
/// window with fewer points than polynomial coefficients.
///
/// # Errors
/// `Precondition` if `nl >= nr` or the window reaches into the future (`nr > 0`).
pub fn savgol_coeffs(nl: i64, nr: i64, degree: usize, bandwidth: Option<f64>) -> Result<Option<Vec<f64>>, SensorError> {
    if nl >= nr {
        return Err(SensorError::precondition(format!(
            "the left window bound ({nl}) should be less than the right ({nr})"
        )));
    }
    if nr > 0 {
        log::warn!("requested Savitzky-Golay window {nl}..={nr} is not causal");
        return Err(SensorError::precondition(format!(
            "the filter is no longer causal (right bound {nr} > 0)"
        )));
    }

    let xs: Vec<f64> = (nl..=nr).map(|x| x as f64).collect();
    let design = DMatrix::from_fn(xs.len(), degree + 1, |i, j| xs[i].powi(j as i32));
    let weights: Vec<f64> = xs.iter().map(|&x| gaussian_weight(x, bandwidth)).collect();

    Ok(weighted_pseudo_inverse(&design, &weights).map(|pinv| pinv.row(0).iter().copied().collect()))
}

/// Fit a polynomial through `signal` placed at offsets ending at `nr` and
/// evaluate it at offset 0.
///
/// `nr = 0` smooths the last sample; `nr = -1` anticipates the next one.
/// Returns `Ok(None)` on a singular fit.
pub fn savgol_predict(signal: &[f64], degree: usize, nr: i64, bandwidth: Option<f64>) -> Result<Option<f64>, SensorError> {
    let nl = nr - signal.len() as i64 + 1;
    let coeffs = savgol_coeffs(nl, nr, degree, bandwidth)?;
    Ok(coeffs.map(|c| dot(&c, signal)))
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Causal convolution of `coeffs` against `signal` with the requested
/// left-boundary treatment.
///
/// Positions with a full trailing window get the plain convolution. The first
/// `coeffs.len() - 1` positions depend on `boundary`; with
/// `ShortenedWindow` position 0 is always the raw value and any singular
/// refit falls back to the raw value.
pub fn savgol_filter(
    signal: &[f64],
    coeffs: &[f64],
    boundary: BoundaryKind,
    degree: usize,
    bandwidth: Option<f64>,
) -> Vec<f64> {
    let n = signal.len();
    let l = coeffs.len();
    let mut out = vec![f64::NAN; n];
    if l == 0 {
        return signal.to_vec();
    }

    for i in (l - 1)..n {
        out[i] = dot(coeffs, &signal[i + 1 - l..=i]);
    }

    let edge = (l - 1).min(n);
    match boundary {
        BoundaryKind::ShortenedWindow => {
            for ix in 0..edge {
                out[ix] = if ix == 0 {
                    signal[0]
                } else {
                    savgol_predict(&signal[..=ix], degree, 0, bandwidth)
                        .ok()
                        .flatten()
                        .unwrap_or(signal[ix])
                };
            }
        }
        BoundaryKind::Identity => out[..edge].copy_from_slice(&signal[..edge]),
        BoundaryKind::Nan => {}
    }
    out
}

/// Fill missing values with one-step-ahead polynomial predictions.
///
/// Near the left edge the fit uses every earlier value and lowers the
/// polynomial order to what the available points support; a gap right after
/// the first value carries that value forward. Later gaps use the trailing
/// `window_length` values, which may themselves be imputed. A singular fit
/// carries the previous value forward.
///
/// The caller must ensure `signal[0]` is present.
pub fn savgol_impute(signal: &[f64], window_length: usize, order: usize, bandwidth: Option<f64>) -> Vec<f64> {
    let mut out = signal.to_vec();
    for ix in 1..out.len() {
        if !out[ix].is_nan() {
            continue;
        }
        let predicted = if ix < window_length {
            if ix == 1 {
                Some(out[0])
            } else {
                savgol_predict(&out[..ix], order.min(ix - 1), -1, bandwidth)
                    .ok()
                    .flatten()
            }
        } else {
            savgol_predict(&out[ix - window_length..ix], order, -1, bandwidth)
                .ok()
                .flatten()
        };
        out[ix] = predicted.unwrap_or(out[ix - 1]);
    }
    out
}
