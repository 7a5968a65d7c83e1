//! Non-polynomial causal filters: trailing mean and left-Gaussian local linear.

use nalgebra::{DMatrix, DVector};

use crate::math::solve_weighted_least_squares;

/// Trailing mean over `window_length` samples.
///
/// The first `window_length - 1` outputs are missing. Any missing input inside
/// a window makes that output missing.
pub fn moving_average(signal: &[f64], window_length: usize) -> Vec<f64> {
    let n = signal.len();
    let mut out = vec![f64::NAN; n];
    if window_length == 0 || window_length > n {
        return out;
    }
    let w = window_length as f64;
    for i in (window_length - 1)..n {
        out[i] = signal[i + 1 - window_length..=i].iter().sum::<f64>() / w;
    }
    out
}

/// Local linear regression at each index over every earlier sample.
///
/// Sample `t` is weighted by `exp(-(t - idx)^2 / h)`; with no bandwidth the
/// weights are uniform. A singular fit (always the case at index 0) yields the
/// raw value when `fallback_raw` is set, and a missing value otherwise.
pub fn left_gauss_linear(signal: &[f64], bandwidth: Option<f64>, fallback_raw: bool) -> Vec<f64> {
    (0..signal.len())
        .map(|idx| {
            let fitted = local_linear_at(&signal[..=idx], bandwidth);
            match fitted {
                Some(v) => v,
                None if fallback_raw => signal[idx],
                None => f64::NAN,
            }
        })
        .collect()
}

fn local_linear_at(history: &[f64], bandwidth: Option<f64>) -> Option<f64> {
    let n = history.len();
    // Offsets relative to the newest sample keep the intercept equal to the fit at idx.
    let offsets: Vec<f64> = (0..n).map(|t| t as f64 - (n - 1) as f64).collect();
    let design = DMatrix::from_fn(n, 2, |i, j| if j == 0 { 1.0 } else { offsets[i] });
    let weights: Vec<f64> = offsets
        .iter()
        .map(|x| bandwidth.map_or(1.0, |h| (-(x * x) / h).exp()))
        .collect();
    let y = DVector::from_column_slice(history);
    solve_weighted_least_squares(&design, &y, &weights).map(|beta| beta[0])
}
