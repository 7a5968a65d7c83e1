//! Weighted least squares solver.
//!
//! The smoothers repeatedly solve small polynomial regression problems of the form:
//!
//! ```text
//! minimize Σ w_i (y_i - x_i^T β)^2
//! ```
//!
//! Implementation choices:
//! - We scale rows by `sqrt(w_i)` and solve an ordinary least squares problem.
//! - We use SVD so tall design matrices are handled directly.
//! - Rank deficiency is reported as `None` rather than papered over with a
//!   looser tolerance: callers fall back to the raw observation in that case.

use nalgebra::{DMatrix, DVector};

/// Relative singular-value cutoff used for the rank test.
const RANK_RTOL: f64 = 1e-12;

/// Weighted pseudo-inverse `P` such that `β = P y` solves the weighted problem.
///
/// `P` has shape `(ncols(x), nrows(x))`. Returns `None` when the weighted
/// design matrix does not have full column rank.
pub fn weighted_pseudo_inverse(x: &DMatrix<f64>, w: &[f64]) -> Option<DMatrix<f64>> {
    debug_assert_eq!(x.nrows(), w.len());
    if x.nrows() < x.ncols() {
        return None;
    }

    let sw: Vec<f64> = w.iter().map(|v| v.max(0.0).sqrt()).collect();
    let mut xw = x.clone();
    for (i, s) in sw.iter().enumerate() {
        xw.row_mut(i).scale_mut(*s);
    }

    let svd = xw.svd(true, true);
    let max_sv = svd.singular_values.max();
    if !(max_sv.is_finite() && max_sv > 0.0) {
        return None;
    }
    let tol = max_sv * RANK_RTOL * x.nrows().max(x.ncols()) as f64;
    if svd.rank(tol) < x.ncols() {
        return None;
    }

    let mut pinv = svd.pseudo_inverse(tol).ok()?;
    // Undo the row scaling so the operator applies to unweighted observations.
    for (j, s) in sw.iter().enumerate() {
        pinv.column_mut(j).scale_mut(*s);
    }
    if pinv.iter().all(|v| v.is_finite()) {
        Some(pinv)
    } else {
        None
    }
}

/// Solve a weighted least squares problem.
///
/// Returns `None` if the weighted design matrix is rank deficient.
pub fn solve_weighted_least_squares(x: &DMatrix<f64>, y: &DVector<f64>, w: &[f64]) -> Option<DVector<f64>> {
    let pinv = weighted_pseudo_inverse(x, w)?;
    let beta = pinv * y;
    if beta.iter().all(|v| v.is_finite()) {
        Some(beta)
    } else {
        None
    }
}
