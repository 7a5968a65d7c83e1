//! Penalized Poisson regression solved with ADMM.
//!
//! Coefficients are `β = [γ; α]`: `γ` multiplies a few dense columns `F`
//! (`N x k`) and `α` is a per-row baseline, i.e. the design is `[F | I_N]`.
//! Objective (log link, exposure offset `o`, objective scale `s`):
//!
//! ```text
//! minimize (1/s) [ (1/N) Σ_t (exp(η_t) - y_t η_t) + κ ‖D α‖₁ ],   η = F γ + α + o
//! ```
//!
//! where `D` is the third-order difference operator.
//!
//! Splitting `z = D α` gives the scaled-form ADMM iteration:
//!
//! - β-update: damped Newton on the smooth part plus `(ρ/2)‖Dα - z + u‖²`
//! - z-update: soft thresholding at `κ / (s ρ)`
//! - u-update: `u += Dα - z`
//!
//! `ρ` starts at the configured value and is rebalanced whenever the primal
//! and dual residuals drift more than a factor of ten apart.
//!
//! The Newton system is never formed densely. Its baseline block
//! `diag(μ / (sN)) + ρ DᵀD` is banded, so a step is one banded Cholesky plus a
//! `k x k` Schur complement for the dense columns: linear in `N`.
//!
//! The minimizer does not depend on `s` (the ridge and the absolute
//! tolerances are expressed in unscaled units). The scale changes how the
//! initial `ρ` compares against the objective and how large the intermediate
//! quantities get, which is what the caller's rescale-and-retry policy relies on.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::band::BandMatrix;

/// Order of the finite difference penalized by the solver.
pub const DIFF_ORDER: usize = 3;

const DIFF_COEFFS: [f64; DIFF_ORDER + 1] = [-1.0, 3.0, -3.0, 1.0];

/// Stopping threshold on the Newton decrement (relative to the objective).
const NEWTON_RTOL: f64 = 1e-13;

/// Residual ratio that triggers a ρ update.
const RHO_BALANCE: f64 = 10.0;
const RHO_STEP: f64 = 2.0;

/// Tuning knobs for [`solve_penalized_poisson`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmmSettings {
    /// Initial augmented Lagrangian penalty.
    pub rho: f64,
    pub max_iter: usize,
    pub abs_tol: f64,
    pub rel_tol: f64,
    /// Newton iterations per β-update (warm-started, so usually 1–3 are used).
    pub newton_steps: usize,
    /// Tiny ridge keeping the Newton system positive definite.
    pub ridge: f64,
}

impl Default for AdmmSettings {
    fn default() -> Self {
        Self {
            rho: 1.0,
            max_iter: 5000,
            abs_tol: 1e-7,
            rel_tol: 1e-6,
            newton_steps: 25,
            ridge: 1e-9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("objective became non-finite")]
    NonFinite,
    #[error("Newton system is not positive definite")]
    Factorization,
    #[error("problem dimensions disagree: {0}")]
    Shape(String),
    #[error("no convergence after {iterations} iterations (primal residual {primal:.3e}, dual residual {dual:.3e})")]
    NotConverged { iterations: usize, primal: f64, dual: f64 },
}

/// A penalized Poisson problem over `[F | I_N]`. Rows whose offset or count
/// is non-finite (e.g. `ln 0` exposure) are left out of the likelihood.
#[derive(Debug, Clone)]
pub struct PenalizedPoisson<'a> {
    /// Dense columns `F` (`N x k`); the baseline block is implicit.
    pub fixed: &'a DMatrix<f64>,
    pub counts: &'a [f64],
    pub offset: &'a [f64],
    /// Penalty weight `κ` (any normalization already applied).
    pub penalty: f64,
    /// Starting point `[γ; α]` of length `k + N`.
    pub start: &'a DVector<f64>,
}

/// `D v` for the third-order difference (`len - 3` entries).
pub fn third_difference(v: &[f64]) -> Vec<f64> {
    v.windows(DIFF_ORDER + 1)
        .map(|w| w.iter().zip(DIFF_COEFFS).map(|(x, c)| x * c).sum::<f64>())
        .collect()
}

/// `Dᵀ z` back onto `n` points.
fn third_difference_t(z: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![0.0; n];
    for (r, zr) in z.iter().enumerate() {
        for (k, c) in DIFF_COEFFS.iter().enumerate() {
            out[r + k] += c * zr;
        }
    }
    out
}

fn soft_threshold(x: f64, t: f64) -> f64 {
    x.signum() * (x.abs() - t).max(0.0)
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Gradient and Newton direction at one point.
struct NewtonDirection {
    grad: DVector<f64>,
    step: DVector<f64>,
}

/// Precomputed pieces shared by every β-update.
struct Workspace<'a> {
    fixed: &'a DMatrix<f64>,
    y: &'a [f64],
    offset: &'a [f64],
    active: Vec<bool>,
    /// `DᵀD` over the baseline.
    gram: BandMatrix,
    /// `1 / (s N)`.
    w_obj: f64,
    /// Ridge on the scaled objective (`ridge / s`).
    ridge: f64,
    /// `1 / s`, converting unscaled tolerances.
    unit: f64,
}

impl Workspace<'_> {
    fn n(&self) -> usize {
        self.fixed.nrows()
    }

    fn k(&self) -> usize {
        self.fixed.ncols()
    }

    fn linear_predictor(&self, b: &DVector<f64>) -> Vec<f64> {
        let k = self.k();
        (0..self.n())
            .map(|t| {
                if !self.active[t] {
                    return 0.0;
                }
                let dense: f64 = (0..k).map(|j| self.fixed[(t, j)] * b[j]).sum();
                dense + b[k + t] + self.offset[t]
            })
            .collect()
    }

    fn penalty_residual(&self, b: &DVector<f64>, target: &[f64]) -> Vec<f64> {
        let mut r = third_difference(&b.as_slice()[self.k()..]);
        for (ri, ti) in r.iter_mut().zip(target) {
            *ri -= ti;
        }
        r
    }

    fn objective(&self, b: &DVector<f64>, target: &[f64], rho: f64) -> f64 {
        let eta = self.linear_predictor(b);
        let loss: f64 = eta
            .iter()
            .enumerate()
            .filter(|(t, _)| self.active[*t])
            .map(|(t, e)| e.exp() - self.y[t] * e)
            .sum();
        let mut total = self.w_obj * loss + 0.5 * self.ridge * b.norm_squared();
        if rho > 0.0 {
            let r = self.penalty_residual(b, target);
            total += 0.5 * rho * r.iter().map(|v| v * v).sum::<f64>();
        }
        if total.is_nan() { f64::INFINITY } else { total }
    }

    /// Solve `H step = grad` with
    ///
    /// ```text
    /// H = [ Fᵀ A F + λI    Fᵀ A              ]
    ///     [ A F            A + λI + ρ DᵀD    ]      A = diag(μ / (sN))
    /// ```
    ///
    /// by factoring the banded lower-right block and eliminating `γ`.
    fn direction(&self, b: &DVector<f64>, target: &[f64], rho: f64) -> Result<NewtonDirection, SolveError> {
        let (n, k) = (self.n(), self.k());
        let eta = self.linear_predictor(b);
        let mut resid = vec![0.0; n];
        let mut curv = vec![0.0; n];
        for t in 0..n {
            if self.active[t] {
                let mu = eta[t].exp();
                resid[t] = self.w_obj * (mu - self.y[t]);
                curv[t] = self.w_obj * mu;
            }
        }

        let pull = if rho > 0.0 {
            third_difference_t(&self.penalty_residual(b, target), n)
        } else {
            vec![0.0; n]
        };
        let mut grad = DVector::zeros(k + n);
        for j in 0..k {
            grad[j] = (0..n).map(|t| self.fixed[(t, j)] * resid[t]).sum::<f64>() + self.ridge * b[j];
        }
        for t in 0..n {
            grad[k + t] = resid[t] + self.ridge * b[k + t] + rho * pull[t];
        }

        let mut baseline = self.gram.scaled(rho);
        baseline.add_diagonal(curv.iter().map(|c| c + self.ridge));
        let chol = baseline.cholesky().ok_or(SolveError::Factorization)?;

        let grad_b = &grad.as_slice()[k..];
        let solved_grad = chol.solve(grad_b);
        let mut coupled = Vec::with_capacity(k);
        let mut schur = DMatrix::zeros(k, k);
        let mut rhs = DVector::zeros(k);
        for j in 0..k {
            let column: Vec<f64> = (0..n).map(|t| curv[t] * self.fixed[(t, j)]).collect();
            let solved = chol.solve(&column);
            for i in 0..k {
                schur[(i, j)] = (0..n)
                    .map(|t| curv[t] * self.fixed[(t, i)] * (self.fixed[(t, j)] - solved[t]))
                    .sum::<f64>();
            }
            schur[(j, j)] += self.ridge;
            rhs[j] = grad[j] - (0..n).map(|t| column[t] * solved_grad[t]).sum::<f64>();
            coupled.push(solved);
        }

        let step_fixed = if k == 0 {
            DVector::zeros(0)
        } else {
            schur.cholesky().ok_or(SolveError::Factorization)?.solve(&rhs)
        };
        let mut step = DVector::zeros(k + n);
        step.rows_mut(0, k).copy_from(&step_fixed);
        for t in 0..n {
            let back: f64 = coupled.iter().zip(step_fixed.iter()).map(|(c, s)| c[t] * s).sum();
            step[k + t] = solved_grad[t] - back;
        }
        Ok(NewtonDirection { grad, step })
    }

    /// Damped Newton minimization of the β-subproblem, warm-started at `b0`.
    fn newton(&self, b0: &DVector<f64>, target: &[f64], rho: f64, steps: usize) -> Result<DVector<f64>, SolveError> {
        let mut b = b0.clone();
        let mut h = self.objective(&b, target, rho);
        if !h.is_finite() {
            return Err(SolveError::NonFinite);
        }

        for _ in 0..steps {
            let NewtonDirection { grad, step } = self.direction(&b, target, rho)?;
            let decrement = grad.dot(&step);
            if !decrement.is_finite() {
                return Err(SolveError::NonFinite);
            }
            if 0.5 * decrement <= NEWTON_RTOL * (self.unit + h.abs()) {
                break;
            }

            // Backtracking (Armijo) line search.
            let mut t = 1.0;
            let mut moved = false;
            while t > 1e-12 {
                let candidate = &b - t * &step;
                let hc = self.objective(&candidate, target, rho);
                if hc <= h - 0.25 * t * decrement {
                    b = candidate;
                    h = hc;
                    moved = true;
                    break;
                }
                t *= 0.5;
            }
            if !moved {
                break;
            }
        }
        Ok(b)
    }
}

/// Solve the penalized Poisson problem at objective scale `scale`.
pub fn solve_penalized_poisson(
    problem: &PenalizedPoisson<'_>,
    scale: f64,
    settings: &AdmmSettings,
) -> Result<DVector<f64>, SolveError> {
    let fixed = problem.fixed;
    let (n, k) = fixed.shape();
    if !(scale.is_finite() && scale > 0.0) || n == 0 {
        return Err(SolveError::NonFinite);
    }
    if problem.counts.len() != n || problem.offset.len() != n || problem.start.len() != k + n {
        return Err(SolveError::Shape(format!(
            "{n} rows, {} counts, {} offsets, start of length {} for {} coefficients",
            problem.counts.len(),
            problem.offset.len(),
            problem.start.len(),
            k + n
        )));
    }

    let ws = Workspace {
        fixed,
        y: problem.counts,
        offset: problem.offset,
        active: (0..n)
            .map(|t| problem.offset[t].is_finite() && problem.counts[t].is_finite())
            .collect(),
        gram: BandMatrix::difference_gram(n, &DIFF_COEFFS),
        w_obj: 1.0 / (scale * n as f64),
        ridge: settings.ridge / scale,
        unit: 1.0 / scale,
    };

    let m = n.saturating_sub(DIFF_ORDER);
    if m == 0 {
        // Nothing to split: a single Newton solve on the smooth objective.
        let b = ws.newton(problem.start, &[], 0.0, settings.newton_steps.max(1) * 4)?;
        return if b.iter().all(|v| v.is_finite()) {
            Ok(b)
        } else {
            Err(SolveError::NonFinite)
        };
    }

    let mut rho = settings.rho;
    let mut b = problem.start.clone();
    let mut z = third_difference(&b.as_slice()[k..]);
    let mut u = vec![0.0; m];
    let (mut primal, mut dual) = (f64::INFINITY, f64::INFINITY);

    for _ in 0..settings.max_iter {
        let target: Vec<f64> = z.iter().zip(&u).map(|(z, u)| z - u).collect();
        b = ws.newton(&b, &target, rho, settings.newton_steps)?;

        let db = third_difference(&b.as_slice()[k..]);
        let threshold = problem.penalty / scale / rho;
        let z_new: Vec<f64> = db.iter().zip(&u).map(|(d, u)| soft_threshold(d + u, threshold)).collect();
        let r: Vec<f64> = db.iter().zip(&z_new).map(|(d, z)| d - z).collect();
        let shift: Vec<f64> = z_new.iter().zip(&z).map(|(new, old)| new - old).collect();
        for (ui, ri) in u.iter_mut().zip(&r) {
            *ui += ri;
        }
        z = z_new;

        primal = norm(&r);
        dual = rho * norm(&third_difference_t(&shift, n));
        if !(primal.is_finite() && dual.is_finite()) {
            return Err(SolveError::NonFinite);
        }

        let eps_pri = (m as f64).sqrt() * settings.abs_tol + settings.rel_tol * norm(&db).max(norm(&z));
        let eps_dual = ((k + n) as f64).sqrt() * settings.abs_tol * ws.unit
            + settings.rel_tol * rho * norm(&third_difference_t(&u, n));
        if primal <= eps_pri && dual <= eps_dual {
            return Ok(b);
        }

        // Residual balancing; `u` is scaled by 1/ρ so it moves inversely.
        if primal > RHO_BALANCE * dual {
            rho *= RHO_STEP;
            u.iter_mut().for_each(|v| *v /= RHO_STEP);
        } else if dual > RHO_BALANCE * primal {
            rho /= RHO_STEP;
            u.iter_mut().for_each(|v| *v *= RHO_STEP);
        }
    }

    Err(SolveError::NotConverged {
        iterations: settings.max_iter,
        primal,
        dual,
    })
}
