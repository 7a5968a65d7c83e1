//! Symmetric banded matrices and their Cholesky factorization.
//!
//! Only the lower band is stored, row by row: entry `(i, j)` with
//! `i - width <= j <= i` lives at `data[i * (width + 1) + (i - j)]`.
//! Factorization and solves cost `O(n · width²)` and `O(n · width)`.

/// Symmetric matrix with half-bandwidth `width`.
#[derive(Debug, Clone, PartialEq)]
pub struct BandMatrix {
    n: usize,
    width: usize,
    data: Vec<f64>,
}

impl BandMatrix {
    pub fn zeros(n: usize, width: usize) -> Self {
        Self {
            n,
            width,
            data: vec![0.0; n * (width + 1)],
        }
    }

    /// `DᵀD` for the finite difference whose rows are `coeffs` shifted one
    /// column at a time across `n` columns.
    pub fn difference_gram(n: usize, coeffs: &[f64]) -> Self {
        let width = coeffs.len().saturating_sub(1);
        let mut gram = Self::zeros(n, width);
        for r in 0..n.saturating_sub(width) {
            for (i, ci) in coeffs.iter().enumerate() {
                for (j, cj) in coeffs.iter().enumerate().take(i + 1) {
                    gram.data[(r + i) * (width + 1) + (i - j)] += ci * cj;
                }
            }
        }
        gram
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            n: self.n,
            width: self.width,
            data: self.data.iter().map(|v| v * factor).collect(),
        }
    }

    pub fn add_diagonal(&mut self, diag: impl IntoIterator<Item = f64>) {
        for (i, d) in diag.into_iter().enumerate().take(self.n) {
            self.data[i * (self.width + 1)] += d;
        }
    }

    /// Lower Cholesky factor, computed in place. `None` when the matrix is not
    /// numerically positive definite.
    pub fn cholesky(mut self) -> Option<BandCholesky> {
        let w = self.width;
        let stride = w + 1;
        for i in 0..self.n {
            let lo = i.saturating_sub(w);
            for j in lo..=i {
                let mut s = self.data[i * stride + (i - j)];
                for m in lo..j {
                    s -= self.data[i * stride + (i - m)] * self.data[j * stride + (j - m)];
                }
                if i == j {
                    if !(s > 0.0 && s.is_finite()) {
                        return None;
                    }
                    self.data[i * stride] = s.sqrt();
                } else {
                    self.data[i * stride + (i - j)] = s / self.data[j * stride];
                }
            }
        }
        Some(BandCholesky { factor: self })
    }
}

/// `L` with `A = L Lᵀ`, in the same banded layout.
#[derive(Debug, Clone)]
pub struct BandCholesky {
    factor: BandMatrix,
}

impl BandCholesky {
    fn l(&self, i: usize, j: usize) -> f64 {
        self.factor.data[i * (self.factor.width + 1) + (i - j)]
    }

    /// Solve `A x = b`.
    pub fn solve(&self, b: &[f64]) -> Vec<f64> {
        let n = self.factor.n;
        let w = self.factor.width;
        let mut x = b.to_vec();
        for i in 0..n {
            let mut s = x[i];
            for j in i.saturating_sub(w)..i {
                s -= self.l(i, j) * x[j];
            }
            x[i] = s / self.l(i, i);
        }
        for i in (0..n).rev() {
            let mut s = x[i];
            for j in (i + 1)..(i + w + 1).min(n) {
                s -= self.l(j, i) * x[j];
            }
            x[i] = s / self.l(i, i);
        }
        x
    }
}
