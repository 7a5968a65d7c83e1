//! Mathematical utilities: weighted least squares, banded Cholesky and the
//! penalized Poisson solver.

pub mod admm;
pub mod band;
pub mod ols;

pub use admm::*;
pub use band::*;
pub use ols::*;
