//! Post-fit checks on reported rows.

use thiserror::Error;

use crate::domain::{FitResult, LocationFit};

/// Largest plausible standard error on the 0–100 scale.
pub const MAX_STANDARD_ERROR: f64 = 5.0;

/// Rates above this are reported but logged.
pub const SUSPICIOUS_RATE: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SanityViolation {
    #[error("non-positive rate {0}")]
    NonPositiveRate(f64),
    #[error("missing or infinite value (rate {rate}, se {standard_error})")]
    NonFinite { rate: f64, standard_error: f64 },
    #[error("standard error {0} exceeds the plausible maximum")]
    LargeStandardError(f64),
}

pub fn check_row(row: &FitResult) -> Result<(), SanityViolation> {
    if !(row.rate.is_finite() && row.standard_error.is_finite()) {
        return Err(SanityViolation::NonFinite {
            rate: row.rate,
            standard_error: row.standard_error,
        });
    }
    if row.rate <= 0.0 {
        return Err(SanityViolation::NonPositiveRate(row.rate));
    }
    if row.standard_error > MAX_STANDARD_ERROR {
        return Err(SanityViolation::LargeStandardError(row.standard_error));
    }
    Ok(())
}

impl LocationFit {
    /// Drop included rows that fail [`check_row`]. Excluded rows are kept as is.
    pub fn validated(mut self) -> Self {
        let geo_id = self.geo_id.clone();
        self.rows.retain(|row| {
            if !row.include {
                return true;
            }
            match check_row(row) {
                Ok(()) => {
                    if row.rate > SUSPICIOUS_RATE {
                        log::warn!("{geo_id} {}: rate {:.2} is suspiciously high", row.date, row.rate);
                    }
                    true
                }
                Err(violation) => {
                    log::error!("{geo_id} {}: dropping row: {violation}", row.date);
                    false
                }
            }
        });
        self
    }
}
