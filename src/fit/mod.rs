//! Count-to-rate fitting.
//!
//! - `backfill`: adaptive trailing aggregation against reporting lag
//! - `weekday`: pooled day-of-week effect estimation and correction
//! - `rate`: per-location rate and standard error
//! - `sanity`: post-fit checks on reported rows

pub mod backfill;
pub mod rate;
pub mod sanity;
pub mod weekday;

pub use backfill::*;
pub use rate::*;
pub use sanity::*;
pub use weekday::{WeekdayConfig, WeekdayEffect, WeekdayFit};
