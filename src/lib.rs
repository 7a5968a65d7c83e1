//! `count-sensor` library crate.
//!
//! Turns daily (numerator, denominator) count histories into smoothed,
//! backfill-corrected rate estimates with standard errors.
//!
//! The binary (`sensor`) is a thin wrapper around this library so that:
//!
//! - the numerical core is testable without spawning processes
//! - pipelines can embed the fitter directly and skip the CLI

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod report;
pub mod smooth;
