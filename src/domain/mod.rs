//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - filter/imputation/boundary kind enums (`FilterKind`, `ImputeKind`, `BoundaryKind`)
//! - contiguous per-location count histories (`DailyCounts`, `CountPair`)
//! - fit outputs (`FitResult`, `LocationFit`)

pub mod types;

pub use types::*;
