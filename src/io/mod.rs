//! Input/output helpers.
//!
//! - CSV ingest + zero-filling of count histories (`ingest`)
//! - JSON run parameters (`params`)
//! - CSV export of reported rates (`export`)

pub mod export;
pub mod ingest;
pub mod params;

pub use export::*;
pub use ingest::*;
pub use params::*;
