//! Export reported rates to CSV.
//!
//! One row per included day: `geo_id,date,rate,se`. Locations appear in the
//! order given; rows within a location are in date order.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::LocationFit;
use crate::error::AppError;

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    geo_id: &'a str,
    date: NaiveDate,
    rate: f64,
    se: f64,
}

/// Write included rows to `path`, returning the number of rows written.
pub fn write_rates_csv(path: &Path, fits: &[LocationFit]) -> Result<usize, AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_rates(file, fits)
}

pub fn write_rates<W: Write>(out: W, fits: &[LocationFit]) -> Result<usize, AppError> {
    let mut writer = csv::Writer::from_writer(out);
    let mut written = 0usize;
    for fit in fits {
        for row in fit.included() {
            writer
                .serialize(ExportRow {
                    geo_id: &fit.geo_id,
                    date: row.date,
                    rate: row.rate,
                    se: row.standard_error,
                })
                .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
            written += 1;
        }
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    Ok(written)
}
