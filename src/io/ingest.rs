//! CSV ingest of daily counts.
//!
//! Expected columns (case-insensitive, any order): `date`, `geo_id`, `num`,
//! `den`. `numerator` / `denominator` are accepted as aliases.
//!
//! Bad rows are skipped and reported; only a missing column or an empty result
//! is fatal. Every location is reindexed onto the full date range of the file
//! with zero counts on days it did not report.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;

use crate::domain::{CountPair, DailyCounts};
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub geo_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct IngestedCounts {
    /// Zero-filled histories keyed (and therefore ordered) by `geo_id`.
    pub histories: BTreeMap<String, DailyCounts>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    date: usize,
    geo_id: usize,
    num: usize,
    den: usize,
}

pub fn load_counts_csv(path: &Path) -> Result<IngestedCounts, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    parse_counts_csv(file)
}

pub fn parse_counts_csv<R: Read>(input: R) -> Result<IngestedCounts, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let columns = resolve_columns(&headers)?;

    let mut rows: HashMap<String, Vec<(NaiveDate, CountPair)>> = HashMap::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;
    let mut rows_used = 0usize;
    let mut range: Option<(NaiveDate, NaiveDate)> = None;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    geo_id: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, columns) {
            Ok((geo_id, date, counts)) => {
                range = Some(match range {
                    Some((lo, hi)) => (lo.min(date), hi.max(date)),
                    None => (date, date),
                });
                rows.entry(geo_id).or_default().push((date, counts));
                rows_used += 1;
            }
            Err(message) => row_errors.push(RowError {
                line,
                geo_id: record.get(columns.geo_id).map(str::to_string).filter(|s| !s.is_empty()),
                message,
            }),
        }
    }

    let Some((first_date, last_date)) = range else {
        return Err(AppError::new(3, "No valid rows in input CSV."));
    };

    let mut histories = BTreeMap::new();
    for (geo_id, rows) in rows {
        let counts = DailyCounts::zero_filled(&rows, first_date, last_date)?;
        histories.insert(geo_id, counts);
    }

    Ok(IngestedCounts {
        histories,
        row_errors,
        rows_read,
        rows_used,
        first_date,
        last_date,
    })
}

fn resolve_columns(headers: &StringRecord) -> Result<Columns, AppError> {
    let map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase(), idx))
        .collect();
    let find = |names: &[&str]| names.iter().find_map(|n| map.get(*n).copied());

    let missing = |name: &str| AppError::new(2, format!("Input CSV is missing required column '{name}'."));
    Ok(Columns {
        date: find(&["date", "time_value"]).ok_or_else(|| missing("date"))?,
        geo_id: find(&["geo_id", "geo"]).ok_or_else(|| missing("geo_id"))?,
        num: find(&["num", "numerator"]).ok_or_else(|| missing("num"))?,
        den: find(&["den", "denominator"]).ok_or_else(|| missing("den"))?,
    })
}

fn parse_row(record: &StringRecord, columns: Columns) -> Result<(String, NaiveDate, CountPair), String> {
    let field = |idx: usize, name: &str| {
        record
            .get(idx)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("missing {name}"))
    };

    let geo_id = field(columns.geo_id, "geo_id")?.to_string();
    let date_raw = field(columns.date, "date")?;
    let date = NaiveDate::parse_from_str(date_raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_raw, "%Y%m%d"))
        .map_err(|_| format!("invalid date '{date_raw}'"))?;
    let num = parse_count(field(columns.num, "num")?, "num")?;
    let den = parse_count(field(columns.den, "den")?, "den")?;

    Ok((geo_id, date, CountPair::new(num, den)))
}

fn parse_count(raw: &str, name: &str) -> Result<f64, String> {
    let v: f64 = raw.parse().map_err(|_| format!("invalid {name} '{raw}'"))?;
    if !(v.is_finite() && v >= 0.0) {
        return Err(format!("{name} must be a non-negative number (got {raw})"));
    }
    Ok(v)
}
