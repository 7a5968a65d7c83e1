//! Shared "sensor run" logic used by the `fit` and `demo` commands.
//!
//! histories -> (optional pooled weekday fit) -> per-location rate fit
//! (parallel) -> sanity filtering
//!
//! Presentation (printing, exporting) stays in the callers.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::domain::{DailyCounts, LocationFit};
use crate::error::AppError;
use crate::fit::weekday::{aggregate_daily_totals, fit_with_scales};
use crate::fit::{RateFitter, WeekdayFit};
use crate::io::RunParams;

/// A location that produced no output, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedLocation {
    pub geo_id: String,
    pub reason: String,
}

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Validated fits, sorted by `geo_id`.
    pub fits: Vec<LocationFit>,
    pub skipped: Vec<SkippedLocation>,
    /// Pooled weekday fit, when the weekday correction is enabled.
    pub weekday: Option<WeekdayFit>,
}

impl RunOutput {
    pub fn n_included(&self) -> usize {
        self.fits.iter().map(LocationFit::n_included).sum()
    }
}

/// Fit every location in `histories`.
///
/// A failing location is logged and skipped; a failed pooled weekday fit
/// skips every location, since none of them can be corrected.
pub fn run_sensor(histories: &BTreeMap<String, DailyCounts>, params: &RunParams) -> Result<RunOutput, AppError> {
    params.validate()?;
    let fitter = RateFitter::new(params.rate.clone())?;

    let histories: Vec<(&String, DailyCounts)> = histories
        .iter()
        .filter_map(|(geo_id, counts)| truncate_after(counts, params.end_date).map(|c| (geo_id, c)))
        .collect();

    let weekday = if params.rate.weekday.is_enabled() {
        let fit = match aggregate_daily_totals(histories.iter().map(|(_, c)| c)) {
            Some(totals) => fit_with_scales(&totals, &params.weekday),
            None => WeekdayFit::Unfitted,
        };
        if fit == WeekdayFit::Unfitted {
            let skipped = histories
                .iter()
                .map(|(geo_id, _)| SkippedLocation {
                    geo_id: (*geo_id).clone(),
                    reason: "unable to calculate weekday correction".to_string(),
                })
                .collect();
            return Ok(RunOutput {
                fits: Vec::new(),
                skipped,
                weekday: Some(fit),
            });
        }
        if let WeekdayFit::Fitted { effect, scale } = &fit {
            log::info!("weekday effects {:?} (scale {scale:e})", effect.fixed_effects());
        }
        Some(fit)
    } else {
        None
    };
    let effect = weekday.as_ref().and_then(WeekdayFit::effect);

    let results: Vec<Result<LocationFit, SkippedLocation>> = histories
        .par_iter()
        .map(|(geo_id, counts)| {
            fitter
                .fit(geo_id, counts, params.start_date, effect)
                .map(LocationFit::validated)
                .map_err(|e| {
                    log::error!("{geo_id}: fit failed: {e}");
                    SkippedLocation {
                        geo_id: (*geo_id).clone(),
                        reason: e.to_string(),
                    }
                })
        })
        .collect();

    let mut fits = Vec::new();
    let mut skipped = Vec::new();
    for result in results {
        match result {
            Ok(fit) => fits.push(fit),
            Err(skip) => skipped.push(skip),
        }
    }
    fits.sort_by(|a, b| a.geo_id.cmp(&b.geo_id));

    log::info!(
        "fitted {} locations ({} skipped), {} reportable rows",
        fits.len(),
        skipped.len(),
        fits.iter().map(LocationFit::n_included).sum::<usize>()
    );
    Ok(RunOutput { fits, skipped, weekday })
}

/// Drop days after `end`; `None` when nothing is left.
fn truncate_after(counts: &DailyCounts, end: Option<chrono::NaiveDate>) -> Option<DailyCounts> {
    let Some(end) = end else {
        return Some(counts.clone());
    };
    if end < counts.start {
        return None;
    }
    let keep = ((end - counts.start).num_days() as usize + 1).min(counts.len());
    Some(DailyCounts {
        start: counts.start,
        numerator: counts.numerator[..keep].to_vec(),
        denominator: counts.denominator[..keep].to_vec(),
    })
}
