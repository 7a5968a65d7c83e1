//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - installs the logger
//! - parses CLI arguments and resolves run parameters
//! - loads or generates count histories
//! - runs the sensor pipeline
//! - prints the summary and writes the optional export

use std::collections::BTreeMap;
use std::path::Path;

use clap::Parser;

use crate::cli::{Command, DemoArgs, FitArgs, ParamArgs};
use crate::data::{SyntheticSpec, generate_counts};
use crate::error::AppError;
use crate::io::{RunParams, load_run_params};

pub mod pipeline;

/// Entry point for the `sensor` binary.
pub fn run() -> Result<(), AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Demo(args) => handle_demo(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let params = resolve_params(&args.params)?;
    let ingest = crate::io::load_counts_csv(&args.input)?;
    for err in &ingest.row_errors {
        log::warn!(
            "line {}{}: {}",
            err.line,
            err.geo_id.as_deref().map(|g| format!(" ({g})")).unwrap_or_default(),
            err.message
        );
    }
    log::info!(
        "read {} rows ({} used) for {} locations, {} to {}",
        ingest.rows_read,
        ingest.rows_used,
        ingest.histories.len(),
        ingest.first_date,
        ingest.last_date
    );

    let source = args.input.display().to_string();
    report_and_export(&source, &ingest.histories, &params, args.output.as_deref())
}

fn handle_demo(args: DemoArgs) -> Result<(), AppError> {
    let params = resolve_params(&args.params)?;
    let spec = SyntheticSpec {
        locations: args.locations,
        days: args.days,
        seed: args.seed,
        ..Default::default()
    };
    let histories: BTreeMap<String, _> = generate_counts(&spec)?
        .into_iter()
        .map(|loc| (loc.geo_id, loc.counts))
        .collect();

    let source = format!("synthetic ({} locations x {} days, seed {})", spec.locations, spec.days, spec.seed);
    report_and_export(&source, &histories, &params, args.output.as_deref())
}

fn report_and_export(
    source: &str,
    histories: &BTreeMap<String, crate::domain::DailyCounts>,
    params: &RunParams,
    output: Option<&Path>,
) -> Result<(), AppError> {
    let run = pipeline::run_sensor(histories, params)?;

    println!("{}", crate::report::format_run_summary(source, &run));
    println!("{}", crate::report::format_latest_table(&run.fits));

    if let Some(path) = output {
        let written = crate::io::write_rates_csv(path, &run.fits)?;
        log::info!("wrote {written} rows to {}", path.display());
    }
    Ok(())
}

/// Parameter file (or defaults) with command-line overrides applied.
pub fn resolve_params(args: &ParamArgs) -> Result<RunParams, AppError> {
    let mut params = load_run_params(args.params.as_deref())?;
    if let Some(start) = args.start_date {
        params.start_date = Some(start);
    }
    if let Some(end) = args.end_date {
        params.end_date = Some(end);
    }
    if let Some(filter) = args.smoother {
        params.rate.smoother.filter = filter;
    }
    if let Some(stage) = args.weekday {
        params.rate.weekday = stage;
    }
    if let Some(min_den) = args.min_denominator {
        params.rate.min_denominator = min_den;
    }
    params.validate()?;
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FilterKind, WeekdayStage};

    #[test]
    fn overrides_replace_file_values() {
        let path = std::env::temp_dir().join(format!("sensor-app-params-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"rate": {"min_denominator": 10, "weekday": "after_backfill"}}"#).unwrap();
        let args = ParamArgs {
            params: Some(path.clone()),
            smoother: Some(FilterKind::Identity),
            min_denominator: Some(20.0),
            ..Default::default()
        };
        let params = resolve_params(&args).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(params.rate.smoother.filter, FilterKind::Identity);
        assert_eq!(params.rate.min_denominator, 20.0);
        assert_eq!(params.rate.weekday, WeekdayStage::AfterBackfill);
    }
}
