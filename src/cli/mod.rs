//! Command-line parsing for the `sensor` binary.
//!
//! Argument parsing and command dispatch stay separate from the numerical code;
//! everything here ends up as a [`RunParams`](crate::io::RunParams) override or
//! a path.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{FilterKind, WeekdayStage};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "sensor", version, about = "Smoothed, backfill-corrected daily rate estimates from count data")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit rates for every location in a `date,geo_id,num,den` CSV.
    Fit(FitArgs),
    /// Run the pipeline on synthetic seeded histories.
    Demo(DemoArgs),
}

/// Overrides shared by `fit` and `demo`, applied on top of the parameter file.
#[derive(Debug, Args, Clone, Default)]
pub struct ParamArgs {
    /// JSON run parameters (defaults to $SENSOR_PARAMS, then built-in defaults).
    #[arg(long, value_name = "JSON")]
    pub params: Option<PathBuf>,

    /// First date to report (YYYY-MM-DD).
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Ignore input after this date (YYYY-MM-DD).
    #[arg(long)]
    pub end_date: Option<NaiveDate>,

    /// Smoothing filter.
    #[arg(long, value_enum)]
    pub smoother: Option<FilterKind>,

    /// Where to apply the weekday correction.
    #[arg(long, value_enum)]
    pub weekday: Option<WeekdayStage>,

    /// Smallest smoothed denominator for a day to be reported.
    #[arg(long)]
    pub min_denominator: Option<f64>,
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Input CSV with `date`, `geo_id`, `num`, `den` columns.
    #[arg(short = 'i', long, value_name = "CSV")]
    pub input: PathBuf,

    /// Write reportable rows (`geo_id,date,rate,se`) here.
    #[arg(short = 'o', long, value_name = "CSV")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub params: ParamArgs,
}

#[derive(Debug, Parser, Clone)]
pub struct DemoArgs {
    /// Number of synthetic locations.
    #[arg(long, default_value_t = 8)]
    pub locations: usize,

    /// Days of history per location.
    #[arg(long, default_value_t = 120)]
    pub days: usize,

    /// Random seed for the synthetic counts.
    #[arg(long, default_value_t = 7)]
    pub seed: u64,

    /// Write reportable rows (`geo_id,date,rate,se`) here.
    #[arg(short = 'o', long, value_name = "CSV")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub params: ParamArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fit_with_overrides() {
        let cli = Cli::parse_from([
            "sensor",
            "fit",
            "--input",
            "counts.csv",
            "--smoother",
            "moving_average",
            "--weekday",
            "before_backfill",
            "--start-date",
            "2020-05-01",
        ]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.input, PathBuf::from("counts.csv"));
        assert_eq!(args.params.smoother, Some(FilterKind::MovingAverage));
        assert_eq!(args.params.weekday, Some(WeekdayStage::BeforeBackfill));
        assert_eq!(args.params.start_date, NaiveDate::from_ymd_opt(2020, 5, 1));
    }

    #[test]
    fn demo_has_defaults() {
        let cli = Cli::parse_from(["sensor", "demo"]);
        let Command::Demo(args) = cli.command else {
            panic!("expected demo");
        };
        assert_eq!(args.locations, 8);
        assert_eq!(args.days, 120);
        assert!(args.params.params.is_none());
    }
}
