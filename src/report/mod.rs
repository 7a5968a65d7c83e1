//! Terminal summaries of a sensor run.

use crate::app::pipeline::RunOutput;
use crate::domain::LocationFit;
use crate::fit::WeekdayFit;

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Run header: what was fitted, weekday effects, skipped locations.
pub fn format_run_summary(source: &str, output: &RunOutput) -> String {
    let mut out = String::new();

    out.push_str("=== sensor - daily rate estimates ===\n");
    out.push_str(&format!("Source: {source}\n"));
    out.push_str(&format!(
        "Locations: {} fitted, {} skipped | reportable rows: {}\n",
        output.fits.len(),
        output.skipped.len(),
        output.n_included()
    ));

    match &output.weekday {
        Some(WeekdayFit::Fitted { effect, scale }) => {
            let mut effects: Vec<f64> = effect.fixed_effects().to_vec();
            effects.push(effect.sunday());
            let parts: Vec<String> = WEEKDAYS
                .iter()
                .zip(&effects)
                .map(|(day, b)| format!("{day}={b:+.3}"))
                .collect();
            out.push_str(&format!("Weekday effects (scale {scale:e}): {}\n", parts.join(" ")));
        }
        Some(WeekdayFit::Unfitted) => out.push_str("Weekday effects: unable to calculate weekday correction\n"),
        None => {}
    }

    for skip in &output.skipped {
        out.push_str(&format!("  (skipped {}) {}\n", skip.geo_id, skip.reason));
    }
    out
}

/// One line per location with its most recent reportable day.
pub fn format_latest_table(fits: &[LocationFit]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<12} {:>10} {:>10} {:>10} {:>8}\n",
        "geo_id", "date", "rate", "se", "rows"
    ));
    out.push_str(&format!("{:-<12} {:-<10} {:-<10} {:-<10} {:-<8}\n", "", "", "", "", ""));

    for fit in fits {
        match fit.included().last() {
            Some(row) => out.push_str(&format!(
                "{:<12} {:>10} {:>10.4} {:>10.4} {:>8}\n",
                truncate(&fit.geo_id, 12),
                row.date.to_string(),
                row.rate,
                row.standard_error,
                fit.n_included()
            )),
            None => out.push_str(&format!(
                "{:<12} {:>10} {:>10} {:>10} {:>8}\n",
                truncate(&fit.geo_id, 12),
                "-",
                "-",
                "-",
                0
            )),
        }
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('~');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::SkippedLocation;
    use crate::domain::FitResult;
    use crate::fit::WeekdayEffect;
    use chrono::NaiveDate;

    fn output() -> RunOutput {
        RunOutput {
            fits: vec![
                LocationFit {
                    geo_id: "01000".to_string(),
                    rows: vec![FitResult {
                        date: NaiveDate::from_ymd_opt(2020, 4, 1).unwrap(),
                        rate: 4.5,
                        standard_error: 0.25,
                        include: true,
                    }],
                },
                LocationFit {
                    geo_id: "a-very-long-location-name".to_string(),
                    rows: Vec::new(),
                },
            ],
            skipped: vec![SkippedLocation {
                geo_id: "02000".to_string(),
                reason: "boom".to_string(),
            }],
            weekday: Some(WeekdayFit::Fitted {
                effect: WeekdayEffect::new([0.1, 0.0, 0.0, 0.0, 0.0, 0.0]),
                scale: 1.0,
            }),
        }
    }

    #[test]
    fn summary_mentions_counts_and_effects() {
        let text = format_run_summary("demo", &output());
        assert!(text.contains("2 fitted, 1 skipped | reportable rows: 1"));
        assert!(text.contains("Mon=+0.100"));
        assert!(text.contains("Sun=-0.100"));
        assert!(text.contains("(skipped 02000) boom"));
    }

    #[test]
    fn latest_table_handles_empty_locations() {
        let text = format_latest_table(&output().fits);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].starts_with("01000"));
        assert!(lines[2].contains("2020-04-01"));
        assert!(lines[3].starts_with("a-very-long~"));
    }
}
