//! Peak detection over one country's monthly rollup, and the lead/lag
//! relationship between the cases peak and the deaths peak.
//!
//! Distances are positional: the difference between the two peaks' index
//! positions in the period-sorted rollup, not calendar arithmetic. When a
//! country's series has a gap month the positional distance undershoots
//! the calendar distance; that behavior is kept as-is.

use polars::prelude::*;

use crate::api::models::{PeakPoint, PeakRelationship, PeakReport};
use crate::core_logic::data_processing::{NEW_CASES, NEW_DEATHS, PERIOD};
use crate::ingest::columns::PAIS;
use crate::ingest::loader::date_from_days;

/// Inspect one country's monthly rollup (already sorted by period). An
/// empty rollup reports nothing; multi-country frames are not meaningful
/// here and the caller restricts the input to a single country first.
pub fn monthly_peaks(monthly: &DataFrame) -> PolarsResult<Option<PeakReport>> {
    if monthly.height() == 0 {
        return Ok(None);
    }

    let country = monthly
        .column(PAIS)?
        .str()?
        .get(0)
        .unwrap_or_default()
        .to_string();
    let new_cases = monthly.column(NEW_CASES)?.f64()?;
    let new_deaths = monthly.column(NEW_DEATHS)?.f64()?;
    let periods = monthly.column(PERIOD)?.cast(&DataType::Int32)?;
    let periods = periods.i32()?;

    let point = |idx: usize, values: &Float64Chunked| {
        let period = date_from_days(periods.get(idx).unwrap_or(0));
        PeakPoint {
            index: idx,
            period,
            label: period.format("%b %Y").to_string(),
            value: values.get(idx).unwrap_or(0.0),
        }
    };

    let cases_peak = point(argmax_first(new_cases), new_cases);
    let deaths_peak = point(argmax_first(new_deaths), new_deaths);

    let (relationship, message) = match deaths_peak.index as i64 - cases_peak.index as i64 {
        0 => (
            PeakRelationship::CoPeak,
            format!("Cases and deaths both peaked in {}", cases_peak.label),
        ),
        d if d > 0 => {
            let months = d as usize;
            (
                PeakRelationship::DeathsLag { months },
                format!(
                    "The deaths peak ({}) came {} month(s) after the cases peak ({})",
                    deaths_peak.label, months, cases_peak.label
                ),
            )
        }
        d => {
            let months = (-d) as usize;
            (
                PeakRelationship::DeathsLead { months },
                format!(
                    "The deaths peak ({}) came {} month(s) before the cases peak ({})",
                    deaths_peak.label, months, cases_peak.label
                ),
            )
        }
    };

    Ok(Some(PeakReport {
        country,
        cases_peak,
        deaths_peak,
        relationship,
        message,
    }))
}

/// Index of the maximum value, first occurrence winning on ties.
fn argmax_first(values: &Float64Chunked) -> usize {
    let mut best = 0usize;
    let mut best_value = f64::NEG_INFINITY;
    for (i, value) in values.into_iter().enumerate() {
        let value = value.unwrap_or(0.0);
        if value > best_value {
            best_value = value;
            best = i;
        }
    }
    best
}
