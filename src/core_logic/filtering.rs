//! The filter stage: country selection and inclusive date window over the
//! shared raw frame. Output is always an independently-owned frame; the
//! input is never mutated.

use std::collections::HashSet;

use chrono::NaiveDate;
use polars::prelude::*;

use crate::api::models::CountrySelection;
use crate::ingest::columns::{FECHA, PAIS};
use crate::ingest::loader::days_from_epoch;

/// Keep rows matching the country selection and falling inside
/// `[start, end]` (both inclusive, either side optional). A selection
/// naming no existing country simply produces the empty frame.
pub fn apply_filters(
    df: &DataFrame,
    selection: &CountrySelection,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> PolarsResult<DataFrame> {
    let mut data = df.clone();

    match selection {
        CountrySelection::All => {}
        CountrySelection::One(name) => {
            let mask: BooleanChunked = data
                .column(PAIS)?
                .str()?
                .into_iter()
                .map(|value| value == Some(name.as_str()))
                .collect();
            data = data.filter(&mask)?;
        }
        CountrySelection::Many(names) => {
            let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
            let mask: BooleanChunked = data
                .column(PAIS)?
                .str()?
                .into_iter()
                .map(|value| value.map(|name| wanted.contains(name)).unwrap_or(false))
                .collect();
            data = data.filter(&mask)?;
        }
    }

    if start.is_some() || end.is_some() {
        let lo = start.map(days_from_epoch).unwrap_or(i32::MIN);
        let hi = end.map(days_from_epoch).unwrap_or(i32::MAX);
        let days = data.column(FECHA)?.cast(&DataType::Int32)?;
        let days = days.i32()?;
        let mask: BooleanChunked = days
            .into_iter()
            .map(|value| value.map(|d| d >= lo && d <= hi).unwrap_or(false))
            .collect();
        data = data.filter(&mask)?;
    }

    Ok(data)
}
