//! Filter bounds derived once at load time: which countries exist and
//! what date range the table spans. Stable for the process lifetime since
//! the raw table is immutable.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;

use crate::error::EngineError;
use crate::ingest::columns::{FECHA, PAIS};
use crate::ingest::loader::date_from_days;

#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    /// Sorted, duplicate-free country names; nulls and empties excluded.
    pub countries: Vec<String>,
    pub date_min: NaiveDate,
    pub date_max: NaiveDate,
    pub rows: usize,
}

/// Compute the catalog. An empty table is a startup error: there is
/// nothing to bound the filter controls with.
pub fn build_catalog(df: &DataFrame) -> Result<Catalog, EngineError> {
    let names = df.column(PAIS)?.str()?;
    let countries: Vec<String> = names
        .into_iter()
        .flatten()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let days = df.column(FECHA)?.cast(&DataType::Int32)?;
    let days = days.i32()?;
    let (min, max) = match (days.min(), days.max()) {
        (Some(min), Some(max)) => (min, max),
        _ => return Err(EngineError::EmptyTable),
    };
    if countries.is_empty() {
        return Err(EngineError::EmptyTable);
    }

    Ok(Catalog {
        countries,
        date_min: date_from_days(min),
        date_max: date_from_days(max),
        rows: df.height(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::loader::parse_observations;

    #[test]
    fn test_sorted_dedup_and_bounds() {
        let csv = "\
pais,fecha,iso3c
Spain,2020-03-02,ESP
Italy,2020-01-15,ITA
Spain,2020-06-30,ESP
,2020-02-01,XXX
";
        let df = parse_observations(csv.as_bytes()).unwrap();
        let catalog = build_catalog(&df).unwrap();
        assert_eq!(catalog.countries, vec!["Italy", "Spain"]);
        assert_eq!(catalog.date_min, NaiveDate::from_ymd_opt(2020, 1, 15).unwrap());
        assert_eq!(catalog.date_max, NaiveDate::from_ymd_opt(2020, 6, 30).unwrap());
        assert_eq!(catalog.rows, 4);
    }

    #[test]
    fn test_empty_table_is_fatal() {
        let csv = "pais,fecha,iso3c\n";
        let df = parse_observations(csv.as_bytes()).unwrap();
        assert!(matches!(
            build_catalog(&df),
            Err(EngineError::EmptyTable)
        ));
    }
}
