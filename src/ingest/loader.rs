//! CSV ingestion. The raw table is read once at startup and held immutable
//! for the process lifetime; every value in a configured numeric column
//! that fails to parse is coerced to 0.0 (the dataset's declared "bad
//! value"), and no row is ever rejected wholesale.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;

use crate::error::EngineError;
use crate::ingest::columns::{self, FECHA, ISO3C, PAIS};

/// Load the raw observation table from `path`. A missing or unreadable
/// file is fatal: the process cannot start without its source of truth.
pub fn load_table(path: &Path) -> Result<DataFrame, EngineError> {
    let file = File::open(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_observations(file)
}

/// Parse a delimited table from any reader into the raw frame.
///
/// Required columns: `pais`, `fecha`, `iso3c`. An unparseable `fecha` is
/// fatal. A configured numeric column absent from the header is
/// materialized as all-zero so downstream schemas stay total.
pub fn parse_observations<R: Read>(reader: R) -> Result<DataFrame, EngineError> {
    let mut rdr = csv::Reader::from_reader(reader);

    let headers = rdr.headers()?.clone();
    let find = |name: &str| headers.iter().position(|h| h == name);

    let pais_idx = find(PAIS).ok_or_else(|| EngineError::MissingColumn(PAIS.into()))?;
    let fecha_idx = find(FECHA).ok_or_else(|| EngineError::MissingColumn(FECHA.into()))?;
    let iso3_idx = find(ISO3C).ok_or_else(|| EngineError::MissingColumn(ISO3C.into()))?;

    let numeric_idx: Vec<(&str, Option<usize>)> = columns::NUMERIC_COLUMNS
        .iter()
        .map(|&name| {
            let idx = find(name);
            if idx.is_none() {
                tracing::warn!(column = name, "numeric column missing, zero-filling");
            }
            (name, idx)
        })
        .collect();

    let mut paises: Vec<String> = Vec::new();
    let mut iso3s: Vec<String> = Vec::new();
    let mut fechas: Vec<i32> = Vec::new();
    let mut numerics: Vec<Vec<f64>> = vec![Vec::new(); numeric_idx.len()];

    for (row, record) in rdr.records().enumerate() {
        let record = record?;

        let raw_date = record.get(fecha_idx).unwrap_or("").trim();
        let date = parse_date(raw_date).ok_or_else(|| EngineError::InvalidDate {
            row: row + 1,
            value: raw_date.to_string(),
        })?;

        paises.push(record.get(pais_idx).unwrap_or("").trim().to_string());
        iso3s.push(record.get(iso3_idx).unwrap_or("").trim().to_string());
        fechas.push(days_from_epoch(date));

        for (values, (_, idx)) in numerics.iter_mut().zip(&numeric_idx) {
            let cell = idx.and_then(|i| record.get(i)).unwrap_or("");
            values.push(cell.trim().parse::<f64>().unwrap_or(0.0));
        }
    }

    let mut series = vec![
        Series::new(PAIS, paises),
        Series::new(FECHA, fechas).cast(&DataType::Date)?,
        Series::new(ISO3C, iso3s),
    ];
    for ((name, _), values) in numeric_idx.iter().zip(numerics) {
        series.push(Series::new(name, values));
    }

    Ok(DataFrame::new(series)?)
}

/// Accept the date shapes the original feed carries: a plain ISO date or
/// an ISO timestamp with either separator.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

/// Days since 1970-01-01, the physical representation of a polars `Date`.
pub fn days_from_epoch(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

/// Inverse of [`days_from_epoch`].
pub fn date_from_days(days: i32) -> NaiveDate {
    epoch() + chrono::Duration::days(days as i64)
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch is a valid date")
}
