//! Boundary vocabulary: filter inputs coming from the UI layer and the
//! chart-ready rows going back out. Extraction from a derived frame into
//! rows lives here too, so the reducers stay frame-to-frame.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core_logic::data_processing as dp;
use crate::ingest::columns::{
    CONFIRMADOS, CONFIRMADOS_DIA, FECHA, GASTO_SALUD_PIB, IA_100K, ISO3C, LETALIDAD_CFR_PCT,
    MUERTES, MUERTES_DIA, PAIS, PIB_PER_CAPITA, POBLACION, TASA_MORTALIDAD_100K,
};
use crate::ingest::loader::date_from_days;

/// Raw query parameters, shared by every endpoint. All fields optional;
/// reading never fails — see `params` for the degradation rules.
#[derive(Deserialize, Clone, Default, Debug)]
pub struct FilterParameters {
    pub country: Option<String>,
    pub countries: Option<String>,
    pub date_start: Option<String>,
    pub date_end: Option<String>,
    pub metric: Option<String>,
    pub n: Option<usize>,
}

/// Country filter: everything, one country, or an explicit set.
#[derive(Debug, Clone, PartialEq)]
pub enum CountrySelection {
    All,
    One(String),
    Many(Vec<String>),
}

/// Rollup bucket size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granularity {
    Weekly,
    Monthly,
}

/// Generic "table out" payload; an empty `data` array is the explicit
/// no-data state the consumer renders a placeholder for.
#[derive(Serialize, Debug)]
pub struct TableResponse<T: Serialize> {
    pub data: Vec<T>,
}

impl<T: Serialize> TableResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        TableResponse { data }
    }

    pub fn empty() -> Self {
        TableResponse { data: Vec::new() }
    }
}

/// One country's last-known observation within the filtered window.
#[derive(Serialize, Debug, Clone)]
pub struct SnapshotRow {
    pub country: String,
    pub iso3: String,
    pub date: NaiveDate,
    pub confirmed: f64,
    pub deaths: f64,
    pub new_cases_day: f64,
    pub new_deaths_day: f64,
    pub incidence_100k: f64,
    pub mortality_rate_100k: f64,
    pub case_fatality_rate_pct: f64,
    pub population: f64,
    pub gdp_per_capita: f64,
    pub health_expenditure_pct_gdp: f64,
}

impl SnapshotRow {
    pub fn from_frame(df: &DataFrame) -> PolarsResult<Vec<SnapshotRow>> {
        if df.height() == 0 {
            return Ok(Vec::new());
        }
        let country = df.column(PAIS)?.str()?;
        let iso3 = df.column(ISO3C)?.str()?;
        let dates = df.column(FECHA)?.cast(&DataType::Int32)?;
        let dates = dates.i32()?;
        let confirmed = df.column(CONFIRMADOS)?.f64()?;
        let deaths = df.column(MUERTES)?.f64()?;
        let new_cases = df.column(CONFIRMADOS_DIA)?.f64()?;
        let new_deaths = df.column(MUERTES_DIA)?.f64()?;
        let incidence = df.column(IA_100K)?.f64()?;
        let mortality = df.column(TASA_MORTALIDAD_100K)?.f64()?;
        let cfr = df.column(LETALIDAD_CFR_PCT)?.f64()?;
        let population = df.column(POBLACION)?.f64()?;
        let gdp = df.column(PIB_PER_CAPITA)?.f64()?;
        let health = df.column(GASTO_SALUD_PIB)?.f64()?;

        let mut rows = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            rows.push(SnapshotRow {
                country: country.get(i).unwrap_or_default().to_string(),
                iso3: iso3.get(i).unwrap_or_default().to_string(),
                date: date_from_days(dates.get(i).unwrap_or(0)),
                confirmed: confirmed.get(i).unwrap_or(0.0),
                deaths: deaths.get(i).unwrap_or(0.0),
                new_cases_day: new_cases.get(i).unwrap_or(0.0),
                new_deaths_day: new_deaths.get(i).unwrap_or(0.0),
                incidence_100k: incidence.get(i).unwrap_or(0.0),
                mortality_rate_100k: mortality.get(i).unwrap_or(0.0),
                case_fatality_rate_pct: cfr.get(i).unwrap_or(0.0),
                population: population.get(i).unwrap_or(0.0),
                gdp_per_capita: gdp.get(i).unwrap_or(0.0),
                health_expenditure_pct_gdp: health.get(i).unwrap_or(0.0),
            });
        }
        Ok(rows)
    }
}

/// One (country, period) bucket of a weekly or monthly rollup.
#[derive(Serialize, Debug, Clone)]
pub struct PeriodRow {
    pub country: String,
    pub iso3: String,
    /// Bucket start: the Monday of the week, or the 1st of the month.
    pub period: NaiveDate,
    /// Display label: ISO date for weeks, `YYYY-MM` for months.
    pub label: String,
    pub new_cases: f64,
    pub new_deaths: f64,
    pub cumulative_cases: f64,
    pub cumulative_deaths: f64,
    pub case_fatality_rate_pct: f64,
    pub mortality_rate_100k: f64,
    pub population: f64,
    pub period_incidence_100k: f64,
}

impl PeriodRow {
    pub fn from_frame(df: &DataFrame, granularity: Granularity) -> PolarsResult<Vec<PeriodRow>> {
        if df.height() == 0 {
            return Ok(Vec::new());
        }
        let country = df.column(PAIS)?.str()?;
        let iso3 = df.column(dp::ISO3)?.str()?;
        let periods = df.column(dp::PERIOD)?.cast(&DataType::Int32)?;
        let periods = periods.i32()?;
        let new_cases = df.column(dp::NEW_CASES)?.f64()?;
        let new_deaths = df.column(dp::NEW_DEATHS)?.f64()?;
        let cum_cases = df.column(dp::CUMULATIVE_CASES)?.f64()?;
        let cum_deaths = df.column(dp::CUMULATIVE_DEATHS)?.f64()?;
        let cfr = df.column(dp::CASE_FATALITY)?.f64()?;
        let mortality = df.column(dp::MORTALITY_RATE)?.f64()?;
        let population = df.column(dp::POPULATION)?.f64()?;
        let incidence = df.column(dp::PERIOD_INCIDENCE)?.f64()?;

        let mut rows = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let period = date_from_days(periods.get(i).unwrap_or(0));
            let label = match granularity {
                Granularity::Weekly => period.to_string(),
                Granularity::Monthly => period.format("%Y-%m").to_string(),
            };
            rows.push(PeriodRow {
                country: country.get(i).unwrap_or_default().to_string(),
                iso3: iso3.get(i).unwrap_or_default().to_string(),
                period,
                label,
                new_cases: new_cases.get(i).unwrap_or(0.0),
                new_deaths: new_deaths.get(i).unwrap_or(0.0),
                cumulative_cases: cum_cases.get(i).unwrap_or(0.0),
                cumulative_deaths: cum_deaths.get(i).unwrap_or(0.0),
                case_fatality_rate_pct: cfr.get(i).unwrap_or(0.0),
                mortality_rate_100k: mortality.get(i).unwrap_or(0.0),
                population: population.get(i).unwrap_or(0.0),
                period_incidence_100k: incidence.get(i).unwrap_or(0.0),
            });
        }
        Ok(rows)
    }
}

/// Weekly rollup plus the choropleth color ceiling derived from it.
#[derive(Serialize, Debug)]
pub struct WeeklyResponse {
    pub data: Vec<PeriodRow>,
    pub color_scale_max: f64,
}

/// One dumbbell: a country's metric at the window start and end.
#[derive(Serialize, Debug, Clone)]
pub struct ComparisonRow {
    pub country: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_value: f64,
    pub end_value: f64,
    pub increment: f64,
}

impl ComparisonRow {
    pub fn from_frame(df: &DataFrame) -> PolarsResult<Vec<ComparisonRow>> {
        if df.height() == 0 {
            return Ok(Vec::new());
        }
        let country = df.column(PAIS)?.str()?;
        let start_dates = df.column(dp::START_DATE)?.cast(&DataType::Int32)?;
        let start_dates = start_dates.i32()?;
        let end_dates = df.column(dp::END_DATE)?.cast(&DataType::Int32)?;
        let end_dates = end_dates.i32()?;
        let start_values = df.column(dp::START_VALUE)?.f64()?;
        let end_values = df.column(dp::END_VALUE)?.f64()?;
        let increments = df.column(dp::INCREMENT)?.f64()?;

        let mut rows = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            rows.push(ComparisonRow {
                country: country.get(i).unwrap_or_default().to_string(),
                start_date: date_from_days(start_dates.get(i).unwrap_or(0)),
                end_date: date_from_days(end_dates.get(i).unwrap_or(0)),
                start_value: start_values.get(i).unwrap_or(0.0),
                end_value: end_values.get(i).unwrap_or(0.0),
                increment: increments.get(i).unwrap_or(0.0),
            });
        }
        Ok(rows)
    }
}

/// One (country, week) point of the ridgeline intensity series.
#[derive(Serialize, Debug, Clone)]
pub struct NormalizedRow {
    pub country: String,
    pub week: NaiveDate,
    pub new_cases: f64,
    pub normalized: f64,
}

impl NormalizedRow {
    pub fn from_frame(df: &DataFrame) -> PolarsResult<Vec<NormalizedRow>> {
        if df.height() == 0 {
            return Ok(Vec::new());
        }
        let country = df.column(PAIS)?.str()?;
        let weeks = df.column(dp::PERIOD)?.cast(&DataType::Int32)?;
        let weeks = weeks.i32()?;
        let new_cases = df.column(dp::NEW_CASES)?.f64()?;
        let normalized = df.column(dp::NORMALIZED)?.f64()?;

        let mut rows = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            rows.push(NormalizedRow {
                country: country.get(i).unwrap_or_default().to_string(),
                week: date_from_days(weeks.get(i).unwrap_or(0)),
                new_cases: new_cases.get(i).unwrap_or(0.0),
                normalized: normalized.get(i).unwrap_or(0.0),
            });
        }
        Ok(rows)
    }
}

/// Headline figures over the snapshot. All-zero when the filtered set is
/// empty; never an error.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct KpiSummary {
    pub total_confirmed: i64,
    pub total_deaths: i64,
    pub countries: usize,
    pub mean_case_fatality_pct: f64,
}

/// Snapshot means across all countries, the "world" side of the
/// country-vs-world comparison.
#[derive(Serialize, Debug, Clone, Default)]
pub struct WorldAverages {
    pub case_fatality_rate_pct: f64,
    pub incidence_100k: f64,
    pub mortality_rate_100k: f64,
    pub health_expenditure_pct_gdp: f64,
}

#[derive(Serialize, Debug)]
pub struct WorldComparison {
    pub country: String,
    pub snapshot: Option<SnapshotRow>,
    pub world: WorldAverages,
}

/// Efficiency-matrix payload: qualifying snapshot rows plus the medians
/// that draw the quadrant lines.
#[derive(Serialize, Debug)]
pub struct EfficiencyResponse {
    pub data: Vec<SnapshotRow>,
    pub median_incidence_100k: Option<f64>,
    pub median_case_fatality_pct: Option<f64>,
}

/// The flagged extremum of one monthly series.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PeakPoint {
    /// Position within the period-sorted monthly rollup.
    pub index: usize,
    pub period: NaiveDate,
    pub label: String,
    pub value: f64,
}

/// How the deaths peak relates to the cases peak, measured in rollup
/// index positions, not calendar months.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub enum PeakRelationship {
    CoPeak,
    DeathsLag { months: usize },
    DeathsLead { months: usize },
}

#[derive(Serialize, Debug, Clone)]
pub struct PeakReport {
    pub country: String,
    pub cases_peak: PeakPoint,
    pub deaths_peak: PeakPoint,
    pub relationship: PeakRelationship,
    pub message: String,
}
