//! The frame-to-frame reducers every chart feeds from. Each one takes an
//! already-filtered frame and returns a fresh derived frame; none of them
//! touch shared state, so recomputing on every filter change is just
//! calling them again.

use polars::prelude::*;

use crate::api::models::Granularity;
use crate::ingest::columns::{
    CONFIRMADOS, CONFIRMADOS_DIA, FECHA, ISO3C, LETALIDAD_CFR_PCT, MUERTES, MUERTES_DIA, PAIS,
    POBLACION, TASA_MORTALIDAD_100K,
};

// Derived-frame column names.
pub const PERIOD: &str = "period";
pub const NEW_CASES: &str = "new_cases";
pub const NEW_DEATHS: &str = "new_deaths";
pub const CUMULATIVE_CASES: &str = "cumulative_cases";
pub const CUMULATIVE_DEATHS: &str = "cumulative_deaths";
pub const CASE_FATALITY: &str = "case_fatality_rate_pct";
pub const MORTALITY_RATE: &str = "mortality_rate_100k";
pub const POPULATION: &str = "population";
pub const ISO3: &str = "iso3";
pub const PERIOD_INCIDENCE: &str = "period_incidence_100k";
pub const PEAK_CASES: &str = "peak_cases";
pub const NORMALIZED: &str = "normalized";
pub const START_VALUE: &str = "start_value";
pub const END_VALUE: &str = "end_value";
pub const START_DATE: &str = "start_date";
pub const END_DATE: &str = "end_date";
pub const INCREMENT: &str = "increment";

/// Current-state view: per country, the row with the maximum date in the
/// filtered window. Keeps the full raw schema; output sorted by country.
pub fn snapshot(df: &DataFrame) -> PolarsResult<DataFrame> {
    if df.height() == 0 {
        return Ok(df.clone());
    }

    df.clone()
        .lazy()
        .sort(FECHA, Default::default())
        .group_by(vec![col(PAIS)])
        .agg(vec![col("*").last()])
        .sort(PAIS, Default::default())
        .collect()
}

/// Weekly or monthly rollup keyed by `(pais, period)`, `period` being the
/// bucket's start date. Reductions follow the field semantics: daily
/// deltas are summed, cumulative counters take their end-of-period max,
/// rates take their end-of-period value, static fields their first.
///
/// Period incidence is recomputed from the summed new cases and the
/// population — the raw `IA_100k` column is cumulative and must not leak
/// into per-period figures.
pub fn period_rollup(df: &DataFrame, granularity: Granularity) -> PolarsResult<DataFrame> {
    let day_offset = match granularity {
        // Monday-based weeks: weekday() is 1 for Monday through 7.
        Granularity::Weekly => col(FECHA).dt().weekday().cast(DataType::Int32) - lit(1),
        Granularity::Monthly => col(FECHA).dt().day().cast(DataType::Int32) - lit(1),
    };
    let bucket = (col(FECHA).cast(DataType::Int32) - day_offset)
        .cast(DataType::Date)
        .alias(PERIOD);

    df.clone()
        .lazy()
        .sort(FECHA, Default::default())
        .with_column(bucket)
        .group_by(vec![col(PAIS), col(PERIOD)])
        .agg(vec![
            col(CONFIRMADOS_DIA).sum().alias(NEW_CASES),
            col(MUERTES_DIA).sum().alias(NEW_DEATHS),
            col(CONFIRMADOS).max().alias(CUMULATIVE_CASES),
            col(MUERTES).max().alias(CUMULATIVE_DEATHS),
            col(LETALIDAD_CFR_PCT).last().alias(CASE_FATALITY),
            col(TASA_MORTALIDAD_100K).last().alias(MORTALITY_RATE),
            col(POBLACION).first().alias(POPULATION),
            col(ISO3C).first().alias(ISO3),
        ])
        .with_column(
            when(col(POPULATION).gt(lit(0.0)))
                .then(col(NEW_CASES) / col(POPULATION) * lit(100_000.0))
                .otherwise(lit(0.0))
                .alias(PERIOD_INCIDENCE),
        )
        // Period order is load-bearing: animation frames and positional
        // peak indices both read it.
        .sort_by_exprs(
            vec![col(PERIOD), col(PAIS)],
            vec![false, false],
            false,
            false,
        )
        .collect()
}

/// Start/end pair per country for one metric over the filtered window,
/// with `increment = end - start`. Sorted ascending by the end value,
/// which fixes the vertical order of the dumbbell chart.
pub fn comparison(df: &DataFrame, metric: &str) -> PolarsResult<DataFrame> {
    df.clone()
        .lazy()
        .sort(FECHA, Default::default())
        .group_by(vec![col(PAIS)])
        .agg(vec![
            col(metric).first().alias(START_VALUE),
            col(metric).last().alias(END_VALUE),
            col(FECHA).first().alias(START_DATE),
            col(FECHA).last().alias(END_DATE),
        ])
        .with_column((col(END_VALUE) - col(START_VALUE)).alias(INCREMENT))
        .sort(END_VALUE, Default::default())
        .collect()
}

/// Wave intensity: each week's new cases divided by the country's own
/// maximum week. A country whose every week is zero gets a denominator of
/// 1, so its series is all zeros rather than NaN.
pub fn normalized_series(weekly: &DataFrame) -> PolarsResult<DataFrame> {
    weekly
        .clone()
        .lazy()
        .with_column(col(NEW_CASES).max().over(vec![col(PAIS)]).alias(PEAK_CASES))
        .with_column(
            when(col(PEAK_CASES).gt(lit(0.0)))
                .then(col(PEAK_CASES))
                .otherwise(lit(1.0))
                .alias(PEAK_CASES),
        )
        .with_column((col(NEW_CASES) / col(PEAK_CASES)).alias(NORMALIZED))
        .select(vec![
            col(PAIS),
            col(PERIOD),
            col(NEW_CASES),
            col(NORMALIZED),
        ])
        .sort_by_exprs(
            vec![col(PAIS), col(PERIOD)],
            vec![false, false],
            false,
            false,
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::CountrySelection;
    use crate::core_logic::filtering::apply_filters;
    use crate::ingest::loader::{days_from_epoch, parse_observations};
    use chrono::NaiveDate;

    // The loader zero-fills configured numeric columns missing from the
    // header, so fixtures only spell out the columns they exercise.
    fn frame(csv: &str) -> DataFrame {
        parse_observations(csv.as_bytes()).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn f64_col(df: &DataFrame, name: &str, idx: usize) -> f64 {
        df.column(name).unwrap().f64().unwrap().get(idx).unwrap()
    }

    fn date_col(df: &DataFrame, name: &str, idx: usize) -> i32 {
        df.column(name)
            .unwrap()
            .cast(&DataType::Int32)
            .unwrap()
            .i32()
            .unwrap()
            .get(idx)
            .unwrap()
    }

    #[test]
    fn test_snapshot_takes_latest_row_per_country() {
        // Two countries over three days.
        let df = frame(
            "pais,fecha,iso3c,confirmados\n\
             A,2020-01-01,AAA,10\n\
             A,2020-01-02,AAA,20\n\
             A,2020-01-03,AAA,35\n\
             B,2020-01-01,BBB,5\n\
             B,2020-01-02,BBB,5\n\
             B,2020-01-03,BBB,8\n",
        );

        let snap = snapshot(&df).unwrap();

        assert_eq!(snap.height(), 2);
        assert_eq!(f64_col(&snap, CONFIRMADOS, 0), 35.0);
        assert_eq!(f64_col(&snap, CONFIRMADOS, 1), 8.0);
        assert_eq!(date_col(&snap, FECHA, 0), days_from_epoch(date(2020, 1, 3)));
        assert_eq!(date_col(&snap, FECHA, 1), days_from_epoch(date(2020, 1, 3)));
    }

    #[test]
    fn test_snapshot_respects_date_window() {
        // A narrowed window moves the "last" row to the last date within
        // range, not the global last date.
        let df = frame(
            "pais,fecha,iso3c,confirmados\n\
             A,2020-01-01,AAA,10\n\
             A,2020-01-02,AAA,20\n\
             A,2020-01-03,AAA,35\n",
        );

        let filtered =
            apply_filters(&df, &CountrySelection::All, None, Some(date(2020, 1, 2))).unwrap();
        let snap = snapshot(&filtered).unwrap();

        assert_eq!(snap.height(), 1);
        assert_eq!(f64_col(&snap, CONFIRMADOS, 0), 20.0);
        assert_eq!(date_col(&snap, FECHA, 0), days_from_epoch(date(2020, 1, 2)));
    }

    #[test]
    fn test_weekly_rollup_buckets_and_conserves_totals() {
        // 2020-03-07/08 fall in the week starting Monday 2020-03-02;
        // 2020-03-09 opens the next week.
        let df = frame(
            "pais,fecha,iso3c,confirmados_dia\n\
             A,2020-03-07,AAA,10\n\
             A,2020-03-08,AAA,20\n\
             A,2020-03-09,AAA,30\n",
        );

        let weekly = period_rollup(&df, Granularity::Weekly).unwrap();

        assert_eq!(weekly.height(), 2);
        assert_eq!(date_col(&weekly, PERIOD, 0), days_from_epoch(date(2020, 3, 2)));
        assert_eq!(date_col(&weekly, PERIOD, 1), days_from_epoch(date(2020, 3, 9)));
        assert_eq!(f64_col(&weekly, NEW_CASES, 0), 30.0);
        assert_eq!(f64_col(&weekly, NEW_CASES, 1), 30.0);

        // Conservation: regrouping never invents or loses cases.
        let raw_total: f64 = df
            .column(CONFIRMADOS_DIA)
            .unwrap()
            .f64()
            .unwrap()
            .sum()
            .unwrap();
        let weekly_total: f64 = weekly
            .column(NEW_CASES)
            .unwrap()
            .f64()
            .unwrap()
            .sum()
            .unwrap();
        assert_eq!(raw_total, weekly_total);
    }

    #[test]
    fn test_weekly_incidence_recomputed_not_copied() {
        // The raw IA_100k column carries a nonsense value to prove the
        // rollup never reads it.
        let df = frame(
            "pais,fecha,iso3c,confirmados_dia,IA_100k,poblacion\n\
             A,2020-03-02,AAA,10,999,100000\n\
             A,2020-03-03,AAA,20,999,100000\n",
        );

        let weekly = period_rollup(&df, Granularity::Weekly).unwrap();

        assert_eq!(weekly.height(), 1);
        assert_eq!(f64_col(&weekly, PERIOD_INCIDENCE, 0), 30.0);
    }

    #[test]
    fn test_weekly_incidence_zero_population_is_zero() {
        let df = frame(
            "pais,fecha,iso3c,confirmados_dia,poblacion\n\
             A,2020-03-02,AAA,10,0\n",
        );
        let weekly = period_rollup(&df, Granularity::Weekly).unwrap();
        assert_eq!(f64_col(&weekly, PERIOD_INCIDENCE, 0), 0.0);
    }

    #[test]
    fn test_monthly_rollup_rule_table() {
        let df = frame(
            "pais,fecha,iso3c,confirmados,confirmados_dia,letalidad_CFR_pct,poblacion\n\
             A,2020-01-10,AAA,10,10,1.0,100000\n\
             A,2020-01-20,AAA,25,15,2.0,100000\n\
             A,2020-02-05,AAA,40,15,3.0,100000\n",
        );

        let monthly = period_rollup(&df, Granularity::Monthly).unwrap();

        assert_eq!(monthly.height(), 2);
        // sum for daily deltas
        assert_eq!(f64_col(&monthly, NEW_CASES, 0), 25.0);
        // max for cumulative counters
        assert_eq!(f64_col(&monthly, CUMULATIVE_CASES, 0), 25.0);
        assert_eq!(f64_col(&monthly, CUMULATIVE_CASES, 1), 40.0);
        // last for rates
        assert_eq!(f64_col(&monthly, CASE_FATALITY, 0), 2.0);
        // first for static fields
        assert_eq!(f64_col(&monthly, POPULATION, 0), 100000.0);
        // buckets keyed by month start, ascending
        assert_eq!(date_col(&monthly, PERIOD, 0), days_from_epoch(date(2020, 1, 1)));
        assert_eq!(date_col(&monthly, PERIOD, 1), days_from_epoch(date(2020, 2, 1)));
    }

    #[test]
    fn test_comparison_increment_and_sort() {
        let df = frame(
            "pais,fecha,iso3c,IA_100k\n\
             A,2020-01-01,AAA,1.0\n\
             A,2020-01-05,AAA,5.0\n\
             B,2020-01-01,BBB,2.0\n\
             B,2020-01-05,BBB,3.0\n",
        );

        let pairs = comparison(&df, "IA_100k").unwrap();

        assert_eq!(pairs.height(), 2);
        // sorted ascending by end value: B (3.0) before A (5.0)
        let countries = pairs.column(PAIS).unwrap().str().unwrap();
        assert_eq!(countries.get(0), Some("B"));
        assert_eq!(countries.get(1), Some("A"));
        for i in 0..pairs.height() {
            let start = f64_col(&pairs, START_VALUE, i);
            let end = f64_col(&pairs, END_VALUE, i);
            assert_eq!(f64_col(&pairs, INCREMENT, i), end - start);
        }
        assert_eq!(date_col(&pairs, START_DATE, 0), days_from_epoch(date(2020, 1, 1)));
        assert_eq!(date_col(&pairs, END_DATE, 0), days_from_epoch(date(2020, 1, 5)));
    }

    #[test]
    fn test_normalization_peaks_at_one_and_handles_all_zero() {
        let df = frame(
            "pais,fecha,iso3c,confirmados_dia\n\
             A,2020-03-02,AAA,10\n\
             A,2020-03-09,AAA,40\n\
             B,2020-03-02,BBB,0\n\
             B,2020-03-09,BBB,0\n",
        );

        let weekly = period_rollup(&df, Granularity::Weekly).unwrap();
        let normalized = normalized_series(&weekly).unwrap();

        assert_eq!(normalized.height(), 4);
        // rows come back sorted by (country, week)
        assert_eq!(f64_col(&normalized, NORMALIZED, 0), 0.25);
        assert_eq!(f64_col(&normalized, NORMALIZED, 1), 1.0);
        // all-zero country: zeros, never NaN
        assert_eq!(f64_col(&normalized, NORMALIZED, 2), 0.0);
        assert_eq!(f64_col(&normalized, NORMALIZED, 3), 0.0);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let df = frame(
            "pais,fecha,iso3c,confirmados\n\
             A,2020-01-01,AAA,10\n\
             B,2020-01-02,BBB,20\n\
             C,2020-01-03,CCC,30\n",
        );
        let selection = CountrySelection::Many(vec!["A".into(), "C".into()]);
        let window = (Some(date(2020, 1, 1)), Some(date(2020, 1, 3)));

        let once = apply_filters(&df, &selection, window.0, window.1).unwrap();
        let twice = apply_filters(&once, &selection, window.0, window.1).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_filter_yields_empty_derivations() {
        let df = frame(
            "pais,fecha,iso3c,confirmados\n\
             A,2020-01-01,AAA,10\n",
        );

        let filtered = apply_filters(
            &df,
            &CountrySelection::One("Nowhere".into()),
            None,
            None,
        )
        .unwrap();
        assert_eq!(filtered.height(), 0);

        assert_eq!(snapshot(&filtered).unwrap().height(), 0);
        assert_eq!(
            period_rollup(&filtered, Granularity::Weekly).unwrap().height(),
            0
        );
        assert_eq!(comparison(&filtered, "IA_100k").unwrap().height(), 0);
        let weekly = period_rollup(&filtered, Granularity::Weekly).unwrap();
        assert_eq!(normalized_series(&weekly).unwrap().height(), 0);
    }
}
