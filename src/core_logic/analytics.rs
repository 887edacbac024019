//! Snapshot-derived summaries: KPI headers, rankings, the world means the
//! per-country comparison bars use, the efficiency matrix, and the color
//! ceiling for the weekly choropleth.

use polars::prelude::*;

use crate::api::models::{KpiSummary, WorldAverages};
use crate::core_logic::data_processing::PERIOD_INCIDENCE;
use crate::ingest::columns::{
    CONFIRMADOS, GASTO_SALUD_PIB, IA_100K, LETALIDAD_CFR_PCT, MUERTES, TASA_MORTALIDAD_100K,
};

/// Fallback choropleth ceiling when the whole series is zero.
const DEFAULT_COLOR_CAP: f64 = 100.0;

/// Headline totals over a snapshot: summed confirmed/deaths, country
/// count, mean case-fatality rate. An empty snapshot yields all zeros.
pub fn kpi_summary(snapshot: &DataFrame) -> PolarsResult<KpiSummary> {
    if snapshot.height() == 0 {
        return Ok(KpiSummary::default());
    }

    let confirmed = snapshot.column(CONFIRMADOS)?.f64()?.sum().unwrap_or(0.0);
    let deaths = snapshot.column(MUERTES)?.f64()?.sum().unwrap_or(0.0);
    let mean_cfr = snapshot
        .column(LETALIDAD_CFR_PCT)?
        .f64()?
        .mean()
        .unwrap_or(0.0);

    Ok(KpiSummary {
        total_confirmed: confirmed as i64,
        total_deaths: deaths as i64,
        countries: snapshot.height(),
        mean_case_fatality_pct: mean_cfr,
    })
}

/// Top-N countries by cumulative confirmed, descending.
pub fn top_countries(snapshot: &DataFrame, n: usize) -> PolarsResult<DataFrame> {
    let sorted = snapshot
        .clone()
        .lazy()
        .sort(
            CONFIRMADOS,
            SortOptions {
                descending: true,
                ..Default::default()
            },
        )
        .collect()?;
    Ok(sorted.head(Some(n)))
}

/// Means across all snapshot countries for the four comparison metrics.
pub fn world_averages(snapshot: &DataFrame) -> PolarsResult<WorldAverages> {
    if snapshot.height() == 0 {
        return Ok(WorldAverages::default());
    }

    Ok(WorldAverages {
        case_fatality_rate_pct: snapshot
            .column(LETALIDAD_CFR_PCT)?
            .f64()?
            .mean()
            .unwrap_or(0.0),
        incidence_100k: snapshot.column(IA_100K)?.f64()?.mean().unwrap_or(0.0),
        mortality_rate_100k: snapshot
            .column(TASA_MORTALIDAD_100K)?
            .f64()?
            .mean()
            .unwrap_or(0.0),
        health_expenditure_pct_gdp: snapshot
            .column(GASTO_SALUD_PIB)?
            .f64()?
            .mean()
            .unwrap_or(0.0),
    })
}

/// Countries with reported health spending, for the spend-vs-fatality
/// scatter.
pub fn health_spend_scatter(snapshot: &DataFrame) -> PolarsResult<DataFrame> {
    let spend = snapshot.column(GASTO_SALUD_PIB)?.f64()?;
    let mask: BooleanChunked = spend
        .into_iter()
        .map(|value| value.unwrap_or(0.0) > 0.0)
        .collect();
    snapshot.filter(&mask)
}

/// Efficiency matrix: countries with both health spending and incidence
/// reported, plus the medians that draw the quadrant lines. Medians are
/// `None` when nothing qualifies.
pub fn efficiency_matrix(
    snapshot: &DataFrame,
) -> PolarsResult<(DataFrame, Option<f64>, Option<f64>)> {
    let spend = snapshot.column(GASTO_SALUD_PIB)?.f64()?;
    let incidence = snapshot.column(IA_100K)?.f64()?;
    let mask: BooleanChunked = spend
        .into_iter()
        .zip(incidence.into_iter())
        .map(|(s, i)| s.unwrap_or(0.0) > 0.0 && i.unwrap_or(0.0) > 0.0)
        .collect();

    let qualifying = snapshot.filter(&mask)?;
    if qualifying.height() == 0 {
        return Ok((qualifying, None, None));
    }

    let median_incidence = qualifying.column(IA_100K)?.f64()?.median();
    let median_cfr = qualifying.column(LETALIDAD_CFR_PCT)?.f64()?.median();
    Ok((qualifying, median_incidence, median_cfr))
}

/// Choropleth color ceiling: the 95th percentile of weekly incidence so
/// outliers do not flatten the scale, falling back to the max, then to a
/// fixed default when the series is entirely zero.
pub fn color_scale_cap(weekly: &DataFrame) -> PolarsResult<f64> {
    if weekly.height() == 0 {
        return Ok(DEFAULT_COLOR_CAP);
    }

    let incidence = weekly.column(PERIOD_INCIDENCE)?.f64()?;
    let mut cap = incidence
        .quantile(0.95, QuantileInterpolOptions::Linear)?
        .unwrap_or(0.0);
    if cap == 0.0 {
        cap = incidence.max().unwrap_or(0.0);
    }
    if cap == 0.0 {
        cap = DEFAULT_COLOR_CAP;
    }
    Ok(cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::Granularity;
    use crate::core_logic::data_processing::{period_rollup, snapshot};
    use crate::ingest::loader::parse_observations;
    use approx::assert_abs_diff_eq;

    fn frame(csv: &str) -> DataFrame {
        parse_observations(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_kpi_totals_over_snapshot() {
        let df = frame(
            "pais,fecha,iso3c,confirmados,muertes,letalidad_CFR_pct\n\
             A,2020-01-01,AAA,10,1,1.0\n\
             A,2020-01-03,AAA,35,2,2.0\n\
             B,2020-01-03,BBB,8,1,4.0\n",
        );
        let snap = snapshot(&df).unwrap();

        let kpis = kpi_summary(&snap).unwrap();

        assert_eq!(kpis.total_confirmed, 43);
        assert_eq!(kpis.total_deaths, 3);
        assert_eq!(kpis.countries, 2);
        assert_abs_diff_eq!(kpis.mean_case_fatality_pct, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_kpi_empty_snapshot_is_all_zero() {
        let df = frame("pais,fecha,iso3c,confirmados\n");
        let kpis = kpi_summary(&df).unwrap();
        assert_eq!(kpis, KpiSummary::default());
    }

    #[test]
    fn test_top_countries_descending_and_truncated() {
        let df = frame(
            "pais,fecha,iso3c,confirmados\n\
             A,2020-01-01,AAA,10\n\
             B,2020-01-01,BBB,30\n\
             C,2020-01-01,CCC,20\n",
        );
        let snap = snapshot(&df).unwrap();

        let top = top_countries(&snap, 2).unwrap();

        assert_eq!(top.height(), 2);
        let countries = top.column("pais").unwrap().str().unwrap();
        assert_eq!(countries.get(0), Some("B"));
        assert_eq!(countries.get(1), Some("C"));
    }

    #[test]
    fn test_efficiency_matrix_filters_and_medians() {
        let df = frame(
            "pais,fecha,iso3c,IA_100k,letalidad_CFR_pct,gasto_salud_pib\n\
             A,2020-01-01,AAA,100,2.0,9.0\n\
             B,2020-01-01,BBB,200,4.0,5.0\n\
             C,2020-01-01,CCC,300,6.0,0\n\
             D,2020-01-01,DDD,0,1.0,7.0\n",
        );
        let snap = snapshot(&df).unwrap();

        let (qualifying, median_incidence, median_cfr) = efficiency_matrix(&snap).unwrap();

        // C lacks spending data, D lacks incidence; both drop out.
        assert_eq!(qualifying.height(), 2);
        assert_eq!(median_incidence, Some(150.0));
        assert_eq!(median_cfr, Some(3.0));
    }

    #[test]
    fn test_health_spend_scatter_drops_unreported() {
        let df = frame(
            "pais,fecha,iso3c,gasto_salud_pib\n\
             A,2020-01-01,AAA,9.0\n\
             B,2020-01-01,BBB,0\n",
        );
        let snap = snapshot(&df).unwrap();
        assert_eq!(health_spend_scatter(&snap).unwrap().height(), 1);
    }

    #[test]
    fn test_color_cap_falls_back_on_all_zero_series() {
        let df = frame(
            "pais,fecha,iso3c,confirmados_dia,poblacion\n\
             A,2020-03-02,AAA,0,100000\n\
             A,2020-03-09,AAA,0,100000\n",
        );
        let weekly = period_rollup(&df, Granularity::Weekly).unwrap();
        assert_eq!(color_scale_cap(&weekly).unwrap(), 100.0);
    }

    #[test]
    fn test_color_cap_bounded_by_max() {
        let df = frame(
            "pais,fecha,iso3c,confirmados_dia,poblacion\n\
             A,2020-03-02,AAA,10,100000\n\
             A,2020-03-09,AAA,50,100000\n",
        );
        let weekly = period_rollup(&df, Granularity::Weekly).unwrap();
        let cap = color_scale_cap(&weekly).unwrap();
        assert!(cap > 0.0);
        assert!(cap <= 50.0);
    }
}
