//! Lossy reading of filter parameters. The UI layer can hand us anything
//! (unset widgets, half-typed dates, unknown metric names); every reader
//! here degrades to "no filter applied" instead of failing, so no request
//! ever errors on its inputs.

use chrono::NaiveDate;

use crate::api::models::{CountrySelection, FilterParameters};
use crate::ingest::columns::{
    CONFIRMADOS, CONFIRMADOS_DIA, GASTO_SALUD_PIB, IA_100K, LETALIDAD_CFR_PCT, MUERTES,
    MUERTES_DIA, TASA_MORTALIDAD_100K,
};
use crate::ingest::loader::parse_date;

/// Sentinel the UI sends for "no country filter".
const ALL: &str = "All";

/// Resolve the country filter. `countries` (comma-separated) wins over
/// `country`; absent, empty, or the `All` sentinel mean no filter.
pub fn country_selection(params: &FilterParameters) -> CountrySelection {
    if let Some(list) = params.countries.as_deref() {
        let names: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != ALL)
            .map(str::to_string)
            .collect();
        return match names.len() {
            0 => CountrySelection::All,
            1 => CountrySelection::One(names.into_iter().next().expect("len checked")),
            _ => CountrySelection::Many(names),
        };
    }
    match params.country.as_deref().map(str::trim) {
        None | Some("") | Some(ALL) => CountrySelection::All,
        Some(name) => CountrySelection::One(name.to_string()),
    }
}

/// Resolve the inclusive date window. Unparseable ends degrade to
/// unbounded; an inverted window is handed through as-is and simply
/// matches nothing.
pub fn date_window(params: &FilterParameters) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let start = params.date_start.as_deref().and_then(parse_date);
    let end = params.date_end.as_deref().and_then(parse_date);
    (start, end)
}

/// Map a metric name from the query string to a raw column. Unknown or
/// absent names fall back to cumulative incidence, the default dumbbell
/// metric.
pub fn metric_column(params: &FilterParameters) -> &'static str {
    match params.metric.as_deref() {
        Some("cases") | Some(CONFIRMADOS) => CONFIRMADOS,
        Some("deaths") | Some(MUERTES) => MUERTES,
        Some("new_cases") | Some(CONFIRMADOS_DIA) => CONFIRMADOS_DIA,
        Some("new_deaths") | Some(MUERTES_DIA) => MUERTES_DIA,
        Some("cfr") | Some(LETALIDAD_CFR_PCT) => LETALIDAD_CFR_PCT,
        Some("mortality") | Some(TASA_MORTALIDAD_100K) => TASA_MORTALIDAD_100K,
        Some("health_spend") | Some(GASTO_SALUD_PIB) => GASTO_SALUD_PIB,
        _ => IA_100K,
    }
}

/// Ranking size, defaulting to 10 and capped to keep payloads bounded.
pub fn ranking_size(params: &FilterParameters) -> usize {
    params.n.unwrap_or(10).min(250)
}

/// Compact human number: 1.23B / 4.56M / 7.8K / 42.
pub fn fmt_compact(n: f64) -> String {
    if n >= 1e9 {
        format!("{:.2}B", n / 1e9)
    } else if n >= 1e6 {
        format!("{:.2}M", n / 1e6)
    } else if n >= 1e3 {
        format!("{:.1}K", n / 1e3)
    } else {
        format!("{:.0}", n)
    }
}
