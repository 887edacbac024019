#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::Path;
use std::sync::Arc;

use dotenv::dotenv;
use polars::prelude::*;
use tracing_subscriber::EnvFilter;
use warp::Filter;

use incidence_engine::api::models::{
    ComparisonRow, CountrySelection, EfficiencyResponse, FilterParameters, Granularity,
    KpiSummary, NormalizedRow, PeakReport, PeriodRow, SnapshotRow, TableResponse, WeeklyResponse,
    WorldComparison,
};
use incidence_engine::api::params;
use incidence_engine::config::Config;
use incidence_engine::core_logic::{analytics, data_processing, filtering, peaks};
use incidence_engine::ingest::{catalog, loader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenv().ok();

    let cfg = Config::load()?;

    tracing::info!(path = %cfg.data_path, "loading raw observation table");
    let raw = loader::load_table(Path::new(&cfg.data_path))?;
    let catalog = catalog::build_catalog(&raw)?;
    tracing::info!(
        rows = catalog.rows,
        countries = catalog.countries.len(),
        from = %catalog.date_min,
        to = %catalog.date_max,
        "raw table loaded"
    );

    let frame = Arc::new(raw);
    let catalog = Arc::new(catalog);

    let meta_route = warp::path("meta").map({
        let catalog = Arc::clone(&catalog);
        move || warp::reply::json(&*catalog)
    });

    let kpis_route = warp::path("kpis")
        .and(warp::query::<FilterParameters>())
        .map({
            let frame = Arc::clone(&frame);
            move |p: FilterParameters| warp::reply::json(&kpis_payload(&frame, &p))
        });

    let snapshot_route = warp::path("snapshot")
        .and(warp::query::<FilterParameters>())
        .map({
            let frame = Arc::clone(&frame);
            move |p: FilterParameters| warp::reply::json(&snapshot_payload(&frame, &p))
        });

    let rankings_route = warp::path("rankings")
        .and(warp::query::<FilterParameters>())
        .map({
            let frame = Arc::clone(&frame);
            move |p: FilterParameters| warp::reply::json(&rankings_payload(&frame, &p))
        });

    let weekly_route = warp::path("weekly")
        .and(warp::query::<FilterParameters>())
        .map({
            let frame = Arc::clone(&frame);
            move |p: FilterParameters| warp::reply::json(&weekly_payload(&frame, &p))
        });

    let monthly_route = warp::path("monthly")
        .and(warp::query::<FilterParameters>())
        .map({
            let frame = Arc::clone(&frame);
            move |p: FilterParameters| warp::reply::json(&monthly_payload(&frame, &p))
        });

    let comparison_route = warp::path("comparison")
        .and(warp::query::<FilterParameters>())
        .map({
            let frame = Arc::clone(&frame);
            move |p: FilterParameters| warp::reply::json(&comparison_payload(&frame, &p))
        });

    let normalized_route = warp::path("normalized")
        .and(warp::query::<FilterParameters>())
        .map({
            let frame = Arc::clone(&frame);
            move |p: FilterParameters| warp::reply::json(&normalized_payload(&frame, &p))
        });

    let peaks_route = warp::path("peaks")
        .and(warp::query::<FilterParameters>())
        .map({
            let frame = Arc::clone(&frame);
            move |p: FilterParameters| warp::reply::json(&peaks_payload(&frame, &p))
        });

    let efficiency_route = warp::path("efficiency")
        .and(warp::query::<FilterParameters>())
        .map({
            let frame = Arc::clone(&frame);
            move |p: FilterParameters| warp::reply::json(&efficiency_payload(&frame, &p))
        });

    let health_route = warp::path("health-spend")
        .and(warp::query::<FilterParameters>())
        .map({
            let frame = Arc::clone(&frame);
            move |p: FilterParameters| warp::reply::json(&health_spend_payload(&frame, &p))
        });

    let world_route = warp::path("world")
        .and(warp::query::<FilterParameters>())
        .map({
            let frame = Arc::clone(&frame);
            move |p: FilterParameters| warp::reply::json(&world_payload(&frame, &p))
        });

    let routes = meta_route
        .or(kpis_route)
        .or(snapshot_route)
        .or(rankings_route)
        .or(weekly_route)
        .or(monthly_route)
        .or(comparison_route)
        .or(normalized_route)
        .or(peaks_route)
        .or(efficiency_route)
        .or(health_route)
        .or(world_route);

    tracing::info!(port = cfg.port, "starting web server");
    warp::serve(routes).run(([127, 0, 0, 1], cfg.port)).await;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Filter the shared frame by the request parameters.
fn filtered(frame: &DataFrame, p: &FilterParameters) -> PolarsResult<DataFrame> {
    let selection = params::country_selection(p);
    let (start, end) = params::date_window(p);
    filtering::apply_filters(frame, &selection, start, end)
}

// Every payload builder below degrades to its empty shape on an internal
// error: the consumer renders "no data", never a 500.

fn degraded<T>(context: &str, error: PolarsError, empty: T) -> T {
    tracing::warn!(error = %error, context, "reduction failed, returning empty payload");
    empty
}

fn kpis_payload(frame: &DataFrame, p: &FilterParameters) -> KpiSummary {
    (|| {
        let snap = data_processing::snapshot(&filtered(frame, p)?)?;
        analytics::kpi_summary(&snap)
    })()
    .unwrap_or_else(|e| degraded("kpis", e, KpiSummary::default()))
}

fn snapshot_payload(frame: &DataFrame, p: &FilterParameters) -> TableResponse<SnapshotRow> {
    (|| {
        let snap = data_processing::snapshot(&filtered(frame, p)?)?;
        Ok(TableResponse::new(SnapshotRow::from_frame(&snap)?))
    })()
    .unwrap_or_else(|e| degraded("snapshot", e, TableResponse::empty()))
}

fn rankings_payload(frame: &DataFrame, p: &FilterParameters) -> TableResponse<SnapshotRow> {
    (|| {
        let snap = data_processing::snapshot(&filtered(frame, p)?)?;
        let top = analytics::top_countries(&snap, params::ranking_size(p))?;
        Ok(TableResponse::new(SnapshotRow::from_frame(&top)?))
    })()
    .unwrap_or_else(|e| degraded("rankings", e, TableResponse::empty()))
}

fn weekly_payload(frame: &DataFrame, p: &FilterParameters) -> WeeklyResponse {
    (|| {
        let weekly = data_processing::period_rollup(&filtered(frame, p)?, Granularity::Weekly)?;
        Ok(WeeklyResponse {
            color_scale_max: analytics::color_scale_cap(&weekly)?,
            data: PeriodRow::from_frame(&weekly, Granularity::Weekly)?,
        })
    })()
    .unwrap_or_else(|e| {
        degraded(
            "weekly",
            e,
            WeeklyResponse {
                data: Vec::new(),
                color_scale_max: 0.0,
            },
        )
    })
}

fn monthly_payload(frame: &DataFrame, p: &FilterParameters) -> TableResponse<PeriodRow> {
    (|| {
        let monthly = data_processing::period_rollup(&filtered(frame, p)?, Granularity::Monthly)?;
        Ok(TableResponse::new(PeriodRow::from_frame(
            &monthly,
            Granularity::Monthly,
        )?))
    })()
    .unwrap_or_else(|e| degraded("monthly", e, TableResponse::empty()))
}

fn comparison_payload(frame: &DataFrame, p: &FilterParameters) -> TableResponse<ComparisonRow> {
    (|| {
        let pairs = data_processing::comparison(&filtered(frame, p)?, params::metric_column(p))?;
        Ok(TableResponse::new(ComparisonRow::from_frame(&pairs)?))
    })()
    .unwrap_or_else(|e| degraded("comparison", e, TableResponse::empty()))
}

fn normalized_payload(frame: &DataFrame, p: &FilterParameters) -> TableResponse<NormalizedRow> {
    (|| {
        let weekly = data_processing::period_rollup(&filtered(frame, p)?, Granularity::Weekly)?;
        let normalized = data_processing::normalized_series(&weekly)?;
        Ok(TableResponse::new(NormalizedRow::from_frame(&normalized)?))
    })()
    .unwrap_or_else(|e| degraded("normalized", e, TableResponse::empty()))
}

/// Peaks are a single-country view; without a concrete country the
/// payload is the explicit no-data state.
fn peaks_payload(frame: &DataFrame, p: &FilterParameters) -> Option<PeakReport> {
    let selection = params::country_selection(p);
    let country = match &selection {
        CountrySelection::One(name) => name.clone(),
        CountrySelection::Many(names) if names.len() == 1 => names[0].clone(),
        _ => return None,
    };
    (|| {
        let (start, end) = params::date_window(p);
        let data =
            filtering::apply_filters(frame, &CountrySelection::One(country), start, end)?;
        let monthly = data_processing::period_rollup(&data, Granularity::Monthly)?;
        peaks::monthly_peaks(&monthly)
    })()
    .unwrap_or_else(|e| degraded("peaks", e, None))
}

fn efficiency_payload(frame: &DataFrame, p: &FilterParameters) -> EfficiencyResponse {
    (|| {
        let snap = data_processing::snapshot(&filtered(frame, p)?)?;
        let (qualifying, median_incidence, median_cfr) = analytics::efficiency_matrix(&snap)?;
        Ok(EfficiencyResponse {
            data: SnapshotRow::from_frame(&qualifying)?,
            median_incidence_100k: median_incidence,
            median_case_fatality_pct: median_cfr,
        })
    })()
    .unwrap_or_else(|e| {
        degraded(
            "efficiency",
            e,
            EfficiencyResponse {
                data: Vec::new(),
                median_incidence_100k: None,
                median_case_fatality_pct: None,
            },
        )
    })
}

fn health_spend_payload(frame: &DataFrame, p: &FilterParameters) -> TableResponse<SnapshotRow> {
    (|| {
        let snap = data_processing::snapshot(&filtered(frame, p)?)?;
        let reported = analytics::health_spend_scatter(&snap)?;
        Ok(TableResponse::new(SnapshotRow::from_frame(&reported)?))
    })()
    .unwrap_or_else(|e| degraded("health-spend", e, TableResponse::empty()))
}

/// One country's (filter-respecting) snapshot against global means taken
/// over the unfiltered table, mirroring how the comparison bars read.
fn world_payload(frame: &DataFrame, p: &FilterParameters) -> WorldComparison {
    let selection = params::country_selection(p);
    let country = match &selection {
        CountrySelection::One(name) => name.clone(),
        CountrySelection::Many(names) if names.len() == 1 => names[0].clone(),
        _ => String::new(),
    };
    (|| {
        let world = analytics::world_averages(&data_processing::snapshot(frame)?)?;
        let snapshot = if country.is_empty() {
            None
        } else {
            let (start, end) = params::date_window(p);
            let data = filtering::apply_filters(
                frame,
                &CountrySelection::One(country.clone()),
                start,
                end,
            )?;
            let snap = data_processing::snapshot(&data)?;
            SnapshotRow::from_frame(&snap)?.into_iter().next()
        };
        Ok(WorldComparison {
            country: country.clone(),
            snapshot,
            world,
        })
    })()
    .unwrap_or_else(|e| {
        degraded(
            "world",
            e,
            WorldComparison {
                country,
                snapshot: None,
                world: Default::default(),
            },
        )
    })
}
