//! Batch export: compute every chart-ready table over the full raw table
//! and serialize one self-contained JSON bundle for the static dashboard
//! variant. Chart layout and HTML templating belong to the consumer; only
//! the data side is produced here.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::Context;
use chrono::Utc;
use dotenv::dotenv;
use polars::prelude::*;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use incidence_engine::api::models::{
    ComparisonRow, CountrySelection, Granularity, KpiSummary, NormalizedRow, PeakReport,
    PeriodRow, SnapshotRow, WorldAverages, WorldComparison,
};
use incidence_engine::api::params::fmt_compact;
use incidence_engine::config::Config;
use incidence_engine::core_logic::{analytics, data_processing, filtering, peaks};
use incidence_engine::ingest::catalog::{build_catalog, Catalog};
use incidence_engine::ingest::columns::IA_100K;
use incidence_engine::ingest::loader;

/// Seed sizes for the charts that ship with a default selection, matching
/// the interactive variant's initial widget state.
const DUMBBELL_DEFAULT: usize = 10;
const WAVE_DEFAULT: usize = 5;

#[derive(Serialize)]
struct WeeklySection {
    color_scale_max: f64,
    data: Vec<PeriodRow>,
}

#[derive(Serialize)]
struct ComparisonSection {
    countries: Vec<String>,
    data: Vec<ComparisonRow>,
}

#[derive(Serialize)]
struct NormalizedSection {
    /// Countries top to bottom: the selection order reversed, which is
    /// how the ridgeline assigns vertical offsets.
    stack_order: Vec<String>,
    data: Vec<NormalizedRow>,
}

#[derive(Serialize)]
struct CountryBundle {
    country: String,
    monthly: Vec<PeriodRow>,
    peaks: Option<PeakReport>,
    world: WorldComparison,
}

#[derive(Serialize)]
struct DashboardBundle {
    generated_at: String,
    catalog: Catalog,
    kpis: KpiSummary,
    snapshot: Vec<SnapshotRow>,
    rankings: Vec<SnapshotRow>,
    weekly: WeeklySection,
    comparison: ComparisonSection,
    normalized: NormalizedSection,
    per_country: Vec<CountryBundle>,
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    dotenv().ok();

    let cfg = Config::load()?;

    tracing::info!(path = %cfg.data_path, "loading raw observation table");
    let raw = loader::load_table(Path::new(&cfg.data_path))?;
    let catalog = build_catalog(&raw)?;
    tracing::info!(
        rows = catalog.rows,
        countries = catalog.countries.len(),
        "raw table loaded"
    );

    let snapshot_frame = data_processing::snapshot(&raw)?;
    let kpis = analytics::kpi_summary(&snapshot_frame)?;
    tracing::info!(
        confirmed = %fmt_compact(kpis.total_confirmed as f64),
        deaths = %fmt_compact(kpis.total_deaths as f64),
        "global totals"
    );
    let snapshot_rows = SnapshotRow::from_frame(&snapshot_frame)?;
    let rankings =
        SnapshotRow::from_frame(&analytics::top_countries(&snapshot_frame, DUMBBELL_DEFAULT)?)?;

    let weekly_frame = data_processing::period_rollup(&raw, Granularity::Weekly)?;
    let weekly = WeeklySection {
        color_scale_max: analytics::color_scale_cap(&weekly_frame)?,
        data: PeriodRow::from_frame(&weekly_frame, Granularity::Weekly)?,
    };

    let dumbbell: Vec<String> = catalog
        .countries
        .iter()
        .take(DUMBBELL_DEFAULT)
        .cloned()
        .collect();
    let comparison = {
        let data = filtering::apply_filters(
            &raw,
            &CountrySelection::Many(dumbbell.clone()),
            None,
            None,
        )?;
        let pairs = data_processing::comparison(&data, IA_100K)?;
        ComparisonSection {
            countries: dumbbell,
            data: ComparisonRow::from_frame(&pairs)?,
        }
    };

    let wave: Vec<String> = catalog.countries.iter().take(WAVE_DEFAULT).cloned().collect();
    let normalized = {
        let data =
            filtering::apply_filters(&raw, &CountrySelection::Many(wave.clone()), None, None)?;
        let weekly_selection = data_processing::period_rollup(&data, Granularity::Weekly)?;
        let series = data_processing::normalized_series(&weekly_selection)?;
        let mut stack_order = wave;
        stack_order.reverse();
        NormalizedSection {
            stack_order,
            data: NormalizedRow::from_frame(&series)?,
        }
    };

    let world = analytics::world_averages(&snapshot_frame)?;

    let pool = ThreadPoolBuilder::new()
        .stack_size(32 * 1024 * 1024) // 32 MB
        .build()?;
    let per_country: Vec<CountryBundle> = pool.install(|| {
        catalog
            .countries
            .par_iter()
            .map(|country| country_bundle(&raw, &snapshot_rows, &world, country))
            .collect()
    });
    tracing::info!(bundles = per_country.len(), "per-country bundles computed");

    let bundle = DashboardBundle {
        generated_at: Utc::now().to_rfc3339(),
        catalog,
        kpis,
        snapshot: snapshot_rows,
        rankings,
        weekly,
        comparison,
        normalized,
        per_country,
    };

    let file = File::create(&cfg.export_path)
        .with_context(|| format!("cannot create export file {}", cfg.export_path))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &bundle)?;
    tracing::info!(path = %cfg.export_path, "dashboard bundle written");

    Ok(())
}

/// Everything the per-country page needs. Failures degrade to an empty
/// bundle for that country; the export never aborts over one bad series.
fn country_bundle(
    raw: &DataFrame,
    snapshot_rows: &[SnapshotRow],
    world: &WorldAverages,
    country: &str,
) -> CountryBundle {
    let computed = (|| -> PolarsResult<(Vec<PeriodRow>, Option<PeakReport>)> {
        let data = filtering::apply_filters(
            raw,
            &CountrySelection::One(country.to_string()),
            None,
            None,
        )?;
        let monthly = data_processing::period_rollup(&data, Granularity::Monthly)?;
        let report = peaks::monthly_peaks(&monthly)?;
        Ok((PeriodRow::from_frame(&monthly, Granularity::Monthly)?, report))
    })();

    let (monthly, peak_report) = computed.unwrap_or_else(|e| {
        tracing::warn!(error = %e, country, "country bundle failed, emitting empty");
        (Vec::new(), None)
    });

    let snapshot = snapshot_rows
        .iter()
        .find(|row| row.country == country)
        .cloned();

    CountryBundle {
        country: country.to_string(),
        monthly,
        peaks: peak_report,
        world: WorldComparison {
            country: country.to_string(),
            snapshot,
            world: world.clone(),
        },
    }
}
