//! The raw table's column names. The Spanish names are the wire format of
//! the input file and are kept verbatim in the in-memory frame; derived
//! frames use this crate's own (English) vocabulary.

/// Country name.
pub const PAIS: &str = "pais";
/// Observation date.
pub const FECHA: &str = "fecha";
/// 3-letter country code.
pub const ISO3C: &str = "iso3c";

/// Cumulative confirmed cases.
pub const CONFIRMADOS: &str = "confirmados";
/// Cumulative deaths.
pub const MUERTES: &str = "muertes";
/// Cumulative incidence per 100k inhabitants.
pub const IA_100K: &str = "IA_100k";
/// Mortality rate per 100k inhabitants.
pub const TASA_MORTALIDAD_100K: &str = "tasa_mortalidad_100k";
/// Case-fatality rate, percent.
pub const LETALIDAD_CFR_PCT: &str = "letalidad_CFR_pct";
/// New confirmed cases that day.
pub const CONFIRMADOS_DIA: &str = "confirmados_dia";
/// New deaths that day.
pub const MUERTES_DIA: &str = "muertes_dia";
/// GDP per capita (2019).
pub const PIB_PER_CAPITA: &str = "pib_per_capita_2019";
/// Health expenditure as % of GDP.
pub const GASTO_SALUD_PIB: &str = "gasto_salud_pib";
/// Population.
pub const POBLACION: &str = "poblacion";

/// Every column subject to numeric coercion. Cells in these columns that
/// fail to parse become 0.0; other columns in the file are ignored.
pub const NUMERIC_COLUMNS: [&str; 10] = [
    CONFIRMADOS,
    MUERTES,
    IA_100K,
    TASA_MORTALIDAD_100K,
    LETALIDAD_CFR_PCT,
    CONFIRMADOS_DIA,
    MUERTES_DIA,
    PIB_PER_CAPITA,
    GASTO_SALUD_PIB,
    POBLACION,
];
