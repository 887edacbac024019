use std::path::PathBuf;

/// Startup-time failures. Anything that happens after the raw table is in
/// memory degrades to an empty result at the serving boundary instead of
/// surfacing through this type.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("failed to read input table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input table is not parseable as CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("input table is missing required column '{0}'")]
    MissingColumn(String),

    #[error("row {row}: unparseable date '{value}'")]
    InvalidDate { row: usize, value: String },

    #[error("input table contains no usable observations")]
    EmptyTable,

    #[error(transparent)]
    Polars(#[from] polars::prelude::PolarsError),
}
