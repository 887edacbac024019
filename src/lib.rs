//! Aggregation pipeline for per-country pandemic indicator dashboards.
//!
//! A raw per-country/per-day table is loaded once at startup and held as
//! shared, read-only state. Every derived view — last-known snapshots,
//! weekly and monthly rollups, start/end comparison pairs, normalized
//! wave series — is recomputed from scratch on each filter change as a
//! pure function of the frame and the parameters. Two binaries sit on
//! top: a warp server exposing one endpoint per reducer, and a batch
//! exporter that serializes the full set of chart-ready tables.

pub mod api;
pub mod config;
pub mod core_logic;
pub mod error;
pub mod ingest;
