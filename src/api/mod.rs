pub mod models;
pub mod params;
