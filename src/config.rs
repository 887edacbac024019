//! Runtime configuration, read once at startup from the environment
//! (a `.env` file is honored when present).

use std::env;

/// Immutable configuration snapshot for either binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the raw observations CSV.
    pub data_path: String,

    /// Port the HTTP server binds to.
    pub port: u16,

    /// Output path for the static dataset bundle.
    pub export_path: String,
}

impl Config {
    /// Load from the environment with defaults. The port must parse if set.
    pub fn load() -> anyhow::Result<Config> {
        let data_path = env::var("DATA_PATH")
            .unwrap_or_else(|_| "panel_2020_paises_sin_nan_R_clean.csv".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8001".to_string())
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("PORT must be a number: {}", e))?;

        let export_path =
            env::var("EXPORT_PATH").unwrap_or_else(|_| "dashboard_data.json".to_string());

        Ok(Config {
            data_path,
            port,
            export_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        // Only exercised when the variables are unset, which is the
        // normal test environment.
        if env::var("PORT").is_err() && env::var("DATA_PATH").is_err() {
            let cfg = Config::load().unwrap();
            assert_eq!(cfg.port, 8001);
            assert_eq!(cfg.data_path, "panel_2020_paises_sin_nan_R_clean.csv");
        }
    }
}
