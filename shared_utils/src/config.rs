use thiserror::Error;

use crate::env::{MissingEnvVarError, get_env_var, get_env_var_or};

/// Errors related to application configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable required by the application is not set.
    #[error(transparent)]
    MissingEnvVar(#[from] MissingEnvVarError),
}

/// Runtime settings shared by the ingestion and store crates.
///
/// Loaded once from the environment at process start; the only required
/// variable is `DATABASE_URL`, everything else has a sensible default.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database path/URL (`DATABASE_URL`, required).
    pub database_url: String,
    /// Directory where downloaded filings and extracted artifacts land
    /// (`FUND_DATA_DIR`, defaults to `data`).
    pub data_dir: String,
    /// EDGAR-compliant user agent, "Company Name email@domain.com"
    /// (`SEC_USER_AGENT`).
    pub sec_user_agent: String,
    /// Optional OpenFIGI API key for elevated rate limits
    /// (`OPENFIGI_API_KEY`).
    pub openfigi_api_key: Option<String>,
}

impl AppConfig {
    /// Loads settings from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: get_env_var("DATABASE_URL")?,
            data_dir: get_env_var_or("FUND_DATA_DIR", "data"),
            sec_user_agent: get_env_var_or(
                "SEC_USER_AGENT",
                "FundHoldings Research admin@fundholdings.dev",
            ),
            openfigi_api_key: std::env::var("OPENFIGI_API_KEY").ok(),
        })
    }
}
