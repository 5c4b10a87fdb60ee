use crate::ConfigError;

/// Runtime configuration, loaded once at startup from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres connection string. Optional at load time; required the
    /// moment database writes are requested.
    pub database_url: Option<String>,
    /// Informational only; `valid_date` is a plain calendar date and no
    /// time-of-day is ever stored.
    pub timezone: String,
    pub log_level: String,
    /// Per-request timeout applied by the shared HTTP client.
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl AppConfig {
    /// The database URL, or a [`ConfigError`] when it was never configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] for `DATABASE_URL`.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))
    }
}
