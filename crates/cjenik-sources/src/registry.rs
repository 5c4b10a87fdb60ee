//! The chain-source contract and the fixed startup registry.

use chrono::NaiveDate;

use cjenik_core::{AppConfig, Store};

use crate::client::HttpClient;
use crate::{JadrankaTrgovinaSource, SourceError, ZabacSource};

/// One retail chain's price publication, behind a uniform contract.
///
/// `fetch` may perform arbitrary HTTP against the chain's web surface but
/// must be deterministic for a given (date, upstream snapshot). A chain with
/// nothing published for the date returns an empty list; the driver never
/// retries and treats errors the same as empty results.
#[async_trait::async_trait]
pub trait ChainSource: Send + Sync {
    /// Lowercase registry slug, `[a-z0-9_]+`.
    fn slug(&self) -> &'static str;

    /// Fetch all stores with their products for `date`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the chain's surface is unreachable or
    /// unparsable; partial per-store failures are handled internally.
    async fn fetch(&self, date: NaiveDate) -> Result<Vec<Store>, SourceError>;
}

/// Build the registry of all known chain sources.
///
/// Called once at startup; the set is fixed for the run.
///
/// # Errors
///
/// Returns [`SourceError::Http`] if the shared HTTP client cannot be built.
pub fn registry(config: &AppConfig) -> Result<Vec<Box<dyn ChainSource>>, SourceError> {
    let client = HttpClient::new(config.http_timeout_secs, &config.user_agent)?;
    Ok(vec![
        Box::new(JadrankaTrgovinaSource::new(client.clone())),
        Box::new(ZabacSource::new(client)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: None,
            timezone: "Europe/Zagreb".to_string(),
            log_level: "info".to_string(),
            http_timeout_secs: 5,
            user_agent: "cjenik-test/0.1".to_string(),
            db_max_connections: 1,
            db_min_connections: 1,
            db_acquire_timeout_secs: 1,
        }
    }

    #[test]
    fn registry_slugs_are_unique_lowercase() {
        let sources = registry(&test_config()).expect("registry builds");
        let slugs: Vec<&str> = sources.iter().map(|s| s.slug()).collect();
        assert!(!slugs.is_empty());
        for slug in &slugs {
            assert!(
                slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'),
                "bad slug: {slug}"
            );
        }
        let mut deduped = slugs.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), slugs.len(), "duplicate slugs registered");
    }
}
