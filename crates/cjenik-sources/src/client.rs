//! Shared HTTP client for chain sources.

use std::time::Duration;

use reqwest::Client;

use crate::SourceError;

/// Thin wrapper over [`reqwest::Client`] with the timeout and `User-Agent`
/// every chain source shares, plus text decoding that tolerates the legacy
/// windows-1250 encoding some chains still publish in.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with the configured per-request timeout and UA.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// Fetches `url` and returns the decoded body.
    ///
    /// Bodies that are not valid UTF-8 are decoded as windows-1250, the
    /// encoding Croatian chains used before price transparency tooling
    /// standardized on UTF-8.
    ///
    /// # Errors
    ///
    /// - [`SourceError::NotFound`] — HTTP 404.
    /// - [`SourceError::UnexpectedStatus`] — any other non-2xx status.
    /// - [`SourceError::Http`] — network failure or body read error.
    pub async fn fetch_text(&self, url: &str) -> Result<String, SourceError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(SourceError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await?;
        match std::str::from_utf8(&bytes) {
            Ok(text) => Ok(text.to_string()),
            Err(_) => {
                let (decoded, _, had_errors) = encoding_rs::WINDOWS_1250.decode(&bytes);
                if had_errors {
                    tracing::warn!(url, "windows-1250 fallback decode replaced some bytes");
                }
                Ok(decoded.into_owned())
            }
        }
    }
}
