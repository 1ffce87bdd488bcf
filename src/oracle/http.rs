//! HTTP client for the similarity oracle service.
//!
//! Posts the batch request as JSON to `{base_url}/analyze/similarity`. The
//! request is bounded by a single overall timeout and never retried.

use std::time::Duration;

use reqwest::blocking::Client;

use super::{OracleError, OracleRequest, OracleResponse, SimilarityOracle};

/// Path of the batch similarity endpoint, relative to the base URL.
pub const SIMILARITY_ENDPOINT: &str = "/analyze/similarity";

/// Similarity oracle reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSimilarityOracle {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpSimilarityOracle {
    /// Create a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError::Unavailable`] if the HTTP client cannot be
    /// constructed (e.g. TLS backend initialization failure).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Unavailable(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), SIMILARITY_ENDPOINT),
            timeout,
        })
    }

    /// Full URL requests are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Configured request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn classify(&self, error: &reqwest::Error) -> OracleError {
        if error.is_timeout() {
            OracleError::Timeout(format!("no response within {:?}", self.timeout))
        } else if error.is_decode() {
            OracleError::Malformed(error.to_string())
        } else {
            OracleError::Unavailable(error.to_string())
        }
    }
}

impl SimilarityOracle for HttpSimilarityOracle {
    fn find_similar(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        log::debug!(
            "Posting {} files to similarity oracle at {}",
            request.files.len(),
            self.endpoint
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .map_err(|e| self.classify(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(OracleError::Unavailable(format!("HTTP {status}: {body}")));
        }

        let body = response.text().map_err(|e| self.classify(&e))?;
        serde_json::from_str(&body).map_err(|e| OracleError::Malformed(e.to_string()))
    }
}
