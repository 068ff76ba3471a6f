//! HTTP client for Google Cloud REST APIs.
//!
//! This module provides [`GcpClient`], the transport shared by the Vision and
//! Firestore crates. The client handles credentials, timeouts, retries on
//! transient errors, and mapping of Google error envelopes to [`GcpError`].
//!
//! # Examples
//!
//! ## Using an API key
//! ```rust,no_run
//! use gcp_snippets_core::client::GcpClient;
//! use gcp_snippets_core::auth::GcpCredential;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GcpClient::builder()
//!     .endpoint("https://vision.googleapis.com")
//!     .credential(GcpCredential::api_key("your-key"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Using an access token
//! ```rust,no_run
//! use gcp_snippets_core::client::GcpClient;
//! use gcp_snippets_core::auth::GcpCredential;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GcpClient::builder()
//!     .endpoint("https://firestore.googleapis.com")
//!     .credential(GcpCredential::access_token("ya29.your-token"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::auth::GcpCredential;
use crate::error::{GcpError, GcpResult};
use reqwest::{Client as HttpClient, Method};
use url::Url;

use std::time::Duration;

/// Default connection timeout (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default read/response timeout (60 seconds).
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Determines if an HTTP status code represents a retriable error.
///
/// Retriable errors are transient server-side issues that may succeed on retry:
/// - 429 Too Many Requests (quota)
/// - 500 Internal Server Error
/// - 502 Bad Gateway
/// - 503 Service Unavailable
/// - 504 Gateway Timeout
#[inline]
pub fn is_retriable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Configuration for automatic retry behavior on transient errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not counting the initial request).
    pub max_retries: u32,
    /// Initial backoff duration before the first retry.
    /// Subsequent retries use exponential backoff (2^attempt * initial_backoff).
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Backoff before retry number `attempt` (0-based), with +/-25% jitter.
    fn backoff(&self, attempt: u32) -> Duration {
        let base_backoff = self.initial_backoff * 2_u32.pow(attempt);
        let jitter = 0.75 + fastrand::f64() * 0.5;
        base_backoff.mul_f64(jitter)
    }
}

/// The base client for calling Google Cloud REST APIs.
///
/// Used by the service crates (`gcp_snippets_vision`, `gcp_snippets_firestore`)
/// to issue requests. The client is cheaply cloneable and can be shared across threads.
#[derive(Debug, Clone)]
pub struct GcpClient {
    pub(crate) http: HttpClient,
    pub(crate) endpoint: Url,
    pub(crate) credential: GcpCredential,
    pub(crate) retry_policy: RetryPolicy,
}

/// Builder for constructing a [`GcpClient`].
///
/// Use [`GcpClient::builder()`] to create a new builder.
#[derive(Debug, Default)]
pub struct GcpClientBuilder {
    endpoint: Option<String>,
    credential: Option<GcpCredential>,
    http_client: Option<HttpClient>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    retry_policy: Option<RetryPolicy>,
}

impl GcpClient {
    /// Create a new builder for configuring a `GcpClient`.
    pub fn builder() -> GcpClientBuilder {
        GcpClientBuilder::default()
    }

    /// Get the base endpoint URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Get the retry policy configuration.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Build a full URL for an API path.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be joined to the endpoint URL.
    pub fn url(&self, path: &str) -> GcpResult<Url> {
        self.endpoint
            .join(path)
            .map_err(|e| GcpError::invalid_endpoint_with_source("failed to construct URL", e))
    }

    /// Send a GET request with automatic retry on transient errors.
    pub async fn get(&self, path: &str) -> GcpResult<reqwest::Response> {
        let url = self.url(path)?;
        self.send::<()>(Method::GET, url, None).await
    }

    /// Send a GET request with extra query parameters.
    ///
    /// Parameters are percent-encoded, so opaque values such as base64
    /// transaction ids can be passed as-is.
    pub async fn get_with_query(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> GcpResult<reqwest::Response> {
        let mut url = self.url(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        self.send::<()>(Method::GET, url, None).await
    }

    /// Send a POST request with a JSON body, retrying on transient errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential cannot be resolved, serialization fails,
    /// the request fails after all retries, or the server returns a non-retriable error.
    pub async fn post<T: serde::Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> GcpResult<reqwest::Response> {
        let url = self.url(path)?;
        self.send(Method::POST, url, Some(body)).await
    }

    /// Send a DELETE request with automatic retry on transient errors.
    pub async fn delete(&self, path: &str) -> GcpResult<reqwest::Response> {
        let url = self.url(path)?;
        self.send::<()>(Method::DELETE, url, None).await
    }

    async fn send<T: serde::Serialize>(
        &self,
        method: Method,
        url: Url,
        body: Option<&T>,
    ) -> GcpResult<reqwest::Response> {
        let (auth_header, auth_value) = self.credential.resolve()?;

        let mut attempt = 0;
        loop {
            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .header(auth_header, &auth_value);
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send().await?;

            if response.status().is_success() {
                return Ok(response);
            }

            let status = response.status().as_u16();
            if !is_retriable_status(status) || attempt >= self.retry_policy.max_retries {
                return Self::check_response(response).await;
            }

            let backoff = self.retry_policy.backoff(attempt);
            tracing::debug!(status, attempt, ?backoff, "retrying transient error");
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    /// Maximum length for error messages to prevent sensitive data leaks.
    const MAX_ERROR_MESSAGE_LEN: usize = 1000;

    /// Replace every token that follows `marker` with `[REDACTED]`.
    ///
    /// When `keep_marker` is false the marker itself is redacted too.
    fn redact_after(result: &mut String, marker: &str, keep_marker: bool) {
        const REDACTED: &str = "[REDACTED]";
        let is_delimiter = |c: char| c.is_whitespace() || c == '"' || c == '\'' || c == ',';

        let mut search_start = 0;
        while let Some(relative_pos) = result[search_start..].find(marker) {
            let marker_pos = search_start + relative_pos;
            let token_start = marker_pos + marker.len();

            if result[token_start..].starts_with(REDACTED) {
                search_start = token_start + REDACTED.len();
                continue;
            }

            let token_end = result[token_start..]
                .find(is_delimiter)
                .map(|pos| token_start + pos)
                .unwrap_or(result.len());

            if token_end == token_start {
                search_start = token_start;
                continue;
            }

            let replace_from = if keep_marker { token_start } else { marker_pos };
            result.replace_range(replace_from..token_end, REDACTED);
            search_start = replace_from + REDACTED.len();
        }
    }

    /// Sanitize error messages by removing credentials.
    ///
    /// Covers bearer tokens, Google API keys (`AIza...`) and OAuth access tokens (`ya29.`).
    pub(crate) fn sanitize_error_message(msg: &str) -> String {
        let mut result = msg.to_string();
        Self::redact_after(&mut result, "Bearer ", true);
        Self::redact_after(&mut result, "AIza", false);
        Self::redact_after(&mut result, "ya29.", false);
        result
    }

    /// Truncate a message if it exceeds the maximum length.
    /// Also sanitizes sensitive data before truncating.
    pub(crate) fn truncate_message(msg: &str) -> String {
        let sanitized = Self::sanitize_error_message(msg);

        if sanitized.len() > Self::MAX_ERROR_MESSAGE_LEN {
            let mut cut = Self::MAX_ERROR_MESSAGE_LEN;
            while !sanitized.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}... (truncated)", &sanitized[..cut])
        } else {
            sanitized
        }
    }

    /// Map a Google error envelope to [`GcpError::Api`].
    ///
    /// Accepts both `{"error": {...}}` and the streamed `[{"error": {...}}]` form.
    fn parse_error_envelope(status: u16, body: &str) -> Option<GcpError> {
        let value = serde_json::from_str::<serde_json::Value>(body).ok()?;
        let envelope = match &value {
            serde_json::Value::Array(items) => items.first()?,
            other => other,
        };
        let err_obj = envelope.get("error")?;

        let code = err_obj
            .get("status")
            .and_then(|s| s.as_str())
            .map(str::to_string)
            .or_else(|| {
                err_obj.get("code").map(|c| match c.as_str() {
                    Some(s) => s.to_string(),
                    None => c.to_string(),
                })
            })
            .unwrap_or_else(|| "UNKNOWN".to_string());

        let message = err_obj
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or(body);

        Some(GcpError::Api {
            status,
            code,
            message: Self::truncate_message(message),
        })
    }

    /// Check the response status and return an error if not successful.
    async fn check_response(response: reqwest::Response) -> GcpResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        if let Some(err) = Self::parse_error_envelope(status, &body) {
            return Err(err);
        }

        Err(GcpError::http(status, Self::truncate_message(&body)))
    }
}

impl GcpClientBuilder {
    /// Set the service endpoint URL, e.g. `https://firestore.googleapis.com`.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the credential to use for authentication.
    ///
    /// If not set, the builder uses [`GcpCredential::from_env()`].
    pub fn credential(mut self, credential: GcpCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Set a custom HTTP client.
    ///
    /// **Note:** If you provide a custom HTTP client, any timeout configuration
    /// on this builder is ignored.
    pub fn http_client(mut self, client: HttpClient) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the read timeout, covering the whole request/response cycle.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the retry policy for transient errors.
    ///
    /// Defaults to 3 retries with 500ms initial backoff.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Build the `GcpClient`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No endpoint is provided
    /// - The endpoint URL is invalid
    /// - No credential is provided and none is found in the environment
    /// - The underlying HTTP client cannot be constructed
    pub fn build(self) -> GcpResult<GcpClient> {
        let http = match self.http_client {
            Some(http) => http,
            None => reqwest::Client::builder()
                .connect_timeout(self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT))
                .timeout(self.read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT))
                .build()?,
        };

        let endpoint_str = self
            .endpoint
            .ok_or_else(|| GcpError::MissingConfig("endpoint is required".into()))?;

        let endpoint = Url::parse(&endpoint_str)
            .map_err(|e| GcpError::invalid_endpoint_with_source("invalid endpoint URL", e))?;

        let credential = match self.credential {
            Some(credential) => credential,
            None => GcpCredential::from_env()?,
        };

        Ok(GcpClient {
            http,
            endpoint,
            credential,
            retry_policy: self.retry_policy.unwrap_or_default(),
        })
    }
}

/// Helpers for sibling crates' tests.
#[cfg(feature = "test-support")]
pub mod test_support {
    use super::{GcpClient, RetryPolicy};
    use crate::auth::GcpCredential;
    use wiremock::MockServer;

    /// Test API key (not a real key).
    pub const TEST_API_KEY: &str = "test-api-key";

    /// Create a client pointed at a mock server that never retries.
    pub fn mock_client(server: &MockServer) -> GcpClient {
        GcpClient::builder()
            .endpoint(server.uri())
            .credential(GcpCredential::api_key(TEST_API_KEY))
            .retry_policy(RetryPolicy::none())
            .build()
            .expect("should build client")
    }
}
