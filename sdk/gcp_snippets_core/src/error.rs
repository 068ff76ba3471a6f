use thiserror::Error;

/// Errors that can occur when calling Google Cloud APIs.
#[derive(Error, Debug)]
pub enum GcpError {
    /// The request failed with an HTTP error that carried no Google error envelope.
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// The API returned a Google error envelope.
    ///
    /// `code` is the canonical status name (`NOT_FOUND`, `ABORTED`, ...).
    #[error("API error ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// Authentication failed or no credential is available.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A payload could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP request failed at the transport level.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint URL is invalid.
    #[error("Invalid endpoint URL: {message}")]
    InvalidEndpoint {
        message: String,
        #[source]
        source: Option<url::ParseError>,
    },

    /// A required configuration value is missing.
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    /// A request or argument failed validation before being sent.
    #[error("Invalid request: {0}")]
    Builder(String),

    /// A transaction body gave up; the transaction is rolled back.
    #[error("Transaction aborted: {0}")]
    Aborted(String),

    /// A local file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GcpError {
    /// Create a [`GcpError::Http`] error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Create a [`GcpError::InvalidEndpoint`] error wrapping a URL parse failure.
    pub fn invalid_endpoint_with_source(message: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidEndpoint {
            message: format!("{}: {source}", message.into()),
            source: Some(source),
        }
    }

    /// The canonical status name of an API error, if this is one.
    pub fn api_code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether the server rejected the call because of contention (`ABORTED`).
    pub fn is_aborted_by_server(&self) -> bool {
        self.api_code() == Some("ABORTED")
    }

    /// Whether the server reported that the target does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Api { code, status, .. } => code == "NOT_FOUND" || *status == 404,
            Self::Http { status, .. } => *status == 404,
            _ => false,
        }
    }
}

/// Result type alias for Google Cloud operations.
pub type GcpResult<T> = std::result::Result<T, GcpError>;
