use crate::error::{GcpError, GcpResult};
use secrecy::{ExposeSecret, SecretString};

/// Environment variable holding an API key.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Environment variable holding an OAuth 2.0 access token.
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Credential types supported by the snippet clients.
#[derive(Clone)]
pub enum GcpCredential {
    /// API key, sent as the `x-goog-api-key` header.
    ApiKey(SecretString),

    /// OAuth 2.0 access token (for example from `gcloud auth print-access-token`),
    /// sent as `Authorization: Bearer <token>`.
    AccessToken(SecretString),

    /// Fixed `Bearer owner` token accepted by the local Firestore emulator.
    Emulator,
}

impl GcpCredential {
    /// Create a credential from the environment.
    ///
    /// Checks `GOOGLE_API_KEY` first, then `GOOGLE_OAUTH_ACCESS_TOKEN`.
    pub fn from_env() -> GcpResult<Self> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.is_empty() => return Ok(Self::ApiKey(SecretString::from(key))),
            _ => {}
        }
        match std::env::var(ACCESS_TOKEN_ENV) {
            Ok(token) if !token.is_empty() => Ok(Self::AccessToken(SecretString::from(token))),
            _ => Err(GcpError::Auth(format!(
                "no credential found. Set {API_KEY_ENV} or {ACCESS_TOKEN_ENV}."
            ))),
        }
    }

    /// Create an API key credential.
    pub fn api_key(key: impl Into<String>) -> Self {
        Self::ApiKey(SecretString::from(key.into()))
    }

    /// Create an access token credential.
    pub fn access_token(token: impl Into<String>) -> Self {
        Self::AccessToken(SecretString::from(token.into()))
    }

    /// Create the credential used against the Firestore emulator.
    pub fn emulator() -> Self {
        Self::Emulator
    }

    /// Resolve the credential to the header name and value to send.
    pub fn resolve(&self) -> GcpResult<(&'static str, String)> {
        match self {
            Self::ApiKey(key) => {
                let key = key.expose_secret();
                if key.is_empty() {
                    return Err(GcpError::Auth("API key is empty".into()));
                }
                Ok(("x-goog-api-key", key.to_string()))
            }
            Self::AccessToken(token) => {
                let token = token.expose_secret();
                if token.is_empty() {
                    return Err(GcpError::Auth("access token is empty".into()));
                }
                Ok(("Authorization", format!("Bearer {token}")))
            }
            Self::Emulator => Ok(("Authorization", "Bearer owner".to_string())),
        }
    }
}

impl std::fmt::Debug for GcpCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => write!(f, "GcpCredential::ApiKey(****)"),
            Self::AccessToken(_) => write!(f, "GcpCredential::AccessToken(****)"),
            Self::Emulator => write!(f, "GcpCredential::Emulator"),
        }
    }
}
