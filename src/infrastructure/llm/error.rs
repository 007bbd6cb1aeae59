//! Typed errors for a single model invocation
//!
//! Carries enough structure (HTTP status, network error code) for the
//! resilience layer to classify failures without guessing from strings.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider answered with a non-success HTTP status
    #[error("{provider} API error: {status} {message}")]
    Http {
        provider: String,
        status: u16,
        message: String,
    },

    /// Connection-level failure before a response arrived
    #[error("{provider} network error: {message}")]
    Network {
        provider: String,
        /// Normalized code such as `ECONNRESET` or `ETIMEDOUT`
        code: Option<String>,
        message: String,
    },

    #[error("Request timeout after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Response arrived but did not have the expected shape
    #[error("{provider} returned an invalid response: {message}")]
    InvalidResponse { provider: String, message: String },

    #[error("Provider configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            ProviderError::Network { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Builds an HTTP error, preferring the provider's own error message
    pub fn from_http_status(provider: &str, status: reqwest::StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                value["error"]["message"]
                    .as_str()
                    .or_else(|| value["error"].as_str())
                    .map(str::to_string)
            })
            .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());

        ProviderError::Http {
            provider: provider.to_string(),
            status: status.as_u16(),
            message,
        }
    }

    /// Converts a transport error, mapping it onto a socket-style error code
    pub fn from_network_error(provider: &str, error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            return Self::from_http_status(provider, status, &error.to_string());
        }

        let detail = format!("{:?}", error).to_lowercase();
        let code = if error.is_timeout() {
            Some("ETIMEDOUT")
        } else if detail.contains("dns") || detail.contains("resolve") {
            Some("ENOTFOUND")
        } else if detail.contains("reset") {
            Some("ECONNRESET")
        } else if error.is_connect() {
            Some("ECONNREFUSED")
        } else {
            None
        };

        ProviderError::Network {
            provider: provider.to_string(),
            code: code.map(str::to_string),
            message: error.to_string(),
        }
    }

    pub fn invalid_response(provider: &str, message: impl Into<String>) -> Self {
        ProviderError::InvalidResponse {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}
