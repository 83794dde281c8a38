//! Error types for the Sakura Cloud API client.

use thiserror::Error;

use crate::api::ProviderError;
use crate::config::ConfigError;

/// Errors raised by the Sakura Cloud API client.
#[derive(Debug, Error)]
pub enum SakuraCloudError {
    /// Raised when the provider configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Raised when the HTTP client cannot be built or a request fails in
    /// transit.
    #[error("sakura cloud request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Raised when the API root and path do not form a valid URL.
    #[error("invalid request url {url}: {message}")]
    InvalidUrl {
        /// URL that failed to parse.
        url: String,
        /// Parser message.
        message: String,
    },
    /// Raised when the API answers with a non-success status.
    #[error("sakura cloud {endpoint} returned {status}: {body}")]
    Status {
        /// Operation being performed.
        endpoint: &'static str,
        /// HTTP status code.
        status: reqwest::StatusCode,
        /// Response body, usually a JSON error document.
        body: String,
    },
    /// Raised when a request or response body cannot be (de)serialised.
    #[error("sakura cloud {endpoint} payload error: {message}")]
    Decode {
        /// Operation being performed.
        endpoint: &'static str,
        /// Serde message.
        message: String,
    },
    /// Raised when a lookup that must find exactly one resource finds none.
    #[error("{kind} matching {key} not found in zone {zone}")]
    NotFound {
        /// Resource kind.
        kind: &'static str,
        /// Search key.
        key: String,
        /// Zone searched.
        zone: String,
    },
    /// Raised when the API returns an address that does not parse.
    #[error("sakura cloud returned invalid address {value:?}")]
    InvalidAddress {
        /// Raw value.
        value: String,
    },
}

impl ProviderError for SakuraCloudError {
    fn is_not_found(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status == reqwest::StatusCode::NOT_FOUND,
            Self::NotFound { .. } => true,
            _ => false,
        }
    }
}
