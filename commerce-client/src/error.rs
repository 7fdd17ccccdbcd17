//! Commerce client error types

use thiserror::Error;

/// Commerce client error type
#[derive(Debug, Error)]
pub enum CommerceError {
    /// Storefront credentials missing for the requested key
    #[error("missing storefront configuration for key {0}")]
    Configuration(String),

    /// Transport failure or non-success status
    #[error("commerce API error ({status}): {body}")]
    Remote { status: u16, body: String },

    /// Response carried a top-level `errors` member
    #[error("errors in commerce API response: {0}")]
    GraphQl(String),

    /// Response carried no usable `data` object
    #[error("data object not found in commerce API response: {0}")]
    MissingData(String),

    /// The query's result key was absent from `data`
    #[error("result key `{key}` not found in commerce API response: {body}")]
    MissingResultKey { key: String, body: String },

    /// The query's result key was present but null
    #[error("empty response for result key `{key}`")]
    EmptyResult { key: String },

    /// Result value did not decode into the typed payload
    #[error("could not decode commerce API result: {0}")]
    Decode(String),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for commerce client operations
pub type CommerceResult<T> = Result<T, CommerceError>;
