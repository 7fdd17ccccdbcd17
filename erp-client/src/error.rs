//! ERP client error types

use thiserror::Error;

/// ERP client error type
#[derive(Debug, Error)]
pub enum ErpError {
    /// Required connection credentials are missing
    #[error("incomplete ERP configuration: missing {0}")]
    Configuration(&'static str),

    /// Transport failure or non-success response from the ERP; the raw
    /// body is preserved for diagnosis
    #[error("ERP RPC error ({status}): {body}")]
    Remote { status: u16, body: String },

    /// Response body did not match the expected shape
    #[error("invalid ERP response: {0}")]
    InvalidResponse(String),

    /// Search expected exactly one result, none received
    #[error("search on {model} expected exactly 1 result, 0 received")]
    NotFound { model: String },

    /// Search expected at most one result, several received
    #[error("search on {model} expected at most 1 result, {found} received")]
    Ambiguous { model: String, found: usize },

    /// External id missing the `module.name` separator
    #[error("invalid external id: {0}")]
    InvalidXid(String),

    /// Mapping row points at a different model than requested
    #[error("model mismatch for external id {xid}: expected {expected}, got {found}")]
    ModelMismatch {
        xid: String,
        expected: String,
        found: String,
    },

    /// Reference-data snapshot unavailable (load failed, possibly inside
    /// the retry cooldown)
    #[error("reference data unavailable: {0}")]
    ReferenceData(String),

    /// A compensating delete issued after a partial failure itself failed;
    /// the record state is unknown
    #[error("{original}; compensating delete also failed: {rollback}")]
    Compensation {
        original: Box<ErpError>,
        rollback: String,
    },

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for ERP client operations
pub type ErpResult<T> = Result<T, ErpError>;
