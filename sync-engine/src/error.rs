//! Sync failure taxonomy
//!
//! Lookup and validation failures abort before any write; partial-commit
//! failures report the full damage; compensation failures are surfaced
//! distinctly because they leave unknown remote state.

use thiserror::Error;

use commerce_client::CommerceError;
use erp_client::ErpError;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Source global id did not match the expected shape
    #[error("invalid source id: {0}")]
    InvalidSourceId(String),

    /// A referenced entity (customer, product, tax, carrier, address)
    /// could not be resolved
    #[error("lookup failed: {0}")]
    Lookup(String),

    /// Required business fields missing before a write
    #[error("validation failed: {0}")]
    Validation(String),

    /// One or more line creations failed after the header commit. For a
    /// newly created order the header was rolled back; an existing header
    /// remains.
    #[error("could not sync all lines for order {order_xid}: {}", failures.join("; "))]
    PartialSync {
        order_xid: String,
        failures: Vec<String>,
        rolled_back: bool,
    },

    /// The post-creation confirmation invariant broke; the header was
    /// rolled back
    #[error("order confirmation failed: {0}")]
    Confirmation(String),

    /// A compensating delete after a partial failure itself failed
    #[error("{original}; compensating delete also failed: {rollback}")]
    Compensation {
        original: Box<SyncError>,
        rollback: String,
    },

    #[error(transparent)]
    Erp(#[from] ErpError),

    #[error(transparent)]
    Commerce(#[from] CommerceError),
}

impl SyncError {
    /// HTTP-style status bucket for the transport boundary: caller
    /// mistakes map to the 400 class, everything else to the 500 class.
    pub fn status_class(&self) -> u16 {
        match self {
            SyncError::InvalidSourceId(_) | SyncError::Lookup(_) | SyncError::Validation(_) => 400,
            _ => 500,
        }
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
