//! ERP connection configuration

use crate::{ErpError, ErpResult};

/// ERP connection configuration
///
/// # Environment variables
///
/// | Variable | Purpose |
/// |----------|---------|
/// | ODOO_DOMAIN | ERP host (RPC and reference-data endpoints) |
/// | ODOO_DB | database name |
/// | ODOO_USER_ID | RPC user id |
/// | ODOO_PASSWORD | RPC password |
/// | ODOO_ACCESS_KEY | reference-data endpoint key |
#[derive(Debug, Clone)]
pub struct ErpConfig {
    /// ERP host, e.g. "erp.example.com"
    pub domain: String,
    /// Database name
    pub database: String,
    /// RPC user id (also used as the JSON-RPC envelope id)
    pub user_id: String,
    /// RPC password
    pub password: String,
    /// Access key for the reference-data snapshot endpoint
    pub access_key: String,
}

impl ErpConfig {
    /// Load from environment variables.
    ///
    /// The RPC credentials are required; the access key is only needed
    /// when the reference-data manager is used and is validated there.
    pub fn from_env() -> ErpResult<Self> {
        Ok(Self {
            domain: require("ODOO_DOMAIN")?,
            database: require("ODOO_DB")?,
            user_id: require("ODOO_USER_ID")?,
            password: require("ODOO_PASSWORD")?,
            access_key: std::env::var("ODOO_ACCESS_KEY").unwrap_or_default(),
        })
    }

    /// JSON-RPC endpoint URL.
    pub fn rpc_url(&self) -> String {
        format!("https://{}/jsonrpc", self.domain)
    }

    /// Reference-data snapshot endpoint URL.
    pub fn reference_data_url(&self) -> String {
        format!("https://{}/website/action/shopify-master-data", self.domain)
    }

    pub(crate) fn require_access_key(&self) -> ErpResult<&str> {
        if self.access_key.is_empty() {
            return Err(ErpError::Configuration("ODOO_ACCESS_KEY"));
        }
        Ok(&self.access_key)
    }
}

fn require(name: &'static str) -> ErpResult<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ErpError::Configuration(name)),
    }
}
