//! Storefront configuration
//!
//! The platform runs one Admin API domain per storefront. Credentials are
//! keyed by a short storefront code and read from
//! `SHOPIFY_DOMAIN_<KEY>` / `SHOPIFY_ADMIN_API_ACCESS_TOKEN_<KEY>`.

use std::collections::HashMap;

use crate::{CommerceError, CommerceResult};

/// Admin API version segment
pub const API_VERSION: &str = "2025-04";

/// Credentials for one storefront
#[derive(Debug, Clone)]
pub struct Storefront {
    pub domain: String,
    pub access_token: String,
}

impl Storefront {
    /// Admin GraphQL endpoint URL.
    pub fn graphql_url(&self) -> String {
        format!("https://{}/admin/api/{API_VERSION}/graphql.json", self.domain)
    }
}

/// Storefront credential set
#[derive(Debug, Clone, Default)]
pub struct CommerceConfig {
    storefronts: HashMap<String, Storefront>,
}

impl CommerceConfig {
    /// Load credentials for the given storefront keys. Keys with missing
    /// variables are skipped; they fail at call time instead.
    pub fn from_env(keys: &[&str]) -> Self {
        let mut storefronts = HashMap::new();
        for key in keys {
            let domain = std::env::var(format!("SHOPIFY_DOMAIN_{key}")).unwrap_or_default();
            let access_token =
                std::env::var(format!("SHOPIFY_ADMIN_API_ACCESS_TOKEN_{key}")).unwrap_or_default();
            if !domain.is_empty() && !access_token.is_empty() {
                storefronts.insert(key.to_string(), Storefront { domain, access_token });
            }
        }
        Self { storefronts }
    }

    pub fn with_storefront(mut self, key: impl Into<String>, storefront: Storefront) -> Self {
        self.storefronts.insert(key.into(), storefront);
        self
    }

    pub fn storefront(&self, key: &str) -> CommerceResult<&Storefront> {
        self.storefronts
            .get(key)
            .ok_or_else(|| CommerceError::Configuration(key.to_string()))
    }
}
