//! JSON-RPC transport
//!
//! The wire seam is a single trait so tests and embedders can substitute
//! an in-memory endpoint for the HTTP one.

use async_trait::async_trait;
use serde_json::Value;

use crate::{ErpError, ErpResult};

/// RPC call timeout (seconds)
pub const RPC_TIMEOUT_SECS: u64 = 30;

/// Transport seam for the JSON-RPC endpoint
#[async_trait]
pub trait ErpTransport: Send + Sync {
    /// POST a JSON-RPC envelope and return the decoded response body.
    async fn call(&self, url: &str, body: Value) -> ErpResult<Value>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> ErpResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(RPC_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ErpTransport for HttpTransport {
    async fn call(&self, url: &str, body: Value) -> ErpResult<Value> {
        let response = self.client.post(url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ErpError::Remote {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            ErpError::InvalidResponse(format!("invalid JSON from ERP: {e}: {text}"))
        })
    }
}
