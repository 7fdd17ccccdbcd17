//! Admin GraphQL client
//!
//! The storefront is an explicit parameter on every call; nothing about
//! the target shop is ambient state.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::queries;
use crate::types::{Company, Customer, Order};
use crate::{CommerceConfig, CommerceError, CommerceResult};

/// GraphQL call timeout (seconds)
pub const QUERY_TIMEOUT_SECS: u64 = 30;

/// A logical query: the document plus the top-level `data` member that
/// carries its answer.
#[derive(Debug, Clone, Copy)]
pub struct QueryDescriptor {
    pub query: &'static str,
    pub result_key: &'static str,
}

/// Transport seam for the GraphQL endpoint
#[async_trait]
pub trait GraphQlTransport: Send + Sync {
    /// POST `{query, variables}` and return the decoded response body.
    async fn post(&self, url: &str, access_token: &str, body: Value) -> CommerceResult<Value>;
}

/// reqwest-backed transport
pub struct HttpGraphQlTransport {
    client: reqwest::Client,
}

impl HttpGraphQlTransport {
    pub fn new() -> CommerceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(QUERY_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl GraphQlTransport for HttpGraphQlTransport {
    async fn post(&self, url: &str, access_token: &str, body: Value) -> CommerceResult<Value> {
        let response = self
            .client
            .post(url)
            .header("X-Shopify-Access-Token", access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(CommerceError::Remote {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            CommerceError::MissingData(format!("invalid JSON from commerce API: {e}: {text}"))
        })
    }
}

/// Admin GraphQL client
#[derive(Clone)]
pub struct CommerceClient {
    config: Arc<CommerceConfig>,
    transport: Arc<dyn GraphQlTransport>,
}

impl CommerceClient {
    pub fn new(config: Arc<CommerceConfig>, transport: Arc<dyn GraphQlTransport>) -> Self {
        Self { config, transport }
    }

    /// Run a query against the given storefront and unwrap the result
    /// value. The failure conditions are distinct: a top-level `errors`
    /// member, a missing `data` object, a missing result key, and a null
    /// result key each report differently.
    pub async fn query_value(
        &self,
        storefront: &str,
        descriptor: &QueryDescriptor,
        variables: Value,
    ) -> CommerceResult<Value> {
        let shop = self.config.storefront(storefront)?;
        let body = json!({
            "query": descriptor.query,
            "variables": variables,
        });

        let response = self
            .transport
            .post(&shop.graphql_url(), &shop.access_token, body)
            .await?;

        let map = response.as_object().ok_or_else(|| {
            CommerceError::MissingData(format!("expected a response object, got: {response}"))
        })?;

        if map.contains_key("errors") {
            tracing::warn!(key = descriptor.result_key, "commerce API returned errors");
            return Err(CommerceError::GraphQl(response.to_string()));
        }

        let data = map
            .get("data")
            .and_then(Value::as_object)
            .ok_or_else(|| CommerceError::MissingData(response.to_string()))?;

        let result = data
            .get(descriptor.result_key)
            .ok_or_else(|| CommerceError::MissingResultKey {
                key: descriptor.result_key.to_string(),
                body: response.to_string(),
            })?;

        if result.is_null() {
            return Err(CommerceError::EmptyResult {
                key: descriptor.result_key.to_string(),
            });
        }

        Ok(result.clone())
    }

    /// Run a query and decode the result into a typed payload.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        storefront: &str,
        descriptor: &QueryDescriptor,
        variables: Value,
    ) -> CommerceResult<T> {
        let value = self.query_value(storefront, descriptor, variables).await?;
        serde_json::from_value(value.clone())
            .map_err(|e| CommerceError::Decode(format!("{e}: {value}")))
    }

    // ========== Typed queries ==========

    pub async fn customer_by_id(&self, storefront: &str, id: &str) -> CommerceResult<Customer> {
        self.fetch(storefront, &queries::CUSTOMER, json!({"id": id}))
            .await
    }

    pub async fn company_by_id(&self, storefront: &str, id: &str) -> CommerceResult<Company> {
        self.fetch(storefront, &queries::COMPANY, json!({"id": id}))
            .await
    }

    pub async fn order_minimal_by_id(&self, storefront: &str, id: &str) -> CommerceResult<Order> {
        self.fetch(storefront, &queries::ORDER_MINIMAL, json!({"id": id}))
            .await
    }

    pub async fn order_by_id(&self, storefront: &str, id: &str) -> CommerceResult<Order> {
        self.fetch(storefront, &queries::ORDER, json!({"id": id}))
            .await
    }

    pub async fn order_with_transactions_by_id(
        &self,
        storefront: &str,
        id: &str,
    ) -> CommerceResult<Order> {
        self.fetch(storefront, &queries::ORDER_WITH_TRANSACTIONS, json!({"id": id}))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct ScriptedTransport {
        responses: Mutex<VecDeque<Value>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Value>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
            })
        }
    }

    #[async_trait]
    impl GraphQlTransport for ScriptedTransport {
        async fn post(&self, _url: &str, _token: &str, _body: Value) -> CommerceResult<Value> {
            Ok(self
                .responses
                .lock()
                .pop_front()
                .expect("unexpected GraphQL call"))
        }
    }

    fn client(responses: Vec<Value>) -> CommerceClient {
        let config = CommerceConfig::default().with_storefront(
            "FM",
            crate::Storefront {
                domain: "shop.test".to_string(),
                access_token: "token".to_string(),
            },
        );
        CommerceClient::new(Arc::new(config), ScriptedTransport::new(responses))
    }

    const DESCRIPTOR: QueryDescriptor = QueryDescriptor {
        query: "query Thing($id: ID!) { thing(id: $id) { id } }",
        result_key: "thing",
    };

    #[tokio::test]
    async fn test_unknown_storefront_is_a_configuration_error() {
        let client = client(vec![]);
        let result = client
            .query_value("ZZ", &DESCRIPTOR, json!({"id": "1"}))
            .await;
        assert!(matches!(result, Err(CommerceError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_top_level_errors_member() {
        let client = client(vec![json!({
            "errors": [{"message": "query cost exceeded"}],
        })]);
        let result = client
            .query_value("FM", &DESCRIPTOR, json!({"id": "1"}))
            .await;
        assert!(matches!(result, Err(CommerceError::GraphQl(_))));
    }

    #[tokio::test]
    async fn test_missing_data_object() {
        let client = client(vec![json!({"extensions": {}})]);
        let result = client
            .query_value("FM", &DESCRIPTOR, json!({"id": "1"}))
            .await;
        assert!(matches!(result, Err(CommerceError::MissingData(_))));
    }

    #[tokio::test]
    async fn test_missing_result_key() {
        let client = client(vec![json!({"data": {"other": {}}})]);
        let result = client
            .query_value("FM", &DESCRIPTOR, json!({"id": "1"}))
            .await;
        assert!(matches!(
            result,
            Err(CommerceError::MissingResultKey { .. })
        ));
    }

    #[tokio::test]
    async fn test_null_result_key() {
        let client = client(vec![json!({"data": {"thing": null}})]);
        let result = client
            .query_value("FM", &DESCRIPTOR, json!({"id": "1"}))
            .await;
        assert!(matches!(result, Err(CommerceError::EmptyResult { .. })));
    }

    #[tokio::test]
    async fn test_success_unwraps_result_value() {
        let client = client(vec![json!({"data": {"thing": {"id": "gid://shopify/Thing/1"}}})]);
        let value = client
            .query_value("FM", &DESCRIPTOR, json!({"id": "1"}))
            .await
            .unwrap();
        assert_eq!(value, json!({"id": "gid://shopify/Thing/1"}));
    }
}
