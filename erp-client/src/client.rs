//! Generic record CRUD over `execute_kw`
//!
//! One [`ErpClient`] is constructed per inbound unit of work; it carries
//! the per-request cache and an immutable base context. Scoping extra
//! context keys (e.g. the allowed company) is done with
//! [`ErpClient::with_context`], which returns a scoped clone — there is no
//! process-wide mutable context.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use shared::RequestCache;

use crate::rpc::ErpTransport;
use crate::{Domain, ErpConfig, ErpError, ErpResult};

/// ERP datetime wire format
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A record's field map
pub type Fields = Map<String, Value>;

/// An `execute_kw` context map
pub type ErpContext = Map<String, Value>;

/// Build a [`Fields`] map from a `json!`-style object literal.
#[macro_export]
macro_rules! fields {
    ($($key:literal : $value:expr),* $(,)?) => {{
        let mut map = $crate::Fields::new();
        $( map.insert($key.to_string(), ::serde_json::json!($value)); )*
        map
    }};
}

/// JSON-RPC client for the ERP
#[derive(Clone)]
pub struct ErpClient {
    config: Arc<ErpConfig>,
    transport: Arc<dyn ErpTransport>,
    cache: Arc<RequestCache>,
    base_context: ErpContext,
}

impl ErpClient {
    pub fn new(
        config: Arc<ErpConfig>,
        transport: Arc<dyn ErpTransport>,
        cache: Arc<RequestCache>,
    ) -> Self {
        Self {
            config,
            transport,
            cache,
            base_context: ErpContext::new(),
        }
    }

    /// The per-request cache backing this client.
    pub fn cache(&self) -> &RequestCache {
        &self.cache
    }

    pub fn config(&self) -> &ErpConfig {
        &self.config
    }

    /// Scoped clone with extra context keys merged in. Keys already scoped
    /// survive, so an outer scope wins over a nested one.
    pub fn with_context(&self, extra: ErpContext) -> Self {
        let mut merged = extra;
        for (key, value) in &self.base_context {
            merged.insert(key.clone(), value.clone());
        }
        Self {
            base_context: merged,
            ..self.clone()
        }
    }

    async fn json_rpc(&self, service: &str, method: &str, args: Vec<Value>) -> ErpResult<Value> {
        let mut full_args = vec![
            json!(self.config.database),
            json!(self.config.user_id),
            json!(self.config.password),
        ];
        full_args.extend(args);

        let body = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "id": self.config.user_id,
            "params": {
                "service": service,
                "method": method,
                "args": full_args,
            },
        });

        let response = self.transport.call(&self.config.rpc_url(), body).await?;

        if let Some(error) = response.get("error") {
            let body = serde_json::to_string_pretty(error).unwrap_or_else(|_| error.to_string());
            return Err(ErpError::Remote { status: 200, body });
        }

        match response.get("result") {
            Some(result) => Ok(result.clone()),
            None => Err(ErpError::InvalidResponse(format!(
                "result not found in ERP response: {response}"
            ))),
        }
    }

    /// Call `execute_kw` on `model`. The client's base context and the
    /// per-call context are merged into `kwargs["context"]`; per-call keys
    /// win.
    pub async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        mut kwargs: Map<String, Value>,
        context: Option<&ErpContext>,
    ) -> ErpResult<Value> {
        let mut merged = self.base_context.clone();
        if let Some(context) = context {
            for (key, value) in context {
                merged.insert(key.clone(), value.clone());
            }
        }
        kwargs.insert("context".to_string(), Value::Object(merged));

        self.json_rpc(
            "object",
            "execute_kw",
            vec![
                json!(model),
                json!(method),
                Value::Array(args),
                Value::Object(kwargs),
            ],
        )
        .await
    }

    // ========== Search ==========

    /// `limit` 0 means no limit.
    pub async fn search_read(
        &self,
        model: &str,
        domain: &Domain,
        fields: &[&str],
        limit: usize,
        context: Option<&ErpContext>,
    ) -> ErpResult<Vec<Fields>> {
        let mut kwargs = Map::new();
        kwargs.insert("domain".to_string(), domain.to_value());
        kwargs.insert("fields".to_string(), json!(fields));
        kwargs.insert("limit".to_string(), json!(limit));

        let records = self
            .execute_kw(model, "search_read", vec![], kwargs, context)
            .await?;

        let list = records.as_array().ok_or_else(|| {
            ErpError::InvalidResponse("search_read result is not a list".to_string())
        })?;

        list.iter()
            .map(|record| {
                record.as_object().cloned().ok_or_else(|| {
                    ErpError::InvalidResponse(
                        "search_read result values are not objects".to_string(),
                    )
                })
            })
            .collect()
    }

    /// Fails unless exactly one record matches.
    pub async fn search_read_one(
        &self,
        model: &str,
        domain: &Domain,
        fields: &[&str],
        context: Option<&ErpContext>,
    ) -> ErpResult<Fields> {
        let mut records = self.search_read(model, domain, fields, 2, context).await?;
        match records.len() {
            1 => Ok(records.remove(0)),
            0 => Err(ErpError::NotFound {
                model: model.to_string(),
            }),
            found => Err(ErpError::Ambiguous {
                model: model.to_string(),
                found,
            }),
        }
    }

    pub async fn search_read_by_id(
        &self,
        model: &str,
        id: i64,
        fields: &[&str],
    ) -> ErpResult<Fields> {
        self.search_read_one(model, &Domain::eq("id", json!(id)), fields, None)
            .await
    }

    pub async fn search_count(
        &self,
        model: &str,
        domain: &Domain,
        context: Option<&ErpContext>,
    ) -> ErpResult<i64> {
        let count = self
            .execute_kw(model, "search_count", vec![domain.to_value()], Map::new(), context)
            .await?;
        count
            .as_i64()
            .or_else(|| count.as_f64().map(|f| f as i64))
            .ok_or_else(|| ErpError::InvalidResponse("search_count result is not a number".to_string()))
    }

    pub async fn search_ids(
        &self,
        model: &str,
        domain: &Domain,
        context: Option<&ErpContext>,
    ) -> ErpResult<Vec<i64>> {
        let records = self.search_read(model, domain, &["id"], 0, context).await?;
        records
            .iter()
            .map(|record| {
                record
                    .get("id")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| ErpError::InvalidResponse("search result id is not a number".to_string()))
            })
            .collect()
    }

    /// Fails unless exactly one id matches.
    pub async fn search_id(
        &self,
        model: &str,
        domain: &Domain,
        context: Option<&ErpContext>,
    ) -> ErpResult<i64> {
        let ids = self.search_ids(model, domain, context).await?;
        match ids.len() {
            1 => Ok(ids[0]),
            0 => Err(ErpError::NotFound {
                model: model.to_string(),
            }),
            found => Err(ErpError::Ambiguous {
                model: model.to_string(),
                found,
            }),
        }
    }

    /// First matching id, if any.
    pub async fn search_first_id(
        &self,
        model: &str,
        domain: &Domain,
        context: Option<&ErpContext>,
    ) -> ErpResult<Option<i64>> {
        let ids = self.search_ids(model, domain, context).await?;
        Ok(ids.first().copied())
    }

    // ========== Create / Write / Unlink ==========

    pub async fn create_multi(
        &self,
        model: &str,
        data: Vec<Fields>,
        context: Option<&ErpContext>,
    ) -> ErpResult<Vec<i64>> {
        let result = self
            .execute_kw(model, "create", vec![json!(data)], Map::new(), context)
            .await?;

        let list = result.as_array().ok_or_else(|| {
            ErpError::InvalidResponse(format!(
                "invalid result from create, expected a list of ids, got {result}"
            ))
        })?;

        list.iter()
            .map(|id| {
                id.as_i64()
                    .or_else(|| id.as_f64().map(|f| f as i64))
                    .ok_or_else(|| {
                        ErpError::InvalidResponse(format!(
                            "invalid result from create, expected numeric ids, got {id}"
                        ))
                    })
            })
            .collect()
    }

    pub async fn create(
        &self,
        model: &str,
        data: Fields,
        context: Option<&ErpContext>,
    ) -> ErpResult<i64> {
        let ids = self.create_multi(model, vec![data], context).await?;
        ids.first().copied().ok_or_else(|| {
            ErpError::InvalidResponse("create returned an empty id list".to_string())
        })
    }

    pub async fn write_multi(
        &self,
        model: &str,
        ids: &[i64],
        data: Fields,
        context: Option<&ErpContext>,
    ) -> ErpResult<()> {
        let result = self
            .execute_kw(model, "write", vec![json!(ids), json!(data)], Map::new(), context)
            .await?;

        if !result.is_boolean() {
            return Err(ErpError::InvalidResponse(format!(
                "invalid result from write, expected a boolean, got {result}"
            )));
        }
        Ok(())
    }

    pub async fn write(
        &self,
        model: &str,
        id: i64,
        data: Fields,
        context: Option<&ErpContext>,
    ) -> ErpResult<()> {
        self.write_multi(model, &[id], data, context).await
    }

    pub async fn unlink_multi(
        &self,
        model: &str,
        ids: &[i64],
        context: Option<&ErpContext>,
    ) -> ErpResult<()> {
        self.execute_kw(model, "unlink", vec![json!(ids)], Map::new(), context)
            .await?;
        Ok(())
    }

    pub async fn unlink(&self, model: &str, id: i64, context: Option<&ErpContext>) -> ErpResult<()> {
        self.unlink_multi(model, &[id], context).await
    }

    // ========== Combined operations ==========

    /// Write to every match; no-op when nothing matches.
    pub async fn search_write(
        &self,
        model: &str,
        domain: &Domain,
        data: Fields,
        context: Option<&ErpContext>,
    ) -> ErpResult<()> {
        let ids = self.search_ids(model, domain, context).await?;
        if ids.is_empty() {
            return Ok(());
        }
        self.write_multi(model, &ids, data, context).await
    }

    /// Write to exactly one match.
    pub async fn search_write_one(
        &self,
        model: &str,
        domain: &Domain,
        data: Fields,
        context: Option<&ErpContext>,
    ) -> ErpResult<()> {
        let ids = self.search_ids(model, domain, context).await?;
        match ids.len() {
            1 => self.write_multi(model, &ids, data, context).await,
            0 => Err(ErpError::NotFound {
                model: model.to_string(),
            }),
            found => Err(ErpError::Ambiguous {
                model: model.to_string(),
                found,
            }),
        }
    }

    /// Search; create when nothing matches; fail on more than one match.
    pub async fn find_or_create(
        &self,
        model: &str,
        domain: &Domain,
        create_data: Fields,
        context: Option<&ErpContext>,
    ) -> ErpResult<i64> {
        let ids = self.search_ids(model, domain, context).await?;
        match ids.len() {
            1 => Ok(ids[0]),
            0 => self.create(model, create_data, context).await,
            found => Err(ErpError::Ambiguous {
                model: model.to_string(),
                found,
            }),
        }
    }

    /// First match, or create when absent.
    pub async fn find_first_or_create(
        &self,
        model: &str,
        domain: &Domain,
        create_data: Fields,
        context: Option<&ErpContext>,
    ) -> ErpResult<i64> {
        match self.search_first_id(model, domain, context).await? {
            Some(id) => Ok(id),
            None => self.create(model, create_data, context).await,
        }
    }

    /// Find-or-create, then write. `create_only` extends the create
    /// payload; `write_only` extends the write payload.
    pub async fn write_or_create(
        &self,
        model: &str,
        domain: &Domain,
        data: Fields,
        write_only: Option<Fields>,
        create_only: Option<Fields>,
        context: Option<&ErpContext>,
    ) -> ErpResult<i64> {
        let mut create_data = data.clone();
        if let Some(extra) = create_only {
            create_data.extend(extra);
        }
        let id = self.find_or_create(model, domain, create_data, context).await?;

        let mut write_data = data;
        if let Some(extra) = write_only {
            write_data.extend(extra);
        }
        self.write(model, id, write_data, context).await?;
        Ok(id)
    }

    /// Create a record and assign its external id. If the assignment
    /// fails the record is deleted again so no orphan remains; a failed
    /// compensating delete is reported distinctly.
    pub async fn create_with_xid(
        &self,
        model: &str,
        data: Fields,
        xid: &str,
    ) -> ErpResult<i64> {
        let id = self.create(model, data, None).await?;
        if let Err(assign_error) = self.assign_xid(model, id, xid).await {
            tracing::warn!(model, xid, id, "external id assignment failed, removing created record");
            if let Err(unlink_error) = self.unlink(model, id, None).await {
                return Err(ErpError::Compensation {
                    original: Box::new(assign_error),
                    rollback: unlink_error.to_string(),
                });
            }
            return Err(assign_error);
        }
        Ok(id)
    }
}
