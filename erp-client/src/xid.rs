//! External-id resolution
//!
//! `module.name` external ids link source-system objects to ERP records
//! through rows of the `ir.model.data` mapping table. Resolutions are
//! cached per request; `exists = false` is a cacheable negative result,
//! distinct from "not yet looked up". At most one mapping row may exist
//! per external id.

use std::collections::HashMap;

use serde_json::json;

use shared::CacheKey;

use crate::{Domain, ErpClient, ErpError, ErpResult, fields};

/// The ERP's external-id mapping table
pub const XID_MODEL: &str = "ir.model.data";

const XID_FIELDS: [&str; 5] = ["id", "module", "name", "model", "res_id"];

/// A resolved (or confirmed-absent) external-id mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XidMapping {
    /// Id of the mapping row itself (0 when absent)
    pub row_id: i64,
    pub module: String,
    pub name: String,
    /// Model the mapping is expected to point at
    pub model: String,
    /// Id of the target record (0 when absent)
    pub res_id: i64,
    /// Confirmed present. `false` after a lookup means confirmed absent.
    pub exists: bool,
}

impl XidMapping {
    /// Parse `module.name`, split on the first `.`.
    pub fn parse(model: &str, xid: &str) -> ErpResult<Self> {
        let (module, name) = xid
            .split_once('.')
            .ok_or_else(|| ErpError::InvalidXid(xid.to_string()))?;
        Ok(Self {
            module: module.to_string(),
            name: name.to_string(),
            model: model.to_string(),
            ..Self::default()
        })
    }

    /// The joined `module.name` form.
    pub fn xid(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }

    fn cache_key(model: &str, xid: &str) -> CacheKey {
        CacheKey::new("xid-data").push(model).push(xid)
    }
}

impl ErpClient {
    /// Resolve an external id, cache-first. Positive and negative results
    /// are both cached for the rest of the request.
    pub async fn resolve_xid(&self, model: &str, xid: &str) -> ErpResult<XidMapping> {
        let key = XidMapping::cache_key(model, xid);
        if let Some(cached) = self.cache().get::<XidMapping>(&key) {
            return Ok(cached);
        }

        let mut mapping = XidMapping::parse(model, xid)?;

        let mut domain = Domain::new();
        domain.push_eq("module", json!(mapping.module));
        domain.push_eq("name", json!(mapping.name));
        let rows = self
            .search_read(XID_MODEL, &domain, &XID_FIELDS, 0, None)
            .await?;

        if rows.len() > 1 {
            return Err(ErpError::Ambiguous {
                model: XID_MODEL.to_string(),
                found: rows.len(),
            });
        }

        let Some(row) = rows.first() else {
            // Confirmed absent; cache the negative so the next caller
            // does not repeat the lookup.
            self.cache().put(&key, mapping.clone());
            return Ok(mapping);
        };

        let found_model = row.get("model").and_then(|v| v.as_str()).unwrap_or_default();
        if found_model != mapping.model {
            return Err(ErpError::ModelMismatch {
                xid: xid.to_string(),
                expected: mapping.model,
                found: found_model.to_string(),
            });
        }

        mapping.row_id = row.get("id").and_then(|v| v.as_i64()).unwrap_or_default();
        mapping.res_id = row.get("res_id").and_then(|v| v.as_i64()).unwrap_or_default();
        if let Some(module) = row.get("module").and_then(|v| v.as_str()) {
            mapping.module = module.to_string();
        }
        if let Some(name) = row.get("name").and_then(|v| v.as_str()) {
            mapping.name = name.to_string();
        }
        mapping.exists = true;

        self.cache().put(&key, mapping.clone());
        Ok(mapping)
    }

    /// Target record id for an external id, if the mapping exists.
    pub async fn resolve_xid_id(&self, model: &str, xid: &str) -> ErpResult<Option<i64>> {
        let mapping = self.resolve_xid(model, xid).await?;
        Ok(mapping.exists.then_some(mapping.res_id))
    }

    /// Assign an external id to a record. No-op when the mapping already
    /// exists.
    pub async fn assign_xid(&self, model: &str, res_id: i64, xid: &str) -> ErpResult<()> {
        let mut mapping = self.resolve_xid(model, xid).await?;
        if mapping.exists {
            return Ok(());
        }

        let row = fields! {
            "module": mapping.module,
            "name": mapping.name,
            "model": model,
            "res_id": res_id,
        };
        let row_id = self.create(XID_MODEL, row, None).await?;

        mapping.row_id = row_id;
        mapping.res_id = res_id;
        mapping.exists = true;
        self.cache().put(&XidMapping::cache_key(model, xid), mapping);
        Ok(())
    }

    /// Resolve a batch of external ids with a single OR'd query,
    /// amortizing round-trips. Callers building many related records must
    /// prefetch to avoid N+1 lookups. Every hit and every miss lands in
    /// the cache.
    pub async fn prefetch_xids(&self, entries: &[XidMapping]) -> ErpResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut domain = Domain::new();
        for _ in 0..entries.len() - 1 {
            domain.push_or();
        }
        for entry in entries {
            domain.push_and();
            domain.push_eq("module", json!(entry.module));
            domain.push_eq("name", json!(entry.name));
        }

        let rows = self
            .search_read(XID_MODEL, &domain, &XID_FIELDS, 0, None)
            .await?;

        let mut found = HashMap::new();
        for row in &rows {
            let module = row.get("module").and_then(|v| v.as_str()).unwrap_or_default();
            let name = row.get("name").and_then(|v| v.as_str()).unwrap_or_default();
            found.insert(format!("{module}.{name}"), row);
        }

        for entry in entries {
            let key = XidMapping::cache_key(&entry.model, &entry.xid());
            match found.get(&entry.xid()) {
                None => {
                    self.cache().put(&key, entry.clone());
                }
                Some(row) => {
                    let found_model =
                        row.get("model").and_then(|v| v.as_str()).unwrap_or_default();
                    if found_model != entry.model {
                        return Err(ErpError::ModelMismatch {
                            xid: entry.xid(),
                            expected: entry.model.clone(),
                            found: found_model.to_string(),
                        });
                    }
                    let mut mapping = entry.clone();
                    mapping.row_id = row.get("id").and_then(|v| v.as_i64()).unwrap_or_default();
                    mapping.res_id =
                        row.get("res_id").and_then(|v| v.as_i64()).unwrap_or_default();
                    mapping.exists = true;
                    self.cache().put(&key, mapping);
                }
            }
        }
        Ok(())
    }

    /// Read the record an external id points at, or `None` when the
    /// mapping is absent.
    ///
    /// Self-healing: a mapping row can outlive its target record (manual
    /// deletion in the ERP). When the dependent read comes back empty, the
    /// stale row is unlinked, the cache entry flips to confirmed-absent,
    /// and the resolution reads as a fresh miss.
    pub async fn read_record_by_xid(
        &self,
        model: &str,
        xid: &str,
        fields: &[&str],
    ) -> ErpResult<Option<crate::Fields>> {
        let mapping = self.resolve_xid(model, xid).await?;
        if !mapping.exists {
            return Ok(None);
        }

        let mut context = crate::ErpContext::new();
        context.insert("active_test".to_string(), json!(false));
        let domain = Domain::eq("id", json!(mapping.res_id));

        match self.search_read_one(model, &domain, fields, Some(&context)).await {
            Ok(record) => Ok(Some(record)),
            Err(ErpError::NotFound { .. }) => {
                tracing::warn!(
                    model,
                    xid,
                    res_id = mapping.res_id,
                    "external id points at a deleted record, removing stale mapping"
                );
                // Best effort: the mapping row may already be gone.
                let _ = self.unlink(XID_MODEL, mapping.row_id, None).await;
                let mut stale = mapping;
                stale.exists = false;
                stale.row_id = 0;
                stale.res_id = 0;
                self.cache().put(&XidMapping::cache_key(model, xid), stale);
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_on_first_dot() {
        let mapping = XidMapping::parse("res.partner", "__export__.shopify_customer_1").unwrap();
        assert_eq!(mapping.module, "__export__");
        assert_eq!(mapping.name, "shopify_customer_1");
        assert_eq!(mapping.model, "res.partner");
        assert!(!mapping.exists);
        assert_eq!(mapping.xid(), "__export__.shopify_customer_1");
    }

    #[test]
    fn test_parse_without_separator_fails() {
        let result = XidMapping::parse("res.partner", "no-separator");
        assert!(matches!(result, Err(ErpError::InvalidXid(_))));
    }
}
