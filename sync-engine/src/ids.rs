//! Source global id → external id derivation
//!
//! Commerce global ids look like `gid://shopify/<Type>/<numericId>`,
//! optionally with a trailing query string. The derived external id is
//! `__export__.shopify_<lowercased type>_<numericId>`, stable for the
//! lifetime of the source object.

use erp_client::XidMapping;

use crate::{SyncError, SyncResult};

/// Module half of every derived external id
pub const XID_MODULE: &str = "__export__";

/// Derive the external-id mapping for a source global id.
pub fn source_gid_to_mapping(gid: &str, model: &str) -> SyncResult<XidMapping> {
    let parts: Vec<&str> = gid.split('/').collect();
    if parts.len() != 5 {
        return Err(SyncError::InvalidSourceId(gid.to_string()));
    }
    let id_number = parts[4].split('?').next().unwrap_or_default();
    let object_type = parts[3].to_lowercase();
    if id_number.is_empty() || object_type.is_empty() {
        return Err(SyncError::InvalidSourceId(gid.to_string()));
    }
    Ok(XidMapping {
        module: XID_MODULE.to_string(),
        name: format!("shopify_{object_type}_{id_number}"),
        model: model.to_string(),
        ..XidMapping::default()
    })
}

/// Derive the `module.name` external id for a source global id.
pub fn source_gid_to_xid(gid: &str) -> SyncResult<String> {
    Ok(source_gid_to_mapping(gid, "")?.xid())
}

/// Raw numeric tail of a global id (used for human-facing references).
pub fn gid_last_segment(gid: &str) -> &str {
    gid.rsplit('/').next().unwrap_or_default()
}
