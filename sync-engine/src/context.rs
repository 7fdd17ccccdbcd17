//! Per-request sync scope
//!
//! A [`SyncContext`] is built at the top of each unit of work and owns
//! everything that must not leak across concurrent units: the request
//! cache, the ERP client bound to it, and the commerce client. The
//! reference-data snapshot is the only shared piece, and it is immutable
//! once loaded.

use std::sync::Arc;

use chrono_tz::Tz;

use commerce_client::{CommerceClient, CommerceConfig, GraphQlTransport};
use erp_client::rpc::ErpTransport;
use erp_client::{ErpClient, ErpConfig, ReferenceData};
use shared::RequestCache;

/// One selling company: where it is, which storefront feeds it, and which
/// destinations count as in-town for delivery scheduling.
#[derive(Debug, Clone)]
pub struct CompanyProfile {
    /// ERP company id
    pub id: i64,
    /// Short code keying the per-company reference tables
    pub code: String,
    /// Substring of an order's display name that selects this company
    pub order_marker: Option<String>,
    /// Storefront key for Admin API calls on this company's behalf
    pub storefront: String,
    /// Warehouse timezone
    pub timezone: Tz,
    /// `"City, Province"` pairs served by local delivery
    pub in_town_places: Vec<String>,
}

/// The configured companies, with one default for unmarked orders.
#[derive(Debug, Clone)]
pub struct CompanyRegistry {
    profiles: Vec<CompanyProfile>,
    default_index: usize,
}

impl CompanyRegistry {
    /// The two built-in selling companies: the Eastern warehouse serving
    /// the Toronto metro area and the Pacific warehouse serving the
    /// Vancouver metro area.
    pub fn builtin() -> Self {
        let eastern = CompanyProfile {
            id: 2,
            code: "QF".to_string(),
            order_marker: Some("QF".to_string()),
            storefront: "QF".to_string(),
            timezone: chrono_tz::Canada::Eastern,
            in_town_places: [
                "Etobicoke, ON",
                "Markham, ON",
                "Missisauga, ON",
                "Richmond Hill, ON",
                "Scarborough, ON",
                "Toronto, ON",
                "Vaughan, ON",
            ]
            .map(String::from)
            .to_vec(),
        };
        let pacific = CompanyProfile {
            id: 3,
            code: "FM".to_string(),
            order_marker: None,
            storefront: "FM".to_string(),
            timezone: chrono_tz::Canada::Pacific,
            in_town_places: [
                "Burnaby, BC",
                "New Westminster, BC",
                "Richmond, BC",
                "Vancouver, BC",
            ]
            .map(String::from)
            .to_vec(),
        };
        Self {
            profiles: vec![eastern, pacific],
            default_index: 1,
        }
    }

    pub fn profiles(&self) -> &[CompanyProfile] {
        &self.profiles
    }

    pub fn by_id(&self, id: i64) -> Option<&CompanyProfile> {
        self.profiles.iter().find(|profile| profile.id == id)
    }

    pub fn default_profile(&self) -> &CompanyProfile {
        &self.profiles[self.default_index]
    }

    /// The company owning an order, selected by the marker substring in
    /// its display name; unmarked orders belong to the default company.
    pub fn for_order_name(&self, order_name: &str) -> &CompanyProfile {
        self.profiles
            .iter()
            .find(|profile| {
                profile
                    .order_marker
                    .as_deref()
                    .is_some_and(|marker| order_name.contains(marker))
            })
            .unwrap_or_else(|| self.default_profile())
    }

    /// Storefront key of the first non-default company, for
    /// cross-storefront order fetches.
    pub fn alternate_storefront(&self) -> &str {
        let default_key = &self.default_profile().storefront;
        self.profiles
            .iter()
            .map(|profile| &profile.storefront)
            .find(|storefront| *storefront != default_key)
            .unwrap_or(default_key)
    }
}

/// Everything one unit of work needs, built fresh per inbound event.
pub struct SyncContext {
    pub erp: ErpClient,
    pub commerce: CommerceClient,
    pub reference: Arc<ReferenceData>,
    pub cache: Arc<RequestCache>,
    pub companies: CompanyRegistry,
}

impl SyncContext {
    pub fn new(
        erp_config: Arc<ErpConfig>,
        erp_transport: Arc<dyn ErpTransport>,
        commerce_config: Arc<CommerceConfig>,
        commerce_transport: Arc<dyn GraphQlTransport>,
        reference: Arc<ReferenceData>,
    ) -> Self {
        let cache = Arc::new(RequestCache::new());
        let erp = ErpClient::new(erp_config, erp_transport, cache.clone());
        let commerce = CommerceClient::new(commerce_config, commerce_transport);
        Self {
            erp,
            commerce,
            reference,
            cache,
            companies: CompanyRegistry::builtin(),
        }
    }

    pub fn with_companies(mut self, companies: CompanyRegistry) -> Self {
        self.companies = companies;
        self
    }
}
