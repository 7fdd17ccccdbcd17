//! Reference-data manager
//!
//! A bulk snapshot of ERP lookup tables (taxes, carriers, countries,
//! sales teams, …) is fetched once per process and consulted on the hot
//! path. When the snapshot lacks an entry, lookups fall back to an
//! on-demand `find_first_or_create` against the ERP, cached per request.
//! A failed snapshot load is cached and not retried for a cooldown window
//! so a failing upstream is not hammered.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tokio::time::Instant;

use shared::CacheKey;

use crate::{Domain, ErpClient, ErpConfig, ErpError, ErpResult, fields};

/// Minimum time between snapshot fetch attempts after a failure
pub const RETRY_COOLDOWN: Duration = Duration::from_secs(10);

// ========== Snapshot shape ==========

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartnerRoles {
    #[serde(default)]
    pub wholesale: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Websites {
    /// Website id attached to partners created from the storefront
    #[serde(default)]
    pub commerce: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pricelists {
    /// Pricelist for individual (consumer) customers
    #[serde(default)]
    pub consumer: i64,
    /// Per-company wholesale pricelists, keyed by company code
    #[serde(default)]
    pub wholesale: HashMap<String, i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerTypes {
    #[serde(default)]
    pub individual: i64,
    #[serde(default)]
    pub business: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryProducts {
    #[serde(default)]
    pub webship: i64,
    #[serde(default)]
    pub twoship: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryCarrier {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub product_id: i64,
    #[serde(default)]
    pub delivery_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentMethods {
    #[serde(default)]
    pub shopify: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentAcquirer {
    #[serde(default)]
    pub shopify: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SalesTeam {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub user_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SalesTeams {
    #[serde(default)]
    pub consumer: SalesTeam,
    #[serde(default)]
    pub leads: SalesTeam,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sources {
    #[serde(default)]
    pub shopify: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaxEntry {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amount: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateEntry {
    #[serde(default)]
    pub id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountryEntry {
    #[serde(default)]
    pub id: i64,
    /// State code → state
    #[serde(default)]
    pub states: HashMap<String, StateEntry>,
}

/// Bulk snapshot of ERP lookup tables
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReferenceSnapshot {
    #[serde(default)]
    pub csrf_token: String,
    #[serde(default)]
    pub partner_roles: PartnerRoles,
    #[serde(default)]
    pub websites: Websites,
    #[serde(default)]
    pub pricelists: Pricelists,
    #[serde(default)]
    pub customer_types: CustomerTypes,
    #[serde(default)]
    pub delivery_products: DeliveryProducts,
    #[serde(default)]
    pub delivery_carriers: Vec<DeliveryCarrier>,
    #[serde(default)]
    pub payment_methods: PaymentMethods,
    /// Company code → acquirers
    #[serde(default)]
    pub payment_acquirers: HashMap<String, PaymentAcquirer>,
    #[serde(default)]
    pub sales_teams: SalesTeams,
    #[serde(default)]
    pub sources: Sources,
    /// Company code → tax table
    #[serde(default)]
    pub taxes: HashMap<String, Vec<TaxEntry>>,
    /// Country code → country
    #[serde(default)]
    pub countries: HashMap<String, CountryEntry>,
}

// ========== Fetch seam ==========

/// Fetch seam for the snapshot endpoint
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    async fn fetch(&self, config: &ErpConfig) -> ErpResult<ReferenceSnapshot>;
}

/// reqwest-backed fetcher for the snapshot endpoint
pub struct HttpSnapshotFetcher {
    client: reqwest::Client,
}

impl HttpSnapshotFetcher {
    pub fn new() -> ErpResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(crate::rpc::RPC_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SnapshotFetcher for HttpSnapshotFetcher {
    async fn fetch(&self, config: &ErpConfig) -> ErpResult<ReferenceSnapshot> {
        let access_key = config.require_access_key()?;
        let response = self
            .client
            .get(config.reference_data_url())
            .header("Odoo-Access-Key", access_key)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ErpError::Remote {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            ErpError::InvalidResponse(format!("invalid reference-data payload: {e}"))
        })
    }
}

// ========== Manager ==========

#[derive(Default)]
struct ManagerState {
    snapshot: Option<Arc<ReferenceSnapshot>>,
    last_error: Option<String>,
    last_fetch: Option<Instant>,
}

impl ManagerState {
    /// Cached outcome, if one applies right now.
    fn cached(&self) -> Option<ErpResult<Arc<ReferenceSnapshot>>> {
        if let Some(snapshot) = &self.snapshot {
            return Some(Ok(snapshot.clone()));
        }
        if let (Some(error), Some(at)) = (&self.last_error, self.last_fetch) {
            if at.elapsed() < RETRY_COOLDOWN {
                return Some(Err(ErpError::ReferenceData(error.clone())));
            }
        }
        None
    }
}

/// Process-wide reference-data snapshot with a cooldown-gated retry
/// policy. Share one instance across units of work.
pub struct ReferenceData {
    config: Arc<ErpConfig>,
    fetcher: Arc<dyn SnapshotFetcher>,
    state: RwLock<ManagerState>,
}

impl ReferenceData {
    pub fn new(config: Arc<ErpConfig>, fetcher: Arc<dyn SnapshotFetcher>) -> Self {
        Self {
            config,
            fetcher,
            state: RwLock::new(ManagerState::default()),
        }
    }

    /// The loaded snapshot, fetching it on first use.
    pub async fn load(&self) -> ErpResult<Arc<ReferenceSnapshot>> {
        if let Some(outcome) = self.state.read().await.cached() {
            return outcome;
        }

        let mut state = self.state.write().await;
        // Re-check: another task may have finished the fetch while this
        // one waited for the write lock.
        if let Some(outcome) = state.cached() {
            return outcome;
        }

        state.last_fetch = Some(Instant::now());
        match self.fetcher.fetch(&self.config).await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                state.snapshot = Some(snapshot.clone());
                state.last_error = None;
                Ok(snapshot)
            }
            Err(error) => {
                tracing::error!(error = %error, "reference-data snapshot load failed");
                state.last_error = Some(error.to_string());
                Err(ErpError::ReferenceData(error.to_string()))
            }
        }
    }

    // ========== Lookups (snapshot first, cached fallback second) ==========

    /// Country and state ids for ISO-style codes.
    pub async fn country_and_state_ids(
        &self,
        client: &ErpClient,
        country_code: &str,
        state_code: &str,
    ) -> ErpResult<(Option<i64>, Option<i64>)> {
        let snapshot = self.load().await?;
        if let Some(country) = snapshot.countries.get(country_code) {
            let state_id = country.states.get(state_code).map(|state| state.id);
            return Ok((Some(country.id), state_id));
        }
        Ok(fetch_country_and_state_ids(client, country_code, state_code).await)
    }

    /// Tax id for a `(description, percentage, company)` triple, created
    /// on demand when unseen.
    pub async fn tax_id(
        &self,
        client: &ErpClient,
        company_code: &str,
        company_id: i64,
        name: &str,
        percentage: f64,
    ) -> ErpResult<i64> {
        let snapshot = self.load().await?;
        let taxes = snapshot.taxes.get(company_code).ok_or_else(|| {
            ErpError::ReferenceData(format!("no tax table for company {company_code}"))
        })?;
        for tax in taxes {
            if tax.description == name && tax.amount == percentage {
                return Ok(tax.id);
            }
        }
        fetch_tax(client, company_id, name, percentage).await
    }

    /// Delivery-carrier id by name, delivery type, and carrier product,
    /// created on demand when unseen.
    pub async fn delivery_carrier_id(
        &self,
        client: &ErpClient,
        name: &str,
        delivery_type: &str,
        product_id: i64,
    ) -> ErpResult<i64> {
        let snapshot = self.load().await?;
        for carrier in &snapshot.delivery_carriers {
            if carrier.name == name
                && carrier.delivery_type == delivery_type
                && carrier.product_id == product_id
            {
                return Ok(carrier.id);
            }
        }
        fetch_delivery_carrier(client, name, delivery_type, product_id).await
    }
}

/// On-demand country/state lookup. Search failures degrade to "absent";
/// hits are cached per request.
async fn fetch_country_and_state_ids(
    client: &ErpClient,
    country_code: &str,
    state_code: &str,
) -> (Option<i64>, Option<i64>) {
    let country_key = CacheKey::new("res.country").push(country_code);
    let mut country_id = client.cache().get::<i64>(&country_key);
    if country_id.is_none() {
        country_id = client
            .search_id("res.country", &Domain::eq("code", json!(country_code)), None)
            .await
            .ok();
    }

    let Some(country_id) = country_id else {
        return (None, None);
    };
    client.cache().put(&country_key, country_id);

    let state_key = CacheKey::new("res.country.state")
        .push(country_id)
        .push(state_code);
    let mut state_id = client.cache().get::<i64>(&state_key);
    if state_id.is_none() {
        let mut domain = Domain::new();
        domain.push_eq("country_id", json!(country_id));
        domain.push_eq("code", json!(state_code));
        state_id = client
            .search_id("res.country.state", &domain, None)
            .await
            .ok();
        if let Some(state_id) = state_id {
            client.cache().put(&state_key, state_id);
        }
    }

    (Some(country_id), state_id)
}

async fn fetch_tax(
    client: &ErpClient,
    company_id: i64,
    name: &str,
    percentage: f64,
) -> ErpResult<i64> {
    let key = CacheKey::new("tax").push(name).push(company_id);
    if let Some(tax_id) = client.cache().get::<i64>(&key) {
        return Ok(tax_id);
    }

    let tax_data = fields! {
        "name": name,
        "description": name,
        "amount_type": "percent",
        "type_tax_use": "sale",
        "amount": percentage,
        "company_id": company_id,
    };
    let tax_id = client
        .find_first_or_create("account.tax", &Domain::from_map(&tax_data), tax_data.clone(), None)
        .await?;

    client.cache().put(&key, tax_id);
    Ok(tax_id)
}

async fn fetch_delivery_carrier(
    client: &ErpClient,
    name: &str,
    delivery_type: &str,
    product_id: i64,
) -> ErpResult<i64> {
    let key = CacheKey::new("carrier")
        .push(name)
        .push(delivery_type)
        .push(product_id);
    if let Some(carrier_id) = client.cache().get::<i64>(&key) {
        return Ok(carrier_id);
    }

    let carrier_data = fields! {
        "name": name,
        "product_id": product_id,
        "delivery_type": delivery_type,
        "company_id": false,
        "integration_level": "rate",
    };
    let carrier_id = client
        .find_first_or_create(
            "delivery.carrier",
            &Domain::from_map(&carrier_data),
            carrier_data.clone(),
            None,
        )
        .await?;

    client.cache().put(&key, carrier_id);
    Ok(carrier_id)
}
