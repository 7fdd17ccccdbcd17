//! In-memory fakes for engine tests
//!
//! `FakeErp` is a tiny record store behind the JSON-RPC seam: it
//! evaluates search domains (including prefix `&`/`|` operators),
//! assigns ids on create, applies relational line commands on order
//! writes, and logs every (model, method) call so tests can assert on
//! traffic. `FakeCommerce` replays canned GraphQL responses matched by
//! query document.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value, json};

use commerce_client::client::{GraphQlTransport, QueryDescriptor};
use commerce_client::{CommerceConfig, CommerceError, CommerceResult, Storefront};
use erp_client::reference::{
    CountryEntry, DeliveryCarrier, SalesTeam, StateEntry, TaxEntry,
};
use erp_client::rpc::ErpTransport;
use erp_client::{ErpConfig, ErpResult, Fields, ReferenceData, ReferenceSnapshot, SnapshotFetcher};
use sync_engine::SyncContext;

// ========== Fake ERP ==========

#[derive(Default)]
struct Store {
    records: HashMap<String, BTreeMap<i64, Fields>>,
    next_id: i64,
}

impl Store {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct FakeErp {
    store: Mutex<Store>,
    calls: Mutex<Vec<(String, String)>>,
    pub fail_confirm: AtomicBool,
    pub fail_line_creates: AtomicBool,
}

impl FakeErp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, model: &str, fields: Value) -> i64 {
        let mut store = self.store.lock();
        let id = store.allocate_id();
        let mut record = fields.as_object().cloned().unwrap_or_default();
        record.insert("id".to_string(), json!(id));
        store
            .records
            .entry(model.to_string())
            .or_default()
            .insert(id, record);
        id
    }

    pub fn seed_with_xid(&self, model: &str, fields: Value, xid: &str) -> i64 {
        let id = self.seed(model, fields);
        let (module, name) = xid.split_once('.').expect("xid needs a module.name form");
        self.seed(
            "ir.model.data",
            json!({
                "module": module,
                "name": name,
                "model": model,
                "res_id": id,
            }),
        );
        id
    }

    pub fn records(&self, model: &str) -> Vec<(i64, Fields)> {
        self.store
            .lock()
            .records
            .get(model)
            .map(|records| records.iter().map(|(id, r)| (*id, r.clone())).collect())
            .unwrap_or_default()
    }

    pub fn record(&self, model: &str, id: i64) -> Option<Fields> {
        self.store
            .lock()
            .records
            .get(model)
            .and_then(|records| records.get(&id))
            .cloned()
    }

    pub fn count_records(&self, model: &str) -> usize {
        self.store
            .lock()
            .records
            .get(model)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    /// Current length of the call log; pass to `creates_since` later.
    pub fn call_marker(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn method_calls_since(&self, method: &str, marker: usize) -> usize {
        self.calls.lock()[marker..]
            .iter()
            .filter(|(_, m)| m == method)
            .count()
    }

    fn log(&self, model: &str, method: &str) {
        self.calls
            .lock()
            .push((model.to_string(), method.to_string()));
    }

    fn handle(&self, model: &str, method: &str, call_args: &Value, kwargs: &Value) -> Value {
        match method {
            "search_read" => {
                let domain = kwargs
                    .get("domain")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let fields: Vec<String> = kwargs
                    .get("fields")
                    .and_then(Value::as_array)
                    .map(|list| {
                        list.iter()
                            .filter_map(Value::as_str)
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default();
                let limit = kwargs.get("limit").and_then(Value::as_u64).unwrap_or(0) as usize;

                let store = self.store.lock();
                let mut results = Vec::new();
                if let Some(records) = store.records.get(model) {
                    for record in records.values() {
                        if eval_domain(&domain, record) {
                            results.push(project(record, &fields));
                            if limit != 0 && results.len() == limit {
                                break;
                            }
                        }
                    }
                }
                json!({"result": results})
            }
            "search_count" => {
                let domain = call_args
                    .get(0)
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let store = self.store.lock();
                let count = store
                    .records
                    .get(model)
                    .map(|records| {
                        records
                            .values()
                            .filter(|record| eval_domain(&domain, record))
                            .count()
                    })
                    .unwrap_or(0);
                json!({"result": count})
            }
            "create" => {
                if model == "sale.order.line" && self.fail_line_creates.load(Ordering::SeqCst) {
                    return json!({"error": {"message": "line create rejected"}});
                }
                let data_list = call_args
                    .get(0)
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let mut store = self.store.lock();
                let mut ids = Vec::new();
                for data in data_list {
                    let mut record = data.as_object().cloned().unwrap_or_default();
                    let line_commands = record.remove("order_line");
                    let id = store.allocate_id();
                    record.insert("id".to_string(), json!(id));
                    if model == "sale.order" && !record.contains_key("state") {
                        record.insert("state".to_string(), json!("draft"));
                    }
                    store
                        .records
                        .entry(model.to_string())
                        .or_default()
                        .insert(id, record);
                    if let Some(commands) = line_commands {
                        apply_line_commands(&mut store, id, &commands);
                    }
                    ids.push(id);
                }
                json!({"result": ids})
            }
            "write" => {
                let ids: Vec<i64> = call_args
                    .get(0)
                    .and_then(Value::as_array)
                    .map(|list| list.iter().filter_map(Value::as_i64).collect())
                    .unwrap_or_default();
                let mut data = call_args
                    .get(1)
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                let line_commands = data.remove("order_line");
                let mut store = self.store.lock();
                for id in &ids {
                    if let Some(record) = store
                        .records
                        .entry(model.to_string())
                        .or_default()
                        .get_mut(id)
                    {
                        record.extend(data.clone());
                    }
                    if let Some(commands) = &line_commands {
                        apply_line_commands(&mut store, *id, commands);
                    }
                }
                json!({"result": true})
            }
            "unlink" => {
                let ids: Vec<i64> = call_args
                    .get(0)
                    .and_then(Value::as_array)
                    .map(|list| list.iter().filter_map(Value::as_i64).collect())
                    .unwrap_or_default();
                let mut store = self.store.lock();
                if let Some(records) = store.records.get_mut(model) {
                    for id in ids {
                        records.remove(&id);
                    }
                }
                json!({"result": true})
            }
            "action_confirm" => {
                if self.fail_confirm.load(Ordering::SeqCst) {
                    return json!({"error": {"message": "confirmation rejected"}});
                }
                let ids: Vec<i64> = call_args
                    .get(0)
                    .and_then(Value::as_array)
                    .map(|list| list.iter().filter_map(Value::as_i64).collect())
                    .unwrap_or_default();
                let mut store = self.store.lock();
                for id in ids {
                    if let Some(record) = store
                        .records
                        .entry(model.to_string())
                        .or_default()
                        .get_mut(&id)
                    {
                        record.insert("state".to_string(), json!("sale"));
                    }
                }
                json!({"result": true})
            }
            other => json!({"error": {"message": format!("unsupported method {other}")}}),
        }
    }
}

#[async_trait]
impl ErpTransport for FakeErp {
    async fn call(&self, _url: &str, body: Value) -> ErpResult<Value> {
        let args = body["params"]["args"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        let model = args.get(3).and_then(Value::as_str).unwrap_or_default().to_string();
        let method = args.get(4).and_then(Value::as_str).unwrap_or_default().to_string();
        let call_args = args.get(5).cloned().unwrap_or(Value::Null);
        let kwargs = args.get(6).cloned().unwrap_or(Value::Null);

        self.log(&model, &method);
        Ok(self.handle(&model, &method, &call_args, &kwargs))
    }
}

/// Apply a header's relational line commands to the line store.
fn apply_line_commands(store: &mut Store, order_id: i64, commands: &Value) {
    let Some(commands) = commands.as_array() else {
        return;
    };
    for command in commands {
        let Some(triple) = command.as_array() else {
            continue;
        };
        let opcode = triple.get(0).and_then(Value::as_i64).unwrap_or(-1);
        let target = triple.get(1).and_then(Value::as_i64).unwrap_or(0);
        match opcode {
            // create
            0 => {
                let mut record = triple
                    .get(2)
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                let id = store.allocate_id();
                record.insert("id".to_string(), json!(id));
                record.insert("order_id".to_string(), json!(order_id));
                store
                    .records
                    .entry("sale.order.line".to_string())
                    .or_default()
                    .insert(id, record);
            }
            // update
            1 => {
                if let Some(record) = store
                    .records
                    .entry("sale.order.line".to_string())
                    .or_default()
                    .get_mut(&target)
                {
                    if let Some(data) = triple.get(2).and_then(Value::as_object) {
                        record.extend(data.clone());
                    }
                }
            }
            // delete / unlink
            2 | 3 => {
                store
                    .records
                    .entry("sale.order.line".to_string())
                    .or_default()
                    .remove(&target);
            }
            _ => {}
        }
    }
}

fn project(record: &Fields, fields: &[String]) -> Value {
    if fields.is_empty() {
        return Value::Object(record.clone());
    }
    let mut projected = Map::new();
    projected.insert("id".to_string(), record.get("id").cloned().unwrap_or(Value::Null));
    for field in fields {
        if let Some(value) = record.get(field) {
            projected.insert(field.clone(), value.clone());
        }
    }
    Value::Object(projected)
}

fn json_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn eval_condition(condition: &[Value], record: &Fields) -> bool {
    let field = condition.first().and_then(Value::as_str).unwrap_or_default();
    let operator = condition.get(1).and_then(Value::as_str).unwrap_or_default();
    let expected = condition.get(2).cloned().unwrap_or(Value::Null);
    let actual = record.get(field).cloned().unwrap_or(Value::Null);

    match operator {
        "=" => json_eq(&actual, &expected),
        "=ilike" => match (actual.as_str(), expected.as_str()) {
            (Some(a), Some(b)) => a.to_lowercase() == b.to_lowercase(),
            _ => false,
        },
        "in" => expected
            .as_array()
            .map(|list| list.iter().any(|value| json_eq(&actual, value)))
            .unwrap_or(false),
        _ => false,
    }
}

/// Evaluate a prefix-notation domain; consecutive top-level expressions
/// are implicitly AND-ed.
fn eval_domain(domain: &[Value], record: &Fields) -> bool {
    fn parse(items: &[Value], index: &mut usize, record: &Fields) -> bool {
        let Some(item) = items.get(*index) else {
            return true;
        };
        *index += 1;
        if let Some(op) = item.as_str() {
            let left = parse(items, index, record);
            let right = parse(items, index, record);
            match op {
                "&" => left && right,
                "|" => left || right,
                _ => true,
            }
        } else if let Some(condition) = item.as_array() {
            eval_condition(condition, record)
        } else {
            true
        }
    }

    let mut index = 0;
    let mut result = true;
    while index < domain.len() {
        result = parse(domain, &mut index, record) && result;
    }
    result
}

// ========== Fake commerce ==========

#[derive(Default)]
pub struct FakeCommerce {
    responses: Mutex<Vec<(String, Value)>>,
}

impl FakeCommerce {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue the `data` payload for the next call of `descriptor`.
    pub fn push(&self, descriptor: &QueryDescriptor, data: Value) {
        self.responses.lock().push((
            descriptor.query.to_string(),
            json!({"data": {descriptor.result_key: data}}),
        ));
    }
}

#[async_trait]
impl GraphQlTransport for FakeCommerce {
    async fn post(&self, _url: &str, _token: &str, body: Value) -> CommerceResult<Value> {
        let query = body["query"].as_str().unwrap_or_default().to_string();
        let mut responses = self.responses.lock();
        let position = responses.iter().position(|(q, _)| *q == query);
        match position {
            Some(position) => Ok(responses.remove(position).1),
            None => Err(CommerceError::Remote {
                status: 500,
                body: format!("no scripted response for query: {query}"),
            }),
        }
    }
}

// ========== Context assembly ==========

struct StaticFetcher {
    snapshot: ReferenceSnapshot,
}

#[async_trait]
impl SnapshotFetcher for StaticFetcher {
    async fn fetch(&self, _config: &ErpConfig) -> ErpResult<ReferenceSnapshot> {
        Ok(self.snapshot.clone())
    }
}

pub fn test_erp_config() -> Arc<ErpConfig> {
    Arc::new(ErpConfig {
        domain: "erp.test".to_string(),
        database: "testdb".to_string(),
        user_id: "1".to_string(),
        password: "secret".to_string(),
        access_key: "key".to_string(),
    })
}

/// A fresh per-request context over shared fakes, the way one inbound
/// event would get one. Run with `RUST_LOG=sync_engine=debug` to see the
/// engine's tracing output.
pub fn make_context(
    erp: Arc<FakeErp>,
    commerce: Arc<FakeCommerce>,
    snapshot: ReferenceSnapshot,
) -> SyncContext {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let erp_config = test_erp_config();
    let reference = Arc::new(ReferenceData::new(
        erp_config.clone(),
        Arc::new(StaticFetcher { snapshot }),
    ));
    let commerce_config = CommerceConfig::default()
        .with_storefront(
            "FM",
            Storefront {
                domain: "fm.test".to_string(),
                access_token: "token".to_string(),
            },
        )
        .with_storefront(
            "QF",
            Storefront {
                domain: "qf.test".to_string(),
                access_token: "token".to_string(),
            },
        );
    SyncContext::new(
        erp_config,
        erp,
        Arc::new(commerce_config),
        commerce,
        reference,
    )
}

/// Reference snapshot with the lookup data the order tests rely on.
pub fn base_snapshot() -> ReferenceSnapshot {
    let mut snapshot = ReferenceSnapshot::default();
    snapshot.sources.shopify = 900;
    snapshot.delivery_products.webship = 801;
    snapshot.delivery_products.twoship = 802;
    snapshot.delivery_carriers.push(DeliveryCarrier {
        id: 30,
        name: "Standard Shipping".to_string(),
        product_id: 801,
        delivery_type: "base_on_rule".to_string(),
    });
    snapshot.taxes.insert(
        "FM".to_string(),
        vec![TaxEntry {
            id: 71,
            name: "GST 5%".to_string(),
            description: "GST 5%".to_string(),
            amount: 5.0,
        }],
    );
    snapshot.taxes.insert(
        "QF".to_string(),
        vec![TaxEntry {
            id: 72,
            name: "HST 13%".to_string(),
            description: "HST 13%".to_string(),
            amount: 13.0,
        }],
    );
    let mut canada = CountryEntry {
        id: 38,
        ..Default::default()
    };
    canada.states.insert("ON".to_string(), StateEntry { id: 540 });
    canada.states.insert("BC".to_string(), StateEntry { id: 541 });
    snapshot.countries.insert("CA".to_string(), canada);
    snapshot.customer_types.individual = 11;
    snapshot.customer_types.business = 12;
    snapshot.payment_methods.shopify = 21;
    snapshot.sales_teams.consumer = SalesTeam { id: 31, user_id: 41 };
    snapshot.sales_teams.leads = SalesTeam { id: 32, user_id: 42 };
    snapshot.websites.commerce = 51;
    snapshot.pricelists.consumer = 61;
    snapshot.pricelists.wholesale.insert("QF".to_string(), 62);
    snapshot.pricelists.wholesale.insert("FM".to_string(), 63);
    snapshot.partner_roles.wholesale = 7;
    snapshot
}

// ========== Payload builders ==========

pub fn money_bag(amount: &str) -> Value {
    json!({
        "shopMoney": {"amount": amount, "currencyCode": "CAD"},
        "presentmentMoney": {"amount": amount, "currencyCode": "CAD"},
    })
}

pub fn gst_tax_line() -> Value {
    json!({
        "priceSet": money_bag("1.25"),
        "ratePercentage": 5.0,
        "title": "GST",
    })
}

pub fn address_json(id_number: u64) -> Value {
    json!({
        "id": format!("gid://shopify/MailingAddress/{id_number}"),
        "phone": "555-0100",
        "address1": "1 Main St",
        "address2": "",
        "city": "Toronto",
        "zip": "M1M 1M1",
        "name": "Jane Doe",
        "company": "",
        "provinceCode": "ON",
        "countryCodeV2": "CA",
    })
}

/// Full order payload. `lines` are `(gid number, sku, quantity)`.
pub fn order_json(name: &str, lines: &[(u64, &str, i64)]) -> Value {
    let edges: Vec<Value> = lines
        .iter()
        .map(|(number, sku, quantity)| {
            json!({
                "node": {
                    "id": format!("gid://shopify/LineItem/{number}"),
                    "name": format!("Item {sku}"),
                    "sku": sku,
                    "currentQuantity": quantity,
                    "discountedUnitPriceSet": money_bag("25.00"),
                    "taxLines": [gst_tax_line()],
                }
            })
        })
        .collect();

    json!({
        "id": "gid://shopify/Order/500",
        "name": name,
        "createdAt": "2025-06-11T17:00:00Z",
        "deliveryInstructions": {"key": "delivery_instructions", "value": "Ring twice"},
        "purchaseOrder": {"key": "purchase_order", "value": "PO-9"},
        "customer": {"id": "gid://shopify/Customer/9"},
        "customAttributes": [],
        "billingAddress": address_json(700),
        "shippingAddress": address_json(700),
        "lineItems": {"edges": edges},
        "shippingLine": {
            "id": "gid://shopify/ShippingLine/50",
            "title": "Standard Shipping",
            "source": "shopify",
            "discountedPriceSet": money_bag("10.00"),
            "taxLines": [gst_tax_line()],
        },
    })
}

pub fn order_from(value: Value) -> commerce_client::types::Order {
    serde_json::from_value(value).expect("order payload must decode")
}
