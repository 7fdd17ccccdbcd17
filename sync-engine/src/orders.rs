//! Order reconciliation
//!
//! One sync call drives a commerce order into the ERP: addresses first,
//! then the batched product lookup, then the line diff, then the header
//! commit, then the individual line creates, then (for new orders only)
//! confirmation. The ordering is load-bearing: line commits need the
//! header id, confirmation needs committed lines.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value, json};

use commerce_client::types::{Order, OrderTaxLine};
use erp_client::command::commands_to_value;
use erp_client::{Command, DATE_FORMAT, Domain, ErpClient, ErpContext, Fields, fields};

use crate::context::{CompanyProfile, SyncContext};
use crate::partners::PARTNER_MODEL;
use crate::{SyncError, SyncResult, ids, schedule};

pub const ORDER_MODEL: &str = "sale.order";
pub const LINE_MODEL: &str = "sale.order.line";

/// Pseudo-SKU of the standard shipping product
pub const SHIPPING_SKU: &str = "WEBSHIP";
/// Pseudo-SKU of the expedited (2Ship) shipping product
pub const EXPEDITED_SHIPPING_SKU: &str = "2SHIP_DELIVERY";

/// Custom attribute naming the originating order on the other storefront
pub const CROSS_STOREFRONT_ATTR: &str = "FarMetOrderId";

/// Confirmed state of a sale order
const CONFIRMED_STATE: &str = "sale";

/// Staged line reconciliation: updates and deletes ride on the header's
/// relational command list; creates are issued individually afterwards,
/// keyed by the external id each new line will receive.
#[derive(Debug, Default)]
pub struct LineDiff {
    pub updates: Vec<(i64, Fields)>,
    pub creates: BTreeMap<String, Fields>,
    pub deletes: Vec<i64>,
}

impl LineDiff {
    /// Commands for the header commit (updates, then deletes). Creates
    /// are excluded: a newly created line has no id the header could
    /// reference.
    pub fn header_commands(&self) -> Vec<Command> {
        let mut commands: Vec<Command> = self
            .updates
            .iter()
            .map(|(id, data)| Command::Update(*id, data.clone()))
            .collect();
        commands.extend(self.deletes.iter().map(|id| Command::Delete(*id)));
        commands
    }
}

impl SyncContext {
    /// Sync a commerce order into the ERP. Returns the ERP order id and
    /// whether it was newly created.
    pub async fn sync_order(&self, gid: &str) -> SyncResult<(i64, bool)> {
        let default_storefront = self.companies.default_profile().storefront.clone();
        let minimal = self.commerce.order_minimal_by_id(&default_storefront, gid).await?;

        let customer_gid = minimal
            .customer
            .id
            .as_deref()
            .ok_or_else(|| SyncError::Lookup("order has no customer".to_string()))?;
        let customer_xid = ids::source_gid_to_xid(customer_gid)?;
        let customer_erp_id = self
            .erp
            .resolve_xid_id(PARTNER_MODEL, &customer_xid)
            .await?
            .ok_or_else(|| SyncError::Lookup(format!("customer {customer_xid} not found in ERP")))?;

        // An order placed on one storefront on behalf of the other
        // carries the originating order id; the full payload lives there.
        let order = match minimal
            .custom_attribute(CROSS_STOREFRONT_ATTR)
            .filter(|value| !value.is_empty())
        {
            Some(origin_id) => {
                let origin_gid = format!("gid://shopify/Order/{origin_id}");
                let storefront = self.companies.alternate_storefront().to_string();
                self.commerce.order_by_id(&storefront, &origin_gid).await?
            }
            None => self.commerce.order_by_id(&default_storefront, gid).await?,
        };

        self.prefetch_order_xids(&order).await?;
        self.sync_order_record(&order, customer_erp_id).await
    }

    /// Batch-resolve every external id the sync will touch with one
    /// query.
    async fn prefetch_order_xids(&self, order: &Order) -> SyncResult<()> {
        let Some(order_gid) = order.id.as_deref() else {
            return Ok(());
        };

        let mut entries = Vec::with_capacity(order.lines.len() + 4);
        entries.push(ids::source_gid_to_mapping(order_gid, ORDER_MODEL)?);
        for line in order.lines.iter() {
            if let Some(line_gid) = line.id.as_deref() {
                entries.push(ids::source_gid_to_mapping(line_gid, LINE_MODEL)?);
            }
        }
        if let Some(shipping_gid) = order.shipping_line.id.as_deref() {
            entries.push(ids::source_gid_to_mapping(shipping_gid, LINE_MODEL)?);
        }
        if let Some(address_gid) = order.shipping_address.id.as_deref() {
            entries.push(ids::source_gid_to_mapping(address_gid, PARTNER_MODEL)?);
        }
        if let Some(billing_gid) = order.billing_address.id.as_deref() {
            if order.billing_address.id != order.shipping_address.id {
                entries.push(ids::source_gid_to_mapping(billing_gid, PARTNER_MODEL)?);
            }
        }

        self.erp.prefetch_xids(&entries).await?;
        Ok(())
    }

    /// Reconcile one (fully fetched) order against the ERP.
    pub async fn sync_order_record(
        &self,
        order: &Order,
        customer_erp_id: i64,
    ) -> SyncResult<(i64, bool)> {
        let order_gid = order
            .id
            .as_deref()
            .ok_or_else(|| SyncError::Lookup("order id missing".to_string()))?;
        let order_xid = ids::source_gid_to_xid(order_gid)?;
        let existing_order = self.erp.resolve_xid_id(ORDER_MODEL, &order_xid).await?;

        // Addresses precede everything: the header references them.
        let shipping_address_id = self
            .ensure_address(customer_erp_id, &order.shipping_address, "delivery")
            .await?;
        let mut billing_address_id = shipping_address_id;
        if order.billing_address.id.is_some()
            && order.billing_address.id != order.shipping_address.id
        {
            billing_address_id = self
                .ensure_address(customer_erp_id, &order.billing_address, "invoice")
                .await?;
        }

        // Everything below runs scoped to the owning company.
        let company = self.companies.for_order_name(&order.name);
        let mut company_context = ErpContext::new();
        company_context.insert("allowed_company_ids".to_string(), json!([company.id]));
        let erp = self.erp.with_context(company_context);

        let created_at = order
            .created_at
            .ok_or_else(|| SyncError::Validation("order has no creation date".to_string()))?;

        let snapshot = self.reference.load().await?;
        let mut header = fields! {
            "partner_id": customer_erp_id,
            "partner_invoice_id": billing_address_id,
            "partner_shipping_id": shipping_address_id,
            "origin": order.name,
            "date_order": created_at.format(DATE_FORMAT).to_string(),
            "company_id": company.id,
            "customer_delivery_instructions": order.delivery_instructions.value,
            "client_order_ref": order.purchase_order_number.value,
            "recompute_delivery_price": false,
            "amount_delivery": 0,
            "no_handling_fee_reason": "Shopify",
        };
        if snapshot.sources.shopify != 0 {
            header.insert("source_id".to_string(), json!(snapshot.sources.shopify));
        }

        // Every SKU plus the shipping pseudo-SKU resolves in one lookup.
        let shipping_sku = if order.shipping_line.id.is_some()
            && order.shipping_line.source.to_lowercase().contains("2ship")
        {
            EXPEDITED_SHIPPING_SKU
        } else {
            SHIPPING_SKU
        };
        let mut skus: Vec<String> = order.lines.iter().map(|line| line.sku.clone()).collect();
        skus.push(shipping_sku.to_string());
        skus.sort();
        skus.dedup();

        let mut ids_by_sku: HashMap<String, i64> = HashMap::new();
        let mut product_context = ErpContext::new();
        product_context.insert("active_test".to_string(), json!(false));
        let mut product_domain = Domain::new();
        product_domain.push_in("default_code", json!(&skus));
        let products = erp
            .search_read(
                "product.product",
                &product_domain,
                &["id", "default_code"],
                0,
                Some(&product_context),
            )
            .await?;
        if products.len() != skus.len() {
            return Err(SyncError::Lookup(format!(
                "not all order products were found in the ERP: {skus:?}"
            )));
        }
        for product in &products {
            let sku = product
                .get("default_code")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let id = product.get("id").and_then(Value::as_i64).unwrap_or_default();
            ids_by_sku.insert(sku.to_string(), id);
        }

        let existing_line_ids = match existing_order {
            Some(order_id) => {
                erp.search_ids(LINE_MODEL, &Domain::eq("order_id", json!(order_id)), None)
                    .await?
            }
            None => Vec::new(),
        };

        let diff = self
            .build_line_diff(
                &erp,
                company,
                order,
                shipping_sku,
                &ids_by_sku,
                &existing_line_ids,
                &mut header,
            )
            .await?;
        header.insert(
            "order_line".to_string(),
            commands_to_value(&diff.header_commands()),
        );

        let (order_id, is_new) = match existing_order {
            None => {
                // Only first creation carries the commitment date.
                let scheduled =
                    schedule::compute_scheduled_date(created_at, company, &order.shipping_address);
                header.insert(
                    "commitment_date".to_string(),
                    json!(scheduled.format(DATE_FORMAT).to_string()),
                );
                let id = erp.create_with_xid(ORDER_MODEL, header, &order_xid).await?;
                tracing::info!(order = %order_xid, id, "created order");
                (id, true)
            }
            Some(id) => {
                erp.write(ORDER_MODEL, id, header, None).await?;
                tracing::info!(order = %order_xid, id, "updated order");
                (id, false)
            }
        };

        // New lines are created individually, each carrying its external
        // id. All lines are attempted before failures are reported so the
        // caller sees the full damage.
        let mut failures = Vec::new();
        for (line_xid, mut line_fields) in diff.creates {
            line_fields.insert("order_id".to_string(), json!(order_id));
            if let Err(error) = erp.create_with_xid(LINE_MODEL, line_fields, &line_xid).await {
                failures.push(format!("{line_xid}: {error}"));
            }
        }
        if !failures.is_empty() {
            let error = SyncError::PartialSync {
                order_xid: order_xid.clone(),
                failures,
                rolled_back: is_new,
            };
            if is_new {
                return Err(self.rollback_new_order(&erp, order_id, error).await);
            }
            return Err(error);
        }

        if is_new {
            if let Err(error) = self.confirm_order(&erp, order_id).await {
                return Err(self.rollback_new_order(&erp, order_id, error).await);
            }
        }

        Ok((order_id, is_new))
    }

    /// Stage the per-line reconciliation. Shipping rides along as a
    /// synthetic line, selecting (and if needed creating) its carrier.
    #[allow(clippy::too_many_arguments)]
    async fn build_line_diff(
        &self,
        erp: &ErpClient,
        company: &CompanyProfile,
        order: &Order,
        shipping_sku: &str,
        ids_by_sku: &HashMap<String, i64>,
        existing_line_ids: &[i64],
        header: &mut Fields,
    ) -> SyncResult<LineDiff> {
        let mut diff = LineDiff::default();
        let mut matched: Vec<i64> = Vec::new();
        let mut sequence = 1;

        for line in order.lines.iter() {
            let line_gid = line
                .id
                .as_deref()
                .ok_or_else(|| SyncError::Lookup("order line id missing".to_string()))?;
            let line_xid = ids::source_gid_to_xid(line_gid)?;
            let erp_line_id = erp.resolve_xid_id(LINE_MODEL, &line_xid).await?;

            let product_id = ids_by_sku.get(&line.sku).copied().ok_or_else(|| {
                SyncError::Lookup(format!("no product for SKU {}", line.sku))
            })?;
            let mut line_fields = fields! {
                "product_id": product_id,
                "name": line.name,
                "product_uom_qty": line.quantity,
                "price_unit": line.unit_price.amount_f64(),
                "sequence": sequence,
            };
            sequence += 1;

            let taxes = self.tax_line_ids(erp, company, &line.tax_lines).await?;
            line_fields.insert("tax_id".to_string(), commands_to_value(&[Command::Set(taxes)]));

            match erp_line_id {
                Some(id) => {
                    matched.push(id);
                    diff.updates.push((id, line_fields));
                }
                None => {
                    diff.creates.insert(line_xid, line_fields);
                }
            }
        }

        if let Some(shipping_gid) = order.shipping_line.id.as_deref() {
            let line_xid = ids::source_gid_to_xid(shipping_gid)?;
            let erp_line_id = erp.resolve_xid_id(LINE_MODEL, &line_xid).await?;

            let snapshot = self.reference.load().await?;
            let (carrier_name, delivery_type, carrier_product_id) =
                if shipping_sku == EXPEDITED_SHIPPING_SKU {
                    // The selected expedited service survives in the
                    // delivery notes.
                    let instructions = header
                        .get("customer_delivery_instructions")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    let appended = format!("{instructions}\n{}", order.shipping_line.title);
                    header.insert(
                        "customer_delivery_instructions".to_string(),
                        json!(appended.trim_matches(|c| c == ' ' || c == '\n')),
                    );
                    (
                        "2Ship".to_string(),
                        "twoship",
                        snapshot.delivery_products.twoship,
                    )
                } else {
                    (
                        order.shipping_line.title.clone(),
                        "base_on_rule",
                        snapshot.delivery_products.webship,
                    )
                };

            let carrier_id = self
                .reference
                .delivery_carrier_id(erp, &carrier_name, delivery_type, carrier_product_id)
                .await?;
            header.insert("carrier_id".to_string(), json!(carrier_id));
            header.insert(
                "amount_delivery".to_string(),
                json!(order.shipping_line.price.amount_f64()),
            );

            let mut line_fields = fields! {
                "product_id": carrier_product_id,
                "name": order.shipping_line.title,
                "product_uom_qty": 1,
                "price_unit": order.shipping_line.price.amount_f64(),
                "is_delivery": true,
                "sequence": sequence,
            };
            let taxes = self
                .tax_line_ids(erp, company, &order.shipping_line.tax_lines)
                .await?;
            line_fields.insert("tax_id".to_string(), commands_to_value(&[Command::Set(taxes)]));

            match erp_line_id {
                Some(id) => {
                    matched.push(id);
                    diff.updates.push((id, line_fields));
                }
                None => {
                    diff.creates.insert(line_xid, line_fields);
                }
            }
        }

        // Existing lines whose external id no longer appears in the
        // source order are deleted.
        for line_id in existing_line_ids {
            if !matched.contains(line_id) {
                diff.deletes.push(*line_id);
            }
        }

        Ok(diff)
    }

    /// Tax ids for a line's tax set, formatted as `"<title> <rate>%"`
    /// with a redundant `.00` trimmed.
    async fn tax_line_ids(
        &self,
        erp: &ErpClient,
        company: &CompanyProfile,
        tax_lines: &[OrderTaxLine],
    ) -> SyncResult<Vec<i64>> {
        let mut taxes = Vec::with_capacity(tax_lines.len());
        for tax_line in tax_lines {
            let name = format!("{} {:.2}%", tax_line.title, tax_line.rate_percentage)
                .replace(".00%", "%");
            let tax_id = self
                .reference
                .tax_id(erp, &company.code, company.id, &name, tax_line.rate_percentage)
                .await
                .map_err(|error| {
                    SyncError::Lookup(format!(
                        "could not resolve tax {name} for company {}: {error}",
                        company.id
                    ))
                })?;
            taxes.push(tax_id);
        }
        Ok(taxes)
    }

    async fn confirm_order(&self, erp: &ErpClient, order_id: i64) -> SyncResult<()> {
        let mut context = ErpContext::new();
        context.insert("followup_validation".to_string(), json!(false));
        context.insert("skip_preauth_payment".to_string(), json!(true));

        erp.execute_kw(
            ORDER_MODEL,
            "action_confirm",
            vec![json!([order_id])],
            Map::new(),
            Some(&context),
        )
        .await
        .map_err(|error| SyncError::Confirmation(format!("confirmation call failed: {error}")))?;

        let record = erp
            .search_read_by_id(ORDER_MODEL, order_id, &["state"])
            .await
            .map_err(|error| {
                SyncError::Confirmation(format!("could not read back the order state: {error}"))
            })?;
        let state = record.get("state").and_then(Value::as_str).unwrap_or_default();
        if state != CONFIRMED_STATE {
            return Err(SyncError::Confirmation(format!(
                "expected state `{CONFIRMED_STATE}` after confirmation, got `{state}`"
            )));
        }
        Ok(())
    }

    /// Unlink a header that must not survive (new order with failed lines
    /// or failed confirmation). A failed compensation is appended to the
    /// original error, never swapped for it.
    async fn rollback_new_order(
        &self,
        erp: &ErpClient,
        order_id: i64,
        original: SyncError,
    ) -> SyncError {
        tracing::warn!(order_id, error = %original, "rolling back newly created order");
        match erp.unlink(ORDER_MODEL, order_id, None).await {
            Ok(()) => original,
            Err(rollback_error) => SyncError::Compensation {
                original: Box::new(original),
                rollback: rollback_error.to_string(),
            },
        }
    }
}
