//! Payment-transaction synchronization
//!
//! Storefront transactions land as ERP payment transactions linked to the
//! synced order. A transaction that already reached a settled state in
//! the ERP is final and is never rewritten.

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Value, json};

use commerce_client::types::{Order, TransactionLike};
use erp_client::{Command, DATE_FORMAT, Domain, ErpContext, fields};
use shared::traverse::{Seg, i64_or, str_or};

use crate::context::SyncContext;
use crate::orders::ORDER_MODEL;
use crate::{SyncError, SyncResult, ids};

pub const TRANSACTION_MODEL: &str = "payment.transaction";

const GID_TRANSACTION_PREFIX: &str = "gid://shopify/OrderTransaction/";

impl SyncContext {
    /// Sync one transaction of an order. Returns `None` when there is
    /// nothing to reflect yet (unsettled upstream, unsupported kind, or a
    /// void without a parent).
    pub async fn sync_transaction(
        &self,
        order_gid: &str,
        transaction_gid: &str,
    ) -> SyncResult<Option<(i64, bool)>> {
        let storefront = self.companies.default_profile().storefront.clone();
        let order = self
            .commerce
            .order_with_transactions_by_id(&storefront, order_gid)
            .await?;

        let transaction = order
            .transactions
            .iter()
            .find(|tx| tx.id.as_deref() == Some(transaction_gid))
            .cloned()
            .ok_or_else(|| {
                SyncError::Lookup(format!(
                    "transaction {transaction_gid} not found on order {order_gid}"
                ))
            })?;

        if transaction.status != "SUCCESS" {
            // Not settled upstream yet; a later delivery will retry.
            return Ok(None);
        }

        match transaction.kind.as_str() {
            "AUTHORIZATION" => Ok(Some(
                self.upsert_order_transaction(&order, &transaction, "authorized")
                    .await?,
            )),
            "CAPTURE" => {
                let result = self
                    .upsert_order_transaction(&order, &transaction, "done")
                    .await?;
                if let Some(parent) = &transaction.parent_transaction {
                    if parent.id.is_some() {
                        self.upsert_order_transaction(&order, parent, "authorized")
                            .await?;
                    }
                }
                Ok(Some(result))
            }
            "SALE" => Ok(Some(
                self.upsert_order_transaction(&order, &transaction, "done")
                    .await?,
            )),
            "VOID" => match &transaction.parent_transaction {
                Some(parent) if parent.id.is_some() => Ok(Some(
                    self.upsert_order_transaction(&order, parent, "cancel")
                        .await?,
                )),
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }

    async fn upsert_order_transaction<T: TransactionLike>(
        &self,
        order: &Order,
        transaction: &T,
        set_state: &str,
    ) -> SyncResult<(i64, bool)> {
        let transaction_gid = transaction
            .id()
            .ok_or_else(|| SyncError::Lookup("transaction id missing".to_string()))?;
        let transaction_xid = ids::source_gid_to_xid(transaction_gid)?;

        let transaction_record = self
            .erp
            .read_record_by_xid(TRANSACTION_MODEL, &transaction_xid, &["id", "state"])
            .await?
            .map(Value::Object);
        let (erp_transaction_id, erp_state) = match &transaction_record {
            Some(record) => (
                i64_or(record, &[Seg::Key("id")], 0),
                str_or(record, &[Seg::Key("state")], "").to_string(),
            ),
            None => (0, String::new()),
        };
        if erp_transaction_id != 0 && erp_state.is_empty() {
            return Err(SyncError::Lookup(format!(
                "incorrect data for transaction {transaction_xid} (id: {erp_transaction_id}, state: {erp_state})"
            )));
        }
        if erp_transaction_id != 0 && erp_state != "authorized" {
            // Settled or cancelled in the ERP: nothing left to update.
            return Ok((erp_transaction_id, false));
        }

        let order_gid = order
            .id
            .as_deref()
            .ok_or_else(|| SyncError::Lookup("order id missing".to_string()))?;
        let order_xid = ids::source_gid_to_xid(order_gid)?;
        let order_record = self
            .erp
            .read_record_by_xid(
                ORDER_MODEL,
                &order_xid,
                &["id", "company_id", "commercial_partner_id", "name"],
            )
            .await?
            .map(Value::Object)
            .ok_or_else(|| SyncError::Lookup(format!("order {order_xid} not found in ERP")))?;

        let order_erp_id = i64_or(&order_record, &[Seg::Key("id")], 0);
        let company_id = i64_or(&order_record, &[Seg::Key("company_id"), Seg::Index(0)], 0);
        let partner_id = i64_or(
            &order_record,
            &[Seg::Key("commercial_partner_id"), Seg::Index(0)],
            0,
        );
        let order_name = str_or(&order_record, &[Seg::Key("name")], "").to_string();
        if order_erp_id == 0 || company_id == 0 || partner_id == 0 || order_name.is_empty() {
            return Err(SyncError::Lookup(format!(
                "incorrect data for order {order_xid} (id: {order_erp_id}, company: {company_id}, partner: {partner_id}, name: {order_name})"
            )));
        }

        let mut company_context = ErpContext::new();
        company_context.insert("allowed_company_ids".to_string(), json!([company_id]));
        let erp = self.erp.with_context(company_context);

        let currency_id = erp
            .search_id("res.currency", &Domain::eq("name", json!("CAD")), None)
            .await?;

        let mut acquirer_domain = Domain::new();
        acquirer_domain.push_eq("company_id", json!(company_id));
        acquirer_domain.push_eq_ilike("name", json!("shopify"));
        let acquirer_id = erp
            .search_first_id("payment.acquirer", &acquirer_domain, None)
            .await?
            .ok_or_else(|| {
                SyncError::Lookup(format!(
                    "no storefront payment acquirer for company {company_id}"
                ))
            })?;

        // Settled transactions carry the full amount; authorizations only
        // what is still unsettled.
        let amount = if set_state == "done" {
            transaction.amount()
        } else {
            transaction.unsettled_amount()
        }
        .to_f64()
        .unwrap_or_default();

        let transaction_number = transaction_gid
            .strip_prefix(GID_TRANSACTION_PREFIX)
            .unwrap_or(transaction_gid);
        let reference = format!("{order_name}-{transaction_number}");

        let state = if amount == 0.0 || set_state == "cancel" {
            "cancel"
        } else {
            set_state
        };
        let data = fields! {
            "reference": reference,
            "sale_order_ids": [Command::Set(vec![order_erp_id])],
            "acquirer_id": acquirer_id,
            "currency_id": currency_id,
            "amount": amount,
            "partner_id": partner_id,
            "acquirer_reference": transaction_number,
            "state": state,
            "last_state_change": Utc::now().format(DATE_FORMAT).to_string(),
        };

        if erp_transaction_id == 0 {
            let id = erp
                .create_with_xid(TRANSACTION_MODEL, data, &transaction_xid)
                .await?;
            tracing::info!(transaction = %transaction_xid, id, state, "created payment transaction");
            Ok((id, true))
        } else {
            erp.write(TRANSACTION_MODEL, erp_transaction_id, data, None)
                .await?;
            tracing::info!(transaction = %transaction_xid, id = erp_transaction_id, state, "updated payment transaction");
            Ok((erp_transaction_id, false))
        }
    }
}
