//! Customer, company, and address upsert
//!
//! Every commerce contact maps to an ERP partner keyed by its external
//! id: create-with-assignment when absent, write-in-place when present.
//! The required-field gate runs before any write, so a rejected contact
//! leaves no partial record behind.

use serde_json::{Value, json};

use commerce_client::types::{Address, Customer};
use erp_client::command::commands_to_value;
use erp_client::{Command, Fields, fields};

use crate::context::SyncContext;
use crate::{SyncError, SyncResult, ids};

pub const PARTNER_MODEL: &str = "res.partner";

/// Reference prefix for individual customers
const CUSTOMER_REF_PREFIX: &str = "SHCU";
/// Reference prefix for companies
const COMPANY_REF_PREFIX: &str = "SHCC";

impl SyncContext {
    /// Sync a commerce customer to an ERP partner. Company-contact
    /// customers are attached to their (already synced) parent company;
    /// individuals get the consumer defaults.
    pub async fn sync_customer(&self, gid: &str) -> SyncResult<(i64, bool)> {
        let storefront = self.companies.default_profile().storefront.clone();
        let customer = self.commerce.customer_by_id(&storefront, gid).await?;

        if customer.company_contacts.is_empty() {
            self.sync_individual_customer(&customer).await
        } else {
            self.sync_company_contact(&storefront, &customer).await
        }
    }

    async fn sync_company_contact(
        &self,
        storefront: &str,
        customer: &Customer,
    ) -> SyncResult<(i64, bool)> {
        let contact = &customer.company_contacts[0];
        let company_gid = contact
            .company
            .id
            .as_deref()
            .ok_or_else(|| SyncError::Lookup("company id missing for company contact".to_string()))?;

        let company_xid = ids::source_gid_to_xid(company_gid)?;
        let company_erp_id = self
            .erp
            .resolve_xid_id(PARTNER_MODEL, &company_xid)
            .await?
            .ok_or_else(|| SyncError::Lookup(format!("company {company_xid} not found in ERP")))?;

        let company = self.commerce.company_by_id(storefront, company_gid).await?;
        let location = company.locations.get(0).ok_or_else(|| {
            SyncError::Lookup(format!("no locations found for company {company_gid}"))
        })?;
        let address = if location.billing_address.id.is_some() {
            &location.billing_address
        } else if location.shipping_address.id.is_some() {
            &location.shipping_address
        } else {
            return Err(SyncError::Lookup(format!(
                "no location address found for company {company_gid}"
            )));
        };

        let mut extra = fields! {
            "parent_id": company_erp_id,
            "type": "contact",
            "function": contact.title,
        };
        let snapshot = self.reference.load().await?;
        let wholesale_role = snapshot.partner_roles.wholesale;
        if wholesale_role != 0 {
            let command = if contact.is_main_contact {
                Command::Link(wholesale_role)
            } else {
                Command::Unlink(wholesale_role)
            };
            extra.insert(
                "contact_role_code_ids".to_string(),
                commands_to_value(&[command]),
            );
        }

        self.upsert_customer_partner(customer, Some(address), extra, None)
            .await
    }

    async fn sync_individual_customer(&self, customer: &Customer) -> SyncResult<(i64, bool)> {
        let snapshot = self.reference.load().await?;

        let mut create_data = Fields::new();
        if snapshot.customer_types.individual != 0 {
            create_data.insert("customer_type_id".to_string(), json!(snapshot.customer_types.individual));
        }
        if snapshot.payment_methods.shopify != 0 {
            create_data.insert(
                "customer_payment_method_id".to_string(),
                json!(snapshot.payment_methods.shopify),
            );
        }
        if snapshot.sales_teams.consumer.id != 0 {
            create_data.insert("team_id".to_string(), json!(snapshot.sales_teams.consumer.id));
        }
        if snapshot.sales_teams.consumer.user_id != 0 {
            create_data.insert("user_id".to_string(), json!(snapshot.sales_teams.consumer.user_id));
        }
        if snapshot.websites.commerce != 0 {
            create_data.insert("website_id".to_string(), json!(snapshot.websites.commerce));
        }
        if snapshot.pricelists.consumer != 0 {
            // Individuals buy at consumer prices from every company.
            for profile in self.companies.profiles() {
                create_data.insert(
                    format!("{}_pricelist_id", profile.code.to_lowercase()),
                    json!(snapshot.pricelists.consumer),
                );
            }
        }
        if snapshot.sources.shopify != 0 {
            create_data.insert("source_id".to_string(), json!(snapshot.sources.shopify));
        }

        self.upsert_customer_partner(
            customer,
            Some(&customer.default_address),
            Fields::new(),
            Some(create_data),
        )
        .await
    }

    /// Upsert the partner row for a customer. The invariant gate runs on
    /// the fully merged field map: name, email, and a resolved country are
    /// required, and the name must differ from the email (equal values
    /// mean no real name was supplied).
    async fn upsert_customer_partner(
        &self,
        customer: &Customer,
        address: Option<&Address>,
        extra: Fields,
        create_data: Option<Fields>,
    ) -> SyncResult<(i64, bool)> {
        let customer_gid = customer
            .id
            .as_deref()
            .ok_or_else(|| SyncError::Lookup("customer id missing".to_string()))?;
        let customer_xid = ids::source_gid_to_xid(customer_gid)?;
        let existing = self.erp.resolve_xid_id(PARTNER_MODEL, &customer_xid).await?;

        let mut data = self.customer_fields(customer, address).await?;
        data.extend(extra);

        let name = data.get("name").and_then(Value::as_str).unwrap_or_default();
        let email = data.get("email").and_then(Value::as_str).unwrap_or_default();
        let country_id = data.get("country_id").and_then(Value::as_i64).unwrap_or_default();
        if name == email || country_id == 0 {
            return Err(SyncError::Validation(
                "name, email, and country are required to process a customer".to_string(),
            ));
        }

        match existing {
            None => {
                if let Some(create_extra) = create_data {
                    data.extend(create_extra);
                }
                let id = self
                    .erp
                    .create_with_xid(PARTNER_MODEL, data, &customer_xid)
                    .await?;
                tracing::info!(customer = %customer_xid, id, "created customer partner");
                Ok((id, true))
            }
            Some(id) => {
                self.erp.write(PARTNER_MODEL, id, data, None).await?;
                tracing::info!(customer = %customer_xid, id, "updated customer partner");
                Ok((id, false))
            }
        }
    }

    /// Sync a commerce company to an ERP partner. Companies require a
    /// fully resolvable location address (country and state).
    pub async fn sync_company(&self, gid: &str) -> SyncResult<(i64, bool)> {
        let storefront = self.companies.default_profile().storefront.clone();
        let company = self.commerce.company_by_id(&storefront, gid).await?;
        let company_gid = company
            .id
            .as_deref()
            .ok_or_else(|| SyncError::Lookup("company id missing".to_string()))?;

        let xid = ids::source_gid_to_xid(company_gid)?;
        let existing = self.erp.resolve_xid_id(PARTNER_MODEL, &xid).await?;

        let location = company.locations.get(0).ok_or_else(|| {
            SyncError::Lookup(format!("no locations found for company {company_gid}"))
        })?;
        let address = if location.billing_address.id.is_some() {
            &location.billing_address
        } else if location.shipping_address.id.is_some() {
            &location.shipping_address
        } else {
            return Err(SyncError::Lookup(format!(
                "no location address found for company {company_gid}"
            )));
        };

        let (country_id, state_id) = self
            .reference
            .country_and_state_ids(&self.erp, address.country_code(), address.province_code())
            .await?;
        let (Some(country_id), Some(state_id)) = (country_id, state_id) else {
            return Err(SyncError::Lookup(format!(
                "location address with unresolved country or state for company {company_gid}"
            )));
        };

        let reference = format!("{COMPANY_REF_PREFIX}{}", ids::gid_last_segment(company_gid));
        let mut data = fields! {
            "ref": reference,
            "name": company.name,
            "phone": location.phone,
            "mobile": location.phone,
            // TODO: source the company email from a storefront metafield once one is defined
            "email": "",
            "active": true,
            "is_company": true,
            "is_customer": true,
            "company_id": false,
            "website_id": false,
            "street": address.address1,
            "street2": address.address2,
            "city": address.city,
            "state_id": state_id,
            "country_id": country_id,
            "zip": address.zip,
        };

        match existing {
            None => {
                let snapshot = self.reference.load().await?;
                if snapshot.customer_types.business != 0 {
                    data.insert("customer_type_id".to_string(), json!(snapshot.customer_types.business));
                }
                if snapshot.payment_methods.shopify != 0 {
                    data.insert(
                        "customer_payment_method_id".to_string(),
                        json!(snapshot.payment_methods.shopify),
                    );
                }
                if snapshot.sales_teams.leads.id != 0 {
                    data.insert("team_id".to_string(), json!(snapshot.sales_teams.leads.id));
                }
                if snapshot.sales_teams.leads.user_id != 0 {
                    data.insert("user_id".to_string(), json!(snapshot.sales_teams.leads.user_id));
                }
                if snapshot.websites.commerce != 0 {
                    data.insert("website_id".to_string(), json!(snapshot.websites.commerce));
                }
                for profile in self.companies.profiles() {
                    if let Some(pricelist) = snapshot.pricelists.wholesale.get(&profile.code) {
                        if *pricelist != 0 {
                            data.insert(
                                format!("{}_pricelist_id", profile.code.to_lowercase()),
                                json!(pricelist),
                            );
                        }
                    }
                }
                if snapshot.sources.shopify != 0 {
                    data.insert("source_id".to_string(), json!(snapshot.sources.shopify));
                }

                let id = self.erp.create_with_xid(PARTNER_MODEL, data, &xid).await?;
                tracing::info!(company = %xid, id, "created company partner");
                Ok((id, true))
            }
            Some(id) => {
                self.erp.write(PARTNER_MODEL, id, data, None).await?;
                tracing::info!(company = %xid, id, "updated company partner");
                Ok((id, false))
            }
        }
    }

    /// Upsert a delivery/invoice address as a child partner of the
    /// customer.
    pub(crate) async fn ensure_address(
        &self,
        customer_erp_id: i64,
        address: &Address,
        kind: &str,
    ) -> SyncResult<i64> {
        let address_gid = address
            .id
            .as_deref()
            .ok_or_else(|| SyncError::Lookup("address id missing".to_string()))?;
        let xid = ids::source_gid_to_xid(address_gid)?;

        let extra = fields! {
            "parent_id": customer_erp_id,
            "type": kind,
        };
        let data = self.address_fields(Some(address), extra).await?;

        match self.erp.resolve_xid_id(PARTNER_MODEL, &xid).await? {
            None => Ok(self
                .erp
                .create_with_xid(PARTNER_MODEL, data, &xid)
                .await?),
            Some(id) => {
                self.erp.write(PARTNER_MODEL, id, data, None).await?;
                Ok(id)
            }
        }
    }

    /// Partner fields for a postal address, with country/state resolved
    /// through the reference data. `extra` wins over the address fields.
    async fn address_fields(&self, address: Option<&Address>, extra: Fields) -> SyncResult<Fields> {
        let mut map = Fields::new();
        if let Some(address) = address.filter(|address| address.id.is_some()) {
            map.insert("name".to_string(), json!(address.name));
            map.insert("street".to_string(), json!(address.address1));
            map.insert("street2".to_string(), json!(address.address2));
            map.insert("city".to_string(), json!(address.city));
            map.insert("zip".to_string(), json!(address.zip));
            map.insert("phone".to_string(), json!(address.phone));
            map.insert("mobile".to_string(), json!(address.phone));

            let (country_id, state_id) = self
                .reference
                .country_and_state_ids(&self.erp, address.country_code(), address.province_code())
                .await?;
            if let Some(country_id) = country_id {
                map.insert("country_id".to_string(), json!(country_id));
            }
            if let Some(state_id) = state_id {
                map.insert("state_id".to_string(), json!(state_id));
            }
        }
        map.extend(extra);
        Ok(map)
    }

    /// Partner fields for a customer record layered over its address.
    async fn customer_fields(
        &self,
        customer: &Customer,
        address: Option<&Address>,
    ) -> SyncResult<Fields> {
        let reference = customer
            .id
            .as_deref()
            .map(|gid| format!("{CUSTOMER_REF_PREFIX}{}", ids::gid_last_segment(gid)))
            .unwrap_or_default();

        let extra = fields! {
            "ref": reference,
            "name": customer.display_name,
            "phone": customer.default_phone_number.phone_number,
            "mobile": customer.default_phone_number.phone_number,
            "email": customer.default_email_address.email_address,
            "active": true,
            "is_company": false,
            "is_customer": true,
            "company_id": false,
        };
        self.address_fields(address, extra).await
    }
}
