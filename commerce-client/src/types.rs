//! Typed Admin API payload model
//!
//! Decoding is strict (`deny_unknown_fields`): a query returning a field
//! the model does not know is a contract break, not something to ignore.
//! Missing fields default, so the same types serve both the minimal and
//! the full order queries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;

// ========== Connection wrappers ==========

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Edge<T> {
    #[serde(default)]
    pub cursor: Option<String>,
    pub node: T,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Edges<T> {
    #[serde(default = "Vec::new")]
    pub edges: Vec<Edge<T>>,
}

impl<T> Default for Edges<T> {
    fn default() -> Self {
        Self { edges: Vec::new() }
    }
}

impl<T> Edges<T> {
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.edges.get(index).map(|edge| &edge.node)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.edges.iter().map(|edge| &edge.node)
    }
}

// ========== Scalars ==========

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyVal {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Count {
    #[serde(default)]
    pub count: f64,
    #[serde(default)]
    pub precision: String,
}

/// Decimal amount carried as a string on the wire
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Money {
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub currency_code: String,
}

impl Money {
    pub fn amount(&self) -> Decimal {
        self.amount.parse().unwrap_or_default()
    }

    pub fn amount_f64(&self) -> f64 {
        self.amount().to_f64().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct MoneyBag {
    #[serde(default)]
    pub shop_money: Money,
    #[serde(default)]
    pub presentment_money: Money,
}

impl MoneyBag {
    pub fn amount(&self) -> Decimal {
        self.shop_money.amount()
    }

    pub fn amount_f64(&self) -> f64 {
        self.shop_money.amount_f64()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct EmailAddress {
    #[serde(default)]
    pub email_address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PhoneNumber {
    #[serde(default)]
    pub phone_number: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Identifiable {
    #[serde(default)]
    pub id: Option<String>,
}

// ========== Addresses ==========

/// Postal address. Customer addresses and company-location addresses
/// carry their province/country codes under different field names; the
/// accessors pick whichever is present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Address {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address1: String,
    #[serde(default)]
    pub address2: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub zip: String,

    // Customer address fields
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub company: String,
    #[serde(default, rename = "provinceCode")]
    pub customer_province_code: String,
    #[serde(default, rename = "countryCodeV2")]
    pub customer_country_code: String,

    // Company location address fields
    #[serde(default, rename = "firstName")]
    pub first_name: String,
    #[serde(default, rename = "lastName")]
    pub last_name: String,
    #[serde(default, rename = "companyName")]
    pub company_name: String,
    #[serde(default)]
    pub recipient: String,
    #[serde(default, rename = "zoneCode")]
    pub location_province_code: String,
    #[serde(default, rename = "countryCode")]
    pub location_country_code: String,
}

impl Address {
    pub fn province_code(&self) -> &str {
        if !self.customer_province_code.is_empty() {
            &self.customer_province_code
        } else {
            &self.location_province_code
        }
    }

    pub fn country_code(&self) -> &str {
        if !self.customer_country_code.is_empty() {
            &self.customer_country_code
        } else {
            &self.location_country_code
        }
    }
}

// ========== Customers and companies ==========

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CompanyContact {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub company: Identifiable,
    #[serde(default)]
    pub customer: Identifiable,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub is_main_contact: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Customer {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub default_email_address: EmailAddress,
    #[serde(default)]
    pub default_phone_number: PhoneNumber,
    #[serde(default)]
    pub default_address: Address,
    #[serde(default, rename = "companyContactProfiles")]
    pub company_contacts: Vec<CompanyContact>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CompanyLocation {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub billing_address: Address,
    #[serde(default)]
    pub shipping_address: Address,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Company {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub main_contact: CompanyContact,
    #[serde(default)]
    pub locations_count: Count,
    #[serde(default)]
    pub locations: Edges<CompanyLocation>,
}

// ========== Orders ==========

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct OrderTaxLine {
    #[serde(default, rename = "priceSet")]
    pub price: MoneyBag,
    #[serde(default)]
    pub rate_percentage: f64,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct OrderLine {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default, rename = "currentQuantity")]
    pub quantity: i64,
    #[serde(default, rename = "discountedUnitPriceSet")]
    pub unit_price: MoneyBag,
    #[serde(default)]
    pub tax_lines: Vec<OrderTaxLine>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct OrderShippingLine {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub carrier_identifier: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub delivery_category: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, rename = "discountedPriceSet")]
    pub price: MoneyBag,
    #[serde(default)]
    pub tax_lines: Vec<OrderTaxLine>,
}

/// Shared view over a transaction and its parent, so both drive the same
/// upsert.
pub trait TransactionLike {
    fn id(&self) -> Option<&str>;
    fn kind(&self) -> &str;
    fn status(&self) -> &str;
    fn amount(&self) -> Decimal;
    fn unsettled_amount(&self) -> Decimal;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct OrderParentTransaction {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub amount_set: MoneyBag,
    #[serde(default)]
    pub total_unsettled_set: MoneyBag,
    #[serde(default)]
    pub authorization_expires_at: Option<DateTime<Utc>>,
}

impl TransactionLike for OrderParentTransaction {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn kind(&self) -> &str {
        &self.kind
    }
    fn status(&self) -> &str {
        &self.status
    }
    fn amount(&self) -> Decimal {
        self.amount_set.amount()
    }
    fn unsettled_amount(&self) -> Decimal {
        self.total_unsettled_set.amount()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct OrderTransaction {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub parent_transaction: Option<OrderParentTransaction>,
    #[serde(default)]
    pub amount_set: MoneyBag,
    #[serde(default)]
    pub total_unsettled_set: MoneyBag,
    #[serde(default)]
    pub authorization_expires_at: Option<DateTime<Utc>>,
}

impl TransactionLike for OrderTransaction {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn kind(&self) -> &str {
        &self.kind
    }
    fn status(&self) -> &str {
        &self.status
    }
    fn amount(&self) -> Decimal {
        self.amount_set.amount()
    }
    fn unsettled_amount(&self) -> Decimal {
        self.total_unsettled_set.amount()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Order {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "statusPageUrl")]
    pub status_page_url: String,
    #[serde(default)]
    pub delivery_instructions: KeyVal,
    #[serde(default, rename = "purchaseOrder")]
    pub purchase_order_number: KeyVal,
    #[serde(default)]
    pub customer: Customer,
    #[serde(default)]
    pub custom_attributes: Vec<KeyVal>,
    #[serde(default)]
    pub billing_address: Address,
    #[serde(default)]
    pub shipping_address: Address,
    #[serde(default, rename = "lineItems")]
    pub lines: Edges<OrderLine>,
    #[serde(default)]
    pub shipping_line: OrderShippingLine,
    #[serde(default)]
    pub transactions: Vec<OrderTransaction>,
}

impl Order {
    /// Value of a custom attribute, if set.
    pub fn custom_attribute(&self, key: &str) -> Option<&str> {
        self.custom_attributes
            .iter()
            .find(|attr| attr.key == key)
            .map(|attr| attr.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_money_parses_decimal_string() {
        let money = Money {
            amount: "123.45".to_string(),
            currency_code: "CAD".to_string(),
        };
        assert_eq!(money.amount_f64(), 123.45);

        let empty = Money::default();
        assert_eq!(empty.amount_f64(), 0.0);
    }

    #[test]
    fn test_address_code_precedence() {
        let customer_style = Address {
            customer_province_code: "ON".to_string(),
            customer_country_code: "CA".to_string(),
            location_province_code: "BC".to_string(),
            location_country_code: "US".to_string(),
            ..Address::default()
        };
        assert_eq!(customer_style.province_code(), "ON");
        assert_eq!(customer_style.country_code(), "CA");

        let location_style = Address {
            location_province_code: "BC".to_string(),
            location_country_code: "CA".to_string(),
            ..Address::default()
        };
        assert_eq!(location_style.province_code(), "BC");
        assert_eq!(location_style.country_code(), "CA");
    }

    #[test]
    fn test_order_decodes_from_minimal_payload() {
        let order: Order = serde_json::from_value(json!({
            "id": "gid://shopify/Order/1",
            "name": "WEB1001",
            "customer": {"id": "gid://shopify/Customer/9"},
            "customAttributes": [{"key": "FarMetOrderId", "value": "77"}],
        }))
        .unwrap();

        assert_eq!(order.name, "WEB1001");
        assert_eq!(order.custom_attribute("FarMetOrderId"), Some("77"));
        assert_eq!(order.custom_attribute("Missing"), None);
        assert!(order.lines.is_empty());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result: Result<Customer, _> = serde_json::from_value(json!({
            "id": "gid://shopify/Customer/9",
            "unexpected": true,
        }));
        assert!(result.is_err());
    }
}
