//! Query documents
//!
//! Each document selects exactly the fields the payload model in `types`
//! decodes; decoding is strict, so the two must move together.

use crate::client::QueryDescriptor;

pub const CUSTOMER: QueryDescriptor = QueryDescriptor {
    result_key: "customer",
    query: "query Customer($id: ID!) { customer(id: $id) { \
        id displayName \
        defaultEmailAddress { emailAddress } \
        defaultPhoneNumber { phoneNumber } \
        defaultAddress { id phone address1 address2 city zip name company provinceCode countryCodeV2 } \
        companyContactProfiles { id company { id } customer { id } title isMainContact } } }",
};

pub const COMPANY: QueryDescriptor = QueryDescriptor {
    result_key: "company",
    query: "query Company($id: ID!) { company(id: $id) { \
        id name note \
        mainContact { id company { id } customer { id } title isMainContact } \
        locationsCount { count precision } \
        locations(first: 5) { edges { cursor node { id phone note \
            billingAddress { id phone address1 address2 city zip firstName lastName companyName recipient zoneCode countryCode } \
            shippingAddress { id phone address1 address2 city zip firstName lastName companyName recipient zoneCode countryCode } } } } } }",
};

pub const ORDER_MINIMAL: QueryDescriptor = QueryDescriptor {
    result_key: "order",
    query: "query OrderMinimal($id: ID!) { order(id: $id) { \
        id name customer { id } customAttributes { key value } } }",
};

pub const ORDER: QueryDescriptor = QueryDescriptor {
    result_key: "order",
    query: "query Order($id: ID!) { order(id: $id) { \
        id name createdAt statusPageUrl \
        deliveryInstructions: metafield(namespace: \"custom\", key: \"delivery_instructions\") { key value } \
        purchaseOrder: metafield(namespace: \"custom\", key: \"purchase_order\") { key value } \
        customer { id displayName \
            defaultEmailAddress { emailAddress } \
            defaultPhoneNumber { phoneNumber } \
            defaultAddress { id phone address1 address2 city zip name company provinceCode countryCodeV2 } \
            companyContactProfiles { id company { id } customer { id } title isMainContact } } \
        customAttributes { key value } \
        billingAddress { id phone address1 address2 city zip name company provinceCode countryCodeV2 } \
        shippingAddress { id phone address1 address2 city zip name company provinceCode countryCodeV2 } \
        lineItems(first: 100) { edges { cursor node { id name sku currentQuantity \
            discountedUnitPriceSet { shopMoney { amount currencyCode } presentmentMoney { amount currencyCode } } \
            taxLines { priceSet { shopMoney { amount currencyCode } presentmentMoney { amount currencyCode } } ratePercentage title } } } } \
        shippingLine { id title carrierIdentifier code deliveryCategory source \
            discountedPriceSet { shopMoney { amount currencyCode } presentmentMoney { amount currencyCode } } \
            taxLines { priceSet { shopMoney { amount currencyCode } presentmentMoney { amount currencyCode } } ratePercentage title } } } }",
};

pub const ORDER_WITH_TRANSACTIONS: QueryDescriptor = QueryDescriptor {
    result_key: "order",
    query: "query OrderWithTransactions($id: ID!) { order(id: $id) { \
        id name \
        customer { id } \
        transactions { id kind status \
            parentTransaction { id kind status \
                amountSet { shopMoney { amount currencyCode } presentmentMoney { amount currencyCode } } \
                totalUnsettledSet { shopMoney { amount currencyCode } presentmentMoney { amount currencyCode } } \
                authorizationExpiresAt } \
            amountSet { shopMoney { amount currencyCode } presentmentMoney { amount currencyCode } } \
            totalUnsettledSet { shopMoney { amount currencyCode } presentmentMoney { amount currencyCode } } \
            authorizationExpiresAt } } }",
};
