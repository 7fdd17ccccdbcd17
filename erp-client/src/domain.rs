//! Search-domain expressions
//!
//! ERP searches filter with an ordered sequence of `(field, operator,
//! value)` conditions, combined with explicit prefix boolean operators
//! when more than one condition applies. Consecutive conditions with no
//! prefix operator are implicitly AND-ed by the ERP.

use serde_json::{Map, Value, json};

/// A single `(field, operator, value)` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: String,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value,
        }
    }

    fn to_value(&self) -> Value {
        json!([self.field, self.operator, self.value])
    }
}

/// One element of a domain: a prefix operator or a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainNode {
    And,
    Or,
    Cond(Condition),
}

/// An ordered domain expression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Domain(Vec<DomainNode>);

impl Domain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single `field = value` condition.
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        let mut domain = Self::new();
        domain.push_eq(field, value);
        domain
    }

    pub fn push(&mut self, condition: Condition) {
        self.0.push(DomainNode::Cond(condition));
    }

    pub fn push_eq(&mut self, field: impl Into<String>, value: Value) {
        self.push(Condition::new(field, "=", value));
    }

    /// Case-insensitive match.
    pub fn push_eq_ilike(&mut self, field: impl Into<String>, value: Value) {
        self.push(Condition::new(field, "=ilike", value));
    }

    pub fn push_in(&mut self, field: impl Into<String>, values: Value) {
        self.push(Condition::new(field, "in", values));
    }

    pub fn push_and(&mut self) {
        self.0.push(DomainNode::And);
    }

    pub fn push_or(&mut self) {
        self.0.push(DomainNode::Or);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn nodes(&self) -> &[DomainNode] {
        &self.0
    }

    /// Build a domain from a flat field map. Operator selection follows
    /// value kind: strings match case-insensitively, numbers and booleans
    /// match exactly. Maps and lists have no domain form and are dropped.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let mut domain = Self::new();
        for (field, value) in map {
            match value {
                Value::String(_) => domain.push_eq_ilike(field.clone(), value.clone()),
                Value::Number(_) | Value::Bool(_) => domain.push_eq(field.clone(), value.clone()),
                _ => {}
            }
        }
        domain
    }

    /// Wire shape: a JSON list mixing `"&"`/`"|"` markers and condition
    /// triples.
    pub fn to_value(&self) -> Value {
        Value::Array(
            self.0
                .iter()
                .map(|node| match node {
                    DomainNode::And => json!("&"),
                    DomainNode::Or => json!("|"),
                    DomainNode::Cond(condition) => condition.to_value(),
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_map_selects_operator_by_kind() {
        let map = serde_json::from_value::<Map<String, Value>>(json!({
            "s": "x",
            "i": 1,
            "f": 20.0,
            "b": false,
            "m": {"nested": true},
            "l": [1, 2],
        }))
        .unwrap();

        let domain = Domain::from_map(&map);
        // map keys iterate sorted: b, f, i, l, m, s — l and m are dropped
        assert_eq!(
            domain.nodes(),
            &[
                DomainNode::Cond(Condition::new("b", "=", json!(false))),
                DomainNode::Cond(Condition::new("f", "=", json!(20.0))),
                DomainNode::Cond(Condition::new("i", "=", json!(1))),
                DomainNode::Cond(Condition::new("s", "=ilike", json!("x"))),
            ]
        );
    }

    #[test]
    fn test_wire_shape() {
        let mut domain = Domain::new();
        domain.push_or();
        domain.push_and();
        domain.push_eq("module", json!("__export__"));
        domain.push_eq("name", json!("shopify_order_1"));
        domain.push_and();
        domain.push_eq("module", json!("__export__"));
        domain.push_eq("name", json!("shopify_order_2"));

        assert_eq!(
            domain.to_value(),
            json!([
                "|",
                "&",
                ["module", "=", "__export__"],
                ["name", "=", "shopify_order_1"],
                "&",
                ["module", "=", "__export__"],
                ["name", "=", "shopify_order_2"],
            ])
        );
    }

    #[test]
    fn test_in_condition() {
        let mut domain = Domain::new();
        domain.push_in("default_code", json!(["SKU1", "SKU2"]));
        assert_eq!(
            domain.to_value(),
            json!([["default_code", "in", ["SKU1", "SKU2"]]])
        );
    }
}
