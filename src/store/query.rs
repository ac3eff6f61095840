//! Record queries
//!
//! A query is a conjunction of field predicates evaluated against the
//! stored JSON document: every predicate must match (AND semantics),
//! with strict comparison and no type coercion. A missing or null
//! field never matches. An absent query means match-all.

use serde_json::Value;

/// Comparison operator of one predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    /// Exact equality (no coercion)
    Eq(Value),
    /// Greater than (numbers and strings)
    Gt(Value),
    /// Greater than or equal (numbers and strings)
    Gte(Value),
    /// Less than (numbers and strings)
    Lt(Value),
    /// Less than or equal (numbers and strings)
    Lte(Value),
}

/// One field predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Top-level field name in the stored document
    pub field: String,
    /// Comparison to apply
    pub op: FilterOp,
}

/// Conjunction of predicates over a record's fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    predicates: Vec<Predicate>,
}

impl Query {
    /// Empty query; matches every record until predicates are added.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, field: impl Into<String>, op: FilterOp) -> Self {
        self.predicates.push(Predicate {
            field: field.into(),
            op,
        });
        self
    }

    /// Require `field == value`.
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, FilterOp::Eq(value.into()))
    }

    /// Require `field > value`.
    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, FilterOp::Gt(value.into()))
    }

    /// Require `field >= value`.
    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, FilterOp::Gte(value.into()))
    }

    /// Require `field < value`.
    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, FilterOp::Lt(value.into()))
    }

    /// Require `field <= value`.
    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, FilterOp::Lte(value.into()))
    }

    /// The predicates of this query.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Whether `document` satisfies every predicate.
    pub fn matches(&self, document: &Value) -> bool {
        self.predicates.iter().all(|p| Self::matches_predicate(document, p))
    }

    fn matches_predicate(document: &Value, predicate: &Predicate) -> bool {
        let actual = match document.get(&predicate.field) {
            Some(v) => v,
            None => return false,
        };
        if actual.is_null() {
            return false;
        }

        match &predicate.op {
            FilterOp::Eq(expected) => actual == expected,
            FilterOp::Gt(bound) => Self::ordered(actual, bound, |o| o == std::cmp::Ordering::Greater),
            FilterOp::Gte(bound) => Self::ordered(actual, bound, |o| o != std::cmp::Ordering::Less),
            FilterOp::Lt(bound) => Self::ordered(actual, bound, |o| o == std::cmp::Ordering::Less),
            FilterOp::Lte(bound) => Self::ordered(actual, bound, |o| o != std::cmp::Ordering::Greater),
        }
    }

    /// Ordered comparison for numbers and strings only; mixed or
    /// unordered types never match.
    fn ordered(actual: &Value, bound: &Value, accept: impl Fn(std::cmp::Ordering) -> bool) -> bool {
        match (actual, bound) {
            (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b).map_or(false, &accept),
                _ => false,
            },
            (Value::String(a), Value::String(b)) => accept(a.cmp(b)),
            _ => false,
        }
    }
}
