//! # Metadata Filters
//!
//! Where-filters restrict queries and deletes to records whose metadata
//! matches a condition. Filters arrive as JSON objects:
//!
//! ```json
//! {"genre": "fantasy"}
//! {"year": {"$gte": 2000}}
//! {"$or": [{"genre": "fantasy"}, {"tags": {"$in": ["dragons", "magic"]}}]}
//! ```
//!
//! Several fields in one object are combined with AND. A field missing from a
//! record's metadata never matches.

use serde_json::Value;

use crate::errors::{StoreError, StoreResult};
use crate::Metadata;

/// Parsed where-filter
#[derive(Debug, Clone, PartialEq)]
pub enum WhereFilter {
    Field { field: String, condition: Condition },
    And(Vec<WhereFilter>),
    Or(Vec<WhereFilter>),
}

/// Condition on a single metadata field
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(f64),
    Gte(f64),
    Lt(f64),
    Lte(f64),
    In(Vec<Value>),
    Nin(Vec<Value>),
}

impl WhereFilter {
    pub fn parse(value: &Value) -> StoreResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| invalid(format!("expected an object, got {}", value)))?;
        if object.is_empty() {
            return Err(invalid("filter must contain at least one condition"));
        }

        let mut clauses = Vec::with_capacity(object.len());
        for (key, operand) in object {
            let clause = match key.as_str() {
                "$and" => WhereFilter::And(parse_clauses(key, operand)?),
                "$or" => WhereFilter::Or(parse_clauses(key, operand)?),
                op if op.starts_with('$') => {
                    return Err(invalid(format!("unknown logical operator '{}'", op)))
                }
                field => WhereFilter::Field {
                    field: field.to_string(),
                    condition: Condition::parse(operand)?,
                },
            };
            clauses.push(clause);
        }

        if clauses.len() == 1 {
            Ok(clauses.remove(0))
        } else {
            Ok(WhereFilter::And(clauses))
        }
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            WhereFilter::Field { field, condition } => metadata
                .get(field)
                .is_some_and(|value| condition.matches(value)),
            WhereFilter::And(clauses) => clauses.iter().all(|c| c.matches(metadata)),
            WhereFilter::Or(clauses) => clauses.iter().any(|c| c.matches(metadata)),
        }
    }
}

impl Condition {
    fn parse(operand: &Value) -> StoreResult<Self> {
        let Some(object) = operand.as_object() else {
            return Ok(Condition::Eq(operand.clone()));
        };
        if object.len() != 1 {
            return Err(invalid(format!(
                "field condition must hold exactly one operator, got {}",
                operand
            )));
        }
        let Some((op, value)) = object.iter().next() else {
            return Err(invalid("empty field condition"));
        };

        match op.as_str() {
            "$eq" => Ok(Condition::Eq(value.clone())),
            "$ne" => Ok(Condition::Ne(value.clone())),
            "$gt" => Ok(Condition::Gt(number_operand(op, value)?)),
            "$gte" => Ok(Condition::Gte(number_operand(op, value)?)),
            "$lt" => Ok(Condition::Lt(number_operand(op, value)?)),
            "$lte" => Ok(Condition::Lte(number_operand(op, value)?)),
            "$in" => Ok(Condition::In(list_operand(op, value)?)),
            "$nin" => Ok(Condition::Nin(list_operand(op, value)?)),
            other => Err(invalid(format!("unknown comparison operator '{}'", other))),
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            Condition::Eq(expected) => values_equal(value, expected),
            Condition::Ne(expected) => !values_equal(value, expected),
            Condition::Gt(bound) => value.as_f64().is_some_and(|v| v > *bound),
            Condition::Gte(bound) => value.as_f64().is_some_and(|v| v >= *bound),
            Condition::Lt(bound) => value.as_f64().is_some_and(|v| v < *bound),
            Condition::Lte(bound) => value.as_f64().is_some_and(|v| v <= *bound),
            Condition::In(options) => options.iter().any(|o| values_equal(value, o)),
            Condition::Nin(options) => !options.iter().any(|o| values_equal(value, o)),
        }
    }
}

/// JSON equality where `1` and `1.0` are the same number
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn parse_clauses(op: &str, operand: &Value) -> StoreResult<Vec<WhereFilter>> {
    let items = operand
        .as_array()
        .ok_or_else(|| invalid(format!("'{}' expects a list of filters", op)))?;
    if items.is_empty() {
        return Err(invalid(format!("'{}' expects at least one filter", op)));
    }
    items.iter().map(WhereFilter::parse).collect()
}

fn number_operand(op: &str, value: &Value) -> StoreResult<f64> {
    value
        .as_f64()
        .ok_or_else(|| invalid(format!("'{}' expects a number, got {}", op, value)))
}

fn list_operand(op: &str, value: &Value) -> StoreResult<Vec<Value>> {
    value
        .as_array()
        .cloned()
        .ok_or_else(|| invalid(format!("'{}' expects a list, got {}", op, value)))
}

fn invalid(message: impl Into<String>) -> StoreError {
    StoreError::InvalidFilter(message.into())
}
