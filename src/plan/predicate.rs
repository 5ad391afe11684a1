//! Row predicates
//!
//! Filters rows strictly: no type coercion, no expressions, exact
//! match only. Missing fields and nulls never match.

use serde_json::Value;

use crate::exec::Row;

/// Filter operation types
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    /// Equality: field = value
    Eq(Value),
    /// Inequality: field != value (field must be present and non-null)
    Ne(Value),
    /// Greater than or equal: field >= value
    Gte(Value),
    /// Greater than: field > value
    Gt(Value),
    /// Less than or equal: field <= value
    Lte(Value),
    /// Less than: field < value
    Lt(Value),
}

impl FilterOp {
    /// Returns true if this is an equality-shaped operation
    pub fn is_equality(&self) -> bool {
        matches!(self, FilterOp::Eq(_) | FilterOp::Ne(_))
    }

    /// Returns true if this is a range operation
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            FilterOp::Gte(_) | FilterOp::Gt(_) | FilterOp::Lte(_) | FilterOp::Lt(_)
        )
    }

    /// Returns the operation name for diagnostics
    pub fn op_name(&self) -> &'static str {
        match self {
            FilterOp::Eq(_) => "eq",
            FilterOp::Ne(_) => "ne",
            FilterOp::Gte(_) => "gte",
            FilterOp::Gt(_) => "gt",
            FilterOp::Lte(_) => "lte",
            FilterOp::Lt(_) => "lt",
        }
    }
}

/// A single predicate (field + operation)
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Field name
    pub field: String,
    /// Filter operation
    pub op: FilterOp,
}

impl Predicate {
    /// Create an equality predicate
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq(value),
        }
    }

    /// Create an inequality predicate
    pub fn ne(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Ne(value),
        }
    }

    /// Create a range predicate (gte)
    pub fn gte(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Gte(value),
        }
    }

    /// Create a range predicate (gt)
    pub fn gt(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Gt(value),
        }
    }

    /// Create a range predicate (lte)
    pub fn lte(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Lte(value),
        }
    }

    /// Create a range predicate (lt)
    pub fn lt(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Lt(value),
        }
    }
}

/// Evaluates predicates against rows
pub struct PredicateFilter;

impl PredicateFilter {
    /// Checks if a row matches all predicates (AND semantics)
    pub fn matches(row: &Row, predicates: &[Predicate]) -> bool {
        predicates
            .iter()
            .all(|pred| Self::matches_predicate(row, pred))
    }

    /// Checks if a row matches a single predicate
    fn matches_predicate(row: &Row, predicate: &Predicate) -> bool {
        let field_value = match row.get(&predicate.field) {
            Some(v) => v,
            None => return false, // Missing field = no match
        };

        // Null values never match
        if field_value.is_null() {
            return false;
        }

        match &predicate.op {
            FilterOp::Eq(expected) => field_value == expected,
            FilterOp::Ne(expected) => field_value != expected,
            FilterOp::Gte(bound) => Self::cmp_match(field_value, bound, |o| o >= 0),
            FilterOp::Gt(bound) => Self::cmp_match(field_value, bound, |o| o > 0),
            FilterOp::Lte(bound) => Self::cmp_match(field_value, bound, |o| o <= 0),
            FilterOp::Lt(bound) => Self::cmp_match(field_value, bound, |o| o < 0),
        }
    }

    /// Ordered comparison; incomparable values never match
    fn cmp_match(actual: &Value, bound: &Value, accept: impl Fn(i8) -> bool) -> bool {
        match compare_values(actual, bound) {
            Some(ord) => accept(ord),
            None => false,
        }
    }
}

/// Total order over comparable value pairs
///
/// Numbers compare numerically (integers exactly where possible),
/// strings lexicographically. Mixed or unordered types return None.
/// Returns -1, 0, or 1.
pub fn compare_values(a: &Value, b: &Value) -> Option<i8> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(xi), Some(yi)) = (x.as_i64(), y.as_i64()) {
                return Some(ord_to_i8(xi.cmp(&yi)));
            }
            let (xf, yf) = (x.as_f64()?, y.as_f64()?);
            xf.partial_cmp(&yf).map(ord_to_i8)
        }
        (Value::String(x), Value::String(y)) => Some(ord_to_i8(x.cmp(y))),
        _ => None,
    }
}

fn ord_to_i8(ord: std::cmp::Ordering) -> i8 {
    match ord {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_equality_match() {
        let r = row(&[("name", json!("Hannah")), ("value", json!(10))]);

        let pred = Predicate::eq("name", json!("Hannah"));
        assert!(PredicateFilter::matches(&r, &[pred]));

        let pred = Predicate::eq("name", json!("Alex"));
        assert!(!PredicateFilter::matches(&r, &[pred]));
    }

    #[test]
    fn test_inequality_match() {
        let r = row(&[("sensitivity", json!(1))]);

        assert!(PredicateFilter::matches(&r, &[Predicate::ne("sensitivity", json!(0))]));
        assert!(!PredicateFilter::matches(&r, &[Predicate::ne("sensitivity", json!(1))]));
    }

    #[test]
    fn test_no_type_coercion() {
        let r = row(&[("value", json!(123))]);

        // String "123" should NOT match integer 123
        let pred = Predicate::eq("value", json!("123"));
        assert!(!PredicateFilter::matches(&r, &[pred]));

        // Integer 123 should match
        let pred = Predicate::eq("value", json!(123));
        assert!(PredicateFilter::matches(&r, &[pred]));
    }

    #[test]
    fn test_range_predicates() {
        let r = row(&[("value", json!(30))]);

        assert!(PredicateFilter::matches(&r, &[Predicate::gte("value", json!(30))]));
        assert!(PredicateFilter::matches(&r, &[Predicate::lte("value", json!(100))]));
        assert!(!PredicateFilter::matches(&r, &[Predicate::gt("value", json!(30))]));
        assert!(!PredicateFilter::matches(&r, &[Predicate::lt("value", json!(30))]));
    }

    #[test]
    fn test_float_and_int_compare_numerically() {
        let r = row(&[("value", json!(2.5))]);

        assert!(PredicateFilter::matches(&r, &[Predicate::gt("value", json!(2))]));
        assert!(PredicateFilter::matches(&r, &[Predicate::lt("value", json!(3))]));
    }

    #[test]
    fn test_string_range() {
        let r = row(&[("name", json!("Maya"))]);

        assert!(PredicateFilter::matches(&r, &[Predicate::gt("name", json!("Alex"))]));
        assert!(!PredicateFilter::matches(&r, &[Predicate::lt("name", json!("Hannah"))]));
    }

    #[test]
    fn test_multiple_predicates_and() {
        let r = row(&[("value", json!(30)), ("sensitivity", json!(0))]);

        let preds = vec![
            Predicate::gte("value", json!(10)),
            Predicate::eq("sensitivity", json!(0)),
        ];
        assert!(PredicateFilter::matches(&r, &preds));

        let preds = vec![
            Predicate::gte("value", json!(10)),
            Predicate::eq("sensitivity", json!(1)),
        ];
        assert!(!PredicateFilter::matches(&r, &preds));
    }

    #[test]
    fn test_missing_field_no_match() {
        let r = row(&[("name", json!("Hannah"))]);

        let pred = Predicate::eq("value", json!(30));
        assert!(!PredicateFilter::matches(&r, &[pred]));

        // Ne also fails on a missing field
        let pred = Predicate::ne("value", json!(30));
        assert!(!PredicateFilter::matches(&r, &[pred]));
    }

    #[test]
    fn test_null_value_no_match() {
        let r = row(&[("name", Value::Null)]);

        let pred = Predicate::eq("name", json!("Hannah"));
        assert!(!PredicateFilter::matches(&r, &[pred]));
    }

    #[test]
    fn test_incomparable_types_no_match() {
        let r = row(&[("value", json!("ten"))]);

        assert!(!PredicateFilter::matches(&r, &[Predicate::gt("value", json!(5))]));
    }

    #[test]
    fn test_compare_values_integer_exact() {
        assert_eq!(compare_values(&json!(2), &json!(3)), Some(-1));
        assert_eq!(compare_values(&json!(3), &json!(3)), Some(0));
        assert_eq!(compare_values(&json!(4), &json!(3)), Some(1));
        assert_eq!(compare_values(&json!(2), &json!("x")), None);
    }
}
