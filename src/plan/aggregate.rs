//! Aggregate specifications and accumulation
//!
//! One accumulator per (group, aggregate) pair. Integer sums stay
//! exact until a float is seen; AVG always finalizes as a float.

use serde::Serialize;
use serde_json::Value;

use super::predicate::compare_values;

/// Supported aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AggregateOp {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateOp {
    /// Returns the function name for diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateOp::Count => "count",
            AggregateOp::Sum => "sum",
            AggregateOp::Avg => "avg",
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
        }
    }

    /// Returns true if scenario arithmetic can add and subtract this
    /// aggregate (MIN and MAX cannot be recomputed by subtraction)
    pub fn is_additive(&self) -> bool {
        matches!(self, AggregateOp::Count | AggregateOp::Sum | AggregateOp::Avg)
    }
}

/// One aggregate column of an aggregation operator
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSpec {
    /// Aggregate function
    pub op: AggregateOp,
    /// Input column; None means COUNT(*)
    pub column: Option<String>,
    /// Output column name
    pub output: String,
}

impl AggregateSpec {
    /// COUNT(*) over the group
    pub fn count_star(output: impl Into<String>) -> Self {
        Self {
            op: AggregateOp::Count,
            column: None,
            output: output.into(),
        }
    }

    /// COUNT(column), non-null values only
    pub fn count(column: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            op: AggregateOp::Count,
            column: Some(column.into()),
            output: output.into(),
        }
    }

    /// SUM(column)
    pub fn sum(column: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            op: AggregateOp::Sum,
            column: Some(column.into()),
            output: output.into(),
        }
    }

    /// AVG(column)
    pub fn avg(column: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            op: AggregateOp::Avg,
            column: Some(column.into()),
            output: output.into(),
        }
    }

    /// MIN(column)
    pub fn min(column: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            op: AggregateOp::Min,
            column: Some(column.into()),
            output: output.into(),
        }
    }

    /// MAX(column)
    pub fn max(column: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            op: AggregateOp::Max,
            column: Some(column.into()),
            output: output.into(),
        }
    }
}

/// Running state for one aggregate over one group
///
/// Tracks integer and float sums side by side; the integer sum is
/// authoritative until a float value is seen. Non-numeric values are
/// counted but do not contribute to sums or order.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    count: u64,
    sum_int: i64,
    sum_float: f64,
    saw_float: bool,
    min: Option<Value>,
    max: Option<Value>,
}

impl Accumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one non-null value
    pub fn add_value(&mut self, value: &Value) {
        self.count += 1;

        if let Value::Number(n) = value {
            if let Some(i) = n.as_i64() {
                self.sum_int = self.sum_int.wrapping_add(i);
                self.sum_float += i as f64;
            } else if let Some(f) = n.as_f64() {
                self.saw_float = true;
                self.sum_float += f;
            }
        }

        // Order is only defined for numbers and strings
        if value.is_number() || value.is_string() {
            let lower = match &self.min {
                None => true,
                Some(current) => compare_values(value, current) == Some(-1),
            };
            if lower {
                self.min = Some(value.clone());
            }
            let higher = match &self.max {
                None => true,
                Some(current) => compare_values(value, current) == Some(1),
            };
            if higher {
                self.max = Some(value.clone());
            }
        }
    }

    /// Count a row without a value (COUNT(*))
    pub fn add_row(&mut self) {
        self.count += 1;
    }

    /// Number of contributions seen
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Finalize into an output value for the given function
    ///
    /// SUM and AVG over zero contributions are null; COUNT is zero.
    pub fn finalize(&self, op: AggregateOp) -> Value {
        match op {
            AggregateOp::Count => Value::from(self.count),
            AggregateOp::Sum => {
                if self.count == 0 {
                    Value::Null
                } else if self.saw_float {
                    Value::from(self.sum_float)
                } else {
                    Value::from(self.sum_int)
                }
            }
            AggregateOp::Avg => {
                if self.count == 0 {
                    Value::Null
                } else {
                    Value::from(self.sum_float / self.count as f64)
                }
            }
            AggregateOp::Min => self.min.clone().unwrap_or(Value::Null),
            AggregateOp::Max => self.max.clone().unwrap_or(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sum_stays_integer() {
        let mut acc = Accumulator::new();
        acc.add_value(&json!(10));
        acc.add_value(&json!(100));
        acc.add_value(&json!(30));

        assert_eq!(acc.finalize(AggregateOp::Sum), json!(140));
    }

    #[test]
    fn test_sum_switches_to_float() {
        let mut acc = Accumulator::new();
        acc.add_value(&json!(10));
        acc.add_value(&json!(2.5));

        assert_eq!(acc.finalize(AggregateOp::Sum), json!(12.5));
    }

    #[test]
    fn test_count_and_count_star() {
        let mut acc = Accumulator::new();
        acc.add_value(&json!(1));
        acc.add_row();
        acc.add_row();

        assert_eq!(acc.finalize(AggregateOp::Count), json!(3));
    }

    #[test]
    fn test_avg_is_float() {
        let mut acc = Accumulator::new();
        acc.add_value(&json!(10));
        acc.add_value(&json!(30));

        assert_eq!(acc.finalize(AggregateOp::Avg), json!(20.0));
    }

    #[test]
    fn test_min_max() {
        let mut acc = Accumulator::new();
        acc.add_value(&json!(100));
        acc.add_value(&json!(10));
        acc.add_value(&json!(30));

        assert_eq!(acc.finalize(AggregateOp::Min), json!(10));
        assert_eq!(acc.finalize(AggregateOp::Max), json!(100));
    }

    #[test]
    fn test_min_max_strings() {
        let mut acc = Accumulator::new();
        acc.add_value(&json!("Hannah"));
        acc.add_value(&json!("Alex"));
        acc.add_value(&json!("Maya"));

        assert_eq!(acc.finalize(AggregateOp::Min), json!("Alex"));
        assert_eq!(acc.finalize(AggregateOp::Max), json!("Maya"));
    }

    #[test]
    fn test_empty_accumulator() {
        let acc = Accumulator::new();

        assert_eq!(acc.finalize(AggregateOp::Count), json!(0));
        assert_eq!(acc.finalize(AggregateOp::Sum), Value::Null);
        assert_eq!(acc.finalize(AggregateOp::Avg), Value::Null);
        assert_eq!(acc.finalize(AggregateOp::Min), Value::Null);
    }

    #[test]
    fn test_non_numeric_counts_but_does_not_sum() {
        let mut acc = Accumulator::new();
        acc.add_value(&json!(10));
        acc.add_value(&json!(true));

        assert_eq!(acc.finalize(AggregateOp::Count), json!(2));
        assert_eq!(acc.finalize(AggregateOp::Sum), json!(10));
    }

    #[test]
    fn test_additive_ops() {
        assert!(AggregateOp::Sum.is_additive());
        assert!(AggregateOp::Count.is_additive());
        assert!(AggregateOp::Avg.is_additive());
        assert!(!AggregateOp::Min.is_additive());
        assert!(!AggregateOp::Max.is_additive());
    }

    #[test]
    fn test_spec_constructors() {
        let spec = AggregateSpec::sum("value", "total");
        assert_eq!(spec.op, AggregateOp::Sum);
        assert_eq!(spec.column.as_deref(), Some("value"));
        assert_eq!(spec.output, "total");

        let star = AggregateSpec::count_star("n");
        assert_eq!(star.column, None);
    }
}
