//! Row representation
//!
//! Rows are flat JSON objects with ordered keys, so serialization and
//! grouping keys are deterministic.

use std::collections::BTreeMap;

use serde_json::Value;

use super::errors::{ExecError, ExecResult};

/// A single tuple: column name to value
pub type Row = BTreeMap<String, Value>;

/// Convert a JSON object into a row
///
/// Nested objects and arrays are rejected; the executor is strictly
/// first normal form.
pub fn row_from_object(value: Value) -> ExecResult<Row> {
    let object = match value {
        Value::Object(map) => map,
        other => {
            return Err(ExecError::invalid_row(format!(
                "row must be a JSON object, got {}",
                type_name(&other)
            )))
        }
    };
    let mut row = Row::new();
    for (key, value) in object {
        if value.is_object() || value.is_array() {
            return Err(ExecError::invalid_row(format!(
                "column '{}' must be a scalar, got {}",
                key,
                type_name(&value)
            )));
        }
        row.insert(key, value);
    }
    Ok(row)
}

/// Merge two rows for a join output
///
/// Right-hand columns win on a name clash.
pub fn merge_rows(left: &Row, right: &Row) -> Row {
    let mut merged = left.clone();
    for (key, value) in right {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_from_object() {
        let row = row_from_object(json!({"id": "o1", "value": 10})).unwrap();
        assert_eq!(row.get("id"), Some(&json!("o1")));
        assert_eq!(row.get("value"), Some(&json!(10)));
    }

    #[test]
    fn test_non_object_rejected() {
        let err = row_from_object(json!([1, 2])).unwrap_err();
        assert_eq!(err.code().code(), "LIN_EXEC_INVALID_ROW");
    }

    #[test]
    fn test_nested_value_rejected() {
        let err = row_from_object(json!({"meta": {"a": 1}})).unwrap_err();
        assert_eq!(err.code().code(), "LIN_EXEC_INVALID_ROW");
    }

    #[test]
    fn test_merge_right_wins() {
        let left = row_from_object(json!({"id": "c1", "name": "Hannah"})).unwrap();
        let right = row_from_object(json!({"id": "o1", "value": 10})).unwrap();

        let merged = merge_rows(&left, &right);
        assert_eq!(merged.get("id"), Some(&json!("o1")));
        assert_eq!(merged.get("name"), Some(&json!("Hannah")));
        assert_eq!(merged.get("value"), Some(&json!(10)));
    }
}
