use serde_json::{Map, Value};

use super::error::FilterError;
use super::types::{FilterWhereOptions, LogicalOperatorPolicy, LOGICAL_OPERATORS};

/// Compiles a filter specification into the store's native predicate syntax.
///
/// `{ field: literal }` becomes `field = literal`, `{ field: { op: literal } }`
/// becomes `field op literal`, and criteria are joined with ` AND `.
/// Literals that are not strings, numbers or booleans are dropped.
pub struct FilterWhere {
    criteria: Vec<String>,
}

impl FilterWhere {
    pub fn new() -> Self {
        Self { criteria: vec![] }
    }

    pub fn generate(where_data: &Value, options: &FilterWhereOptions) -> Result<String, FilterError> {
        let mut filter_where = Self::new();
        filter_where.build(where_data, options)
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            other => Err(FilterError::InvalidFilter(format!(
                "filter must be an object, got {}",
                type_name(other)
            ))),
        }
    }

    fn build(&mut self, where_data: &Value, options: &FilterWhereOptions) -> Result<String, FilterError> {
        self.criteria.clear();
        Self::validate(where_data)?;

        if let Value::Object(obj) = where_data {
            for (key, value) in obj {
                if LOGICAL_OPERATORS.contains(&key.as_str()) {
                    self.parse_logical_operator(key, options)?;
                } else {
                    self.parse_field_condition(key, value);
                }
            }
        }

        let predicate = self.criteria.join(" AND ");
        if options.debug_logging {
            tracing::debug!("Compiled filter {} -> {:?}", where_data, predicate);
        }
        Ok(predicate)
    }

    fn parse_logical_operator(&mut self, op: &str, options: &FilterWhereOptions) -> Result<(), FilterError> {
        match options.logical_operators {
            LogicalOperatorPolicy::Ignore => {
                tracing::warn!("Logical operator {} is not supported yet, clause ignored", op);
                Ok(())
            }
            LogicalOperatorPolicy::Reject => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(&mut self, field: &str, value: &Value) {
        match value {
            Value::Object(ops) => self.parse_operator_map(field, ops),
            other => match literal(other) {
                Some(lit) => self.criteria.push(format!("{} = {}", field, lit)),
                None => tracing::trace!("Field {} dropped: {} is not a literal", field, type_name(other)),
            },
        }
    }

    fn parse_operator_map(&mut self, field: &str, ops: &Map<String, Value>) {
        for (op, op_val) in ops {
            match literal(op_val) {
                Some(lit) => self.criteria.push(format!("{} {} {}", field, op, lit)),
                None => tracing::trace!("Operator {} on {} dropped: {} is not a literal", op, field, type_name(op_val)),
            }
        }
    }
}

impl Default for FilterWhere {
    fn default() -> Self {
        Self::new()
    }
}

/// Compile with default options (logical operators ignored)
pub fn compile(filter: &Value) -> Result<String, FilterError> {
    FilterWhere::generate(filter, &FilterWhereOptions::default())
}

/// Render a scalar as a predicate literal; `None` for anything else
fn literal(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(format!("\"{}\"", escape(s))),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
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
    fn empty_filter_compiles_to_empty_predicate() {
        assert_eq!(compile(&json!({})).unwrap(), "");
        assert_eq!(compile(&Value::Null).unwrap(), "");
    }

    #[test]
    fn scalar_values_become_equality() {
        assert_eq!(compile(&json!({ "name": "a" })).unwrap(), "name = \"a\"");
        assert_eq!(compile(&json!({ "age": 42 })).unwrap(), "age = 42");
        assert_eq!(compile(&json!({ "active": true })).unwrap(), "active = true");
        assert_eq!(compile(&json!({ "score": 1.5 })).unwrap(), "score = 1.5");
    }

    #[test]
    fn operator_maps_become_comparisons() {
        assert_eq!(compile(&json!({ "age": { ">": 5 } })).unwrap(), "age > 5");
        assert_eq!(
            compile(&json!({ "age": { ">=": 18, "<": 65 } })).unwrap(),
            "age >= 18 AND age < 65"
        );
        assert_eq!(
            compile(&json!({ "name": { "BEGINSWITH": "Jo" } })).unwrap(),
            "name BEGINSWITH \"Jo\""
        );
    }

    #[test]
    fn criteria_keep_filter_key_order() {
        let filter = json!({ "name": "a", "age": { ">": 1 }, "active": false });
        assert_eq!(
            compile(&filter).unwrap(),
            "name = \"a\" AND age > 1 AND active = false"
        );
    }

    #[test]
    fn logical_operators_are_inert_by_default() {
        let filter = json!({ "$or": { "name": "a", "age": 2 } });
        assert_eq!(compile(&filter).unwrap(), "");

        let filter = json!({ "$and": [{ "name": "a" }], "age": 3 });
        assert_eq!(compile(&filter).unwrap(), "age = 3");
    }

    #[test]
    fn logical_operators_can_be_rejected() {
        let options = FilterWhereOptions {
            logical_operators: LogicalOperatorPolicy::Reject,
            ..Default::default()
        };
        let err = FilterWhere::generate(&json!({ "$or": {} }), &options).unwrap_err();
        assert!(matches!(err, FilterError::UnsupportedOperator(op) if op == "$or"));
    }

    #[test]
    fn non_literal_values_are_dropped() {
        let filter = json!({
            "tags": ["a", "b"],
            "missing": null,
            "age": { ">": null, "<": [1], "!=": 4 }
        });
        assert_eq!(compile(&filter).unwrap(), "age != 4");
    }

    #[test]
    fn string_literals_are_escaped() {
        assert_eq!(
            compile(&json!({ "title": "say \"hi\"" })).unwrap(),
            r#"title = "say \"hi\"""#
        );
    }

    #[test]
    fn non_object_filter_is_invalid() {
        assert!(matches!(compile(&json!([1, 2])), Err(FilterError::InvalidFilter(_))));
        assert!(matches!(compile(&json!("name = 1")), Err(FilterError::InvalidFilter(_))));
    }
}
