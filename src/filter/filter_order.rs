use serde_json::Value;

use super::error::FilterError;
use super::types::{FindOptions, SortDescriptor, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Parse a sort specification.
    ///
    /// Accepts `{ "age": true }` (true = descending), `{ "age": "desc" }`,
    /// `"age desc, name"` and arrays of such strings.
    pub fn validate_and_parse(order: &Value) -> Result<Vec<SortDescriptor>, FilterError> {
        match order {
            Value::Null => Ok(vec![]),
            Value::String(s) => Self::parse_order_string(s),
            Value::Array(arr) => {
                let mut out = Vec::new();
                for v in arr {
                    match v {
                        Value::String(s) => out.extend(Self::parse_order_string(s)?),
                        other => return Err(FilterError::InvalidSort(format!("unexpected entry {}", other))),
                    }
                }
                Ok(out)
            }
            Value::Object(obj) => {
                let mut out = Vec::new();
                for (field, v) in obj {
                    let direction = match v {
                        Value::Bool(descending) => SortDirection::from_descending(*descending),
                        Value::String(s) if s.eq_ignore_ascii_case("desc") => SortDirection::Desc,
                        Value::String(s) if s.eq_ignore_ascii_case("asc") => SortDirection::Asc,
                        other => {
                            return Err(FilterError::InvalidSort(format!(
                                "direction for {} must be a boolean, \"asc\" or \"desc\", got {}",
                                field, other
                            )))
                        }
                    };
                    out.push(SortDescriptor { field: field.clone(), direction });
                }
                Ok(out)
            }
            other => Err(FilterError::InvalidSort(format!("unsupported sort value {}", other))),
        }
    }

    fn parse_order_string(s: &str) -> Result<Vec<SortDescriptor>, FilterError> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() { continue; }
            let mut it = trimmed.split_whitespace();
            if let Some(field) = it.next() {
                let direction = match it.next() {
                    None => SortDirection::Asc,
                    Some(d) if d.eq_ignore_ascii_case("asc") => SortDirection::Asc,
                    Some(d) if d.eq_ignore_ascii_case("desc") => SortDirection::Desc,
                    Some(d) => return Err(FilterError::InvalidSort(format!("unknown direction {}", d))),
                };
                out.push(SortDescriptor { field: field.to_string(), direction });
            }
        }
        Ok(out)
    }
}

impl FindOptions {
    /// Build options from `{ "limit": .., "offset": .., "sort": .. }`.
    ///
    /// Non-numeric `limit`/`offset` values are ignored; negative ones are errors.
    pub fn from_json(value: &Value) -> Result<Self, FilterError> {
        let obj = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(obj) => obj,
            other => return Err(FilterError::InvalidFilter(format!("options must be an object, got {}", other))),
        };

        let limit = match obj.get("limit") {
            Some(Value::Number(n)) => Some(count(n, "limit").map_err(FilterError::InvalidLimit)?),
            _ => None,
        };
        let offset = match obj.get("offset") {
            Some(Value::Number(n)) => Some(count(n, "offset").map_err(FilterError::InvalidOffset)?),
            _ => None,
        };
        let sort = match obj.get("sort") {
            Some(spec) => FilterOrder::validate_and_parse(spec)?,
            None => vec![],
        };

        Ok(Self { limit, offset, sort })
    }

    pub fn from_json_str(s: &str) -> Result<Self, FilterError> {
        let value: Value = serde_json::from_str(s)?;
        Self::from_json(&value)
    }
}

fn count(n: &serde_json::Number, what: &str) -> Result<usize, String> {
    if let Some(u) = n.as_u64() {
        return usize::try_from(u).map_err(|_| format!("{} {} is too large", what, n));
    }
    match n.as_f64() {
        Some(f) if f < 0.0 => Err(format!("{} must be non-negative, got {}", what, n)),
        Some(f) if f.is_finite() && f <= usize::MAX as f64 => Ok(f as usize),
        _ => Err(format!("{} {} is too large", what, n)),
    }
}
