// Value Normalization Module
// Turns YAML configuration values into JSON-serializable response bodies.

use serde_json::{Map, Number};

/// JSON-serializable representation used for every response and override body
pub type Value = serde_json::Value;

/// Errors raised while normalizing a configuration value
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValueError {
    #[error("non-finite number {0} cannot be represented in JSON")]
    NonFiniteNumber(f64),
}

/// Normalize a YAML value into a [`Value`].
///
/// Mapping keys that are not strings are coerced to their string form
/// (`1` -> `"1"`, `true` -> `"true"`, `~` -> `"null"`); sequence or mapping
/// keys become their compact JSON encoding. Tags are dropped.
pub fn normalize_yaml(value: serde_yaml::Value) -> Result<Value, ValueError> {
    match value {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(b)),
        serde_yaml::Value::Number(n) => normalize_number(&n).map(Value::Number),
        serde_yaml::Value::String(s) => Ok(Value::String(s)),
        serde_yaml::Value::Sequence(items) => items
            .into_iter()
            .map(normalize_yaml)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        serde_yaml::Value::Mapping(mapping) => {
            let mut object = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                object.insert(key_to_string(key)?, normalize_yaml(value)?);
            }
            Ok(Value::Object(object))
        }
        serde_yaml::Value::Tagged(tagged) => normalize_yaml(tagged.value),
    }
}

fn normalize_number(n: &serde_yaml::Number) -> Result<Number, ValueError> {
    if let Some(i) = n.as_i64() {
        return Ok(Number::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Ok(Number::from(u));
    }
    let f = n.as_f64().unwrap_or(f64::NAN);
    Number::from_f64(f).ok_or(ValueError::NonFiniteNumber(f))
}

fn key_to_string(key: serde_yaml::Value) -> Result<String, ValueError> {
    match key {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Null => Ok("null".to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Number(n) => Ok(normalize_number(&n)?.to_string()),
        serde_yaml::Value::Tagged(tagged) => key_to_string(tagged.value),
        composite => Ok(normalize_yaml(composite)?.to_string()),
    }
}
