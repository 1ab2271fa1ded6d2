// Response Resolution Module
// Maps a request path to the body it should return: a configured override or
// a synthesized default message.

use crate::value::Value;
use serde_json::json;
use std::collections::HashMap;

/// A configured substitute response body
#[derive(Debug, Clone, PartialEq)]
pub enum Override {
    /// Raw text, parsed as a JSON document when the path is requested
    Raw(String),
    /// Structured body, already normalized at configuration load
    Structured(Value),
}

/// Result of resolving a path, with where the body came from
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// Body taken from an override
    Override(Value),
    /// Override text that failed to parse; carries the placeholder body
    InvalidOverride(Value),
    /// No override for the path
    Default(Value),
}

impl Resolved {
    pub fn into_value(self) -> Value {
        match self {
            Resolved::Override(v) | Resolved::InvalidOverride(v) | Resolved::Default(v) => v,
        }
    }

    pub fn value(&self) -> &Value {
        match self {
            Resolved::Override(v) | Resolved::InvalidOverride(v) | Resolved::Default(v) => v,
        }
    }

    pub fn is_override(&self) -> bool {
        !matches!(self, Resolved::Default(_))
    }
}

/// Per-path response overrides, keyed by normalized path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideTable {
    entries: HashMap<String, Override>,
}

impl OverrideTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an override. The key is normalized like request paths are.
    pub fn insert(&mut self, path: &str, body: Override) {
        self.entries.insert(normalize_path(path).to_string(), body);
    }

    pub fn with_raw(mut self, path: &str, text: impl Into<String>) -> Self {
        self.insert(path, Override::Raw(text.into()));
        self
    }

    pub fn with_value(mut self, path: &str, value: Value) -> Self {
        self.insert(path, Override::Structured(value));
        self
    }

    pub fn get(&self, path: &str) -> Option<&Override> {
        self.entries.get(normalize_path(path))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve the response body for a request path
    pub fn resolve(&self, path: &str) -> Resolved {
        let path = normalize_path(path);

        match self.entries.get(path) {
            Some(Override::Raw(text)) => match serde_json::from_str::<Value>(text) {
                Ok(value) => Resolved::Override(value),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Invalid JSON override");
                    Resolved::InvalidOverride(invalid_override_body())
                }
            },
            Some(Override::Structured(value)) => Resolved::Override(value.clone()),
            None => Resolved::Default(default_body(path)),
        }
    }
}

/// Resolve the response body for `path` against `overrides`
pub fn resolve(path: &str, overrides: &OverrideTable) -> Value {
    overrides.resolve(path).into_value()
}

/// Trim trailing slashes from a request path
pub fn normalize_path(path: &str) -> &str {
    path.trim_end_matches('/')
}

/// Body returned when no override exists for `path`
pub fn default_body(path: &str) -> Value {
    json!({ "message": format!("Response for {}", path) })
}

/// Placeholder returned when an override's text is not valid JSON
pub fn invalid_override_body() -> Value {
    json!({ "error": "Invalid JSON override" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_response() {
        let table = OverrideTable::new();
        assert_eq!(
            resolve("/v1/test", &table),
            json!({"message": "Response for /v1/test"})
        );
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let table = OverrideTable::new();
        assert_eq!(
            resolve("/v1/test/", &table),
            json!({"message": "Response for /v1/test"})
        );
        assert_eq!(resolve("/", &table), json!({"message": "Response for "}));
    }

    #[test]
    fn test_raw_override() {
        let table = OverrideTable::new().with_raw("/v1/test", r#"{"custom":"data","value":123}"#);
        let resolved = table.resolve("/v1/test");
        assert!(matches!(resolved, Resolved::Override(_)));
        assert_eq!(resolved.into_value(), json!({"custom": "data", "value": 123}));
    }

    #[test]
    fn test_raw_override_any_json_document() {
        let table = OverrideTable::new().with_raw("/v1/list", "[1, 2, 3]");
        assert_eq!(resolve("/v1/list", &table), json!([1, 2, 3]));
    }

    #[test]
    fn test_malformed_raw_override() {
        let table = OverrideTable::new().with_raw("/v1/test", r#"{"message":}"#);
        let resolved = table.resolve("/v1/test");
        assert!(matches!(resolved, Resolved::InvalidOverride(_)));
        assert!(resolved.is_override());
        assert_eq!(resolved.value(), &json!({"error": "Invalid JSON override"}));
    }

    #[test]
    fn test_structured_override() {
        let table = OverrideTable::new()
            .with_value("/v1/struct", json!({"status": "success", "code": 200}));
        assert_eq!(
            resolve("/v1/struct/", &table),
            json!({"status": "success", "code": 200})
        );
    }

    #[test]
    fn test_override_key_is_normalized() {
        let table = OverrideTable::new().with_value("/v1/users/", json!({"users": []}));
        assert_eq!(table.len(), 1);
        assert!(table.get("/v1/users").is_some());
        assert_eq!(resolve("/v1/users", &table), json!({"users": []}));
    }

    #[test]
    fn test_other_paths_use_default() {
        let table = OverrideTable::new().with_value("/v1/a", json!({"a": 1}));
        let resolved = table.resolve("/v1/b");
        assert!(!resolved.is_override());
        assert_eq!(resolved.into_value(), json!({"message": "Response for /v1/b"}));
    }
}
