//! Root entries: what each read operation last returned.

use std::fmt;

use serde_json::Value;

use tracker_core::EntityKey;

use crate::normalize::ref_key;

/// Identity of a root field, rendered `field(args)` or bare `field`.
///
/// Arguments are rendered as compact JSON with sorted keys, so the same
/// variables always produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RootKey(String);

impl RootKey {
    pub fn new(field: &str, args: &Value) -> Self {
        match args {
            Value::Null => Self(field.to_string()),
            Value::Object(map) if map.is_empty() => Self(field.to_string()),
            other => Self(format!("{field}({other})")),
        }
    }

    /// A root field without arguments.
    pub fn bare(field: &str) -> Self {
        Self(field.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a root field resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootValue {
    /// The server answered `null`: the entity does not exist.
    Null,
    One(EntityKey),
    Many(Vec<EntityKey>),
}

impl RootValue {
    /// Interpret a normalized root value. `None` when it holds anything but
    /// references (inline objects are not cacheable as roots).
    pub fn from_normalized(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(RootValue::Null),
            Value::Array(items) => items
                .iter()
                .map(ref_key)
                .collect::<Option<Vec<_>>>()
                .map(RootValue::Many),
            other => ref_key(other).map(RootValue::One),
        }
    }
}

/// A cached root with its freshness flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootEntry {
    pub value: RootValue,
    /// Set by dependent-query invalidation; cleared by the next write.
    pub stale: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracker_core::EntityType;

    #[test]
    fn keys_are_stable_across_argument_order() {
        let a = RootKey::new("project", &json!({"id": "p1", "x": 1}));
        let b = RootKey::new("project", &json!({"x": 1, "id": "p1"}));
        assert_eq!(a, b);
        assert_eq!(a.as_str(), r#"project({"id":"p1","x":1})"#);
    }

    #[test]
    fn argumentless_roots_are_bare() {
        assert_eq!(RootKey::new("projects", &json!({})).as_str(), "projects");
        assert_eq!(RootKey::new("projects", &Value::Null), RootKey::bare("projects"));
    }

    #[test]
    fn root_values_from_references() {
        let v = json!([{"__ref": "Task:1"}, {"__ref": "Task:2"}]);
        assert_eq!(
            RootValue::from_normalized(&v),
            Some(RootValue::Many(vec![
                EntityKey::new(EntityType::Task, "1"),
                EntityKey::new(EntityType::Task, "2"),
            ]))
        );
        assert_eq!(RootValue::from_normalized(&Value::Null), Some(RootValue::Null));
        assert_eq!(RootValue::from_normalized(&json!({"totalProjects": 1})), None);
    }
}
