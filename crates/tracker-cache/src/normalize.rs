//! Flattening nested responses into identity-keyed records.

use serde_json::{json, Map, Value};

use tracker_core::{EntityKey, EntityType};

/// Field name marking a reference to another record.
pub const REF_FIELD: &str = "__ref";
const TYPENAME_FIELD: &str = "__typename";

/// One entity's fields in wire form. Relations hold references.
pub type Record = Map<String, Value>;

/// Result of normalizing a response value.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    /// The input with every identifiable object replaced by a reference.
    pub value: Value,
    /// Extracted records, innermost first. The same key may repeat.
    pub records: Vec<(EntityKey, Record)>,
}

/// Normalize any JSON value.
///
/// An object with a recognised `__typename` and an `id` becomes a record;
/// everything else (scalars, arrays, identity-less objects) stays inline.
pub fn normalize(value: Value) -> Normalized {
    let mut records = Vec::new();
    let value = walk(value, &mut records);
    Normalized { value, records }
}

fn walk(value: Value, out: &mut Vec<(EntityKey, Record)>) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(|v| walk(v, out)).collect()),
        Value::Object(map) => {
            let map: Record = map.into_iter().map(|(k, v)| (k, walk(v, out))).collect();
            match identity(&map) {
                Some(key) => {
                    let reference = make_ref(&key);
                    out.push((key, map));
                    reference
                }
                None => Value::Object(map),
            }
        }
        other => other,
    }
}

/// The cache identity of a raw object, if it has one.
pub fn identity(map: &Record) -> Option<EntityKey> {
    let entity_type = map
        .get(TYPENAME_FIELD)
        .and_then(Value::as_str)
        .and_then(EntityType::from_typename)?;
    let id = match map.get("id")? {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Some(EntityKey::new(entity_type, id))
}

pub fn make_ref(key: &EntityKey) -> Value {
    json!({ REF_FIELD: key.to_string() })
}

/// The key a reference value points at.
pub fn ref_key(value: &Value) -> Option<EntityKey> {
    let map = value.as_object()?;
    if map.len() != 1 {
        return None;
    }
    map.get(REF_FIELD)
        .and_then(Value::as_str)
        .and_then(EntityKey::parse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_entities_become_references() {
        let n = normalize(json!({
            "__typename": "ProjectType",
            "id": "1",
            "name": "Launch",
            "tasks": [
                {"__typename": "TaskType", "id": "10", "title": "a"},
                {"__typename": "TaskType", "id": "11", "title": "b"}
            ]
        }));

        assert_eq!(n.value, json!({"__ref": "Project:1"}));
        let keys: Vec<String> = n.records.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["Task:10", "Task:11", "Project:1"]);

        let project = &n.records[2].1;
        assert_eq!(
            project["tasks"],
            json!([{"__ref": "Task:10"}, {"__ref": "Task:11"}])
        );
    }

    #[test]
    fn objects_without_identity_stay_inline() {
        let stats = json!({"totalProjects": 3, "overallCompletionRate": 50.0});
        let n = normalize(stats.clone());
        assert_eq!(n.value, stats);
        assert!(n.records.is_empty());

        // No typename: not normalized even with an id.
        let n = normalize(json!({"id": "1", "name": "x"}));
        assert!(n.records.is_empty());
    }

    #[test]
    fn numeric_ids_are_stringified() {
        let n = normalize(json!({"__typename": "Task", "id": 7, "title": "x"}));
        assert_eq!(n.value, json!({"__ref": "Task:7"}));
    }

    #[test]
    fn ref_key_round_trips() {
        let key = EntityKey::new(EntityType::TaskComment, "c9");
        assert_eq!(ref_key(&make_ref(&key)), Some(key));
        assert_eq!(ref_key(&json!({"__ref": "Task:1", "extra": 1})), None);
    }
}
