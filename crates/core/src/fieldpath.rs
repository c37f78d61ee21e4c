//! Dotted field-path access into JSON snapshots.
//!
//! Entity version snapshots are stored as JSON objects; a field path like
//! `address.street` addresses one attribute inside them. Paths are
//! validated by [`collaboration::validate_field_path`](crate::collaboration::validate_field_path)
//! before they reach these helpers.

use serde_json::{Map, Value};

/// Read the value at a dotted path, if present.
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Write `value` at a dotted path, creating intermediate objects as needed.
///
/// Non-object intermediate values are replaced by objects; the snapshot is
/// edit metadata, not the canonical entity, so a lossy overwrite of a
/// mistyped intermediate is acceptable.
pub fn set(root: &mut Value, path: &str, value: Value) {
    if !root.is_object() {
        *root = Value::Object(Map::new());
    }

    let mut current = root;
    let segments: Vec<&str> = path.split('.').collect();
    for (i, segment) in segments.iter().enumerate() {
        let map = current.as_object_mut().expect("current is always an object");
        if i == segments.len() - 1 {
            map.insert(segment.to_string(), value);
            return;
        }
        let next = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !next.is_object() {
            *next = Value::Object(Map::new());
        }
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_reads_nested_values() {
        let doc = json!({"address": {"street": "Main St", "zip": "12345"}});
        assert_eq!(get(&doc, "address.street"), Some(&json!("Main St")));
        assert_eq!(get(&doc, "address.country"), None);
        assert_eq!(get(&doc, "missing"), None);
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut doc = json!({});
        set(&mut doc, "address.street", json!("Main St"));
        assert_eq!(doc, json!({"address": {"street": "Main St"}}));

        set(&mut doc, "address.zip", json!("12345"));
        assert_eq!(
            doc,
            json!({"address": {"street": "Main St", "zip": "12345"}})
        );
    }

    #[test]
    fn set_overwrites_existing_values() {
        let mut doc = json!({"notes": "old"});
        set(&mut doc, "notes", json!("new"));
        assert_eq!(doc, json!({"notes": "new"}));
    }

    #[test]
    fn set_replaces_non_object_intermediates() {
        let mut doc = json!({"address": "flat string"});
        set(&mut doc, "address.street", json!("Main St"));
        assert_eq!(doc, json!({"address": {"street": "Main St"}}));
    }

    #[test]
    fn set_on_non_object_root_resets_to_object() {
        let mut doc = json!(null);
        set(&mut doc, "title", json!("hello"));
        assert_eq!(doc, json!({"title": "hello"}));
    }
}
