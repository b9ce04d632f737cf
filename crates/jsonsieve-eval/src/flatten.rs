//! Expand dotted top-level keys into nested objects.
//!
//! `{"a.b": 1, "a.c": 2}` becomes `{"a": {"b": 1, "c": 2}}`. Keys are visited
//! in the map's (sorted) order; when a key needs an object where an earlier
//! key left a scalar, the later key wins.

use serde_json::{Map, Value};

/// Rebuild `input` with every dotted key expanded.
pub fn flatten(input: Map<String, Value>) -> Map<String, Value> {
    let mut result = Map::new();
    for (key, value) in input {
        let mut segments = key.split('.');
        // split always yields at least one segment
        let first = segments.next().unwrap_or_default();
        let mut target = &mut result;
        let mut last = first;
        for segment in segments {
            target = child_object(target, last);
            last = segment;
        }
        target.insert(last.to_string(), value);
    }
    result
}

fn child_object<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let slot = map
        .entry(key)
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    let Value::Object(child) = slot else {
        unreachable!("slot was replaced by an object above");
    };
    child
}
