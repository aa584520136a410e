use serde_json::Value;

/// Walks `value`, invoking `visit` with the raw string of every `$ref` found.
///
/// Stops descending into a node once its own `$ref` has been reported: siblings of
/// `$ref` are ignored by JSON Schema, but we still walk the rest of the document for
/// other `$ref` occurrences.
pub(crate) fn walk_refs(value: &Value, visit: &mut impl FnMut(&str)) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                visit(reference);
            }
            for (key, nested) in map {
                if key == "$ref" {
                    continue;
                }
                walk_refs(nested, visit);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk_refs(item, visit);
            }
        }
        _ => {}
    }
}
