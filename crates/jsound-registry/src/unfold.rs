use ahash::AHashMap;
use serde_json::{Map, Value};

use crate::{error::Error, registry::Registry};

/// Produces a `$ref`-free rewrite of a schema document by completely inlining every
/// `$ref` against a [`Registry`].
///
/// Memoizes resolved references by URI so diamond-shaped reference graphs (two
/// definitions both pointing at a shared third one) are inlined once, not once per
/// occurrence. Valid only when `registry` was built from the same, already-verified-
/// acyclic document; [`Registry::build`] is the only supported way to obtain one.
pub struct Unfolder<'a> {
    registry: &'a Registry,
    root: &'a Value,
    cache: AHashMap<String, Value>,
}

impl<'a> Unfolder<'a> {
    #[must_use]
    pub fn new(registry: &'a Registry, root: &'a Value) -> Self {
        Unfolder {
            registry,
            root,
            cache: AHashMap::default(),
        }
    }

    /// Inlines every `$ref` reachable from the root document, returning a tree with
    /// none remaining.
    pub fn unfold(mut self) -> Result<Value, Error> {
        let root = self.root;
        self.unfold_value(root)
    }

    fn unfold_value(&mut self, value: &Value) -> Result<Value, Error> {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    return self.unfold_reference(reference);
                }
                let mut out = Map::with_capacity(map.len());
                for (key, nested) in map {
                    out.insert(key.clone(), self.unfold_value(nested)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.unfold_value(item)?);
                }
                Ok(Value::Array(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn unfold_reference(&mut self, reference: &str) -> Result<Value, Error> {
        if let Some(cached) = self.cache.get(reference) {
            return Ok(cached.clone());
        }
        let resolved = self.registry.resolve(reference, self.root)?.clone();
        let unfolded = self.unfold_value(&resolved)?;
        self.cache.insert(reference.to_string(), unfolded.clone());
        Ok(unfolded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use serde_json::json;

    fn contains_ref(value: &Value) -> bool {
        match value {
            Value::Object(map) => map.contains_key("$ref") || map.values().any(contains_ref),
            Value::Array(items) => items.iter().any(contains_ref),
            _ => false,
        }
    }

    #[test]
    fn inlines_a_single_ref() {
        let root = json!({
            "$defs": {"Name": {"type": "string", "minLength": 1}},
            "type": "object",
            "properties": {"name": {"$ref": "#/$defs/Name"}}
        });
        let registry = Registry::build(&root).unwrap();
        let unfolded = Unfolder::new(&registry, &root).unfold().unwrap();
        assert!(!contains_ref(&unfolded));
        assert_eq!(
            unfolded["properties"]["name"],
            json!({"type": "string", "minLength": 1})
        );
    }

    #[test]
    fn inlines_diamond_shaped_refs_without_blowing_up() {
        let root = json!({
            "$defs": {
                "Shared": {"type": "string"},
                "A": {"properties": {"x": {"$ref": "#/$defs/Shared"}}},
                "B": {"properties": {"y": {"$ref": "#/$defs/Shared"}}}
            },
            "allOf": [{"$ref": "#/$defs/A"}, {"$ref": "#/$defs/B"}]
        });
        let registry = Registry::build(&root).unwrap();
        let unfolded = Unfolder::new(&registry, &root).unfold().unwrap();
        assert!(!contains_ref(&unfolded));
        assert_eq!(unfolded["allOf"][0]["properties"]["x"], json!({"type": "string"}));
        assert_eq!(unfolded["allOf"][1]["properties"]["y"], json!({"type": "string"}));
    }
}
