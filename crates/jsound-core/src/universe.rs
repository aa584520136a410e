//! Component B: the key universe `K`.
//!
//! The object theory in [`crate::theory`] quantifies `has`/`val` over a finite set
//! of property names rather than over all strings. `Universe` is that set, gathered
//! transitively from both schemas being compared so it is large enough to make the
//! subsumption check sound for either one.
use ahash::AHashSet;

use crate::schema::{Keyword, Schema};

/// The finite set of property names considered by the object theory for a single
/// check. Built from `properties`, `patternProperties` names (as literal keys, the
/// pattern match itself is handled separately), `required`, `dependentSchemas`, and
/// `dependentRequired` across both schemas.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    keys: Vec<String>,
}

impl Universe {
    /// Gathers the key universe from both the producer and consumer schema trees.
    #[must_use]
    pub fn gather(producer: &Schema, consumer: &Schema) -> Universe {
        let mut keys = AHashSet::default();
        collect(producer, &mut keys);
        collect(consumer, &mut keys);
        let mut keys: Vec<String> = keys.into_iter().collect();
        keys.sort();
        Universe { keys }
    }

    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn collect(schema: &Schema, out: &mut AHashSet<String>) {
    let Schema::Keywords(map) = schema else {
        return;
    };
    for (name, keyword) in map {
        match (name.as_str(), keyword) {
            ("properties" | "dependentSchemas", Keyword::SchemaMap(nested)) => {
                for (key, inner) in nested {
                    out.insert(key.clone());
                    collect(inner, out);
                }
            }
            ("patternProperties", Keyword::SchemaMap(nested)) => {
                for inner in nested.values() {
                    collect(inner, out);
                }
            }
            ("required", Keyword::StringList(names)) => {
                out.extend(names.iter().cloned());
            }
            ("dependentRequired", Keyword::Value(value)) => {
                if let Some(map) = value.as_object() {
                    for (key, deps) in map {
                        out.insert(key.clone());
                        if let Some(deps) = deps.as_array() {
                            for dep in deps {
                                if let Some(dep) = dep.as_str() {
                                    out.insert(dep.to_string());
                                }
                            }
                        }
                    }
                }
            }
            ("dependencies", Keyword::Value(value)) => {
                if let Some(map) = value.as_object() {
                    for (key, target) in map {
                        out.insert(key.clone());
                        if let Some(deps) = target.as_array() {
                            for dep in deps {
                                if let Some(dep) = dep.as_str() {
                                    out.insert(dep.to_string());
                                }
                            }
                        }
                    }
                }
            }
            (
                "allOf" | "anyOf" | "oneOf",
                Keyword::SchemaList(list),
            ) => {
                for inner in list {
                    collect(inner, out);
                }
            }
            (
                "not" | "items" | "contains" | "additionalProperties" | "if" | "then" | "else",
                Keyword::Schema(inner),
            ) => {
                collect(inner, out);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn gathers_keys_from_both_schemas() {
        let producer = Schema::parse(&json!({
            "type": "object",
            "properties": {"a": true},
            "required": ["a"]
        }))
        .unwrap();
        let consumer = Schema::parse(&json!({
            "type": "object",
            "properties": {"b": true}
        }))
        .unwrap();
        let universe = Universe::gather(&producer, &consumer);
        assert!(universe.contains("a"));
        assert!(universe.contains("b"));
        assert_eq!(universe.len(), 2);
    }

    #[test]
    fn descends_into_composition_keywords() {
        let schema = Schema::parse(&json!({
            "allOf": [{"properties": {"nested": true}}]
        }))
        .unwrap();
        let universe = Universe::gather(&schema, &Schema::Bool(true));
        assert!(universe.contains("nested"));
    }
}
