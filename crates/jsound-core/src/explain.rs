//! Component H (ADDED, supplementary): a heuristic, solver-free explainer.
//!
//! Grounded in the original implementation's separate "enhanced" reporting pass:
//! a best-effort scan of a counterexample against the consumer schema that names
//! the keyword(s) it looks like the witness fails under. It never touches Z3,
//! never fails, and is not part of the subsumption decision itself — `check`
//! never calls it.
use serde_json::Value;

use crate::primitive_type::PrimitiveType;
use crate::schema::{Keyword, Schema};

/// One keyword of the consumer schema that the witness appears to violate.
#[derive(Debug, Clone)]
pub struct FailedConstraint {
    pub keyword: String,
    pub path: String,
    pub hint: String,
}

/// The outcome of explaining why a witness accepted by the producer is rejected
/// by the consumer.
#[derive(Debug, Clone)]
pub struct Explanation {
    pub failed_constraints: Vec<FailedConstraint>,
    pub recommendation: String,
}

/// Re-walks `consumer` against `witness`, collecting the keywords that look like
/// they reject it. A witness this function cannot account for (e.g. one that
/// fails only through a cross-property `dependentSchemas` interaction this walk
/// does not model) yields an empty `failed_constraints` list rather than an
/// error — the caller already knows the overall verdict from `check`.
#[must_use]
pub fn explain(_producer: &Schema, consumer: &Schema, witness: &Value) -> Explanation {
    let mut failed = Vec::new();
    walk(consumer, witness, "$", &mut failed);
    let recommendation = if failed.is_empty() {
        "the counterexample does not map onto a single consumer keyword; inspect it directly"
            .to_string()
    } else {
        let keywords: Vec<&str> = failed.iter().map(|f| f.keyword.as_str()).collect();
        format!("relax or widen {} on the consumer schema", keywords.join(", "))
    };
    Explanation {
        failed_constraints: failed,
        recommendation,
    }
}

fn walk(schema: &Schema, witness: &Value, path: &str, out: &mut Vec<FailedConstraint>) {
    let Schema::Keywords(map) = schema else {
        if matches!(schema, Schema::Bool(false)) {
            out.push(FailedConstraint {
                keyword: "false".to_string(),
                path: path.to_string(),
                hint: "the consumer schema at this location rejects every value".to_string(),
            });
        }
        return;
    };

    if let Some(Keyword::Value(type_value)) = map.get("type") {
        if !matches_type(type_value, witness) {
            out.push(FailedConstraint {
                keyword: "type".to_string(),
                path: path.to_string(),
                hint: format!(
                    "witness has JSON type '{}', which 'type' does not accept",
                    json_type_name(witness)
                ),
            });
        }
    }

    if let Some(Keyword::Value(const_value)) = map.get("const") {
        if const_value != witness {
            out.push(FailedConstraint {
                keyword: "const".to_string(),
                path: path.to_string(),
                hint: "witness does not equal the required constant".to_string(),
            });
        }
    }

    if let Some(Keyword::Value(enum_value)) = map.get("enum") {
        if let Some(options) = enum_value.as_array() {
            if !options.contains(witness) {
                out.push(FailedConstraint {
                    keyword: "enum".to_string(),
                    path: path.to_string(),
                    hint: "witness is not one of the enumerated values".to_string(),
                });
            }
        }
    }

    if let Value::String(s) = witness {
        if let Some(Keyword::Value(min)) = map.get("minLength") {
            if min.as_u64().is_some_and(|min| (s.chars().count() as u64) < min) {
                out.push(FailedConstraint {
                    keyword: "minLength".to_string(),
                    path: path.to_string(),
                    hint: "witness string is shorter than minLength".to_string(),
                });
            }
        }
        if let Some(Keyword::Value(max)) = map.get("maxLength") {
            if max.as_u64().is_some_and(|max| (s.chars().count() as u64) > max) {
                out.push(FailedConstraint {
                    keyword: "maxLength".to_string(),
                    path: path.to_string(),
                    hint: "witness string is longer than maxLength".to_string(),
                });
            }
        }
    }

    if let Some(n) = witness.as_f64() {
        if let Some(Keyword::Value(min)) = map.get("minimum") {
            if min.as_f64().is_some_and(|min| n < min) {
                out.push(FailedConstraint {
                    keyword: "minimum".to_string(),
                    path: path.to_string(),
                    hint: "witness value is below minimum".to_string(),
                });
            }
        }
        if let Some(Keyword::Value(max)) = map.get("maximum") {
            if max.as_f64().is_some_and(|max| n > max) {
                out.push(FailedConstraint {
                    keyword: "maximum".to_string(),
                    path: path.to_string(),
                    hint: "witness value is above maximum".to_string(),
                });
            }
        }
    }

    if let Value::Object(obj) = witness {
        if let Some(Keyword::StringList(required)) = map.get("required") {
            let missing: Vec<&str> = required
                .iter()
                .filter(|name| !obj.contains_key(name.as_str()))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                out.push(FailedConstraint {
                    keyword: "required".to_string(),
                    path: path.to_string(),
                    hint: format!(
                        "witness is missing required propert{} {}",
                        if missing.len() == 1 { "y" } else { "ies" },
                        missing.join(", ")
                    ),
                });
            }
        }

        if let Some(Keyword::SchemaMap(props)) = map.get("properties") {
            for (key, nested) in props {
                if let Some(value) = obj.get(key) {
                    walk(nested, value, &format!("{path}.{key}"), out);
                }
            }
        }
    }

    if let Value::Array(items) = witness {
        if let Some(Keyword::Value(min)) = map.get("minItems") {
            if min.as_u64().is_some_and(|min| (items.len() as u64) < min) {
                out.push(FailedConstraint {
                    keyword: "minItems".to_string(),
                    path: path.to_string(),
                    hint: "witness array is shorter than minItems".to_string(),
                });
            }
        }
        if let Some(Keyword::Value(max)) = map.get("maxItems") {
            if max.as_u64().is_some_and(|max| (items.len() as u64) > max) {
                out.push(FailedConstraint {
                    keyword: "maxItems".to_string(),
                    path: path.to_string(),
                    hint: "witness array is longer than maxItems".to_string(),
                });
            }
        }

        if let Some(Keyword::Schema(inner)) = map.get("items") {
            for (i, item) in items.iter().enumerate() {
                walk(inner, item, &format!("{path}[{i}]"), out);
            }
        }
    }

    if let Some(Keyword::SchemaList(list)) = map.get("allOf") {
        for (i, nested) in list.iter().enumerate() {
            walk(nested, witness, &format!("{path}/allOf[{i}]"), out);
        }
    }

    if let Some(Keyword::Schema(negated)) = map.get("not") {
        let before = out.len();
        walk(negated, witness, &format!("{path}/not"), out);
        if out.len() == before {
            // The inner walk raised no complaint, so the witness satisfies the
            // schema `not` forbids — that satisfaction is itself the failure.
            out.push(FailedConstraint {
                keyword: "not".to_string(),
                path: path.to_string(),
                hint: "witness satisfies the schema that 'not' forbids".to_string(),
            });
        } else {
            out.truncate(before);
        }
    }
}

fn matches_type(type_value: &Value, witness: &Value) -> bool {
    let names: Vec<&str> = match type_value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => return true,
    };
    names.iter().any(|name| {
        PrimitiveType::try_from(*name)
            .map(|primitive| primitive_matches(primitive, witness))
            .unwrap_or(true)
    })
}

fn primitive_matches(primitive: PrimitiveType, witness: &Value) -> bool {
    match primitive {
        PrimitiveType::Array => witness.is_array(),
        PrimitiveType::Boolean => witness.is_boolean(),
        PrimitiveType::Integer => witness.is_i64() || witness.is_u64(),
        PrimitiveType::Null => witness.is_null(),
        PrimitiveType::Number => witness.is_number(),
        PrimitiveType::Object => witness.is_object(),
        PrimitiveType::String => witness.is_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn explains_a_missing_required_property() {
        let producer = Schema::parse(&json!({"type": "object"})).unwrap();
        let consumer = Schema::parse(&json!({"type": "object", "required": ["id"]})).unwrap();
        let witness = json!({});
        let explanation = explain(&producer, &consumer, &witness);
        assert_eq!(explanation.failed_constraints.len(), 1);
        assert_eq!(explanation.failed_constraints[0].keyword, "required");
    }

    #[test]
    fn explains_a_type_mismatch() {
        let producer = Schema::parse(&json!({"type": "number"})).unwrap();
        let consumer = Schema::parse(&json!({"type": "integer"})).unwrap();
        let witness = json!(1.5);
        let explanation = explain(&producer, &consumer, &witness);
        assert!(explanation.failed_constraints.iter().any(|f| f.keyword == "type"));
    }

    #[test]
    fn empty_schema_never_fails_anything() {
        let producer = Schema::parse(&json!(true)).unwrap();
        let consumer = Schema::parse(&json!(true)).unwrap();
        let explanation = explain(&producer, &consumer, &json!(42));
        assert!(explanation.failed_constraints.is_empty());
    }
}
