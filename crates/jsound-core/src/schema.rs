//! The typed schema tree compiled keywords are read from.
//!
//! Parsing runs after [`jsound_registry::Unfolder`] has produced a `$ref`-free
//! document: every node here is either a boolean schema or a finite map from
//! keyword name to an already-classified argument, never an open-ended JSON value
//! carried through untouched.
use ahash::AHashMap;
use serde_json::Value;

use crate::error::Error;

/// Keywords that only annotate an instance and never constrain it. Valid wherever
/// they appear but otherwise ignored by the compiler.
const ANNOTATION_ONLY: &[&str] = &[
    "title",
    "description",
    "examples",
    "default",
    "$comment",
    "$id",
    "$schema",
    "$defs",
    "definitions",
];

/// A single node of a schema, after `$ref` inlining.
#[derive(Debug, Clone)]
pub enum Schema {
    /// `true` (accepts every instance) or `false` (accepts none).
    Bool(bool),
    /// An object schema, reduced to the keywords that actually constrain instances.
    Keywords(AHashMap<String, Keyword>),
}

/// The parsed shape of one keyword's argument.
#[derive(Debug, Clone)]
pub enum Keyword {
    /// A single nested schema (`not`, `items`, `contains`, `if`/`then`/`else`, ...).
    Schema(Box<Schema>),
    /// A list of nested schemas (`allOf`, `anyOf`, `oneOf`).
    SchemaList(Vec<Schema>),
    /// A name-keyed map of nested schemas (`properties`, `patternProperties`,
    /// `dependentSchemas`).
    SchemaMap(AHashMap<String, Schema>),
    /// A list of property names (`required`).
    StringList(Vec<String>),
    /// A raw JSON leaf argument, for keywords whose argument is itself the value
    /// being compared against (`type`, `const`, `enum`, `minLength`, `pattern`, ...),
    /// or whose shape is keyword-specific enough to not warrant its own variant
    /// (`dependentRequired`, legacy `dependencies`).
    Value(Value),
}

impl Schema {
    /// Parses an already-unfolded JSON value into a typed schema tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaValidation`] if a node is neither a boolean nor an
    /// object, or a known composite keyword has the wrong JSON shape.
    /// [`Error::UnsupportedFeature`] is returned for keywords this crate does not
    /// recognize.
    pub fn parse(value: &Value) -> Result<Schema, Error> {
        match value {
            Value::Bool(literal) => Ok(Schema::Bool(*literal)),
            Value::Object(map) if map.is_empty() => Ok(Schema::Bool(true)),
            Value::Object(map) => {
                let mut keywords = AHashMap::default();
                for (name, arg) in map {
                    if name == "$ref" {
                        return Err(Error::internal(
                            "unfolded schema still contains a $ref node",
                        ));
                    }
                    if ANNOTATION_ONLY.contains(&name.as_str()) {
                        continue;
                    }
                    keywords.insert(name.clone(), parse_keyword(name, arg)?);
                }
                Ok(Schema::Keywords(keywords))
            }
            other => Err(Error::schema_validation(format!(
                "schema node must be a boolean or an object, found {other}"
            ))),
        }
    }

    /// Looks up a keyword's parsed argument. Always `None` for `Schema::Bool`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Keyword> {
        match self {
            Schema::Bool(_) => None,
            Schema::Keywords(map) => map.get(name),
        }
    }

    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

fn parse_keyword(name: &str, arg: &Value) -> Result<Keyword, Error> {
    match name {
        "not" | "items" | "contains" | "additionalProperties" | "if" | "then" | "else" => {
            Ok(Keyword::Schema(Box::new(Schema::parse(arg)?)))
        }
        "allOf" | "anyOf" | "oneOf" => {
            let items = arg.as_array().ok_or_else(|| {
                Error::schema_validation(format!("'{name}' must be an array of schemas"))
            })?;
            let schemas = items
                .iter()
                .map(Schema::parse)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Keyword::SchemaList(schemas))
        }
        "properties" | "patternProperties" | "dependentSchemas" => {
            let map = arg.as_object().ok_or_else(|| {
                Error::schema_validation(format!("'{name}' must be an object of schemas"))
            })?;
            let mut out = AHashMap::default();
            for (key, nested) in map {
                out.insert(key.clone(), Schema::parse(nested)?);
            }
            Ok(Keyword::SchemaMap(out))
        }
        "required" => {
            let items = arg.as_array().ok_or_else(|| {
                Error::schema_validation("'required' must be an array of strings")
            })?;
            let names = items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        Error::schema_validation("'required' entries must be strings")
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Keyword::StringList(names))
        }
        "type" | "const" | "enum" | "minLength" | "maxLength" | "pattern" | "format"
        | "minimum" | "maximum" | "exclusiveMinimum" | "exclusiveMaximum" | "multipleOf"
        | "minItems" | "maxItems" | "uniqueItems" | "dependentRequired" | "dependencies" => {
            Ok(Keyword::Value(arg.clone()))
        }
        other => Err(Error::unsupported(format!("keyword '{other}'"))),
    }
}
