//! The seven JSON Schema primitive type names used by the `type` keyword.
use std::{convert::TryFrom, fmt};

/// One of the seven names accepted by the `type` keyword. `"integer"` is a refinement
/// of `"number"` recognized separately so the compiler can distinguish `is_int` from
/// `is_int ∨ is_real`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PrimitiveType {
    Array,
    Boolean,
    Integer,
    Null,
    Number,
    Object,
    String,
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveType::Array => f.write_str("array"),
            PrimitiveType::Boolean => f.write_str("boolean"),
            PrimitiveType::Integer => f.write_str("integer"),
            PrimitiveType::Null => f.write_str("null"),
            PrimitiveType::Number => f.write_str("number"),
            PrimitiveType::Object => f.write_str("object"),
            PrimitiveType::String => f.write_str("string"),
        }
    }
}

impl TryFrom<&str> for PrimitiveType {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "array" => Ok(PrimitiveType::Array),
            "boolean" => Ok(PrimitiveType::Boolean),
            "integer" => Ok(PrimitiveType::Integer),
            "null" => Ok(PrimitiveType::Null),
            "number" => Ok(PrimitiveType::Number),
            "object" => Ok(PrimitiveType::Object),
            "string" => Ok(PrimitiveType::String),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_try_from() {
        for name in ["array", "boolean", "integer", "null", "number", "object", "string"] {
            let parsed = PrimitiveType::try_from(name).unwrap();
            assert_eq!(parsed.to_string(), name);
        }
    }

    #[test]
    fn rejects_unknown_type_name() {
        assert!(PrimitiveType::try_from("weird").is_err());
    }
}
