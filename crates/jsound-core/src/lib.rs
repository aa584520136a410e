//! # jsound-core
//!
//! Decides, for two JSON Schema documents, whether every instance the first
//! (the producer) accepts is also accepted by the second (the consumer) — i.e.
//! whether `L(producer) ⊆ L(consumer)`. The decision is reduced to an SMT
//! satisfiability query: `L(P) ⊆ L(C)` iff `⟦P⟧(x) ∧ ¬⟦C⟧(x)` is unsatisfiable
//! over a first-order theory of JSON values, checked with [`z3`].
//!
//! ```rust
//! use jsound_core::{check, Config};
//! use serde_json::json;
//!
//! let producer = json!({"type": "integer"});
//! let consumer = json!({"type": "number"});
//! let result = check(&producer, &consumer, &Config::new());
//! assert!(result.compatible);
//! ```
//!
//! On incompatibility, `check` returns a concrete counterexample — a JSON value
//! the producer accepts and the consumer rejects:
//!
//! ```rust
//! use jsound_core::{check, Config};
//! use serde_json::json;
//!
//! let result = check(&json!({"type": "number"}), &json!({"type": "integer"}), &Config::new());
//! assert!(!result.compatible);
//! assert!(result.counterexample.is_some());
//! ```
mod compiler;
mod config;
mod engine;
mod error;
mod explain;
mod primitive_type;
mod schema;
mod theory;
mod universe;
mod witness;

use std::fmt;

use serde_json::Value;

pub use config::{Config, ReferenceResolution};
pub use error::Error;
pub use explain::{explain, Explanation, FailedConstraint};
pub use schema::{Keyword, Schema};

/// A JSON Schema document, as parsed JSON. Not yet unfolded or type-checked;
/// [`check`] runs the registry, unfolder, and schema parser over it internally.
pub type SchemaDoc = Value;

/// The coarse-grained reason a [`CheckResult`] carries an error, without the
/// detail string. Mirrors [`Error`]'s variants one-for-one, minus their payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A keyword, regex, or reference shape outside the supported subset.
    UnsupportedFeature,
    /// The `$ref` graph of one of the two schemas contains a cycle.
    CyclicSchema,
    /// The solver did not converge within the configured timeout.
    SolverTimeout,
    /// The input document does not have the shape a JSON Schema requires.
    SchemaValidation,
    /// An invariant of the compiler or solver encoding was violated.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::UnsupportedFeature => "unsupported_feature",
            ErrorKind::CyclicSchema => "cyclic_schema",
            ErrorKind::SolverTimeout => "solver_timeout",
            ErrorKind::SchemaValidation => "schema_validation",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl From<&Error> for ErrorKind {
    fn from(err: &Error) -> Self {
        match err {
            Error::UnsupportedFeature { .. } => ErrorKind::UnsupportedFeature,
            Error::CyclicSchema { .. } => ErrorKind::CyclicSchema,
            Error::SolverTimeout { .. } => ErrorKind::SolverTimeout,
            Error::SchemaValidation { .. } => ErrorKind::SchemaValidation,
            Error::Internal { .. } => ErrorKind::Internal,
        }
    }
}

/// The outcome of a single subsumption check.
///
/// Never represents failure by propagating an `Err`: every failure mode
/// (cyclic schema, unsupported keyword, solver timeout, malformed input) is
/// instead folded into `error_kind`/`error_message`, with `compatible` forced to
/// `false`. This mirrors the way the error handling design treats a check's
/// error cases as part of the reportable result rather than exceptional control
/// flow a caller recovers from.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub compatible: bool,
    pub counterexample: Option<Value>,
    pub solver_time_ms: u64,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
}

/// Decides whether every instance `producer` accepts is also accepted by
/// `consumer`.
///
/// Runs the full pipeline: `$ref` unfolding (surfacing reference cycles), key
/// universe extraction, compilation of both schemas over a shared theory, and a
/// single bounded solver call. See the crate documentation for the encoding this
/// reduces to.
#[must_use]
pub fn check(producer: &SchemaDoc, consumer: &SchemaDoc, cfg: &Config) -> CheckResult {
    engine::check(producer, consumer, cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_schema_is_subsumed_by_itself() {
        let result = check(&json!({}), &json!({}), &Config::new());
        assert!(result.compatible);
    }

    #[test]
    fn accept_all_is_not_subsumed_by_a_narrower_schema() {
        let result = check(&json!({}), &json!({"type": "string"}), &Config::new());
        assert!(!result.compatible);
        assert!(result.counterexample.is_some());
    }

    #[test]
    fn false_schema_has_no_model_that_escapes_it() {
        let result = check(&json!(false), &json!({"type": "string"}), &Config::new());
        assert!(result.compatible);
    }

    #[test]
    fn one_of_is_not_any_of() {
        let producer = json!({"anyOf": [{"type": "string"}, {"type": "integer"}]});
        let consumer = json!({"oneOf": [{"type": "string"}, {"type": "integer"}]});
        let result = check(&producer, &consumer, &Config::new());
        assert!(!result.compatible);
    }

    #[test]
    fn unsupported_keyword_is_reported_without_panicking() {
        let result = check(&json!({"propertyNames": {"minLength": 1}}), &json!(true), &Config::new());
        assert!(!result.compatible);
        assert_eq!(result.error_kind, Some(ErrorKind::UnsupportedFeature));
    }
}
