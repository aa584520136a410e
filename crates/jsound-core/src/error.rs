//! Error types returned by schema compilation and subsumption checking.
use std::fmt::{self, Formatter};

/// An error produced while compiling schemas or deciding subsumption between them.
#[derive(Debug)]
pub enum Error {
    /// A keyword, combination of keywords, or reference shape is outside the
    /// supported subset (e.g. an external `$ref`, or a regex pattern outside the
    /// restricted translator's table).
    UnsupportedFeature { detail: String },
    /// The in-document `$ref` graph of one of the two schemas contains a cycle.
    CyclicSchema { cycles: Vec<Vec<String>> },
    /// The solver did not return a result within the configured timeout.
    SolverTimeout { elapsed_ms: u64 },
    /// A schema document does not have the shape required of a JSON Schema, e.g. a
    /// keyword value of the wrong JSON type, or a dangling `$ref`.
    SchemaValidation { detail: String },
    /// An invariant of the compiler or solver encoding was violated. Always a defect
    /// in this crate rather than in the input schemas.
    Internal { detail: String },
}

impl Error {
    pub(crate) fn unsupported(detail: impl Into<String>) -> Error {
        Error::UnsupportedFeature {
            detail: detail.into(),
        }
    }

    pub(crate) fn schema_validation(detail: impl Into<String>) -> Error {
        Error::SchemaValidation {
            detail: detail.into(),
        }
    }

    pub(crate) fn internal(detail: impl Into<String>) -> Error {
        Error::Internal {
            detail: detail.into(),
        }
    }

    pub(crate) fn timeout(elapsed_ms: u64) -> Error {
        Error::SolverTimeout { elapsed_ms }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedFeature { detail } => {
                write!(f, "unsupported schema feature: {detail}")
            }
            Error::CyclicSchema { cycles } => {
                writeln!(f, "schema contains {} reference cycle(s):", cycles.len())?;
                for cycle in cycles {
                    writeln!(f, "  - {}", cycle.join(" -> "))?;
                }
                Ok(())
            }
            Error::SolverTimeout { elapsed_ms } => {
                write!(f, "solver did not converge within {elapsed_ms}ms")
            }
            Error::SchemaValidation { detail } => write!(f, "invalid schema: {detail}"),
            Error::Internal { detail } => write!(f, "internal error: {detail}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<jsound_registry::Error> for Error {
    fn from(err: jsound_registry::Error) -> Self {
        match err {
            jsound_registry::Error::Cyclic { cycles } => Error::CyclicSchema { cycles },
            jsound_registry::Error::UnsupportedReference { .. } => Error::UnsupportedFeature {
                detail: err.to_string(),
            },
            jsound_registry::Error::UnknownReference { .. }
            | jsound_registry::Error::MalformedSchema { .. } => Error::SchemaValidation {
                detail: err.to_string(),
            },
        }
    }
}
