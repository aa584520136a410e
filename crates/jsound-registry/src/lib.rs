//! # jsound-registry
//!
//! In-document `$ref` resolution for JSON Schema: extracting `$defs`/`definitions`,
//! detecting reference cycles with Tarjan's algorithm, and completely inlining
//! acyclic reference graphs into a `$ref`-free document.
mod cycles;
mod error;
mod refs;
mod registry;
mod unfold;

pub use error::Error;
pub use registry::Registry;
pub use unfold::Unfolder;
