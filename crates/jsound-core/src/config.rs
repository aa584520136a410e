//! Tunables for subsumption checking.
//!
//! Mirrors the builder shape of validation options in schema-validation crates:
//! a `Config` is built once via chained setters and then passed by reference into
//! [`crate::check`].

/// How `$ref` occurrences are handled before compilation.
///
/// `unfold` is the only value a caller can construct today. A `simulation`
/// strategy name is reserved in the CLI's `--ref-resolution-strategy` flag (see
/// `jsound-cli`) for a future non-unfolding strategy, but it has no constructor
/// here: `#[non_exhaustive]` lets it be added later without a breaking change,
/// rather than pretending to support it now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReferenceResolution {
    /// Fully inline every in-document `$ref` before compiling.
    Unfold,
}

/// Compilation and solver limits for a single subsumption check.
#[derive(Debug, Clone)]
pub struct Config {
    timeout_seconds: u64,
    max_array_length: usize,
    reference_resolution: ReferenceResolution,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            timeout_seconds: 30,
            max_array_length: 8,
            reference_resolution: ReferenceResolution::Unfold,
        }
    }
}

impl Config {
    /// Starts from the default configuration: a 30 second solver timeout, arrays
    /// bounded to 8 elements, and `$ref` fully unfolded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the solver wall-clock timeout, in seconds.
    #[must_use]
    pub fn timeout_seconds(mut self, value: u64) -> Self {
        self.timeout_seconds = value;
        self
    }

    /// Sets the bound (`LMAX`) on array length used to unroll array-indexed
    /// quantifiers into finite conjunctions.
    #[must_use]
    pub fn max_array_length(mut self, value: usize) -> Self {
        self.max_array_length = value;
        self
    }

    /// Sets the `$ref` handling strategy.
    #[must_use]
    pub fn reference_resolution(mut self, value: ReferenceResolution) -> Self {
        self.reference_resolution = value;
        self
    }

    #[must_use]
    pub fn timeout_seconds_value(&self) -> u64 {
        self.timeout_seconds
    }

    #[must_use]
    pub fn max_array_length_value(&self) -> usize {
        self.max_array_length
    }

    #[must_use]
    pub fn reference_resolution_value(&self) -> ReferenceResolution {
        self.reference_resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_values() {
        let config = Config::new();
        assert_eq!(config.timeout_seconds_value(), 30);
        assert_eq!(config.max_array_length_value(), 8);
        assert_eq!(
            config.reference_resolution_value(),
            ReferenceResolution::Unfold
        );
    }

    #[test]
    fn builder_overrides_chain() {
        let config = Config::new().timeout_seconds(5).max_array_length(3);
        assert_eq!(config.timeout_seconds_value(), 5);
        assert_eq!(config.max_array_length_value(), 3);
    }
}
