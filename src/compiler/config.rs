//! Tunables of the propagation engine.

/// Configuration for the analysis passes.
///
/// The engine only reads it. It is handed to the passes through
/// [`crate::compiler::AnalysisContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Complexity at which a definition with several uses stops being
    /// propagated (default: 3).
    pub max_propagation_depth: usize,

    /// Total number of substitutions allowed across the whole run
    /// (default: unlimited).
    pub max_propagations: Option<usize>,

    /// Enable the dominance-number overwrite heuristic (default: false).
    pub experimental_dominance_heuristic: bool,

    /// Record every rejected propagation candidate (default: false).
    pub verbose: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_propagation_depth: 3,
            max_propagations: None,
            experimental_dominance_heuristic: false,
            verbose: false,
        }
    }
}

impl AnalysisConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that propagates only trivial expressions into
    /// locations used more than once.
    #[must_use]
    pub fn conservative() -> Self {
        Self {
            max_propagation_depth: 1,
            ..Self::default()
        }
    }

    /// Creates a configuration that lets deep expressions propagate.
    ///
    /// Produces denser code at the risk of duplicating work in the output.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            max_propagation_depth: 8,
            ..Self::default()
        }
    }

    /// Sets the maximum propagation depth.
    ///
    /// # Arguments
    ///
    /// * `depth` - Complexity at which multi-use definitions stop propagating.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_max_propagation_depth(mut self, depth: usize) -> Self {
        self.max_propagation_depth = depth;
        self
    }

    /// Limits the total number of substitutions.
    ///
    /// # Arguments
    ///
    /// * `max` - Substitutions allowed, or `None` for no limit.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_max_propagations(mut self, max: Option<usize>) -> Self {
        self.max_propagations = max;
        self
    }

    /// Enables or disables the experimental dominance heuristic.
    #[must_use]
    pub fn with_dominance_heuristic(mut self, enable: bool) -> Self {
        self.experimental_dominance_heuristic = enable;
        self
    }

    /// Enables or disables recording of rejected candidates.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(AnalysisConfig::new().max_propagation_depth, 3);
        assert_eq!(AnalysisConfig::conservative().max_propagation_depth, 1);
        assert_eq!(AnalysisConfig::aggressive().max_propagation_depth, 8);
        assert_eq!(AnalysisConfig::aggressive().max_propagations, None);
    }

    #[test]
    fn test_builders() {
        let config = AnalysisConfig::new()
            .with_max_propagation_depth(5)
            .with_max_propagations(Some(10))
            .with_dominance_heuristic(true)
            .with_verbose(true);
        assert_eq!(config.max_propagation_depth, 5);
        assert_eq!(config.max_propagations, Some(10));
        assert!(config.experimental_dominance_heuristic);
        assert!(config.verbose);
    }
}
