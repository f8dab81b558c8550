use crate::distance::Weights;
use crate::engine::MergeLimits;
use crate::error::ConfigError;

/// Parameters of one clustering run.
///
/// # Example
///
/// ```
/// use flow_clustering::{ClusteringConfig, Weights};
///
/// let config = ClusteringConfig::new(4, Weights::default()).unwrap();
/// assert_eq!(config.target(), 4);
/// assert!(ClusteringConfig::new(0, Weights::default()).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusteringConfig {
    target: usize,
    weights: Weights,
    limits: MergeLimits,
}

impl ClusteringConfig {
    /// Creates a configuration without merge limits.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NonPositiveTarget`] if `target` is zero.
    pub fn new(target: usize, weights: Weights) -> Result<ClusteringConfig, ConfigError> {
        if target == 0 {
            return Err(ConfigError::NonPositiveTarget);
        }
        Ok(ClusteringConfig {
            target,
            weights,
            limits: MergeLimits::unlimited(),
        })
    }

    pub fn with_limits(mut self, limits: MergeLimits) -> ClusteringConfig {
        self.limits = limits;
        self
    }

    /// Requested number of clusters.
    pub fn target(&self) -> usize {
        self.target
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    pub fn limits(&self) -> &MergeLimits {
        &self.limits
    }
}
