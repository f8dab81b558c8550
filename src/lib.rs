//! Single-linkage agglomerative clustering of network flow records.
//!
//! Flows are loaded as singleton clusters and the two closest clusters are merged
//! until the requested number of clusters is left. Each cluster caches its distance to
//! every other cluster; after a merge the caches are updated with the single-linkage
//! rule `d(A ∪ B, X) = min(d(A, X), d(B, X))` instead of being recomputed.
//!
//! # Example
//!
//! ```
//! use flow_clustering::{cluster_flows, ClusteringConfig, FlowRecord, Weights};
//!
//! let flows = vec![
//!     FlowRecord::new(1, 100, 10, 5.0, 20.0),
//!     FlowRecord::new(2, 102, 10, 5.1, 20.1),
//!     FlowRecord::new(3, 5000, 500, 50.0, 1.0),
//! ];
//! let config = ClusteringConfig::new(2, Weights::default()).unwrap();
//! let outcome = cluster_flows(flows, &config).unwrap();
//! assert_eq!(outcome.clusters.len(), 2);
//! assert_eq!(outcome.merges[0].left, 1);
//! ```

pub use cluster::{Cluster, NeighborCache, NeighborEntry};
pub use clusterer::{Clusterer, SingleLinkageClusterer};
pub use config::ClusteringConfig;
pub use distance::{DistanceMetric, Weights};
pub use engine::{AgglomerativeEngine, ClusteringOutcome, EngineState, MergeLimits};
pub use error::{ClusteringError, ConfigError, Error, ErrorKind, InputFormatError};
pub use flow::{FlowId, FlowRecord};
pub use store::{ClosestPair, ClusterStore, MergeStep};
use std::path::Path;

mod cluster;
pub mod clusterer;
mod config;
mod distance;
mod engine;
mod error;
mod flow;
pub mod input;
pub mod report;
mod store;

/// Clusters already parsed flows according to `config`.
pub fn cluster_flows(
    flows: Vec<FlowRecord>,
    config: &ClusteringConfig,
) -> Result<ClusteringOutcome, ClusteringError> {
    let mut engine = AgglomerativeEngine::from_flows(flows, config.target(), *config.weights())?
        .with_limits(*config.limits());
    engine.run()?;
    engine.into_outcome()
}

/// Reads a flow file and clusters its flows according to `config`.
pub fn cluster_file<P: AsRef<Path>>(
    path: P,
    config: &ClusteringConfig,
) -> Result<ClusteringOutcome, Error> {
    let flows = input::read_flows_from_path(path)?;
    Ok(cluster_flows(flows, config)?)
}
