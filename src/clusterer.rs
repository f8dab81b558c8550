use crate::cluster::Cluster;
use crate::config::ClusteringConfig;
use crate::distance::{DistanceMetric, Weights};
use crate::engine::{AgglomerativeEngine, MergeLimits};
use crate::error::ClusteringError;
use crate::flow::FlowRecord;
use crate::store::MergeStep;

/// Groups flows into clusters.
pub trait Clusterer {
    /// Clusters the given flows, returning the clusters sorted by representative id.
    fn clusterize(&mut self, flows: Vec<FlowRecord>) -> Result<Vec<Cluster>, ClusteringError>;
}

/// Single-linkage agglomerative clusterer with a fixed cluster budget.
///
/// Every call to [`Clusterer::clusterize`] runs a fresh [`AgglomerativeEngine`] and keeps
/// the merge history of the last successful run.
///
/// # Example
///
/// ```
/// use flow_clustering::{Clusterer, FlowRecord, SingleLinkageClusterer, Weights};
///
/// let mut clusterer = SingleLinkageClusterer::new(1, Weights::default());
/// let clusters = clusterer
///     .clusterize(vec![
///         FlowRecord::new(2, 10, 1, 0.1, 5.0),
///         FlowRecord::new(1, 12, 1, 0.1, 6.0),
///     ])
///     .unwrap();
/// assert_eq!(clusters.len(), 1);
/// assert_eq!(clusterer.last_merges().len(), 1);
/// ```
pub struct SingleLinkageClusterer<M: DistanceMetric = Weights> {
    target: usize,
    metric: M,
    limits: MergeLimits,
    last_merges: Vec<MergeStep>,
}

impl SingleLinkageClusterer<Weights> {
    /// Takes target, weights and limits from `config`.
    pub fn from_config(config: &ClusteringConfig) -> SingleLinkageClusterer<Weights> {
        SingleLinkageClusterer::new(config.target(), *config.weights()).with_limits(*config.limits())
    }
}

impl<M: DistanceMetric + Clone> SingleLinkageClusterer<M> {
    pub fn new(target: usize, metric: M) -> SingleLinkageClusterer<M> {
        SingleLinkageClusterer {
            target,
            metric,
            limits: MergeLimits::unlimited(),
            last_merges: Vec::new(),
        }
    }

    pub fn with_limits(mut self, limits: MergeLimits) -> SingleLinkageClusterer<M> {
        self.limits = limits;
        self
    }

    /// Merge history of the last successful run.
    pub fn last_merges(&self) -> &[MergeStep] {
        &self.last_merges
    }
}

impl<M: DistanceMetric + Clone> Clusterer for SingleLinkageClusterer<M> {
    fn clusterize(&mut self, flows: Vec<FlowRecord>) -> Result<Vec<Cluster>, ClusteringError> {
        self.last_merges.clear();
        let mut engine = AgglomerativeEngine::from_flows(flows, self.target, self.metric.clone())?
            .with_limits(self.limits);
        engine.run()?;

        let outcome = engine.into_outcome()?;
        self.last_merges = outcome.merges;
        Ok(outcome.clusters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::FlowId;

    #[derive(Clone)]
    struct IdDistance;

    impl DistanceMetric for IdDistance {
        fn distance(&self, a: &FlowRecord, b: &FlowRecord) -> f64 {
            a.id().abs_diff(b.id()) as f64
        }
    }

    #[test]
    fn clusterize_should_accept_custom_metric() {
        let flows = [1, 2, 10, 11, 12, 30]
            .iter()
            .map(|&id| FlowRecord::new(id, 0, 0, 0.0, 0.0))
            .collect();
        let mut clusterer = SingleLinkageClusterer::new(3, IdDistance);
        let clusters = clusterer.clusterize(flows).unwrap();

        let ids: Vec<Vec<FlowId>> = clusters
            .iter()
            .map(|cluster| cluster.flow_ids().collect())
            .collect();
        assert_eq!(ids, vec![vec![1, 2], vec![10, 11, 12], vec![30]]);
        assert_eq!(clusterer.last_merges().len(), 3);
    }

    #[test]
    fn from_config_should_carry_target_and_limits() {
        let flows = || {
            [(1, 0), (2, 1), (3, 50), (4, 52)]
                .iter()
                .map(|&(id, bytes)| FlowRecord::new(id, bytes, 0, 0.0, 0.0))
                .collect::<Vec<_>>()
        };
        let config = ClusteringConfig::new(2, Weights::default()).unwrap();
        let mut clusterer = SingleLinkageClusterer::from_config(&config);
        let clusters = clusterer.clusterize(flows()).unwrap();
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusterer.last_merges().len(), 2);

        let limited = config.with_limits(MergeLimits {
            max_merges: Some(1),
            time_budget: None,
        });
        let mut clusterer = SingleLinkageClusterer::from_config(&limited);
        assert!(matches!(
            clusterer.clusterize(flows()),
            Err(ClusteringError::Aborted { merges_done: 1, .. })
        ));
        assert!(clusterer.last_merges().is_empty());
    }

    #[test]
    fn clusterize_should_report_unreachable_target() {
        let mut clusterer = SingleLinkageClusterer::new(5, Weights::default());
        let flows = vec![FlowRecord::new(1, 0, 0, 0.0, 0.0)];
        assert!(matches!(
            clusterer.clusterize(flows),
            Err(ClusteringError::TargetUnreachable {
                target: 5,
                flows: 1
            })
        ));
        assert!(clusterer.last_merges().is_empty());
    }
}
