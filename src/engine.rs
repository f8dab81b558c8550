use crate::cluster::Cluster;
use crate::distance::DistanceMetric;
use crate::error::{ClusteringError, ErrorKind};
use crate::flow::FlowRecord;
use crate::store::{ClusterStore, MergeStep};
use std::time::{Duration, Instant};

/// Lifecycle of an [`AgglomerativeEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Clusters are loaded, neighbor caches are not built yet.
    Initializing,
    /// Caches are built, no merge has happened yet.
    CachesReady,
    /// At least one merge has happened and the target is not reached.
    Merging,
    /// The store holds exactly `target` clusters.
    Done,
    /// The run failed; the store must not be used for output.
    Failed(ErrorKind),
}

/// Optional ceilings on a run. Exceeding one aborts the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeLimits {
    /// Maximum number of merges the run may perform.
    pub max_merges: Option<usize>,
    /// Maximum wall-clock time from the first cache computation.
    pub time_budget: Option<Duration>,
}

impl MergeLimits {
    pub fn unlimited() -> MergeLimits {
        MergeLimits::default()
    }
}

/// Final clusters of a completed run together with its merge history.
#[derive(Debug, Clone)]
pub struct ClusteringOutcome {
    /// Clusters sorted ascending by representative id.
    pub clusters: Vec<Cluster>,
    /// Merges in the order they were performed.
    pub merges: Vec<MergeStep>,
}

/// Drives a [`ClusterStore`] down to its target cluster count by repeatedly merging the
/// closest pair under single linkage.
///
/// # Example
///
/// ```
/// use flow_clustering::{AgglomerativeEngine, EngineState, FlowRecord, Weights};
///
/// let flows = vec![
///     FlowRecord::new(1, 100, 10, 5.0, 20.0),
///     FlowRecord::new(2, 102, 10, 5.1, 20.1),
///     FlowRecord::new(3, 5000, 500, 50.0, 1.0),
/// ];
/// let mut engine = AgglomerativeEngine::from_flows(flows, 2, Weights::default()).unwrap();
/// engine.run().unwrap();
/// assert_eq!(engine.state(), EngineState::Done);
///
/// let ids: Vec<Vec<u64>> = engine
///     .snapshot()
///     .unwrap()
///     .iter()
///     .map(|cluster| cluster.flow_ids().collect())
///     .collect();
/// assert_eq!(ids, vec![vec![1, 2], vec![3]]);
/// ```
pub struct AgglomerativeEngine<M: DistanceMetric> {
    store: ClusterStore,
    metric: M,
    limits: MergeLimits,
    state: EngineState,
    history: Vec<MergeStep>,
    started: Option<Instant>,
}

impl<M: DistanceMetric> AgglomerativeEngine<M> {
    /// Creates an engine over `store`.
    ///
    /// A store with fewer flows than its target can never reach it, so the engine starts
    /// out in `Failed(TargetUnreachable)`.
    pub fn new(store: ClusterStore, metric: M) -> AgglomerativeEngine<M> {
        let state = if store.target() > store.len() {
            log::error!(
                "Target of {} clusters is unreachable with {} flows",
                store.target(),
                store.len()
            );
            EngineState::Failed(ErrorKind::TargetUnreachable)
        } else {
            EngineState::Initializing
        };
        AgglomerativeEngine {
            store,
            metric,
            limits: MergeLimits::unlimited(),
            state,
            history: Vec::new(),
            started: None,
        }
    }

    /// Loads one singleton cluster per flow and creates an engine over them.
    pub fn from_flows(
        flows: Vec<FlowRecord>,
        target: usize,
        metric: M,
    ) -> Result<AgglomerativeEngine<M>, ClusteringError> {
        let store = ClusterStore::from_flows(flows, target)?;
        Ok(AgglomerativeEngine::new(store, metric))
    }

    pub fn with_limits(mut self, limits: MergeLimits) -> AgglomerativeEngine<M> {
        self.limits = limits;
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// The underlying store, or `None` once the engine has failed.
    pub fn store(&self) -> Option<&ClusterStore> {
        match self.state {
            EngineState::Failed(_) => None,
            _ => Some(&self.store),
        }
    }

    /// Merges performed so far, oldest first.
    pub fn merge_history(&self) -> &[MergeStep] {
        &self.history
    }

    /// Live clusters in ascending representative id order, or `None` once the engine
    /// has failed.
    pub fn snapshot(&self) -> Option<Vec<&Cluster>> {
        self.store().map(ClusterStore::snapshot_sorted_by_id)
    }

    /// Runs merges until the target is reached.
    ///
    /// Calling `run` on a finished engine is a no-op. Calling it on a failed engine
    /// returns [`ClusteringError::TargetUnreachable`] again if the target was unreachable,
    /// and [`ClusteringError::Aborted`] otherwise.
    pub fn run(&mut self) -> Result<(), ClusteringError> {
        while self.step()?.is_some() {}
        Ok(())
    }

    /// Performs a single merge, building the caches first if needed.
    ///
    /// Returns `Ok(None)` once the target cluster count is reached.
    pub fn step(&mut self) -> Result<Option<MergeStep>, ClusteringError> {
        match self.advance() {
            Ok(step) => Ok(step),
            Err(error) => {
                if !matches!(self.state, EngineState::Failed(_)) {
                    log::error!("Clustering failed: {error}");
                    self.state = EngineState::Failed(error.kind());
                }
                Err(error)
            }
        }
    }

    /// Consumes a finished engine and returns its clusters and merge history.
    ///
    /// # Errors
    ///
    /// Returns [`ClusteringError::Aborted`] if the engine has not reached `Done`.
    pub fn into_outcome(self) -> Result<ClusteringOutcome, ClusteringError> {
        if self.state != EngineState::Done {
            return Err(ClusteringError::Aborted {
                merges_done: self.history.len(),
                reason: format!("engine stopped in state {:?}", self.state),
            });
        }
        Ok(ClusteringOutcome {
            clusters: self.store.into_sorted_clusters(),
            merges: self.history,
        })
    }

    fn advance(&mut self) -> Result<Option<MergeStep>, ClusteringError> {
        match self.state {
            EngineState::Done => return Ok(None),
            EngineState::Failed(ErrorKind::TargetUnreachable) => {
                return Err(ClusteringError::TargetUnreachable {
                    target: self.store.target(),
                    flows: self.store.len(),
                })
            }
            EngineState::Failed(kind) => {
                return Err(ClusteringError::Aborted {
                    merges_done: self.history.len(),
                    reason: format!("engine already failed with {kind:?}"),
                })
            }
            EngineState::Initializing => {
                if self.initialize()? {
                    return Ok(None);
                }
            }
            EngineState::CachesReady | EngineState::Merging => {}
        }

        if self.store.len() <= self.store.target() {
            self.finish();
            return Ok(None);
        }

        self.check_limits()?;
        let step = self.store.merge_closest()?;
        log::debug!(
            "Merged {} and {} into {} at distance {} ({} flows, {} clusters left)",
            step.left,
            step.right,
            step.merged,
            step.distance,
            step.size,
            self.store.len()
        );
        self.history.try_reserve(1)?;
        self.history.push(step);
        self.state = EngineState::Merging;

        if self.store.len() == self.store.target() {
            self.finish();
        }
        Ok(Some(step))
    }

    /// Leaves `Initializing`. Returns `true` if no merging is needed at all.
    fn initialize(&mut self) -> Result<bool, ClusteringError> {
        let target = self.store.target();
        let flows = self.store.len();
        log::info!("Clustering {flows} flows into {target} clusters");
        if target == flows {
            self.finish();
            return Ok(true);
        }

        self.started = Some(Instant::now());
        self.store.initialize_neighbor_caches(&self.metric)?;
        self.history.try_reserve_exact(flows - target)?;
        self.state = EngineState::CachesReady;
        Ok(false)
    }

    fn check_limits(&self) -> Result<(), ClusteringError> {
        let merges_done = self.history.len();
        if let Some(max_merges) = self.limits.max_merges {
            if merges_done >= max_merges {
                return Err(ClusteringError::Aborted {
                    merges_done,
                    reason: format!("merge limit of {max_merges} reached"),
                });
            }
        }
        if let (Some(budget), Some(started)) = (self.limits.time_budget, self.started) {
            if started.elapsed() > budget {
                return Err(ClusteringError::Aborted {
                    merges_done,
                    reason: format!("time budget of {budget:?} exceeded"),
                });
            }
        }
        Ok(())
    }

    fn finish(&mut self) {
        self.state = EngineState::Done;
        log::info!(
            "Clustering done: {} clusters after {} merges",
            self.store.len(),
            self.history.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::Weights;
    use crate::flow::FlowId;

    fn flows(features: &[(FlowId, u64)]) -> Vec<FlowRecord> {
        features
            .iter()
            .map(|&(id, bytes)| FlowRecord::new(id, bytes, 0, 0.0, 0.0))
            .collect()
    }

    fn partition<M: DistanceMetric>(engine: &AgglomerativeEngine<M>) -> Vec<Vec<FlowId>> {
        engine
            .snapshot()
            .unwrap()
            .iter()
            .map(|cluster| cluster.flow_ids().collect())
            .collect()
    }

    #[test]
    fn run_should_walk_through_states_to_done() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut engine =
            AgglomerativeEngine::from_flows(flows(&[(1, 0), (2, 1), (3, 50)]), 1, Weights::default())
                .unwrap();
        assert_eq!(engine.state(), EngineState::Initializing);

        let first = engine.step().unwrap().unwrap();
        assert_eq!((first.left, first.right), (1, 2));
        assert_eq!(engine.state(), EngineState::Merging);

        let second = engine.step().unwrap().unwrap();
        assert_eq!((second.left, second.right, second.size), (1, 3, 3));
        assert_eq!(engine.state(), EngineState::Done);

        assert_eq!(engine.step().unwrap(), None);
        assert_eq!(partition(&engine), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn new_should_fail_on_unreachable_target_before_running() {
        let mut engine =
            AgglomerativeEngine::from_flows(flows(&[(1, 0), (2, 1)]), 3, Weights::default())
                .unwrap();
        assert_eq!(
            engine.state(),
            EngineState::Failed(ErrorKind::TargetUnreachable)
        );
        assert!(engine.store().is_none());
        assert!(engine.snapshot().is_none());

        for _ in 0..2 {
            assert!(matches!(
                engine.run(),
                Err(ClusteringError::TargetUnreachable {
                    target: 3,
                    flows: 2
                })
            ));
        }
        assert!(engine.merge_history().is_empty());
        assert!(engine.into_outcome().is_err());
    }

    #[test]
    fn run_should_skip_caches_when_target_equals_flow_count() {
        let mut engine =
            AgglomerativeEngine::from_flows(flows(&[(3, 0), (1, 1), (2, 2)]), 3, Weights::default())
                .unwrap();
        engine.run().unwrap();
        assert_eq!(engine.state(), EngineState::Done);
        assert!(engine.merge_history().is_empty());
        assert!(engine.store().unwrap().get(1).unwrap().neighbors().is_empty());
        assert_eq!(partition(&engine), vec![vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn run_should_abort_when_merge_limit_is_hit() {
        let limits = MergeLimits {
            max_merges: Some(2),
            time_budget: None,
        };
        let mut engine = AgglomerativeEngine::from_flows(
            flows(&[(1, 0), (2, 1), (3, 5), (4, 20), (5, 80)]),
            1,
            Weights::default(),
        )
        .unwrap()
        .with_limits(limits);

        assert!(matches!(
            engine.run(),
            Err(ClusteringError::Aborted { merges_done: 2, .. })
        ));
        assert_eq!(engine.state(), EngineState::Failed(ErrorKind::Aborted));
        assert_eq!(engine.merge_history().len(), 2);
        assert!(engine.store().is_none());
        assert!(engine.snapshot().is_none());
        assert!(matches!(
            engine.step(),
            Err(ClusteringError::Aborted { merges_done: 2, .. })
        ));
        assert!(engine.into_outcome().is_err());
    }

    #[test]
    fn run_should_abort_when_time_budget_is_spent() {
        let limits = MergeLimits {
            max_merges: None,
            time_budget: Some(Duration::ZERO),
        };
        let mut engine = AgglomerativeEngine::from_flows(
            flows(&[(1, 0), (2, 1), (3, 5)]),
            1,
            Weights::default(),
        )
        .unwrap()
        .with_limits(limits);

        // The budget clock starts with cache construction, so the first merge already fails.
        assert!(matches!(
            engine.run(),
            Err(ClusteringError::Aborted { .. })
        ));
    }

    #[test]
    fn into_outcome_should_return_sorted_clusters_and_history() {
        let mut engine = AgglomerativeEngine::from_flows(
            flows(&[(9, 100), (4, 0), (7, 101), (2, 3)]),
            2,
            Weights::default(),
        )
        .unwrap();
        engine.run().unwrap();
        let outcome = engine.into_outcome().unwrap();

        let ids: Vec<Vec<FlowId>> = outcome
            .clusters
            .iter()
            .map(|cluster| cluster.flow_ids().collect())
            .collect();
        assert_eq!(ids, vec![vec![2, 4], vec![7, 9]]);
        assert_eq!(outcome.merges.len(), 2);
        assert_eq!(outcome.merges[0].distance, 1.0);
        assert_eq!(outcome.merges[1].distance, 3.0);
    }
}
