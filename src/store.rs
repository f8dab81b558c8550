use crate::cluster::{Cluster, NeighborCache, NeighborEntry};
use crate::distance::DistanceMetric;
use crate::error::{ClusteringError, ConfigError};
use crate::flow::{FlowId, FlowRecord};
use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// The globally closest pair of live clusters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPair {
    /// Lower representative id of the pair.
    pub left: FlowId,
    /// Higher representative id of the pair.
    pub right: FlowId,
    pub distance: f64,
}

impl ClosestPair {
    fn precedence(&self, other: &ClosestPair) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.left.cmp(&other.left))
            .then_with(|| self.right.cmp(&other.right))
    }
}

/// Record of one merge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeStep {
    /// Representative id of the lower parent.
    pub left: FlowId,
    /// Representative id of the higher parent.
    pub right: FlowId,
    /// Representative id of the merged cluster.
    pub merged: FlowId,
    /// Single-linkage distance at which the parents were joined.
    pub distance: f64,
    /// Number of flows in the merged cluster.
    pub size: usize,
}

/// The live set of clusters of one run.
///
/// Clusters are stored by representative id. Removing the two parents of a merge and
/// inserting their union never shifts or invalidates other clusters, and iteration is
/// always in ascending representative id order.
pub struct ClusterStore {
    clusters: BTreeMap<FlowId, Cluster>,
    target: usize,
}

impl ClusterStore {
    /// Creates one singleton cluster per flow.
    ///
    /// # Errors
    ///
    /// * [`ClusteringError::Config`] if `target` is zero.
    /// * [`ClusteringError::DuplicateFlowId`] if two flows share an id.
    pub fn from_flows(
        flows: Vec<FlowRecord>,
        target: usize,
    ) -> Result<ClusterStore, ClusteringError> {
        if target == 0 {
            return Err(ConfigError::NonPositiveTarget.into());
        }

        let mut clusters = BTreeMap::new();
        for flow in flows {
            match clusters.entry(flow.id()) {
                Entry::Occupied(_) => return Err(ClusteringError::DuplicateFlowId(flow.id())),
                Entry::Vacant(slot) => {
                    slot.insert(Cluster::singleton(flow));
                }
            }
        }

        Ok(ClusterStore { clusters, target })
    }

    /// Number of live clusters.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// True for a store built from no flows.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn target(&self) -> usize {
        self.target
    }

    /// Total number of flows over all clusters.
    pub fn flow_count(&self) -> usize {
        self.clusters.values().map(Cluster::size).sum()
    }

    pub fn get(&self, representative_id: FlowId) -> Option<&Cluster> {
        self.clusters.get(&representative_id)
    }

    /// Computes the single-linkage distance of every pair of clusters once and fills
    /// both clusters' neighbor caches with it.
    pub fn initialize_neighbor_caches<M: DistanceMetric>(
        &mut self,
        metric: &M,
    ) -> Result<(), ClusteringError> {
        let count = self.clusters.len();
        let mut entries: Vec<Vec<NeighborEntry>> = Vec::new();
        entries.try_reserve_exact(count)?;
        for _ in 0..count {
            let mut row = Vec::new();
            row.try_reserve_exact(count.saturating_sub(1))?;
            entries.push(row);
        }

        {
            let clusters: Vec<&Cluster> = self.clusters.values().collect();
            for (i, a) in clusters.iter().enumerate() {
                for (j, b) in clusters.iter().enumerate().skip(i + 1) {
                    let distance = a.single_linkage_distance(b, metric);
                    entries[i].push(NeighborEntry::new(b.representative_id(), distance));
                    entries[j].push(NeighborEntry::new(a.representative_id(), distance));
                }
            }
        }

        for (cluster, row) in self.clusters.values_mut().zip(entries) {
            cluster.set_neighbors(NeighborCache::from_entries(row)?);
        }
        log::info!("Neighbor caches built for {count} clusters");
        Ok(())
    }

    /// Finds the pair of clusters with the smallest cached distance.
    ///
    /// Ties are broken by the lower `(left, right)` representative id pair. Returns `None`
    /// if no cluster has a cached neighbor.
    pub fn closest_pair(&self) -> Option<ClosestPair> {
        self.clusters
            .iter()
            .filter_map(|(&id, cluster)| {
                cluster.neighbors().nearest().map(|nearest| ClosestPair {
                    left: id.min(nearest.peer),
                    right: id.max(nearest.peer),
                    distance: nearest.distance,
                })
            })
            .min_by(ClosestPair::precedence)
    }

    /// Merges the closest pair of clusters and updates every surviving cache.
    ///
    /// Each survivor drops its entries for the two parents and gains one entry for the
    /// merged cluster at the smaller of the two distances.
    ///
    /// # Errors
    ///
    /// * [`ClusteringError::InconsistentCache`] if a cache misses one of the parents.
    /// * [`ClusteringError::TargetUnreachable`] if fewer than two clusters are left.
    /// * [`ClusteringError::AllocationFailure`] if cache storage cannot grow.
    pub fn merge_closest(&mut self) -> Result<MergeStep, ClusteringError> {
        let pair = self.closest_pair().ok_or_else(|| self.no_pair_error())?;
        self.check_pair_caches(&pair)?;

        let left = self.take(pair.left)?;
        let right = self.take(pair.right)?;
        let merged = Cluster::merge(left, right)?;
        let merged_id = merged.representative_id();

        for (&id, cluster) in self.clusters.iter_mut() {
            let cache = cluster.neighbors_mut();
            let to_left = cache.remove(pair.left).ok_or(ClusteringError::InconsistentCache {
                cluster: id,
                peer: pair.left,
            })?;
            let to_right = cache
                .remove(pair.right)
                .ok_or(ClusteringError::InconsistentCache {
                    cluster: id,
                    peer: pair.right,
                })?;
            cache.insert(merged_id, to_left.min(to_right))?;
        }

        let step = MergeStep {
            left: pair.left,
            right: pair.right,
            merged: merged_id,
            distance: pair.distance,
            size: merged.size(),
        };
        self.clusters.insert(merged_id, merged);
        Ok(step)
    }

    /// Clusters in ascending representative id order.
    pub fn snapshot_sorted_by_id(&self) -> Vec<&Cluster> {
        self.clusters.values().collect()
    }

    pub fn into_sorted_clusters(self) -> Vec<Cluster> {
        self.clusters.into_values().collect()
    }

    /// Checks that the two parents and every survivor know each other, so the merge
    /// cannot fail halfway with a cache miss and leave the store short of flows.
    fn check_pair_caches(&self, pair: &ClosestPair) -> Result<(), ClusteringError> {
        let missing = |cluster: FlowId, peer: FlowId| ClusteringError::InconsistentCache {
            cluster,
            peer,
        };
        let left = self
            .clusters
            .get(&pair.left)
            .ok_or(missing(pair.right, pair.left))?;
        let right = self
            .clusters
            .get(&pair.right)
            .ok_or(missing(pair.left, pair.right))?;
        if !left.neighbors().contains(pair.right) {
            return Err(missing(pair.left, pair.right));
        }
        if !right.neighbors().contains(pair.left) {
            return Err(missing(pair.right, pair.left));
        }

        for (&id, cluster) in self.clusters.iter() {
            if id == pair.left || id == pair.right {
                continue;
            }
            for parent in [pair.left, pair.right] {
                if !cluster.neighbors().contains(parent) {
                    return Err(missing(id, parent));
                }
            }
            for (parent_id, parent) in [(pair.left, left), (pair.right, right)] {
                if !parent.neighbors().contains(id) {
                    return Err(missing(parent_id, id));
                }
            }
        }

        // Every live peer is known to both parents; anything beyond that is a stale entry.
        for (parent_id, parent) in [(pair.left, left), (pair.right, right)] {
            if let Some(stale) = parent
                .neighbors()
                .iter()
                .find(|entry| !self.clusters.contains_key(&entry.peer))
            {
                return Err(missing(parent_id, stale.peer));
            }
        }
        Ok(())
    }

    fn take(&mut self, id: FlowId) -> Result<Cluster, ClusteringError> {
        self.clusters
            .remove(&id)
            .ok_or(ClusteringError::InconsistentCache {
                cluster: id,
                peer: id,
            })
    }

    fn no_pair_error(&self) -> ClusteringError {
        let mut ids = self.clusters.keys();
        match (ids.next(), ids.next()) {
            (Some(&cluster), Some(&peer)) => ClusteringError::InconsistentCache { cluster, peer },
            _ => ClusteringError::TargetUnreachable {
                target: self.target,
                flows: self.flow_count(),
            },
        }
    }
}
