mod neighbor_cache;

use crate::distance::DistanceMetric;
use crate::error::ClusteringError;
use crate::flow::{FlowId, FlowRecord};
pub use neighbor_cache::{NeighborCache, NeighborEntry};
use std::collections::TryReserveError;

/// A non-empty group of flows together with its distances to every other live cluster.
///
/// Members are always sorted ascending by flow id, so the first member carries the
/// representative id that identifies the cluster in neighbor caches and in reports.
///
/// # Example
///
/// ```
/// use flow_clustering::{Cluster, FlowRecord};
///
/// let cluster = Cluster::new(vec![
///     FlowRecord::new(7, 100, 1, 0.5, 10.0),
///     FlowRecord::new(3, 200, 2, 0.5, 20.0),
/// ])
/// .unwrap();
/// assert_eq!(cluster.representative_id(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct Cluster {
    members: Vec<FlowRecord>,
    neighbors: NeighborCache,
}

impl Cluster {
    /// Creates a cluster from the given flows, sorting them by id.
    ///
    /// Returns `None` for an empty list, since a cluster without members has no identity.
    pub fn new(mut flows: Vec<FlowRecord>) -> Option<Cluster> {
        if flows.is_empty() {
            return None;
        }
        flows.sort_by_key(FlowRecord::id);
        Some(Cluster {
            members: flows,
            neighbors: NeighborCache::new(),
        })
    }

    pub fn singleton(flow: FlowRecord) -> Cluster {
        Cluster {
            members: vec![flow],
            neighbors: NeighborCache::new(),
        }
    }

    /// The smallest flow id in the cluster.
    pub fn representative_id(&self) -> FlowId {
        self.members[0].id()
    }

    pub fn flow_ids(&self) -> impl Iterator<Item = FlowId> + '_ {
        self.members.iter().map(FlowRecord::id)
    }

    /// Number of flows in the cluster.
    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn neighbors(&self) -> &NeighborCache {
        &self.neighbors
    }

    pub(crate) fn set_neighbors(&mut self, neighbors: NeighborCache) {
        self.neighbors = neighbors;
    }

    pub(crate) fn neighbors_mut(&mut self) -> &mut NeighborCache {
        &mut self.neighbors
    }

    /// Minimum flow-to-flow distance between the two clusters.
    ///
    /// Compares every pair of members, so it is only used to seed the caches.
    pub fn single_linkage_distance<M: DistanceMetric>(&self, other: &Cluster, metric: &M) -> f64 {
        self.members
            .iter()
            .flat_map(|a| other.members.iter().map(move |b| metric.distance(a, b)))
            .fold(f64::INFINITY, f64::min)
    }

    /// Merges two clusters into one.
    ///
    /// Members are merged in id order. The merged cache takes, for every surviving peer,
    /// the smaller of the two parents' cached distances, which is the single-linkage
    /// distance of the union; no flow distances are recomputed.
    ///
    /// # Errors
    ///
    /// * [`ClusteringError::InconsistentCache`] if one parent knows a peer the other does not.
    /// * [`ClusteringError::AllocationFailure`] if the merged storage cannot be reserved.
    pub fn merge(a: Cluster, b: Cluster) -> Result<Cluster, ClusteringError> {
        let a_id = a.representative_id();
        let b_id = b.representative_id();

        if let Some(missing) = b
            .neighbors
            .iter()
            .find(|entry| entry.peer != a_id && !a.neighbors.contains(entry.peer))
        {
            return Err(ClusteringError::InconsistentCache {
                cluster: a_id,
                peer: missing.peer,
            });
        }

        let mut entries = Vec::new();
        entries.try_reserve_exact(a.neighbors.len())?;
        for entry in a.neighbors.iter().filter(|entry| entry.peer != b_id) {
            let other = b.neighbors.distance_to(entry.peer).ok_or(
                ClusteringError::InconsistentCache {
                    cluster: b_id,
                    peer: entry.peer,
                },
            )?;
            entries.push(NeighborEntry::new(entry.peer, entry.distance.min(other)));
        }

        Ok(Cluster {
            members: merge_members(a.members, b.members)?,
            neighbors: NeighborCache::from_entries(entries)?,
        })
    }
}

/// Merges two id-sorted member lists into one id-sorted list.
fn merge_members(
    a: Vec<FlowRecord>,
    b: Vec<FlowRecord>,
) -> Result<Vec<FlowRecord>, TryReserveError> {
    let mut merged = Vec::new();
    merged.try_reserve_exact(a.len() + b.len())?;

    let mut a = a.into_iter().peekable();
    let mut b = b.into_iter().peekable();
    loop {
        let take_a = match (a.peek(), b.peek()) {
            (Some(x), Some(y)) => x.id() <= y.id(),
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        merged.extend(if take_a { a.next() } else { b.next() });
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::Weights;

    fn flow(id: FlowId, bytes: u64) -> FlowRecord {
        FlowRecord::new(id, bytes, 0, 0.0, 0.0)
    }

    fn ids(cluster: &Cluster) -> Vec<FlowId> {
        cluster.flow_ids().collect()
    }

    fn with_cache(flows: Vec<FlowRecord>, cache: &[(FlowId, f64)]) -> Cluster {
        let mut cluster = Cluster::new(flows).unwrap();
        cluster.set_neighbors(
            NeighborCache::from_entries(
                cache
                    .iter()
                    .map(|&(peer, distance)| NeighborEntry::new(peer, distance))
                    .collect(),
            )
            .unwrap(),
        );
        cluster
    }

    #[test]
    fn new_should_sort_members_and_reject_empty() {
        let cluster = Cluster::new(vec![flow(9, 0), flow(2, 0), flow(5, 0)]).unwrap();
        assert_eq!(ids(&cluster), vec![2, 5, 9]);
        assert_eq!(cluster.representative_id(), 2);
        assert!(cluster.neighbors().is_empty());
        assert!(Cluster::new(Vec::new()).is_none());
    }

    #[test]
    fn single_linkage_distance_should_take_closest_members() {
        let a = Cluster::new(vec![flow(1, 0), flow(2, 100)]).unwrap();
        let b = Cluster::new(vec![flow(3, 130), flow(4, 500)]).unwrap();
        let weights = Weights::default();
        assert_eq!(a.single_linkage_distance(&b, &weights), 30.0);
        assert_eq!(b.single_linkage_distance(&a, &weights), 30.0);
    }

    #[test]
    fn merge_should_interleave_members_by_id() {
        let a = Cluster::new(vec![flow(1, 0), flow(6, 0), flow(8, 0)]).unwrap();
        let b = Cluster::new(vec![flow(2, 0), flow(7, 0), flow(11, 0)]).unwrap();
        let merged = Cluster::merge(b, a).unwrap();
        assert_eq!(ids(&merged), vec![1, 2, 6, 7, 8, 11]);
        assert_eq!(merged.representative_id(), 1);
    }

    #[test]
    fn merge_should_keep_minimum_distance_per_peer() {
        let a = with_cache(vec![flow(1, 0)], &[(2, 1.0), (3, 5.0), (4, 2.0)]);
        let b = with_cache(vec![flow(2, 0)], &[(1, 1.0), (3, 4.0), (4, 7.0)]);
        let merged = Cluster::merge(a, b).unwrap();

        let cache = merged.neighbors();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.distance_to(3), Some(4.0));
        assert_eq!(cache.distance_to(4), Some(2.0));
        assert_eq!(cache.nearest(), Some(NeighborEntry::new(4, 2.0)));
        assert!(!cache.contains(1));
        assert!(!cache.contains(2));
    }

    #[test]
    fn merge_should_fail_on_peer_known_to_one_parent() {
        let a = with_cache(vec![flow(1, 0)], &[(2, 1.0), (3, 5.0)]);
        let b = with_cache(vec![flow(2, 0)], &[(1, 1.0)]);
        assert!(matches!(
            Cluster::merge(a, b),
            Err(ClusteringError::InconsistentCache {
                cluster: 2,
                peer: 3
            })
        ));

        let a = with_cache(vec![flow(1, 0)], &[(2, 1.0)]);
        let b = with_cache(vec![flow(2, 0)], &[(1, 1.0), (3, 5.0)]);
        assert!(matches!(
            Cluster::merge(a, b),
            Err(ClusteringError::InconsistentCache {
                cluster: 1,
                peer: 3
            })
        ));
    }
}
