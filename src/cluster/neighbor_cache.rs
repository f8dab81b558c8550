use crate::flow::FlowId;
use std::cmp::Ordering;
use std::collections::{HashMap, TryReserveError};

/// Cached single-linkage distance from a cluster to one of its peers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborEntry {
    /// Representative id of the peer cluster.
    pub peer: FlowId,
    pub distance: f64,
}

impl NeighborEntry {
    pub fn new(peer: FlowId, distance: f64) -> NeighborEntry {
        NeighborEntry { peer, distance }
    }
}

/// Orders entries by distance, then by peer id, so equal distances resolve to the lowest peer.
fn cmp_entries(a: &NeighborEntry, b: &NeighborEntry) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.peer.cmp(&b.peer))
}

/// Distances from one cluster to every other live cluster.
///
/// Entries are kept sorted ascending by `(distance, peer)`, so the nearest peer is
/// always the first entry. A side index by peer id gives constant-time lookups and
/// lets removal locate an entry with a binary search instead of a scan.
#[derive(Debug, Clone, Default)]
pub struct NeighborCache {
    entries: Vec<NeighborEntry>,
    distances: HashMap<FlowId, f64>,
}

impl NeighborCache {
    pub fn new() -> NeighborCache {
        NeighborCache::default()
    }

    /// Builds a cache from entries in any order.
    ///
    /// A peer listed twice keeps its smallest distance.
    pub(crate) fn from_entries(
        mut entries: Vec<NeighborEntry>,
    ) -> Result<NeighborCache, TryReserveError> {
        entries.sort_unstable_by(cmp_entries);

        let mut distances = HashMap::new();
        distances.try_reserve(entries.len())?;
        let mut unique = Vec::new();
        unique.try_reserve_exact(entries.len())?;
        for entry in entries {
            if distances.insert(entry.peer, entry.distance).is_none() {
                unique.push(entry);
            }
        }

        Ok(NeighborCache {
            entries: unique,
            distances,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The closest peer, ties resolved towards the lowest peer id.
    pub fn nearest(&self) -> Option<NeighborEntry> {
        self.entries.first().copied()
    }

    pub fn distance_to(&self, peer: FlowId) -> Option<f64> {
        self.distances.get(&peer).copied()
    }

    pub fn contains(&self, peer: FlowId) -> bool {
        self.distances.contains_key(&peer)
    }

    /// Entries in ascending `(distance, peer)` order.
    pub fn iter(&self) -> impl Iterator<Item = &NeighborEntry> {
        self.entries.iter()
    }

    /// Inserts or replaces the distance to `peer`, keeping the entries sorted.
    pub(crate) fn insert(&mut self, peer: FlowId, distance: f64) -> Result<(), TryReserveError> {
        self.remove(peer);
        self.entries.try_reserve(1)?;
        self.distances.try_reserve(1)?;

        let entry = NeighborEntry::new(peer, distance);
        let position = match self
            .entries
            .binary_search_by(|current| cmp_entries(current, &entry))
        {
            Ok(position) | Err(position) => position,
        };
        self.entries.insert(position, entry);
        self.distances.insert(peer, distance);
        Ok(())
    }

    /// Removes the entry for `peer` and returns its distance.
    pub(crate) fn remove(&mut self, peer: FlowId) -> Option<f64> {
        let distance = self.distances.remove(&peer)?;
        let entry = NeighborEntry::new(peer, distance);
        let position = match self
            .entries
            .binary_search_by(|current| cmp_entries(current, &entry))
        {
            Ok(position) => position,
            // The index and the entries disagree only if a distance compared unequal to itself.
            Err(_) => self.entries.iter().position(|current| current.peer == peer)?,
        };
        self.entries.remove(position);
        Some(distance)
    }
}
