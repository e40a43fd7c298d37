//! Per-node neighbor storage.
//!
//! Three containers live on every node:
//! - `NeighborDirectory`: every one-hop neighbor heard so far, unique by id
//! - `GabrielEdges`: neighbors that survived the Gabriel witness test
//! - `BackboneEdges`: edges written by the dominating-set construction
//!
//! Gabriel and backbone edges share one implementation, `EdgeSet`, but are
//! distinct types so the two interpretations can never be mixed up.

use std::marker::PhantomData;

use super::types::{Destination, NodeId};

/// One-hop neighbors discovered through beacons, in discovery order.
///
/// Entries are never refreshed: a neighbor that moves keeps the position it
/// was first heard at.
#[derive(Debug, Clone, Default)]
pub struct NeighborDirectory {
    entries: Vec<Destination>,
}

impl NeighborDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_id(&self, id: NodeId) -> bool {
        self.entries.iter().any(|n| n.id == id)
    }

    /// Record a neighbor on first contact. Returns `false` if the id is already known.
    pub fn insert(&mut self, neighbor: Destination) -> bool {
        if self.contains_id(neighbor.id) {
            return false;
        }
        self.entries.push(neighbor);
        true
    }

    pub fn as_slice(&self) -> &[Destination] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &Destination> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Marker for edges accepted by the Gabriel witness test.
#[derive(Debug, Clone, Copy)]
pub enum Gabriel {}

/// Marker for dominator/dominatee and bridge edges.
#[derive(Debug, Clone, Copy)]
pub enum Backbone {}

/// Insertion-ordered set of destinations, membership by exact identity.
#[derive(Debug, Clone)]
pub struct EdgeSet<K> {
    entries: Vec<Destination>,
    _kind: PhantomData<K>,
}

pub type GabrielEdges = EdgeSet<Gabriel>;
pub type BackboneEdges = EdgeSet<Backbone>;

impl<K> Default for EdgeSet<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            _kind: PhantomData,
        }
    }
}

impl<K> EdgeSet<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, destination: &Destination) -> bool {
        self.entries.iter().any(|e| e == destination)
    }

    /// Append `destination` unless an identical entry is present.
    pub fn insert(&mut self, destination: Destination) -> bool {
        if self.contains(&destination) {
            return false;
        }
        self.entries.push(destination);
        true
    }

    /// Remove the first identical entry, keeping the order of the rest.
    pub fn remove(&mut self, destination: &Destination) -> bool {
        match self.entries.iter().position(|e| e == destination) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn as_slice(&self) -> &[Destination] {
        &self.entries
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// First destination of `left` that also appears, by identity, in `right`.
///
/// Scans `left` in order and returns the left-hand entry.
pub fn first_common<'a>(left: &'a [Destination], right: &[Destination]) -> Option<&'a Destination> {
    left.iter().find(|l| right.iter().any(|r| r == *l))
}
