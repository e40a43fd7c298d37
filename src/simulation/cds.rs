//! Connected dominating set construction over a geocast region.
//!
//! `do_cds` runs in two phases over the whole node arena:
//!
//! 1. **Greedy extraction.** In-region nodes form a candidate pool in id
//!    order. The first remaining candidate becomes a dominator and every
//!    node in its full neighbor directory is removed from the pool and
//!    linked to it with a symmetric backbone edge.
//! 2. **Bridging.** Every pair of dominators that shares no backbone entry is
//!    bridged through the first dominatee whose neighbor directory contains
//!    an entry of the other dominator's backbone (`add_first_link`).
//!
//! The result is best effort: pairs that cannot be bridged through a
//! two-hop common neighbor stay disconnected and are reported, not failed.
//! Only backbone edges are written; Gabriel edges are left untouched.

use serde::Serialize;
use std::collections::TryReserveError;

use super::neighbors::first_common;
use super::node::NodeArena;
use super::region::in_region;
use super::types::{Destination, NodeId};

/// Failure of a dominating-set computation.
#[derive(Debug, Clone, PartialEq)]
pub enum CdsError {
    /// A working list could not be allocated. No node state was touched.
    Allocation(&'static str),
    /// No node lies inside the region around the target.
    EmptyRegion(Destination),
}

impl std::fmt::Display for CdsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CdsError::Allocation(list) => write!(f, "Can't allocate {} for cds", list),
            CdsError::EmptyRegion(target) => write!(
                f,
                "No node inside geocast region around node {} ({}, {})",
                target.id, target.position.x, target.position.y
            ),
        }
    }
}

impl std::error::Error for CdsError {}

/// A non-dominator candidate and the dominator that removed it from the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Coverage {
    pub dominatee: NodeId,
    pub dominator: NodeId,
}

/// A bridge added between two dominators without a common backbone entry.
///
/// `relay` was inserted into `from`'s backbone and `link` into `relay`'s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bridge {
    pub from: NodeId,
    pub to: NodeId,
    pub link: NodeId,
    pub relay: NodeId,
}

/// Everything one `do_cds` call decided.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CdsOutcome {
    pub target: Destination,
    /// In-region nodes, in id order.
    pub candidates: Vec<Destination>,
    /// Dominators, in extraction order.
    pub dominators: Vec<Destination>,
    pub coverage: Vec<Coverage>,
    pub bridges: Vec<Bridge>,
    /// Dominator pairs left without a common backbone entry.
    pub unbridged: Vec<(NodeId, NodeId)>,
}

impl CdsOutcome {
    pub fn is_dominator(&self, id: NodeId) -> bool {
        self.dominators.iter().any(|d| d.id == id)
    }

    /// The dominator that claimed `id`, if `id` was a non-dominator candidate.
    pub fn covering_dominator(&self, id: NodeId) -> Option<NodeId> {
        self.coverage.iter().find(|c| c.dominatee == id).map(|c| c.dominator)
    }
}

fn reserve(list: &mut Vec<Destination>, additional: usize, name: &'static str) -> Result<(), CdsError> {
    list.try_reserve(additional).map_err(|_: TryReserveError| CdsError::Allocation(name))
}

/// Build the dominating set and backbone for the region around `target`.
///
/// Mutates the backbone edges of every in-region node, of their neighbors,
/// and of any node touched by a bridge.
pub fn do_cds(arena: &mut NodeArena, target: &Destination) -> Result<CdsOutcome, CdsError> {
    let mut pool: Vec<Destination> = Vec::new();
    let mut dominators: Vec<Destination> = Vec::new();
    reserve(&mut pool, arena.len(), "candidate pool")?;
    reserve(&mut dominators, arena.len(), "dominator pool")?;

    // Selection and reset of stale backbone edges.
    for id in arena.ids() {
        let Some(node) = arena.get(id) else { continue };
        let candidate = node.destination;
        if !in_region(target, &candidate) {
            continue;
        }
        pool.push(candidate);

        let neighbor_ids: Vec<NodeId> = node.neighbors.iter().map(|n| n.id).collect();
        if let Some(node) = arena.get_mut(id) {
            node.backbone.clear();
        }
        for neighbor_id in neighbor_ids {
            if let Some(neighbor) = arena.get_mut(neighbor_id) {
                neighbor.backbone.remove(&candidate);
            }
        }
    }

    let candidates = pool.clone();
    let mut coverage = Vec::new();

    // Greedy extraction in pool order.
    while !pool.is_empty() {
        let dominator = pool.remove(0);
        dominators.push(dominator);

        let neighbors: Vec<Destination> = arena.get(dominator.id).map(|n| n.neighbors.as_slice().to_vec()).unwrap_or_default();

        for neighbor in neighbors {
            if let Some(idx) = pool.iter().position(|c| *c == neighbor) {
                pool.remove(idx);
                coverage.push(Coverage {
                    dominatee: neighbor.id,
                    dominator: dominator.id,
                });
            }
            if let Some(node) = arena.get_mut(dominator.id) {
                node.backbone.insert(neighbor);
            }
            if let Some(node) = arena.get_mut(neighbor.id) {
                node.backbone.insert(dominator);
            }
        }
    }
    drop(pool);

    if dominators.is_empty() {
        return Err(CdsError::EmptyRegion(*target));
    }

    let (bridges, unbridged) = connect_backbone(arena, &dominators);

    log::debug!(
        "cds around node {}: {} candidates, {} dominators, {} bridges, {} unbridged",
        target.id,
        candidates.len(),
        dominators.len(),
        bridges.len(),
        unbridged.len()
    );

    Ok(CdsOutcome {
        target: *target,
        candidates,
        dominators,
        coverage,
        bridges,
        unbridged,
    })
}

/// Bridge every dominator pair that shares no backbone entry.
///
/// Pairs are visited as `(dominators[i], dominators[j])` with `i < j`.
pub fn connect_backbone(arena: &mut NodeArena, dominators: &[Destination]) -> (Vec<Bridge>, Vec<(NodeId, NodeId)>) {
    let mut bridges = Vec::new();
    let mut unbridged = Vec::new();

    for (i, first) in dominators.iter().enumerate() {
        for second in &dominators[i + 1..] {
            if dominators_share_neighbor(arena, first.id, second.id) {
                continue;
            }
            match add_first_link(arena, first.id, second.id) {
                Some(bridge) => bridges.push(bridge),
                None => {
                    log::warn!("cds: no bridge between dominators {} and {}, backbone stays disconnected", first.id, second.id);
                    unbridged.push((first.id, second.id));
                }
            }
        }
    }

    (bridges, unbridged)
}

/// First destination present in both sets, by identity.
pub fn has_common_nbr(left: &[Destination], right: &[Destination]) -> Option<Destination> {
    first_common(left, right).copied()
}

fn dominators_share_neighbor(arena: &NodeArena, first: NodeId, second: NodeId) -> bool {
    match (arena.get(first), arena.get(second)) {
        (Some(a), Some(b)) => has_common_nbr(a.backbone.as_slice(), b.backbone.as_slice()).is_some(),
        _ => false,
    }
}

/// Connect dominator `from` toward dominator `to` through a two-hop bridge.
///
/// Walks `from`'s backbone in order. For each entry L, the first entry R of
/// L's neighbor directory that is also in `to`'s backbone is the bridge: R is
/// added to `from`'s backbone and L to R's backbone. The first match wins.
pub fn add_first_link(arena: &mut NodeArena, from: NodeId, to: NodeId) -> Option<Bridge> {
    let links = arena.get(from)?.backbone.as_slice().to_vec();
    let far_side = arena.get(to)?.backbone.as_slice().to_vec();

    for link in links {
        let Some(link_node) = arena.get(link.id) else { continue };
        let Some(relay) = has_common_nbr(link_node.neighbors.as_slice(), &far_side) else {
            continue;
        };

        if let Some(node) = arena.get_mut(from) {
            node.backbone.insert(relay);
        }
        if let Some(node) = arena.get_mut(relay.id) {
            node.backbone.insert(link);
        }
        return Some(Bridge {
            from,
            to,
            link: link.id,
            relay: relay.id,
        });
    }

    None
}
