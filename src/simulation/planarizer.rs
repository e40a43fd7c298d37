//! Beacon-driven neighbor discovery and Gabriel-Graph planarization.

use serde::Serialize;

use super::geometry::gabriel_witness;
use super::node::NodeState;
use super::types::{Destination, NodeId};

/// What a single beacon receipt did to the receiving node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BeaconOutcome {
    /// First contact: the sender entered the neighbor directory, no witness test ran.
    Discovered,
    /// The edge passed the witness test and was added to the Gabriel edges.
    Planarized,
    /// The edge passed the witness test but was already a Gabriel edge.
    AlreadyPlanar,
    /// A known neighbor witnessed the edge; nothing was added.
    Witnessed { witness: NodeId },
}

/// Apply one received beacon from `sender` to `node`.
///
/// Unknown senders are recorded unconditionally. Known senders keep the
/// position stored at first contact; the witness test is evaluated with the
/// position carried by this beacon against the stored records.
pub fn planarize(node: &mut NodeState, sender: &Destination) -> BeaconOutcome {
    if !node.neighbors.contains_id(sender.id) {
        node.neighbors.insert(*sender);
        log::trace!("[{}] adds {} to neighbor list", node.id(), sender.id);
        return BeaconOutcome::Discovered;
    }

    if let Some(witness) = gabriel_witness(node.neighbors.as_slice(), &node.destination.position, sender) {
        return BeaconOutcome::Witnessed { witness: witness.id };
    }

    if node.gabriel.insert(*sender) {
        log::trace!("[{}] adds {} to gabriel neighbor list", node.id(), sender.id);
        BeaconOutcome::Planarized
    } else {
        BeaconOutcome::AlreadyPlanar
    }
}
