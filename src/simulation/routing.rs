//! The CDS routing layer.
//!
//! Sits between the application and the MAC layer. Beacons received through
//! `rx` feed neighbor discovery and planarization; every `set_header` call
//! rebuilds the dominating set for the requested destination's region before
//! handing the packet down.

use serde::Serialize;

use super::cds::{CdsError, CdsOutcome, do_cds};
use super::header::{MacError, MacLayer, Packet, ROUTING_HEADER_SIZE, RoutingHeader};
use super::node::NodeArena;
use super::planarizer::{BeaconOutcome, planarize};
use super::types::{Destination, NodeId};

/// Errors surfaced by the routing layer. None of them stops the simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingError {
    UnknownNode(NodeId),
    MalformedPacket { node: NodeId, len: usize },
    Mac(MacError),
    Cds(CdsError),
}

impl std::fmt::Display for RoutingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutingError::UnknownNode(id) => write!(f, "Unknown node {}", id),
            RoutingError::MalformedPacket { node, len } => {
                write!(f, "Node {} received a {} byte packet without routing header", node, len)
            }
            RoutingError::Mac(e) => write!(f, "Error setting mac header: {}", e),
            RoutingError::Cds(e) => write!(f, "Error computing cds: {}", e),
        }
    }
}

impl std::error::Error for RoutingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RoutingError::Mac(e) => Some(e),
            RoutingError::Cds(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CdsError> for RoutingError {
    fn from(e: CdsError) -> Self {
        RoutingError::Cds(e)
    }
}

impl From<MacError> for RoutingError {
    fn from(e: MacError) -> Self {
        RoutingError::Mac(e)
    }
}

/// Entry points the routing layer exposes to the layers around it.
pub trait RoutingMethods {
    /// Handle a packet coming up from the MAC layer. The packet is consumed.
    fn rx(&mut self, node: NodeId, packet: Packet) -> Result<BeaconOutcome, RoutingError>;
    /// Handle a packet going down. The routing layer does not forward; the packet is released.
    fn tx(&mut self, node: NodeId, packet: Packet);
    /// Write the routing header, rebuild the backbone for `destination`, then the MAC header.
    fn set_header(&mut self, node: NodeId, packet: &mut Packet, destination: &Destination) -> Result<CdsOutcome, RoutingError>;
    /// Lower-layer header size plus the routing header.
    fn header_size(&mut self, node: NodeId) -> Result<usize, RoutingError>;
    /// Lower-layer real header size plus the routing header.
    fn header_real_size(&mut self, node: NodeId) -> Result<usize, RoutingError>;
}

/// Counters kept by the routing layer over a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoutingStats {
    pub beacons_sent: u64,
    pub beacons_received: u64,
    pub neighbors_discovered: u64,
    pub gabriel_edges_added: u64,
    pub edges_witnessed: u64,
    pub headers_set: u64,
    pub packets_released: u64,
}

pub struct CdsRouting<M: MacLayer> {
    arena: NodeArena,
    mac: M,
    stats: RoutingStats,
}

impl<M: MacLayer> CdsRouting<M> {
    pub fn new(arena: NodeArena, mac: M) -> Self {
        Self {
            arena,
            mac,
            stats: RoutingStats::default(),
        }
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub fn stats(&self) -> &RoutingStats {
        &self.stats
    }

    /// Prime the cached lower-layer header size of `node`.
    pub fn bootstrap(&mut self, node: NodeId) -> Result<(), RoutingError> {
        self.overhead(node).map(|_| ())
    }

    /// Build the hello beacon of `node`: broadcast MAC header, then `{node, NONE}`.
    pub fn hello(&mut self, node: NodeId) -> Result<Packet, RoutingError> {
        let overhead = self.overhead(node)?;
        let me = self.arena.get(node).ok_or(RoutingError::UnknownNode(node))?.destination;

        let mut packet = Packet::alloc(node, overhead + ROUTING_HEADER_SIZE);
        self.mac.set_header(node, &mut packet, &Destination::BROADCAST)?;
        let header = RoutingHeader {
            sender: me,
            dest: Destination::NONE,
        };
        if !header.write_at(&mut packet, overhead) {
            return Err(RoutingError::MalformedPacket { node, len: packet.len() });
        }

        self.stats.beacons_sent += 1;
        Ok(packet)
    }

    fn overhead(&mut self, node: NodeId) -> Result<usize, RoutingError> {
        let state = self.arena.get_mut(node).ok_or(RoutingError::UnknownNode(node))?;
        Ok(*state.overhead.get_or_insert_with(|| self.mac.header_size(node)))
    }

    fn real_overhead(&mut self, node: NodeId) -> Result<usize, RoutingError> {
        let state = self.arena.get_mut(node).ok_or(RoutingError::UnknownNode(node))?;
        Ok(*state.real_overhead.get_or_insert_with(|| self.mac.header_real_size(node)))
    }
}

impl<M: MacLayer> RoutingMethods for CdsRouting<M> {
    fn rx(&mut self, node: NodeId, packet: Packet) -> Result<BeaconOutcome, RoutingError> {
        let overhead = self.overhead(node)?;
        let header = RoutingHeader::read_at(&packet, overhead).ok_or(RoutingError::MalformedPacket { node, len: packet.len() })?;
        let state = self.arena.get_mut(node).ok_or(RoutingError::UnknownNode(node))?;

        let outcome = planarize(state, &header.sender);
        self.stats.beacons_received += 1;
        match outcome {
            BeaconOutcome::Discovered => self.stats.neighbors_discovered += 1,
            BeaconOutcome::Planarized => self.stats.gabriel_edges_added += 1,
            BeaconOutcome::Witnessed { .. } => self.stats.edges_witnessed += 1,
            BeaconOutcome::AlreadyPlanar => {}
        }
        Ok(outcome)
    }

    fn tx(&mut self, node: NodeId, packet: Packet) {
        log::trace!("[{}] releases {} byte packet", node, packet.len());
        self.stats.packets_released += 1;
    }

    fn set_header(&mut self, node: NodeId, packet: &mut Packet, destination: &Destination) -> Result<CdsOutcome, RoutingError> {
        let overhead = self.overhead(node)?;
        let me = self.arena.get(node).ok_or(RoutingError::UnknownNode(node))?.destination;

        let header = RoutingHeader {
            sender: me,
            dest: Destination::NONE,
        };
        if !header.write_at(packet, overhead) {
            return Err(RoutingError::MalformedPacket { node, len: packet.len() });
        }

        let outcome = do_cds(&mut self.arena, destination)?;
        self.mac.set_header(node, packet, destination)?;
        self.stats.headers_set += 1;
        Ok(outcome)
    }

    fn header_size(&mut self, node: NodeId) -> Result<usize, RoutingError> {
        Ok(self.overhead(node)? + ROUTING_HEADER_SIZE)
    }

    fn header_real_size(&mut self, node: NodeId) -> Result<usize, RoutingError> {
        Ok(self.real_overhead(node)? + ROUTING_HEADER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::header::{BroadcastMac, MAC_HEADER_SIZE};
    use crate::simulation::types::Position;
    use std::cell::Cell;

    fn routing(points: &[(f64, f64)]) -> CdsRouting<BroadcastMac> {
        let mut arena = NodeArena::new();
        for &(x, y) in points {
            arena.push(Position::new(x, y, 0.0), 1.5);
        }
        CdsRouting::new(arena, BroadcastMac)
    }

    /// Deliver one beacon round from every node to every other node.
    fn beacon_round(routing: &mut CdsRouting<BroadcastMac>) {
        let ids: Vec<NodeId> = routing.arena().ids().collect();
        for &sender in &ids {
            let packet = routing.hello(sender).unwrap();
            for &receiver in ids.iter().filter(|r| **r != sender) {
                routing.rx(receiver, packet.clone()).unwrap();
            }
        }
    }

    #[test]
    fn hello_carries_sender_and_no_destination() {
        let mut routing = routing(&[(0.0, 0.0), (1.0, 0.0)]);
        let packet = routing.hello(1).unwrap();
        assert_eq!(packet.len(), MAC_HEADER_SIZE + ROUTING_HEADER_SIZE);

        let header = RoutingHeader::read_at(&packet, MAC_HEADER_SIZE).unwrap();
        assert_eq!(header.sender, routing.arena().get(1).unwrap().destination);
        assert_eq!(header.dest, Destination::NONE);
        assert_eq!(routing.stats().beacons_sent, 1);
    }

    #[test]
    fn two_beacon_rounds_discover_then_planarize() {
        let mut routing = routing(&[(0.0, 0.0), (1.0, 0.0)]);
        beacon_round(&mut routing);
        assert_eq!(routing.arena().get(0).unwrap().neighbors.len(), 1);
        assert!(routing.arena().get(0).unwrap().gabriel.is_empty());

        beacon_round(&mut routing);
        assert_eq!(routing.arena().get(0).unwrap().gabriel.ids(), vec![1]);
        assert_eq!(routing.stats().neighbors_discovered, 2);
        assert_eq!(routing.stats().gabriel_edges_added, 2);
    }

    #[test]
    fn set_header_builds_backbone_and_writes_headers() {
        let mut routing = routing(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (0.0, 1.0), (5.0, 5.0)]);
        beacon_round(&mut routing);

        let size = routing.header_size(0).unwrap();
        let mut packet = Packet::alloc(0, size + 16);
        let target = routing.arena().get(1).unwrap().destination;
        let outcome = routing.set_header(0, &mut packet, &target).unwrap();

        assert_eq!(outcome.candidates.len(), 4);
        let header = RoutingHeader::read_at(&packet, MAC_HEADER_SIZE).unwrap();
        assert_eq!(header.sender.id, 0);
        assert_eq!(header.dest, Destination::NONE);
        assert_eq!(&packet.data[4..8], &1i32.to_le_bytes());

        routing.tx(0, packet);
        assert_eq!(routing.stats().packets_released, 1);
        assert_eq!(routing.stats().headers_set, 1);
    }

    #[test]
    fn empty_region_abandons_the_send() {
        let mut routing = routing(&[(0.0, 0.0)]);
        let mut packet = Packet::alloc(0, 128);
        let far = Destination::new(-2, Position::new(40.0, 40.0, 0.0));
        let err = routing.set_header(0, &mut packet, &far).unwrap_err();
        assert_eq!(err, RoutingError::Cds(CdsError::EmptyRegion(far)));
        // The mac header is never written when the cds fails.
        assert!(packet.data[..MAC_HEADER_SIZE].iter().all(|b| *b == 0));
        assert_eq!(routing.stats().headers_set, 0);
    }

    #[test]
    fn truncated_packet_is_malformed() {
        let mut routing = routing(&[(0.0, 0.0), (1.0, 0.0)]);
        let err = routing.rx(0, Packet::alloc(1, MAC_HEADER_SIZE)).unwrap_err();
        assert_eq!(err, RoutingError::MalformedPacket { node: 0, len: MAC_HEADER_SIZE });
        assert_eq!(routing.rx(7, Packet::alloc(1, 64)), Err(RoutingError::UnknownNode(7)));
    }

    struct CountingMac {
        queries: Cell<usize>,
    }

    impl MacLayer for CountingMac {
        fn set_header(&self, _node: NodeId, _packet: &mut Packet, _destination: &Destination) -> Result<(), MacError> {
            Ok(())
        }

        fn header_size(&self, _node: NodeId) -> usize {
            self.queries.set(self.queries.get() + 1);
            12
        }

        fn header_real_size(&self, _node: NodeId) -> usize {
            10
        }
    }

    #[test]
    fn lower_header_size_is_queried_once_per_node() {
        let mut arena = NodeArena::new();
        arena.push(Position::new(0.0, 0.0, 0.0), 1.0);
        arena.push(Position::new(0.5, 0.0, 0.0), 1.0);
        let mut routing = CdsRouting::new(arena, CountingMac { queries: Cell::new(0) });

        routing.bootstrap(0).unwrap();
        assert_eq!(routing.header_size(0).unwrap(), 12 + ROUTING_HEADER_SIZE);
        assert_eq!(routing.header_size(0).unwrap(), 12 + ROUTING_HEADER_SIZE);
        assert_eq!(routing.mac.queries.get(), 1);

        assert_eq!(routing.header_real_size(1).unwrap(), 10 + ROUTING_HEADER_SIZE);
        assert_eq!(routing.header_size(1).unwrap(), 12 + ROUTING_HEADER_SIZE);
        assert_eq!(routing.mac.queries.get(), 2);
    }
}
