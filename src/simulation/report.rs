//! End-of-run summary published by the network task.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::cds::CdsOutcome;
use super::node::NodeArena;
use super::routing::RoutingStats;
use super::types::{NodeId, Position};

/// Per-node view of the discovered topology at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeReport {
    pub node_id: NodeId,
    pub position: Position,
    pub neighbors: usize,
    pub gabriel_edges: usize,
    /// Backbone entries left by the last dominating-set computation, in insertion order.
    pub backbone: Vec<NodeId>,
    /// Selected as a dominator by the last computation.
    pub dominator: bool,
    /// The dominator that claimed this node in the last computation.
    pub covered_by: Option<NodeId>,
}

/// Geocast counters kept by the network task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GeocastStats {
    pub requested: u64,
    pub sent: u64,
    pub abandoned: u64,
    /// Dominator pairs left unbridged, summed over every computation.
    pub unbridged_pairs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub node_count: usize,
    /// Real header size of a geocast packet, MAC plus routing header.
    pub header_real_size: Option<usize>,
    pub routing: RoutingStats,
    pub geocast: GeocastStats,
    pub nodes: Vec<NodeReport>,
    pub last_geocast: Option<CdsOutcome>,
}

impl RunReport {
    pub fn new(
        duration_ms: u64,
        arena: &NodeArena,
        header_real_size: Option<usize>,
        routing: RoutingStats,
        geocast: GeocastStats,
        last_geocast: Option<CdsOutcome>,
    ) -> Self {
        let nodes = arena
            .iter()
            .map(|node| NodeReport {
                node_id: node.id(),
                position: *node.position(),
                neighbors: node.neighbors.len(),
                gabriel_edges: node.gabriel.len(),
                backbone: node.backbone.ids(),
                dominator: last_geocast.as_ref().is_some_and(|o| o.is_dominator(node.id())),
                covered_by: last_geocast.as_ref().and_then(|o| o.covering_dominator(node.id())),
            })
            .collect();

        Self {
            finished_at: Utc::now(),
            duration_ms,
            node_count: arena.len(),
            header_real_size,
            routing,
            geocast,
            nodes,
            last_geocast,
        }
    }

    /// Mean number of Gabriel edges per node.
    pub fn mean_gabriel_degree(&self) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        self.nodes.iter().map(|n| n.gabriel_edges).sum::<usize>() as f64 / self.nodes.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::cds::do_cds;

    #[test]
    fn report_lists_every_node_and_serializes() {
        let mut arena = NodeArena::new();
        let a = arena.push(Position::new(0.0, 0.0, 0.0), 1.0);
        let b = arena.push(Position::new(0.5, 0.0, 0.0), 1.0);
        let far = arena.get(b).unwrap().destination;
        arena.get_mut(a).unwrap().gabriel.insert(far);

        let report = RunReport::new(1500, &arena, Some(64), RoutingStats::default(), GeocastStats::default(), None);
        assert_eq!(report.node_count, 2);
        assert_eq!(report.nodes[0].gabriel_edges, 1);
        assert_eq!(report.mean_gabriel_degree(), 0.5);
        assert!(report.nodes.iter().all(|n| !n.dominator && n.covered_by.is_none()));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["duration_ms"], 1500);
        assert_eq!(json["header_real_size"], 64);
        assert_eq!(json["nodes"][1]["node_id"], 1);
        assert!(json["last_geocast"].is_null());
    }

    #[test]
    fn node_roles_come_from_the_last_computation() {
        let mut arena = NodeArena::new();
        for x in [0.0, 0.5, 3.0] {
            arena.push(Position::new(x, 0.0, 0.0), 1.0);
        }
        let first = arena.get(0).unwrap().destination;
        let second = arena.get(1).unwrap().destination;
        arena.get_mut(0).unwrap().neighbors.insert(second);
        arena.get_mut(1).unwrap().neighbors.insert(first);

        let outcome = do_cds(&mut arena, &first).unwrap();
        let report = RunReport::new(1000, &arena, None, RoutingStats::default(), GeocastStats::default(), Some(outcome));

        assert!(report.nodes[0].dominator);
        assert_eq!(report.nodes[0].backbone, vec![1]);
        assert!(!report.nodes[1].dominator);
        assert_eq!(report.nodes[1].covered_by, Some(0));
        assert_eq!(report.nodes[1].backbone, vec![0]);
        assert!(!report.nodes[2].dominator);
        assert_eq!(report.nodes[2].covered_by, None);
        assert!(report.nodes[2].backbone.is_empty());
    }
}
