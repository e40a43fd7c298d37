//! Central network task driving the simulation timeline.
//!
//! High-level flow:
//! 1) Build the node arena from the scene and spawn one beacon timer per node
//!    plus one application task per configured geocast source.
//! 2) `select` waits for either a node event or the end of the run.
//! 3) `HelloDue` broadcasts the node's beacon to every node in radio range;
//!    `GeocastRequested` runs the routing layer's header construction, which
//!    rebuilds the dominating set for the target's region.
//! 4) When the run ends, a `RunReport` is published on the report channel.

use embassy_executor::Spawner;
use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Instant, Timer};

use crate::common::config::SimulationConfig;
use crate::common::scene::Scene;

use super::cds::CdsOutcome;
use super::geometry::distance;
use super::header::{BroadcastMac, MacLayer, Packet};
use super::node::NodeArena;
use super::node_task::{geocast_task, node_task};
use super::report::{GeocastStats, RunReport};
use super::routing::{CdsRouting, RoutingError, RoutingMethods};
use super::types::{Destination, NodeId, NodeOutputMessage, NodeOutputPayload, NodesOutputQueue, ReportQueueSender};

/// Build the node arena from a validated scene, ids in ascending order.
pub fn build_arena(scene: &Scene, default_radio_range: f64) -> NodeArena {
    let mut arena = NodeArena::new();
    for node in scene.nodes_by_id() {
        let id = arena.push(node.position, scene.radio_range_of(node, default_radio_range));
        if id != node.node_id {
            log::warn!("Scene node {} stored as {}", node.node_id, id);
        }
    }
    arena
}

/// Nodes that hear a transmission from `sender_id`.
///
/// Unit-disk model: every other node strictly closer than the sender's radio
/// range, in id order.
pub fn find_target_nodes(arena: &NodeArena, sender_id: NodeId) -> Vec<NodeId> {
    let Some(sender) = arena.get(sender_id) else {
        return Vec::new();
    };

    arena
        .iter()
        .filter(|other| other.id() != sender_id)
        .filter(|other| distance(sender.position(), other.position()) < sender.radio_range)
        .map(|other| other.id())
        .collect()
}

/// Broadcast the beacon of `node_id` and let every node in range process it.
///
/// Returns the number of receivers.
pub fn handle_hello<M: MacLayer>(routing: &mut CdsRouting<M>, node_id: NodeId) -> Result<usize, RoutingError> {
    let packet = routing.hello(node_id)?;
    let targets = find_target_nodes(routing.arena(), node_id);

    for &target in &targets {
        if let Err(e) = routing.rx(target, packet.clone()) {
            log::warn!("[{}] dropped beacon from {}: {}", target, node_id, e);
        }
    }
    Ok(targets.len())
}

/// Run one geocast send from `source` toward the current position of `target`.
///
/// On success the packet is handed to `tx` and the CDS outcome returned. Any
/// failure abandons the send and the packet is dropped.
pub fn handle_geocast<M: MacLayer>(routing: &mut CdsRouting<M>, source: NodeId, target: NodeId, payload_size: usize) -> Result<CdsOutcome, RoutingError> {
    let position = routing.arena().position(target).ok_or(RoutingError::UnknownNode(target))?;
    let destination = Destination::new(target, position);
    let size = routing.header_size(source)?;
    let mut packet = Packet::alloc(source, size + payload_size);

    let outcome = routing.set_header(source, &mut packet, &destination)?;
    routing.tx(source, packet);
    Ok(outcome)
}

/// Jitter seed of the `idx`-th configured geocast application.
pub fn application_seed(seed: u64, idx: usize) -> u64 {
    seed.wrapping_add(idx as u64)
}

/// Spawn beacon timers for every node and application tasks for every geocast source.
fn spawn_node_tasks(spawner: &Spawner, arena: &NodeArena, config: &SimulationConfig, run_start: Instant, nodes_output_channel: &'static NodesOutputQueue) {
    let beacon_start = run_start + Duration::from_millis(config.beacon_start_ms);
    let beacon_period = Duration::from_millis(config.beacon_period_ms);

    for id in arena.ids() {
        let _ = spawner.spawn(node_task(id, beacon_start, beacon_period, nodes_output_channel.sender()));
    }

    for (idx, geocast) in config.geocast.iter().enumerate() {
        let stop_at = geocast.stop_after_ms.map(|ms| run_start + Duration::from_millis(ms));
        let _ = spawner.spawn(geocast_task(
            geocast.source,
            geocast.target,
            geocast.payload_size,
            Duration::from_millis(geocast.period_ms),
            stop_at,
            application_seed(config.seed, idx),
            nodes_output_channel.sender(),
        ));
    }
}

/// Central network task. Runs for `config.duration_ms` of simulated time.
#[embassy_executor::task]
pub async fn network_task(spawner: Spawner, scene: Scene, config: SimulationConfig, report_tx: ReportQueueSender) {
    let arena = build_arena(&scene, config.radio_range);
    log::info!("Scene loaded with {} nodes", arena.len());

    let mut routing = CdsRouting::new(arena, BroadcastMac);
    for id in routing.arena().ids() {
        if let Err(e) = routing.bootstrap(id) {
            log::error!("[{}] bootstrap failed: {}", id, e);
        }
    }

    // INTENTIONAL LEAK: Box::leak provides 'static lifetime for Embassy channels.
    let nodes_output_channel: &'static NodesOutputQueue = Box::leak(Box::new(NodesOutputQueue::new()));
    let run_start = Instant::now();
    let run_end = run_start + Duration::from_millis(config.duration_ms);
    spawn_node_tasks(&spawner, routing.arena(), &config, run_start, nodes_output_channel);

    let mut geocast_stats = GeocastStats::default();
    let mut last_geocast: Option<CdsOutcome> = None;

    loop {
        match select(nodes_output_channel.receiver().receive(), Timer::at(run_end)).await {
            Either::First(NodeOutputMessage { node_id, payload }) => match payload {
                NodeOutputPayload::HelloDue => match handle_hello(&mut routing, node_id) {
                    Ok(receivers) => log::trace!("[{}] beacon heard by {} nodes", node_id, receivers),
                    Err(e) => log::warn!("[{}] beacon not sent: {}", node_id, e),
                },
                NodeOutputPayload::GeocastRequested { target, payload_size } => {
                    geocast_stats.requested += 1;
                    match handle_geocast(&mut routing, node_id, target, payload_size) {
                        Ok(outcome) => {
                            geocast_stats.sent += 1;
                            geocast_stats.unbridged_pairs += outcome.unbridged.len() as u64;
                            log::info!(
                                "[{}] geocast toward {}: {} dominators over {} candidates",
                                node_id,
                                target,
                                outcome.dominators.len(),
                                outcome.candidates.len()
                            );
                            last_geocast = Some(outcome);
                        }
                        Err(e) => {
                            geocast_stats.abandoned += 1;
                            log::warn!("[{}] geocast toward {} abandoned: {}", node_id, target, e);
                        }
                    }
                }
            },
            Either::Second(_) => break,
        }
    }

    let header_real_size = routing.arena().ids().filter_map(|id| routing.header_real_size(id).ok()).max();
    let report = RunReport::new(config.duration_ms, routing.arena(), header_real_size, *routing.stats(), geocast_stats, last_geocast);
    log::info!(
        "Simulation finished: {} beacons, {} geocasts sent, {} abandoned, mean gabriel degree {:.2}, real header {} bytes",
        report.routing.beacons_sent,
        report.geocast.sent,
        report.geocast.abandoned,
        report.mean_gabriel_degree(),
        report.header_real_size.unwrap_or(0)
    );
    report_tx.send(report).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::scene::SceneNode;
    use crate::simulation::header::{MAC_HEADER_SIZE, ROUTING_HEADER_SIZE};
    use crate::simulation::types::Position;

    fn scene(points: &[(f64, f64)]) -> Scene {
        Scene {
            area: Position::new(10.0, 10.0, 0.0),
            nodes: points
                .iter()
                .enumerate()
                .map(|(idx, &(x, y))| SceneNode {
                    node_id: idx as NodeId,
                    position: Position::new(x, y, 0.0),
                    radio_range: None,
                })
                .collect(),
        }
    }

    #[test]
    fn arena_follows_scene_ids_and_ranges() {
        let mut scene = scene(&[(0.0, 0.0), (1.0, 0.0)]);
        scene.nodes.reverse();
        scene.nodes[0].radio_range = Some(3.0);

        let arena = build_arena(&scene, 1.5);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.position(1), Some(Position::new(1.0, 0.0, 0.0)));
        assert_eq!(arena.get(1).unwrap().radio_range, 3.0);
        assert_eq!(arena.get(0).unwrap().radio_range, 1.5);
    }

    #[test]
    fn range_check_is_strict() {
        let arena = build_arena(&scene(&[(0.0, 0.0), (1.0, 0.0), (1.5, 0.0), (0.0, 1.49)]), 1.5);
        assert_eq!(find_target_nodes(&arena, 0), vec![1, 3]);
        assert_eq!(find_target_nodes(&arena, 2), vec![1]);
        assert!(find_target_nodes(&arena, 9).is_empty());
    }

    #[test]
    fn beacons_then_geocast_end_to_end() {
        let arena = build_arena(&scene(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (0.0, 1.0), (5.0, 5.0)]), 1.5);
        let mut routing = CdsRouting::new(arena, BroadcastMac);

        for _ in 0..2 {
            for id in 0..5 {
                handle_hello(&mut routing, id).unwrap();
            }
        }
        assert_eq!(handle_hello(&mut routing, 4).unwrap(), 0);
        assert!(routing.arena().get(4).unwrap().neighbors.is_empty());
        assert!(!routing.arena().get(1).unwrap().gabriel.is_empty());

        let outcome = handle_geocast(&mut routing, 4, 1, 10).unwrap();
        let candidate_ids: Vec<NodeId> = outcome.candidates.iter().map(|c| c.id).collect();
        assert_eq!(candidate_ids, vec![0, 1, 2, 3]);
        assert_eq!(routing.stats().packets_released, 1);
        assert_eq!(routing.header_real_size(0).unwrap(), MAC_HEADER_SIZE + ROUTING_HEADER_SIZE);
    }

    #[test]
    fn application_seeds_follow_the_run_seed() {
        assert_eq!(application_seed(9, 0), application_seed(9, 0));
        assert_ne!(application_seed(9, 0), application_seed(9, 1));
        assert_eq!(application_seed(u64::MAX, 1), 0);
    }

    #[test]
    fn geocast_failures_are_reported() {
        let mut routing = CdsRouting::new(build_arena(&scene(&[(0.0, 0.0)]), 1.5), BroadcastMac);
        assert_eq!(handle_geocast(&mut routing, 0, 5, 10), Err(RoutingError::UnknownNode(5)));

        assert_eq!(handle_geocast(&mut routing, 3, 0, 10), Err(RoutingError::UnknownNode(3)));

        // A lone node is its own region.
        let outcome = handle_geocast(&mut routing, 0, 0, 10).unwrap();
        assert_eq!(outcome.dominators.len(), 1);
        assert_eq!(routing.stats().packets_released, 1);
    }
}
