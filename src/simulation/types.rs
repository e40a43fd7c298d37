//! Type definitions for the simulation.
//!
//! Contains the value types shared by every layer of the simulated stack:
//! - Node identifiers, positions and destinations
//! - Channels connecting the per-node tasks to the network task
//! - Events emitted by the node and application tasks

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use serde::{Deserialize, Serialize};

use super::report::RunReport;

/// Node identifier. Arena slots are indexed by it, so valid ids are `0..N`.
pub type NodeId = i32;

/// Sentinel id carried by the "no destination" marker.
pub const NO_DESTINATION_ID: NodeId = -2;

/// MAC broadcast address used by beacons.
pub const BROADCAST_ADDR: NodeId = -1;

/// Upper bound on nodes in a scene. Also sizes the node task pool.
pub const MAX_NODE_COUNT: usize = 1024;

/// Upper bound on configured geocast sources. Sizes the application task pool.
pub const MAX_GEOCAST_SOURCES: usize = 64;

/// Position of a node in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Placeholder position carried by the "no destination" and broadcast markers.
    pub const EMPTY: Position = Position::new(-1.0, -1.0, -1.0);
}

/// A node identity together with the position it was last known at.
///
/// Equality is exact on every field: two destinations are the same only when
/// the ids match and the positions are bit-for-bit equal floats. This is an
/// identity test, never a proximity test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Destination {
    pub id: NodeId,
    pub position: Position,
}

impl Destination {
    pub const fn new(id: NodeId, position: Position) -> Self {
        Self { id, position }
    }

    /// The "no destination" marker written into routing headers.
    pub const NONE: Destination = Destination::new(NO_DESTINATION_ID, Position::EMPTY);

    /// Link-layer broadcast destination.
    pub const BROADCAST: Destination = Destination::new(BROADCAST_ADDR, Position::EMPTY);
}

/// Depth of the global output channel (node/application tasks -> network task).
pub const NODES_OUTPUT_BUFFER_CAPACITY: usize = 64;
/// Bounded channel used by node tasks to publish events for the network task.
pub type NodesOutputQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, NodeOutputMessage, NODES_OUTPUT_BUFFER_CAPACITY>;
/// Sender side of the nodes output channel.
pub type NodesOutputQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, NodeOutputMessage, NODES_OUTPUT_BUFFER_CAPACITY>;

/// The network task publishes exactly one report when the run ends.
pub type ReportQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, RunReport, 1>;
pub type ReportQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, RunReport, 1>;
pub type ReportQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, RunReport, 1>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeOutputPayload {
    /// The node's beacon timer fired; a hello must be broadcast.
    HelloDue,
    /// The application on this node asks for a geocast anchored at `target`'s position.
    GeocastRequested { target: NodeId, payload_size: usize },
}

/// Envelope for events emitted by node tasks into the network loop.
#[derive(Debug, Clone, Copy)]
pub struct NodeOutputMessage {
    pub node_id: NodeId,
    pub payload: NodeOutputPayload,
}
