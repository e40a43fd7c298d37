//! Geocast CDS routing and the discrete simulation that drives it.
//!
//! ## Module Organization
//!
//! - `types`: Positions, destinations, ids, channels and task events
//! - `geometry`: Distances and the Gabriel witness test
//! - `region`: Geocast region membership
//! - `neighbors`: Neighbor directory and typed edge sets
//! - `node`: Per-node state and the node arena
//! - `planarizer`: Beacon handling and Gabriel-Graph planarization
//! - `cds`: Dominating set construction and backbone bridging
//! - `header`: Packets, routing header, MAC layer seam
//! - `routing`: The routing layer tying the above together
//! - `node_task`: Beacon and application timers
//! - `network`: Central task delivering beacons and geocast requests
//! - `report`: End-of-run summary

pub mod cds;
pub mod geometry;
pub mod header;
pub mod neighbors;
pub mod network;
pub mod node;
pub mod node_task;
pub mod planarizer;
pub mod region;
pub mod report;
pub mod routing;
pub mod types;

pub use network::network_task;
