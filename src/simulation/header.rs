//! Packets, the routing header and the lower (MAC) layer seam.
//!
//! A packet is a flat byte buffer. The MAC header sits at offset 0, the
//! routing header right after it at offset `overhead`, and the payload
//! follows. All multi-byte fields are little-endian.

use super::types::{Destination, NodeId, Position};

/// Bytes taken by one encoded `Destination` (id + three coordinates).
const DESTINATION_SIZE: usize = 4 + 3 * 8;

/// Encoded size of `RoutingHeader`.
pub const ROUTING_HEADER_SIZE: usize = 2 * DESTINATION_SIZE;

/// Encoded size of the `BroadcastMac` header (source id + destination id).
pub const MAC_HEADER_SIZE: usize = 8;

/// A packet in flight, owned by whichever layer currently handles it.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Node that allocated the packet.
    pub sender: NodeId,
    pub data: Vec<u8>,
}

impl Packet {
    /// Zero-filled packet of `size` bytes.
    pub fn alloc(sender: NodeId, size: usize) -> Self {
        Self {
            sender,
            data: vec![0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Routing header carried by beacons and geocast packets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutingHeader {
    pub sender: Destination,
    pub dest: Destination,
}

impl RoutingHeader {
    /// Encode at `offset`. Returns `false` if the packet is too short.
    pub fn write_at(&self, packet: &mut Packet, offset: usize) -> bool {
        let Some(buf) = packet.data.get_mut(offset..offset + ROUTING_HEADER_SIZE) else {
            return false;
        };
        let (sender, dest) = buf.split_at_mut(DESTINATION_SIZE);
        encode_destination(&self.sender, sender);
        encode_destination(&self.dest, dest);
        true
    }

    /// Decode from `offset`, or `None` if the packet is too short.
    pub fn read_at(packet: &Packet, offset: usize) -> Option<Self> {
        let buf = packet.data.get(offset..offset + ROUTING_HEADER_SIZE)?;
        let (sender, dest) = buf.split_at(DESTINATION_SIZE);
        Some(Self {
            sender: decode_destination(sender),
            dest: decode_destination(dest),
        })
    }
}

fn encode_destination(destination: &Destination, out: &mut [u8]) {
    out[0..4].copy_from_slice(&destination.id.to_le_bytes());
    out[4..12].copy_from_slice(&destination.position.x.to_le_bytes());
    out[12..20].copy_from_slice(&destination.position.y.to_le_bytes());
    out[20..28].copy_from_slice(&destination.position.z.to_le_bytes());
}

fn decode_destination(buf: &[u8]) -> Destination {
    let i32_at = |at: usize| i32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
    let f64_at = |at: usize| {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&buf[at..at + 8]);
        f64::from_le_bytes(raw)
    };
    Destination::new(i32_at(0), Position::new(f64_at(4), f64_at(12), f64_at(20)))
}

/// Error raised by a lower layer while writing its header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacError {
    PacketTooShort { needed: usize, available: usize },
}

impl std::fmt::Display for MacError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MacError::PacketTooShort { needed, available } => {
                write!(f, "Packet too short for mac header: needs {} bytes, has {}", needed, available)
            }
        }
    }
}

impl std::error::Error for MacError {}

/// The layer below routing, as seen by the routing layer.
pub trait MacLayer {
    /// Write the lower-layer header addressed to `destination`.
    fn set_header(&self, node: NodeId, packet: &mut Packet, destination: &Destination) -> Result<(), MacError>;
    /// Header bytes this layer and everything below it reserve.
    fn header_size(&self, node: NodeId) -> usize;
    /// Header bytes actually sent over the air.
    fn header_real_size(&self, node: NodeId) -> usize;
}

/// Minimal broadcast MAC: every frame reaches every node in radio range.
#[derive(Debug, Clone, Copy, Default)]
pub struct BroadcastMac;

impl MacLayer for BroadcastMac {
    fn set_header(&self, node: NodeId, packet: &mut Packet, destination: &Destination) -> Result<(), MacError> {
        let available = packet.len();
        let Some(buf) = packet.data.get_mut(..MAC_HEADER_SIZE) else {
            return Err(MacError::PacketTooShort {
                needed: MAC_HEADER_SIZE,
                available,
            });
        };
        buf[0..4].copy_from_slice(&node.to_le_bytes());
        buf[4..8].copy_from_slice(&destination.id.to_le_bytes());
        Ok(())
    }

    fn header_size(&self, _node: NodeId) -> usize {
        MAC_HEADER_SIZE
    }

    fn header_real_size(&self, _node: NodeId) -> usize {
        MAC_HEADER_SIZE
    }
}
