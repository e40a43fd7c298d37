//! Node state and the arena holding every node of a run.
//!
//! Nodes are stored densely by id. The routing layer and the dominating-set
//! construction reach other nodes only through a `&mut NodeArena`, which is
//! what serializes cross-node mutation for the duration of one computation.

use super::neighbors::{BackboneEdges, GabrielEdges, NeighborDirectory};
use super::types::{Destination, NodeId, Position};

/// Runtime state of a single node.
#[derive(Debug, Clone)]
pub struct NodeState {
    pub destination: Destination,
    /// Unit-disk radio range in world units.
    pub radio_range: f64,
    pub neighbors: NeighborDirectory,
    pub gabriel: GabrielEdges,
    pub backbone: BackboneEdges,
    /// Cached lower-layer header size; `None` until first queried.
    pub overhead: Option<usize>,
    /// Cached lower-layer real header size; `None` until first queried.
    pub real_overhead: Option<usize>,
}

impl NodeState {
    pub fn new(id: NodeId, position: Position, radio_range: f64) -> Self {
        Self {
            destination: Destination::new(id, position),
            radio_range,
            neighbors: NeighborDirectory::new(),
            gabriel: GabrielEdges::new(),
            backbone: BackboneEdges::new(),
            overhead: None,
            real_overhead: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.destination.id
    }

    pub fn position(&self) -> &Position {
        &self.destination.position
    }
}

/// All nodes of the simulation, indexed by id `0..len()`.
#[derive(Debug, Clone, Default)]
pub struct NodeArena {
    nodes: Vec<NodeState>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node at the next free id and return that id.
    pub fn push(&mut self, position: Position, radio_range: f64) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(NodeState::new(id, position, radio_range));
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeState> {
        usize::try_from(id).ok().and_then(|idx| self.nodes.get(idx))
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeState> {
        usize::try_from(id).ok().and_then(move |idx| self.nodes.get_mut(idx))
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + use<> {
        0..self.nodes.len() as NodeId
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeState> {
        self.nodes.iter()
    }

    /// Current position of `id`, as the topology service would report it.
    pub fn position(&self, id: NodeId) -> Option<Position> {
        self.get(id).map(|n| n.destination.position)
    }
}
