//! Edge payloads of the contraction graph and the resulting hierarchy.
//!
//! Flags and the number of original edges a shortcut represents share a single `u32`:
//!
//! | bits   | meaning                                              |
//! |--------|------------------------------------------------------|
//! | 0..28  | number of original edges, saturating at `2^28 - 1`   |
//! | 28     | shortcut                                             |
//! | 29     | forward, traversable from the edges source to target |
//! | 30     | backward, traversable from target to source          |
//! | 31     | `id` refers to a node id from before the flush       |

use crate::datastr::graph::{dynamic_graph::GraphEdge, EdgeWeight, NodeId, Weight};

const ORIGINAL_EDGES_BITS: u32 = 28;
/// Largest representable number of original edges.
pub const MAX_ORIGINAL_EDGES: u32 = (1 << ORIGINAL_EDGES_BITS) - 1;
const SHORTCUT: u32 = 1 << 28;
const FORWARD: u32 = 1 << 29;
const BACKWARD: u32 = 1 << 30;
const ORIGINAL_VIA_ID: u32 = 1 << 31;

/// Packed flags and original edge count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeFlags(u32);

impl EdgeFlags {
    pub fn new(original_edges: u32, shortcut: bool, forward: bool, backward: bool) -> Self {
        let mut flags = EdgeFlags(original_edges.min(MAX_ORIGINAL_EDGES));
        flags.set(SHORTCUT, shortcut);
        flags.set(FORWARD, forward);
        flags.set(BACKWARD, backward);
        flags
    }

    /// Reinterpret raw bits, for example read back from disk.
    pub fn from_bits(bits: u32) -> Self {
        EdgeFlags(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    fn set(&mut self, mask: u32, value: bool) {
        if value {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    #[inline]
    pub fn original_edges(self) -> u32 {
        self.0 & MAX_ORIGINAL_EDGES
    }
    #[inline]
    pub fn is_shortcut(self) -> bool {
        self.0 & SHORTCUT != 0
    }
    #[inline]
    pub fn forward(self) -> bool {
        self.0 & FORWARD != 0
    }
    #[inline]
    pub fn backward(self) -> bool {
        self.0 & BACKWARD != 0
    }
}

/// Payload of edges in the contraction graph.
/// `id` is the middle node for shortcuts and the input edge id otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ContractorEdgeData {
    pub distance: Weight,
    pub id: NodeId,
    flags: EdgeFlags,
}

impl ContractorEdgeData {
    pub fn new(distance: Weight, original_edges: u32, id: NodeId, shortcut: bool, forward: bool, backward: bool) -> Self {
        ContractorEdgeData {
            distance,
            id,
            flags: EdgeFlags::new(original_edges, shortcut, forward, backward),
        }
    }

    pub fn flags(&self) -> EdgeFlags {
        self.flags
    }
    pub fn original_edges(&self) -> u32 {
        self.flags.original_edges()
    }
    pub fn is_shortcut(&self) -> bool {
        self.flags.is_shortcut()
    }
    pub fn forward(&self) -> bool {
        self.flags.forward()
    }
    pub fn backward(&self) -> bool {
        self.flags.backward()
    }
    pub fn is_original_via_node_id(&self) -> bool {
        self.flags.0 & ORIGINAL_VIA_ID != 0
    }

    pub fn set_forward(&mut self, forward: bool) {
        self.flags.set(FORWARD, forward);
    }
    pub fn set_backward(&mut self, backward: bool) {
        self.flags.set(BACKWARD, backward);
    }
    pub fn set_original_via_node_id(&mut self, original: bool) {
        self.flags.set(ORIGINAL_VIA_ID, original);
    }

    /// Strip the flush bookkeeping and use `id` as the via node or input edge id of the final edge.
    pub fn to_query_data(&self, id: NodeId) -> QueryEdgeData {
        let mut flags = self.flags;
        flags.set(ORIGINAL_VIA_ID, false);
        QueryEdgeData { distance: self.distance, id, flags }
    }
}

impl EdgeWeight for ContractorEdgeData {
    fn weight(&self) -> Weight {
        self.distance
    }
}

pub type ContractorEdge = GraphEdge<ContractorEdgeData>;

/// Payload of the edges of the finished hierarchy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct QueryEdgeData {
    pub distance: Weight,
    /// Middle node for shortcuts, input edge id otherwise.
    pub id: NodeId,
    pub flags: EdgeFlags,
}

impl QueryEdgeData {
    pub fn is_shortcut(&self) -> bool {
        self.flags.is_shortcut()
    }
    pub fn forward(&self) -> bool {
        self.flags.forward()
    }
    pub fn backward(&self) -> bool {
        self.flags.backward()
    }
    pub fn original_edges(&self) -> u32 {
        self.flags.original_edges()
    }
}

impl EdgeWeight for QueryEdgeData {
    fn weight(&self) -> Weight {
        self.distance
    }
}

pub type QueryEdge = GraphEdge<QueryEdgeData>;
