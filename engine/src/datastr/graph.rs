//! Graph types shared by the contraction and query code.
//!
//! Node and edge ids are dense 32bit integers.
//! Three representations live below this module:
//! a static adjacency array for input data and reference searches (`first_out_graph`),
//! the mutable multigraph the contractor works on (`dynamic_graph`)
//! and the offset indexed graph built from the contraction output (`static_graph`).

use std::ops::Range;

pub mod dynamic_graph;
pub mod first_out_graph;
pub mod static_graph;

pub use self::dynamic_graph::DynamicGraph;
pub use self::first_out_graph::{FirstOutGraph, OwnedGraph};
pub use self::static_graph::StaticGraph;

/// Node ids are 32bit unsigned ints
pub type NodeId = u32;
/// Edge ids are 32bit unsigned ints
pub type EdgeId = u32;
/// Basic weights are 32bit unsigned ints
pub type Weight = u32;
/// A sufficiently large infinity constant.
/// Set to `u32::MAX / 2` so that `INFINITY + x` for `x <= INFINITY` does not overflow.
pub const INFINITY: Weight = u32::MAX / 2;
/// Marker for node ids which could not be resolved, for example during renumbering.
pub const INVALID_NODE: NodeId = NodeId::MAX;

/// Simple struct for weighted links.
/// No behaviour, just a pure data struct.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Link {
    pub node: NodeId,
    pub weight: Weight,
}

/// Base trait for graphs.
/// Interesting behaviour will be added through subtraits.
pub trait Graph {
    fn num_nodes(&self) -> usize;
    fn num_arcs(&self) -> usize;
    fn degree(&self, node: NodeId) -> usize;
}

/// Trait for graph data structures which allow iterating over outgoing links of a node.
pub trait LinkIterable<L>: Graph {
    /// Type of the outgoing neighbor iterator.
    type Iter<'a>: Iterator<Item = L>
    where
        Self: 'a;

    /// Get a iterator over the outgoing links of the given node.
    fn link_iter(&self, node: NodeId) -> Self::Iter<'_>;
}

/// Trait for graphs which store their edges in contiguous per node ranges
/// and allow access to the edge payload by edge id.
pub trait EdgeRangeGraph: Graph {
    type EdgeData;

    /// Range of the edge ids of the edges stored at `node`.
    fn edge_range(&self, node: NodeId) -> Range<EdgeId>;
    /// Head node of the edge with the given id.
    fn target(&self, edge: EdgeId) -> NodeId;
    /// Payload of the edge with the given id.
    fn edge_data(&self, edge: EdgeId) -> &Self::EdgeData;
}

/// Edge payloads which carry a weight.
/// Used to pick the cheapest among parallel edges.
pub trait EdgeWeight {
    fn weight(&self) -> Weight;
}

/// Create a `first_out` array (prefix sum with leading 0) from an iterator over node degrees.
pub fn degrees_to_first_out<I: Iterator<Item = EdgeId>>(degrees: I) -> impl Iterator<Item = EdgeId> {
    std::iter::once(0).chain(degrees.scan(0, |state, degree| {
        *state += degree;
        Some(*state)
    }))
}
