//! Removal of degree two nodes from a road network before building the hierarchy.
//!
//! Roads are usually modelled with many intermediate nodes which only describe the geometry.
//! A node `v` with exactly two neighbours `u` and `w` is removed by extending the edges `u -> v` and `w -> v`
//! to `u -> w` and `w -> u`. The removed nodes are kept in a `ChainCompressor` keyed by the surviving edges,
//! so the full geometry can be restored later.
//!
//! The node based graph stores every road segment at both of its endpoints,
//! the flags tell in which direction the segment may be traversed relative to the storing node.

use super::*;
use crate::datastr::{chain_compressor::ChainCompressor, graph::dynamic_graph::GraphEdge};
use crate::report::*;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeBasedEdgeData {
    pub distance: Weight,
    pub name_id: u32,
    pub forward: bool,
    pub backward: bool,
    pub road_class: u8,
}

impl NodeBasedEdgeData {
    /// Can both edges be merged into one without losing information other than the geometry?
    pub fn is_compatible_to(&self, other: &Self) -> bool {
        self.forward == other.forward && self.backward == other.backward && self.name_id == other.name_id && self.road_class == other.road_class
    }
}

impl EdgeWeight for NodeBasedEdgeData {
    fn weight(&self) -> Weight {
        self.distance
    }
}

pub type NodeBasedGraph = DynamicGraph<NodeBasedEdgeData>;

/// Build the node based graph from an unordered list of edges.
pub fn node_based_graph(num_nodes: usize, mut edges: Vec<GraphEdge<NodeBasedEdgeData>>) -> NodeBasedGraph {
    edges.sort_unstable_by_key(|edge| (edge.source, edge.target));
    NodeBasedGraph::from_sorted_edges(num_nodes, edges)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryCompressionStats {
    pub removed_nodes: usize,
    /// Nodes which still have edges.
    pub remaining_nodes: usize,
    pub remaining_edges: usize,
    pub node_compression_ratio: f64,
    pub edge_compression_ratio: f64,
}

impl GeometryCompressionStats {
    pub fn report(&self) {
        report!("removed_nodes", self.removed_nodes);
        report!("remaining_nodes", self.remaining_nodes);
        report!("remaining_edges", self.remaining_edges);
        report!("node_compression_ratio", self.node_compression_ratio);
        report!("edge_compression_ratio", self.edge_compression_ratio);
    }
}

/// Remove all degree two nodes where possible.
///
/// Barrier nodes are never removed. `signal_penalty` is added once to the combined weight
/// when the removed node carries a penalty (e.g. traffic lights).
pub fn compress_geometry(
    graph: &mut NodeBasedGraph,
    is_barrier: impl Fn(NodeId) -> bool,
    signal_penalty: impl Fn(NodeId) -> Weight,
    compressor: &mut ChainCompressor,
) -> GeometryCompressionStats {
    let original_nodes = graph.num_nodes();
    let original_edges = graph.num_edges();
    let mut removed_nodes = 0;

    for node_v in 0..original_nodes as NodeId {
        if graph.out_degree(node_v) != 2 || is_barrier(node_v) {
            continue;
        }

        let first_edge = graph.edge_range(node_v).start;
        let reverse_edge_order = !graph.edge_data(first_edge).forward as EdgeId;
        let forward_e2 = first_edge + reverse_edge_order;
        let reverse_e2 = first_edge + 1 - reverse_edge_order;

        let node_w = graph.target(forward_e2);
        let node_u = graph.target(reverse_e2);
        debug_assert_ne!(node_v, node_w);
        debug_assert_ne!(node_v, node_u);
        if node_u == node_w {
            continue;
        }

        let forward_e1 = graph
            .find_edge(node_u, node_v)
            .unwrap_or_else(|| panic!("edge ({}, {}) not stored at both ends", node_u, node_v));
        let reverse_e1 = graph
            .find_edge(node_w, node_v)
            .unwrap_or_else(|| panic!("edge ({}, {}) not stored at both ends", node_w, node_v));

        if graph.find_edge_in_either_direction(node_u, node_w).is_some() {
            continue;
        }

        let forward_data1 = *graph.edge_data(forward_e1);
        let forward_data2 = *graph.edge_data(forward_e2);
        let reverse_data1 = *graph.edge_data(reverse_e1);
        let reverse_data2 = *graph.edge_data(reverse_e2);
        if !(forward_data1.is_compatible_to(&forward_data2) && reverse_data1.is_compatible_to(&reverse_data2)) {
            continue;
        }

        let penalty = signal_penalty(node_v);
        graph.edge_data_mut(forward_e1).distance += forward_data2.distance + penalty;
        graph.edge_data_mut(reverse_e1).distance += reverse_data2.distance + penalty;
        graph.set_target(forward_e1, node_w);
        graph.set_target(reverse_e1, node_u);

        // deleting swaps the last edge into the gap, so the higher id has to go first
        graph.delete_edge(node_v, std::cmp::max(forward_e2, reverse_e2));
        graph.delete_edge(node_v, std::cmp::min(forward_e2, reverse_e2));

        compressor.compress_edge(forward_e1, forward_e2, node_v, node_w, forward_data1.distance + penalty, forward_data2.distance);
        compressor.compress_edge(reverse_e1, reverse_e2, node_v, node_u, reverse_data1.distance, reverse_data2.distance + penalty);
        removed_nodes += 1;
    }

    let remaining_nodes = (0..original_nodes as NodeId).filter(|&node| graph.out_degree(node) > 0).count();
    let remaining_edges = graph.num_edges();
    eprintln!("removed {} nodes, new nodes: {}, edges: {}", removed_nodes, remaining_nodes, remaining_edges);

    GeometryCompressionStats {
        removed_nodes,
        remaining_nodes,
        remaining_edges,
        node_compression_ratio: remaining_nodes as f64 / original_nodes.max(1) as f64,
        edge_compression_ratio: remaining_edges as f64 / original_edges.max(1) as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(u: NodeId, v: NodeId, distance: Weight, name_id: u32) -> [GraphEdge<NodeBasedEdgeData>; 2] {
        let data = NodeBasedEdgeData {
            distance,
            name_id,
            forward: true,
            backward: true,
            road_class: 0,
        };
        [
            GraphEdge { source: u, target: v, data },
            GraphEdge { source: v, target: u, data },
        ]
    }

    fn road(segments: &[(NodeId, NodeId, Weight, u32)], num_nodes: usize) -> NodeBasedGraph {
        node_based_graph(num_nodes, segments.iter().flat_map(|&(u, v, d, name)| segment(u, v, d, name)).collect())
    }

    #[test]
    fn straight_road_collapses_to_one_segment() {
        // 0 - 1 - 2 - 3, all the same street
        let mut graph = road(&[(0, 1, 2, 7), (1, 2, 3, 7), (2, 3, 4, 7)], 4);
        let mut compressor = ChainCompressor::new();
        let stats = compress_geometry(&mut graph, |_| false, |_| 0, &mut compressor);

        assert_eq!(stats.removed_nodes, 2);
        assert_eq!(stats.remaining_nodes, 2);
        assert_eq!(stats.remaining_edges, 2);
        assert_eq!(graph.out_degree(1), 0);
        assert_eq!(graph.out_degree(2), 0);

        let forward = graph.find_edge(0, 3).unwrap();
        let backward = graph.find_edge(3, 0).unwrap();
        assert_eq!(graph.edge_data(forward).distance, 9);
        assert_eq!(graph.edge_data(backward).distance, 9);

        let chain = |edge| -> Vec<(NodeId, Weight)> { compressor.get_bucket_reference(edge).iter().map(|entry| (entry.node, entry.weight)).collect() };
        assert_eq!(chain(forward), vec![(1, 2), (2, 3), (3, 4)]);
        assert_eq!(chain(backward), vec![(2, 4), (1, 3), (0, 2)]);
        assert_eq!(compressor.get_first_node_id_of_bucket(backward), 1);
        assert_eq!(compressor.get_last_node_id_of_bucket(backward), 1);
    }

    #[test]
    fn barriers_and_name_changes_stop_compression() {
        let mut graph = road(&[(0, 1, 1, 1), (1, 2, 1, 1), (2, 3, 1, 2), (3, 4, 1, 2)], 5);
        let mut compressor = ChainCompressor::new();
        let stats = compress_geometry(&mut graph, |node| node == 3, |_| 0, &mut compressor);
        assert_eq!(stats.removed_nodes, 1);
        assert_eq!(graph.out_degree(1), 0);
        assert_eq!(graph.out_degree(2), 2);
        assert_eq!(graph.out_degree(3), 2);
        assert!(graph.find_edge(0, 2).is_some());
    }

    #[test]
    fn triangles_are_kept() {
        let mut graph = road(&[(0, 1, 1, 0), (1, 2, 1, 0), (2, 0, 1, 0)], 3);
        let mut compressor = ChainCompressor::new();
        let stats = compress_geometry(&mut graph, |_| false, |_| 0, &mut compressor);
        assert_eq!(stats.removed_nodes, 0);
        assert_eq!(stats.edge_compression_ratio, 1.0);
        assert!(!compressor.has_entry_for_id(0));
    }

    #[test]
    fn signal_penalty_is_added_once() {
        let mut graph = road(&[(0, 1, 2, 0), (1, 2, 3, 0)], 3);
        let mut compressor = ChainCompressor::new();
        compress_geometry(&mut graph, |_| false, |node| if node == 1 { 10 } else { 0 }, &mut compressor);
        let forward = graph.find_edge(0, 2).unwrap();
        assert_eq!(graph.edge_data(forward).distance, 15);
        assert_eq!(compressor.get_bucket_reference(forward).iter().map(|entry| entry.weight).sum::<Weight>(), 15);
    }
}
