//! Immutable adjacency array with arbitrary edge payloads.
//!
//! Used for the query time representation of a contraction hierarchy.
//! Same layout as `FirstOutGraph`, but each edge carries a `D` instead of just a weight.

use super::{dynamic_graph::GraphEdge, *};

#[derive(Debug, Clone)]
pub struct StaticGraph<D> {
    first_out: Vec<EdgeId>,
    head: Vec<NodeId>,
    data: Vec<D>,
}

impl<D> StaticGraph<D> {
    /// Build from edges sorted by source.
    /// Nodes without edges, including all nodes beyond the largest source, get empty ranges.
    pub fn from_sorted_edges<I: IntoIterator<Item = GraphEdge<D>>>(num_nodes: usize, edges: I) -> Self {
        let mut degrees = vec![0 as EdgeId; num_nodes];
        let mut head = Vec::new();
        let mut data = Vec::new();

        let mut prev_source = 0;
        for edge in edges {
            assert!(edge.source >= prev_source, "edges not sorted by source");
            assert!((edge.source as usize) < num_nodes && (edge.target as usize) < num_nodes);
            prev_source = edge.source;
            degrees[edge.source as usize] += 1;
            head.push(edge.target);
            data.push(edge.data);
        }
        assert!(head.len() < EdgeId::MAX as usize);

        StaticGraph {
            first_out: degrees_to_first_out(degrees.into_iter()).collect(),
            head,
            data,
        }
    }

    pub fn first_out(&self) -> &[EdgeId] {
        &self.first_out
    }

    pub fn head(&self) -> &[NodeId] {
        &self.head
    }

    pub fn data(&self) -> &[D] {
        &self.data
    }

    /// First edge from `from` to `to` whose payload passes `filter`.
    pub fn find_edge(&self, from: NodeId, to: NodeId, filter: impl Fn(&D) -> bool) -> Option<EdgeId> {
        self.edge_range(from).find(|&edge| self.head[edge as usize] == to && filter(&self.data[edge as usize]))
    }
}

impl<D: EdgeWeight> StaticGraph<D> {
    /// Cheapest edge from `from` to `to` whose payload passes `filter`.
    pub fn find_smallest_edge(&self, from: NodeId, to: NodeId, filter: impl Fn(&D) -> bool) -> Option<EdgeId> {
        self.edge_range(from)
            .filter(|&edge| self.head[edge as usize] == to && filter(&self.data[edge as usize]))
            .min_by_key(|&edge| self.data[edge as usize].weight())
    }
}

impl<D> Graph for StaticGraph<D> {
    fn num_nodes(&self) -> usize {
        self.first_out.len() - 1
    }

    fn num_arcs(&self) -> usize {
        self.head.len()
    }

    fn degree(&self, node: NodeId) -> usize {
        let node = node as usize;
        (self.first_out[node + 1] - self.first_out[node]) as usize
    }
}

impl<D> EdgeRangeGraph for StaticGraph<D> {
    type EdgeData = D;

    #[inline]
    fn edge_range(&self, node: NodeId) -> Range<EdgeId> {
        self.first_out[node as usize]..self.first_out[node as usize + 1]
    }

    #[inline]
    fn target(&self, edge: EdgeId) -> NodeId {
        self.head[edge as usize]
    }

    #[inline]
    fn edge_data(&self, edge: EdgeId) -> &D {
        &self.data[edge as usize]
    }
}
