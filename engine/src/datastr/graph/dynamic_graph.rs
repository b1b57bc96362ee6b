//! Mutable directed multigraph for the contraction.
//!
//! Each node owns a contiguous run of edge slots in one big slot array.
//! Runs may be followed or preceded by free slots (`target == INVALID_NODE`), which are used
//! when new edges are inserted. When a run cannot grow in place it gets relocated to the end
//! of the slot array with some slack, leaving the old slots behind as free slots.
//! Offsets of other nodes never change through insertions or deletions.
//! Free slots are never visible through `edge_range`.

use super::*;
use crate::datastr::segmented_vector::SegmentedVec;

/// Input edge for the bulk constructor and output of `edges`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GraphEdge<D> {
    pub source: NodeId,
    pub target: NodeId,
    pub data: D,
}

#[derive(Debug, Clone, Copy, Default)]
struct NodeRange {
    first_edge: EdgeId,
    edges: EdgeId,
}

#[derive(Debug, Clone, Copy)]
struct EdgeSlot<D> {
    target: NodeId,
    data: D,
}

impl<D> EdgeSlot<D> {
    fn is_free(&self) -> bool {
        self.target == INVALID_NODE
    }
}

#[derive(Debug, Clone)]
pub struct DynamicGraph<D> {
    nodes: Vec<NodeRange>,
    slots: SegmentedVec<EdgeSlot<D>>,
    num_edges: usize,
}

impl<D: Copy + Default> DynamicGraph<D> {
    /// Build the graph from edges sorted by source, in O(n + m).
    pub fn from_sorted_edges<I: IntoIterator<Item = GraphEdge<D>>>(num_nodes: usize, edges: I) -> Self {
        assert!(num_nodes < INVALID_NODE as usize);
        let mut nodes = vec![NodeRange::default(); num_nodes];
        let mut slots = SegmentedVec::new();

        let mut prev_source = 0;
        for GraphEdge { source, target, data } in edges {
            assert!(source >= prev_source, "edges not sorted by source");
            assert!((source as usize) < num_nodes && (target as usize) < num_nodes, "edge ({}, {}) out of range", source, target);
            prev_source = source;
            nodes[source as usize].edges += 1;
            slots.push(EdgeSlot { target, data });
        }
        assert!(slots.len() < EdgeId::MAX as usize);

        let mut first_edge = 0;
        for node in &mut nodes {
            node.first_edge = first_edge;
            first_edge += node.edges;
        }

        DynamicGraph {
            nodes,
            num_edges: slots.len(),
            slots,
        }
    }

    /// Number of live edges.
    pub fn num_edges(&self) -> usize {
        self.num_edges
    }

    pub fn out_degree(&self, node: NodeId) -> usize {
        self.nodes[node as usize].edges as usize
    }

    pub fn edge_data_mut(&mut self, edge: EdgeId) -> &mut D {
        &mut self.slots[edge as usize].data
    }

    pub fn set_target(&mut self, edge: EdgeId, target: NodeId) {
        assert!((target as usize) < self.nodes.len());
        self.slots[edge as usize].target = target;
    }

    fn is_free(&self, slot: usize) -> bool {
        slot < self.slots.len() && self.slots[slot].is_free()
    }

    fn free_slot(&mut self, slot: usize) {
        self.slots[slot].target = INVALID_NODE;
    }

    /// Append an edge to the run of `from`, returns the id of the new edge.
    pub fn insert_edge(&mut self, from: NodeId, to: NodeId, data: D) -> EdgeId {
        assert!((to as usize) < self.nodes.len(), "target {} out of range", to);
        let NodeRange { first_edge, edges } = self.nodes[from as usize];
        let behind_run = (first_edge + edges) as usize;

        if !self.is_free(behind_run) {
            if first_edge > 0 && self.is_free(first_edge as usize - 1) {
                // shift the run one slot to the front by moving its last edge there
                let new_first = first_edge - 1;
                let last = self.slots[behind_run - 1];
                self.slots[new_first as usize] = last;
                self.nodes[from as usize].first_edge = new_first;
            } else {
                self.relocate_run(from);
            }
        }

        let NodeRange { first_edge, edges } = self.nodes[from as usize];
        let slot = (first_edge + edges) as usize;
        self.slots[slot] = EdgeSlot { target: to, data };
        self.nodes[from as usize].edges += 1;
        self.num_edges += 1;
        slot as EdgeId
    }

    // move the run of `node` to the end of the slot array, with about 10% plus two free slots behind it
    fn relocate_run(&mut self, node: NodeId) {
        let NodeRange { first_edge, edges } = self.nodes[node as usize];
        let new_first = self.slots.len();
        let capacity = (edges as f64 * 1.1) as usize + 2;
        assert!(new_first + capacity < EdgeId::MAX as usize, "edge slot capacity exhausted");
        self.slots.resize(
            new_first + capacity,
            EdgeSlot {
                target: INVALID_NODE,
                data: D::default(),
            },
        );
        for i in 0..edges as usize {
            let old = first_edge as usize + i;
            self.slots[new_first + i] = self.slots[old];
            self.free_slot(old);
        }
        self.nodes[node as usize].first_edge = new_first as EdgeId;
    }

    /// Remove a single edge of `source`. The last edge of the run takes its place.
    pub fn delete_edge(&mut self, source: NodeId, edge: EdgeId) {
        let NodeRange { first_edge, edges } = self.nodes[source as usize];
        assert!(edge >= first_edge && edge < first_edge + edges, "edge {} does not belong to node {}", edge, source);
        let last = (first_edge + edges - 1) as usize;
        self.slots[edge as usize] = self.slots[last];
        self.free_slot(last);
        self.nodes[source as usize].edges -= 1;
        self.num_edges -= 1;
    }

    /// Remove all edges from `source` to `target`, returns the number of removed edges.
    /// The remaining edges keep their relative order.
    pub fn delete_edges_to(&mut self, source: NodeId, target: NodeId) -> usize {
        let NodeRange { first_edge, edges } = self.nodes[source as usize];
        let range = first_edge as usize..(first_edge + edges) as usize;
        let mut write = range.start;
        for read in range.clone() {
            if self.slots[read].target != target {
                if write != read {
                    self.slots[write] = self.slots[read];
                }
                write += 1;
            }
        }
        for slot in write..range.end {
            self.free_slot(slot);
        }
        let deleted = range.end - write;
        self.nodes[source as usize].edges -= deleted as EdgeId;
        self.num_edges -= deleted;
        deleted
    }

    /// First edge from `from` to `to`, if any.
    pub fn find_edge(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.edge_range(from).find(|&edge| self.slots[edge as usize].target == to)
    }

    /// Edge from `from` to `to` or else from `to` to `from`.
    /// The flag tells if the edge was found in reverse direction.
    pub fn find_edge_in_either_direction(&self, from: NodeId, to: NodeId) -> Option<(EdgeId, bool)> {
        self.find_edge(from, to)
            .map(|edge| (edge, false))
            .or_else(|| self.find_edge(to, from).map(|edge| (edge, true)))
    }

    /// Iterate over all live edges, ordered by source.
    pub fn edges(&self) -> impl Iterator<Item = GraphEdge<D>> + '_ {
        (0..self.nodes.len() as NodeId).flat_map(move |source| {
            self.edge_range(source).map(move |edge| {
                let slot = &self.slots[edge as usize];
                GraphEdge {
                    source,
                    target: slot.target,
                    data: slot.data,
                }
            })
        })
    }
}

impl<D: Copy + Default + EdgeWeight> DynamicGraph<D> {
    /// Cheapest edge from `from` to `to` whose data passes `filter`.
    pub fn find_smallest_edge(&self, from: NodeId, to: NodeId, filter: impl Fn(&D) -> bool) -> Option<EdgeId> {
        self.edge_range(from)
            .filter(|&edge| {
                let slot = &self.slots[edge as usize];
                slot.target == to && filter(&slot.data)
            })
            .min_by_key(|&edge| self.slots[edge as usize].data.weight())
    }
}

impl<D> Graph for DynamicGraph<D> {
    fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn num_arcs(&self) -> usize {
        self.num_edges
    }

    fn degree(&self, node: NodeId) -> usize {
        self.nodes[node as usize].edges as usize
    }
}

impl<D> EdgeRangeGraph for DynamicGraph<D> {
    type EdgeData = D;

    #[inline]
    fn edge_range(&self, node: NodeId) -> Range<EdgeId> {
        let NodeRange { first_edge, edges } = self.nodes[node as usize];
        first_edge..first_edge + edges
    }

    #[inline]
    fn target(&self, edge: EdgeId) -> NodeId {
        self.slots[edge as usize].target
    }

    #[inline]
    fn edge_data(&self, edge: EdgeId) -> &D {
        &self.slots[edge as usize].data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
    struct W(Weight);

    impl EdgeWeight for W {
        fn weight(&self) -> Weight {
            self.0
        }
    }

    fn edge(source: NodeId, target: NodeId, weight: Weight) -> GraphEdge<W> {
        GraphEdge { source, target, data: W(weight) }
    }

    fn targets(graph: &DynamicGraph<W>, node: NodeId) -> Vec<NodeId> {
        let mut targets: Vec<_> = graph.edge_range(node).map(|e| graph.target(e)).collect();
        targets.sort_unstable();
        targets
    }

    fn graph() -> DynamicGraph<W> {
        DynamicGraph::from_sorted_edges(4, vec![edge(0, 1, 1), edge(0, 2, 5), edge(1, 2, 1), edge(2, 3, 1), edge(3, 0, 7)])
    }

    #[test]
    fn bulk_construction() {
        let graph = graph();
        assert_eq!(graph.num_nodes(), 4);
        assert_eq!(graph.num_edges(), 5);
        assert_eq!(graph.edge_range(0), 0..2);
        assert_eq!(graph.edge_range(3), 4..5);
        assert_eq!(targets(&graph, 0), vec![1, 2]);
        assert_eq!(graph.edges().collect::<Vec<_>>()[2], edge(1, 2, 1));
    }

    #[test]
    #[should_panic]
    fn unsorted_input_is_rejected() {
        DynamicGraph::from_sorted_edges(3, vec![edge(1, 2, 1), edge(0, 1, 1)]);
    }

    #[test]
    fn insertions_relocate_runs_without_touching_others() {
        let mut graph = graph();
        let inserted = graph.insert_edge(1, 3, W(4));
        assert_eq!(graph.target(inserted), 3);
        // run of node 1 was full, so it moved to the end
        assert!(graph.edge_range(1).start >= 5);
        assert_eq!(targets(&graph, 1), vec![2, 3]);
        assert_eq!(targets(&graph, 2), vec![3]);

        // node 2 can now grow into the slot freed by node 1
        graph.insert_edge(2, 0, W(2));
        assert_eq!(graph.edge_range(2), 2..4);
        assert_eq!(targets(&graph, 2), vec![0, 3]);

        for i in 0..10 {
            graph.insert_edge(0, 3, W(i));
        }
        assert_eq!(graph.out_degree(0), 12);
        assert_eq!(graph.num_edges(), 5 + 2 + 10);
        assert_eq!(targets(&graph, 1), vec![2, 3]);
        assert_eq!(targets(&graph, 3), vec![0]);
        assert_eq!(graph.edges().count(), graph.num_edges());
    }

    #[test]
    fn deletions() {
        let mut graph = graph();
        graph.insert_edge(0, 2, W(3));
        graph.insert_edge(0, 3, W(3));
        assert_eq!(graph.delete_edges_to(0, 2), 2);
        assert_eq!(targets(&graph, 0), vec![1, 3]);
        assert_eq!(graph.delete_edges_to(0, 2), 0);

        let edge = graph.find_edge(0, 1).unwrap();
        graph.delete_edge(0, edge);
        assert_eq!(targets(&graph, 0), vec![3]);
        assert_eq!(graph.find_edge(0, 1), None);
        assert_eq!(graph.num_edges(), 4);

        // freed slots get reused
        graph.insert_edge(0, 1, W(1));
        assert_eq!(targets(&graph, 0), vec![1, 3]);
    }

    #[test]
    fn lookups() {
        let mut graph = graph();
        graph.insert_edge(0, 2, W(3));
        graph.insert_edge(0, 2, W(9));
        let smallest = graph.find_smallest_edge(0, 2, |_| true).unwrap();
        assert_eq!(*graph.edge_data(smallest), W(3));
        let smallest_heavy = graph.find_smallest_edge(0, 2, |data| data.0 > 4).unwrap();
        assert_eq!(*graph.edge_data(smallest_heavy), W(5));
        assert_eq!(graph.find_smallest_edge(0, 3, |_| true), None);

        assert_eq!(graph.find_edge_in_either_direction(3, 2).map(|(_, reversed)| reversed), Some(true));
        assert_eq!(graph.find_edge_in_either_direction(2, 3).map(|(_, reversed)| reversed), Some(false));
        assert_eq!(graph.find_edge_in_either_direction(1, 3), None);

        let edge = graph.find_edge(3, 0).unwrap();
        graph.set_target(edge, 1);
        *graph.edge_data_mut(edge) = W(2);
        assert_eq!(graph.find_edge(3, 0), None);
        assert_eq!(*graph.edge_data(graph.find_edge(3, 1).unwrap()), W(2));
    }
}
