//! Queries on a finished hierarchy.
//!
//! Each node stores the edges to the neighbours it had when it was contracted,
//! which are exactly its upward edges. The forward search follows edges with the forward flag,
//! the backward search edges with the backward flag, both only ever go up.

use super::*;
use crate::datastr::binary_heap::{ArrayStorage, BinaryHeap};

/// Distances and parent pointers of one search direction.
type SearchQueue = BinaryHeap<Weight, NodeId, ArrayStorage>;

#[derive(Debug)]
pub struct Server {
    graph: StaticGraph<QueryEdgeData>,
    forward: SearchQueue,
    backward: SearchQueue,
}

impl Server {
    pub fn new(graph: StaticGraph<QueryEdgeData>) -> Self {
        let n = graph.num_nodes();
        Server {
            graph,
            forward: SearchQueue::new(n),
            backward: SearchQueue::new(n),
        }
    }

    /// Build the offset indexed query graph from the output of `Contractor::into_edges`.
    pub fn from_edges(num_nodes: usize, edges: SegmentedVec<QueryEdge>) -> Self {
        let mut edges = edges.into_vec();
        edges.par_sort_unstable();
        Self::new(StaticGraph::from_sorted_edges(num_nodes, edges))
    }

    pub fn graph(&self) -> &StaticGraph<QueryEdgeData> {
        &self.graph
    }

    pub fn distance(&mut self, from: NodeId, to: NodeId) -> Option<Weight> {
        self.search(from, to).map(|(distance, _)| distance)
    }

    /// All nodes on a shortest path, including `from` and `to`, with all shortcuts unpacked.
    pub fn path(&mut self, from: NodeId, to: NodeId) -> Option<Vec<NodeId>> {
        let (_, meeting_node) = self.search(from, to)?;

        let mut up = vec![meeting_node];
        while let Some(&node) = up.last() {
            if node == from {
                break;
            }
            up.push(*self.forward.get_data(node));
        }
        up.reverse();

        let mut down = Vec::new();
        let mut node = meeting_node;
        while node != to {
            node = *self.backward.get_data(node);
            down.push(node);
        }

        let hops: Vec<NodeId> = up.into_iter().chain(down).collect();
        let mut path = vec![from];
        for hop in hops.windows(2) {
            path.extend(self.unpack_edge(hop[0], hop[1]));
            path.push(hop[1]);
        }
        Some(path)
    }

    /// The nodes strictly between `from` and `to` along the edge `from -> to`, recursively unpacking shortcuts.
    /// Panics if there is no such edge.
    pub fn unpack_edge(&self, from: NodeId, to: NodeId) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        let mut stack = vec![(from, to)];

        while let Some((tail, head)) = stack.pop() {
            let data = self.smallest_edge(tail, head);
            if data.is_shortcut() {
                let middle = data.id;
                stack.push((middle, head));
                stack.push((tail, middle));
            } else {
                nodes.push(head);
            }
        }

        let last = nodes.pop();
        debug_assert_eq!(last, Some(to));
        nodes
    }

    // The edge tail -> head is either stored at tail with the forward flag or at head with the backward flag.
    fn smallest_edge(&self, tail: NodeId, head: NodeId) -> QueryEdgeData {
        let stored_at_tail = self.graph.find_smallest_edge(tail, head, QueryEdgeData::forward);
        let stored_at_head = self.graph.find_smallest_edge(head, tail, QueryEdgeData::backward);
        let data = |edge: EdgeId| *self.graph.edge_data(edge);

        match (stored_at_tail.map(data), stored_at_head.map(data)) {
            (Some(a), Some(b)) => std::cmp::min_by_key(a, b, |data| data.distance),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => panic!("no edge from {} to {} in hierarchy", tail, head),
        }
    }

    fn search(&mut self, from: NodeId, to: NodeId) -> Option<(Weight, NodeId)> {
        let Server { graph, forward, backward } = self;
        forward.clear();
        backward.clear();
        forward.insert(from, 0, from);
        backward.insert(to, 0, to);

        let mut tentative_distance = INFINITY;
        let mut meeting_node = None;

        loop {
            let forward_min = forward.min_key().filter(|&key| key < tentative_distance);
            let backward_min = backward.min_key().filter(|&key| key < tentative_distance);

            let settle_forward = match (forward_min, backward_min) {
                (None, None) => break,
                (Some(f), Some(b)) => f <= b,
                (Some(_), None) => true,
                (None, Some(_)) => false,
            };

            let candidate = if settle_forward {
                settle_next(graph, forward, backward, QueryEdgeData::forward)
            } else {
                settle_next(graph, backward, forward, QueryEdgeData::backward)
            };
            if let Some((distance, node)) = candidate {
                if distance < tentative_distance {
                    tentative_distance = distance;
                    meeting_node = Some(node);
                }
            }
        }

        meeting_node.map(|node| (tentative_distance, node))
    }
}

// Settle the next node of `queue`, relax its edges which pass `direction`
// and return the path length through it if the other search has reached it too.
fn settle_next(
    graph: &StaticGraph<QueryEdgeData>,
    queue: &mut SearchQueue,
    other: &SearchQueue,
    direction: fn(&QueryEdgeData) -> bool,
) -> Option<(Weight, NodeId)> {
    let node = queue.delete_min();
    let distance = queue.get_key(node);

    for edge in graph.edge_range(node) {
        let data = graph.edge_data(edge);
        if !direction(data) {
            continue;
        }
        let head = graph.target(edge);
        let head_distance = distance + data.distance;
        if !queue.was_inserted(head) {
            queue.insert(head, head_distance, node);
        } else if !queue.was_removed(head) && head_distance < queue.get_key(head) {
            queue.decrease_key(head, head_distance);
            *queue.get_data_mut(head) = node;
        }
    }

    if other.was_inserted(node) {
        Some((distance + other.get_key(node), node))
    } else {
        None
    }
}
