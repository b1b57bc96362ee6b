//! Local searches around a node which is about to be contracted.
//!
//! For every pair of an incoming edge `(u, x)` and an outgoing edge `(x, v)` of the node `x`,
//! a shortcut `(u, v)` is necessary unless a witness path from `u` to `v` avoiding `x`
//! which is at most as long exists.
//! Witnesses are searched with one bounded Dijkstra per incoming edge, covering all targets at once.
//! The search may give up early (settled node limit), in which case shortcuts are added
//! which are not strictly necessary. That costs query performance but never correctness.

use super::*;
use crate::datastr::binary_heap::{BinaryHeap, XorFastHashStorage};

/// Per node payload in the witness search queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct WitnessData {
    pub hops: i16,
    pub is_target: bool,
}

pub type WitnessHeap = BinaryHeap<Weight, WitnessData, XorFastHashStorage>;

/// Edge counts collected by a simulated contraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContractionStats {
    pub edges_deleted: u64,
    pub edges_added: u64,
    pub original_edges_deleted: u64,
    pub original_edges_added: u64,
}

/// Scratch space of one worker thread, reused across all nodes and rounds it processes.
#[derive(Debug)]
pub struct ContractorThreadData {
    pub(super) heap: WitnessHeap,
    /// Shortcuts produced by this worker in the current round.
    pub(super) inserted_edges: Vec<ContractorEdge>,
    pub(super) neighbours: Vec<NodeId>,
    /// `(neighbour, contracted node)` pairs of edges to be removed after the current round.
    pub(super) pending_deletions: Vec<(NodeId, NodeId)>,
    /// `(node, depth, priority)` updates to be applied after the current round.
    pub(super) pending_updates: Vec<(NodeId, u32, f32)>,
}

impl ContractorThreadData {
    pub fn new(num_nodes: usize) -> Self {
        ContractorThreadData {
            heap: WitnessHeap::new(num_nodes),
            inserted_edges: Vec::new(),
            neighbours: Vec::new(),
            pending_deletions: Vec::new(),
            pending_updates: Vec::new(),
        }
    }

    /// Contract `node` without touching the graph and count what would happen.
    pub fn simulate_contraction(&mut self, graph: &ContractorGraph, node: NodeId, witness_node_limit: usize) -> ContractionStats {
        let mut stats = ContractionStats::default();
        for_each_necessary_shortcut(
            &mut self.heap,
            graph,
            node,
            witness_node_limit,
            |in_data| {
                stats.edges_deleted += 1;
                stats.original_edges_deleted += u64::from(in_data.original_edges());
            },
            |_, _, in_data, out_data, _| {
                stats.edges_added += 2;
                stats.original_edges_added += 2 * u64::from(in_data.original_edges() + out_data.original_edges());
            },
        );
        stats
    }

    /// Contract `node` and append the necessary shortcuts in both directions to `inserted_edges`.
    /// Shortcuts of this node which only differ in their direction get merged into one bidirectional edge.
    pub fn contract_node(&mut self, graph: &ContractorGraph, node: NodeId, witness_node_limit: usize) {
        let first_new = self.inserted_edges.len();
        let inserted_edges = &mut self.inserted_edges;

        for_each_necessary_shortcut(
            &mut self.heap,
            graph,
            node,
            witness_node_limit,
            |_| (),
            |source, target, in_data, out_data, distance| {
                let original_edges = in_data.original_edges() + out_data.original_edges();
                inserted_edges.push(GraphEdge {
                    source,
                    target,
                    data: ContractorEdgeData::new(distance, original_edges, node, true, true, false),
                });
                inserted_edges.push(GraphEdge {
                    source: target,
                    target: source,
                    data: ContractorEdgeData::new(distance, original_edges, node, true, false, true),
                });
            },
        );

        let end = self.inserted_edges.len();
        let mut kept = first_new;
        for i in first_new..end {
            let edge = self.inserted_edges[i];
            let duplicate = (i + 1..end).find(|&other| {
                let other = &self.inserted_edges[other];
                other.source == edge.source
                    && other.target == edge.target
                    && other.data.distance == edge.data.distance
                    && other.data.is_shortcut() == edge.data.is_shortcut()
            });
            match duplicate {
                Some(other) => {
                    let merged = &mut self.inserted_edges[other].data;
                    merged.set_forward(merged.forward() || edge.data.forward());
                    merged.set_backward(merged.backward() || edge.data.backward());
                }
                None => {
                    self.inserted_edges[kept] = edge;
                    kept += 1;
                }
            }
        }
        self.inserted_edges.truncate(kept);
    }

    /// Is no node within two hops more important to contract first than `node`?
    pub fn is_node_independent(&mut self, graph: &ContractorGraph, priorities: &[f32], tie_breaker: &TieBreaker, node: NodeId) -> bool {
        let priority = priorities[node as usize];
        let beats = |target: NodeId| {
            let target_priority = priorities[target as usize];
            priority > target_priority || ((priority - target_priority).abs() < f32::EPSILON && tie_breaker.bias(node, target))
        };

        self.neighbours.clear();
        for edge in graph.edge_range(node) {
            let target = graph.target(edge);
            if target == node {
                continue;
            }
            if beats(target) {
                return false;
            }
            self.neighbours.push(target);
        }
        self.neighbours.sort_unstable();
        self.neighbours.dedup();

        for &neighbour in &self.neighbours {
            for edge in graph.edge_range(neighbour) {
                let target = graph.target(edge);
                if target != node && beats(target) {
                    return false;
                }
            }
        }
        true
    }

    /// Remember to remove the edges pointing back to the just contracted `node`.
    pub fn queue_deletions(&mut self, graph: &ContractorGraph, node: NodeId) {
        self.collect_neighbours(graph, node);
        self.pending_deletions.extend(self.neighbours.iter().map(|&neighbour| (neighbour, node)));
    }

    /// Compute new depths and priorities for all neighbours of the just contracted `node`.
    /// Results are queued in `pending_updates`, the arrays themselves stay untouched.
    pub fn queue_neighbour_updates(&mut self, graph: &ContractorGraph, node: NodeId, depths: &[u32], params: &ContractorParams) {
        self.collect_neighbours(graph, node);
        let depth = depths[node as usize] + 1;
        for i in 0..self.neighbours.len() {
            let neighbour = self.neighbours[i];
            let neighbour_depth = std::cmp::max(depth, depths[neighbour as usize]);
            let stats = self.simulate_contraction(graph, neighbour, params.simulation_witness_node_limit);
            self.pending_updates.push((neighbour, neighbour_depth, params.priority(&stats, neighbour_depth)));
        }
    }

    // sorted, distinct neighbours of `node` in either direction
    fn collect_neighbours(&mut self, graph: &ContractorGraph, node: NodeId) {
        self.neighbours.clear();
        self.neighbours
            .extend(graph.edge_range(node).map(|edge| graph.target(edge)).filter(|&target| target != node));
        self.neighbours.sort_unstable();
        self.neighbours.dedup();
    }
}

// Runs a witness search for every incoming edge of `node` and calls `on_shortcut` with
// `(source, target, in edge, out edge, path distance)` for every path through `node` without witness.
// `on_in_edge` sees every edge of `node`, the deleted edges in a simulation.
fn for_each_necessary_shortcut(
    heap: &mut WitnessHeap,
    graph: &ContractorGraph,
    node: NodeId,
    witness_node_limit: usize,
    mut on_in_edge: impl FnMut(&ContractorEdgeData),
    mut on_shortcut: impl FnMut(NodeId, NodeId, &ContractorEdgeData, &ContractorEdgeData, Weight),
) {
    for in_edge in graph.edge_range(node) {
        let in_data = graph.edge_data(in_edge);
        on_in_edge(in_data);
        if !in_data.backward() {
            continue;
        }
        let source = graph.target(in_edge);

        heap.clear();
        heap.insert(source, 0, WitnessData::default());
        let mut max_distance = 0;
        let mut number_of_targets = 0;

        for out_edge in graph.edge_range(node) {
            let out_data = graph.edge_data(out_edge);
            if !out_data.forward() {
                continue;
            }
            let target = graph.target(out_edge);
            max_distance = std::cmp::max(max_distance, in_data.distance + out_data.distance);
            if !heap.was_inserted(target) {
                heap.insert(target, INFINITY, WitnessData { hops: 0, is_target: true });
                number_of_targets += 1;
            }
        }

        witness_search(heap, graph, max_distance, number_of_targets, witness_node_limit, node);

        for out_edge in graph.edge_range(node) {
            let out_data = graph.edge_data(out_edge);
            if !out_data.forward() {
                continue;
            }
            let target = graph.target(out_edge);
            let path_distance = in_data.distance + out_data.distance;
            if path_distance < heap.get_key(target) {
                on_shortcut(source, target, in_data, out_data, path_distance);
            }
        }
    }
}

// Dijkstra over forward edges, avoiding `middle_node`.
// Stops after `max_nodes` settled nodes, beyond `max_distance` or once all targets are settled.
fn witness_search(heap: &mut WitnessHeap, graph: &ContractorGraph, max_distance: Weight, number_of_targets: usize, max_nodes: usize, middle_node: NodeId) {
    let mut settled = 0;
    let mut targets_found = 0;

    while !heap.is_empty() {
        let node = heap.delete_min();
        let distance = heap.get_key(node);
        let WitnessData { hops, is_target } = *heap.get_data(node);
        let hops = hops.saturating_add(1);

        settled += 1;
        if settled > max_nodes || distance > max_distance {
            return;
        }

        if is_target {
            targets_found += 1;
            if targets_found >= number_of_targets {
                return;
            }
        }

        for edge in graph.edge_range(node) {
            let data = graph.edge_data(edge);
            if !data.forward() {
                continue;
            }
            let to = graph.target(edge);
            if to == middle_node {
                continue;
            }
            let to_distance = distance + data.distance;

            if !heap.was_inserted(to) {
                heap.insert(to, to_distance, WitnessData { hops, is_target: false });
            } else if to_distance < heap.get_key(to) {
                heap.decrease_key(to, to_distance);
                heap.get_data_mut(to).hops = hops;
            }
        }
    }
}
