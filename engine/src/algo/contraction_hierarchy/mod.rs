//! Parallel contraction hierarchy preprocessing.
//!
//! Nodes are eliminated in rounds. Each round selects a set of nodes which are pairwise
//! more than two hops apart and have the locally smallest priority,
//! contracts them all in parallel, applies the resulting graph changes
//! and recomputes the priorities of their neighbours.
//! The priority is derived from a simulated contraction: how many (original) edges would be added
//! versus removed, plus the depth of the node in the hierarchy built so far.
//!
//! All parallel phases only read the graph and the priorities.
//! Mutations are buffered in per worker contexts and applied in between phases by the driving thread,
//! in a canonical order, so results do not depend on the scheduling.
//!
//! Once a configurable share of the nodes is contracted, the remaining graph is renumbered and rebuilt (the flush).
//! Edges of contracted nodes are moved out of the way at that point since they will never change again.

use crate::datastr::graph::{dynamic_graph::GraphEdge, *};
use crate::datastr::segmented_vector::SegmentedVec;
use crate::datastr::tabulation_hash::{TieBreaker, DEFAULT_SEED};
use crate::report::*;
use rayon::prelude::*;
use std::{
    ops::{Deref, DerefMut},
    sync::{Mutex, MutexGuard, PoisonError},
};

pub mod edge_data;
pub mod query;
mod witness;

pub use self::edge_data::*;
use self::witness::{ContractionStats, ContractorThreadData};

pub type ContractorGraph = DynamicGraph<ContractorEdgeData>;

#[cfg(not(override_ch_flush_threshold))]
pub const FLUSH_THRESHOLD: f32 = 0.65;
#[cfg(override_ch_flush_threshold)]
pub const FLUSH_THRESHOLD: f32 = include!(concat!(env!("OUT_DIR"), "/CH_FLUSH_THRESHOLD"));

#[cfg(not(override_ch_simulation_witness_limit))]
pub const SIMULATION_WITNESS_NODE_LIMIT: usize = 1000;
#[cfg(override_ch_simulation_witness_limit)]
pub const SIMULATION_WITNESS_NODE_LIMIT: usize = include!(concat!(env!("OUT_DIR"), "/CH_SIMULATION_WITNESS_LIMIT"));

#[cfg(not(override_ch_contraction_witness_limit))]
pub const CONTRACTION_WITNESS_NODE_LIMIT: usize = 2000;
#[cfg(override_ch_contraction_witness_limit)]
pub const CONTRACTION_WITNESS_NODE_LIMIT: usize = include!(concat!(env!("OUT_DIR"), "/CH_CONTRACTION_WITNESS_LIMIT"));

/// Input weights above this (a day in deciseconds) are most likely broken data.
const SUSPICIOUS_WEIGHT: Weight = 24 * 60 * 60 * 10;

/// Tunables of the contraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContractorParams {
    pub edge_quotient_factor: f32,
    pub original_edge_quotient_factor: f32,
    pub depth_factor: f32,
    /// Share of contracted nodes after which the graph gets renumbered and rebuilt.
    /// Values of 1.0 or above disable the flush.
    pub flush_threshold: f32,
    /// Settled node budget of witness searches while computing priorities.
    pub simulation_witness_node_limit: usize,
    /// Settled node budget of witness searches during the actual contraction.
    pub contraction_witness_node_limit: usize,
    /// Minimum number of nodes per rayon job for the initial priority computation.
    pub init_grain_size: usize,
    /// Minimum number of nodes per rayon job during contraction rounds.
    pub independence_grain_size: usize,
    pub tie_break_seed: u64,
}

impl Default for ContractorParams {
    fn default() -> Self {
        ContractorParams {
            edge_quotient_factor: 2.0,
            original_edge_quotient_factor: 4.0,
            depth_factor: 1.0,
            flush_threshold: FLUSH_THRESHOLD,
            simulation_witness_node_limit: SIMULATION_WITNESS_NODE_LIMIT,
            contraction_witness_node_limit: CONTRACTION_WITNESS_NODE_LIMIT,
            init_grain_size: 100_000,
            independence_grain_size: 1,
            tie_break_seed: DEFAULT_SEED,
        }
    }
}

impl ContractorParams {
    /// Priority of a node with the given simulation result. Smaller contracts earlier.
    /// Nodes without edges (or without original edges) get their depth as priority.
    pub fn priority(&self, stats: &ContractionStats, depth: u32) -> f32 {
        if stats.edges_deleted == 0 || stats.original_edges_deleted == 0 {
            return depth as f32;
        }
        self.edge_quotient_factor * (stats.edges_added as f32 / stats.edges_deleted as f32)
            + self.original_edge_quotient_factor * (stats.original_edges_added as f32 / stats.original_edges_deleted as f32)
            + self.depth_factor * depth as f32
    }
}

/// Directed input edge. `forward` means traversable from `source` to `target`, `backward` the other way around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub weight: Weight,
    pub edge_id: EdgeId,
    pub forward: bool,
    pub backward: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractorState {
    Built,
    PrioritiesComputed,
    Contracting,
    Done,
}

/// One lazily created `ContractorThreadData` per rayon worker.
///
/// Slots are indexed by the worker index, work outside of the pool uses the extra last slot.
/// Each slot is only ever locked by its own thread, so the mutexes are uncontended.
/// Parallel passes check out a slot once per rayon job through `map_init`/`for_each_init`,
/// between passes the driving thread drains the buffered results through `iter_mut`.
#[derive(Debug)]
struct WorkerContexts {
    num_nodes: usize,
    slots: Vec<Mutex<Option<ContractorThreadData>>>,
}

impl WorkerContexts {
    fn new(num_nodes: usize) -> Self {
        WorkerContexts {
            num_nodes,
            slots: (0..=rayon::current_num_threads()).map(|_| Mutex::new(None)).collect(),
        }
    }

    fn checkout(&self) -> WorkerContext<'_> {
        let fallback = self.slots.len() - 1;
        let slot = rayon::current_thread_index().filter(|&idx| idx < fallback).unwrap_or(fallback);
        let mut guard = self.slots[slot].lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            *guard = Some(ContractorThreadData::new(self.num_nodes));
        }
        WorkerContext(guard)
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut ContractorThreadData> {
        self.slots
            .iter_mut()
            .filter_map(|slot| slot.get_mut().unwrap_or_else(PoisonError::into_inner).as_mut())
    }
}

struct WorkerContext<'a>(MutexGuard<'a, Option<ContractorThreadData>>);

impl<'a> Deref for WorkerContext<'a> {
    type Target = ContractorThreadData;

    fn deref(&self) -> &ContractorThreadData {
        match &*self.0 {
            Some(data) => data,
            None => unreachable!("worker context checked out without data"),
        }
    }
}

impl<'a> DerefMut for WorkerContext<'a> {
    fn deref_mut(&mut self) -> &mut ContractorThreadData {
        match &mut *self.0 {
            Some(data) => data,
            None => unreachable!("worker context checked out without data"),
        }
    }
}

#[derive(Debug)]
pub struct Contractor {
    graph: ContractorGraph,
    params: ContractorParams,
    tie_breaker: TieBreaker,
    state: ContractorState,
    num_nodes: usize,
    /// Not yet contracted nodes, in the current id space.
    remaining_nodes: Vec<NodeId>,
    num_contracted: usize,
    priorities: Vec<f32>,
    depths: Vec<u32>,
    /// Current id to input id. Empty until the flush.
    new_to_orig: Vec<NodeId>,
    /// Edges of nodes contracted before the flush, in input ids.
    external_edges: SegmentedVec<ContractorEdge>,
    contexts: WorkerContexts,
    rounds: usize,
}

impl Contractor {
    pub fn new<I: IntoIterator<Item = InputEdge>>(num_nodes: usize, input_edges: I) -> Self {
        Self::with_params(num_nodes, input_edges, ContractorParams::default())
    }

    /// Build the contraction graph.
    ///
    /// Every input edge is stored at both of its endpoints.
    /// Self loops are dropped and parallel edges merged, keeping the minimum weight per direction.
    /// Where both directions end up with the same weight a single bidirectional edge remains.
    pub fn with_params<I: IntoIterator<Item = InputEdge>>(num_nodes: usize, input_edges: I, params: ContractorParams) -> Self {
        let mut edges: Vec<ContractorEdge> = Vec::new();
        for InputEdge {
            source,
            target,
            weight,
            edge_id,
            forward,
            backward,
        } in input_edges
        {
            let weight = std::cmp::max(weight, 1);
            assert!(weight < INFINITY, "edge ({}, {}) with invalid weight {}", source, target, weight);
            #[cfg(debug_assertions)]
            {
                if weight > SUSPICIOUS_WEIGHT {
                    eprintln!("WARNING: large edge weight {} on edge ({}, {})", weight, source, target);
                }
            }
            edges.push(GraphEdge {
                source,
                target,
                data: ContractorEdgeData::new(weight, 1, edge_id, false, forward, backward),
            });
            edges.push(GraphEdge {
                source: target,
                target: source,
                data: ContractorEdgeData::new(weight, 1, edge_id, false, backward, forward),
            });
        }
        edges.par_sort_unstable();

        let total = edges.len();
        let mut merged = Vec::with_capacity(total);
        for group in edges.chunk_by(|a, b| a.source == b.source && a.target == b.target) {
            let GraphEdge { source, target, data } = group[0];
            if source == target {
                continue;
            }
            let min_distance = |direction: fn(&ContractorEdgeData) -> bool| {
                group.iter().filter(|edge| direction(&edge.data)).map(|edge| edge.data.distance).min()
            };
            let forward = min_distance(ContractorEdgeData::forward);
            let backward = min_distance(ContractorEdgeData::backward);

            let edge = |distance, forward, backward| GraphEdge {
                source,
                target,
                data: ContractorEdgeData::new(distance, 1, data.id, false, forward, backward),
            };
            match (forward, backward) {
                (Some(forward), Some(backward)) if forward == backward => merged.push(edge(forward, true, true)),
                (forward, backward) => {
                    if let Some(distance) = forward {
                        merged.push(edge(distance, true, false));
                    }
                    if let Some(distance) = backward {
                        merged.push(edge(distance, false, true));
                    }
                }
            }
        }
        drop(edges);
        eprintln!("merged {} edges out of {}", total - merged.len(), total);
        report!("merged_input_edges", total - merged.len());

        let graph = ContractorGraph::from_sorted_edges(num_nodes, merged);

        Contractor {
            graph,
            tie_breaker: TieBreaker::new(params.tie_break_seed),
            params,
            state: ContractorState::Built,
            num_nodes,
            remaining_nodes: (0..num_nodes as NodeId).collect(),
            num_contracted: 0,
            priorities: Vec::new(),
            depths: vec![0; num_nodes],
            new_to_orig: Vec::new(),
            external_edges: SegmentedVec::new(),
            contexts: WorkerContexts::new(num_nodes),
            rounds: 0,
        }
    }

    pub fn state(&self) -> ContractorState {
        self.state
    }

    pub fn graph(&self) -> &ContractorGraph {
        &self.graph
    }

    pub fn params(&self) -> &ContractorParams {
        &self.params
    }

    /// Current priorities of all nodes in the current id space.
    pub fn priorities(&self) -> &[f32] {
        &self.priorities
    }

    pub fn num_contracted_nodes(&self) -> usize {
        self.num_contracted
    }

    /// Compute the initial priorities of all nodes.
    pub fn compute_priorities(&mut self) {
        assert_eq!(self.state, ContractorState::Built, "priorities already computed");
        let (graph, params, contexts) = (&self.graph, &self.params, &self.contexts);
        let limit = params.simulation_witness_node_limit;

        self.priorities = (0..graph.num_nodes() as NodeId)
            .into_par_iter()
            .with_min_len(params.init_grain_size)
            .map_init(|| contexts.checkout(), |data, node| params.priority(&data.simulate_contraction(graph, node, limit), 0))
            .collect();
        self.state = ContractorState::PrioritiesComputed;
    }

    /// Contract the whole graph.
    pub fn run(&mut self) {
        if self.state == ContractorState::Built {
            eprintln!("initializing elimination priorities");
            report_time_with_key("priority initialization", "priority_init_running_time_ms", || self.compute_priorities());
        }

        eprintln!("preprocessing {} nodes", self.num_nodes);
        let timer = Timer::new();
        let mut next_progress = 10;
        while self.num_nodes > 2 && self.num_contracted < self.num_nodes {
            self.state = ContractorState::Contracting;
            if self.new_to_orig.is_empty() && self.num_contracted as f64 > self.num_nodes as f64 * f64::from(self.params.flush_threshold) {
                self.flush();
            }
            self.contract_round();

            let progress = self.num_contracted * 100 / self.num_nodes;
            if progress >= next_progress {
                eprintln!("contracted {}% after {} rounds", progress, self.rounds);
                next_progress = progress / 10 * 10 + 10;
            }
        }
        self.state = ContractorState::Done;
        self.contexts = WorkerContexts::new(0);

        report!("contraction_running_time_ms", timer.get_passed_ms());
        report!("contraction_rounds", self.rounds);
        report!("num_edges", self.graph.num_edges() + self.external_edges.len());
    }

    fn contract_round(&mut self) {
        let Contractor {
            graph,
            params,
            tie_breaker,
            remaining_nodes,
            priorities,
            depths,
            contexts,
            ..
        } = self;
        let grain_size = params.independence_grain_size;

        let independent: Vec<bool> = {
            let (graph, priorities, contexts, tie_breaker) = (&*graph, &priorities[..], &*contexts, &*tie_breaker);
            remaining_nodes
                .par_iter()
                .with_min_len(grain_size)
                .map_init(|| contexts.checkout(), |data, &node| data.is_node_independent(graph, priorities, tie_breaker, node))
                .collect()
        };

        let mut dependent_nodes = Vec::with_capacity(remaining_nodes.len());
        let mut independent_nodes = Vec::new();
        for (&node, is_independent) in remaining_nodes.iter().zip(independent) {
            if is_independent {
                independent_nodes.push(node);
            } else {
                dependent_nodes.push(node);
            }
        }
        assert!(!independent_nodes.is_empty(), "no independent node among {} remaining", remaining_nodes.len());

        {
            let (graph, contexts) = (&*graph, &*contexts);
            let limit = params.contraction_witness_node_limit;
            independent_nodes.par_iter().with_min_len(grain_size).for_each_init(
                || contexts.checkout(),
                |data, &node| {
                    data.contract_node(graph, node, limit);
                    data.queue_deletions(graph, node);
                },
            );
        }

        let mut shortcuts = Vec::new();
        let mut deletions = Vec::new();
        for data in contexts.iter_mut() {
            shortcuts.append(&mut data.inserted_edges);
            deletions.append(&mut data.pending_deletions);
        }
        deletions.sort_unstable();
        for (neighbour, node) in deletions {
            graph.delete_edges_to(neighbour, node);
        }

        shortcuts.par_sort_unstable();
        for shortcut in shortcuts {
            if let Some(existing) = graph.find_edge(shortcut.source, shortcut.target) {
                let current = graph.edge_data_mut(existing);
                if current.is_shortcut()
                    && current.forward() == shortcut.data.forward()
                    && current.backward() == shortcut.data.backward()
                    && shortcut.data.distance < current.distance
                {
                    *current = shortcut.data;
                    continue;
                }
            }
            graph.insert_edge(shortcut.source, shortcut.target, shortcut.data);
        }

        {
            let (graph, depths, contexts, params) = (&*graph, &depths[..], &*contexts, &*params);
            independent_nodes.par_iter().with_min_len(grain_size).for_each_init(
                || contexts.checkout(),
                |data, &node| data.queue_neighbour_updates(graph, node, depths, params),
            );
        }
        for data in contexts.iter_mut() {
            for (node, depth, priority) in data.pending_updates.drain(..) {
                depths[node as usize] = depth;
                priorities[node as usize] = priority;
            }
        }

        self.num_contracted += independent_nodes.len();
        self.remaining_nodes = dependent_nodes;
        self.rounds += 1;
    }

    // Renumber the remaining nodes densely and rebuild the graph from their edges only.
    fn flush(&mut self) {
        eprintln!("flush after {} contracted nodes", self.num_contracted);
        report!("flush_contracted_nodes", self.num_contracted);
        // drop all worker scratch space before allocating the new graph
        self.contexts = WorkerContexts::new(0);

        let num_remaining = self.remaining_nodes.len();
        let mut orig_to_new = vec![INVALID_NODE; self.graph.num_nodes()];
        let mut new_to_orig = Vec::with_capacity(num_remaining);
        let mut priorities = Vec::with_capacity(num_remaining);
        let mut depths = Vec::with_capacity(num_remaining);
        for (new_id, node) in self.remaining_nodes.iter_mut().enumerate() {
            new_to_orig.push(*node);
            orig_to_new[*node as usize] = new_id as NodeId;
            priorities.push(self.priorities[*node as usize]);
            depths.push(self.depths[*node as usize]);
            *node = new_id as NodeId;
        }

        let old_graph = std::mem::replace(&mut self.graph, ContractorGraph::from_sorted_edges(0, std::iter::empty()));
        let mut edges = Vec::new();
        for GraphEdge { source, target, mut data } in old_graph.edges() {
            let new_source = orig_to_new[source as usize];
            if new_source == INVALID_NODE {
                self.external_edges.push(GraphEdge { source, target, data });
            } else {
                let new_target = orig_to_new[target as usize];
                assert_ne!(new_target, INVALID_NODE, "edge ({}, {}) points to contracted node", source, target);
                data.set_original_via_node_id(true);
                edges.push(GraphEdge {
                    source: new_source,
                    target: new_target,
                    data,
                });
            }
        }
        drop(old_graph);
        drop(orig_to_new);

        edges.par_sort_unstable();
        self.graph = ContractorGraph::from_sorted_edges(num_remaining, edges);
        self.priorities = priorities;
        self.depths = depths;
        self.new_to_orig = new_to_orig;
        self.contexts = WorkerContexts::new(num_remaining);
    }

    /// Maps input node ids to the ids of the current graph.
    /// Identity unless a flush happened, nodes contracted before the flush map to `INVALID_NODE`.
    pub fn node_renumbering(&self) -> Vec<NodeId> {
        if self.new_to_orig.is_empty() {
            return (0..self.num_nodes as NodeId).collect();
        }
        let mut renumbering = vec![INVALID_NODE; self.num_nodes];
        for (new_id, &orig) in self.new_to_orig.iter().enumerate() {
            renumbering[orig as usize] = new_id as NodeId;
        }
        renumbering
    }

    /// Current id to input id, `None` if no flush happened.
    pub fn flush_renumbering(&self) -> Option<&[NodeId]> {
        if self.new_to_orig.is_empty() {
            None
        } else {
            Some(&self.new_to_orig)
        }
    }

    /// Drain all edges of the hierarchy, in input node ids.
    /// Shortcuts carry their middle node, original edges their input edge id.
    pub fn into_edges(self) -> SegmentedVec<QueryEdge> {
        let Contractor {
            graph,
            new_to_orig,
            external_edges,
            ..
        } = self;
        let to_orig = |node: NodeId| if new_to_orig.is_empty() { node } else { new_to_orig[node as usize] };

        let mut edges = SegmentedVec::new();
        for GraphEdge { source, target, data } in graph.edges() {
            let id = if data.is_original_via_node_id() { data.id } else { to_orig(data.id) };
            edges.push(GraphEdge {
                source: to_orig(source),
                target: to_orig(target),
                data: data.to_query_data(id),
            });
        }
        drop(graph);

        edges.extend(external_edges.into_iter().map(|GraphEdge { source, target, data }| GraphEdge {
            source,
            target,
            data: data.to_query_data(data.id),
        }));
        report!("num_shortcuts", edges.iter().filter(|edge| edge.data.is_shortcut()).count());
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bidirectional(source: NodeId, target: NodeId, weight: Weight, edge_id: EdgeId) -> InputEdge {
        InputEdge {
            source,
            target,
            weight,
            edge_id,
            forward: true,
            backward: true,
        }
    }

    fn forward(source: NodeId, target: NodeId, weight: Weight, edge_id: EdgeId) -> InputEdge {
        InputEdge {
            source,
            target,
            weight,
            edge_id,
            forward: true,
            backward: false,
        }
    }

    fn stored_edges(contractor: &Contractor) -> Vec<(NodeId, NodeId, Weight, bool, bool)> {
        contractor
            .graph()
            .edges()
            .map(|edge| (edge.source, edge.target, edge.data.distance, edge.data.forward(), edge.data.backward()))
            .collect()
    }

    #[test]
    fn parallel_edges_keep_minimum() {
        let contractor = Contractor::new(2, vec![forward(0, 1, 5, 0), forward(0, 1, 3, 1)]);
        assert_eq!(stored_edges(&contractor), vec![(0, 1, 3, true, false), (1, 0, 3, false, true)]);
    }

    #[test]
    fn opposite_edges_merge_into_bidirectional() {
        let contractor = Contractor::new(3, vec![forward(0, 1, 2, 0), forward(1, 0, 2, 1), forward(1, 2, 1, 2), forward(2, 1, 4, 3), forward(2, 2, 1, 4)]);
        assert_eq!(
            stored_edges(&contractor),
            vec![
                (0, 1, 2, true, true),
                (1, 0, 2, true, true),
                (1, 2, 1, true, false),
                (1, 2, 4, false, true),
                (2, 1, 4, true, false),
                (2, 1, 1, false, true),
            ]
        );
    }

    #[test]
    fn zero_weights_become_one() {
        let contractor = Contractor::new(2, vec![bidirectional(0, 1, 0, 0)]);
        assert_eq!(stored_edges(&contractor), vec![(0, 1, 1, true, true), (1, 0, 1, true, true)]);
    }

    #[test]
    fn sink_priority_is_depth() {
        let mut contractor = Contractor::new(3, vec![forward(0, 2, 3, 0), forward(1, 2, 4, 1)]);
        contractor.compute_priorities();
        assert_eq!(contractor.state(), ContractorState::PrioritiesComputed);
        // 2 only has incoming edges, contracting it removes edges but never adds any
        assert_eq!(contractor.priorities()[2], 0.0);

        let params = ContractorParams::default();
        let stats = ContractionStats {
            edges_deleted: 0,
            ..ContractionStats::default()
        };
        assert_eq!(params.priority(&stats, 7), 7.0);
    }

    #[test]
    fn tiny_graphs_are_left_alone() {
        let mut contractor = Contractor::new(2, vec![bidirectional(0, 1, 1, 0)]);
        contractor.run();
        assert_eq!(contractor.state(), ContractorState::Done);
        assert_eq!(contractor.num_contracted_nodes(), 0);
        assert_eq!(contractor.into_edges().len(), 2);
    }

    #[test]
    fn all_nodes_get_contracted() {
        let edges = (0..9).map(|node| bidirectional(node, node + 1, 1, node)).collect::<Vec<_>>();
        let params = ContractorParams {
            flush_threshold: 1.0,
            ..ContractorParams::default()
        };
        let mut contractor = Contractor::with_params(10, edges, params);
        contractor.run();
        assert_eq!(contractor.state(), ContractorState::Done);
        assert_eq!(contractor.num_contracted_nodes(), 10);
        assert_eq!(contractor.node_renumbering(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn flush_renumbers_remaining_nodes() {
        let params = ContractorParams {
            flush_threshold: 0.0,
            ..ContractorParams::default()
        };
        let edges = (0..19).map(|node| bidirectional(node, node + 1, 1 + node % 3, node)).collect::<Vec<_>>();
        let mut contractor = Contractor::with_params(20, edges, params);
        contractor.run();

        let renumbering = contractor.node_renumbering();
        let new_to_orig = contractor.flush_renumbering().map(<[NodeId]>::to_vec).unwrap_or_default();
        assert!(!new_to_orig.is_empty());
        assert!(renumbering.iter().any(|&node| node == INVALID_NODE));
        for (new_id, &orig) in new_to_orig.iter().enumerate() {
            assert_eq!(renumbering[orig as usize], new_id as NodeId);
        }

        let edges = contractor.into_edges();
        assert!(edges.iter().all(|edge| edge.source < 20 && edge.target < 20));
        assert!(edges.iter().filter(|edge| edge.data.is_shortcut()).all(|edge| edge.data.id < 20));
    }
}
