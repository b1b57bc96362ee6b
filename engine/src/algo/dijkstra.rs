//! Plain Dijkstra for validating contraction results against.

use super::*;
use crate::datastr::binary_heap::{ArrayStorage, BinaryHeap};

/// Distances from `source` to every node, `INFINITY` for unreachable nodes.
pub fn one_to_all<G: LinkIterable<Link>>(graph: &G, source: NodeId) -> Vec<Weight> {
    let mut distances = vec![INFINITY; graph.num_nodes()];
    let mut queue: BinaryHeap<Weight, (), ArrayStorage> = BinaryHeap::new(graph.num_nodes());
    queue.insert(source, 0, ());

    while !queue.is_empty() {
        let node = queue.delete_min();
        let distance = queue.get_key(node);
        distances[node as usize] = distance;

        for Link { node: head, weight } in graph.link_iter(node) {
            let head_distance = distance + weight;
            if !queue.was_inserted(head) {
                queue.insert(head, head_distance, ());
            } else if !queue.was_removed(head) && head_distance < queue.get_key(head) {
                queue.decrease_key(head, head_distance);
            }
        }
    }

    distances
}

/// Distance from `query.from` to `query.to`, `None` if unreachable.
pub fn distance<G: LinkIterable<Link>>(graph: &G, query: Query) -> Option<Weight> {
    Some(one_to_all(graph, query.from)[query.to as usize]).filter(|&distance| distance < INFINITY)
}
