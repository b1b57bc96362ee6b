//! Binary min heap keyed by node ids with decrease key.
//!
//! Each node can be inserted once per `clear`.
//! Inserted nodes stay known to the heap after they were popped,
//! so searches can use it as their tentative distance and settled node storage at the same time.
//! How node ids are mapped to the internal entries is pluggable through `NodeIndexStore`:
//! a dense array for searches which touch large parts of the graph,
//! ordered or hashed maps for sparse searches on huge id ranges
//! and an open addressing table with O(1) clear for the tiny, very frequent witness searches.
//!
//! # Examples
//!
//! ```
//! use rust_ch_contractor::datastr::binary_heap::{ArrayStorage, BinaryHeap};
//!
//! let mut heap = BinaryHeap::<u32, (), ArrayStorage>::new(3);
//! heap.insert(0, 42, ());
//! heap.insert(1, 23, ());
//! heap.insert(2, 50000, ());
//! assert_eq!(heap.min(), Some(1));
//! heap.decrease_key(0, 1);
//! assert_eq!(heap.delete_min(), 0);
//! assert!(heap.was_removed(0));
//! assert_eq!(heap.get_key(0), 1);
//! ```

use crate::datastr::{graph::NodeId, tabulation_hash::TabulationHash};
use std::collections::{BTreeMap, HashMap};

/// Mapping from node ids to positions in the heaps entry list.
///
/// Implementations may return stale positions for nodes which were never inserted since the last clear,
/// the heap validates every position it reads.
pub trait NodeIndexStore {
    /// Create a store for node ids in `[0, num_nodes)`.
    fn new(num_nodes: usize) -> Self;
    /// Position stored for `node`, `None` if there definitely is none.
    fn peek(&self, node: NodeId) -> Option<usize>;
    fn set(&mut self, node: NodeId, index: usize);
    fn clear(&mut self);

    /// Position stored for `node`. Panics if there is none.
    fn get(&self, node: NodeId) -> usize {
        match self.peek(node) {
            Some(index) => index,
            None => panic!("no index stored for node {}", node),
        }
    }
}

/// Dense storage, one slot per node id.
/// Clearing is free since stale entries are detected by the heap.
#[derive(Debug, Clone)]
pub struct ArrayStorage {
    positions: Vec<usize>,
}

impl NodeIndexStore for ArrayStorage {
    fn new(num_nodes: usize) -> Self {
        ArrayStorage { positions: vec![0; num_nodes] }
    }

    #[inline(always)]
    fn peek(&self, node: NodeId) -> Option<usize> {
        Some(self.positions[node as usize])
    }

    #[inline(always)]
    fn set(&mut self, node: NodeId, index: usize) {
        self.positions[node as usize] = index;
    }

    fn clear(&mut self) {}
}

/// Ordered map storage, memory proportional to the number of touched nodes.
#[derive(Debug, Clone, Default)]
pub struct MapStorage {
    positions: BTreeMap<NodeId, usize>,
}

impl NodeIndexStore for MapStorage {
    fn new(_num_nodes: usize) -> Self {
        Self::default()
    }

    fn peek(&self, node: NodeId) -> Option<usize> {
        self.positions.get(&node).copied()
    }

    fn set(&mut self, node: NodeId, index: usize) {
        self.positions.insert(node, index);
    }

    fn clear(&mut self) {
        self.positions.clear();
    }
}

/// Hash map storage, memory proportional to the number of touched nodes.
#[derive(Debug, Clone, Default)]
pub struct UnorderedMapStorage {
    positions: HashMap<NodeId, usize>,
}

impl NodeIndexStore for UnorderedMapStorage {
    fn new(_num_nodes: usize) -> Self {
        Self::default()
    }

    fn peek(&self, node: NodeId) -> Option<usize> {
        self.positions.get(&node).copied()
    }

    fn set(&mut self, node: NodeId, index: usize) {
        self.positions.insert(node, index);
    }

    fn clear(&mut self) {
        self.positions.clear();
    }
}

const XOR_TABLE_SIZE: usize = 1 << 16;

#[derive(Debug, Clone, Copy, Default)]
struct HashCell {
    node: NodeId,
    index: usize,
    generation: u16,
}

/// Open addressing table with `2^16` slots, tabulation hashing and linear probing.
/// Cells belong to the current generation only if their stamp matches,
/// so `clear` just starts a new generation.
/// Can hold at most `2^16` nodes between two clears.
#[derive(Debug, Clone)]
pub struct XorFastHashStorage {
    cells: Box<[HashCell]>,
    generation: u16,
    hash: TabulationHash,
}

impl XorFastHashStorage {
    // slot of `node` in the current generation, or the first free slot on its probe sequence
    #[inline]
    fn probe(&self, node: NodeId) -> (usize, bool) {
        let mut slot = self.hash.hash(node) as usize;
        for _ in 0..XOR_TABLE_SIZE {
            let cell = &self.cells[slot];
            if cell.generation != self.generation {
                return (slot, false);
            }
            if cell.node == node {
                return (slot, true);
            }
            slot = (slot + 1) % XOR_TABLE_SIZE;
        }
        panic!("hash table with {} slots overflowed", XOR_TABLE_SIZE);
    }
}

impl NodeIndexStore for XorFastHashStorage {
    fn new(_num_nodes: usize) -> Self {
        XorFastHashStorage {
            cells: vec![HashCell::default(); XOR_TABLE_SIZE].into_boxed_slice(),
            generation: 1,
            hash: TabulationHash::default(),
        }
    }

    #[inline]
    fn peek(&self, node: NodeId) -> Option<usize> {
        match self.probe(node) {
            (slot, true) => Some(self.cells[slot].index),
            _ => None,
        }
    }

    #[inline]
    fn set(&mut self, node: NodeId, index: usize) {
        let (slot, _) = self.probe(node);
        self.cells[slot] = HashCell {
            node,
            index,
            generation: self.generation,
        };
    }

    fn clear(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        // stamps from old generations become valid again after wrapping around
        if self.generation == 0 {
            for cell in self.cells.iter_mut() {
                cell.generation = 0;
            }
            self.generation = 1;
        }
    }
}

const REMOVED: usize = usize::MAX;

#[derive(Debug, Clone)]
struct InsertedEntry<W, D> {
    node: NodeId,
    // position in `heap` or `REMOVED`
    heap_position: usize,
    weight: W,
    data: D,
}

#[derive(Debug, Clone, Copy)]
struct HeapEntry<W> {
    // position in `inserted`
    index: usize,
    weight: W,
}

/// Binary min heap over node ids with weights `W`, per node payload `D` and node index storage `S`.
#[derive(Debug, Clone)]
pub struct BinaryHeap<W, D, S> {
    inserted: Vec<InsertedEntry<W, D>>,
    heap: Vec<HeapEntry<W>>,
    node_index: S,
}

impl<W: Copy + Ord, D, S: NodeIndexStore> BinaryHeap<W, D, S> {
    /// Create an empty heap for node ids in `[0, num_nodes)`.
    pub fn new(num_nodes: usize) -> Self {
        BinaryHeap {
            inserted: Vec::new(),
            heap: Vec::new(),
            node_index: S::new(num_nodes),
        }
    }

    /// Number of nodes currently in the queue.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Forget all nodes, including the removed ones.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.inserted.clear();
        self.node_index.clear();
    }

    /// Mark all queued nodes as removed. They stay inserted.
    pub fn delete_all(&mut self) {
        for entry in &self.heap {
            self.inserted[entry.index].heap_position = REMOVED;
        }
        self.heap.clear();
    }

    #[inline]
    fn entry_index(&self, node: NodeId) -> Option<usize> {
        self.node_index
            .peek(node)
            .filter(|&index| index < self.inserted.len() && self.inserted[index].node == node)
    }

    #[inline]
    fn checked_entry_index(&self, node: NodeId) -> usize {
        match self.entry_index(node) {
            Some(index) => index,
            None => panic!("node {} was not inserted into the heap", node),
        }
    }

    /// Was `node` inserted since the last `clear`? Also true after it was popped again.
    #[inline]
    pub fn was_inserted(&self, node: NodeId) -> bool {
        self.entry_index(node).is_some()
    }

    /// Was `node` inserted and popped again?
    pub fn was_removed(&self, node: NodeId) -> bool {
        self.inserted[self.checked_entry_index(node)].heap_position == REMOVED
    }

    /// Insert a node which was not inserted since the last `clear`.
    pub fn insert(&mut self, node: NodeId, weight: W, data: D) {
        assert!(!self.was_inserted(node), "node {} inserted twice", node);
        let index = self.inserted.len();
        let position = self.heap.len();
        self.inserted.push(InsertedEntry {
            node,
            heap_position: position,
            weight,
            data,
        });
        self.heap.push(HeapEntry { index, weight });
        self.node_index.set(node, index);
        self.upheap(position);
    }

    /// Node with the smallest weight, if any.
    pub fn min(&self) -> Option<NodeId> {
        self.heap.first().map(|entry| self.inserted[entry.index].node)
    }

    /// Smallest weight currently queued, if any.
    pub fn min_key(&self) -> Option<W> {
        self.heap.first().map(|entry| entry.weight)
    }

    /// Pop the node with the smallest weight. Panics on an empty heap.
    pub fn delete_min(&mut self) -> NodeId {
        assert!(!self.heap.is_empty(), "delete_min on empty heap");
        let removed = self.heap.swap_remove(0);
        self.inserted[removed.index].heap_position = REMOVED;
        if !self.heap.is_empty() {
            self.inserted[self.heap[0].index].heap_position = 0;
            self.downheap(0);
        }
        self.inserted[removed.index].node
    }

    /// Lower the weight of a queued node. The new weight must be strictly smaller.
    pub fn decrease_key(&mut self, node: NodeId, weight: W) {
        let index = self.checked_entry_index(node);
        let entry = &mut self.inserted[index];
        assert!(entry.heap_position != REMOVED, "decrease_key on removed node {}", node);
        assert!(weight < entry.weight, "decrease_key with larger weight for node {}", node);
        entry.weight = weight;
        let position = entry.heap_position;
        self.heap[position].weight = weight;
        self.upheap(position);
    }

    /// Weight of an inserted node, also after it was removed.
    pub fn get_key(&self, node: NodeId) -> W {
        self.inserted[self.checked_entry_index(node)].weight
    }

    pub fn get_data(&self, node: NodeId) -> &D {
        &self.inserted[self.checked_entry_index(node)].data
    }

    pub fn get_data_mut(&mut self, node: NodeId) -> &mut D {
        let index = self.checked_entry_index(node);
        &mut self.inserted[index].data
    }

    fn upheap(&mut self, mut position: usize) {
        let moving = self.heap[position];
        while position > 0 {
            let parent = (position - 1) / 2;
            if self.heap[parent].weight <= moving.weight {
                break;
            }
            self.heap[position] = self.heap[parent];
            self.inserted[self.heap[position].index].heap_position = position;
            position = parent;
        }
        self.heap[position] = moving;
        self.inserted[moving.index].heap_position = position;
    }

    fn downheap(&mut self, mut position: usize) {
        let moving = self.heap[position];
        let len = self.heap.len();
        loop {
            let mut child = 2 * position + 1;
            if child >= len {
                break;
            }
            if child + 1 < len && self.heap[child + 1].weight < self.heap[child].weight {
                child += 1;
            }
            if moving.weight <= self.heap[child].weight {
                break;
            }
            self.heap[position] = self.heap[child];
            self.inserted[self.heap[position].index].heap_position = position;
            position = child;
        }
        self.heap[position] = moving;
        self.inserted[moving.index].heap_position = position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn insert_get_and_pop_in_order<S: NodeIndexStore>() {
        let mut heap = BinaryHeap::<u32, u8, S>::new(100);
        let weights = [17u32, 3, 99, 3, 42, 0, 58];
        for (node, &weight) in weights.iter().enumerate() {
            heap.insert(node as NodeId * 10, weight, node as u8);
            assert!(heap.was_inserted(node as NodeId * 10));
            assert_eq!(heap.get_key(node as NodeId * 10), weight);
        }
        assert_eq!(heap.len(), weights.len());
        assert!(!heap.was_inserted(1));

        *heap.get_data_mut(40) = 200;
        assert_eq!(*heap.get_data(40), 200);

        heap.decrease_key(20, 1);
        assert_eq!(heap.get_key(20), 1);

        let mut popped = Vec::new();
        while !heap.is_empty() {
            let min_key = heap.min_key();
            let node = heap.delete_min();
            assert_eq!(min_key, Some(heap.get_key(node)));
            assert!(heap.was_removed(node));
            popped.push(heap.get_key(node));
        }
        assert_eq!(popped, vec![0, 1, 3, 3, 17, 42, 58]);
        assert!(heap.was_inserted(20));

        heap.clear();
        assert!(heap.is_empty());
        for node in 0..7 {
            assert!(!heap.was_inserted(node * 10));
        }
        heap.insert(20, 5, 0);
        assert_eq!(heap.min(), Some(20));
    }

    fn random_operations_match_sorting<S: NodeIndexStore>() {
        let mut rng = StdRng::seed_from_u64(1234);
        let mut heap = BinaryHeap::<u32, (), S>::new(1000);
        for _ in 0..20 {
            heap.clear();
            let mut reference = std::collections::BTreeMap::new();
            for _ in 0..300 {
                let node = rng.gen_range(0..1000);
                let weight = rng.gen_range(0..10_000);
                if !heap.was_inserted(node) {
                    heap.insert(node, weight, ());
                    reference.insert(node, weight);
                } else if !heap.was_removed(node) && weight < heap.get_key(node) {
                    heap.decrease_key(node, weight);
                    reference.insert(node, weight);
                }
                if rng.gen_bool(0.2) && !heap.is_empty() {
                    let node = heap.delete_min();
                    let min = reference.values().copied().min().unwrap();
                    assert_eq!(reference.remove(&node), Some(min));
                }
            }
            let mut expected: Vec<u32> = reference.values().copied().collect();
            expected.sort_unstable();
            let mut actual = Vec::new();
            while !heap.is_empty() {
                let node = heap.delete_min();
                actual.push(heap.get_key(node));
            }
            assert_eq!(actual, expected);
        }
    }

    #[test]
    fn array_storage_laws() {
        insert_get_and_pop_in_order::<ArrayStorage>();
        random_operations_match_sorting::<ArrayStorage>();
    }

    #[test]
    fn map_storage_laws() {
        insert_get_and_pop_in_order::<MapStorage>();
        random_operations_match_sorting::<MapStorage>();
    }

    #[test]
    fn unordered_map_storage_laws() {
        insert_get_and_pop_in_order::<UnorderedMapStorage>();
        random_operations_match_sorting::<UnorderedMapStorage>();
    }

    #[test]
    fn xor_hash_storage_laws() {
        insert_get_and_pop_in_order::<XorFastHashStorage>();
        random_operations_match_sorting::<XorFastHashStorage>();
    }

    #[test]
    fn xor_hash_storage_survives_generation_overflow() {
        let mut storage = XorFastHashStorage::new(0);
        for round in 0..70_000u32 {
            storage.set(round, 1);
            assert_eq!(storage.peek(round), Some(1));
            storage.clear();
            assert_eq!(storage.peek(round), None);
        }
    }

    #[test]
    fn delete_all_keeps_nodes_inserted() {
        let mut heap = BinaryHeap::<u32, (), UnorderedMapStorage>::new(10);
        heap.insert(1, 5, ());
        heap.insert(2, 3, ());
        heap.delete_all();
        assert!(heap.is_empty());
        assert!(heap.was_inserted(1));
        assert!(heap.was_removed(2));
        assert_eq!(heap.get_key(1), 5);
    }

    #[test]
    #[should_panic]
    fn decrease_key_on_unknown_node_panics() {
        let mut heap = BinaryHeap::<u32, (), ArrayStorage>::new(10);
        heap.insert(1, 5, ());
        heap.decrease_key(2, 1);
    }
}
