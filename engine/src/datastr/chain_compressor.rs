//! Bookkeeping for node chains which were removed from a graph by merging consecutive edges.
//!
//! When the two edges `u -> v` and `v -> w` are merged into a single edge `u -> w`,
//! the geometry through `v` must not be lost.
//! Every merged edge owns a bucket with the sequence of `(node, weight)` pairs it swallowed,
//! ending with the edges final target.
//! Merging an edge which already owns a bucket splices that bucket onto the surviving one.
//! Emptied buckets are recycled through a free list.
//!
//! The flattened form (`ChainGeometry`) is a prefix sum offset table over the buckets
//! and the concatenated node ids, which is what the query side needs to unpack geometries.

use crate::{
    datastr::graph::{EdgeId, NodeId, Weight, INFINITY, INVALID_NODE},
    io::*,
};
use std::{collections::HashMap, io::Write, ops::Range};

const FREE_LIST_GROWTH: usize = 100;

/// Entry of a chain bucket: a node and the weight of the segment ending at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedNode {
    pub node: NodeId,
    pub weight: Weight,
}

#[derive(Debug, Default)]
pub struct ChainCompressor {
    buckets: Vec<Vec<CompressedNode>>,
    free_list: Vec<usize>,
    edge_to_bucket: HashMap<EdgeId, usize>,
}

/// Summary of the currently stored chains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainStatistics {
    pub compressed_edges: usize,
    pub total_entries: usize,
    pub longest_chain: usize,
    pub compression_ratio: f64,
    pub average_chain_length: f64,
}

impl ChainStatistics {
    pub fn report(&self) {
        report!("compressed_edges", self.compressed_edges);
        report!("compressed_geometries", self.total_entries);
        report!("longest_chain_length", self.longest_chain);
        report!("compression_ratio", self.compression_ratio);
        report!("average_chain_length", self.average_chain_length);
    }
}

impl ChainCompressor {
    pub fn new() -> Self {
        Self::default()
    }

    fn grow_free_list(&mut self) {
        let start = self.buckets.len();
        self.buckets.resize_with(start + FREE_LIST_GROWTH, Vec::new);
        self.free_list.extend(start..start + FREE_LIST_GROWTH);
    }

    fn take_free_bucket(&mut self) -> usize {
        if self.free_list.is_empty() {
            self.grow_free_list();
        }
        match self.free_list.pop() {
            Some(bucket) => bucket,
            None => unreachable!("free list was just grown"),
        }
    }

    pub fn has_entry_for_id(&self, edge: EdgeId) -> bool {
        self.edge_to_bucket.contains_key(&edge)
    }

    /// Bucket index of an edge, which is also its position in the flattened offset table.
    pub fn get_position_for_id(&self, edge: EdgeId) -> usize {
        match self.edge_to_bucket.get(&edge) {
            Some(&bucket) => bucket,
            None => panic!("edge {} has no chain", edge),
        }
    }

    pub fn get_bucket_reference(&self, edge: EdgeId) -> &[CompressedNode] {
        &self.buckets[self.get_position_for_id(edge)]
    }

    /// Second entry of the chain of `edge`.
    pub fn get_first_node_id_of_bucket(&self, edge: EdgeId) -> NodeId {
        let bucket = self.get_bucket_reference(edge);
        assert!(bucket.len() >= 2, "chain of edge {} too short", edge);
        bucket[1].node
    }

    /// Second to last entry of the chain of `edge`.
    pub fn get_last_node_id_of_bucket(&self, edge: EdgeId) -> NodeId {
        let bucket = self.get_bucket_reference(edge);
        assert!(bucket.len() >= 2, "chain of edge {} too short", edge);
        bucket[bucket.len() - 2].node
    }

    /// Record that `removed_edge` (`via -> target`, weight `second_weight`) was merged into
    /// `surviving_edge` (ending at `via`, weight `first_weight`).
    pub fn compress_edge(&mut self, surviving_edge: EdgeId, removed_edge: EdgeId, via: NodeId, target: NodeId, first_weight: Weight, second_weight: Weight) {
        assert_ne!(surviving_edge, removed_edge);
        assert!(via != INVALID_NODE && target != INVALID_NODE);
        assert!(first_weight < INFINITY && second_weight < INFINITY);

        let surviving_bucket = match self.edge_to_bucket.get(&surviving_edge) {
            Some(&bucket) => bucket,
            None => {
                let bucket = self.take_free_bucket();
                self.edge_to_bucket.insert(surviving_edge, bucket);
                bucket
            }
        };

        if self.buckets[surviving_bucket].is_empty() {
            self.buckets[surviving_bucket].push(CompressedNode { node: via, weight: first_weight });
        }

        if let Some(removed_bucket) = self.edge_to_bucket.remove(&removed_edge) {
            let mut spliced = std::mem::take(&mut self.buckets[removed_bucket]);
            self.buckets[surviving_bucket].append(&mut spliced);
            // keep the allocation around for the next chain
            self.buckets[removed_bucket] = spliced;
            self.free_list.push(removed_bucket);
        } else {
            self.buckets[surviving_bucket].push(CompressedNode {
                node: target,
                weight: second_weight,
            });
        }
    }

    pub fn statistics(&self) -> ChainStatistics {
        let compressed_edges = self.edge_to_bucket.len();
        let total_entries: usize = self.buckets.iter().map(Vec::len).sum();
        let longest_chain = self.buckets.iter().map(Vec::len).max().unwrap_or(0);
        ChainStatistics {
            compressed_edges,
            total_entries,
            longest_chain,
            compression_ratio: compressed_edges as f64 / total_entries.max(1) as f64,
            average_chain_length: total_entries as f64 / compressed_edges.max(1) as f64,
        }
    }

    /// Flatten all buckets, including the currently unused ones, so positions stay valid.
    pub fn flatten(&self) -> ChainGeometry {
        let mut offsets = Vec::with_capacity(self.buckets.len() + 1);
        let mut node_ids = Vec::with_capacity(self.buckets.iter().map(Vec::len).sum());
        offsets.push(0);
        for bucket in &self.buckets {
            node_ids.extend(bucket.iter().map(|entry| entry.node));
            offsets.push(node_ids.len() as u32);
        }
        ChainGeometry { offsets, node_ids }
    }

    /// Write `[offset count][offsets, including the sentinel][entry count][node ids]` as little endian `u32`s.
    pub fn serialize_into<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.flatten().serialize_into(writer)
    }
}

impl Deconstruct for ChainCompressor {
    fn store_each(&self, store: &dyn Fn(&str, &dyn Store) -> std::io::Result<()>) -> std::io::Result<()> {
        self.flatten().store_each(store)
    }
}

/// Read only, flattened chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainGeometry {
    offsets: Vec<u32>,
    node_ids: Vec<NodeId>,
}

impl ChainGeometry {
    pub fn num_buckets(&self) -> usize {
        self.offsets.len() - 1
    }

    fn range(&self, position: usize) -> Range<usize> {
        self.offsets[position] as usize..self.offsets[position + 1] as usize
    }

    /// Node ids of the chain at `position` (see `ChainCompressor::get_position_for_id`).
    pub fn bucket(&self, position: usize) -> &[NodeId] {
        &self.node_ids[self.range(position)]
    }

    pub fn serialize_into<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        write_u32_sequence(writer, &self.offsets)?;
        write_u32_sequence(writer, &self.node_ids)
    }

    pub fn from_reader<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
        let offsets = read_u32_sequence(reader)?;
        let node_ids = read_u32_sequence(reader)?;
        Self::from_parts(offsets, node_ids)
    }

    fn from_parts(offsets: Vec<u32>, node_ids: Vec<NodeId>) -> std::io::Result<Self> {
        let consistent = offsets.first() == Some(&0)
            && offsets.last().map(|&last| last as usize) == Some(node_ids.len())
            && offsets.windows(2).all(|pair| pair[0] <= pair[1]);
        if !consistent {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "inconsistent chain offsets"));
        }
        Ok(ChainGeometry { offsets, node_ids })
    }
}

impl Deconstruct for ChainGeometry {
    fn store_each(&self, store: &dyn Fn(&str, &dyn Store) -> std::io::Result<()>) -> std::io::Result<()> {
        store("chain_offsets", &self.offsets)?;
        store("chain_node_ids", &self.node_ids)?;
        Ok(())
    }
}

impl Reconstruct for ChainGeometry {
    fn reconstruct_with(loader: Loader) -> std::io::Result<Self> {
        Self::from_parts(loader.load("chain_offsets")?, loader.load("chain_node_ids")?)
    }
}
