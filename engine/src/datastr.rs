//! Data structures used by algorithms.

pub mod binary_heap;
pub mod chain_compressor;
pub mod graph;
pub mod segmented_vector;
pub mod tabulation_hash;
