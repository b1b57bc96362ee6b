//! Algorithms on top of the data structures: the contraction itself,
//! queries on its result and a few helpers around it.

use crate::datastr::graph::*;

pub mod contraction_hierarchy;
pub mod dijkstra;
pub mod geometry_compression;

/// Simply a source-target pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Query {
    pub from: NodeId,
    pub to: NodeId,
}
