//! Contraction hierarchy preprocessing for large road networks.
//!
//! The heart of this crate is the `Contractor` in `algo::contraction_hierarchy`.
//! It eliminates nodes in rounds of independent sets chosen by a simulated contraction priority,
//! inserts shortcuts where local witness searches fail to find an alternative path
//! and streams the final edge set out in a form ready for an offset indexed query graph.
//! Everything else are the data structures it is built from and a few utilities around it.

#[macro_use]
pub mod report;

pub mod algo;
pub mod cli;
pub mod datastr;
pub mod io;

pub mod built_info {
    // The file has been placed there by the build script.
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}
