// Contraction hierarchy preprocessing.
// Takes a directory as argument, which has to contain a graph in RoutingKit format (`first_out`, `head`, `weight`),
// and optionally the number of threads to use.
// Writes the hierarchy as an offset indexed graph into the same directory.

#[macro_use]
extern crate rust_ch_contractor;

use std::{env, error::Error, path::Path};

use rand::prelude::*;
use rust_ch_contractor::{
    algo::{
        contraction_hierarchy::{query::Server, *},
        dijkstra, Query,
    },
    cli::{parse_optional_arg, CliErr},
    datastr::graph::*,
    io::*,
    report::*,
};

const NUM_VALIDATION_QUERIES: usize = 100;

fn main() -> Result<(), Box<dyn Error>> {
    let _reporter = enable_reporting("ch_preprocessing");

    let mut args = env::args().skip(1);
    let arg = &args.next().ok_or(CliErr("No directory arg given"))?;
    let path = Path::new(arg);
    if let Some(num_threads) = parse_optional_arg::<usize>(args.next(), "Invalid thread count")? {
        rayon::ThreadPoolBuilder::new().num_threads(num_threads).build_global()?;
    }

    let graph = OwnedGraph::reconstruct_from(&path)?;
    report!("graph", { "num_nodes": graph.num_nodes(), "num_arcs": graph.num_arcs() });

    let input_edges = graph.arcs().enumerate().map(|(edge_id, (source, target, weight))| InputEdge {
        source,
        target,
        weight,
        edge_id: edge_id as EdgeId,
        forward: true,
        backward: false,
    });

    let contractor = {
        let _ctxt = push_context("contraction".to_string());
        let mut contractor = report_time("building contraction graph", || Contractor::new(graph.num_nodes(), input_edges));
        report_time("contraction", || contractor.run());
        contractor
    };

    contractor.node_renumbering().write_to(&path.join("ch_node_renumbering"))?;
    let mut server = report_time("building query graph", || Server::from_edges(graph.num_nodes(), contractor.into_edges()));

    let ch = server.graph();
    report!("ch_graph", { "num_nodes": ch.num_nodes(), "num_arcs": ch.num_arcs() });
    ch.first_out().write_to(&path.join("ch_first_out"))?;
    ch.head().write_to(&path.join("ch_head"))?;
    ch.data().iter().map(|data| data.distance).collect::<Vec<Weight>>().write_to(&path.join("ch_weight"))?;
    ch.data().iter().map(|data| data.id).collect::<Vec<NodeId>>().write_to(&path.join("ch_via"))?;
    ch.data().iter().map(|data| data.flags.bits()).collect::<Vec<u32>>().write_to(&path.join("ch_flags"))?;

    if graph.num_nodes() > 0 {
        let mut rng = StdRng::seed_from_u64(42);
        let mut mismatches = 0;
        for _ in 0..NUM_VALIDATION_QUERIES {
            let query = Query {
                from: rng.gen_range(0..graph.num_nodes() as NodeId),
                to: rng.gen_range(0..graph.num_nodes() as NodeId),
            };
            if server.distance(query.from, query.to) != dijkstra::distance(&graph, query) {
                eprintln!("distance mismatch for {:?}", query);
                mismatches += 1;
            }
        }
        report!("validation", { "num_queries": NUM_VALIDATION_QUERIES, "mismatches": mismatches });
    }

    Ok(())
}
