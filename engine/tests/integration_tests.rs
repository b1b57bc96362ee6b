use rand::prelude::*;
use rust_ch_contractor::{
    algo::{
        contraction_hierarchy::{query::Server, *},
        dijkstra::one_to_all,
        geometry_compression::*,
    },
    datastr::{
        chain_compressor::{ChainCompressor, ChainGeometry},
        graph::{dynamic_graph::GraphEdge, *},
    },
    io::*,
};

fn graph() -> OwnedGraph {
    // This is the directed graph we're going to use.
    // The node numbers correspond to the different states,
    // and the edge weights symbolize the cost of moving
    // from one node to another.
    // Note that the edges are one-way.
    //
    //                  7
    //          +-----------------+
    //          |                 |
    //          v   1        2    |  2
    //          0 -----> 1 -----> 3 ---> 4
    //          |        ^        ^      ^
    //          |        | 1      |      |
    //          |        |        | 3    | 1
    //          +------> 2 -------+      |
    //           10      |               |
    //                   +---------------+
    //
    OwnedGraph::new(
        vec![0,      2,  3,        6,    8, 8, 8],
        vec![2,  1,  3,  1, 3, 4,  0, 4],
        vec![10, 1,  2,  1, 3, 1,  7, 2])
}

fn input_edges(graph: &OwnedGraph) -> Vec<InputEdge> {
    graph
        .arcs()
        .enumerate()
        .map(|(edge_id, (source, target, weight))| InputEdge {
            source,
            target,
            weight,
            edge_id: edge_id as EdgeId,
            forward: true,
            backward: false,
        })
        .collect()
}

fn contract(graph: &OwnedGraph, params: ContractorParams) -> Server {
    let mut contractor = Contractor::with_params(graph.num_nodes(), input_edges(graph), params);
    contractor.run();
    assert_eq!(contractor.state(), ContractorState::Done);
    Server::from_edges(graph.num_nodes(), contractor.into_edges())
}

fn random_graph(num_nodes: usize, num_arcs: usize, seed: u64) -> OwnedGraph {
    let mut rng = StdRng::seed_from_u64(seed);
    let arcs: Vec<_> = (0..num_arcs)
        .map(|_| {
            (
                rng.gen_range(0..num_nodes as NodeId),
                rng.gen_range(0..num_nodes as NodeId),
                rng.gen_range(1..100),
            )
        })
        .collect();
    OwnedGraph::from_arcs(num_nodes, arcs)
}

// Weight of the cheapest arc between each pair of consecutive nodes.
fn path_weight(graph: &OwnedGraph, path: &[NodeId]) -> Weight {
    path.windows(2)
        .map(|hop| {
            graph
                .link_iter(hop[0])
                .filter(|link| link.node == hop[1])
                .map(|link| link.weight)
                .min()
                .unwrap_or_else(|| panic!("no arc from {} to {}", hop[0], hop[1]))
        })
        .sum()
}

fn assert_matches_dijkstra(graph: &OwnedGraph, server: &mut Server, sources: impl Iterator<Item = NodeId>) {
    for from in sources {
        let distances = one_to_all(graph, from);
        for to in 0..graph.num_nodes() as NodeId {
            let expected = Some(distances[to as usize]).filter(|&distance| distance < INFINITY);
            assert_eq!(server.distance(from, to), expected, "distance from {} to {}", from, to);

            let path = server.path(from, to);
            assert_eq!(path.is_some(), expected.is_some());
            if let (Some(path), Some(distance)) = (path, expected) {
                assert_eq!(path.first(), Some(&from));
                assert_eq!(path.last(), Some(&to));
                assert_eq!(path_weight(graph, &path), distance, "path {:?}", path);
            }
        }
    }
}

#[test]
fn ch_correct_distances() {
    let mut server = contract(&graph(), ContractorParams::default());

    assert_eq!(server.distance(0, 1), Some(1));
    assert_eq!(server.distance(0, 3), Some(3));
    assert_eq!(server.distance(3, 0), Some(7));
    assert_eq!(server.distance(0, 4), Some(5));
    assert_eq!(server.distance(4, 0), None);
    assert_eq!(server.distance(5, 0), None);
    assert_eq!(server.path(0, 4), Some(vec![0, 1, 3, 4]));
}

#[test]
fn path_graph_unpacks_to_all_intermediate_nodes() {
    let edges = (0..3)
        .map(|node| InputEdge {
            source: node,
            target: node + 1,
            weight: 1,
            edge_id: node,
            forward: true,
            backward: true,
        })
        .collect::<Vec<_>>();
    let mut contractor = Contractor::new(4, edges);
    contractor.run();
    let mut server = Server::from_edges(4, contractor.into_edges());

    assert_eq!(server.distance(0, 3), Some(3));
    assert_eq!(server.distance(3, 0), Some(3));
    let path = server.path(0, 3).unwrap();
    assert_eq!(&path[1..path.len() - 1], &[1, 2]);
    assert_eq!(server.path(3, 0), Some(vec![3, 2, 1, 0]));
}

#[test]
fn parallel_input_edges_collapse_to_cheapest() {
    let edges = vec![
        InputEdge {
            source: 0,
            target: 1,
            weight: 5,
            edge_id: 0,
            forward: true,
            backward: false,
        },
        InputEdge {
            source: 0,
            target: 1,
            weight: 3,
            edge_id: 1,
            forward: true,
            backward: false,
        },
        InputEdge {
            source: 1,
            target: 2,
            weight: 1,
            edge_id: 2,
            forward: true,
            backward: false,
        },
    ];
    let contractor = Contractor::new(3, edges);
    let stored: Vec<_> = contractor.graph().edges().filter(|edge| edge.source == 0).collect();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].target, 1);
    assert_eq!(stored[0].data.distance, 3);
    assert!(stored[0].data.forward() && !stored[0].data.backward());

    let mut contractor = contractor;
    contractor.run();
    let mut server = Server::from_edges(3, contractor.into_edges());
    assert_eq!(server.distance(0, 2), Some(4));
    assert_eq!(server.distance(2, 0), None);
}

#[test]
fn sinks_contract_without_shortcuts() {
    // star with all edges pointing into the center
    let edges = (1..6)
        .map(|node| InputEdge {
            source: node,
            target: 0,
            weight: node,
            edge_id: node,
            forward: true,
            backward: false,
        })
        .collect::<Vec<_>>();
    let mut contractor = Contractor::new(6, edges);
    contractor.compute_priorities();
    assert_eq!(contractor.priorities()[0], 0.0);
    contractor.run();
    let edges = contractor.into_edges();
    assert!(edges.iter().all(|edge| !edge.data.is_shortcut()));
    let mut server = Server::from_edges(6, edges);
    assert_eq!(server.distance(3, 0), Some(3));
    assert_eq!(server.distance(3, 4), None);
}

#[test]
fn random_graphs_match_dijkstra() {
    for seed in 0..4 {
        let graph = random_graph(150, 450, seed);
        let mut server = contract(&graph, ContractorParams::default());
        assert_matches_dijkstra(&graph, &mut server, (0..150).step_by(7));
    }
}

#[test]
fn random_graphs_match_dijkstra_with_early_flush_and_tiny_witness_searches() {
    let params = ContractorParams {
        flush_threshold: 0.3,
        simulation_witness_node_limit: 3,
        contraction_witness_node_limit: 5,
        ..ContractorParams::default()
    };
    for seed in 10..14 {
        let graph = random_graph(120, 400, seed);
        let mut server = contract(&graph, params);
        assert_matches_dijkstra(&graph, &mut server, (0..120).step_by(5));
    }
}

#[test]
fn bidirectional_input_matches_dijkstra() {
    let mut rng = StdRng::seed_from_u64(1234);
    let num_nodes = 100;
    let segments: Vec<(NodeId, NodeId, Weight)> = (0..250)
        .map(|_| (rng.gen_range(0..num_nodes), rng.gen_range(0..num_nodes), rng.gen_range(1..50)))
        .collect();
    let graph = OwnedGraph::from_arcs(
        num_nodes as usize,
        segments.iter().flat_map(|&(u, v, w)| vec![(u, v, w), (v, u, w)]),
    );
    let edges = segments
        .iter()
        .enumerate()
        .map(|(edge_id, &(source, target, weight))| InputEdge {
            source,
            target,
            weight,
            edge_id: edge_id as EdgeId,
            forward: true,
            backward: true,
        })
        .collect::<Vec<_>>();
    let mut contractor = Contractor::with_params(
        num_nodes as usize,
        edges,
        ContractorParams {
            flush_threshold: 0.5,
            ..ContractorParams::default()
        },
    );
    contractor.run();
    let mut server = Server::from_edges(num_nodes as usize, contractor.into_edges());
    assert_matches_dijkstra(&graph, &mut server, (0..num_nodes).step_by(9));
}

#[test]
fn contraction_is_deterministic() {
    let graph = random_graph(300, 1000, 99);
    let params = ContractorParams {
        flush_threshold: 0.4,
        ..ContractorParams::default()
    };
    let run = || {
        let mut contractor = Contractor::with_params(graph.num_nodes(), input_edges(&graph), params);
        contractor.run();
        let renumbering = contractor.node_renumbering();
        let mut edges = contractor.into_edges().into_vec();
        edges.sort();
        (renumbering, edges)
    };
    assert_eq!(run(), run());
}

#[test]
fn compressed_geometry_survives_serialization() {
    // 0 - 1 - 2 - 3 - 4, with a junction at 4
    let data = |distance| NodeBasedEdgeData {
        distance,
        name_id: 3,
        forward: true,
        backward: true,
        road_class: 1,
    };
    let mut edges = Vec::new();
    for &(u, v, w) in &[(0, 1, 4), (1, 2, 2), (2, 3, 5), (3, 4, 1), (4, 5, 1), (4, 6, 1)] {
        edges.push(GraphEdge { source: u, target: v, data: data(w) });
        edges.push(GraphEdge { source: v, target: u, data: data(w) });
    }
    let mut graph = node_based_graph(7, edges);
    let mut compressor = ChainCompressor::new();
    let stats = compress_geometry(&mut graph, |_| false, |_| 0, &mut compressor);
    assert_eq!(stats.removed_nodes, 3);

    let forward = graph.find_edge(0, 4).unwrap();
    let backward = graph.find_edge(4, 0).unwrap();
    assert_eq!(graph.edge_data(forward).distance, 12);
    assert_eq!(compressor.get_bucket_reference(forward).iter().map(|entry| entry.weight).sum::<Weight>(), 12);
    let expected_forward: Vec<NodeId> = compressor.get_bucket_reference(forward).iter().map(|entry| entry.node).collect();
    assert_eq!(expected_forward, vec![1, 2, 3, 4]);
    let expected_backward: Vec<NodeId> = compressor.get_bucket_reference(backward).iter().map(|entry| entry.node).collect();
    assert_eq!(expected_backward, vec![3, 2, 1, 0]);

    let dir = tempfile::tempdir().unwrap();
    compressor.deconstruct_to(&dir.path()).unwrap();
    let geometry = ChainGeometry::reconstruct_from(&dir.path()).unwrap();
    assert_eq!(geometry.bucket(compressor.get_position_for_id(forward)), &expected_forward[..]);
    assert_eq!(geometry.bucket(compressor.get_position_for_id(backward)), &expected_backward[..]);
}
