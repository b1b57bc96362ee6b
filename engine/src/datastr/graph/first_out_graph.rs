//! Static graph representation for input data and reference searches.
//!
//! Nodes and edges can be identified by a unique id, going from `0` to `n-1` and `m-1` respectively, where `n` is the number of nodes and `m` the number of directed arcs.
//! We store the graph as an adjacency array using three collections: `first_out`, `head` and `weight`.
//! `head` and `weight` have each `m` elements.
//! `first_out` has `n+1` elements.
//! The first element of `first_out` is always 0 and the last one `m`.
//! `first_out[x]` contains the id of the first edge that is an outgoing edge of node `x`.
//! Thus, `head[first_out[x]..first_out[x+1]]` contains all neighbors of `x`.

use super::*;
use crate::io::*;

/// Container struct for the three collections of a graph.
/// Generic over the types of the three data collections.
/// Anything that can be viewed as a slice works, owned (`Vec<T>`, `Box<[T]>`) or borrowed.
#[derive(Debug, Clone)]
pub struct FirstOutGraph<FirstOutContainer, HeadContainer, WeightContainer> {
    // index of first edge of each node +1 entry in the end
    first_out: FirstOutContainer,
    // the node ids to which each edge points
    head: HeadContainer,
    // the weight of each edge
    weight: WeightContainer,
}

pub type OwnedGraph = FirstOutGraph<Vec<EdgeId>, Vec<NodeId>, Vec<Weight>>;

impl<FirstOutContainer, HeadContainer, WeightContainer> FirstOutGraph<FirstOutContainer, HeadContainer, WeightContainer>
where
    FirstOutContainer: AsRef<[EdgeId]>,
    HeadContainer: AsRef<[NodeId]>,
    WeightContainer: AsRef<[Weight]>,
{
    /// Create a new `FirstOutGraph` from the three containers.
    pub fn new(first_out: FirstOutContainer, head: HeadContainer, weight: WeightContainer) -> Self {
        assert!(first_out.as_ref().len() < NodeId::MAX as usize);
        assert!(head.as_ref().len() < EdgeId::MAX as usize);
        assert_eq!(first_out.as_ref().first().copied(), Some(0));
        assert_eq!(first_out.as_ref().last().map(|&m| m as usize), Some(head.as_ref().len()));
        assert_eq!(weight.as_ref().len(), head.as_ref().len());

        FirstOutGraph { first_out, head, weight }
    }

    /// Borrow a slice of the first_out data
    pub fn first_out(&self) -> &[EdgeId] {
        self.first_out.as_ref()
    }
    /// Borrow a slice of the head data
    pub fn head(&self) -> &[NodeId] {
        self.head.as_ref()
    }
    /// Borrow a slice of the weight data
    pub fn weight(&self) -> &[Weight] {
        self.weight.as_ref()
    }

    /// Decompose the graph into its three seperate data containers
    pub fn decompose(self) -> (FirstOutContainer, HeadContainer, WeightContainer) {
        (self.first_out, self.head, self.weight)
    }

    /// Iterate over all arcs as `(tail, head, weight)` triples, ordered by tail.
    pub fn arcs(&self) -> impl Iterator<Item = (NodeId, NodeId, Weight)> + '_ {
        (0..self.num_nodes() as NodeId).flat_map(move |node| self.link_iter(node).map(move |Link { node: head, weight }| (node, head, weight)))
    }
}

impl OwnedGraph {
    /// Build a graph from one adjacency list per node.
    pub fn from_adjacency_lists(adjacency_lists: Vec<Vec<Link>>) -> OwnedGraph {
        // create first_out array by doing a prefix sum over the adjacency list sizes
        let first_out = degrees_to_first_out(adjacency_lists.iter().map(|neighbors| neighbors.len() as EdgeId)).collect();

        // append all adjacency list and split the pairs into two seperate vectors
        let (head, weight) = adjacency_lists
            .into_iter()
            .flat_map(|neighbors| neighbors.into_iter().map(|Link { node, weight }| (node, weight)))
            .unzip();

        OwnedGraph::new(first_out, head, weight)
    }

    /// Build a graph with `n` nodes from an unordered list of `(tail, head, weight)` arcs.
    pub fn from_arcs(n: usize, arcs: impl IntoIterator<Item = (NodeId, NodeId, Weight)>) -> OwnedGraph {
        let mut adjacency_lists = vec![Vec::new(); n];
        for (tail, head, weight) in arcs {
            adjacency_lists[tail as usize].push(Link { node: head, weight });
        }
        Self::from_adjacency_lists(adjacency_lists)
    }
}

impl<FirstOutContainer, HeadContainer, WeightContainer> Graph for FirstOutGraph<FirstOutContainer, HeadContainer, WeightContainer>
where
    FirstOutContainer: AsRef<[EdgeId]>,
    HeadContainer: AsRef<[NodeId]>,
    WeightContainer: AsRef<[Weight]>,
{
    fn num_nodes(&self) -> usize {
        self.first_out().len() - 1
    }

    fn num_arcs(&self) -> usize {
        self.head().len()
    }

    fn degree(&self, node: NodeId) -> usize {
        let node = node as usize;
        (self.first_out()[node + 1] - self.first_out()[node]) as usize
    }
}

impl<FirstOutContainer, HeadContainer, WeightContainer> LinkIterable<Link> for FirstOutGraph<FirstOutContainer, HeadContainer, WeightContainer>
where
    FirstOutContainer: AsRef<[EdgeId]>,
    HeadContainer: AsRef<[NodeId]>,
    WeightContainer: AsRef<[Weight]>,
{
    #[allow(clippy::type_complexity)]
    type Iter<'a> = std::iter::Map<std::iter::Zip<std::slice::Iter<'a, NodeId>, std::slice::Iter<'a, Weight>>, fn((&NodeId, &Weight)) -> Link> where Self: 'a;

    #[inline]
    fn link_iter(&self, node: NodeId) -> Self::Iter<'_> {
        let range = self.first_out()[node as usize] as usize..self.first_out()[node as usize + 1] as usize;
        self.head()[range.clone()]
            .iter()
            .zip(self.weight()[range].iter())
            .map(to_link as fn((&NodeId, &Weight)) -> Link)
    }
}

fn to_link((&node, &weight): (&NodeId, &Weight)) -> Link {
    Link { node, weight }
}

impl<FirstOutContainer, HeadContainer, WeightContainer> Deconstruct for FirstOutGraph<FirstOutContainer, HeadContainer, WeightContainer>
where
    FirstOutContainer: AsRef<[EdgeId]>,
    HeadContainer: AsRef<[NodeId]>,
    WeightContainer: AsRef<[Weight]>,
{
    fn store_each(&self, store: &dyn Fn(&str, &dyn Store) -> std::io::Result<()>) -> std::io::Result<()> {
        store("first_out", &self.first_out())?;
        store("head", &self.head())?;
        store("weight", &self.weight())?;
        Ok(())
    }
}

impl Reconstruct for OwnedGraph {
    fn reconstruct_with(loader: Loader) -> std::io::Result<Self> {
        let g = OwnedGraph::new(loader.load("first_out")?, loader.load("head")?, loader.load("weight")?);
        eprintln!("graph with {} nodes and {} arcs loaded", g.num_nodes(), g.num_arcs());
        Ok(g)
    }
}
