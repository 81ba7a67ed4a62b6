use crate::error::{Error, Result, check_prob};
use crate::random::RandomSource;
use serde::{Deserialize, Serialize};

/// Undirected simple contact graph.
///
/// Nodes are the indices `0..n_nodes`. Each node owns a sorted list of its
/// neighbors; an edge `{u, v}` appears in both lists and never as `u == v`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactGraph {
    adj_vec: Vec<Vec<usize>>,
}

impl ContactGraph {
    /// Create a graph with `n_nodes` nodes and no edges.
    pub fn empty(n_nodes: usize) -> Self {
        Self {
            adj_vec: vec![Vec::new(); n_nodes],
        }
    }

    /// Build an Erdős–Rényi graph: every unordered pair of distinct nodes is
    /// joined independently with probability `edge_prob`.
    pub fn erdos_renyi<R>(n_nodes: usize, edge_prob: f64, rng: &mut R) -> Result<Self>
    where
        R: RandomSource + ?Sized,
    {
        check_prob("edge probability", edge_prob)?;

        let mut graph = Self::empty(n_nodes);
        for u in 0..n_nodes {
            for v in (u + 1)..n_nodes {
                if rng.uniform() < edge_prob {
                    graph.adj_vec[u].push(v);
                    graph.adj_vec[v].push(u);
                }
            }
        }
        Ok(graph)
    }

    /// Add the edge `{u, v}`, ignoring self-loops and duplicates.
    pub fn add_edge(&mut self, u: usize, v: usize) -> Result<()> {
        let n_nodes = self.n_nodes();
        if u >= n_nodes || v >= n_nodes {
            return Err(Error::InvalidParameter(format!(
                "edge ({u}, {v}) references a node outside 0..{n_nodes}"
            )));
        }
        if u == v || self.has_edge(u, v) {
            return Ok(());
        }
        for (a, b) in [(u, v), (v, u)] {
            let adj = &mut self.adj_vec[a];
            let pos = adj.partition_point(|&x| x < b);
            adj.insert(pos, b);
        }
        Ok(())
    }

    pub fn n_nodes(&self) -> usize {
        self.adj_vec.len()
    }

    pub fn n_edges(&self) -> usize {
        self.adj_vec.iter().map(Vec::len).sum::<usize>() / 2
    }

    pub fn neighbors(&self, node: usize) -> &[usize] {
        &self.adj_vec[node]
    }

    pub fn degree(&self, node: usize) -> usize {
        self.adj_vec[node].len()
    }

    pub fn has_edge(&self, u: usize, v: usize) -> bool {
        self.adj_vec
            .get(u)
            .is_some_and(|adj| adj.binary_search(&v).is_ok())
    }

    /// Iterate over every edge once, as `(u, v)` with `u < v`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.adj_vec
            .iter()
            .enumerate()
            .flat_map(|(u, adj)| adj.iter().filter(move |&&v| u < v).map(move |&v| (u, v)))
    }
}
