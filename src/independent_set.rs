//! Independent-set selection
//!
//! Greedy heuristic over node scores `|in| * |out|`, the upper bound on
//! edge pairs the node's contraction can create. Sweeping in ascending
//! score order and knocking out neighbors yields a pairwise non-adjacent
//! set; the reduction then keeps only the cheapest quartile so the LP
//! work per level stays bounded.

use crate::graph::{Graph, NodePos};
use rayon::prelude::*;
use std::collections::BTreeSet;

fn score(g: &Graph, pos: NodePos) -> usize {
    g.in_edges(pos).len() * g.out_edges(pos).len()
}

pub fn independent_set(g: &Graph) -> BTreeSet<NodePos> {
    let n = g.node_count();
    let mut nodes: Vec<(usize, u32)> = (0..n as u32)
        .into_par_iter()
        .map(|i| (score(g, NodePos(i)), i))
        .collect();
    nodes.sort_unstable();

    let mut selected = vec![true; n];
    let mut set = BTreeSet::new();
    for &(_, i) in &nodes {
        let pos = NodePos(i);
        if selected[pos.index()] {
            for half in g.in_edges(pos) {
                selected[half.end.index()] = false;
            }
            for half in g.out_edges(pos) {
                selected[half.end.index()] = false;
            }
            set.insert(pos);
        }
    }
    println!("Greedy independent set: {} nodes", set.len());
    set
}

/// Keep the lowest-score quartile of the set (everything when the set is
/// smaller than four).
pub fn reduce(set: &BTreeSet<NodePos>, g: &Graph) -> BTreeSet<NodePos> {
    let mut metric: Vec<(usize, u32)> = set.iter().map(|&p| (score(g, p), p.0)).collect();

    let divider = 4;
    let keep = if metric.len() < divider {
        metric.len()
    } else {
        metric.len() / divider
    };
    metric.sort_unstable();
    metric.truncate(keep);

    let result: BTreeSet<NodePos> = metric.into_iter().map(|(_, i)| NodePos(i)).collect();
    println!("  ✓ reduced to {} nodes", result.len());
    result
}
