//! Level-by-level contraction driver
//!
//! Each level picks a reduced independent set, fans every (incoming,
//! outgoing) edge pair of its nodes out to the contracting workers,
//! dedupes the returned shortcuts and promotes them into the residual
//! graph for the next level. Contracted nodes and their incident edges
//! move into a side history from which the final hierarchy is assembled.

use crate::graph::{Edge, EdgeId, EdgePair, EdgeRegistry, Graph, Node, NodePos};
use crate::independent_set::{independent_set, reduce};
use crate::lp::SeparationLp;
use crate::queue::WorkQueue;
use crate::stats::StatisticsCollector;
use crate::worker::ContractingWorker;
use anyhow::{anyhow, bail, Result};
use std::collections::BTreeSet;
use std::thread;
use std::time::Instant;

/// Pairs per producer batch, scaled by worker count.
const BATCH_PER_THREAD: usize = 30;

pub struct Contractor {
    print_statistics: bool,
    thread_count: usize,
    level: u32,
    lps: Vec<SeparationLp>,
    contracted_nodes: Vec<Node>,
    contracted_edges: Vec<EdgeId>,
}

impl Contractor {
    pub fn new(print_statistics: bool) -> Self {
        let threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Contractor::with_threads(print_statistics, threads)
    }

    pub fn with_threads(print_statistics: bool, max_threads: usize) -> Self {
        let thread_count = max_threads.max(1);
        Contractor {
            print_statistics,
            thread_count,
            level: 0,
            lps: (0..thread_count).map(|_| SeparationLp::new()).collect(),
            contracted_nodes: Vec::new(),
            contracted_edges: Vec::new(),
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Contract one level: pick the node set, then run `contract_level`.
    pub fn contract(&mut self, registry: &mut EdgeRegistry, g: &Graph) -> Result<Graph> {
        let set = reduce(&independent_set(g), g);
        self.contract_level(registry, g, &set)
    }

    /// Contract exactly the given independent set out of `g` and return
    /// the residual graph. The set must be pairwise non-adjacent; pair
    /// enumeration and worker invariants check the rest.
    pub fn contract_level(
        &mut self,
        registry: &mut EdgeRegistry,
        g: &Graph,
        set: &BTreeSet<NodePos>,
    ) -> Result<Graph> {
        let start = Instant::now();
        self.level += 1;
        let level = self.level;

        // Split the snapshot: survivors keep their edges between
        // survivors; contracted nodes and their incident edges go into
        // the side history.
        let mut nodes: Vec<Node> = Vec::with_capacity(g.node_count() - set.len());
        let mut edges: Vec<EdgeId> = Vec::new();
        let mut nodes_to_contract: Vec<NodePos> = Vec::with_capacity(set.len());

        for i in 0..g.node_count() as u32 {
            let pos = NodePos(i);
            if !set.contains(&pos) {
                nodes.push(*g.node(pos));
                for half in g.out_edges(pos) {
                    if !set.contains(&half.end) {
                        edges.push(half.id);
                    }
                }
            } else {
                nodes_to_contract.push(pos);

                let mut node = *g.node(pos);
                node.assign_level(level);
                self.contracted_nodes.push(node);
                for half in g.out_edges(pos) {
                    self.contracted_edges.push(half.id);
                }
                for half in g.in_edges(pos) {
                    self.contracted_edges.push(half.id);
                }
            }
        }

        let batch_size = self.thread_count * BATCH_PER_THREAD;
        let queue: WorkQueue<EdgePair> = WorkQueue::bounded(batch_size);
        let print_statistics = self.print_statistics;
        let registry_ref: &EdgeRegistry = registry;

        let mut shortcuts = thread::scope(|scope| -> Result<Vec<Edge>> {
            let mut handles = Vec::with_capacity(self.lps.len());
            for lp in self.lps.iter_mut() {
                let queue = &queue;
                handles.push(scope.spawn(move || {
                    ContractingWorker::new(queue, g, registry_ref, set, lp, print_statistics)
                        .run()
                }));
            }

            // Single producer; close the queue even when enumeration
            // fails so the workers can drain and exit.
            let produced = (|| -> Result<usize> {
                let mut pairs: Vec<EdgePair> = Vec::with_capacity(batch_size);
                let mut pair_count = 0usize;
                for &pos in &nodes_to_contract {
                    for &incoming in g.in_edges(pos) {
                        for &outgoing in g.out_edges(pos) {
                            if incoming.end == outgoing.end {
                                continue;
                            }
                            if incoming.begin != outgoing.begin {
                                bail!("enumerated pair does not share its node");
                            }
                            pairs.push(EdgePair { incoming, outgoing });
                            pair_count += 1;
                            if pairs.len() >= batch_size {
                                queue.send(&pairs)?;
                                pairs.clear();
                            }
                        }
                    }
                }
                queue.send(&pairs)?;
                Ok(pair_count)
            })();
            queue.close();

            if print_statistics {
                if let Ok(count) = &produced {
                    println!("{count} edge pairs to contract");
                }
                StatisticsCollector::print_header();
            }

            let mut shortcuts = Vec::new();
            for handle in handles {
                let worker_shortcuts = handle
                    .join()
                    .map_err(|_| anyhow!("contracting worker panicked"))??;
                shortcuts.extend(worker_shortcuts);
            }
            produced?;
            Ok(shortcuts)
        })?;

        // Different contracted nodes can produce equal shortcuts between
        // the same endpoints; keep one per (src, dst, ~cost).
        shortcuts.sort_by(|a, b| {
            a.src
                .cmp(&b.src)
                .then(a.dst.cmp(&b.dst))
                .then(a.cost.lex_cmp(&b.cost))
        });
        let before = shortcuts.len();
        shortcuts.dedup_by(|a, b| a.src == b.src && a.dst == b.dst && a.cost.approx_eq(&b.cost));
        println!("  ✓ erased {} duplicate shortcuts", before - shortcuts.len());
        println!("  ✓ created {} shortcuts", shortcuts.len());

        let ids = registry.administer_edges(shortcuts);
        edges.extend(ids);

        println!(
            "Contraction step completed in {:.2}s",
            start.elapsed().as_secs_f64()
        );

        Ok(Graph::new(nodes, edges, registry))
    }

    /// Iterate levels until at most `rest` percent of the original nodes
    /// remain uncontracted, then assemble the full hierarchy.
    pub fn contract_completely(
        &mut self,
        registry: &mut EdgeRegistry,
        g: &Graph,
        rest: f64,
    ) -> Result<Graph> {
        let initial_nodes = g.node_count();

        let mut intermediate = self.contract(registry, g)?;
        let mut uncontracted = percent(intermediate.node_count(), initial_nodes);
        println!(
            "{}% of the graph is contracted ({} nodes left)",
            100.0 - uncontracted,
            intermediate.node_count()
        );

        while uncontracted > rest {
            intermediate = self.contract(registry, &intermediate)?;
            uncontracted = percent(intermediate.node_count(), initial_nodes);
            println!(
                "Edges so far: {}",
                intermediate.edge_count() + self.contracted_edges.len()
            );
            println!(
                "{}% of the graph is contracted ({} nodes left)",
                100.0 - uncontracted,
                intermediate.node_count()
            );
        }

        Ok(self.merge_with_contracted(registry, &intermediate))
    }

    /// Concatenate the contracted history with the residual core (which
    /// gets the topmost level) over the complete edge set.
    pub fn merge_with_contracted(&mut self, registry: &EdgeRegistry, g: &Graph) -> Graph {
        self.level += 1;

        let mut nodes = std::mem::take(&mut self.contracted_nodes);
        nodes.reserve(g.node_count());
        for node in g.nodes() {
            let mut node = *node;
            node.assign_level(self.level);
            nodes.push(node);
        }
        self.contracted_edges = Vec::new();

        let edges: Vec<EdgeId> = registry.all_ids().collect();
        println!(
            "Final graph has {} nodes and {} edges",
            nodes.len(),
            edges.len()
        );

        Graph::new(nodes, edges, registry)
    }
}

fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 * 10_000.0 / total as f64).round() / 100.0
}
