//! Contracting worker: the LP-separation loop
//!
//! For each (incoming, outgoing) edge pair around a contraction
//! candidate, decide whether some weighting makes the pair a
//! Pareto-optimal shortest path between its endpoints. Witness searches
//! and the separation LP take turns: every witness found becomes a
//! constraint, every LP solution becomes the next weighting to test,
//! until a witness settles the pair or the LP certifies that every
//! weighting has a strictly cheaper witness.

use crate::cost::{Config, Cost, COST_ACCURACY, DIM};
use crate::dijkstra::{Route, WitnessSearch};
use crate::graph::{Edge, EdgePair, EdgeRegistry, Graph, HalfEdge, NodePos};
use crate::lp::SeparationLp;
use crate::queue::WorkQueue;
use crate::stats::{ShortcutReason, StatisticsCollector};
use anyhow::{bail, Result};
use std::collections::BTreeSet;

/// Pairs drained from the queue per request.
const RECEIVE_BATCH: usize = 20;

pub struct ContractingWorker<'a> {
    queue: &'a WorkQueue<EdgePair>,
    graph: &'a Graph,
    registry: &'a EdgeRegistry,
    set: &'a BTreeSet<NodePos>,
    lp: &'a mut SeparationLp,
    search: WitnessSearch<'a>,
    stats: StatisticsCollector,
    config: Config,
    incoming: HalfEdge,
    outgoing: HalfEdge,
    last_endpoints: Option<(NodePos, NodePos)>,
    shortcut_cost: Cost,
    current_cost: Cost,
    constraints: Vec<Cost>,
    lp_count: usize,
    shortcuts: Vec<Edge>,
}

impl<'a> ContractingWorker<'a> {
    pub fn new(
        queue: &'a WorkQueue<EdgePair>,
        graph: &'a Graph,
        registry: &'a EdgeRegistry,
        set: &'a BTreeSet<NodePos>,
        lp: &'a mut SeparationLp,
        print_statistics: bool,
    ) -> Self {
        let placeholder = HalfEdge {
            begin: NodePos(0),
            end: NodePos(0),
            id: crate::graph::EdgeId(0),
            cost: Cost::zero(),
        };
        ContractingWorker {
            queue,
            graph,
            registry,
            set,
            lp,
            search: WitnessSearch::new(graph),
            stats: StatisticsCollector::new(print_statistics),
            config: Config::uniform(),
            incoming: placeholder,
            outgoing: placeholder,
            last_endpoints: None,
            shortcut_cost: Cost::zero(),
            current_cost: Cost::zero(),
            constraints: Vec::new(),
            lp_count: 0,
            shortcuts: Vec::new(),
        }
    }

    /// Drain the queue until it is closed and empty, then hand back the
    /// collected shortcuts.
    pub fn run(mut self) -> Result<Vec<Edge>> {
        let mut messages: Vec<EdgePair> = Vec::with_capacity(RECEIVE_BATCH);
        loop {
            messages.clear();
            if self.queue.receive_some(&mut messages, RECEIVE_BATCH) == 0 {
                return Ok(std::mem::take(&mut self.shortcuts));
            }
            for &pair in &messages {
                self.handle_pair(pair)?;
            }
        }
    }

    fn handle_pair(&mut self, pair: EdgePair) -> Result<()> {
        // Consecutive pairs with the same endpoints keep their witness
        // constraints and skip the axis probes.
        let warm = self.last_endpoints == Some((pair.incoming.end, pair.outgoing.end));
        if !warm {
            self.constraints.clear();
        }
        self.incoming = pair.incoming;
        self.outgoing = pair.outgoing;
        self.last_endpoints = Some((pair.incoming.end, pair.outgoing.end));

        if self.incoming.begin != self.outgoing.begin {
            bail!("edge pair does not share a contracted node");
        }
        let in_edge = self.registry.edge(self.incoming.id);
        let out_edge = self.registry.edge(self.outgoing.id);
        if in_edge.dst != out_edge.src {
            bail!("edges of a pair do not connect");
        }

        self.config = Config::uniform();
        self.shortcut_cost = self.incoming.cost + self.outgoing.cost;
        self.lp.reset();

        if !warm {
            for i in 0..DIM {
                if self.test_config(&Config::axis(i))? {
                    return Ok(());
                }
            }
        }

        self.lp_count = 0;
        loop {
            let config = self.config;
            if self.test_config(&config)? {
                return Ok(());
            }

            self.dedup_constraints();
            self.lp.reset();
            for c in &self.constraints {
                self.lp.add_constraint(*c - self.shortcut_cost);
            }

            self.lp_count += 1;
            let solved = match self.lp.solve() {
                // Infeasible: some known witness is strictly cheaper
                // under every admissible weighting.
                None => {
                    self.stats
                        .record_max_values(self.lp_count, self.constraints.len());
                    return Ok(());
                }
                Some(config) => config,
            };

            if solved == self.config {
                if self.current_cost.dot(&self.config)
                    >= self.shortcut_cost.dot(&self.config) - COST_ACCURACY
                {
                    self.store_shortcut(ShortcutReason::RepeatingConfig)?;
                } else {
                    self.store_shortcut(ShortcutReason::UnknownReason)?;
                }
                return Ok(());
            }
            self.config = solved;
        }
    }

    /// Run one witness search under `config`. Returns true when the pair
    /// is decided (shortcut stored or witness proves it dominated).
    fn test_config(&mut self, config: &Config) -> Result<bool> {
        let route = match self
            .search
            .find_best_route(self.incoming.end, self.outgoing.end, config)
        {
            Some(route) if !route.edges.is_empty() => route,
            // No witness route at all: nothing left to do for the pair.
            _ => {
                self.stats
                    .record_max_values(self.lp_count, self.constraints.len());
                return Ok(true);
            }
        };

        self.current_cost = route.cost;
        self.constraints.push(route.cost);

        if route.cost == self.shortcut_cost {
            // Co-optimal with the shortcut. The pair is only redundant if
            // a co-optimal witness other than the pair itself avoids the
            // independent set: that witness survives the level intact.
            if route.path_count == 1 || !self.surviving_witness_exists(&route) {
                self.store_shortcut(ShortcutReason::ShortestPath)?;
            }
            return Ok(true);
        }

        if route.cost.dominates(&self.shortcut_cost) {
            return Ok(true);
        }
        Ok(false)
    }

    /// Enumerates co-optimal routes lazily and stops at the first one
    /// that is not the pair itself and touches no independent-set node.
    fn surviving_witness_exists(&self, best: &Route) -> bool {
        debug_assert_eq!(best.cost, self.shortcut_cost);
        for route in self.search.route_iter() {
            if route.edges.len() == 2
                && route.edges[0] == self.incoming.id
                && route.edges[1] == self.outgoing.id
            {
                continue;
            }
            if !self.route_touches_set(&route) {
                return true;
            }
        }
        false
    }

    fn route_touches_set(&self, route: &Route) -> bool {
        // Intermediate nodes are the heads of all edges but the last.
        route
            .edges
            .iter()
            .take(route.edges.len().saturating_sub(1))
            .any(|&id| {
                let dst = self.registry.edge(id).dst;
                self.graph
                    .node_pos(dst)
                    .map_or(false, |pos| self.set.contains(&pos))
            })
    }

    fn dedup_constraints(&mut self) {
        self.constraints.sort_by(|a, b| a.lex_cmp(b));
        self.constraints.dedup_by(|a, b| a.values == b.values);
    }

    fn store_shortcut(&mut self, reason: ShortcutReason) -> Result<()> {
        self.stats.count_shortcut(reason);
        self.stats
            .record_max_values(self.lp_count, self.constraints.len());
        let shortcut = Edge::shortcut(
            self.incoming.id,
            self.registry.edge(self.incoming.id),
            self.outgoing.id,
            self.registry.edge(self.outgoing.id),
        )?;
        self.shortcuts.push(shortcut);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, NodeId};

    fn cost(a: f64, b: f64) -> Cost {
        Cost::new([a, b, 0.0])
    }

    fn build(edges: &[(u32, u32, Cost)], node_count: u32) -> (EdgeRegistry, Graph) {
        let mut registry = EdgeRegistry::new();
        for &(src, dst, c) in edges {
            registry.add_edge(NodeId(src), NodeId(dst), c);
        }
        let nodes = (0..node_count).map(|i| Node::new(NodeId(i))).collect();
        let ids = registry.all_ids().collect();
        let graph = Graph::new(nodes, ids, &registry);
        (registry, graph)
    }

    /// Pair around `via` built from the graph's own half-edge views.
    fn pair_through(g: &Graph, via: NodePos, from: NodePos, to: NodePos) -> EdgePair {
        let incoming = *g
            .in_edges(via)
            .iter()
            .find(|h| h.end == from)
            .expect("incoming edge");
        let outgoing = *g
            .out_edges(via)
            .iter()
            .find(|h| h.end == to)
            .expect("outgoing edge");
        EdgePair { incoming, outgoing }
    }

    fn run_pair(
        registry: &EdgeRegistry,
        graph: &Graph,
        set: &BTreeSet<NodePos>,
        pair: EdgePair,
    ) -> Vec<Edge> {
        let queue = WorkQueue::bounded(1);
        let mut lp = SeparationLp::new();
        let mut worker = ContractingWorker::new(&queue, graph, registry, set, &mut lp, false);
        worker.handle_pair(pair).unwrap();
        worker.shortcuts
    }

    #[test]
    fn test_unique_shortest_pair_emits_shortcut() {
        // Triangle: the pair is the only best path, direct edge is worse.
        let (registry, g) = build(
            &[
                (0, 1, cost(1.0, 0.0)),
                (1, 2, cost(1.0, 0.0)),
                (0, 2, cost(3.0, 0.0)),
            ],
            3,
        );
        let set: BTreeSet<NodePos> = [NodePos(1)].into_iter().collect();
        let pair = pair_through(&g, NodePos(1), NodePos(0), NodePos(2));
        let shortcuts = run_pair(&registry, &g, &set, pair);
        assert_eq!(shortcuts.len(), 1);
        let s = &shortcuts[0];
        assert_eq!(s.src, NodeId(0));
        assert_eq!(s.dst, NodeId(2));
        assert_eq!(s.cost.values, [2.0, 0.0, 0.0]);
        assert!(s.is_shortcut());
    }

    #[test]
    fn test_dominating_direct_edge_discards_pair() {
        let (registry, g) = build(
            &[
                (0, 1, cost(1.0, 0.0)),
                (1, 2, cost(1.0, 0.0)),
                (0, 2, cost(1.0, 0.0)),
            ],
            3,
        );
        let set: BTreeSet<NodePos> = [NodePos(1)].into_iter().collect();
        let pair = pair_through(&g, NodePos(1), NodePos(0), NodePos(2));
        assert!(run_pair(&registry, &g, &set, pair).is_empty());
    }

    #[test]
    fn test_co_optimal_twin_outside_set_suppresses_shortcut() {
        // Second two-hop path through node 3, which is not being
        // contracted, covers 0 → 2 at the same cost vector.
        let (registry, g) = build(
            &[
                (0, 1, cost(1.0, 0.0)),
                (1, 2, cost(1.0, 0.0)),
                (0, 3, cost(1.0, 0.0)),
                (3, 2, cost(1.0, 0.0)),
            ],
            4,
        );
        let set: BTreeSet<NodePos> = [NodePos(1)].into_iter().collect();
        let pair = pair_through(&g, NodePos(1), NodePos(0), NodePos(2));
        assert!(run_pair(&registry, &g, &set, pair).is_empty());
    }

    #[test]
    fn test_co_optimal_twin_inside_set_still_emits() {
        // The twin witness runs through a node that is itself being
        // contracted, so it cannot be relied on next level.
        let (registry, g) = build(
            &[
                (0, 1, cost(1.0, 0.0)),
                (1, 2, cost(1.0, 0.0)),
                (0, 3, cost(1.0, 0.0)),
                (3, 2, cost(1.0, 0.0)),
            ],
            4,
        );
        let set: BTreeSet<NodePos> = [NodePos(1), NodePos(3)].into_iter().collect();
        let pair = pair_through(&g, NodePos(1), NodePos(0), NodePos(2));
        let shortcuts = run_pair(&registry, &g, &set, pair);
        assert_eq!(shortcuts.len(), 1);
    }

    #[test]
    fn test_criterion_tradeoff_emits_shortcut() {
        // Neither the height-cheap detour nor the pair dominates the
        // other; the pair is Pareto-necessary.
        let (registry, g) = build(
            &[
                (0, 1, cost(1.0, 0.0)),
                (1, 2, cost(1.0, 0.0)),
                (0, 3, cost(0.0, 1.0)),
                (3, 2, cost(0.0, 1.0)),
            ],
            4,
        );
        let set: BTreeSet<NodePos> = [NodePos(1)].into_iter().collect();
        let pair = pair_through(&g, NodePos(1), NodePos(0), NodePos(2));
        let shortcuts = run_pair(&registry, &g, &set, pair);
        assert_eq!(shortcuts.len(), 1);
        assert_eq!(shortcuts[0].cost.values, [2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_lp_infeasible_pair_is_discarded() {
        // Two witnesses that do not dominate componentwise but leave no
        // weighting under which the pair is best: witness costs
        // (1,3,1) and (4,0,1) against shortcut cost (3,2,2).
        let (registry, g) = build(
            &[
                (0, 1, Cost::new([1.0, 1.0, 1.0])),
                (1, 2, Cost::new([2.0, 1.0, 1.0])),
                (0, 3, Cost::new([1.0, 2.0, 0.0])),
                (3, 2, Cost::new([0.0, 1.0, 1.0])),
                (0, 4, Cost::new([2.0, 0.0, 1.0])),
                (4, 2, Cost::new([2.0, 0.0, 0.0])),
            ],
            5,
        );
        let set: BTreeSet<NodePos> = [NodePos(1)].into_iter().collect();
        let pair = pair_through(&g, NodePos(1), NodePos(0), NodePos(2));
        assert!(run_pair(&registry, &g, &set, pair).is_empty());
    }

    #[test]
    fn test_lp_fixed_point_emits_repeating_config() {
        // Witnesses (3,0,0) and (0,3,0) against shortcut cost (2,2,0):
        // the LP settles on the untouched third criterion, where the
        // witness matches the shortcut exactly.
        let (registry, g) = build(
            &[
                (0, 1, Cost::new([1.0, 1.0, 0.0])),
                (1, 2, Cost::new([1.0, 1.0, 0.0])),
                (0, 3, Cost::new([2.0, 0.0, 0.0])),
                (3, 2, Cost::new([1.0, 0.0, 0.0])),
                (0, 4, Cost::new([0.0, 2.0, 0.0])),
                (4, 2, Cost::new([0.0, 1.0, 0.0])),
            ],
            5,
        );
        let set: BTreeSet<NodePos> = [NodePos(1)].into_iter().collect();
        let pair = pair_through(&g, NodePos(1), NodePos(0), NodePos(2));
        let shortcuts = run_pair(&registry, &g, &set, pair);
        assert_eq!(shortcuts.len(), 1);
        assert_eq!(shortcuts[0].cost.values, [2.0, 2.0, 0.0]);
    }

    #[test]
    fn test_malformed_pair_is_fatal() {
        let (registry, g) = build(
            &[
                (0, 1, cost(1.0, 0.0)),
                (1, 2, cost(1.0, 0.0)),
                (2, 0, cost(1.0, 0.0)),
            ],
            3,
        );
        let set: BTreeSet<NodePos> = [NodePos(1)].into_iter().collect();
        let incoming = g.in_edges(NodePos(1))[0];
        let outgoing = g.out_edges(NodePos(0))[0];
        let pair = EdgePair { incoming, outgoing };

        let queue = WorkQueue::bounded(1);
        let mut lp = SeparationLp::new();
        let mut worker = ContractingWorker::new(&queue, &g, &registry, &set, &mut lp, false);
        assert!(worker.handle_pair(pair).is_err());
    }
}
