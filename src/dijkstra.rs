//! Weighted witness search
//!
//! Plain Dijkstra on the scalarized cost `cost · config`, extended with
//! what the contraction loop needs: the full cost vector of the best
//! route, the number of co-optimal paths (identical cost vectors, not
//! just equal scalar projections), and a lazy enumerator over them.
//!
//! Among scalar-equal candidates the representative cost vector is the
//! lexicographically smallest, so results do not depend on heap order.

use crate::cost::{Config, Cost};
use crate::graph::{EdgeId, Graph, NodePos};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Best route plus the co-optimal path count at its cost vector.
#[derive(Debug, Clone)]
pub struct Route {
    pub cost: Cost,
    pub edges: Vec<EdgeId>,
    pub path_count: u64,
}

#[derive(Debug)]
struct SearchState {
    dist: f64,
    pos: NodePos,
}

impl PartialEq for SearchState {
    fn eq(&self, other: &Self) -> bool {
        self.dist == other.dist
    }
}

impl Eq for SearchState {}

impl PartialOrd for SearchState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchState {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: reverse ordering
        other
            .dist
            .partial_cmp(&self.dist)
            .unwrap_or(Ordering::Equal)
    }
}

#[derive(Debug, Clone, Copy)]
struct Pred {
    from: NodePos,
    edge: EdgeId,
    edge_cost: Cost,
}

/// Reusable single-source search over one graph snapshot. One instance
/// per worker thread; arrays are generation-stamped so consecutive
/// searches skip the clear.
pub struct WitnessSearch<'g> {
    graph: &'g Graph,
    generation: u32,
    stamp: Vec<u32>,
    dist: Vec<f64>,
    cost: Vec<Cost>,
    count: Vec<u64>,
    preds: Vec<Vec<Pred>>,
    heap: BinaryHeap<SearchState>,
    src: NodePos,
    dst: NodePos,
}

impl<'g> WitnessSearch<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        let n = graph.node_count();
        WitnessSearch {
            graph,
            generation: 0,
            stamp: vec![0; n],
            dist: vec![0.0; n],
            cost: vec![Cost::zero(); n],
            count: vec![0; n],
            preds: vec![Vec::new(); n],
            heap: BinaryHeap::new(),
            src: NodePos(0),
            dst: NodePos(0),
        }
    }

    fn touched(&self, pos: NodePos) -> bool {
        self.stamp[pos.index()] == self.generation
    }

    fn touch(&mut self, pos: NodePos) {
        let p = pos.index();
        if self.stamp[p] != self.generation {
            self.stamp[p] = self.generation;
            self.dist[p] = f64::INFINITY;
            self.cost[p] = Cost::zero();
            self.count[p] = 0;
            self.preds[p].clear();
        }
    }

    /// Shortest route from `src` to `dst` under `config`, or None when
    /// `dst` is unreachable. Unreachability under one weighting implies
    /// unreachability under all of them (costs are non-negative), so the
    /// caller may treat None as final.
    pub fn find_best_route(&mut self, src: NodePos, dst: NodePos, config: &Config) -> Option<Route> {
        self.generation += 1;
        self.heap.clear();
        self.src = src;
        self.dst = dst;

        self.touch(src);
        self.dist[src.index()] = 0.0;
        self.count[src.index()] = 1;
        self.heap.push(SearchState {
            dist: 0.0,
            pos: src,
        });

        while let Some(SearchState { dist, pos }) = self.heap.pop() {
            if dist > self.dist[pos.index()] {
                continue;
            }
            // Everything still queued is worse than the target; ties may
            // still extend co-optimal paths, so only a strict excess stops.
            if self.touched(dst) && dist > self.dist[dst.index()] {
                break;
            }

            let graph = self.graph;
            for &half in graph.out_edges(pos) {
                let next_dist = dist + half.cost.dot(config);
                let next_cost = self.cost[pos.index()] + half.cost;
                let v = half.end.index();

                self.touch(half.end);
                if next_dist < self.dist[v] {
                    self.dist[v] = next_dist;
                    self.cost[v] = next_cost;
                    self.count[v] = self.count[pos.index()];
                    self.preds[v].clear();
                    self.preds[v].push(Pred {
                        from: pos,
                        edge: half.id,
                        edge_cost: half.cost,
                    });
                    self.heap.push(SearchState {
                        dist: next_dist,
                        pos: half.end,
                    });
                } else if next_dist == self.dist[v] {
                    if next_cost == self.cost[v] {
                        let through = self.count[pos.index()];
                        self.count[v] += through;
                        self.preds[v].push(Pred {
                            from: pos,
                            edge: half.id,
                            edge_cost: half.cost,
                        });
                    } else if next_cost.lex_cmp(&self.cost[v]) == Ordering::Less {
                        self.cost[v] = next_cost;
                        self.count[v] = self.count[pos.index()];
                        self.preds[v].clear();
                        self.preds[v].push(Pred {
                            from: pos,
                            edge: half.id,
                            edge_cost: half.cost,
                        });
                        // Representative changed; re-expand to propagate.
                        self.heap.push(SearchState {
                            dist: next_dist,
                            pos: half.end,
                        });
                    }
                }
            }
        }

        if !self.touched(dst) {
            return None;
        }

        // Walk one predecessor chain back to the source.
        let mut edges = Vec::new();
        let mut at = dst;
        while at != src {
            let pred = self.preds[at.index()][0];
            edges.push(pred.edge);
            at = pred.from;
        }
        edges.reverse();

        Some(Route {
            cost: self.cost[dst.index()],
            edges,
            path_count: self.count[dst.index()],
        })
    }

    /// Lazy enumeration of every co-optimal route of the last search.
    pub fn route_iter(&self) -> RouteIter<'_, 'g> {
        RouteIter::new(self)
    }
}

/// Depth-first walk of the recorded predecessor DAG, yielding each simple
/// path whose cost vector equals the best route's. Consumers typically
/// stop early, so paths materialize one at a time.
pub struct RouteIter<'s, 'g> {
    search: &'s WitnessSearch<'g>,
    // One frame per node on the current partial path (dst-rooted).
    stack: Vec<Frame>,
    on_path: Vec<bool>,
    done: bool,
}

struct Frame {
    pos: NodePos,
    next_pred: usize,
}

impl<'s, 'g> RouteIter<'s, 'g> {
    fn new(search: &'s WitnessSearch<'g>) -> Self {
        let mut iter = RouteIter {
            search,
            stack: Vec::new(),
            on_path: vec![false; search.graph.node_count()],
            done: !search.touched(search.dst),
        };
        if !iter.done {
            iter.push_frame(search.dst);
        }
        iter
    }

    fn push_frame(&mut self, pos: NodePos) {
        self.on_path[pos.index()] = true;
        self.stack.push(Frame { pos, next_pred: 0 });
    }

    fn pop_frame(&mut self) {
        if let Some(frame) = self.stack.pop() {
            self.on_path[frame.pos.index()] = false;
        }
    }

    fn emit_current(&self) -> Route {
        // stack[i + 1] holds the predecessor chosen for stack[i]; walking
        // the frames from the source end back to dst yields path order.
        let edges = self
            .stack
            .windows(2)
            .rev()
            .map(|w| self.search.preds[w[0].pos.index()][w[0].next_pred - 1].edge)
            .collect();
        Route {
            cost: self.search.cost[self.search.dst.index()],
            edges,
            path_count: 1,
        }
    }
}

impl Iterator for RouteIter<'_, '_> {
    type Item = Route;

    fn next(&mut self) -> Option<Route> {
        if self.done {
            return None;
        }
        loop {
            let (pos, pred_idx) = match self.stack.last() {
                Some(frame) => (frame.pos, frame.next_pred),
                None => {
                    self.done = true;
                    return None;
                }
            };

            if pos == self.search.src {
                let route = self.emit_current();
                self.pop_frame();
                return Some(route);
            }

            let preds = &self.search.preds[pos.index()];
            if pred_idx >= preds.len() {
                self.pop_frame();
                continue;
            }
            let depth = self.stack.len();
            self.stack[depth - 1].next_pred += 1;

            let pred = preds[pred_idx];
            // Skip stale predecessors whose chain no longer sums to the
            // representative vector, and cycles through zero-cost edges.
            if self.on_path[pred.from.index()] {
                continue;
            }
            if self.search.cost[pred.from.index()] + pred.edge_cost
                != self.search.cost[pos.index()]
            {
                continue;
            }
            self.push_frame(pred.from);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeRegistry, Node, NodeId};

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

    #[test]
    fn test_best_route_tracks_cost_vector() {
        // 0 → 1 → 2 beats the direct 0 → 2 edge on distance.
        let (_, g) = build(
            &[
                (0, 1, cost(1.0, 0.0)),
                (1, 2, cost(1.0, 0.0)),
                (0, 2, cost(3.0, 0.0)),
            ],
            3,
        );
        let mut search = WitnessSearch::new(&g);
        let route = search
            .find_best_route(NodePos(0), NodePos(2), &Config::axis(0))
            .unwrap();
        assert_eq!(route.cost.values, [2.0, 0.0, 0.0]);
        assert_eq!(route.edges.len(), 2);
        assert_eq!(route.path_count, 1);
    }

    #[test]
    fn test_unreachable_is_none() {
        let (_, g) = build(&[(0, 1, cost(1.0, 0.0))], 3);
        let mut search = WitnessSearch::new(&g);
        assert!(search
            .find_best_route(NodePos(2), NodePos(0), &Config::uniform())
            .is_none());
    }

    #[test]
    fn test_counts_vector_equal_paths() {
        // Diamond: two distinct paths with identical cost vectors.
        let (_, g) = build(
            &[
                (0, 1, cost(1.0, 0.0)),
                (1, 3, cost(1.0, 0.0)),
                (0, 2, cost(1.0, 0.0)),
                (2, 3, cost(1.0, 0.0)),
            ],
            4,
        );
        let mut search = WitnessSearch::new(&g);
        let route = search
            .find_best_route(NodePos(0), NodePos(3), &Config::axis(0))
            .unwrap();
        assert_eq!(route.path_count, 2);

        let routes: Vec<Route> = search.route_iter().collect();
        assert_eq!(routes.len(), 2);
        for r in &routes {
            assert_eq!(r.cost.values, [2.0, 0.0, 0.0]);
            assert_eq!(r.edges.len(), 2);
        }
        assert_ne!(routes[0].edges, routes[1].edges);
    }

    #[test]
    fn test_scalar_tie_prefers_lex_smaller_vector() {
        // Both paths cost 2 under the distance axis, but differ on height.
        let (_, g) = build(
            &[
                (0, 1, cost(1.0, 0.0)),
                (1, 3, cost(1.0, 0.0)),
                (0, 2, cost(1.0, 5.0)),
                (2, 3, cost(1.0, 5.0)),
            ],
            4,
        );
        let mut search = WitnessSearch::new(&g);
        let route = search
            .find_best_route(NodePos(0), NodePos(3), &Config::axis(0))
            .unwrap();
        assert_eq!(route.cost.values, [2.0, 0.0, 0.0]);
        // The height-heavy twin is scalar-equal but not co-optimal.
        assert_eq!(route.path_count, 1);
    }

    #[test]
    fn test_search_state_reuse_across_queries() {
        let (_, g) = build(
            &[
                (0, 1, cost(1.0, 0.0)),
                (1, 2, cost(1.0, 0.0)),
                (2, 0, cost(1.0, 0.0)),
            ],
            3,
        );
        let mut search = WitnessSearch::new(&g);
        for _ in 0..3 {
            let route = search
                .find_best_route(NodePos(0), NodePos(2), &Config::uniform())
                .unwrap();
            assert_eq!(route.cost.values, [2.0, 0.0, 0.0]);
            let back = search
                .find_best_route(NodePos(2), NodePos(1), &Config::uniform())
                .unwrap();
            assert_eq!(back.cost.values, [2.0, 0.0, 0.0]);
        }
    }
}
