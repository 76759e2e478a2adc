//! Pareto-CH: multi-criteria contraction hierarchy preprocessor
//!
//! Pipeline:
//! - Independent set: pick a cheap, pairwise non-adjacent node set per level
//! - Pair fan-out: batch every (incoming, outgoing) pair of those nodes to workers
//! - LP separation: witness searches and the separation LP decide each pair
//! - Promotion: dedupe the emitted shortcuts into the residual graph
//! - Merge: assemble contracted history + core into the final hierarchy
//!
//! Edges carry a fixed-arity cost vector; a shortcut is emitted exactly
//! when some convex weighting of the criteria makes its pair a
//! Pareto-optimal shortest path that the level would otherwise destroy.

pub mod contractor;
pub mod cost;
pub mod dijkstra;
pub mod graph;
pub mod independent_set;
pub mod lp;
pub mod queue;
pub mod stats;
pub mod worker;

pub use contractor::Contractor;
pub use cost::{Config, Cost, COST_ACCURACY, DIM};
pub use dijkstra::{Route, WitnessSearch};
pub use graph::{Edge, EdgeId, EdgePair, EdgeRegistry, Graph, HalfEdge, Node, NodeId, NodePos};
pub use lp::SeparationLp;
pub use queue::WorkQueue;
