//! Graph snapshot and edge registry
//!
//! The contractor works on immutable per-level snapshots: node list plus
//! CSR half-edge adjacency indexed by dense `NodePos`. All edges,
//! original and shortcut, live in a single append-only `EdgeRegistry`
//! owned by the caller; `EdgeId`s are indices into it.

use crate::cost::Cost;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Stable node handle, preserved across contraction levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Index into the process-wide edge registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

/// Dense per-snapshot node index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodePos(pub u32);

impl NodePos {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// 0 while uncontracted; set once when the node leaves the residual graph.
    pub level: u32,
}

impl Node {
    pub fn new(id: NodeId) -> Self {
        Node { id, level: 0 }
    }

    pub fn assign_level(&mut self, level: u32) {
        debug_assert_eq!(self.level, 0, "level assigned twice for node {:?}", self.id);
        self.level = level;
    }
}

/// A directed edge. Shortcuts remember the two edges they bypass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Edge {
    pub src: NodeId,
    pub dst: NodeId,
    pub cost: Cost,
    pub children: Option<(EdgeId, EdgeId)>,
}

impl Edge {
    pub fn new(src: NodeId, dst: NodeId, cost: Cost) -> Self {
        Edge {
            src,
            dst,
            cost,
            children: None,
        }
    }

    /// Build the shortcut that replaces the two-hop path e1 → e2.
    pub fn shortcut(id1: EdgeId, e1: &Edge, id2: EdgeId, e2: &Edge) -> Result<Edge> {
        if e1.dst != e2.src {
            bail!(
                "edges {:?} and {:?} are not connected ({:?} != {:?})",
                id1,
                id2,
                e1.dst,
                e2.src
            );
        }
        Ok(Edge {
            src: e1.src,
            dst: e2.dst,
            cost: e1.cost + e2.cost,
            children: Some((id1, id2)),
        })
    }

    pub fn is_shortcut(&self) -> bool {
        self.children.is_some()
    }
}

/// Append-only edge store. Ids are assigned densely in administration
/// order and stay valid for the life of the contraction run.
#[derive(Debug, Default)]
pub struct EdgeRegistry {
    edges: Vec<Edge>,
}

impl EdgeRegistry {
    pub fn new() -> Self {
        EdgeRegistry::default()
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn all_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        (0..self.edges.len() as u32).map(EdgeId)
    }

    pub fn add_edge(&mut self, src: NodeId, dst: NodeId, cost: Cost) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Edge::new(src, dst, cost));
        id
    }

    /// Append a batch of edges (shortcuts between levels) and hand back
    /// their assigned ids.
    pub fn administer_edges(&mut self, batch: Vec<Edge>) -> Vec<EdgeId> {
        let first = self.edges.len() as u32;
        let ids = (first..first + batch.len() as u32).map(EdgeId).collect();
        self.edges.extend(batch);
        ids
    }
}

/// Edge as seen from one of its endpoints. For an outgoing view `begin`
/// is the tail, for an incoming view the head, so around a contracted
/// node every in/out pair satisfies `incoming.begin == outgoing.begin`.
#[derive(Debug, Clone, Copy)]
pub struct HalfEdge {
    pub begin: NodePos,
    pub end: NodePos,
    pub id: EdgeId,
    pub cost: Cost,
}

/// One (incoming, outgoing) edge pair around a contraction candidate.
#[derive(Debug, Clone, Copy)]
pub struct EdgePair {
    pub incoming: HalfEdge,
    pub outgoing: HalfEdge,
}

#[derive(Serialize, Deserialize)]
struct SerializableGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

/// Immutable per-level snapshot: nodes plus CSR half-edge adjacency.
/// Edges whose endpoints are not both present are skipped at build time,
/// so a residual graph can be constructed straight from surviving node
/// and edge id lists.
#[derive(Debug)]
pub struct Graph {
    nodes: Vec<Node>,
    edge_ids: Vec<EdgeId>,
    pos_of: HashMap<NodeId, NodePos>,
    out_offsets: Vec<u32>,
    out_edges: Vec<HalfEdge>,
    in_offsets: Vec<u32>,
    in_edges: Vec<HalfEdge>,
}

impl Graph {
    pub fn new(nodes: Vec<Node>, edge_ids: Vec<EdgeId>, registry: &EdgeRegistry) -> Graph {
        let n = nodes.len();
        let mut pos_of: HashMap<NodeId, NodePos> = HashMap::with_capacity(n);
        for (i, node) in nodes.iter().enumerate() {
            pos_of.insert(node.id, NodePos(i as u32));
        }

        // Keep only edges with both endpoints in this snapshot.
        let mut kept: Vec<(EdgeId, NodePos, NodePos, Cost)> = Vec::with_capacity(edge_ids.len());
        for &id in &edge_ids {
            let e = registry.edge(id);
            if let (Some(&src), Some(&dst)) = (pos_of.get(&e.src), pos_of.get(&e.dst)) {
                kept.push((id, src, dst, e.cost));
            }
        }

        // Count-then-fill CSR, one pass per direction.
        let mut out_counts = vec![0u32; n];
        let mut in_counts = vec![0u32; n];
        for &(_, src, dst, _) in &kept {
            out_counts[src.index()] += 1;
            in_counts[dst.index()] += 1;
        }

        let mut out_offsets = Vec::with_capacity(n + 1);
        let mut offset = 0u32;
        for &c in &out_counts {
            out_offsets.push(offset);
            offset += c;
        }
        out_offsets.push(offset);

        let mut in_offsets = Vec::with_capacity(n + 1);
        let mut offset = 0u32;
        for &c in &in_counts {
            in_offsets.push(offset);
            offset += c;
        }
        in_offsets.push(offset);

        let placeholder = HalfEdge {
            begin: NodePos(0),
            end: NodePos(0),
            id: EdgeId(0),
            cost: Cost::zero(),
        };
        let mut out_edges = vec![placeholder; kept.len()];
        let mut in_edges = vec![placeholder; kept.len()];
        let mut out_pos: Vec<usize> = out_offsets[..n].iter().map(|&o| o as usize).collect();
        let mut in_pos: Vec<usize> = in_offsets[..n].iter().map(|&o| o as usize).collect();

        for &(id, src, dst, cost) in &kept {
            out_edges[out_pos[src.index()]] = HalfEdge {
                begin: src,
                end: dst,
                id,
                cost,
            };
            out_pos[src.index()] += 1;
            in_edges[in_pos[dst.index()]] = HalfEdge {
                begin: dst,
                end: src,
                id,
                cost,
            };
            in_pos[dst.index()] += 1;
        }

        let edge_ids = kept.iter().map(|&(id, ..)| id).collect();

        Graph {
            nodes,
            edge_ids,
            pos_of,
            out_offsets,
            out_edges,
            in_offsets,
            in_edges,
        }
    }

    pub fn node_pos(&self, id: NodeId) -> Option<NodePos> {
        self.pos_of.get(&id).copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_ids.len()
    }

    pub fn node(&self, pos: NodePos) -> &Node {
        &self.nodes[pos.index()]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edge_ids(&self) -> &[EdgeId] {
        &self.edge_ids
    }

    pub fn out_edges(&self, pos: NodePos) -> &[HalfEdge] {
        let p = pos.index();
        &self.out_edges[self.out_offsets[p] as usize..self.out_offsets[p + 1] as usize]
    }

    pub fn in_edges(&self, pos: NodePos) -> &[HalfEdge] {
        let p = pos.index();
        &self.in_edges[self.in_offsets[p] as usize..self.in_offsets[p + 1] as usize]
    }

    /// Persist this snapshot together with every edge in the registry, so
    /// shortcut children stay resolvable after a reload.
    pub fn save<P: AsRef<Path>>(&self, registry: &EdgeRegistry, path: P) -> Result<()> {
        let serializable = SerializableGraph {
            nodes: self.nodes.clone(),
            edges: registry.edges.clone(),
        };
        let file = File::create(path).context("failed to create graph file")?;
        let writer = BufWriter::new(file);
        bincode::serialize_into(writer, &serializable).context("failed to serialize graph")?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<(EdgeRegistry, Graph)> {
        let file = File::open(path).context("failed to open graph file")?;
        let reader = BufReader::new(file);
        let serializable: SerializableGraph =
            bincode::deserialize_from(reader).context("failed to deserialize graph")?;

        let registry = EdgeRegistry {
            edges: serializable.edges,
        };
        let edge_ids = registry.all_ids().collect();
        let graph = Graph::new(serializable.nodes, edge_ids, &registry);
        Ok((registry, graph))
    }
}
