//! Canonical pattern graph handed to the join planner.
//!
//! Vertices and edges live in arenas and are addressed by [`VertexIdx`] and
//! [`EdgeIdx`] handles. Each element also carries an *order id*: after
//! [`Pattern::reorder`] the order ids are a canonical labeling, so isomorphic
//! patterns agree on them regardless of how they were built. Order ids are the
//! only identity the planner and the side table use.

mod canonical;
mod element;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::debug;

pub use canonical::CanonicalCode;
pub use element::{
    EdgeIdx, EdgeTypes, ElementDetails, PathExpandRange, PatternDirection, PatternEdge,
    PatternVertex, VertexIdx, VertexTypes,
};

use crate::types::{BridgeError, PatternId, Result};

/// Default number of labelings compared by the canonical search.
pub const DEFAULT_SEARCH_LIMIT: usize = 4096;

/// Graph of typed vertices and edges.
#[derive(Clone, Debug)]
pub struct Pattern {
    id: PatternId,
    pub(crate) vertices: Vec<PatternVertex>,
    pub(crate) edges: Vec<PatternEdge>,
    incident: Vec<SmallVec<[EdgeIdx; 4]>>,
    vertex_orders: Vec<usize>,
    edge_orders: Vec<usize>,
}

impl Default for Pattern {
    fn default() -> Self {
        Self::new()
    }
}

impl Pattern {
    /// Creates an empty pattern with a fresh identifier.
    pub fn new() -> Self {
        Self {
            id: PatternId::next(),
            vertices: Vec::new(),
            edges: Vec::new(),
            incident: Vec::new(),
            vertex_orders: Vec::new(),
            edge_orders: Vec::new(),
        }
    }

    /// Creates a pattern holding only `vertex`.
    pub fn single(vertex: PatternVertex) -> Self {
        let mut pattern = Self::new();
        pattern.add_vertex(vertex);
        pattern
    }

    /// Globally unique identifier.
    pub fn id(&self) -> PatternId {
        self.id
    }

    /// Adds a vertex. Its order id is provisional until the next reorder.
    pub fn add_vertex(&mut self, vertex: PatternVertex) -> VertexIdx {
        let idx = VertexIdx(self.vertices.len());
        self.vertex_orders.push(self.vertices.len());
        self.vertices.push(vertex);
        self.incident.push(SmallVec::new());
        idx
    }

    /// Adds an edge between two existing vertices.
    ///
    /// A second edge between the same ordered `(src, dst)` pair is rejected,
    /// whatever its direction flag or types. An undirected edge also
    /// occupies the reversed pair. Endpoints must belong to this pattern.
    pub fn add_edge(&mut self, edge: PatternEdge) -> Result<EdgeIdx> {
        let n = self.vertices.len();
        if edge.src.0 >= n || edge.dst.0 >= n {
            return Err(BridgeError::DanglingEdge {
                edge: edge.id,
                pattern: self.id,
            });
        }
        let reversed = self
            .edge_between(edge.dst, edge.src)
            .filter(|e| edge.both || self.edges[e.0].both);
        if let Some(existing) = self.edge_between(edge.src, edge.dst).or(reversed) {
            return Err(BridgeError::DuplicateEdge {
                edge: self.edges[existing.0].id,
                src: self.vertices[edge.src.0].id,
                dst: self.vertices[edge.dst.0].id,
            });
        }
        let idx = EdgeIdx(self.edges.len());
        self.incident[edge.src.0].push(idx);
        if edge.dst != edge.src {
            self.incident[edge.dst.0].push(idx);
        }
        self.edge_orders.push(self.edges.len());
        self.edges.push(edge);
        Ok(idx)
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Vertex behind a handle.
    pub fn vertex(&self, idx: VertexIdx) -> &PatternVertex {
        &self.vertices[idx.0]
    }

    pub(crate) fn vertex_mut(&mut self, idx: VertexIdx) -> &mut PatternVertex {
        &mut self.vertices[idx.0]
    }

    /// Edge behind a handle.
    pub fn edge(&self, idx: EdgeIdx) -> &PatternEdge {
        &self.edges[idx.0]
    }

    /// Vertices in canonical order.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexIdx, &PatternVertex)> + '_ {
        canonical::by_order(&self.vertex_orders, VertexIdx)
            .into_iter()
            .map(move |idx| (idx, &self.vertices[idx.0]))
    }

    /// Edges in canonical order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeIdx, &PatternEdge)> + '_ {
        canonical::by_order(&self.edge_orders, EdgeIdx)
            .into_iter()
            .map(move |idx| (idx, &self.edges[idx.0]))
    }

    /// Edges touching `v`, in insertion order.
    pub fn edges_of(&self, v: VertexIdx) -> &[EdgeIdx] {
        &self.incident[v.0]
    }

    /// The edge from `src` to `dst`, if any.
    pub fn edge_between(&self, src: VertexIdx, dst: VertexIdx) -> Option<EdgeIdx> {
        self.incident
            .get(src.0)?
            .iter()
            .copied()
            .find(|e| self.edges[e.0].src == src && self.edges[e.0].dst == dst)
    }

    /// Order id of a vertex.
    pub fn vertex_order(&self, v: VertexIdx) -> usize {
        self.vertex_orders[v.0]
    }

    /// Order id of an edge.
    pub fn edge_order(&self, e: EdgeIdx) -> usize {
        self.edge_orders[e.0]
    }

    /// Vertex holding order id `order`.
    pub fn vertex_by_order(&self, order: usize) -> Option<VertexIdx> {
        self.vertex_orders
            .iter()
            .position(|o| *o == order)
            .map(VertexIdx)
    }

    /// Like [`Pattern::vertex_by_order`], failing with [`BridgeError::UnknownOrder`].
    pub fn require_vertex(&self, order: usize) -> Result<VertexIdx> {
        self.vertex_by_order(order)
            .ok_or(BridgeError::UnknownOrder {
                pattern: self.id,
                order,
            })
    }

    /// Vertex created with id `id`.
    pub fn vertex_by_id(&self, id: usize) -> Option<VertexIdx> {
        self.vertices.iter().position(|v| v.id == id).map(VertexIdx)
    }

    /// Edge created with id `id`.
    pub fn edge_by_id(&self, id: usize) -> Option<EdgeIdx> {
        self.edges.iter().position(|e| e.id == id).map(EdgeIdx)
    }

    /// Assigns canonical order ids to every vertex and edge.
    ///
    /// Reordering a canonical pattern yields the same assignment.
    pub fn reorder(&mut self, search_limit: usize) {
        let labeling = canonical::canonical_labeling(self, search_limit);
        self.vertex_orders = labeling.vertex_order;
        self.edge_orders = labeling.edge_order;
        debug!(
            pattern = %self.id,
            vertices = self.vertices.len(),
            edges = self.edges.len(),
            "bridge.canonical.reorder"
        );
    }

    /// Structural code shared by all patterns isomorphic to this one.
    pub fn canonical_code(&self) -> CanonicalCode {
        canonical::canonical_labeling(self, DEFAULT_SEARCH_LIMIT).code
    }

    /// 64-bit digest of [`Pattern::canonical_code`]; usable as a cache key.
    pub fn canonical_hash(&self) -> u64 {
        self.canonical_code().digest()
    }

    /// Whether every vertex is reachable from every other, ignoring direction.
    pub fn is_connected(&self) -> bool {
        if self.vertices.is_empty() {
            return true;
        }
        let mut seen = vec![false; self.vertices.len()];
        let mut stack = vec![0usize];
        seen[0] = true;
        while let Some(v) = stack.pop() {
            for e in &self.incident[v] {
                if let Some(other) = self.edges[e.0].other(VertexIdx(v)) {
                    if !seen[other.0] {
                        seen[other.0] = true;
                        stack.push(other.0);
                    }
                }
            }
        }
        seen.into_iter().all(|s| s)
    }

    /// Copy of the pattern restricted to `keep` and the edges among them.
    ///
    /// Creation ids survive, so the result can be mapped back by id. The copy
    /// gets a fresh pattern id and is canonicalized with `search_limit`.
    pub fn induced(&self, keep: &[VertexIdx], search_limit: usize) -> Result<Pattern> {
        let mut sub = Pattern::new();
        let mut remap = vec![None; self.vertices.len()];
        for v in keep {
            if remap[v.0].is_none() {
                remap[v.0] = Some(sub.add_vertex(self.vertices[v.0].clone()));
            }
        }
        for edge in &self.edges {
            if let (Some(src), Some(dst)) = (remap[edge.src.0], remap[edge.dst.0]) {
                let mut copy = edge.clone();
                copy.src = src;
                copy.dst = dst;
                sub.add_edge(copy)?;
            }
        }
        sub.reorder(search_limit);
        Ok(sub)
    }
}

/// Translation of vertex order ids from one pattern into another.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderMapping {
    pairs: BTreeMap<usize, usize>,
}

impl OrderMapping {
    /// Records that `from` corresponds to `to`.
    pub fn insert(&mut self, from: usize, to: usize) {
        self.pairs.insert(from, to);
    }

    /// Image of `from`, if mapped.
    pub fn get(&self, from: usize) -> Option<usize> {
        self.pairs.get(&from).copied()
    }

    /// Pairs in ascending source order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.pairs.iter().map(|(from, to)| (*from, *to))
    }

    /// Number of mapped order ids.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Builds the mapping between two patterns sharing creation ids.
    pub fn by_vertex_id(from: &Pattern, to: &Pattern) -> Self {
        from.vertices()
            .filter_map(|(idx, vertex)| {
                let other = to.vertex_by_id(vertex.id)?;
                Some((from.vertex_order(idx), to.vertex_order(other)))
            })
            .collect()
    }
}

impl FromIterator<(usize, usize)> for OrderMapping {
    fn from_iter<I: IntoIterator<Item = (usize, usize)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "pattern {}", self.id)?;
        for (idx, vertex) in self.vertices() {
            let types: Vec<String> = vertex.type_ids().iter().map(|t| t.to_string()).collect();
            write!(
                f,
                "  v{} id={} types=[{}] sel={:.4}",
                self.vertex_order(idx),
                vertex.id,
                types.join(","),
                vertex.details.selectivity
            )?;
            if vertex.details.optional {
                write!(f, " optional")?;
            }
            writeln!(f)?;
        }
        for (idx, edge) in self.edges() {
            let types: Vec<String> = edge.type_ids().iter().map(|t| t.to_string()).collect();
            write!(
                f,
                "  e{} id={} v{} -> v{} {} types=[{}] sel={:.4}",
                self.edge_order(idx),
                edge.id,
                self.vertex_order(edge.src),
                self.vertex_order(edge.dst),
                edge.direction(),
                types.join(","),
                edge.details.selectivity
            )?;
            if let Some(range) = edge.details.range {
                write!(f, " range={range}")?;
            }
            if edge.details.optional {
                write!(f, " optional")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
