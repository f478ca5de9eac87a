//! Canonical labeling ("reordering") of patterns.
//!
//! Vertices are colored by their signature, colors are refined by neighborhood
//! until stable, and remaining ties are broken by individualizing one vertex of
//! the first ambiguous cell and searching for the smallest canonical code.
//! Interchangeable twins inside a cell are explored once. The resulting order
//! depends only on labels, optional flags, ranges, and connectivity.

use std::hash::Hasher;

use rustc_hash::FxHashMap;
use tracing::trace;
use xxhash_rust::xxh64::Xxh64;

use super::Pattern;
use crate::types::{EdgeTypeId, LabelId};

/// Structural signature of a vertex.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VertexSig {
    types: Vec<LabelId>,
}

/// Structural signature of an edge.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct EdgeSig {
    types: Vec<EdgeTypeId>,
    both: bool,
    optional: bool,
    range: Option<(u32, u32)>,
    inner: Vec<LabelId>,
}

/// One edge of a canonical code: endpoint orders plus the edge signature.
/// Undirected edges list the smaller order first.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct EdgeCode {
    src: usize,
    dst: usize,
    sig: EdgeSig,
}

/// Order-independent description of a pattern's structure. Isomorphic patterns
/// have equal codes.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CanonicalCode {
    vertices: Vec<VertexSig>,
    edges: Vec<EdgeCode>,
}

impl CanonicalCode {
    /// Deterministic 64-bit digest of the code.
    pub fn digest(&self) -> u64 {
        let mut hasher = Xxh64::new(0);
        hasher.write_u64(self.vertices.len() as u64);
        for vertex in &self.vertices {
            hash_labels(&vertex.types, &mut hasher);
        }
        hasher.write_u64(self.edges.len() as u64);
        for edge in &self.edges {
            hasher.write_u64(edge.src as u64);
            hasher.write_u64(edge.dst as u64);
            hasher.write_u64(edge.sig.types.len() as u64);
            for ty in &edge.sig.types {
                hasher.write_u32(ty.edge_label.0);
                hasher.write_u32(ty.src_label.0);
                hasher.write_u32(ty.dst_label.0);
            }
            hasher.write_u8(edge.sig.both as u8);
            hasher.write_u8(edge.sig.optional as u8);
            match edge.sig.range {
                Some((offset, fetch)) => {
                    hasher.write_u8(1);
                    hasher.write_u32(offset);
                    hasher.write_u32(fetch);
                }
                None => hasher.write_u8(0),
            }
            hash_labels(&edge.sig.inner, &mut hasher);
        }
        hasher.finish()
    }
}

fn hash_labels(labels: &[LabelId], hasher: &mut Xxh64) {
    hasher.write_u64(labels.len() as u64);
    for label in labels {
        hasher.write_u32(label.0);
    }
}

/// Order assignment produced by [`canonical_labeling`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Labeling {
    pub(crate) vertex_order: Vec<usize>,
    pub(crate) edge_order: Vec<usize>,
    pub(crate) code: CanonicalCode,
}

// Neighbor entry: (direction tag, edge signature rank, neighbor).
type Incidence = (u8, u32, usize);

struct Search<'a> {
    pattern: &'a Pattern,
    vertex_sigs: Vec<VertexSig>,
    edge_sigs: Vec<EdgeSig>,
    edge_ranks: Vec<u32>,
    incidences: Vec<Vec<Incidence>>,
    best: Option<(CanonicalCode, Vec<u32>)>,
    leaves: usize,
    limit: usize,
}

/// Computes canonical vertex and edge orders for `pattern`.
///
/// At most `limit` complete labelings are compared; once the budget is spent
/// the best labeling seen so far is kept.
pub(crate) fn canonical_labeling(pattern: &Pattern, limit: usize) -> Labeling {
    let vertex_sigs: Vec<VertexSig> = pattern
        .vertices
        .iter()
        .map(|v| {
            let mut types = v.type_ids().to_vec();
            types.sort();
            VertexSig { types }
        })
        .collect();
    let edge_sigs: Vec<EdgeSig> = pattern
        .edges
        .iter()
        .map(|e| {
            let mut types = e.type_ids().to_vec();
            types.sort();
            let mut inner = e.details.inner_vertex_types.to_vec();
            inner.sort();
            EdgeSig {
                types,
                both: e.both,
                optional: e.details.optional,
                range: e.details.range.map(|r| (r.offset, r.fetch)),
                inner,
            }
        })
        .collect();
    let edge_ranks = dense_ranks(&edge_sigs);
    let initial = dense_ranks(&vertex_sigs);

    let mut incidences: Vec<Vec<Incidence>> = vec![Vec::new(); pattern.vertices.len()];
    for (idx, edge) in pattern.edges.iter().enumerate() {
        let rank = edge_ranks[idx];
        let (src, dst) = (edge.src.0, edge.dst.0);
        if src == dst {
            incidences[src].push((3, rank, src));
        } else if edge.both {
            incidences[src].push((2, rank, dst));
            incidences[dst].push((2, rank, src));
        } else {
            incidences[src].push((0, rank, dst));
            incidences[dst].push((1, rank, src));
        }
    }

    let mut search = Search {
        pattern,
        vertex_sigs,
        edge_sigs,
        edge_ranks,
        incidences,
        best: None,
        leaves: 0,
        limit: limit.max(1),
    };
    search.explore(initial);
    let (code, colors) = match search.best.take() {
        Some(best) => best,
        // Only reachable for an empty pattern.
        None => (
            CanonicalCode {
                vertices: Vec::new(),
                edges: Vec::new(),
            },
            Vec::new(),
        ),
    };
    trace!(
        pattern = %pattern.id(),
        leaves = search.leaves,
        "bridge.canonical.labeling"
    );
    let vertex_order: Vec<usize> = colors.iter().map(|c| *c as usize).collect();
    let edge_order = search.edge_order(&vertex_order);
    Labeling {
        vertex_order,
        edge_order,
        code,
    }
}

impl Search<'_> {
    fn explore(&mut self, colors: Vec<u32>) {
        let colors = self.refine(colors);
        let Some(cell) = first_ambiguous_cell(&colors) else {
            self.leaves += 1;
            let code = self.encode(&colors);
            let better = match &self.best {
                Some((best, _)) => code < *best,
                None => true,
            };
            if better {
                self.best = Some((code, colors));
            }
            return;
        };
        let members: Vec<usize> = (0..colors.len()).filter(|v| colors[*v] == cell).collect();
        for v in self.twin_representatives(&members) {
            if self.leaves >= self.limit && self.best.is_some() {
                break;
            }
            let individualized = colors
                .iter()
                .enumerate()
                .map(|(u, c)| if u == v { c * 2 } else { c * 2 + 1 })
                .collect();
            self.explore(individualized);
        }
    }

    fn refine(&self, mut colors: Vec<u32>) -> Vec<u32> {
        let mut classes = count_classes(&colors);
        loop {
            let keys: Vec<(u32, Vec<(u8, u32, u32)>)> = (0..colors.len())
                .map(|v| {
                    let mut around: Vec<(u8, u32, u32)> = self.incidences[v]
                        .iter()
                        .map(|(dir, rank, n)| (*dir, *rank, colors[*n]))
                        .collect();
                    around.sort_unstable();
                    (colors[v], around)
                })
                .collect();
            let refined = dense_ranks(&keys);
            let refined_classes = count_classes(&refined);
            colors = refined;
            if refined_classes == classes {
                return colors;
            }
            classes = refined_classes;
        }
    }

    fn twin_representatives(&self, members: &[usize]) -> Vec<usize> {
        let mut seen: Vec<Vec<Incidence>> = Vec::new();
        let mut reps = Vec::new();
        for v in members {
            let mut around = self.incidences[*v].clone();
            around.sort_unstable();
            if !seen.contains(&around) {
                seen.push(around);
                reps.push(*v);
            }
        }
        reps
    }

    fn encode(&self, colors: &[u32]) -> CanonicalCode {
        let mut vertices = vec![
            VertexSig { types: Vec::new() };
            colors.len()
        ];
        for (v, color) in colors.iter().enumerate() {
            vertices[*color as usize] = self.vertex_sigs[v].clone();
        }
        let mut edges: Vec<EdgeCode> = self
            .pattern
            .edges
            .iter()
            .enumerate()
            .map(|(idx, edge)| {
                let (src, dst) = oriented(
                    colors[edge.src.0] as usize,
                    colors[edge.dst.0] as usize,
                    edge.both,
                );
                EdgeCode {
                    src,
                    dst,
                    sig: self.edge_sigs[idx].clone(),
                }
            })
            .collect();
        edges.sort();
        CanonicalCode { vertices, edges }
    }

    fn edge_order(&self, vertex_order: &[usize]) -> Vec<usize> {
        let mut ranked: Vec<(usize, usize, u32, usize)> = self
            .pattern
            .edges
            .iter()
            .enumerate()
            .map(|(idx, edge)| {
                let (src, dst) = oriented(
                    vertex_order[edge.src.0],
                    vertex_order[edge.dst.0],
                    edge.both,
                );
                (src, dst, self.edge_ranks[idx], idx)
            })
            .collect();
        ranked.sort_unstable();
        let mut order = vec![0; ranked.len()];
        for (pos, (_, _, _, idx)) in ranked.into_iter().enumerate() {
            order[idx] = pos;
        }
        order
    }
}

fn oriented(src: usize, dst: usize, both: bool) -> (usize, usize) {
    if both && dst < src {
        (dst, src)
    } else {
        (src, dst)
    }
}

fn dense_ranks<T: Ord>(keys: &[T]) -> Vec<u32> {
    let mut sorted: Vec<&T> = keys.iter().collect();
    sorted.sort();
    sorted.dedup();
    keys.iter()
        .map(|key| match sorted.binary_search(&key) {
            Ok(pos) => pos as u32,
            Err(pos) => pos as u32,
        })
        .collect()
}

fn count_classes(colors: &[u32]) -> usize {
    let mut distinct = colors.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    distinct.len()
}

fn first_ambiguous_cell(colors: &[u32]) -> Option<u32> {
    let mut counts: FxHashMap<u32, usize> = FxHashMap::default();
    for color in colors {
        *counts.entry(*color).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(color, _)| color)
        .min()
}

/// Handles sorted by their canonical order.
pub(crate) fn by_order<T: Copy>(orders: &[usize], wrap: impl Fn(usize) -> T) -> Vec<T> {
    let mut out: Vec<Option<T>> = vec![None; orders.len()];
    for (idx, order) in orders.iter().enumerate() {
        out[*order] = Some(wrap(idx));
    }
    out.into_iter().flatten().collect()
}
