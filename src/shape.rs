//! Execution shapes chosen by the join planner over canonical patterns.
//!
//! A [`PatternPlan`] is what the planner hands back: a scan of one vertex,
//! an extension of a smaller pattern by one vertex through one or more edges,
//! or a split of a pattern into two joined halves. All references are order
//! ids of the patterns carried alongside.

use tracing::debug;

use crate::pattern::{ElementDetails, OrderMapping, Pattern, PatternDirection, VertexIdx};
use crate::types::{BridgeError, EdgeTypeId, Result};

/// Edge connecting an existing vertex of the source pattern to the target.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtendEdge {
    /// Order id of the existing endpoint, in the source pattern.
    pub src_order: usize,
    /// Edge type triples.
    pub types: Vec<EdgeTypeId>,
    /// Direction seen from the existing endpoint.
    pub direction: PatternDirection,
    /// Planner metadata of the edge.
    pub details: ElementDetails,
}

/// Adds the vertex at `target_order` through every edge in `edges`.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtendStep {
    /// Order id of the new vertex, in the target pattern.
    pub target_order: usize,
    /// Candidate edges; their results are intersected on the target.
    pub edges: Vec<ExtendEdge>,
}

/// One extension: `src_pattern` grows into `dst_pattern` by `step`.
#[derive(Clone, Debug)]
pub struct ExtendIntersectEdge {
    /// Pattern before the extension.
    pub src_pattern: Pattern,
    /// Pattern after the extension.
    pub dst_pattern: Pattern,
    /// The extension itself.
    pub step: ExtendStep,
    /// Order ids of `src_pattern` mapped into `dst_pattern`.
    pub src_to_target: OrderMapping,
}

/// Vertex shared by both sides of a join decomposition.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct JoinVertexPair {
    /// Order id in the probe pattern.
    pub probe_order: usize,
    /// Order id in the build pattern.
    pub build_order: usize,
}

/// Split of `parent` into a probe side and a build side.
#[derive(Clone, Debug)]
pub struct JoinDecomposition {
    /// Pattern being split.
    pub parent: Pattern,
    /// Left input pattern.
    pub probe_pattern: Pattern,
    /// Right input pattern.
    pub build_pattern: Pattern,
    /// Probe order ids mapped into `parent`.
    pub probe_to_parent: OrderMapping,
    /// Build order ids mapped into `parent`.
    pub build_to_parent: OrderMapping,
    /// Vertices the two sides are joined on.
    pub join_vertices: Vec<JoinVertexPair>,
    /// Plan producing the probe pattern.
    pub probe: PatternPlan,
    /// Plan producing the build pattern.
    pub build: PatternPlan,
}

/// Planner output over a canonical pattern.
#[derive(Clone, Debug)]
pub enum PatternPlan {
    /// Scan of a single-vertex pattern.
    Vertex(Pattern),
    /// Extension of the plan in `input` by one vertex.
    ExtendIntersect {
        /// The extension.
        edge: ExtendIntersectEdge,
        /// Plan producing `edge.src_pattern`.
        input: Box<PatternPlan>,
    },
    /// Join of two sub-plans.
    JoinDecomposition(Box<JoinDecomposition>),
}

impl PatternPlan {
    /// Pattern produced by this plan.
    pub fn pattern(&self) -> &Pattern {
        match self {
            PatternPlan::Vertex(pattern) => pattern,
            PatternPlan::ExtendIntersect { edge, .. } => &edge.dst_pattern,
            PatternPlan::JoinDecomposition(decomposition) => &decomposition.parent,
        }
    }

    /// Shape name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            PatternPlan::Vertex(_) => "vertex",
            PatternPlan::ExtendIntersect { .. } => "extend_intersect",
            PatternPlan::JoinDecomposition(_) => "join_decomposition",
        }
    }
}

/// Builds a chain of extensions covering `pattern`, one vertex at a time.
///
/// Vertices are added in breadth-first order of order ids starting from order
/// 0, always picking the smallest order adjacent to what is already covered.
/// Each step extends through every edge between the new vertex and the
/// covered ones. No costing is involved. Self loops are not covered.
pub fn naive_extend_chain(pattern: &Pattern, search_limit: usize) -> Result<PatternPlan> {
    if pattern.vertex_count() == 0 {
        return Err(BridgeError::InvalidShape("can not plan an empty pattern".into()));
    }
    if !pattern.is_connected() {
        return Err(BridgeError::DisconnectedPattern {
            pattern: pattern.id(),
        });
    }

    let sequence = cover_sequence(pattern)?;
    let first = if sequence.len() == 1 {
        pattern.clone()
    } else {
        pattern.induced(&sequence[..1], search_limit)?
    };
    let mut plan = PatternPlan::Vertex(first);
    for k in 2..=sequence.len() {
        let dst_pattern = if k == sequence.len() {
            pattern.clone()
        } else {
            pattern.induced(&sequence[..k], search_limit)?
        };
        let src_pattern = plan.pattern().clone();
        let step = extend_step(&src_pattern, &dst_pattern, pattern.vertex(sequence[k - 1]).id)?;
        debug!(
            pattern = %dst_pattern.id(),
            target = step.target_order,
            edges = step.edges.len(),
            "bridge.shape.extend"
        );
        let src_to_target = OrderMapping::by_vertex_id(&src_pattern, &dst_pattern);
        plan = PatternPlan::ExtendIntersect {
            edge: ExtendIntersectEdge {
                src_pattern,
                dst_pattern,
                step,
                src_to_target,
            },
            input: Box::new(plan),
        };
    }
    Ok(plan)
}

fn cover_sequence(pattern: &Pattern) -> Result<Vec<VertexIdx>> {
    let n = pattern.vertex_count();
    let mut covered = vec![false; n];
    let mut sequence = Vec::with_capacity(n);
    let start = pattern.require_vertex(0)?;
    covered[start.index()] = true;
    sequence.push(start);
    while sequence.len() < n {
        let next = sequence
            .iter()
            .flat_map(|v| {
                pattern
                    .edges_of(*v)
                    .iter()
                    .filter_map(move |e| pattern.edge(*e).other(*v))
            })
            .filter(|v| !covered[v.index()])
            .min_by_key(|v| pattern.vertex_order(*v))
            .ok_or(BridgeError::DisconnectedPattern {
                pattern: pattern.id(),
            })?;
        covered[next.index()] = true;
        sequence.push(next);
    }
    Ok(sequence)
}

fn extend_step(src: &Pattern, dst: &Pattern, target_id: usize) -> Result<ExtendStep> {
    let target = dst.vertex_by_id(target_id).ok_or_else(|| {
        BridgeError::InvalidShape(format!("vertex {target_id} missing from the extended pattern"))
    })?;
    let mut edges = Vec::new();
    let mut incident: Vec<_> = dst.edges_of(target).to_vec();
    incident.sort_by_key(|e| dst.edge_order(*e));
    for e in incident {
        let edge = dst.edge(e);
        let Some(other) = edge.other(target).filter(|o| *o != target) else {
            continue;
        };
        let Some(src_vertex) = src.vertex_by_id(dst.vertex(other).id) else {
            continue;
        };
        let direction = if edge.both {
            PatternDirection::Both
        } else if edge.src == other {
            PatternDirection::Out
        } else {
            PatternDirection::In
        };
        edges.push(ExtendEdge {
            src_order: src.vertex_order(src_vertex),
            types: edge.type_ids().to_vec(),
            direction,
            details: edge.details.clone(),
        });
    }
    Ok(ExtendStep {
        target_order: dst.vertex_order(target),
        edges,
    })
}
