//! Catalog and selectivity capabilities consumed by the bridge.
//!
//! Patterns only hold numeric type ids. Producing operators requires the
//! human-readable label names and the declared edge relations, and building
//! patterns requires a selectivity estimate per element; both come from the
//! traits defined here, implemented by the hosting planner.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::expr::{CmpOp, Expr};
use crate::types::{EdgeTypeId, LabelId, PropId};

/// Declared property of a label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    /// Property identifier.
    pub id: PropId,
    /// Property name.
    pub name: String,
}

/// Vertex label entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexLabel {
    /// Label identifier.
    pub id: LabelId,
    /// Label name.
    pub name: String,
    /// Declared properties.
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
}

/// Edge label entry with the vertex label pairs it may connect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeLabel {
    /// Label identifier.
    pub id: LabelId,
    /// Label name.
    pub name: String,
    /// Declared properties.
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    /// `(source label, destination label)` pairs this edge is valid between.
    #[serde(default)]
    pub relations: Vec<(LabelId, LabelId)>,
}

/// Resolves label ids to catalog entries.
pub trait SchemaCatalog {
    /// Looks up a vertex label.
    fn vertex_label(&self, id: LabelId) -> Option<&VertexLabel>;
    /// Looks up an edge label.
    fn edge_label(&self, id: LabelId) -> Option<&EdgeLabel>;
}

/// Estimates the fraction of elements surviving a scan or traversal.
///
/// Estimates only feed the cost model; they never influence correctness.
pub trait SelectivityOracle {
    /// Selectivity of scanning vertices of `types` under `filter`.
    fn vertex_selectivity(&self, types: &[LabelId], filter: Option<&Expr>) -> f64;
    /// Selectivity of traversing edges of `types` under `filter`.
    fn edge_selectivity(&self, types: &[EdgeTypeId], filter: Option<&Expr>) -> f64;
}

/// Simple in-memory catalog used for tests, the CLI, and prototyping.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InMemoryCatalog {
    #[serde(default)]
    vertices: Vec<VertexLabel>,
    #[serde(default)]
    edges: Vec<EdgeLabel>,
    #[serde(skip)]
    vertex_index: HashMap<LabelId, usize>,
    #[serde(skip)]
    edge_index: HashMap<LabelId, usize>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a vertex label without properties.
    pub fn with_vertex(self, id: u32, name: impl Into<String>) -> Self {
        self.with_vertex_label(VertexLabel {
            id: LabelId(id),
            name: name.into(),
            properties: Vec::new(),
        })
    }

    /// Registers a fully described vertex label.
    pub fn with_vertex_label(mut self, label: VertexLabel) -> Self {
        self.vertex_index.insert(label.id, self.vertices.len());
        self.vertices.push(label);
        self
    }

    /// Registers an edge label valid between the supplied label pairs.
    pub fn with_edge(
        self,
        id: u32,
        name: impl Into<String>,
        relations: impl IntoIterator<Item = (u32, u32)>,
    ) -> Self {
        self.with_edge_label(EdgeLabel {
            id: LabelId(id),
            name: name.into(),
            properties: Vec::new(),
            relations: relations
                .into_iter()
                .map(|(src, dst)| (LabelId(src), LabelId(dst)))
                .collect(),
        })
    }

    /// Registers a fully described edge label.
    pub fn with_edge_label(mut self, label: EdgeLabel) -> Self {
        self.edge_index.insert(label.id, self.edges.len());
        self.edges.push(label);
        self
    }

    /// Rebuilds lookup indexes; required after deserialization.
    pub fn reindex(mut self) -> Self {
        self.vertex_index = self
            .vertices
            .iter()
            .enumerate()
            .map(|(idx, label)| (label.id, idx))
            .collect();
        self.edge_index = self
            .edges
            .iter()
            .enumerate()
            .map(|(idx, label)| (label.id, idx))
            .collect();
        self
    }
}

impl SchemaCatalog for InMemoryCatalog {
    fn vertex_label(&self, id: LabelId) -> Option<&VertexLabel> {
        self.vertex_index.get(&id).map(|idx| &self.vertices[*idx])
    }

    fn edge_label(&self, id: LabelId) -> Option<&EdgeLabel> {
        self.edge_index.get(&id).map(|idx| &self.edges[*idx])
    }
}

/// Rule-of-thumb selectivity estimates derived from predicate shape alone.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeuristicSelectivity;

impl SelectivityOracle for HeuristicSelectivity {
    fn vertex_selectivity(&self, _types: &[LabelId], filter: Option<&Expr>) -> f64 {
        filter.map(expr_selectivity).unwrap_or(1.0)
    }

    fn edge_selectivity(&self, _types: &[EdgeTypeId], filter: Option<&Expr>) -> f64 {
        filter.map(expr_selectivity).unwrap_or(1.0)
    }
}

/// Estimates the selectivity of a boolean expression, clamped to `(0, 1]`.
pub fn expr_selectivity(expr: &Expr) -> f64 {
    raw_selectivity(expr).clamp(f64::MIN_POSITIVE, 1.0)
}

fn raw_selectivity(expr: &Expr) -> f64 {
    match expr {
        Expr::Compare { op, .. } => match op {
            CmpOp::Eq => 0.05,
            CmpOp::Ne => 0.95,
            CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => 0.3,
        },
        Expr::In { values, .. } => (values.len() as f64 * 0.05).clamp(0.05, 1.0),
        Expr::IsNull { .. } => 0.1,
        Expr::And { children } => {
            let mut sel = 1.0;
            for child in children {
                sel *= raw_selectivity(child);
            }
            sel.clamp(0.0, 1.0)
        }
        Expr::Or { children } => {
            let mut remaining = 1.0;
            for child in children {
                remaining *= 1.0 - raw_selectivity(child);
            }
            (1.0 - remaining).clamp(0.0, 1.0)
        }
        Expr::Not { expr } => (1.0 - raw_selectivity(expr)).clamp(0.0, 1.0),
        Expr::Literal { .. } | Expr::Property { .. } | Expr::Field { .. } => 1.0,
        Expr::PathConcat { .. } => 1.0,
    }
}
