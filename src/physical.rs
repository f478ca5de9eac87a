//! Operator tree produced by the materializer.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::catalog::PropertyDef;
use crate::expr::{Expr, Variable};
use crate::pattern::{PathExpandRange, PatternDirection};
use crate::types::{BridgeError, LabelId, Result};

/// Materialized operator tree.
#[derive(Clone, Debug)]
pub struct PhysicalPlan {
    /// The root node of the tree.
    pub root: PhysicalNode,
}

impl PhysicalPlan {
    /// Creates a plan with the given root node.
    pub fn new(root: PhysicalNode) -> Self {
        Self { root }
    }
}

/// Node within the operator tree.
#[derive(Clone, Debug)]
pub struct PhysicalNode {
    /// The operator at this node.
    pub op: PhysicalOp,
    /// Child nodes that provide input to this operator.
    pub inputs: Vec<PhysicalNode>,
}

impl PhysicalNode {
    /// Creates a node with no inputs.
    pub fn new(op: PhysicalOp) -> Self {
        Self {
            op,
            inputs: Vec::new(),
        }
    }

    /// Creates a node with the given inputs.
    pub fn with_inputs(op: PhysicalOp, inputs: Vec<PhysicalNode>) -> Self {
        Self { op, inputs }
    }

    /// Creates a node over a single input.
    pub fn unary(op: PhysicalOp, input: PhysicalNode) -> Self {
        Self {
            op,
            inputs: vec![input],
        }
    }

    /// Fields of the rows this node emits, in order.
    pub fn output_fields(&self) -> Vec<OutputField> {
        let inherited = || {
            self.inputs
                .first()
                .map(PhysicalNode::output_fields)
                .unwrap_or_default()
        };
        match &self.op {
            PhysicalOp::Scan { alias, .. } => vec![OutputField::new(alias, FieldKind::Vertex)],
            PhysicalOp::Filter { .. } => inherited(),
            PhysicalOp::Expand { alias, .. } => {
                with_field(inherited(), alias.as_deref(), FieldKind::Edge)
            }
            PhysicalOp::PathExpand { alias, .. } => {
                with_field(inherited(), alias.as_deref(), FieldKind::Path)
            }
            PhysicalOp::GetVertex { alias, .. } => {
                with_field(inherited(), Some(alias), FieldKind::Vertex)
            }
            PhysicalOp::CommonScan { table } => table.plan.output_fields(),
            PhysicalOp::Join { .. } => self
                .inputs
                .iter()
                .flat_map(PhysicalNode::output_fields)
                .collect(),
            PhysicalOp::MultiJoin { .. } => {
                let mut fields = inherited();
                for input in self.inputs.iter().skip(1) {
                    for field in input.output_fields() {
                        if !fields.iter().any(|f| f.alias == field.alias) {
                            fields.push(field);
                        }
                    }
                }
                fields
            }
            PhysicalOp::Project { items, append } => {
                let mut fields = if *append { inherited() } else { Vec::new() };
                fields.extend(
                    items
                        .iter()
                        .map(|item| OutputField::new(&item.alias, item.kind)),
                );
                fields
            }
        }
    }

    /// Position of the field bound to `alias` in this node's output.
    pub fn resolve(&self, alias: &str) -> Result<Variable> {
        self.output_fields()
            .iter()
            .position(|field| field.alias == alias)
            .map(|index| Variable::new(alias, index))
            .ok_or_else(|| BridgeError::UnresolvedField {
                alias: alias.to_owned(),
                op: self.op.name(),
            })
    }
}

fn with_field(mut fields: Vec<OutputField>, alias: Option<&str>, kind: FieldKind) -> Vec<OutputField> {
    if let Some(alias) = alias {
        if !fields.iter().any(|f| f.alias == alias) {
            fields.push(OutputField::new(alias, kind));
        }
    }
    fields
}

/// Kind of value held by an output field.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Graph vertex.
    Vertex,
    /// Graph edge.
    Edge,
    /// Path produced by a variable-length traversal.
    Path,
    /// Any other computed value.
    Value,
}

/// Named field of an operator's output row.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct OutputField {
    /// Alias bound to the field.
    pub alias: String,
    /// Value kind.
    pub kind: FieldKind,
}

impl OutputField {
    /// Creates a field.
    pub fn new(alias: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            alias: alias.into(),
            kind,
        }
    }
}

/// Label resolved against the catalog.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct LabelRef {
    /// Catalog id.
    pub id: LabelId,
    /// Catalog name.
    pub name: String,
}

impl fmt::Display for LabelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// One concrete `(src)-[edge]->(dst)` combination with resolved names.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct EdgeTypeEntry {
    /// Edge label.
    pub label: LabelRef,
    /// Source vertex label.
    pub src: LabelRef,
    /// Destination vertex label.
    pub dst: LabelRef,
}

impl fmt::Display for EdgeTypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})-[{}]->({})", self.src, self.label, self.dst)
    }
}

/// Type attached to the output of an edge traversal.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EdgeSchemaType {
    /// Exactly one edge type.
    Single {
        /// The edge type.
        entry: EdgeTypeEntry,
        /// Declared properties of the edge label.
        properties: Vec<PropertyDef>,
    },
    /// Union of several edge types; also used when no type resolved.
    Union {
        /// Member edge types.
        entries: Vec<EdgeTypeEntry>,
        /// Declared properties of all member edge labels.
        properties: Vec<PropertyDef>,
    },
}

impl EdgeSchemaType {
    /// Member edge types.
    pub fn entries(&self) -> &[EdgeTypeEntry] {
        match self {
            EdgeSchemaType::Single { entry, .. } => std::slice::from_ref(entry),
            EdgeSchemaType::Union { entries, .. } => entries,
        }
    }
}

impl fmt::Display for EdgeSchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self.entries().iter().map(|e| e.to_string()).collect();
        write!(f, "{}", entries.join(" | "))
    }
}

/// Which endpoint of the traversed edge a vertex visit binds.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GetVOpt {
    /// Source endpoint.
    Start,
    /// Destination endpoint.
    End,
    /// The endpoint opposite to where the traversal started.
    Other,
}

impl GetVOpt {
    /// Vertex-visit option closing a traversal in `direction`.
    pub fn closing(direction: PatternDirection) -> Self {
        match direction {
            PatternDirection::Out => GetVOpt::End,
            PatternDirection::In => GetVOpt::Start,
            PatternDirection::Both => GetVOpt::Other,
        }
    }
}

/// What a variable-length traversal emits.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathResultOpt {
    /// Only the vertex the path ends at.
    EndVertex,
    /// Every vertex along the path.
    AllVertices,
}

/// Which repetitions a variable-length traversal admits.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathOpt {
    /// Any walk.
    Arbitrary,
    /// No repeated vertices.
    Simple,
}

/// Named output of a projection.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectItem {
    /// Projected expression.
    pub expr: Expr,
    /// Alias of the produced field.
    pub alias: String,
    /// Kind of the produced field.
    pub kind: FieldKind,
}

/// Sub-plan evaluated once and read by several branches.
#[derive(Debug)]
pub struct CommonTable {
    /// Identifier unique within one materialization.
    pub id: usize,
    /// Root of the shared sub-plan.
    pub plan: PhysicalNode,
}

/// Operators produced by the materializer.
#[derive(Clone, Debug)]
pub enum PhysicalOp {
    /// Scans every vertex carrying one of `labels`.
    Scan {
        /// Vertex labels.
        labels: Vec<LabelRef>,
        /// Alias bound to the scanned vertex.
        alias: String,
    },
    /// Keeps rows satisfying `predicate`.
    Filter {
        /// Restored predicate.
        predicate: Expr,
    },
    /// Single-hop edge traversal.
    Expand {
        /// Direction relative to the start vertex.
        direction: PatternDirection,
        /// Edge labels.
        labels: Vec<LabelRef>,
        /// Alias bound to the edge; `None` leaves the edge unbound.
        alias: Option<String>,
        /// Alias of the vertex the traversal starts from.
        start_alias: String,
        /// Whether unmatched rows survive with a null edge.
        optional: bool,
        /// Resolved edge type of the output.
        edge_type: EdgeSchemaType,
    },
    /// Variable-length traversal.
    PathExpand {
        /// Direction of each hop.
        direction: PatternDirection,
        /// Edge labels of each hop.
        labels: Vec<LabelRef>,
        /// Predicate applied to each traversed edge.
        edge_filter: Option<Expr>,
        /// Endpoint bound after each hop.
        inner_opt: GetVOpt,
        /// Labels allowed for vertices along the path.
        inner_labels: Vec<LabelRef>,
        /// Hop window.
        range: PathExpandRange,
        /// What the traversal emits.
        result: PathResultOpt,
        /// Which repetitions are admitted.
        path: PathOpt,
        /// Alias bound to the path; `None` leaves it unbound.
        alias: Option<String>,
        /// Alias of the vertex the traversal starts from.
        start_alias: String,
        /// Whether unmatched rows survive with a null path.
        optional: bool,
        /// Resolved edge type of each hop.
        edge_type: EdgeSchemaType,
    },
    /// Binds an endpoint of the preceding traversal.
    GetVertex {
        /// Which endpoint.
        opt: GetVOpt,
        /// Vertex labels.
        labels: Vec<LabelRef>,
        /// Alias bound to the vertex.
        alias: String,
    },
    /// Reads a shared sub-plan.
    CommonScan {
        /// The shared sub-plan.
        table: Arc<CommonTable>,
    },
    /// Binary inner equi-join; the output row is the left row followed by the
    /// right row.
    Join {
        /// Condition over the concatenated row.
        condition: Expr,
    },
    /// N-ary inner equi-join; field positions in `condition` address the
    /// concatenation of all input rows.
    MultiJoin {
        /// Condition over the concatenated rows.
        condition: Expr,
    },
    /// Computes named fields.
    Project {
        /// Projected items.
        items: Vec<ProjectItem>,
        /// Whether the items are appended to the input row instead of
        /// replacing it.
        append: bool,
    },
}

impl PhysicalOp {
    /// Operator name used by explain output and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            PhysicalOp::Scan { .. } => "Scan",
            PhysicalOp::Filter { .. } => "Filter",
            PhysicalOp::Expand { .. } => "Expand",
            PhysicalOp::PathExpand { .. } => "PathExpand",
            PhysicalOp::GetVertex { .. } => "GetVertex",
            PhysicalOp::CommonScan { .. } => "CommonScan",
            PhysicalOp::Join { .. } => "Join",
            PhysicalOp::MultiJoin { .. } => "MultiJoin",
            PhysicalOp::Project { .. } => "Project",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Vec<LabelRef> {
        vec![LabelRef {
            id: LabelId(1),
            name: "PERSON".into(),
        }]
    }

    fn scan(alias: &str) -> PhysicalNode {
        PhysicalNode::new(PhysicalOp::Scan {
            labels: person(),
            alias: alias.into(),
        })
    }

    fn get_v(alias: &str, input: PhysicalNode) -> PhysicalNode {
        PhysicalNode::unary(
            PhysicalOp::GetVertex {
                opt: GetVOpt::End,
                labels: person(),
                alias: alias.into(),
            },
            input,
        )
    }

    #[test]
    fn join_concatenates_fields() {
        let join = PhysicalNode::with_inputs(
            PhysicalOp::Join {
                condition: Expr::lit(true),
            },
            vec![scan("a"), get_v("b", scan("a"))],
        );
        let aliases: Vec<String> = join.output_fields().into_iter().map(|f| f.alias).collect();
        assert_eq!(aliases, vec!["a", "a", "b"]);
        assert_eq!(join.resolve("b").expect("b").index, 2);
        let err = join.resolve("zzz").expect_err("missing");
        assert_eq!(err.code(), "UnresolvedField");
    }

    #[test]
    fn projection_replaces_or_appends() {
        let item = ProjectItem {
            expr: Expr::field(Variable::new("a", 0)),
            alias: "x".into(),
            kind: FieldKind::Value,
        };
        let replace = PhysicalNode::unary(
            PhysicalOp::Project {
                items: vec![item.clone()],
                append: false,
            },
            scan("a"),
        );
        assert_eq!(replace.output_fields(), vec![OutputField::new("x", FieldKind::Value)]);
        let append = PhysicalNode::unary(
            PhysicalOp::Project {
                items: vec![item],
                append: true,
            },
            scan("a"),
        );
        assert_eq!(append.output_fields().len(), 2);
    }

    #[test]
    fn getv_option_follows_direction() {
        assert_eq!(GetVOpt::closing(PatternDirection::Out), GetVOpt::End);
        assert_eq!(GetVOpt::closing(PatternDirection::In), GetVOpt::Start);
        assert_eq!(GetVOpt::closing(PatternDirection::Both), GetVOpt::Other);
    }
}
