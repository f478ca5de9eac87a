//! Match sentences: the name-based logical input of the bridge.
//!
//! A sentence is a chain `source -> (expand | path_expand) -> get_v -> ...`
//! in which every edge step is closed by the vertex step that follows it.
//! Sentences sharing an alias refer to the same pattern vertex.

use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::types::{EdgeTypeId, LabelId};

/// Direction selector for edge traversals.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpandDirection {
    /// Outgoing edges from the previously visited vertex.
    #[default]
    Out,
    /// Incoming edges to the previously visited vertex.
    In,
    /// Edges in both directions.
    Both,
}

/// Vertex binding introduced by a source or get-vertex step.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VertexStep {
    /// User alias; `None` for anonymous vertices.
    #[serde(default)]
    pub alias: Option<String>,
    /// Candidate vertex label ids.
    pub types: Vec<LabelId>,
    /// Primary-key lookup predicate, only produced for source steps.
    #[serde(default)]
    pub unique_key_filter: Option<Expr>,
    /// Ordinary predicates on the vertex.
    #[serde(default)]
    pub filters: Vec<Expr>,
}

impl VertexStep {
    /// Creates an anonymous vertex step over `types`.
    pub fn new(types: impl IntoIterator<Item = u32>) -> Self {
        Self {
            types: types.into_iter().map(LabelId).collect(),
            ..Self::default()
        }
    }

    /// Binds the vertex to `alias`.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Adds a predicate.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filters.push(expr);
        self
    }

    /// Sets the primary-key lookup predicate.
    pub fn unique_key(mut self, expr: Expr) -> Self {
        self.unique_key_filter = Some(expr);
        self
    }

    /// Conjunction of the unique-key predicate and all ordinary predicates.
    pub fn predicate(&self) -> Option<Expr> {
        Expr::and_all(
            self.unique_key_filter
                .iter()
                .chain(self.filters.iter())
                .cloned(),
        )
    }
}

/// Single-hop edge traversal.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeStep {
    /// User alias; `None` for anonymous edges.
    #[serde(default)]
    pub alias: Option<String>,
    /// Traversal direction relative to the previously visited vertex.
    #[serde(default)]
    pub direction: ExpandDirection,
    /// Candidate edge types.
    pub types: Vec<EdgeTypeId>,
    /// Predicates on the edge.
    #[serde(default)]
    pub filters: Vec<Expr>,
}

impl EdgeStep {
    /// Creates an anonymous edge step.
    pub fn new(direction: ExpandDirection, types: impl IntoIterator<Item = EdgeTypeId>) -> Self {
        Self {
            alias: None,
            direction,
            types: types.into_iter().collect(),
            filters: Vec::new(),
        }
    }

    /// Outgoing edge step.
    pub fn out(types: impl IntoIterator<Item = EdgeTypeId>) -> Self {
        Self::new(ExpandDirection::Out, types)
    }

    /// Incoming edge step.
    pub fn incoming(types: impl IntoIterator<Item = EdgeTypeId>) -> Self {
        Self::new(ExpandDirection::In, types)
    }

    /// Undirected edge step.
    pub fn both(types: impl IntoIterator<Item = EdgeTypeId>) -> Self {
        Self::new(ExpandDirection::Both, types)
    }

    /// Binds the edge to `alias`.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Adds a predicate.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filters.push(expr);
        self
    }

    /// Conjunction of all predicates.
    pub fn predicate(&self) -> Option<Expr> {
        Expr::and_all(self.filters.iter().cloned())
    }
}

/// Variable-length traversal built from a repeated edge step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    /// The repeated hop; its alias names the whole path.
    pub edge: EdgeStep,
    /// Lower hop bound; `None` means 0.
    #[serde(default)]
    pub offset: Option<u32>,
    /// Number of hops fetched past `offset`; `None` means unbounded.
    #[serde(default)]
    pub fetch: Option<u32>,
    /// Label ids allowed for vertices inside the path.
    #[serde(default)]
    pub inner_vertex_types: Vec<LabelId>,
}

/// One step of a match sentence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum MatchStep {
    /// Starting vertex of the chain.
    Source(VertexStep),
    /// Single-hop edge.
    Expand(EdgeStep),
    /// Variable-length path.
    PathExpand(PathStep),
    /// Vertex closing the preceding edge step.
    GetVertex(VertexStep),
}

impl MatchStep {
    /// Operator name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            MatchStep::Source(_) => "source",
            MatchStep::Expand(_) => "expand",
            MatchStep::PathExpand(_) => "path expand",
            MatchStep::GetVertex(_) => "get vertex",
        }
    }
}

/// One chain of steps, optionally matched with outer-join semantics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchSentence {
    /// Steps in traversal order.
    pub steps: Vec<MatchStep>,
    /// Whether the sentence belongs to an optional match.
    #[serde(default)]
    pub optional: bool,
}

impl MatchSentence {
    /// Starts a fluent sentence builder.
    pub fn builder() -> SentenceBuilder {
        SentenceBuilder::default()
    }
}

/// Fluent builder for match sentences.
///
/// The builder records steps as given; structural checks happen when the
/// sentence is converted into a pattern.
#[derive(Default)]
pub struct SentenceBuilder {
    sentence: MatchSentence,
}

impl SentenceBuilder {
    /// Appends a source step.
    pub fn source(mut self, vertex: VertexStep) -> Self {
        self.sentence.steps.push(MatchStep::Source(vertex));
        self
    }

    /// Appends a single-hop edge step.
    pub fn expand(mut self, edge: EdgeStep) -> Self {
        self.sentence.steps.push(MatchStep::Expand(edge));
        self
    }

    /// Appends a variable-length edge step written `*lower..upper`: `lower` hops
    /// at least, `upper - lower` further hops fetched.
    pub fn path_expand(
        mut self,
        edge: EdgeStep,
        lower: u32,
        upper: u32,
        inner_vertex_types: impl IntoIterator<Item = u32>,
    ) -> Self {
        self.sentence.steps.push(MatchStep::PathExpand(PathStep {
            edge,
            offset: Some(lower),
            fetch: Some(upper.saturating_sub(lower)),
            inner_vertex_types: inner_vertex_types.into_iter().map(LabelId).collect(),
        }));
        self
    }

    /// Appends a raw path step.
    pub fn path(mut self, path: PathStep) -> Self {
        self.sentence.steps.push(MatchStep::PathExpand(path));
        self
    }

    /// Appends the vertex step closing the preceding edge.
    pub fn get_v(mut self, vertex: VertexStep) -> Self {
        self.sentence.steps.push(MatchStep::GetVertex(vertex));
        self
    }

    /// Marks the sentence optional.
    pub fn optional(mut self) -> Self {
        self.sentence.optional = true;
        self
    }

    /// Finishes the sentence.
    pub fn build(self) -> MatchSentence {
        self.sentence
    }
}
