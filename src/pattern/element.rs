//! Vertices, edges, and the per-element details the planner reads.

use std::fmt;

use smallvec::SmallVec;

use crate::types::{EdgeTypeId, LabelId};

/// Arena handle of a vertex within its owning [`Pattern`](super::Pattern).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VertexIdx(pub(crate) usize);

impl VertexIdx {
    /// Position of the vertex in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Arena handle of an edge within its owning [`Pattern`](super::Pattern).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct EdgeIdx(pub(crate) usize);

impl EdgeIdx {
    /// Position of the edge in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Direction of an edge relative to a reference vertex.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum PatternDirection {
    /// From the reference vertex.
    Out,
    /// Towards the reference vertex.
    In,
    /// Either way.
    Both,
}

impl fmt::Display for PatternDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternDirection::Out => write!(f, "OUT"),
            PatternDirection::In => write!(f, "IN"),
            PatternDirection::Both => write!(f, "BOTH"),
        }
    }
}

/// Hop window of a variable-length edge: at least `offset` hops, and up to
/// `fetch` further hops.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PathExpandRange {
    /// Lower hop bound.
    pub offset: u32,
    /// Number of hops fetched past `offset`.
    pub fetch: u32,
}

impl PathExpandRange {
    /// Creates a range.
    pub fn new(offset: u32, fetch: u32) -> Self {
        Self { offset, fetch }
    }

    /// Range with an unbounded upper end.
    pub fn unbounded(offset: u32) -> Self {
        Self {
            offset,
            fetch: u32::MAX - offset,
        }
    }

    /// Upper hop bound, saturating at `u32::MAX`.
    pub fn upper(&self) -> u32 {
        self.offset.saturating_add(self.fetch)
    }
}

impl fmt::Display for PathExpandRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.offset, self.upper())
    }
}

/// Planner-facing metadata of a vertex or edge.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementDetails {
    /// Estimated fraction of elements kept, in `(0, 1]`.
    pub selectivity: f64,
    /// Whether the element is matched with outer-join semantics.
    pub optional: bool,
    /// Hop window; only set on variable-length edges.
    pub range: Option<PathExpandRange>,
    /// Labels allowed for vertices inside a variable-length edge.
    pub inner_vertex_types: SmallVec<[LabelId; 2]>,
}

impl Default for ElementDetails {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl ElementDetails {
    /// Details of a mandatory, fixed-length element.
    pub fn new(selectivity: f64) -> Self {
        Self {
            selectivity,
            optional: false,
            range: None,
            inner_vertex_types: SmallVec::new(),
        }
    }

    /// Sets the optional flag.
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Turns the details into those of a variable-length edge.
    pub fn with_range(
        mut self,
        range: PathExpandRange,
        inner_vertex_types: impl IntoIterator<Item = LabelId>,
    ) -> Self {
        self.range = Some(range);
        self.inner_vertex_types = inner_vertex_types.into_iter().collect();
        self
    }
}

/// Vertex type constraint: one label, or a union of labels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VertexTypes {
    /// Exactly one label.
    Single(LabelId),
    /// Any of several labels.
    Fuzzy(Vec<LabelId>),
}

impl VertexTypes {
    /// Picks the single variant when exactly one label is given.
    pub fn from_ids(mut ids: Vec<LabelId>) -> Self {
        if ids.len() == 1 {
            VertexTypes::Single(ids[0])
        } else {
            ids.sort();
            ids.dedup();
            VertexTypes::Fuzzy(ids)
        }
    }

    /// Label ids as a slice.
    pub fn ids(&self) -> &[LabelId] {
        match self {
            VertexTypes::Single(id) => std::slice::from_ref(id),
            VertexTypes::Fuzzy(ids) => ids,
        }
    }
}

/// Edge type constraint: one triple, or a union of triples.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EdgeTypes {
    /// Exactly one edge type.
    Single(EdgeTypeId),
    /// Any of several edge types.
    Fuzzy(Vec<EdgeTypeId>),
}

impl EdgeTypes {
    /// Picks the single variant when exactly one triple is given.
    pub fn from_ids(mut ids: Vec<EdgeTypeId>) -> Self {
        if ids.len() == 1 {
            EdgeTypes::Single(ids[0])
        } else {
            ids.sort();
            ids.dedup();
            EdgeTypes::Fuzzy(ids)
        }
    }

    /// Edge type triples as a slice.
    pub fn ids(&self) -> &[EdgeTypeId] {
        match self {
            EdgeTypes::Single(id) => std::slice::from_ref(id),
            EdgeTypes::Fuzzy(ids) => ids,
        }
    }

    /// Distinct edge label ids, ascending.
    pub fn edge_labels(&self) -> Vec<LabelId> {
        let mut labels: Vec<LabelId> = self.ids().iter().map(|t| t.edge_label).collect();
        labels.sort();
        labels.dedup();
        labels
    }
}

/// Vertex of a pattern.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternVertex {
    /// Creation id; stable across canonicalization and shared with sub-patterns.
    pub id: usize,
    /// Type constraint.
    pub types: VertexTypes,
    /// Planner metadata.
    pub details: ElementDetails,
}

impl PatternVertex {
    /// Creates a vertex.
    pub fn new(id: usize, types: Vec<LabelId>, details: ElementDetails) -> Self {
        Self {
            id,
            types: VertexTypes::from_ids(types),
            details,
        }
    }

    /// Label ids of the vertex.
    pub fn type_ids(&self) -> &[LabelId] {
        self.types.ids()
    }
}

/// Edge of a pattern.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternEdge {
    /// Creation id; sub-patterns keep the id of the edge they were cut from.
    pub id: usize,
    /// Source vertex handle.
    pub src: VertexIdx,
    /// Destination vertex handle.
    pub dst: VertexIdx,
    /// Type constraint.
    pub types: EdgeTypes,
    /// Whether the edge may be traversed either way.
    pub both: bool,
    /// Planner metadata.
    pub details: ElementDetails,
}

impl PatternEdge {
    /// Creates an edge between two vertices of the same pattern.
    pub fn new(
        id: usize,
        src: VertexIdx,
        dst: VertexIdx,
        types: Vec<EdgeTypeId>,
        both: bool,
        details: ElementDetails,
    ) -> Self {
        Self {
            id,
            src,
            dst,
            types: EdgeTypes::from_ids(types),
            both,
            details,
        }
    }

    /// Edge type triples.
    pub fn type_ids(&self) -> &[EdgeTypeId] {
        self.types.ids()
    }

    /// Direction used when keying the edge: `Both` or `Out`.
    pub fn direction(&self) -> PatternDirection {
        if self.both {
            PatternDirection::Both
        } else {
            PatternDirection::Out
        }
    }

    /// Whether the edge is a variable-length path.
    pub fn is_ranged(&self) -> bool {
        self.details.range.is_some()
    }

    /// The endpoint opposite to `v`, if `v` is an endpoint.
    pub fn other(&self, v: VertexIdx) -> Option<VertexIdx> {
        if self.src == v {
            Some(self.dst)
        } else if self.dst == v {
            Some(self.src)
        } else {
            None
        }
    }
}
