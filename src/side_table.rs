//! Order-keyed metadata restoring aliases and predicates onto operators.
//!
//! The planner only knows order ids. The side table maps those ids back to
//! the alias and predicate of every element, and is re-keyed (never mutated
//! in place) whenever materialization descends into a sub-pattern.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::expr::Expr;
use crate::pattern::{EdgeIdx, OrderMapping, Pattern, PatternDirection, VertexIdx};

/// Prefix of the alias given to vertices that were never named.
pub const SYNTHETIC_VERTEX_PREFIX: &str = "PATTERN_VERTEX$";

/// Tag inserted between an alias and the side index of a split path segment.
pub const SPLIT_SEGMENT_TAG: &str = "$p_";

/// Key of a side-table entry.
///
/// Edge keys are normalized on construction: an `In` key is stored as the
/// reversed `Out` key, and a `Both` key lists the smaller order first.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataKey {
    /// Vertex with the given order id.
    Vertex {
        /// Vertex order id.
        order: usize,
    },
    /// Edge between two order ids.
    Edge {
        /// Source order id.
        src: usize,
        /// Destination order id.
        dst: usize,
        /// `Out` or `Both` after normalization.
        #[serde(serialize_with = "serialize_direction")]
        direction: PatternDirection,
    },
}

fn serialize_direction<S: serde::Serializer>(
    direction: &PatternDirection,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(direction)
}

impl DataKey {
    /// Vertex key.
    pub fn vertex(order: usize) -> Self {
        DataKey::Vertex { order }
    }

    /// Edge key, normalized.
    pub fn edge(src: usize, dst: usize, direction: PatternDirection) -> Self {
        match direction {
            PatternDirection::Out => DataKey::Edge {
                src,
                dst,
                direction,
            },
            PatternDirection::In => DataKey::Edge {
                src: dst,
                dst: src,
                direction: PatternDirection::Out,
            },
            PatternDirection::Both => DataKey::Edge {
                src: src.min(dst),
                dst: src.max(dst),
                direction,
            },
        }
    }

    /// Key of a vertex in `pattern`.
    pub fn of_vertex(pattern: &Pattern, v: VertexIdx) -> Self {
        DataKey::vertex(pattern.vertex_order(v))
    }

    /// Key of an edge in `pattern`.
    pub fn of_edge(pattern: &Pattern, e: EdgeIdx) -> Self {
        let edge = pattern.edge(e);
        DataKey::edge(
            pattern.vertex_order(edge.src),
            pattern.vertex_order(edge.dst),
            edge.direction(),
        )
    }

    /// Same key with every order id passed through `map`; `None` when an
    /// order id has no image.
    pub fn translate(&self, map: impl Fn(usize) -> Option<usize>) -> Option<Self> {
        match *self {
            DataKey::Vertex { order } => Some(DataKey::vertex(map(order)?)),
            DataKey::Edge {
                src,
                dst,
                direction,
            } => Some(DataKey::edge(map(src)?, map(dst)?, direction)),
        }
    }
}

impl fmt::Display for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataKey::Vertex { order } => write!(f, "v{order}"),
            DataKey::Edge {
                src,
                dst,
                direction,
            } => write!(f, "e({src},{dst},{direction})"),
        }
    }
}

/// Alias and predicate restored for one element.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DataValue {
    /// User-visible alias; `None` for anonymous edges.
    pub alias: Option<String>,
    /// Restored predicate.
    #[serde(serialize_with = "serialize_filter")]
    pub filter: Option<Expr>,
    /// Alias of the unsplit path; only set on split path segments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_alias: Option<String>,
}

fn serialize_filter<S: serde::Serializer>(
    filter: &Option<Expr>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match filter {
        Some(expr) => serializer.collect_str(expr),
        None => serializer.serialize_none(),
    }
}

impl DataValue {
    /// Value with an alias and an optional predicate.
    pub fn new(alias: Option<String>, filter: Option<Expr>) -> Self {
        Self {
            alias,
            filter,
            parent_alias: None,
        }
    }

    /// Value given to vertices without metadata.
    pub fn synthetic_vertex(id: usize) -> Self {
        Self::new(Some(format!("{SYNTHETIC_VERTEX_PREFIX}{id}")), None)
    }

    /// Marks the value as segment `side` of a split path. Anonymous values are
    /// returned unchanged.
    pub fn split_segment(self, side: usize) -> Self {
        match self.alias {
            Some(alias) => Self {
                alias: Some(format!("{alias}{SPLIT_SEGMENT_TAG}{side}")),
                filter: self.filter,
                parent_alias: Some(alias),
            },
            None => self,
        }
    }
}

/// Pre-split pattern consulted when an edge of a sub-pattern has no direct
/// counterpart, together with the side (0 = probe, 1 = build) being keyed.
#[derive(Clone, Copy, Debug)]
pub struct ParentPattern<'a> {
    /// Pattern the sub-pattern was cut from.
    pub pattern: &'a Pattern,
    /// Side index used to tag split segments.
    pub side: usize,
}

/// Immutable map from [`DataKey`] to [`DataValue`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SideTable {
    entries: FxHashMap<DataKey, DataValue>,
}

impl SideTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, key: DataKey, value: DataValue) {
        self.entries.insert(key, value);
    }

    /// Copy of the table with one more entry.
    pub fn with(mut self, key: DataKey, value: DataValue) -> Self {
        self.insert(key, value);
        self
    }

    /// Entry for `key`.
    pub fn get(&self, key: &DataKey) -> Option<&DataValue> {
        self.entries.get(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = (&DataKey, &DataValue)> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by_key(|(key, _)| **key);
        entries.into_iter()
    }

    /// Metadata of the vertex at `order`, or the synthetic alias of the vertex
    /// created with id `fallback_id`.
    pub fn vertex_value(&self, order: usize, fallback_id: usize) -> DataValue {
        self.get(&DataKey::vertex(order))
            .cloned()
            .unwrap_or_else(|| DataValue::synthetic_vertex(fallback_id))
    }

    /// Metadata of the edge under `key`, or an anonymous value.
    pub fn edge_value(&self, key: &DataKey) -> DataValue {
        self.get(key).cloned().unwrap_or_default()
    }

    /// Copy holding only the listed keys that are present.
    pub fn restrict<I>(&self, keys: I) -> SideTable
    where
        I: IntoIterator<Item = DataKey>,
    {
        let mut out = SideTable::new();
        for key in keys {
            if let Some(value) = self.entries.get(&key) {
                out.insert(key, value.clone());
            }
        }
        out
    }

    /// Re-keys the table (keyed by some parent pattern) for `sub`.
    ///
    /// `to_parent` maps order ids of `sub` to order ids of the parent. Edges of
    /// `sub` whose endpoints do not both map are looked up by creation id in
    /// `parent`, when given; values found that way become split segments
    /// tagged with the parent's side.
    pub fn remap_sub_pattern(
        &self,
        sub: &Pattern,
        to_parent: &OrderMapping,
        parent: Option<ParentPattern<'_>>,
    ) -> SideTable {
        let mut out = SideTable::new();
        for (v, _) in sub.vertices() {
            let order = sub.vertex_order(v);
            let Some(old) = to_parent.get(order) else {
                continue;
            };
            if let Some(value) = self.get(&DataKey::vertex(old)) {
                out.insert(DataKey::vertex(order), value.clone());
            }
        }
        for (e, edge) in sub.edges() {
            let new_key = DataKey::of_edge(sub, e);
            let direct = to_parent
                .get(sub.vertex_order(edge.src))
                .zip(to_parent.get(sub.vertex_order(edge.dst)))
                .map(|(src, dst)| DataKey::edge(src, dst, edge.direction()));
            let value = match (direct, parent) {
                (Some(old_key), _) => self.get(&old_key).cloned(),
                (None, Some(parent)) => parent
                    .pattern
                    .edge_by_id(edge.id)
                    .map(|pe| {
                        let original = parent.pattern.edge(pe);
                        DataKey::edge(
                            parent.pattern.vertex_order(original.src),
                            parent.pattern.vertex_order(original.dst),
                            edge.direction(),
                        )
                    })
                    .and_then(|old_key| self.get(&old_key).cloned())
                    .map(|value| value.split_segment(parent.side)),
                (None, None) => None,
            };
            if let Some(value) = value {
                out.insert(new_key, value);
            }
        }
        out
    }
}

impl fmt::Display for SideTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in self.iter() {
            write!(f, "{key} -> {}", value.alias.as_deref().unwrap_or("_"))?;
            if let Some(filter) = &value.filter {
                write!(f, " where {filter}")?;
            }
            if let Some(parent) = &value.parent_alias {
                write!(f, " (segment of {parent})")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
