//! Identifier newtypes shared by the pattern, catalog, and operator layers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

pub use crate::error::{BridgeError, Result};

/// Catalog identifier of a vertex or edge label.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LabelId(pub u32);

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Catalog identifier of a declared property.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PropId(pub u32);

/// Fully qualified edge type: the edge label plus the vertex labels it connects.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct EdgeTypeId {
    /// Label of the edge itself.
    pub edge_label: LabelId,
    /// Label of the source vertex.
    pub src_label: LabelId,
    /// Label of the destination vertex.
    pub dst_label: LabelId,
}

impl EdgeTypeId {
    /// Creates a triple from raw label ids.
    pub fn new(edge_label: u32, src_label: u32, dst_label: u32) -> Self {
        Self {
            edge_label: LabelId(edge_label),
            src_label: LabelId(src_label),
            dst_label: LabelId(dst_label),
        }
    }
}

impl fmt::Display for EdgeTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({})-[{}]->({})",
            self.src_label, self.edge_label, self.dst_label
        )
    }
}

/// Process-wide identifier of a pattern instance.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternId(pub u64);

impl PatternId {
    /// Allocates a fresh identifier, unique within the process.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        PatternId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
