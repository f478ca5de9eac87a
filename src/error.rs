#![allow(missing_docs)]

use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::types::{EdgeTypeId, LabelId, PatternId};

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Endpoint of an edge checked against its type triples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointSide {
    Src,
    Dst,
}

impl fmt::Display for EndpointSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointSide::Src => write!(f, "src"),
            EndpointSide::Dst => write!(f, "dst"),
        }
    }
}

/// Fatal conditions raised while translating between match sentences, patterns,
/// and operator trees.
///
/// Every variant aborts the current compilation; nothing partially built is
/// handed back to the caller.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A second edge was added between an already connected vertex pair.
    #[error(
        "edge {edge} between vertices {src} and {dst} already exists in the pattern; \
         patterns with multi-edges are not supported"
    )]
    DuplicateEdge { edge: usize, src: usize, dst: usize },
    /// An edge endpoint is not a vertex of the pattern it is added to.
    #[error("edge {edge} references a vertex outside pattern {pattern}")]
    DanglingEdge { edge: usize, pattern: PatternId },
    /// An expand step was not followed by the vertex step closing it.
    #[error("a vertex step must follow the {step} step since an edge in a pattern has two endpoints")]
    MissingEndpoint { step: &'static str },
    /// Vertex types disagree with the labels implied by the edge type triples.
    #[error("{side} vertex types {vertex_types:?} not consistent with edge types {edge_types:?}")]
    VertexTypeMismatch {
        side: EndpointSide,
        vertex_types: Vec<LabelId>,
        edge_types: Vec<EdgeTypeId>,
    },
    /// An alias was redeclared with predicates the first declaration does not imply.
    #[error(
        "filters {redeclared} on '{alias}' are not implied by its previous filters {}",
        .previous.as_deref().unwrap_or("<none>")
    )]
    ConflictingPredicates {
        alias: String,
        previous: Option<String>,
        redeclared: String,
    },
    /// A scan was requested for a pattern holding more than one vertex.
    #[error("can not convert pattern {pattern} with {vertices} vertices into a single scan")]
    MultiVertexScan { pattern: PatternId, vertices: usize },
    /// The planner referenced an order id the pattern does not contain.
    #[error("pattern {pattern} has no vertex with order {order}")]
    UnknownOrder { pattern: PatternId, order: usize },
    /// The planner handed over a shape that can not be materialized.
    #[error("invalid plan shape: {0}")]
    InvalidShape(String),
    /// An operator referenced an alias its input does not produce.
    #[error("alias '{alias}' is not produced by the input of {op}")]
    UnresolvedField { alias: String, op: &'static str },
    /// A chain of extensions can not cover a disconnected pattern.
    #[error("pattern {pattern} is disconnected and can not be extended from a single vertex")]
    DisconnectedPattern { pattern: PatternId },
    /// A match sentence does not start with a source step or is otherwise malformed.
    #[error("invalid match sentence: {0}")]
    InvalidSentence(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BridgeError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::DuplicateEdge { .. } => "DuplicateEdge",
            BridgeError::DanglingEdge { .. } => "DanglingEdge",
            BridgeError::MissingEndpoint { .. } => "MissingEndpoint",
            BridgeError::VertexTypeMismatch { .. } => "VertexTypeMismatch",
            BridgeError::ConflictingPredicates { .. } => "ConflictingPredicates",
            BridgeError::MultiVertexScan { .. } => "MultiVertexScan",
            BridgeError::UnknownOrder { .. } => "UnknownOrder",
            BridgeError::InvalidShape(_) => "InvalidShape",
            BridgeError::UnresolvedField { .. } => "UnresolvedField",
            BridgeError::DisconnectedPattern { .. } => "DisconnectedPattern",
            BridgeError::InvalidSentence(_) => "InvalidSentence",
            BridgeError::Config(_) => "Config",
        }
    }

    /// Whether the error reports a structural invariant violation, as opposed to
    /// a semantic conflict or an environment problem.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            BridgeError::DuplicateEdge { .. }
                | BridgeError::DanglingEdge { .. }
                | BridgeError::MissingEndpoint { .. }
                | BridgeError::VertexTypeMismatch { .. }
                | BridgeError::MultiVertexScan { .. }
                | BridgeError::UnknownOrder { .. }
                | BridgeError::InvalidShape(_)
                | BridgeError::UnresolvedField { .. }
        )
    }
}

/// Convenience wrapper that formats bridge errors with their codes.
pub struct BridgeErrorWithCode<'a>(pub &'a BridgeError);

impl fmt::Display for BridgeErrorWithCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.0.code(), self.0)
    }
}
