//! Input direction: match sentences to a canonical pattern plus side table.

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::catalog::SelectivityOracle;
use crate::error::EndpointSide;
use crate::expr::Expr;
use crate::logical::{EdgeStep, ExpandDirection, MatchSentence, MatchStep, PathStep, VertexStep};
use crate::pattern::{
    EdgeIdx, ElementDetails, PathExpandRange, Pattern, PatternEdge, PatternVertex, VertexIdx,
    DEFAULT_SEARCH_LIMIT,
};
use crate::side_table::{DataKey, DataValue, SideTable};
use crate::types::{BridgeError, LabelId, Result};

/// Result of the input direction: the canonical pattern and the metadata
/// needed to restore names and predicates on the way back.
#[derive(Clone, Debug)]
pub struct CompilationSession {
    /// Canonical pattern.
    pub pattern: Pattern,
    /// Order-keyed metadata of every element.
    pub side_table: SideTable,
}

/// Converts match sentences into a [`CompilationSession`].
pub struct PatternBuilder<'a> {
    oracle: &'a dyn SelectivityOracle,
    search_limit: usize,
}

impl<'a> PatternBuilder<'a> {
    /// Creates a builder estimating selectivities with `oracle`.
    pub fn new(oracle: &'a dyn SelectivityOracle) -> Self {
        Self {
            oracle,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    /// Caps the canonical labeling search.
    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    /// Builds one pattern out of all `sentences`.
    ///
    /// Sentences sharing an alias share the vertex. Any structural or
    /// predicate conflict aborts the whole build.
    pub fn build(&self, sentences: &[MatchSentence]) -> Result<CompilationSession> {
        let mut state = BuildState::new(self.oracle);
        for (idx, sentence) in sentences.iter().enumerate() {
            trace!(sentence = idx, steps = sentence.steps.len(), "bridge.input.sentence");
            state.visit_sentence(sentence)?;
        }
        state.finish(self.search_limit)
    }
}

struct BuildState<'a> {
    oracle: &'a dyn SelectivityOracle,
    pattern: Pattern,
    next_id: usize,
    aliases: FxHashMap<String, VertexIdx>,
    vertex_values: Vec<(VertexIdx, DataValue)>,
    edge_values: Vec<(EdgeIdx, DataValue)>,
}

impl<'a> BuildState<'a> {
    fn new(oracle: &'a dyn SelectivityOracle) -> Self {
        Self {
            oracle,
            pattern: Pattern::new(),
            next_id: 0,
            aliases: FxHashMap::default(),
            vertex_values: Vec::new(),
            edge_values: Vec::new(),
        }
    }

    fn next_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn visit_sentence(&mut self, sentence: &MatchSentence) -> Result<()> {
        let mut steps = sentence.steps.iter();
        let mut last = match steps.next() {
            Some(MatchStep::Source(source)) => self.visit_vertex(source)?,
            Some(other) => {
                return Err(BridgeError::InvalidSentence(format!(
                    "a sentence must start with a source step, found {}",
                    other.name()
                )))
            }
            None => return Err(BridgeError::InvalidSentence("empty sentence".into())),
        };
        while let Some(step) = steps.next() {
            let (edge, path) = match step {
                MatchStep::Expand(edge) => (edge, None),
                MatchStep::PathExpand(path) => (&path.edge, Some(path)),
                MatchStep::Source(_) | MatchStep::GetVertex(_) => {
                    return Err(BridgeError::InvalidSentence(format!(
                        "unexpected {} step after a vertex",
                        step.name()
                    )))
                }
            };
            let Some(MatchStep::GetVertex(target)) = steps.next() else {
                return Err(BridgeError::MissingEndpoint { step: step.name() });
            };
            let next = self.visit_vertex(target)?;
            self.visit_edge(edge, path, sentence.optional, last, next)?;
            last = next;
        }
        Ok(())
    }

    fn visit_vertex(&mut self, step: &VertexStep) -> Result<VertexIdx> {
        let predicate = step.predicate();
        if let Some(existing) = step.alias.as_ref().and_then(|a| self.aliases.get(a)) {
            let existing = *existing;
            if let Some(redeclared) = &predicate {
                let previous = self.vertex_values[existing.index()].1.filter.as_ref();
                if !previous.is_some_and(|p| p.implies(redeclared)) {
                    return Err(BridgeError::ConflictingPredicates {
                        alias: step.alias.clone().unwrap_or_default(),
                        previous: previous.map(Expr::to_string),
                        redeclared: redeclared.to_string(),
                    });
                }
            }
            trace!(alias = ?step.alias, "bridge.input.vertex_reused");
            return Ok(existing);
        }

        let id = self.next_id();
        let selectivity = self
            .oracle
            .vertex_selectivity(&step.types, predicate.as_ref());
        let idx = self.pattern.add_vertex(PatternVertex::new(
            id,
            step.types.clone(),
            ElementDetails::new(selectivity),
        ));
        let value = match &step.alias {
            Some(alias) => {
                self.aliases.insert(alias.clone(), idx);
                DataValue::new(Some(alias.clone()), predicate)
            }
            None => DataValue {
                filter: predicate,
                ..DataValue::synthetic_vertex(id)
            },
        };
        debug!(
            vertex = id,
            alias = value.alias.as_deref().unwrap_or_default(),
            selectivity,
            "bridge.input.vertex"
        );
        self.vertex_values.push((idx, value));
        Ok(idx)
    }

    fn visit_edge(
        &mut self,
        step: &EdgeStep,
        path: Option<&PathStep>,
        optional: bool,
        last: VertexIdx,
        next: VertexIdx,
    ) -> Result<EdgeIdx> {
        let (src, dst) = match step.direction {
            ExpandDirection::Out | ExpandDirection::Both => (last, next),
            ExpandDirection::In => (next, last),
        };
        let id = self.next_id();
        let predicate = step.predicate();
        let selectivity = self.oracle.edge_selectivity(&step.types, predicate.as_ref());
        let mut details = ElementDetails::new(selectivity).with_optional(optional);
        if let Some(path) = path {
            let offset = path.offset.unwrap_or(0);
            let range = match path.fetch {
                Some(fetch) => PathExpandRange::new(offset, fetch),
                None => PathExpandRange::unbounded(offset),
            };
            details = details.with_range(range, path.inner_vertex_types.iter().copied());
        }
        let edge = PatternEdge::new(
            id,
            src,
            dst,
            step.types.clone(),
            step.direction == ExpandDirection::Both,
            details,
        );
        let idx = self.pattern.add_edge(edge)?;
        debug!(
            edge = id,
            alias = step.alias.as_deref().unwrap_or_default(),
            src = self.pattern.vertex(src).id,
            dst = self.pattern.vertex(dst).id,
            ranged = path.is_some(),
            optional,
            "bridge.input.edge"
        );
        self.edge_values
            .push((idx, DataValue::new(step.alias.clone(), predicate)));
        Ok(idx)
    }

    fn finish(mut self, search_limit: usize) -> Result<CompilationSession> {
        let optional: Vec<VertexIdx> = self
            .pattern
            .vertices()
            .map(|(idx, _)| idx)
            .filter(|idx| {
                self.pattern
                    .edges_of(*idx)
                    .iter()
                    .all(|e| self.pattern.edge(*e).details.optional)
            })
            .collect();
        for idx in optional {
            self.pattern.vertex_mut(idx).details.optional = true;
        }

        self.pattern.reorder(search_limit);
        check_pattern(&self.pattern)?;

        let mut side_table = SideTable::new();
        for (idx, value) in self.vertex_values {
            side_table.insert(DataKey::of_vertex(&self.pattern, idx), value);
        }
        for (idx, value) in self.edge_values {
            side_table.insert(DataKey::of_edge(&self.pattern, idx), value);
        }
        debug!(
            pattern = %self.pattern.id(),
            vertices = self.pattern.vertex_count(),
            edges = self.pattern.edge_count(),
            entries = side_table.len(),
            "bridge.input.done"
        );
        Ok(CompilationSession {
            pattern: self.pattern,
            side_table,
        })
    }
}

/// Verifies that every fixed-length edge's type triples agree exactly with
/// its endpoint vertex types. Undirected edges accept both orientations.
pub fn check_pattern(pattern: &Pattern) -> Result<()> {
    for (_, edge) in pattern.edges() {
        if edge.is_ranged() {
            continue;
        }
        let mut expected_src: Vec<LabelId> = Vec::new();
        let mut expected_dst: Vec<LabelId> = Vec::new();
        for ty in edge.type_ids() {
            expected_src.push(ty.src_label);
            expected_dst.push(ty.dst_label);
            if edge.both {
                expected_src.push(ty.dst_label);
                expected_dst.push(ty.src_label);
            }
        }
        let checks = [
            (EndpointSide::Src, edge.src, expected_src),
            (EndpointSide::Dst, edge.dst, expected_dst),
        ];
        for (side, vertex, mut expected) in checks {
            expected.sort();
            expected.dedup();
            let mut actual = pattern.vertex(vertex).type_ids().to_vec();
            actual.sort();
            actual.dedup();
            if actual != expected {
                return Err(BridgeError::VertexTypeMismatch {
                    side,
                    vertex_types: actual,
                    edge_types: edge.type_ids().to_vec(),
                });
            }
        }
    }
    Ok(())
}
