//! Output direction: planner shapes to operator trees.
//!
//! Every recursive step receives the side table keyed by the pattern it is
//! materializing and hands re-keyed copies to its children. Aliases and
//! predicates missing from a table fall back to synthetic names.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::catalog::{PropertyDef, SchemaCatalog};
use crate::expr::{Expr, Variable};
use crate::pattern::{EdgeIdx, Pattern, VertexIdx};
use crate::physical::{
    CommonTable, EdgeSchemaType, EdgeTypeEntry, FieldKind, GetVOpt, LabelRef, PathOpt,
    PathResultOpt, PhysicalNode, PhysicalOp, PhysicalPlan, ProjectItem,
};
use crate::shape::{ExtendEdge, ExtendIntersectEdge, JoinDecomposition, PatternPlan};
use crate::side_table::{DataKey, DataValue, ParentPattern, SideTable};
use crate::types::{BridgeError, EdgeTypeId, LabelId, Result};

/// Turns [`PatternPlan`]s into [`PhysicalPlan`]s, resolving labels through a
/// schema catalog.
pub struct PlanMaterializer<'a> {
    catalog: &'a dyn SchemaCatalog,
    next_table: usize,
}

impl<'a> PlanMaterializer<'a> {
    /// Creates a materializer reading label names from `catalog`.
    pub fn new(catalog: &'a dyn SchemaCatalog) -> Self {
        Self {
            catalog,
            next_table: 0,
        }
    }

    /// Materializes `plan`; `table` must be keyed by the order ids of
    /// `plan.pattern()`.
    pub fn materialize(&mut self, plan: &PatternPlan, table: &SideTable) -> Result<PhysicalPlan> {
        let root = self.visit(plan, table)?;
        debug!(
            pattern = %plan.pattern().id(),
            root = root.op.name(),
            fields = root.output_fields().len(),
            "bridge.output.done"
        );
        Ok(PhysicalPlan::new(root))
    }

    fn visit(&mut self, plan: &PatternPlan, table: &SideTable) -> Result<PhysicalNode> {
        match plan {
            PatternPlan::Vertex(pattern) => self.visit_vertex(pattern, table),
            PatternPlan::ExtendIntersect { edge, input } => self.visit_extend(edge, input, table),
            PatternPlan::JoinDecomposition(decomposition) => {
                self.visit_join(decomposition, table)
            }
        }
    }

    fn visit_vertex(&mut self, pattern: &Pattern, table: &SideTable) -> Result<PhysicalNode> {
        let mut vertices = pattern.vertices();
        let (Some((idx, vertex)), None) = (vertices.next(), vertices.next()) else {
            return Err(BridgeError::MultiVertexScan {
                pattern: pattern.id(),
                vertices: pattern.vertex_count(),
            });
        };
        let value = table.vertex_value(pattern.vertex_order(idx), vertex.id);
        let alias = vertex_alias(&value, vertex.id);
        trace!(alias = %alias, pattern = %pattern.id(), "bridge.output.scan");
        let scan = PhysicalNode::new(PhysicalOp::Scan {
            labels: self.vertex_labels(vertex.type_ids()),
            alias,
        });
        Ok(with_filter(scan, value.filter))
    }

    fn visit_extend(
        &mut self,
        ie: &ExtendIntersectEdge,
        input: &PatternPlan,
        table: &SideTable,
    ) -> Result<PhysicalNode> {
        let step = &ie.step;
        if step.edges.is_empty() {
            return Err(BridgeError::InvalidShape(format!(
                "extend step towards order {} has no edges",
                step.target_order
            )));
        }
        check_input(&ie.src_pattern, input, "extend input")?;
        let mut keys = vec![DataKey::vertex(step.target_order)];
        for edge in &step.edges {
            if let Some(src) = ie.src_to_target.get(edge.src_order) {
                keys.push(DataKey::edge(src, step.target_order, edge.direction));
                keys.push(DataKey::vertex(src));
            }
        }
        let edge_table = table.restrict(keys);
        let child_table = table.remap_sub_pattern(&ie.src_pattern, &ie.src_to_target, None);
        let child = self.visit(input, &child_table)?;

        if let [edge] = step.edges.as_slice() {
            return self.expand_get_v(edge, ie, &edge_table, child);
        }

        let shared = Arc::new(CommonTable {
            id: self.next_table,
            plan: child,
        });
        self.next_table += 1;
        let branches = step
            .edges
            .iter()
            .map(|edge| {
                let scan = PhysicalNode::new(PhysicalOp::CommonScan {
                    table: Arc::clone(&shared),
                });
                self.expand_get_v(edge, ie, &edge_table, scan)
            })
            .collect::<Result<Vec<_>>>()?;
        let condition = self.intersect_condition(ie, &edge_table, &branches)?;
        debug!(
            target = step.target_order,
            branches = branches.len(),
            table = shared.id,
            "bridge.output.intersect"
        );
        Ok(PhysicalNode::with_inputs(
            PhysicalOp::MultiJoin { condition },
            branches,
        ))
    }

    fn intersect_condition(
        &self,
        ie: &ExtendIntersectEdge,
        edge_table: &SideTable,
        branches: &[PhysicalNode],
    ) -> Result<Expr> {
        let target_order = ie.step.target_order;
        let target = ie.dst_pattern.require_vertex(target_order)?;
        let value = edge_table.vertex_value(target_order, ie.dst_pattern.vertex(target).id);
        let alias = vertex_alias(&value, ie.dst_pattern.vertex(target).id);

        let mut offset = 0;
        let mut located = Vec::with_capacity(branches.len());
        for branch in branches {
            located.push(branch.resolve(&alias)?.shifted(offset));
            offset += branch.output_fields().len();
        }
        let equalities = located
            .windows(2)
            .map(|pair| Expr::fields_equal(pair[0].clone(), pair[1].clone()));
        Ok(Expr::and_all(equalities).unwrap_or_else(|| Expr::lit(true)))
    }

    fn expand_get_v(
        &self,
        edge: &ExtendEdge,
        ie: &ExtendIntersectEdge,
        edge_table: &SideTable,
        input: PhysicalNode,
    ) -> Result<PhysicalNode> {
        let target_order = ie.step.target_order;
        let src_in_target = ie.src_to_target.get(edge.src_order);
        let edge_value = src_in_target
            .map(|src| edge_table.edge_value(&DataKey::edge(src, target_order, edge.direction)))
            .unwrap_or_default();

        let src_vertex = ie.src_pattern.require_vertex(edge.src_order)?;
        let src_id = ie.src_pattern.vertex(src_vertex).id;
        let src_value = match src_in_target {
            Some(order) => edge_table.vertex_value(order, src_id),
            None => DataValue::synthetic_vertex(src_id),
        };
        let start_alias = vertex_alias(&src_value, src_id);

        let target = ie.dst_pattern.vertex(ie.dst_pattern.require_vertex(target_order)?);
        let target_value = edge_table.vertex_value(target_order, target.id);
        let target_alias = vertex_alias(&target_value, target.id);
        let target_labels = self.vertex_labels(target.type_ids());

        let labels = self.edge_labels(&edge.types);
        let edge_type = self.edge_schema_type(&edge.types);
        trace!(
            start = %start_alias,
            target = %target_alias,
            direction = %edge.direction,
            ranged = edge.details.range.is_some(),
            "bridge.output.expand"
        );

        let node = match edge.details.range {
            Some(range) => {
                let path = PhysicalNode::unary(
                    PhysicalOp::PathExpand {
                        direction: edge.direction,
                        labels,
                        edge_filter: edge_value.filter,
                        inner_opt: GetVOpt::closing(edge.direction),
                        inner_labels: self.vertex_labels(&edge.details.inner_vertex_types),
                        range,
                        result: PathResultOpt::EndVertex,
                        path: PathOpt::Arbitrary,
                        alias: edge_value.alias,
                        start_alias,
                        optional: edge.details.optional,
                        edge_type,
                    },
                    input,
                );
                PhysicalNode::unary(
                    PhysicalOp::GetVertex {
                        opt: GetVOpt::End,
                        labels: target_labels,
                        alias: target_alias,
                    },
                    path,
                )
            }
            None => {
                let expand = PhysicalNode::unary(
                    PhysicalOp::Expand {
                        direction: edge.direction,
                        labels,
                        alias: edge_value.alias,
                        start_alias,
                        optional: edge.details.optional,
                        edge_type,
                    },
                    input,
                );
                PhysicalNode::unary(
                    PhysicalOp::GetVertex {
                        opt: GetVOpt::closing(edge.direction),
                        labels: target_labels,
                        alias: target_alias,
                    },
                    with_filter(expand, edge_value.filter),
                )
            }
        };
        Ok(with_filter(node, target_value.filter))
    }

    fn visit_join(&mut self, d: &JoinDecomposition, table: &SideTable) -> Result<PhysicalNode> {
        check_input(&d.probe_pattern, &d.probe, "probe")?;
        check_input(&d.build_pattern, &d.build, "build")?;
        let joint_table = table.restrict(
            d.join_vertices
                .iter()
                .filter_map(|pair| d.build_to_parent.get(pair.build_order))
                .map(DataKey::vertex),
        );
        let probe_table = table.remap_sub_pattern(
            &d.probe_pattern,
            &d.probe_to_parent,
            Some(ParentPattern {
                pattern: &d.parent,
                side: 0,
            }),
        );
        let build_table = table.remap_sub_pattern(
            &d.build_pattern,
            &d.build_to_parent,
            Some(ParentPattern {
                pattern: &d.parent,
                side: 1,
            }),
        );
        let left = self.visit(&d.probe, &probe_table)?;
        let right = self.visit(&d.build, &build_table)?;

        let left_width = left.output_fields().len();
        let mut equalities = Vec::with_capacity(d.join_vertices.len());
        for pair in &d.join_vertices {
            let build_vertex = d.build_pattern.require_vertex(pair.build_order)?;
            let id = d.build_pattern.vertex(build_vertex).id;
            let value = match d.build_to_parent.get(pair.build_order) {
                Some(order) => joint_table.vertex_value(order, id),
                None => DataValue::synthetic_vertex(id),
            };
            let alias = vertex_alias(&value, id);
            let l = left.resolve(&alias)?;
            let r = right.resolve(&alias)?.shifted(left_width);
            equalities.push(Expr::fields_equal(l, r));
        }
        let condition = Expr::and_all(equalities).unwrap_or_else(|| Expr::lit(true));
        debug!(
            pattern = %d.parent.id(),
            joints = d.join_vertices.len(),
            "bridge.output.join"
        );
        let join = PhysicalNode::with_inputs(PhysicalOp::Join { condition }, vec![left, right]);

        let segments = split_segments(d, &probe_table, &build_table)?;
        if segments.is_empty() {
            return Ok(join);
        }
        reassemble_paths(join, &segments)
    }

    fn vertex_labels(&self, ids: &[LabelId]) -> Vec<LabelRef> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        ids.into_iter()
            .filter_map(|id| {
                self.catalog.vertex_label(id).map(|label| LabelRef {
                    id,
                    name: label.name.clone(),
                })
            })
            .collect()
    }

    fn edge_labels(&self, types: &[EdgeTypeId]) -> Vec<LabelRef> {
        let mut ids: Vec<LabelId> = types.iter().map(|t| t.edge_label).collect();
        ids.sort();
        ids.dedup();
        ids.into_iter()
            .filter_map(|id| {
                self.catalog.edge_label(id).map(|label| LabelRef {
                    id,
                    name: label.name.clone(),
                })
            })
            .collect()
    }

    /// Edge type descriptor for `types`; triples the catalog does not declare
    /// are dropped.
    fn edge_schema_type(&self, types: &[EdgeTypeId]) -> EdgeSchemaType {
        let mut entries = Vec::new();
        let mut properties: Vec<PropertyDef> = Vec::new();
        for ty in types {
            let Some(edge) = self.catalog.edge_label(ty.edge_label) else {
                continue;
            };
            if !edge.relations.contains(&(ty.src_label, ty.dst_label)) {
                continue;
            }
            let (Some(src), Some(dst)) = (
                self.catalog.vertex_label(ty.src_label),
                self.catalog.vertex_label(ty.dst_label),
            ) else {
                continue;
            };
            entries.push(EdgeTypeEntry {
                label: LabelRef {
                    id: edge.id,
                    name: edge.name.clone(),
                },
                src: LabelRef {
                    id: src.id,
                    name: src.name.clone(),
                },
                dst: LabelRef {
                    id: dst.id,
                    name: dst.name.clone(),
                },
            });
            for prop in &edge.properties {
                if !properties.iter().any(|p| p.id == prop.id) {
                    properties.push(prop.clone());
                }
            }
        }
        if entries.len() == 1 {
            let entry = entries.remove(0);
            EdgeSchemaType::Single { entry, properties }
        } else {
            EdgeSchemaType::Union {
                entries,
                properties,
            }
        }
    }
}

/// Probe and build halves of one path split at a joint vertex.
struct SplitSegment {
    probe_alias: String,
    build_alias: String,
    parent_alias: String,
    /// Whether the probe half starts at the source of the unsplit edge.
    probe_first: bool,
}

fn split_segments(
    d: &JoinDecomposition,
    probe_table: &SideTable,
    build_table: &SideTable,
) -> Result<Vec<SplitSegment>> {
    let mut segments = Vec::new();
    for pair in &d.join_vertices {
        let probe_vertex = d.probe_pattern.require_vertex(pair.probe_order)?;
        let build_vertex = d.build_pattern.require_vertex(pair.build_order)?;
        let (&[probe_edge], &[build_edge]) = (
            d.probe_pattern.edges_of(probe_vertex),
            d.build_pattern.edges_of(build_vertex),
        ) else {
            continue;
        };
        let probe_value = probe_table.get(&DataKey::of_edge(&d.probe_pattern, probe_edge));
        let build_value = build_table.get(&DataKey::of_edge(&d.build_pattern, build_edge));
        let (Some(probe_value), Some(build_value)) = (probe_value, build_value) else {
            continue;
        };
        match (
            &probe_value.parent_alias,
            &build_value.parent_alias,
            &probe_value.alias,
            &build_value.alias,
        ) {
            (Some(probe_parent), Some(build_parent), Some(probe_alias), Some(build_alias))
                if probe_parent == build_parent =>
            {
                segments.push(SplitSegment {
                    probe_alias: probe_alias.clone(),
                    build_alias: build_alias.clone(),
                    parent_alias: probe_parent.clone(),
                    probe_first: probe_holds_source(d, probe_vertex, probe_edge),
                });
            }
            _ => {}
        }
    }
    Ok(segments)
}

/// Whether the far end of the probe segment is the source of the parent edge
/// it was cut from. Defaults to probe first when the parent edge or the far
/// end is unknown.
fn probe_holds_source(d: &JoinDecomposition, joint: VertexIdx, segment: EdgeIdx) -> bool {
    let edge = d.probe_pattern.edge(segment);
    let Some(parent_edge) = d.parent.edge_by_id(edge.id) else {
        return true;
    };
    let parent_src = d.parent.vertex_order(d.parent.edge(parent_edge).src);
    match edge.other(joint) {
        Some(far) => d
            .probe_to_parent
            .get(d.probe_pattern.vertex_order(far))
            .map_or(true, |order| order == parent_src),
        None => true,
    }
}

/// Projects the join output without the segment fields and with one
/// concatenated path per split path.
fn reassemble_paths(join: PhysicalNode, segments: &[SplitSegment]) -> Result<PhysicalNode> {
    let fields = join.output_fields();
    let mut items: Vec<ProjectItem> = Vec::new();
    for (index, field) in fields.iter().enumerate() {
        let is_segment = segments
            .iter()
            .any(|s| s.probe_alias == field.alias || s.build_alias == field.alias);
        if is_segment || items.iter().any(|item| item.alias == field.alias) {
            continue;
        }
        items.push(ProjectItem {
            expr: Expr::field(Variable::new(field.alias.clone(), index)),
            alias: field.alias.clone(),
            kind: field.kind,
        });
    }
    for segment in segments {
        let probe = join.resolve(&segment.probe_alias)?;
        let build = join.resolve(&segment.build_alias)?;
        trace!(
            path = %segment.parent_alias,
            probe_first = segment.probe_first,
            "bridge.output.concat"
        );
        let parts = if segment.probe_first {
            vec![Expr::field(probe), Expr::field(build)]
        } else {
            vec![Expr::field(build), Expr::field(probe)]
        };
        items.push(ProjectItem {
            expr: Expr::path_concat(parts),
            alias: segment.parent_alias.clone(),
            kind: FieldKind::Path,
        });
    }
    Ok(PhysicalNode::unary(
        PhysicalOp::Project {
            items,
            append: false,
        },
        join,
    ))
}

/// Fails unless `plan` produces `expected`, the pattern its side table is
/// keyed for.
fn check_input(expected: &Pattern, plan: &PatternPlan, role: &str) -> Result<()> {
    let actual = plan.pattern();
    if actual.id() != expected.id()
        || actual.vertex_count() != expected.vertex_count()
        || actual.edge_count() != expected.edge_count()
    {
        return Err(BridgeError::InvalidShape(format!(
            "{role} plan produces pattern {} ({} vertices, {} edges) but the shape expects \
             pattern {} ({} vertices, {} edges)",
            actual.id(),
            actual.vertex_count(),
            actual.edge_count(),
            expected.id(),
            expected.vertex_count(),
            expected.edge_count(),
        )));
    }
    Ok(())
}

fn vertex_alias(value: &DataValue, id: usize) -> String {
    value
        .alias
        .clone()
        .unwrap_or_else(|| DataValue::synthetic_vertex(id).alias.unwrap_or_default())
}

fn with_filter(node: PhysicalNode, filter: Option<Expr>) -> PhysicalNode {
    match filter {
        Some(predicate) => PhysicalNode::unary(PhysicalOp::Filter { predicate }, node),
        None => node,
    }
}
