#![allow(missing_docs)]

use pattern_bridge::{
    builder::{CompilationSession, PatternBuilder},
    catalog::{HeuristicSelectivity, InMemoryCatalog},
    logical::{EdgeStep, MatchSentence, VertexStep},
    materializer::PlanMaterializer,
    pattern::{
        ElementDetails, OrderMapping, PathExpandRange, Pattern, PatternEdge, PatternVertex,
        DEFAULT_SEARCH_LIMIT,
    },
    expr::Expr,
    physical::{FieldKind, PhysicalNode, PhysicalOp},
    shape::{naive_extend_chain, JoinDecomposition, JoinVertexPair, PatternPlan},
    types::{EdgeTypeId, LabelId},
};

const PERSON: u32 = 1;

fn knows() -> EdgeTypeId {
    EdgeTypeId::new(10, PERSON, PERSON)
}

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_vertex(PERSON, "PERSON")
        .with_edge(10, "KNOWS", [(PERSON, PERSON)])
}

fn build(sentences: &[MatchSentence]) -> CompilationSession {
    PatternBuilder::new(&HeuristicSelectivity)
        .build(sentences)
        .expect("build")
}

fn decomposition(
    parent: &Pattern,
    probe_pattern: Pattern,
    build_pattern: Pattern,
    joint_id: usize,
) -> PatternPlan {
    let probe_to_parent = OrderMapping::by_vertex_id(&probe_pattern, parent);
    let build_to_parent = OrderMapping::by_vertex_id(&build_pattern, parent);
    let probe_joint = probe_pattern.vertex_by_id(joint_id).expect("probe joint");
    let build_joint = build_pattern.vertex_by_id(joint_id).expect("build joint");
    let joint = JoinVertexPair {
        probe_order: probe_pattern.vertex_order(probe_joint),
        build_order: build_pattern.vertex_order(build_joint),
    };
    let probe = naive_extend_chain(&probe_pattern, DEFAULT_SEARCH_LIMIT).expect("probe chain");
    let build = naive_extend_chain(&build_pattern, DEFAULT_SEARCH_LIMIT).expect("build chain");
    PatternPlan::JoinDecomposition(Box::new(JoinDecomposition {
        parent: parent.clone(),
        probe_pattern,
        build_pattern,
        probe_to_parent,
        build_to_parent,
        join_vertices: vec![joint],
        probe,
        build,
    }))
}

fn person(id: usize) -> PatternVertex {
    PatternVertex::new(id, vec![LabelId(PERSON)], ElementDetails::default())
}

/// `src -[id, 3..4]-> dst` as a canonical two-vertex pattern.
fn segment(src_id: usize, edge_id: usize, dst_id: usize) -> Pattern {
    let mut p = Pattern::new();
    let src = p.add_vertex(person(src_id));
    let dst = p.add_vertex(person(dst_id));
    let details = ElementDetails::default()
        .with_range(PathExpandRange::new(3, 1), [LabelId(PERSON)]);
    p.add_edge(PatternEdge::new(edge_id, src, dst, vec![knows()], false, details))
        .expect("edge");
    p.reorder(DEFAULT_SEARCH_LIMIT);
    p
}

fn walk<'a>(node: &'a PhysicalNode, out: &mut Vec<&'a PhysicalNode>) {
    out.push(node);
    for input in &node.inputs {
        walk(input, out);
    }
}

#[test]
fn split_path_is_reassembled_under_its_alias() {
    let session = split_path_session();
    let parent = &session.pattern;
    let (_, path) = parent.edges().next().expect("path edge");
    assert_eq!(path.details.range, Some(PathExpandRange::new(6, 1)));
    let a_id = parent.vertex(parent.vertex_by_order(0).expect("a")).id;
    let b_id = parent.vertex(parent.vertex_by_order(1).expect("b")).id;

    let joint_id = 100;
    let plan = decomposition(
        parent,
        segment(a_id, path.id, joint_id),
        segment(joint_id, path.id, b_id),
        joint_id,
    );
    let catalog = catalog();
    let physical = PlanMaterializer::new(&catalog)
        .materialize(&plan, &session.side_table)
        .expect("materialize");

    let root = &physical.root;
    let PhysicalOp::Project { append, .. } = &root.op else {
        panic!("expected reassembly projection, got {}", root.op.name());
    };
    assert!(!append);
    assert!(matches!(root.inputs[0].op, PhysicalOp::Join { .. }));

    let fields = root.output_fields();
    let paths: Vec<_> = fields.iter().filter(|f| f.kind == FieldKind::Path).collect();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].alias, "p");
    assert!(fields.iter().all(|f| !f.alias.contains("$p_")));
    for alias in ["a", "b"] {
        assert_eq!(fields.iter().filter(|f| f.alias == alias).count(), 1);
    }

    let mut nodes = Vec::new();
    walk(root, &mut nodes);
    let segments: Vec<(String, String)> = nodes
        .iter()
        .filter_map(|node| match &node.op {
            PhysicalOp::PathExpand { alias, range, .. } => {
                Some((alias.clone().unwrap_or_default(), range.to_string()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        segments,
        vec![
            ("p$p_0".to_string(), "3..4".to_string()),
            ("p$p_1".to_string(), "3..4".to_string()),
        ]
    );
}

fn split_path_session() -> CompilationSession {
    build(&[MatchSentence::builder()
        .source(VertexStep::new([PERSON]).alias("a"))
        .path_expand(EdgeStep::out([knows()]).alias("p"), 6, 7, [PERSON])
        .get_v(VertexStep::new([PERSON]).alias("b"))
        .build()])
}

/// Field aliases of the path concatenation projected under `alias`.
fn concat_parts(root: &PhysicalNode, alias: &str) -> Vec<String> {
    let PhysicalOp::Project { items, .. } = &root.op else {
        panic!("expected reassembly projection, got {}", root.op.name());
    };
    let item = items
        .iter()
        .find(|item| item.alias == alias)
        .expect("path item");
    let Expr::PathConcat { parts } = &item.expr else {
        panic!("expected a path concatenation, got {}", item.expr);
    };
    parts
        .iter()
        .map(|part| match part {
            Expr::Field { var } => var.alias.clone(),
            other => panic!("unexpected part {other}"),
        })
        .collect()
}

#[test]
fn split_path_keeps_source_to_target_order() {
    let session = split_path_session();
    let parent = &session.pattern;
    let (_, path) = parent.edges().next().expect("path edge");
    let a_id = parent.vertex(parent.vertex_by_order(0).expect("a")).id;
    let b_id = parent.vertex(parent.vertex_by_order(1).expect("b")).id;
    let joint_id = 100;
    let catalog = catalog();

    let forward = decomposition(
        parent,
        segment(a_id, path.id, joint_id),
        segment(joint_id, path.id, b_id),
        joint_id,
    );
    let physical = PlanMaterializer::new(&catalog)
        .materialize(&forward, &session.side_table)
        .expect("materialize");
    assert_eq!(concat_parts(&physical.root, "p"), vec!["p$p_0", "p$p_1"]);

    // The source half sits on the build side.
    let swapped = decomposition(
        parent,
        segment(joint_id, path.id, b_id),
        segment(a_id, path.id, joint_id),
        joint_id,
    );
    let physical = PlanMaterializer::new(&catalog)
        .materialize(&swapped, &session.side_table)
        .expect("materialize");
    assert_eq!(concat_parts(&physical.root, "p"), vec!["p$p_1", "p$p_0"]);
}

#[test]
fn join_over_mismatched_sub_plans_is_rejected() {
    let session = build(&[MatchSentence::builder()
        .source(VertexStep::new([PERSON]).alias("a"))
        .expand(EdgeStep::out([knows()]).alias("e1"))
        .get_v(VertexStep::new([PERSON]).alias("b"))
        .expand(EdgeStep::out([knows()]).alias("e2"))
        .get_v(VertexStep::new([PERSON]).alias("c"))
        .build()]);
    let parent = &session.pattern;
    let a = parent.vertex_by_order(0).expect("a");
    let b = parent.vertex_by_order(1).expect("b");
    let c = parent.vertex_by_order(2).expect("c");
    let probe = parent.induced(&[a, b], DEFAULT_SEARCH_LIMIT).expect("probe");
    let build_side = parent.induced(&[b, c], DEFAULT_SEARCH_LIMIT).expect("build");
    let mut plan = decomposition(parent, probe, build_side, parent.vertex(b).id);
    let PatternPlan::JoinDecomposition(d) = &mut plan else {
        panic!("expected a join decomposition");
    };
    d.probe = d.build.clone();

    let catalog = catalog();
    let err = PlanMaterializer::new(&catalog)
        .materialize(&plan, &session.side_table)
        .expect_err("probe plan covers the build pattern");
    assert_eq!(err.code(), "InvalidShape");
}

#[test]
fn join_condition_offsets_the_build_side() {
    let session = build(&[MatchSentence::builder()
        .source(VertexStep::new([PERSON]).alias("a"))
        .expand(EdgeStep::out([knows()]).alias("e1"))
        .get_v(VertexStep::new([PERSON]).alias("b"))
        .expand(EdgeStep::out([knows()]).alias("e2"))
        .get_v(VertexStep::new([PERSON]).alias("c"))
        .build()]);
    let parent = &session.pattern;
    let a = parent.vertex_by_order(0).expect("a");
    let b = parent.vertex_by_order(1).expect("b");
    let c = parent.vertex_by_order(2).expect("c");
    let probe = parent.induced(&[a, b], DEFAULT_SEARCH_LIMIT).expect("probe");
    let build_side = parent.induced(&[b, c], DEFAULT_SEARCH_LIMIT).expect("build");
    let plan = decomposition(parent, probe, build_side, parent.vertex(b).id);

    let catalog = catalog();
    let physical = PlanMaterializer::new(&catalog)
        .materialize(&plan, &session.side_table)
        .expect("materialize");
    let root = &physical.root;
    let PhysicalOp::Join { condition } = &root.op else {
        panic!("expected a plain join, got {}", root.op.name());
    };

    let left = root.inputs[0].output_fields();
    let right = root.inputs[1].output_fields();
    let fields = condition.referenced_fields();
    assert_eq!(fields.len(), 2);
    assert!(fields.iter().all(|f| f.alias == "b"));
    assert_eq!(left[fields[0].index].alias, "b");
    assert!(fields[1].index >= left.len());
    assert_eq!(right[fields[1].index - left.len()].alias, "b");

    let aliases: Vec<String> = root.output_fields().into_iter().map(|f| f.alias).collect();
    for alias in ["a", "e1", "b", "e2", "c"] {
        assert!(aliases.iter().any(|a| a == alias), "missing {alias}");
    }
}
