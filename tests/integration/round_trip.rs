#![allow(missing_docs)]

use std::collections::BTreeSet;
use std::sync::Arc;

use pattern_bridge::{
    catalog::{HeuristicSelectivity, InMemoryCatalog},
    expr::{CmpOp, Expr},
    logical::{EdgeStep, MatchSentence, VertexStep},
    pattern::PatternDirection,
    physical::{GetVOpt, PhysicalNode, PhysicalOp},
    types::EdgeTypeId,
    BridgeConfig, PatternBridge,
};

const PERSON: u32 = 1;
const SOFTWARE: u32 = 2;

fn knows() -> EdgeTypeId {
    EdgeTypeId::new(10, PERSON, PERSON)
}

fn created() -> EdgeTypeId {
    EdgeTypeId::new(11, PERSON, SOFTWARE)
}

fn used_by() -> EdgeTypeId {
    EdgeTypeId::new(12, SOFTWARE, PERSON)
}

fn bridge() -> PatternBridge {
    let catalog = InMemoryCatalog::new()
        .with_vertex(PERSON, "PERSON")
        .with_vertex(SOFTWARE, "SOFTWARE")
        .with_edge(10, "KNOWS", [(PERSON, PERSON)])
        .with_edge(11, "CREATED", [(PERSON, SOFTWARE)])
        .with_edge(12, "USED_BY", [(SOFTWARE, PERSON)]);
    PatternBridge::new(
        Arc::new(catalog),
        Arc::new(HeuristicSelectivity),
        BridgeConfig::default(),
    )
}

fn older_than(alias: &str, age: i64) -> Expr {
    Expr::compare(CmpOp::Gt, Expr::prop(alias, "age"), Expr::lit(age))
}

/// Every node of the tree, descending into each shared sub-plan once per read.
fn walk<'a>(node: &'a PhysicalNode, out: &mut Vec<&'a PhysicalNode>) {
    out.push(node);
    for input in &node.inputs {
        walk(input, out);
    }
    if let PhysicalOp::CommonScan { table } = &node.op {
        walk(&table.plan, out);
    }
}

fn predicates(root: &PhysicalNode) -> BTreeSet<String> {
    let mut nodes = Vec::new();
    walk(root, &mut nodes);
    nodes
        .iter()
        .filter_map(|node| match &node.op {
            PhysicalOp::Filter { predicate } => Some(predicate.to_string()),
            _ => None,
        })
        .collect()
}

fn root_aliases(root: &PhysicalNode) -> BTreeSet<String> {
    root.output_fields().into_iter().map(|f| f.alias).collect()
}

#[test]
fn single_hop_lowers_to_scan_filter_expand_visit() {
    let sentence = MatchSentence::builder()
        .source(
            VertexStep::new([PERSON])
                .alias("a")
                .filter(older_than("a", 18)),
        )
        .expand(EdgeStep::out([knows()]).alias("e"))
        .get_v(VertexStep::new([PERSON]).alias("b"))
        .build();
    let out = bridge().plan_naive(&[sentence]).expect("plan");

    let root = &out.plan.root;
    match &root.op {
        PhysicalOp::GetVertex { opt, labels, alias } => {
            assert_eq!(*opt, GetVOpt::End);
            assert_eq!(alias, "b");
            assert_eq!(labels[0].name, "PERSON");
        }
        other => panic!("unexpected root {other:?}"),
    }
    let expand = &root.inputs[0];
    match &expand.op {
        PhysicalOp::Expand {
            direction,
            labels,
            alias,
            start_alias,
            optional,
            edge_type,
        } => {
            assert_eq!(*direction, PatternDirection::Out);
            assert_eq!(labels[0].name, "KNOWS");
            assert_eq!(alias.as_deref(), Some("e"));
            assert_eq!(start_alias, "a");
            assert!(!optional);
            assert_eq!(edge_type.entries().len(), 1);
        }
        other => panic!("unexpected traversal {other:?}"),
    }
    let filter = &expand.inputs[0];
    match &filter.op {
        PhysicalOp::Filter { predicate } => {
            assert_eq!(predicate.conjunctions(), vec![&older_than("a", 18)]);
        }
        other => panic!("unexpected filter {other:?}"),
    }
    match &filter.inputs[0].op {
        PhysicalOp::Scan { labels, alias } => {
            assert_eq!(alias, "a");
            assert_eq!(labels[0].name, "PERSON");
        }
        other => panic!("unexpected scan {other:?}"),
    }
}

#[test]
fn aliases_and_predicates_survive_the_round_trip() {
    let weight = Expr::compare(CmpOp::Ge, Expr::prop("k", "weight"), Expr::lit(0.5));
    let name = Expr::compare(CmpOp::Eq, Expr::prop("s", "name"), Expr::lit("lop"));
    let sentences = [
        MatchSentence::builder()
            .source(
                VertexStep::new([PERSON])
                    .alias("a")
                    .filter(older_than("a", 18)),
            )
            .expand(EdgeStep::out([knows()]).alias("k").filter(weight.clone()))
            .get_v(VertexStep::new([PERSON]).alias("b"))
            .build(),
        MatchSentence::builder()
            .source(VertexStep::new([PERSON]).alias("b"))
            .expand(EdgeStep::out([created()]).alias("c"))
            .get_v(VertexStep::new([SOFTWARE]).alias("s").filter(name.clone()))
            .build(),
    ];
    let out = bridge().plan_naive(&sentences).expect("plan");

    let expected_aliases: BTreeSet<String> =
        ["a", "b", "c", "k", "s"].into_iter().map(String::from).collect();
    assert_eq!(root_aliases(&out.plan.root), expected_aliases);

    let expected_predicates: BTreeSet<String> = [older_than("a", 18), weight, name]
        .iter()
        .map(Expr::to_string)
        .collect();
    assert_eq!(predicates(&out.plan.root), expected_predicates);
}

#[test]
fn independent_targets_are_not_intersected() {
    let sentences = [
        MatchSentence::builder()
            .source(VertexStep::new([PERSON]).alias("a"))
            .expand(EdgeStep::out([knows()]).alias("e1"))
            .get_v(VertexStep::new([PERSON]).alias("b"))
            .build(),
        MatchSentence::builder()
            .source(VertexStep::new([PERSON]).alias("a"))
            .expand(EdgeStep::out([knows()]).alias("e2"))
            .get_v(VertexStep::new([PERSON]).alias("c"))
            .build(),
    ];
    let out = bridge().plan_naive(&sentences).expect("plan");
    let mut nodes = Vec::new();
    walk(&out.plan.root, &mut nodes);

    assert!(nodes.iter().all(|node| !matches!(
        node.op,
        PhysicalOp::Join { .. } | PhysicalOp::MultiJoin { .. } | PhysicalOp::CommonScan { .. }
    )));
    let starts: Vec<&str> = nodes
        .iter()
        .filter_map(|node| match &node.op {
            PhysicalOp::Expand { start_alias, .. } => Some(start_alias.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(starts, vec!["a", "a"]);
    let expected: BTreeSet<String> = ["a", "b", "c", "e1", "e2"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(root_aliases(&out.plan.root), expected);
}

#[test]
fn closing_a_triangle_intersects_on_the_target() {
    let sentences = [
        MatchSentence::builder()
            .source(
                VertexStep::new([PERSON])
                    .alias("a")
                    .filter(older_than("a", 30)),
            )
            .expand(EdgeStep::out([knows()]).alias("ab"))
            .get_v(VertexStep::new([PERSON]).alias("b"))
            .expand(EdgeStep::out([knows()]).alias("bc"))
            .get_v(VertexStep::new([PERSON]).alias("c"))
            .build(),
        MatchSentence::builder()
            .source(VertexStep::new([PERSON]).alias("a"))
            .expand(EdgeStep::out([knows()]).alias("ac"))
            .get_v(VertexStep::new([PERSON]).alias("c"))
            .build(),
    ];
    let out = bridge().plan_naive(&sentences).expect("plan");
    let root = &out.plan.root;

    let PhysicalOp::MultiJoin { condition } = &root.op else {
        panic!("expected an intersection, got {}", root.op.name());
    };
    assert_eq!(root.inputs.len(), 2);

    let fields = condition.referenced_fields();
    assert_eq!(fields.len(), 2);
    assert!(fields.iter().all(|field| field.alias == "c"));
    let left_width = root.inputs[0].output_fields().len();
    assert_eq!(fields[0].index, left_width - 1);
    assert_eq!(fields[1].index, left_width + root.inputs[1].output_fields().len() - 1);

    let tables: Vec<_> = root
        .inputs
        .iter()
        .map(|branch| {
            let mut nodes = Vec::new();
            walk(branch, &mut nodes);
            nodes
                .iter()
                .find_map(|node| match &node.op {
                    PhysicalOp::CommonScan { table } => Some(Arc::clone(table)),
                    _ => None,
                })
                .expect("branch reads the shared frontier")
        })
        .collect();
    assert!(Arc::ptr_eq(&tables[0], &tables[1]));

    let mut frontier = Vec::new();
    walk(&tables[0].plan, &mut frontier);
    let scans = frontier
        .iter()
        .filter(|node| matches!(node.op, PhysicalOp::Scan { .. }))
        .count();
    let filters = frontier
        .iter()
        .filter(|node| matches!(node.op, PhysicalOp::Filter { .. }))
        .count();
    assert_eq!((scans, filters), (1, 1));

    let explain = out.explain.to_text();
    let scan_lines = explain
        .lines()
        .filter(|line| line.trim_start().starts_with("Scan ["))
        .count();
    assert_eq!(scan_lines, 1);
    assert!(explain.contains("MultiJoin"));
}

#[test]
fn optional_sentence_marks_traversal_optional() {
    let sentences = [
        MatchSentence::builder()
            .source(VertexStep::new([PERSON]).alias("a"))
            .expand(EdgeStep::out([created()]).alias("c"))
            .get_v(VertexStep::new([SOFTWARE]).alias("s"))
            .optional()
            .build(),
    ];
    let out = bridge().plan_naive(&sentences).expect("plan");
    let mut nodes = Vec::new();
    walk(&out.plan.root, &mut nodes);
    let optional = nodes.iter().find_map(|node| match &node.op {
        PhysicalOp::Expand { optional, .. } => Some(*optional),
        _ => None,
    });
    assert_eq!(optional, Some(true));
    assert!(out.session.pattern.vertices().all(|(_, v)| v.details.optional));
}

#[test]
fn ranged_edge_predicate_is_applied_inside_the_path() {
    let hops = Expr::compare(CmpOp::Gt, Expr::prop("p", "weight"), Expr::lit(1_i64));
    let sentence = MatchSentence::builder()
        .source(VertexStep::new([PERSON]).alias("a"))
        .path_expand(
            EdgeStep::out([knows()]).alias("p").filter(hops.clone()),
            2,
            4,
            [PERSON],
        )
        .get_v(VertexStep::new([PERSON]).alias("b"))
        .build();
    let out = bridge().plan_naive(&[sentence]).expect("plan");

    let root = &out.plan.root;
    let PhysicalOp::GetVertex { opt, alias, .. } = &root.op else {
        panic!("unexpected root {}", root.op.name());
    };
    assert_eq!(*opt, GetVOpt::End);
    assert_eq!(alias, "b");
    match &root.inputs[0].op {
        PhysicalOp::PathExpand {
            alias,
            edge_filter,
            start_alias,
            range,
            inner_opt,
            ..
        } => {
            assert_eq!(alias.as_deref(), Some("p"));
            assert_eq!(edge_filter.as_ref(), Some(&hops));
            assert_eq!(start_alias, "a");
            assert_eq!(range.to_string(), "2..4");
            assert_eq!(*inner_opt, GetVOpt::End);
        }
        other => panic!("unexpected traversal {other:?}"),
    }
    assert!(predicates(root).is_empty());
}

#[test]
fn incoming_edge_extends_from_the_target_side() {
    let sentence = MatchSentence::builder()
        .source(VertexStep::new([PERSON]).alias("a"))
        .expand(EdgeStep::incoming([used_by()]).alias("u"))
        .get_v(VertexStep::new([SOFTWARE]).alias("s"))
        .build();
    let out = bridge().plan_naive(&[sentence]).expect("plan");

    let root = &out.plan.root;
    let PhysicalOp::GetVertex { opt, alias, labels } = &root.op else {
        panic!("unexpected root {}", root.op.name());
    };
    assert_eq!(*opt, GetVOpt::Start);
    assert_eq!(alias, "s");
    assert_eq!(labels[0].name, "SOFTWARE");
    match &root.inputs[0].op {
        PhysicalOp::Expand {
            direction,
            alias,
            start_alias,
            labels,
            ..
        } => {
            assert_eq!(*direction, PatternDirection::In);
            assert_eq!(alias.as_deref(), Some("u"));
            assert_eq!(start_alias, "a");
            assert_eq!(labels[0].name, "USED_BY");
        }
        other => panic!("unexpected traversal {other:?}"),
    }
}

#[test]
fn undirected_edge_keeps_alias_and_predicate() {
    let since = Expr::compare(CmpOp::Ge, Expr::prop("f", "since"), Expr::lit(2010_i64));
    let sentence = MatchSentence::builder()
        .source(VertexStep::new([PERSON]).alias("a"))
        .expand(EdgeStep::both([knows()]).alias("f").filter(since.clone()))
        .get_v(VertexStep::new([PERSON]).alias("b"))
        .build();
    let out = bridge().plan_naive(&[sentence]).expect("plan");

    let root = &out.plan.root;
    let PhysicalOp::GetVertex { opt, alias, .. } = &root.op else {
        panic!("unexpected root {}", root.op.name());
    };
    assert_eq!(*opt, GetVOpt::Other);
    let start = if alias == "a" { "b" } else { "a" };

    let mut nodes = Vec::new();
    walk(root, &mut nodes);
    let expand = nodes
        .iter()
        .find_map(|node| match &node.op {
            PhysicalOp::Expand {
                direction,
                alias,
                start_alias,
                ..
            } => Some((*direction, alias.clone(), start_alias.clone())),
            _ => None,
        })
        .expect("expand");
    assert_eq!(expand, (PatternDirection::Both, Some("f".to_string()), start.to_string()));
    assert_eq!(predicates(root), BTreeSet::from([since.to_string()]));
}
