#![allow(missing_docs)]

use proptest::prelude::*;

use pattern_bridge::{
    pattern::{ElementDetails, Pattern, PatternEdge, PatternVertex, VertexIdx, DEFAULT_SEARCH_LIMIT},
    types::{EdgeTypeId, LabelId},
};

#[derive(Debug, Clone)]
struct Shape {
    labels: Vec<u32>,
    edges: Vec<(usize, usize, bool, u32)>,
    permutation: Vec<usize>,
}

fn arb_shape() -> impl Strategy<Value = Shape> {
    (1usize..=6).prop_flat_map(|n| {
        (
            prop::collection::vec(1u32..=2, n),
            prop::collection::vec((0..n, 0..n, any::<bool>(), 0u32..2), 0..10),
            Just((0..n).collect::<Vec<_>>()).prop_shuffle(),
        )
            .prop_map(|(labels, raw, permutation)| {
                let mut edges: Vec<(usize, usize, bool, u32)> = Vec::new();
                for (src, dst, both, ty) in raw {
                    let taken = edges.iter().any(|(s, d, b, _)| {
                        (*s == src && *d == dst) || (*s == dst && *d == src && (*b || both))
                    });
                    if src == dst || taken {
                        continue;
                    }
                    edges.push((src, dst, both, ty));
                }
                Shape {
                    labels,
                    edges,
                    permutation,
                }
            })
    })
}

/// Builds the shape inserting vertex `order[k]` k-th and the edges in `edge_order`.
fn build(shape: &Shape, order: &[usize], edge_order: &[usize]) -> Pattern {
    let mut pattern = Pattern::new();
    let mut handles: Vec<Option<VertexIdx>> = vec![None; shape.labels.len()];
    for original in order {
        let vertex = PatternVertex::new(
            *original,
            vec![LabelId(shape.labels[*original])],
            ElementDetails::default(),
        );
        handles[*original] = Some(pattern.add_vertex(vertex));
    }
    for idx in edge_order {
        let (src, dst, both, ty) = shape.edges[*idx];
        let edge = PatternEdge::new(
            100 + idx,
            handles[src].unwrap(),
            handles[dst].unwrap(),
            vec![EdgeTypeId::new(
                10 + ty,
                shape.labels[src],
                shape.labels[dst],
            )],
            both,
            ElementDetails::default(),
        );
        pattern.add_edge(edge).unwrap();
    }
    pattern.reorder(DEFAULT_SEARCH_LIMIT);
    pattern
}

fn identity(n: usize) -> Vec<usize> {
    (0..n).collect()
}

proptest! {
    #[test]
    fn prop_reorder_is_idempotent(shape in arb_shape()) {
        let pattern = build(&shape, &identity(shape.labels.len()), &identity(shape.edges.len()));
        let mut again = pattern.clone();
        again.reorder(DEFAULT_SEARCH_LIMIT);
        for (v, _) in pattern.vertices() {
            prop_assert_eq!(pattern.vertex_order(v), again.vertex_order(v));
        }
        for (e, _) in pattern.edges() {
            prop_assert_eq!(pattern.edge_order(e), again.edge_order(e));
        }
    }

    #[test]
    fn prop_order_ids_are_dense(shape in arb_shape()) {
        let pattern = build(&shape, &identity(shape.labels.len()), &identity(shape.edges.len()));
        let mut orders: Vec<usize> = pattern.vertices().map(|(v, _)| pattern.vertex_order(v)).collect();
        orders.sort_unstable();
        prop_assert_eq!(orders, identity(shape.labels.len()));
        let mut edge_orders: Vec<usize> = pattern.edges().map(|(e, _)| pattern.edge_order(e)).collect();
        edge_orders.sort_unstable();
        prop_assert_eq!(edge_orders, identity(shape.edges.len()));
    }

    #[test]
    fn prop_canonical_code_ignores_insertion_order(shape in arb_shape()) {
        let forward = build(&shape, &identity(shape.labels.len()), &identity(shape.edges.len()));
        let reversed_edges: Vec<usize> = identity(shape.edges.len()).into_iter().rev().collect();
        let permuted = build(&shape, &shape.permutation, &reversed_edges);
        prop_assert_eq!(forward.canonical_code(), permuted.canonical_code());
        prop_assert_eq!(forward.canonical_hash(), permuted.canonical_hash());

        // Same structure at every order id.
        for (e, edge) in forward.edges() {
            let src = forward.vertex_order(edge.src);
            let dst = forward.vertex_order(edge.dst);
            let twin = permuted.edges().find(|(_, other)| {
                permuted.vertex_order(other.src) == src && permuted.vertex_order(other.dst) == dst
                    || other.both
                        && edge.both
                        && permuted.vertex_order(other.src) == dst
                        && permuted.vertex_order(other.dst) == src
            });
            prop_assert!(twin.is_some(), "edge order {} has no counterpart", forward.edge_order(e));
        }
    }
}
