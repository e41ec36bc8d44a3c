//! Tests for join hypergraph construction: eligibility sets, edge
//! emission, and WHERE-predicate promotion.

use hyperplan::model::expr::Expr;
use hyperplan::planner::bitset::TableSet;
use hyperplan::planner::graph::{JoinGraph, JoinKind, JoinTree};
use hyperplan::planner::PlanError;

fn eq(left_table: &str, left_col: &str, right_table: &str, right_col: &str) -> Expr {
    Expr::eq(
        Expr::qualified_column(left_table, left_col),
        Expr::qualified_column(right_table, right_col),
    )
}

/// a JOIN b ON a.x = b.y JOIN c ON b.y = c.z
fn inner_chain() -> JoinTree {
    JoinTree::inner(
        JoinTree::inner(
            JoinTree::table("a"),
            JoinTree::table("b"),
            eq("a", "x", "b", "y"),
        ),
        JoinTree::table("c"),
        eq("b", "y", "c", "z"),
    )
}

#[test]
fn flatten_assigns_indices_left_to_right() {
    let graph = JoinGraph::build(&inner_chain(), &[]).unwrap();
    assert_eq!(graph.table_count(), 3);
    assert_eq!(graph.table_index("a"), Some(0));
    assert_eq!(graph.table_index("b"), Some(1));
    assert_eq!(graph.table_index("c"), Some(2));
    assert_eq!(graph.table_index("d"), None);
}

#[test]
fn all_inner_tree_has_tes_equal_to_ses() {
    let graph = JoinGraph::build(&inner_chain(), &[]).unwrap();
    // Fully reorderable: no conflict bits are ever added.
    for op in graph.ops() {
        assert_eq!(op.tes, op.ses);
    }
}

#[test]
fn inner_chain_emits_one_edge_pair_per_operator() {
    let graph = JoinGraph::build(&inner_chain(), &[]).unwrap();
    assert_eq!(graph.ops().len(), 2);
    assert_eq!(graph.edges().len(), 4);

    // a.x = b.y connects {a} to {b}.
    assert_eq!(graph.edges()[0].required, TableSet::of(0));
    assert_eq!(graph.edges()[1].required, TableSet::of(1));
}

#[test]
fn nested_joins_build_a_post_order_arena_with_parent_links() {
    // (a ⋈ b) ⋈ (c ⋈ d): both child operators must precede the root in
    // the arena, and their parent links must point at it.
    let tree = JoinTree::inner(
        JoinTree::inner(
            JoinTree::table("a"),
            JoinTree::table("b"),
            eq("a", "x", "b", "y"),
        ),
        JoinTree::inner(
            JoinTree::table("c"),
            JoinTree::table("d"),
            eq("c", "u", "d", "v"),
        ),
        eq("b", "y", "c", "z"),
    );
    let graph = JoinGraph::build(&tree, &[]).unwrap();

    assert_eq!(graph.ops().len(), 3);
    let root = &graph.ops()[2];
    assert_eq!(root.left, Some(0));
    assert_eq!(root.right, Some(1));
    assert_eq!(root.parent, None);
    assert_eq!(graph.ops()[0].parent, Some(2));
    assert_eq!(graph.ops()[1].parent, Some(2));
}

#[test]
fn left_join_extends_tes_over_inner_descendant() {
    // a JOIN b ON a.x = b.y LEFT JOIN c ON b.y = c.z
    let tree = JoinTree::left_outer(
        JoinTree::inner(
            JoinTree::table("a"),
            JoinTree::table("b"),
            eq("a", "x", "b", "y"),
        ),
        JoinTree::table("c"),
        eq("b", "y", "c", "z"),
    );
    let graph = JoinGraph::build(&tree, &[]).unwrap();

    // The LEFT join's predicate touches b, which the commutative inner
    // descendant could move; the conflict pulls a into the TES.
    let left_join = &graph.ops()[1];
    assert_eq!(left_join.kind, JoinKind::LeftOuter);
    assert_eq!(left_join.ses, TableSet::of(1) | TableSet::of(2));
    assert_eq!(
        left_join.tes,
        TableSet::of(0) | TableSet::of(1) | TableSet::of(2)
    );

    // Its edge therefore requires {a, b} on the left, never {b} alone.
    let edge = graph
        .edges()
        .chunks(2)
        .find(|pair| pair[0].op == 1)
        .expect("left join must emit an edge pair");
    assert_eq!(edge[0].required, TableSet::of(0) | TableSet::of(1));
    assert_eq!(edge[1].required, TableSet::of(2));
}

#[test]
fn right_join_is_normalized_to_left() {
    let tree = JoinTree::join(
        JoinKind::RightOuter,
        JoinTree::table("a"),
        JoinTree::table("b"),
        Some(eq("a", "x", "b", "y")),
    );
    let graph = JoinGraph::build(&tree, &[]).unwrap();

    assert_eq!(graph.ops()[0].kind, JoinKind::LeftOuter);
    // Operands were swapped: b is now the preserved side, a is optional.
    assert!(graph.is_required(graph.table_index("b").unwrap()));
    assert!(!graph.is_required(graph.table_index("a").unwrap()));
}

#[test]
fn left_join_marks_right_side_optional() {
    let tree = JoinTree::left_outer(
        JoinTree::table("a"),
        JoinTree::table("b"),
        eq("a", "x", "b", "y"),
    );
    let graph = JoinGraph::build(&tree, &[]).unwrap();
    assert!(graph.is_required(0));
    assert!(!graph.is_required(1));
}

#[test]
fn null_tolerant_condition_widens_ses_under_outer_join() {
    // a LEFT JOIN b ON a.x = COALESCE(b.y, 0)
    let condition = Expr::eq(
        Expr::qualified_column("a", "x"),
        Expr::coalesce(vec![Expr::qualified_column("b", "y"), Expr::int(0)]),
    );
    let tree = JoinTree::left_outer(JoinTree::table("a"), JoinTree::table("b"), condition);
    let graph = JoinGraph::build(&tree, &[]).unwrap();

    // SES escalates to the full input set, pinning evaluation order.
    assert_eq!(graph.ops()[0].ses, TableSet::of(0) | TableSet::of(1));
}

#[test]
fn where_comparison_becomes_virtual_edge() {
    // Chain a-b-c, plus WHERE a.x = c.z connecting the endpoints.
    let where_list = vec![eq("a", "x", "c", "z")];
    let graph = JoinGraph::build(&inner_chain(), &where_list).unwrap();

    assert_eq!(graph.ops().len(), 3);
    let virtual_op = &graph.ops()[2];
    assert_eq!(virtual_op.kind, JoinKind::Inner);
    assert_eq!(virtual_op.conditions.len(), 1);
    assert_eq!(graph.edges().len(), 6);
}

#[test]
fn where_predicate_absorbed_into_existing_edge() {
    // a.q = b.r duplicates the existing {a}-{b} edge pair; the condition
    // attaches to that operator instead of growing the edge array.
    let where_list = vec![eq("a", "q", "b", "r")];
    let graph = JoinGraph::build(&inner_chain(), &where_list).unwrap();

    assert_eq!(graph.edges().len(), 4);
    assert_eq!(graph.ops()[0].conditions.len(), 2);
}

#[test]
fn unattributable_predicates_stay_residual() {
    // Constant-only and three-table predicates produce no edges.
    let where_list = vec![
        Expr::eq(Expr::int(1), Expr::int(1)),
        Expr::eq(
            Expr::qualified_column("a", "x"),
            Expr::and(
                Expr::qualified_column("b", "y"),
                Expr::qualified_column("c", "z"),
            ),
        ),
        Expr::is_null(Expr::qualified_column("a", "x")),
    ];
    let graph = JoinGraph::build(&inner_chain(), &where_list).unwrap();
    assert_eq!(graph.edges().len(), 4);
    assert_eq!(graph.ops().len(), 2);
}

#[test]
fn duplicate_table_reference_is_an_error() {
    let tree = JoinTree::inner(
        JoinTree::table("a"),
        JoinTree::table("a"),
        eq("a", "x", "a", "y"),
    );
    assert!(matches!(
        JoinGraph::build(&tree, &[]),
        Err(PlanError::Internal(_))
    ));
}

#[test]
fn too_many_tables_is_an_error() {
    let mut tree = JoinTree::table("t0");
    for i in 1..=62 {
        let name = format!("t{i}");
        let condition = eq("t0", "x", &name, "y");
        tree = JoinTree::inner(tree, JoinTree::table(name), condition);
    }
    assert!(matches!(
        JoinGraph::build(&tree, &[]),
        Err(PlanError::TooManyTables(63))
    ));
}
