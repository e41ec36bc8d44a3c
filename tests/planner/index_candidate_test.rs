//! Tests for single-index candidate construction: equality pegging, range
//! attachment, order effectiveness, covering, and the usability rule.

use hyperplan::catalog::{ColumnRanges, IndexColumn, IndexDef, RangeBound, RangeSegment};
use hyperplan::model::expr::{Expr, OrderByExpr};
use hyperplan::planner::access::IndexCandidate;
use hyperplan::planner::graph::TableBranch;
use hyperplan::planner::plan::OrderEffectiveness;
use hyperplan::planner::QueryGoal;

fn col(name: &str) -> Expr {
    Expr::qualified_column("t", name)
}

fn index_abc() -> IndexDef {
    IndexDef::on_table(
        "t_abc",
        "t",
        vec![
            IndexColumn::asc(col("a")),
            IndexColumn::asc(col("b")),
            IndexColumn::asc(col("c")),
        ],
    )
}

#[test]
fn pegs_leading_equalities_and_attaches_range() {
    let index = index_abc();
    let conditions = vec![
        Expr::eq(col("a"), Expr::int(1)),
        Expr::eq(col("b"), Expr::int(2)),
        Expr::gt(col("c"), Expr::int(5)),
    ];

    let mut candidate = IndexCandidate::new(&index);
    candidate.insert_leading_equalities(&conditions);
    // The inequality on c must not be consumed as a third equality.
    assert_eq!(candidate.equalities, 2);

    candidate.attach_range(&conditions, &QueryGoal::new());
    let low = candidate.low.as_ref().expect("c > 5 becomes a low bound");
    assert_eq!(low.value, Expr::int(5));
    assert!(!low.inclusive);
    assert!(candidate.high.is_none());
    assert_eq!(candidate.consumed.len(), 3);
}

#[test]
fn pegging_stops_at_the_first_gap() {
    let index = index_abc();
    // No condition on b, so c's equality is unusable as a peg.
    let conditions = vec![
        Expr::eq(col("a"), Expr::int(1)),
        Expr::eq(col("c"), Expr::int(3)),
    ];

    let mut candidate = IndexCandidate::new(&index);
    candidate.insert_leading_equalities(&conditions);
    assert_eq!(candidate.equalities, 1);
    assert_eq!(candidate.residual_conditions(&conditions).len(), 1);
}

#[test]
fn is_null_counts_as_an_equality_peg() {
    let index = index_abc();
    let conditions = vec![Expr::is_null(col("a")), Expr::eq(col("b"), Expr::int(2))];

    let mut candidate = IndexCandidate::new(&index);
    candidate.insert_leading_equalities(&conditions);
    assert_eq!(candidate.equalities, 2);
}

#[test]
fn not_equal_is_never_a_range_bound() {
    let index = index_abc();
    let conditions = vec![Expr::binary(
        col("a"),
        hyperplan::model::expr::BinaryOp::Ne,
        Expr::int(1),
    )];

    let mut candidate = IndexCandidate::new(&index);
    candidate.insert_leading_equalities(&conditions);
    candidate.attach_range(&conditions, &QueryGoal::new());
    assert!(!candidate.has_conditions());
}

#[test]
fn falls_back_to_extracted_column_ranges() {
    let index = index_abc();
    let ranges = ColumnRanges {
        column: col("a"),
        segments: vec![
            RangeSegment {
                low: Some(RangeBound::inclusive(Expr::int(1))),
                high: Some(RangeBound::inclusive(Expr::int(3))),
            },
            RangeSegment {
                low: Some(RangeBound::inclusive(Expr::int(7))),
                high: None,
            },
        ],
    };
    let goal = QueryGoal::new().with_column_ranges(vec![ranges]);

    let mut candidate = IndexCandidate::new(&index);
    candidate.insert_leading_equalities(&[]);
    candidate.attach_range(&[], &goal);

    let attached = candidate.segments.as_ref().expect("interval set attached");
    assert_eq!(attached.segments.len(), 2);
    assert!(candidate.has_conditions());
}

#[test]
fn flips_trailing_direction_for_mixed_order_request() {
    // Index (x ASC, y ASC), request (x ASC, y DESC): flip y instead of
    // rejecting the index.
    let index = IndexDef::on_table(
        "t_xy",
        "t",
        vec![IndexColumn::asc(col("x")), IndexColumn::asc(col("y"))],
    );
    let goal = QueryGoal::new().with_ordering(vec![
        OrderByExpr::asc(col("x")),
        OrderByExpr::desc(col("y")),
    ]);

    let mut candidate = IndexCandidate::new(&index);
    candidate.determine_order_effectiveness(&goal);

    assert_eq!(candidate.effectiveness, OrderEffectiveness::Sorted);
    assert!(candidate.ordering[0].ascending);
    assert!(!candidate.ordering[1].ascending);
}

#[test]
fn flip_on_first_post_equality_column_reflips_the_pegged_prefix() {
    // a pegged by equality; request (b DESC, c DESC). Both trailing
    // columns flip, and the pegged prefix flips with them so the scan
    // stays single-direction.
    let index = index_abc();
    let conditions = vec![Expr::eq(col("a"), Expr::int(1))];
    let goal = QueryGoal::new().with_ordering(vec![
        OrderByExpr::desc(col("b")),
        OrderByExpr::desc(col("c")),
    ]);

    let mut candidate = IndexCandidate::new(&index);
    candidate.insert_leading_equalities(&conditions);
    candidate.determine_order_effectiveness(&goal);

    assert_eq!(candidate.effectiveness, OrderEffectiveness::Sorted);
    assert!(candidate.ordering.iter().all(|o| !o.ascending));
}

#[test]
fn partial_ordering_match_is_rejected_without_mutation() {
    let index = index_abc();
    // b matches but the second requested column is foreign to the index.
    let goal = QueryGoal::new().with_ordering(vec![
        OrderByExpr::desc(col("a")),
        OrderByExpr::asc(col("q")),
    ]);

    let mut candidate = IndexCandidate::new(&index);
    candidate.determine_order_effectiveness(&goal);

    assert_eq!(candidate.effectiveness, OrderEffectiveness::None);
    // The tentative flip on a was never committed.
    assert!(candidate.ordering[0].ascending);
}

#[test]
fn grouping_matches_out_of_order_and_counts_pegged_columns() {
    let index = index_abc();
    let conditions = vec![Expr::eq(col("a"), Expr::int(1))];
    let goal = QueryGoal::new().with_grouping(vec![col("c"), col("b"), col("a")]);

    let mut candidate = IndexCandidate::new(&index);
    candidate.insert_leading_equalities(&conditions);
    candidate.determine_order_effectiveness(&goal);
    assert_eq!(candidate.effectiveness, OrderEffectiveness::Grouped);
}

#[test]
fn grouping_prefix_only_is_partial() {
    let index = index_abc();
    let goal = QueryGoal::new().with_grouping(vec![col("a"), col("q")]);

    let mut candidate = IndexCandidate::new(&index);
    candidate.determine_order_effectiveness(&goal);
    assert_eq!(candidate.effectiveness, OrderEffectiveness::PartialGrouped);
}

#[test]
fn distinct_without_ordering_checks_sorted() {
    let index = index_abc();
    let goal = QueryGoal::new().with_distinct(vec![col("b"), col("a")]);

    let mut candidate = IndexCandidate::new(&index);
    candidate.determine_order_effectiveness(&goal);
    assert_eq!(candidate.effectiveness, OrderEffectiveness::Sorted);
}

#[test]
fn covering_requires_every_needed_column_in_the_index() {
    let index = index_abc();
    let branch = TableBranch::single("t");
    let conditions = vec![Expr::eq(col("a"), Expr::int(1))];

    let mut covered = IndexCandidate::new(&index);
    covered.insert_leading_equalities(&conditions);
    let goal = QueryGoal::new().with_projection(vec![col("b"), col("c")]);
    covered.determine_covering(&goal, &branch, &conditions);
    assert!(covered.covering);

    let mut uncovered = IndexCandidate::new(&index);
    uncovered.insert_leading_equalities(&conditions);
    let goal = QueryGoal::new().with_projection(vec![col("b"), col("w")]);
    uncovered.determine_covering(&goal, &branch, &conditions);
    assert!(!uncovered.covering);
}

#[test]
fn update_target_disqualifies_covering() {
    let index = index_abc();
    let branch = TableBranch::single("t");
    let conditions = vec![Expr::eq(col("a"), Expr::int(1))];
    let goal = QueryGoal::new()
        .with_projection(vec![col("a")])
        .with_update_target("t");

    let mut candidate = IndexCandidate::new(&index);
    candidate.insert_leading_equalities(&conditions);
    candidate.determine_covering(&goal, &branch, &conditions);
    assert!(!candidate.covering);
}

#[test]
fn useless_candidate_is_rejected() {
    // No conditions touch the index, it cannot cover the projection, and
    // no ordering was requested: degenerate full scan.
    let index = index_abc();
    let branch = TableBranch::single("t");
    let conditions = vec![Expr::eq(col("w"), Expr::int(1))];
    let goal = QueryGoal::new()
        .with_where(conditions.clone())
        .with_projection(vec![col("w")]);

    let mut candidate = IndexCandidate::new(&index);
    candidate.insert_leading_equalities(&conditions);
    candidate.attach_range(&conditions, &goal);
    candidate.determine_order_effectiveness(&goal);
    candidate.determine_covering(&goal, &branch, &conditions);
    assert!(!candidate.usable());
}
