//! Tests for multi-index intersection enumeration, using a fixed-output
//! cost model stub so row counts are fully controlled.

use hyperplan::catalog::{Catalog, IndexColumn, IndexDef, RangeBound, TableDef};
use hyperplan::model::expr::Expr;
use hyperplan::planner::access::{enumerate_intersections, AccessPathChooser, IndexCandidate};
use hyperplan::planner::cost::{CostEstimate, CostModel};
use hyperplan::planner::graph::{JoinKind, TableBranch};
use hyperplan::planner::plan::AccessPath;
use hyperplan::planner::QueryGoal;

/// Every index scan returns the same small, fixed row count; full scans
/// are drastically worse. Keeps the arithmetic in assertions trivial.
struct StubModel;

impl CostModel for StubModel {
    fn full_scan(&self, _table: &str) -> CostEstimate {
        CostEstimate {
            rows_out: 100_000,
            cpu_cost: 100_000.0,
            io_cost: 100_000.0,
            memory_cost: 0.0,
        }
    }

    fn index_scan(
        &self,
        _index: &IndexDef,
        _equalities: usize,
        _low: Option<&RangeBound>,
        _high: Option<&RangeBound>,
    ) -> CostEstimate {
        CostEstimate {
            rows_out: 100,
            cpu_cost: 1.0,
            io_cost: 1.0,
            memory_cost: 0.0,
        }
    }

    fn select(&self, _conditions: &[Expr], input_rows: usize) -> CostEstimate {
        CostEstimate {
            rows_out: input_rows.max(1),
            cpu_cost: input_rows as f64,
            io_cost: 0.0,
            memory_cost: 0.0,
        }
    }

    fn sort(&self, input_rows: usize) -> CostEstimate {
        CostEstimate {
            rows_out: input_rows,
            cpu_cost: input_rows as f64,
            io_cost: 0.0,
            memory_cost: input_rows as f64,
        }
    }

    fn flatten(&self, _table: &str, input_rows: usize) -> CostEstimate {
        CostEstimate {
            rows_out: input_rows,
            cpu_cost: input_rows as f64,
            io_cost: input_rows as f64,
            memory_cost: 0.0,
        }
    }

    fn intersect(&self, left: &CostEstimate, right: &CostEstimate) -> CostEstimate {
        CostEstimate {
            rows_out: (left.rows_out.min(right.rows_out) / 10).max(1),
            cpu_cost: left.cpu_cost + right.cpu_cost + 1.0,
            io_cost: left.io_cost + right.io_cost,
            memory_cost: 0.0,
        }
    }

    fn join(
        &self,
        _kind: JoinKind,
        left: &CostEstimate,
        right: &CostEstimate,
        _conditions: &[Expr],
    ) -> CostEstimate {
        CostEstimate {
            rows_out: left.rows_out.max(right.rows_out),
            cpu_cost: left.cpu_cost + right.cpu_cost,
            io_cost: left.io_cost + right.io_cost,
            memory_cost: 0.0,
        }
    }
}

fn col(name: &str) -> Expr {
    Expr::qualified_column("t", name)
}

fn single_column_index(name: &str, column: &str) -> IndexDef {
    IndexDef::on_table(name, "t", vec![IndexColumn::asc(col(column))])
}

fn leaf<'a>(index: &'a IndexDef, conditions: &[Expr], goal: &QueryGoal) -> IndexCandidate<'a> {
    let branch = TableBranch::single("t");
    let mut candidate = IndexCandidate::new(index);
    candidate.insert_leading_equalities(conditions);
    candidate.attach_range(conditions, goal);
    candidate.determine_order_effectiveness(goal);
    candidate.determine_covering(goal, &branch, conditions);
    candidate.estimate_cost(goal, &branch, conditions, &StubModel);
    candidate
}

#[test]
fn two_equality_leaves_combine_and_beat_either_scan() {
    let p_index = single_column_index("t_p", "p");
    let q_index = single_column_index("t_q", "q");
    let conditions = vec![Expr::eq(col("p"), Expr::int(1)), Expr::eq(col("q"), Expr::int(2))];
    let goal = QueryGoal::new()
        .with_where(conditions.clone())
        .with_projection(vec![col("other")]);
    let branch = TableBranch::single("t");

    let leaves = vec![
        leaf(&p_index, &conditions, &goal),
        leaf(&q_index, &conditions, &goal),
    ];

    let combined =
        enumerate_intersections(&leaves, &conditions, &goal, &branch, &StubModel, None)
            .expect("both leaves are equality-pegged and compatible");

    assert_eq!(combined.leaves.len(), 2);
    // Both conditions are collectively discharged; nothing is residual.
    assert_eq!(combined.counts.discharged(), 2);
    assert!(combined.counts.residual(&conditions).is_empty());

    // Cheaper than either single-index candidate, which each fetch 100
    // rows and filter the other condition as a residual.
    for single in &leaves {
        assert!(combined.cost.total() < single.cost.as_ref().unwrap().total());
    }
}

#[test]
fn range_leaf_is_not_intersectable() {
    let p_index = single_column_index("t_p", "p");
    let q_index = single_column_index("t_q", "q");
    let conditions = vec![Expr::eq(col("p"), Expr::int(1)), Expr::gt(col("q"), Expr::int(2))];
    let goal = QueryGoal::new().with_where(conditions.clone());
    let branch = TableBranch::single("t");

    let leaves = vec![
        leaf(&p_index, &conditions, &goal),
        leaf(&q_index, &conditions, &goal),
    ];
    assert!(!leaves[1].intersection_leaf());
    assert!(
        enumerate_intersections(&leaves, &conditions, &goal, &branch, &StubModel, None).is_none()
    );
}

#[test]
fn observer_sees_every_pairwise_candidate() {
    let p_index = single_column_index("t_p", "p");
    let q_index = single_column_index("t_q", "q");
    let r_index = single_column_index("t_r", "r");
    let conditions = vec![
        Expr::eq(col("p"), Expr::int(1)),
        Expr::eq(col("q"), Expr::int(2)),
        Expr::eq(col("r"), Expr::int(3)),
    ];
    let goal = QueryGoal::new().with_where(conditions.clone());
    let branch = TableBranch::single("t");

    let leaves = vec![
        leaf(&p_index, &conditions, &goal),
        leaf(&q_index, &conditions, &goal),
        leaf(&r_index, &conditions, &goal),
    ];

    let mut seen = Vec::new();
    let mut observer = |candidate: &hyperplan::planner::access::IntersectionCandidate| {
        seen.push(candidate.leaves.len());
    };
    let best = enumerate_intersections(
        &leaves,
        &conditions,
        &goal,
        &branch,
        &StubModel,
        Some(&mut observer),
    )
    .expect("three compatible leaves");

    // Three pairings observed; the winner is greedily extended to cover
    // all three conditions.
    assert_eq!(seen.len(), 3);
    assert_eq!(best.leaves.len(), 3);
    assert_eq!(best.counts.discharged(), 3);
}

#[test]
fn chooser_threads_the_observer_through_enumeration() {
    let mut catalog = Catalog::new();
    catalog
        .add_table(TableDef::with_rows("t", 100_000))
        .add_index(single_column_index("t_p", "p"))
        .add_index(single_column_index("t_q", "q"));
    let conditions = vec![Expr::eq(col("p"), Expr::int(1)), Expr::eq(col("q"), Expr::int(2))];
    let goal = QueryGoal::new()
        .with_where(conditions)
        .with_projection(vec![col("other")]);

    let mut pairings = 0;
    let mut observer =
        |_: &hyperplan::planner::access::IntersectionCandidate| pairings += 1;

    let chooser = AccessPathChooser::new(&catalog, &StubModel, &goal);
    let plan = chooser.choose(&TableBranch::single("t"), true, Some(&mut observer));

    assert_eq!(pairings, 1);
    assert!(matches!(plan.path, AccessPath::Intersection { .. }));
}

#[test]
fn chooser_prefers_intersection_over_single_index() {
    let mut catalog = Catalog::new();
    catalog
        .add_table(TableDef::with_rows("t", 100_000))
        .add_index(single_column_index("t_p", "p"))
        .add_index(single_column_index("t_q", "q"));

    let conditions = vec![Expr::eq(col("p"), Expr::int(1)), Expr::eq(col("q"), Expr::int(2))];
    let goal = QueryGoal::new()
        .with_where(conditions)
        .with_projection(vec![col("other")]);

    let chooser = AccessPathChooser::new(&catalog, &StubModel, &goal);
    let plan = chooser.choose(&TableBranch::single("t"), true, None);

    match plan.path {
        AccessPath::Intersection { common_ordering, .. } => {
            assert_eq!(common_ordering, 0);
        }
        other => panic!("expected intersection, got {other:?}"),
    }
    assert!(plan.residual.is_empty());
}
