//! Query-wide planning goal.
//!
//! Aggregates the WHERE list, requested ordering/grouping/distinct, limit,
//! and update target, and decides whether a chosen access path's ordering
//! makes an explicit sort step unnecessary.

use crate::catalog::ColumnRanges;
use crate::model::expr::{Expr, OrderByExpr};
use crate::planner::plan::{OrderEffectiveness, PlanNode, QueryPlan, SortStrategy};

/// Everything the query as a whole asks of the chosen plan.
#[derive(Debug, Clone, Default)]
pub struct QueryGoal {
    /// Flat ANDed WHERE-clause conjuncts.
    pub where_list: Vec<Expr>,
    /// GROUP BY expressions, empty if none.
    pub grouping: Vec<Expr>,
    /// ORDER BY, empty if none.
    pub ordering: Vec<OrderByExpr>,
    /// DISTINCT projection, empty if none.
    pub distinct: Vec<Expr>,
    /// Output columns the plan must supply (for covering checks).
    pub projection: Vec<Expr>,
    pub limit: Option<u64>,
    /// Target table of an UPDATE/DELETE; disqualifies covering indexes.
    pub update_target: Option<String>,
    /// Pre-extracted disjoint interval sets, by column.
    pub column_ranges: Vec<ColumnRanges>,
}

impl QueryGoal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_where(mut self, conditions: Vec<Expr>) -> Self {
        self.where_list = conditions;
        self
    }

    pub fn with_ordering(mut self, ordering: Vec<OrderByExpr>) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_grouping(mut self, grouping: Vec<Expr>) -> Self {
        self.grouping = grouping;
        self
    }

    pub fn with_distinct(mut self, distinct: Vec<Expr>) -> Self {
        self.distinct = distinct;
        self
    }

    pub fn with_projection(mut self, projection: Vec<Expr>) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_update_target(mut self, table: impl Into<String>) -> Self {
        self.update_target = Some(table.into());
        self
    }

    pub fn with_column_ranges(mut self, ranges: Vec<ColumnRanges>) -> Self {
        self.column_ranges = ranges;
        self
    }

    /// The pre-extracted interval set for `column`, if any.
    pub fn range_for(&self, column: &Expr) -> Option<&ColumnRanges> {
        self.column_ranges.iter().find(|r| &r.column == column)
    }

    /// True if the query requested any output ordering at all.
    pub fn requests_ordering(&self) -> bool {
        !self.ordering.is_empty() || !self.grouping.is_empty() || !self.distinct.is_empty()
    }

    /// Whether an explicit sort/resort step is still required given the
    /// order effectiveness the chosen access path achieved.
    pub fn need_sort(&self, effectiveness: OrderEffectiveness) -> bool {
        if !self.ordering.is_empty() {
            effectiveness != OrderEffectiveness::Sorted
        } else if !self.grouping.is_empty() {
            !matches!(
                effectiveness,
                OrderEffectiveness::Sorted | OrderEffectiveness::Grouped
            )
        } else if !self.distinct.is_empty() {
            effectiveness != OrderEffectiveness::Sorted
        } else {
            false
        }
    }

    /// Whether a sort on this goal could be satisfied by an index on any of
    /// `tables` (the requested ordering's leading expression lives there).
    pub fn sort_relevant_for(&self, tables: &[&str]) -> bool {
        let leading = self
            .ordering
            .first()
            .map(|o| &o.expr)
            .or_else(|| self.grouping.first())
            .or_else(|| self.distinct.first());
        match leading {
            Some(expr) => expr
                .referenced_tables()
                .iter()
                .any(|t| tables.contains(&t.as_str())),
            None => false,
        }
    }

    /// Finalize a chosen plan: record which sort strategy the downstream
    /// aggregate/sort node must use, splicing the explicit sort out when
    /// the access path's ordering already satisfies the request.
    pub fn install_order_effectiveness(&self, root: PlanNode) -> QueryPlan {
        let cost = root.cost().clone();
        if !self.requests_ordering() {
            return QueryPlan {
                root,
                sort: None,
                cost,
            };
        }

        let effectiveness = root.order_effectiveness();
        let sort = if !self.ordering.is_empty() {
            if effectiveness == OrderEffectiveness::Sorted {
                SortStrategy::PreSorted
            } else if !self.grouping.is_empty() && effectiveness == OrderEffectiveness::Grouped {
                // Aggregation can run over grouped input, but the final
                // ordering still needs a resort of the aggregate output.
                SortStrategy::PreAggregateResort
            } else {
                SortStrategy::Sort
            }
        } else if !self.grouping.is_empty() {
            if matches!(
                effectiveness,
                OrderEffectiveness::Sorted | OrderEffectiveness::Grouped
            ) {
                SortStrategy::PreSorted
            } else {
                SortStrategy::Sort
            }
        } else if effectiveness == OrderEffectiveness::Sorted {
            SortStrategy::PreSorted
        } else {
            SortStrategy::Sort
        };

        QueryPlan {
            root,
            sort: Some(sort),
            cost,
        }
    }
}
