//! A single index considered for one table branch.
//!
//! A candidate is built fresh per planning attempt: leading equality
//! conditions are pegged against the index column order, an optional range
//! is attached to the next column, the output ordering is finalized
//! (including direction flips), covering is determined, and the whole
//! thing is costed through the cost model.

use crate::catalog::{ColumnRanges, IndexDef, RangeBound};
use crate::model::expr::{BinaryOp, Expr, OrderByExpr, UnaryOp};
use crate::planner::cost::{CostEstimate, CostModel};
use crate::planner::goal::QueryGoal;
use crate::planner::graph::TableBranch;
use crate::planner::plan::OrderEffectiveness;

/// Tracks, per table, the column expressions still needed after an index
/// is (tentatively) used. A table is fully coverable only when its set
/// becomes empty.
#[derive(Debug, Default)]
pub struct RequiredColumns {
    needed: Vec<(String, Vec<Expr>)>,
}

impl RequiredColumns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every column reference inside `expr` as needed.
    pub fn require(&mut self, expr: &Expr) {
        match expr {
            Expr::Column {
                entity: Some(table),
                ..
            } => {
                let entry = match self.needed.iter_mut().find(|(t, _)| t == table) {
                    Some(entry) => entry,
                    None => {
                        self.needed.push((table.clone(), Vec::new()));
                        self.needed.last_mut().unwrap()
                    }
                };
                if !entry.1.contains(expr) {
                    entry.1.push(expr.clone());
                }
            }
            Expr::Column { entity: None, .. } | Expr::Literal(_) => {}
            Expr::BinaryOp { left, right, .. } => {
                self.require(left);
                self.require(right);
            }
            Expr::UnaryOp { expr, .. } => self.require(expr),
            Expr::Function { args, .. } => {
                for arg in args {
                    self.require(arg);
                }
            }
        }
    }

    /// Check off a column the index supplies.
    pub fn supply(&mut self, column: &Expr) {
        for (_, columns) in &mut self.needed {
            columns.retain(|c| c != column);
        }
    }

    /// Tables that still need columns.
    pub fn unsatisfied_tables(&self) -> impl Iterator<Item = &str> {
        self.needed
            .iter()
            .filter(|(_, columns)| !columns.is_empty())
            .map(|(table, _)| table.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.needed.iter().all(|(_, columns)| columns.is_empty())
    }
}

/// One index scan under consideration.
#[derive(Debug, Clone)]
pub struct IndexCandidate<'a> {
    pub index: &'a IndexDef,
    /// Leading columns pegged by equality conditions.
    pub equalities: usize,
    pub low: Option<RangeBound>,
    pub high: Option<RangeBound>,
    /// Disjoint interval set on the first non-equality column.
    pub segments: Option<ColumnRanges>,
    /// Output ordering; directions may be flipped while matching the
    /// requested sort.
    pub ordering: Vec<OrderByExpr>,
    pub effectiveness: OrderEffectiveness,
    pub covering: bool,
    /// Indices into the condition slice this candidate consumed.
    pub consumed: Vec<usize>,
    pub cost: Option<CostEstimate>,
}

impl<'a> IndexCandidate<'a> {
    pub fn new(index: &'a IndexDef) -> Self {
        let ordering = index
            .columns
            .iter()
            .map(|c| OrderByExpr {
                expr: c.expr.clone(),
                ascending: c.ascending,
            })
            .collect();
        Self {
            index,
            equalities: 0,
            low: None,
            high: None,
            segments: None,
            ordering,
            effectiveness: OrderEffectiveness::None,
            covering: false,
            consumed: Vec::new(),
            cost: None,
        }
    }

    /// An expression is "bound" relative to this index when it references
    /// no table the index spans: a constant, or a column of some other,
    /// already-joined table.
    fn is_bound(&self, expr: &Expr) -> bool {
        expr.is_constant()
            || expr
                .referenced_tables()
                .iter()
                .all(|t| !self.index.spans_table(t))
    }

    fn is_equality_on(&self, condition: &Expr, column: &Expr) -> bool {
        if let Expr::UnaryOp {
            op: UnaryOp::IsNull,
            expr,
        } = condition
        {
            return expr.as_ref() == column;
        }
        if let Some((lhs, BinaryOp::Eq, rhs)) = condition.as_comparison() {
            return (lhs == column && self.is_bound(rhs))
                || (rhs == column && self.is_bound(lhs));
        }
        false
    }

    /// Greedily consume leading index columns pegged by equality (or
    /// IS NULL) conditions, stopping at the first column without one.
    pub fn insert_leading_equalities(&mut self, conditions: &[Expr]) {
        for column in &self.index.columns {
            let matched = conditions.iter().enumerate().find(|(i, cond)| {
                !self.consumed.contains(i) && self.is_equality_on(cond, &column.expr)
            });
            match matched {
                Some((i, _)) => {
                    self.consumed.push(i);
                    self.equalities += 1;
                }
                None => break,
            }
        }
    }

    /// Attach an inequality (not `!=`) on the first non-equality column,
    /// or fall back to a pre-extracted disjoint interval set on it.
    pub fn attach_range(&mut self, conditions: &[Expr], goal: &QueryGoal) {
        let Some(column) = self.index.columns.get(self.equalities) else {
            return;
        };
        let column = column.expr.clone();

        for (i, condition) in conditions.iter().enumerate() {
            if self.consumed.contains(&i) {
                continue;
            }
            let Some((lhs, op, rhs)) = condition.as_comparison() else {
                continue;
            };
            if !op.is_range_comparison() {
                continue;
            }
            // Orient the comparison so the indexed column is on the left.
            let (op, bound) = if lhs == &column && self.is_bound(rhs) {
                (op, rhs)
            } else if rhs == &column && self.is_bound(lhs) {
                let flipped = match op {
                    BinaryOp::Lt => BinaryOp::Gt,
                    BinaryOp::Lte => BinaryOp::Gte,
                    BinaryOp::Gt => BinaryOp::Lt,
                    BinaryOp::Gte => BinaryOp::Lte,
                    other => other,
                };
                (flipped, lhs)
            } else {
                continue;
            };
            let slot = match op {
                BinaryOp::Lt => (&mut self.high, false),
                BinaryOp::Lte => (&mut self.high, true),
                BinaryOp::Gt => (&mut self.low, false),
                BinaryOp::Gte => (&mut self.low, true),
                _ => continue,
            };
            if slot.0.is_none() {
                *slot.0 = Some(RangeBound {
                    value: bound.clone(),
                    inclusive: slot.1,
                });
                self.consumed.push(i);
            }
        }

        if self.low.is_none() && self.high.is_none() {
            if let Some(ranges) = goal.range_for(&column) {
                self.segments = Some(ranges.clone());
            }
        }
    }

    /// True when some condition constrains the scan.
    pub fn has_conditions(&self) -> bool {
        self.equalities > 0 || self.low.is_some() || self.high.is_some() || self.segments.is_some()
    }

    /// Whether `expr` is one of the equality-pegged leading columns (its
    /// value is constant across the scan).
    fn is_pegged(&self, expr: &Expr) -> bool {
        self.index.columns[..self.equalities]
            .iter()
            .any(|c| &c.expr == expr)
    }

    /// Classify how well the scan order satisfies the requested
    /// ordering/grouping/distinct, finalizing direction flips.
    pub fn determine_order_effectiveness(&mut self, goal: &QueryGoal) {
        if !goal.ordering.is_empty() && self.try_sorted(&goal.ordering) {
            self.effectiveness = OrderEffectiveness::Sorted;
            return;
        }
        if !goal.grouping.is_empty() {
            let grouped = self.try_grouped(&goal.grouping);
            if grouped != OrderEffectiveness::None {
                self.effectiveness = grouped;
                return;
            }
        }
        if goal.ordering.is_empty() && !goal.distinct.is_empty() && self.try_distinct(&goal.distinct)
        {
            self.effectiveness = OrderEffectiveness::Sorted;
        }
    }

    /// Match the post-equality index order against the requested ORDER BY,
    /// flipping trailing column directions where needed. Flips are only
    /// committed once the whole request is known to match; if the first
    /// post-equality column needed a flip, the pegged prefix is re-flipped
    /// retroactively so the scan stays single-direction.
    fn try_sorted(&mut self, requested: &[OrderByExpr]) -> bool {
        let mut position = self.equalities;
        let mut flips = Vec::new();
        for req in requested {
            if self.is_pegged(&req.expr) {
                continue;
            }
            let Some(column) = self.index.columns.get(position) else {
                return false;
            };
            if column.expr != req.expr {
                return false;
            }
            if self.ordering[position].ascending != req.ascending {
                flips.push(position);
            }
            position += 1;
        }

        let flip_prefix = flips.first() == Some(&self.equalities);
        for position in flips {
            self.ordering[position].ascending = !self.ordering[position].ascending;
        }
        if flip_prefix {
            for entry in &mut self.ordering[..self.equalities] {
                entry.ascending = !entry.ascending;
            }
        }
        true
    }

    /// GROUP BY columns may appear in any order; equality-pegged columns
    /// count as satisfied.
    fn try_grouped(&self, grouping: &[Expr]) -> OrderEffectiveness {
        let mut needed: Vec<&Expr> = grouping.iter().filter(|g| !self.is_pegged(g)).collect();
        let total = needed.len();
        if total == 0 {
            return OrderEffectiveness::Grouped;
        }
        let mut position = self.equalities;
        while !needed.is_empty() {
            let Some(column) = self.index.columns.get(position) else {
                break;
            };
            let Some(found) = needed.iter().position(|g| **g == column.expr) else {
                break;
            };
            needed.remove(found);
            position += 1;
        }
        if needed.is_empty() {
            OrderEffectiveness::Grouped
        } else if needed.len() < total {
            OrderEffectiveness::PartialGrouped
        } else {
            OrderEffectiveness::None
        }
    }

    /// DISTINCT cares about grouping into runs, not direction.
    fn try_distinct(&self, distinct: &[Expr]) -> bool {
        let mut needed: Vec<&Expr> = distinct.iter().filter(|d| !self.is_pegged(d)).collect();
        let mut position = self.equalities;
        while !needed.is_empty() {
            let Some(column) = self.index.columns.get(position) else {
                return false;
            };
            let Some(found) = needed.iter().position(|d| **d == column.expr) else {
                return false;
            };
            needed.remove(found);
            position += 1;
        }
        true
    }

    /// Walk every column the rest of the query still needs from this
    /// branch and check the index supplies them all.
    pub fn determine_covering(
        &mut self,
        goal: &QueryGoal,
        branch: &TableBranch,
        conditions: &[Expr],
    ) {
        // Updates always fetch the full row.
        if let Some(target) = &goal.update_target {
            if branch.contains(target) {
                self.covering = false;
                return;
            }
        }

        let mut required = RequiredColumns::new();
        for (i, condition) in conditions.iter().enumerate() {
            if !self.consumed.contains(&i) {
                required.require(condition);
            }
        }
        if self.effectiveness != OrderEffectiveness::Sorted {
            for order in &goal.ordering {
                required.require(&order.expr);
            }
        }
        for group in &goal.grouping {
            required.require(group);
        }
        for distinct in &goal.distinct {
            required.require(distinct);
        }
        for output in &goal.projection {
            required.require(output);
        }

        // Covering is an advantage only when the index stands in for a row
        // fetch the query would otherwise need. With nothing required at
        // all, an unconstrained index sweep must not outrank the full scan.
        if required.is_empty() {
            self.covering = false;
            return;
        }

        for column in &self.index.columns {
            required.supply(&column.expr);
        }

        // Only this branch's tables are this candidate's responsibility;
        // a branch table outside the index's span means more tables are
        // needed and the index cannot cover.
        self.covering = required
            .unsatisfied_tables()
            .all(|table| !branch.contains(table));
    }

    /// Conditions this candidate leaves for a post-scan filter.
    pub fn residual_conditions(&self, conditions: &[Expr]) -> Vec<Expr> {
        conditions
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.consumed.contains(i))
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// Scan cost alone: the constrained access pattern, unioned across a
    /// disjoint interval set's segments when one is attached.
    pub fn scan_estimate(&self, model: &dyn CostModel) -> CostEstimate {
        match &self.segments {
            Some(ranges) => {
                let mut total = CostEstimate::zero();
                for segment in &ranges.segments {
                    let estimate = model.index_scan(
                        self.index,
                        self.equalities,
                        segment.low.as_ref(),
                        segment.high.as_ref(),
                    );
                    total.rows_out += estimate.rows_out;
                    total.cpu_cost += estimate.cpu_cost;
                    total.io_cost += estimate.io_cost;
                    total.memory_cost = total.memory_cost.max(estimate.memory_cost);
                }
                total
            }
            None => model.index_scan(
                self.index,
                self.equalities,
                self.low.as_ref(),
                self.high.as_ref(),
            ),
        }
    }

    /// Full candidate cost: scan, plus row fetch if not covering, plus
    /// residual filtering, plus a sort if the ordering request is still
    /// unmet.
    pub fn estimate_cost(
        &mut self,
        goal: &QueryGoal,
        branch: &TableBranch,
        conditions: &[Expr],
        model: &dyn CostModel,
    ) {
        let mut estimate = self.scan_estimate(model);
        if !self.covering {
            estimate = estimate.then(&model.flatten(branch.primary(), estimate.rows_out));
        }
        let residual = self.residual_conditions(conditions);
        if !residual.is_empty() {
            estimate = estimate.then(&model.select(&residual, estimate.rows_out));
        }
        let branch_tables: Vec<&str> = branch.tables.iter().map(|t| t.name.as_str()).collect();
        if goal.sort_relevant_for(&branch_tables) && goal.need_sort(self.effectiveness) {
            estimate = estimate.then(&model.sort(estimate.rows_out));
        }
        self.cost = Some(estimate);
    }

    /// A candidate with no usable conditions, no covering, and no ordering
    /// benefit would degenerate to a full scan with extra steps.
    pub fn usable(&self) -> bool {
        self.has_conditions() || self.covering || self.effectiveness != OrderEffectiveness::None
    }

    /// Usable as a leaf of a multi-index intersection: the candidate's
    /// attached conditions are all equality pegs, nothing range-shaped.
    pub fn intersection_leaf(&self) -> bool {
        self.equalities > 0 && self.low.is_none() && self.high.is_none() && self.segments.is_none()
    }

    /// Output ordering past the equality-pegged prefix.
    pub fn effective_ordering(&self) -> &[OrderByExpr] {
        &self.ordering[self.equalities..]
    }
}
