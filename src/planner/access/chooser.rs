//! Picks the cheapest access path for one table branch.
//!
//! Candidates are the "no index" full scan (always considered), every
//! eligible single-table or group index, and the best multi-index
//! intersection. Ties keep the first candidate found; the comparison is a
//! strict less-than on the cost model's scalar total.

use tracing::debug;

use crate::catalog::{Catalog, IndexDef};
use crate::model::expr::Expr;
use crate::planner::access::candidate::IndexCandidate;
use crate::planner::access::intersection::{enumerate_intersections, IntersectionCandidate};
use crate::planner::cost::{CostEstimate, CostModel};
use crate::planner::goal::QueryGoal;
use crate::planner::graph::{JoinKind, TableBranch};
use crate::planner::plan::{AccessPath, AccessPlan, OrderEffectiveness};

/// Observer for intersection enumeration, threaded through explicitly so
/// tests can watch which combinations are generated.
pub type IntersectionObserver<'a, 'o> = &'o mut dyn FnMut(&IntersectionCandidate<'a>);

pub struct AccessPathChooser<'a> {
    catalog: &'a Catalog,
    model: &'a dyn CostModel,
    goal: &'a QueryGoal,
}

impl<'a> AccessPathChooser<'a> {
    pub fn new(catalog: &'a Catalog, model: &'a dyn CostModel, goal: &'a QueryGoal) -> Self {
        Self {
            catalog,
            model,
            goal,
        }
    }

    /// WHERE conditions attributable entirely to this branch.
    pub fn branch_conditions(&self, branch: &TableBranch) -> Vec<Expr> {
        self.goal
            .where_list
            .iter()
            .filter(|condition| {
                let tables = condition.referenced_tables();
                !tables.is_empty() && tables.iter().all(|t| branch.contains(t))
            })
            .cloned()
            .collect()
    }

    /// Choose the cheapest access path for `branch`. `required` is whether
    /// the branch sits on a non-nullable path; optional branches only get
    /// the full scan (an index scan would skip rows an outer join must
    /// null-extend).
    pub fn choose(
        &self,
        branch: &TableBranch,
        required: bool,
        mut observer: Option<IntersectionObserver<'a, '_>>,
    ) -> AccessPlan {
        let conditions = self.branch_conditions(branch);
        let mut best = self.full_scan_plan(branch, &conditions);

        if !required {
            return best;
        }

        let mut candidates: Vec<IndexCandidate<'a>> = Vec::new();
        for index in self.catalog.indexes_for(branch.primary()) {
            if !self.index_eligible(index, branch) {
                continue;
            }
            let mut candidate = IndexCandidate::new(index);
            candidate.insert_leading_equalities(&conditions);
            candidate.attach_range(&conditions, self.goal);
            candidate.determine_order_effectiveness(self.goal);
            candidate.determine_covering(self.goal, branch, &conditions);
            candidate.estimate_cost(self.goal, branch, &conditions, self.model);
            if candidate.usable() {
                candidates.push(candidate);
            }
        }

        for candidate in &candidates {
            let Some(cost) = &candidate.cost else { continue };
            if cost.total() < best.cost.total() {
                debug!(
                    index = %candidate.index.name,
                    cost = cost.total(),
                    over = best.cost.total(),
                    "preferring index scan"
                );
                best = self.index_plan(candidate, &conditions);
            }
        }

        if let Some(intersection) = enumerate_intersections(
            &candidates,
            &conditions,
            self.goal,
            branch,
            self.model,
            observer.take(),
        ) {
            if intersection.cost.total() < best.cost.total() {
                debug!(
                    leaves = intersection.leaves.len(),
                    cost = intersection.cost.total(),
                    over = best.cost.total(),
                    "preferring index intersection"
                );
                best = Self::intersection_plan(&intersection, &conditions);
            }
        }

        best
    }

    /// Single-table indexes need a required branch (checked by the caller);
    /// group indexes additionally need every spanned table present in the
    /// branch with a compatible join kind at each chain link.
    fn index_eligible(&self, index: &IndexDef, branch: &TableBranch) -> bool {
        index.chain.iter().all(|link| {
            match branch.tables.iter().find(|t| t.name == link.table) {
                None => false,
                Some(table) => match link.join_kind {
                    // An inner link only matches rows present on both
                    // sides, so the spanned table must be non-nullable.
                    JoinKind::Inner => table.required,
                    JoinKind::LeftOuter => true,
                    _ => false,
                },
            }
        })
    }

    fn full_scan_plan(&self, branch: &TableBranch, conditions: &[Expr]) -> AccessPlan {
        let mut estimate = CostEstimate::zero();
        for table in &branch.tables {
            estimate = estimate.then(&self.model.full_scan(&table.name));
        }
        if !conditions.is_empty() {
            estimate = estimate.then(&self.model.select(conditions, estimate.rows_out));
        }
        let branch_tables: Vec<&str> = branch.tables.iter().map(|t| t.name.as_str()).collect();
        if self.goal.sort_relevant_for(&branch_tables)
            && self.goal.need_sort(OrderEffectiveness::None)
        {
            estimate = estimate.then(&self.model.sort(estimate.rows_out));
        }
        AccessPlan {
            path: AccessPath::FullScan {
                tables: branch.tables.iter().map(|t| t.name.clone()).collect(),
            },
            cost: estimate,
            residual: conditions.to_vec(),
            effectiveness: OrderEffectiveness::None,
        }
    }

    fn index_plan(&self, candidate: &IndexCandidate<'a>, conditions: &[Expr]) -> AccessPlan {
        AccessPlan {
            path: Self::index_path(candidate),
            cost: candidate.cost.clone().unwrap_or_else(CostEstimate::zero),
            residual: candidate.residual_conditions(conditions),
            effectiveness: candidate.effectiveness,
        }
    }

    fn index_path(candidate: &IndexCandidate<'a>) -> AccessPath {
        AccessPath::IndexScan {
            index: candidate.index.name.clone(),
            equalities: candidate.equalities,
            low: candidate.low.clone(),
            high: candidate.high.clone(),
            segments: candidate.segments.clone(),
            ordering: candidate.ordering.clone(),
            covering: candidate.covering,
        }
    }

    /// Nest the leaves left-deep; the outermost node carries the shared
    /// ordering prefix.
    fn intersection_plan(
        intersection: &IntersectionCandidate<'a>,
        conditions: &[Expr],
    ) -> AccessPlan {
        let mut leaves = intersection.leaves.iter();
        let first = leaves
            .next()
            .map(Self::index_path)
            .unwrap_or(AccessPath::FullScan { tables: vec![] });
        let path = leaves.fold(first, |left, leaf| AccessPath::Intersection {
            left: Box::new(left),
            right: Box::new(Self::index_path(leaf)),
            common_ordering: intersection.common_ordering,
        });
        AccessPlan {
            path,
            cost: intersection.cost.clone(),
            residual: intersection.counts.residual(conditions),
            effectiveness: intersection.effectiveness,
        }
    }
}
