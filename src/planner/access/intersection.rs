//! Multi-index intersection enumeration.
//!
//! When no single index discharges all selective predicates on a table,
//! two (or more) equality-pegged index scans can be merge-intersected on
//! their compatibly-ordered key streams before fetching rows. Leaves must
//! have consumed only equality conditions; ranges and interval sets make
//! the streams incompatible.

use crate::model::expr::{BinaryOp, Expr, OrderByExpr};
use crate::planner::access::candidate::IndexCandidate;
use crate::planner::cost::{CostEstimate, CostModel};
use crate::planner::goal::QueryGoal;
use crate::planner::graph::TableBranch;
use crate::planner::plan::OrderEffectiveness;

/// Per-condition discharge counter across an intersection's leaves.
///
/// A condition satisfied by either leaf must not also be charged as a
/// residual filter, and a condition satisfied by both must only count
/// once.
#[derive(Debug, Clone)]
pub struct ConditionCounts {
    counts: Vec<usize>,
}

impl ConditionCounts {
    pub fn new(conditions: usize) -> Self {
        Self {
            counts: vec![0; conditions],
        }
    }

    /// Record the conditions one leaf consumed.
    pub fn absorb(&mut self, consumed: &[usize]) {
        for &i in consumed {
            if let Some(count) = self.counts.get_mut(i) {
                *count += 1;
            }
        }
    }

    pub fn discharges(&self, condition: usize) -> bool {
        self.counts.get(condition).is_some_and(|c| *c > 0)
    }

    /// Number of distinct conditions the intersection discharges.
    pub fn discharged(&self) -> usize {
        self.counts.iter().filter(|c| **c > 0).count()
    }

    /// Conditions no leaf consumed.
    pub fn residual(&self, conditions: &[Expr]) -> Vec<Expr> {
        conditions
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.discharges(*i))
            .map(|(_, c)| c.clone())
            .collect()
    }
}

/// Two column expressions are interchangeable for ordering purposes when
/// they are the same column or an equality condition ties them together.
fn columns_equivalent(a: &Expr, b: &Expr, conditions: &[Expr]) -> bool {
    if a == b {
        return true;
    }
    conditions.iter().any(|condition| {
        matches!(
            condition.as_comparison(),
            Some((lhs, BinaryOp::Eq, rhs)) if (lhs == a && rhs == b) || (lhs == b && rhs == a)
        )
    })
}

/// Length of the agreeing ordering prefix between two key streams.
fn common_prefix(a: &[OrderByExpr], b: &[OrderByExpr], conditions: &[Expr]) -> usize {
    a.iter()
        .zip(b.iter())
        .take_while(|(x, y)| {
            x.ascending == y.ascending && columns_equivalent(&x.expr, &y.expr, conditions)
        })
        .count()
}

/// Merge-compatible means the shorter effective ordering is entirely a
/// prefix of the longer one (up to column equivalence).
fn merge_compatible(a: &IndexCandidate, b: &IndexCandidate, conditions: &[Expr]) -> Option<usize> {
    let oa = a.effective_ordering();
    let ob = b.effective_ordering();
    let shared = common_prefix(oa, ob, conditions);
    (shared == oa.len().min(ob.len())).then_some(shared)
}

fn effectiveness_rank(e: OrderEffectiveness) -> u8 {
    match e {
        OrderEffectiveness::None => 0,
        OrderEffectiveness::PartialGrouped => 1,
        OrderEffectiveness::Grouped => 2,
        OrderEffectiveness::Sorted => 3,
    }
}

/// A combined candidate over two or more intersection leaves.
#[derive(Debug, Clone)]
pub struct IntersectionCandidate<'a> {
    pub leaves: Vec<IndexCandidate<'a>>,
    /// Leading ordering columns all leaves share past their equality pegs.
    pub common_ordering: usize,
    pub counts: ConditionCounts,
    pub effectiveness: OrderEffectiveness,
    pub cost: CostEstimate,
}

impl<'a> IntersectionCandidate<'a> {
    fn combine(
        leaves: Vec<IndexCandidate<'a>>,
        common_ordering: usize,
        scans: &[CostEstimate],
        conditions: &[Expr],
        goal: &QueryGoal,
        branch: &TableBranch,
        model: &dyn CostModel,
    ) -> Self {
        let mut counts = ConditionCounts::new(conditions.len());
        for leaf in &leaves {
            counts.absorb(&leaf.consumed);
        }

        // The merged stream preserves only what every input stream
        // guarantees.
        let effectiveness = leaves
            .iter()
            .map(|l| l.effectiveness)
            .min_by_key(|e| effectiveness_rank(*e))
            .unwrap_or(OrderEffectiveness::None);

        let mut estimate = scans[0].clone();
        for scan in &scans[1..] {
            estimate = model.intersect(&estimate, scan);
        }

        // Intersections identify matching entries; the rows themselves
        // still have to be fetched unless some leaf covers on its own.
        if !leaves.iter().any(|l| l.covering) {
            estimate = estimate.then(&model.flatten(branch.primary(), estimate.rows_out));
        }
        let residual = counts.residual(conditions);
        if !residual.is_empty() {
            estimate = estimate.then(&model.select(&residual, estimate.rows_out));
        }
        let branch_tables: Vec<&str> = branch.tables.iter().map(|t| t.name.as_str()).collect();
        if goal.sort_relevant_for(&branch_tables) && goal.need_sort(effectiveness) {
            estimate = estimate.then(&model.sort(estimate.rows_out));
        }

        Self {
            leaves,
            common_ordering,
            counts,
            effectiveness,
            cost: estimate,
        }
    }
}

/// Enumerate pairwise intersections over the eligible leaves, greedily
/// extending the best pair with further compatible leaves, and return the
/// cheapest combination found. The observer sees every pairwise candidate
/// produced.
pub fn enumerate_intersections<'a>(
    leaves: &[IndexCandidate<'a>],
    conditions: &[Expr],
    goal: &QueryGoal,
    branch: &TableBranch,
    model: &dyn CostModel,
    mut observer: Option<&mut dyn FnMut(&IntersectionCandidate<'a>)>,
) -> Option<IntersectionCandidate<'a>> {
    let eligible: Vec<&IndexCandidate<'a>> =
        leaves.iter().filter(|l| l.intersection_leaf()).collect();
    if eligible.len() < 2 {
        return None;
    }

    // Scan costs are re-used across every pairing; derive them once.
    let scans: Vec<CostEstimate> = eligible.iter().map(|l| l.scan_estimate(model)).collect();

    let mut best: Option<IntersectionCandidate<'a>> = None;
    let mut best_members: Vec<usize> = Vec::new();
    for i in 0..eligible.len() {
        for j in i + 1..eligible.len() {
            let Some(shared) = merge_compatible(eligible[i], eligible[j], conditions) else {
                continue;
            };
            let candidate = IntersectionCandidate::combine(
                vec![eligible[i].clone(), eligible[j].clone()],
                shared,
                &[scans[i].clone(), scans[j].clone()],
                conditions,
                goal,
                branch,
                model,
            );
            // Both leaves must pull their weight: an intersection that
            // discharges no more conditions than one leaf alone is noise.
            if candidate.counts.discharged() <= eligible[i].equalities.max(eligible[j].equalities) {
                continue;
            }
            if let Some(obs) = observer.as_deref_mut() {
                obs(&candidate);
            }
            let better = match &best {
                Some(current) => candidate.cost.total() < current.cost.total(),
                None => true,
            };
            if better {
                best = Some(candidate);
                best_members = vec![i, j];
            }
        }
    }

    // Greedy transitive extension: grow the winning pair while adding a
    // leaf keeps lowering total cost.
    if let Some(mut current) = best.take() {
        let mut members = best_members;
        let mut grew = true;
        while grew {
            grew = false;
            for (k, leaf) in eligible.iter().enumerate() {
                if members.contains(&k) {
                    continue;
                }
                let compatible = current
                    .leaves
                    .iter()
                    .all(|existing| merge_compatible(existing, leaf, conditions).is_some());
                if !compatible {
                    continue;
                }
                let shared = current
                    .leaves
                    .iter()
                    .filter_map(|existing| merge_compatible(existing, leaf, conditions))
                    .min()
                    .unwrap_or(0)
                    .min(current.common_ordering);
                let mut extended_leaves = current.leaves.clone();
                extended_leaves.push((*leaf).clone());
                let mut extended_scans: Vec<CostEstimate> =
                    members.iter().map(|&m| scans[m].clone()).collect();
                extended_scans.push(scans[k].clone());
                let extended = IntersectionCandidate::combine(
                    extended_leaves,
                    shared,
                    &extended_scans,
                    conditions,
                    goal,
                    branch,
                    model,
                );
                if extended.counts.discharged() > current.counts.discharged()
                    && extended.cost.total() < current.cost.total()
                {
                    current = extended;
                    members.push(k);
                    grew = true;
                    break;
                }
            }
        }
        best = Some(current);
    }

    best
}
