//! Connected-subgraph join enumeration (DPhyp).
//!
//! The enumerator walks connected subgraphs (csg) of the join hypergraph
//! and, for each, connected complement subgraphs (cmp) reachable via a
//! hyperedge, recording the best plan per table subset in a flat array
//! indexed by the subset's mask. Plan construction itself is delegated to
//! an injected [`PlanStrategy`], keeping the search reusable and testable
//! with stub strategies.
//!
//! Worst-case runtime is exponential in the number of tables (roughly
//! O(3^n) on a fully connected graph), which is inherent to optimal join
//! ordering; practical queries stay in the tens of tables.

use tracing::debug;

use crate::model::expr::Expr;
use crate::planner::bitset::TableSet;
use crate::planner::graph::{JoinGraph, JoinKind};
use crate::planner::{PlanError, PlanResult};

/// Plan construction hooks injected into the enumerator.
///
/// `evaluate_join` owns the keep-or-replace decision: when an existing plan
/// for the same subset is passed in, the returned plan must never be worse
/// than it (the search revisits subsets across different splits and relies
/// on this monotonicity).
pub trait PlanStrategy {
    type Plan: Clone;

    /// Best access path for a single leaf table, or `None` if the table
    /// cannot be planned.
    fn evaluate_table(&mut self, table: usize) -> PlanResult<Option<Self::Plan>>;

    /// Best plan joining `left` and `right`, given the incumbent plan for
    /// the union subset (if any).
    fn evaluate_join(
        &mut self,
        left: &Self::Plan,
        right: &Self::Plan,
        existing: Option<&Self::Plan>,
        kind: JoinKind,
        conditions: &[Expr],
    ) -> PlanResult<Option<Self::Plan>>;
}

/// The DPhyp search over one join graph.
pub struct JoinEnumerator<'a, S: PlanStrategy> {
    graph: &'a JoinGraph,
    strategy: S,
    plans: Vec<Option<S::Plan>>,
}

impl<'a, S: PlanStrategy> JoinEnumerator<'a, S> {
    pub fn new(graph: &'a JoinGraph, strategy: S) -> Self {
        let n = graph.table_count();
        Self {
            graph,
            strategy,
            plans: vec![None; 1usize << n],
        }
    }

    /// Run the full enumeration. Returns the best plan covering every
    /// table, or `None` when the graph is disconnected (no cross-product
    /// fallback is synthesized).
    pub fn solve(&mut self) -> PlanResult<Option<S::Plan>> {
        let n = self.graph.table_count();
        if n == 0 {
            return Ok(None);
        }

        for i in 0..n {
            self.plans[TableSet::of(i).raw() as usize] = self.strategy.evaluate_table(i)?;
        }

        for i in (0..n).rev() {
            let ts = TableSet::of(i);
            self.emit_csg(ts)?;
            self.enumerate_csg_rec(ts, TableSet::through(i))?;
        }

        let full = TableSet::full(n);
        debug!(tables = n, "join enumeration finished");
        Ok(self.plans[full.raw() as usize].clone())
    }

    /// The plan currently recorded for a subset, if any. Useful for
    /// inspecting which intermediate subsets the search materialized.
    pub fn plan_for(&self, set: TableSet) -> Option<&S::Plan> {
        self.plans[set.raw() as usize].as_ref()
    }

    pub fn into_strategy(self) -> S {
        self.strategy
    }

    /// Union over every edge applicable from `s` of the minimal table bit
    /// of the edge's complement side, restricted to tables outside
    /// `s ∪ exclude`.
    ///
    /// Taking only the minimal bit per edge avoids duplicate generation;
    /// it does not eliminate subsumed hypernodes, matching the reference
    /// behavior.
    fn neighborhood(&self, s: TableSet, exclude: TableSet) -> TableSet {
        let excluded = s | exclude;
        let edges = self.graph.edges();
        let mut result = TableSet::EMPTY;
        for e in 0..edges.len() {
            if edges[e].required.is_subset_of(s) {
                let other = edges[e ^ 1].required;
                if !other.overlaps(excluded) {
                    result |= other.min_bit();
                }
            }
        }
        result
    }

    /// Whether some hyperedge directly connects `s1` to `s2`.
    fn has_direct_edge(&self, s1: TableSet, s2: TableSet) -> bool {
        let edges = self.graph.edges();
        (0..edges.len()).any(|e| {
            edges[e].required.is_subset_of(s1) && edges[e ^ 1].required.is_subset_of(s2)
        })
    }

    /// Emit `s1` as a connected subgraph: pair it with every reachable
    /// complement, growing complements recursively.
    fn emit_csg(&mut self, s1: TableSet) -> PlanResult<()> {
        let min = s1.min_index().expect("emit_csg on empty set");
        let exclude = s1 | TableSet::through(min);
        let neighborhood = self.neighborhood(s1, exclude);
        let n = self.graph.table_count();
        for i in (0..n).rev() {
            if !neighborhood.contains(i) {
                continue;
            }
            let s2 = TableSet::of(i);
            if self.has_direct_edge(s1, s2) {
                self.emit_csg_cmp(s1, s2)?;
            }
            self.enumerate_cmp_rec(s1, s2, exclude)?;
        }
        Ok(())
    }

    /// Grow `s1` by every subset of its neighborhood: first emit each
    /// grown subgraph that already has a plan, then recurse with the whole
    /// neighborhood excluded.
    fn enumerate_csg_rec(&mut self, s1: TableSet, exclude: TableSet) -> PlanResult<()> {
        let neighborhood = self.neighborhood(s1, exclude);
        if neighborhood.is_empty() {
            return Ok(());
        }

        let mut sub = TableSet::EMPTY;
        loop {
            sub = sub.next_subset(neighborhood);
            let next = s1 | sub;
            if self.plans[next.raw() as usize].is_some() {
                self.emit_csg(next)?;
            }
            if sub == neighborhood {
                break;
            }
        }

        let exclude = exclude | neighborhood;
        let mut sub = TableSet::EMPTY;
        loop {
            sub = sub.next_subset(neighborhood);
            self.enumerate_csg_rec(s1 | sub, exclude)?;
            if sub == neighborhood {
                break;
            }
        }
        Ok(())
    }

    /// Grow the complement side `s2`, emitting each grown complement that
    /// has a plan and is directly connected to `s1`.
    fn enumerate_cmp_rec(
        &mut self,
        s1: TableSet,
        s2: TableSet,
        exclude: TableSet,
    ) -> PlanResult<()> {
        let neighborhood = self.neighborhood(s2, exclude);
        if neighborhood.is_empty() {
            return Ok(());
        }

        let mut sub = TableSet::EMPTY;
        loop {
            sub = sub.next_subset(neighborhood);
            let next = s2 | sub;
            if self.plans[next.raw() as usize].is_some() && self.has_direct_edge(s1, next) {
                self.emit_csg_cmp(s1, next)?;
            }
            if sub == neighborhood {
                break;
            }
        }

        let exclude = exclude | neighborhood;
        let mut sub = TableSet::EMPTY;
        loop {
            sub = sub.next_subset(neighborhood);
            self.enumerate_cmp_rec(s1, s2 | sub, exclude)?;
            if sub == neighborhood {
                break;
            }
        }
        Ok(())
    }

    /// Join the plans for a csg-cmp pair and record the result for the
    /// union subset.
    fn emit_csg_cmp(&mut self, s1: TableSet, s2: TableSet) -> PlanResult<()> {
        let (kind, oriented_forward, conditions) = self.matching_operator(s1, s2)?;

        let Some(p1) = self.plans[s1.raw() as usize].clone() else {
            return Ok(());
        };
        let Some(p2) = self.plans[s2.raw() as usize].clone() else {
            return Ok(());
        };
        // Non-commutative operators fix which side is which; honor the
        // orientation the edge matched in.
        let (p1, p2) = if oriented_forward { (p1, p2) } else { (p2, p1) };

        let union = (s1 | s2).raw() as usize;
        let mut best = self.plans[union].clone();
        if let Some(plan) =
            self.strategy
                .evaluate_join(&p1, &p2, best.as_ref(), kind, &conditions)?
        {
            best = Some(plan);
        }
        if kind.is_commutative() {
            if let Some(plan) =
                self.strategy
                    .evaluate_join(&p2, &p1, best.as_ref(), kind, &conditions)?
            {
                best = Some(plan);
            }
        }
        self.plans[union] = best;
        Ok(())
    }

    /// Find the operator governing the (s1, s2) pairing.
    ///
    /// Every connecting inner edge contributes its conditions; at most one
    /// connecting operator may impose ordering constraints (anything
    /// non-inner). More than one constrained match is a builder bug.
    fn matching_operator(
        &self,
        s1: TableSet,
        s2: TableSet,
    ) -> PlanResult<(JoinKind, bool, Vec<Expr>)> {
        let edges = self.graph.edges();
        let ops = self.graph.ops();
        let mut governing: Option<(JoinKind, bool)> = None;
        let mut conditions = Vec::new();
        let mut found = false;

        for e in (0..edges.len()).step_by(2) {
            let a = edges[e].required;
            let b = edges[e + 1].required;
            let forward = a.is_subset_of(s1) && b.is_subset_of(s2);
            let backward = b.is_subset_of(s1) && a.is_subset_of(s2);
            if !forward && !backward {
                continue;
            }
            found = true;
            let op = &ops[edges[e].op];
            conditions.extend(op.conditions.iter().cloned());
            if op.kind != JoinKind::Inner {
                if governing.is_some() {
                    return Err(PlanError::Internal(format!(
                        "ambiguous join operator for {s1:?} x {s2:?}"
                    )));
                }
                governing = Some((op.kind, forward));
            }
        }

        if !found {
            return Err(PlanError::Internal(format!(
                "no join operator connects {s1:?} and {s2:?}"
            )));
        }
        let (kind, forward) = governing.unwrap_or((JoinKind::Inner, true));
        Ok((kind, forward, conditions))
    }
}
