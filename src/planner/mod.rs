//! Cost-based join ordering and index selection.
//!
//! The planner takes a bound join tree, a flat WHERE list, and catalog
//! metadata, and produces a single cheapest plan: an access path per table
//! branch and a join order over the branches. Join ordering is a DPhyp
//! search over the join hypergraph; access paths come from the index-goal
//! chooser; all costing goes through the [`cost::CostModel`] trait.

pub mod access;
pub mod bitset;
pub mod cost;
pub mod enumerator;
pub mod goal;
pub mod graph;
pub mod plan;

pub use access::AccessPathChooser;
pub use bitset::TableSet;
pub use enumerator::{JoinEnumerator, PlanStrategy};
pub use goal::QueryGoal;
pub use plan::{AccessPath, AccessPlan, PlanNode, QueryPlan};

use thiserror::Error;
use tracing::debug;

use crate::catalog::Catalog;
use crate::model::expr::Expr;
use crate::planner::cost::CostModel;
use crate::planner::graph::{JoinGraph, JoinKind, JoinTree};
use crate::planner::plan::JoinPlanNode;

/// Planning-time failure.
///
/// Input is already bound and type-checked, so almost everything here is
/// an internal consistency violation that aborts the current statement.
#[derive(Debug, Error)]
pub enum PlanError {
    /// An invariant the graph builder guarantees was violated downstream.
    #[error("internal planner error: {0}")]
    Internal(String),

    /// The table count exceeds the bitset width.
    #[error("query joins {0} tables, more than the supported maximum")]
    TooManyTables(usize),

    /// The join graph is disconnected; no cross-product fallback is
    /// synthesized.
    #[error("no valid join plan connects all tables")]
    NoValidPlans,
}

pub type PlanResult<T> = Result<T, PlanError>;

/// Strategy wiring the enumerator to the access-path chooser and cost
/// model.
struct DefaultStrategy<'a> {
    graph: &'a JoinGraph,
    catalog: &'a Catalog,
    model: &'a dyn CostModel,
    goal: &'a QueryGoal,
}

impl<'a> PlanStrategy for DefaultStrategy<'a> {
    type Plan = PlanNode;

    fn evaluate_table(&mut self, table: usize) -> PlanResult<Option<PlanNode>> {
        let chooser = AccessPathChooser::new(self.catalog, self.model, self.goal);
        let branch = self.graph.branch(table);
        let access = chooser.choose(branch, self.graph.is_required(table), None);
        Ok(Some(PlanNode::Access(access)))
    }

    fn evaluate_join(
        &mut self,
        left: &PlanNode,
        right: &PlanNode,
        existing: Option<&PlanNode>,
        kind: JoinKind,
        conditions: &[Expr],
    ) -> PlanResult<Option<PlanNode>> {
        let cost = self.model.join(kind, left.cost(), right.cost(), conditions);
        if let Some(existing) = existing {
            // Ties keep the incumbent, so the first order found wins.
            if existing.cost().total() <= cost.total() {
                return Ok(None);
            }
            debug!(
                cost = cost.total(),
                over = existing.cost().total(),
                "preferring join order"
            );
        }
        Ok(Some(PlanNode::Join(JoinPlanNode {
            kind,
            left: Box::new(left.clone()),
            right: Box::new(right.clone()),
            conditions: conditions.to_vec(),
            cost,
        })))
    }
}

/// Top-level planning entry point.
pub struct QueryPlanner<'a> {
    catalog: &'a Catalog,
    model: &'a dyn CostModel,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(catalog: &'a Catalog, model: &'a dyn CostModel) -> Self {
        Self { catalog, model }
    }

    /// Plan one statement: build the hypergraph, run the enumeration, and
    /// finalize the sort strategy against the goal.
    pub fn plan(&self, tree: &JoinTree, goal: &QueryGoal) -> PlanResult<QueryPlan> {
        let graph = JoinGraph::build(tree, &goal.where_list)?;
        let strategy = DefaultStrategy {
            graph: &graph,
            catalog: self.catalog,
            model: self.model,
            goal,
        };
        let mut enumerator = JoinEnumerator::new(&graph, strategy);
        match enumerator.solve()? {
            Some(root) => Ok(goal.install_order_effectiveness(root)),
            None => Err(PlanError::NoValidPlans),
        }
    }
}
