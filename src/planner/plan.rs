//! Chosen-plan values produced by the planner.
//!
//! These are opaque to the enumeration machinery: a plan is either an
//! access path for one table branch or a join of two plans, annotated with
//! its cost estimate. Physical operator construction happens downstream.

use serde::{Deserialize, Serialize};

use crate::catalog::{ColumnRanges, RangeBound};
use crate::model::expr::{Expr, OrderByExpr};
use crate::planner::cost::CostEstimate;
use crate::planner::graph::JoinKind;

/// How well an access path's natural order satisfies the requested
/// sort/group/distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEffectiveness {
    None,
    PartialGrouped,
    Grouped,
    Sorted,
}

/// Strategy for the downstream sort/aggregate step after a plan is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortStrategy {
    /// Input already arrives in the required order; the explicit sort is
    /// spliced out.
    PreSorted,
    /// An explicit sort is still required.
    Sort,
    /// Aggregation can consume grouped input but the result must be
    /// re-sorted for the requested ordering.
    PreAggregateResort,
}

/// The chosen way to read one table branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AccessPath {
    /// Scan the branch in full, no index.
    FullScan { tables: Vec<String> },
    /// One index scan with its bound conditions and finalized ordering.
    IndexScan {
        index: String,
        equalities: usize,
        low: Option<RangeBound>,
        high: Option<RangeBound>,
        /// Disjoint interval set scanned segment by segment, if attached.
        segments: Option<ColumnRanges>,
        ordering: Vec<OrderByExpr>,
        covering: bool,
    },
    /// Merge-intersection of two compatible index scans.
    Intersection {
        left: Box<AccessPath>,
        right: Box<AccessPath>,
        /// Leading ordering columns the two scans share.
        common_ordering: usize,
    },
}

/// An access path plus everything the physical-plan builder must layer on
/// top of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPlan {
    pub path: AccessPath,
    pub cost: CostEstimate,
    /// Conditions the access path does not discharge; evaluated post-scan.
    pub residual: Vec<Expr>,
    pub effectiveness: OrderEffectiveness,
}

/// A join of two plans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinPlanNode {
    pub kind: JoinKind,
    pub left: Box<PlanNode>,
    pub right: Box<PlanNode>,
    pub conditions: Vec<Expr>,
    pub cost: CostEstimate,
}

/// Plan tree flowing through the enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanNode {
    Access(AccessPlan),
    Join(JoinPlanNode),
}

impl PlanNode {
    pub fn cost(&self) -> &CostEstimate {
        match self {
            PlanNode::Access(access) => &access.cost,
            PlanNode::Join(join) => &join.cost,
        }
    }

    /// Order effectiveness of the driving (outermost left) access path,
    /// which is what determines the ordering of the join output.
    pub fn order_effectiveness(&self) -> OrderEffectiveness {
        match self {
            PlanNode::Access(access) => access.effectiveness,
            PlanNode::Join(join) => join.left.order_effectiveness(),
        }
    }
}

/// The final planning result for one statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub root: PlanNode,
    /// `None` when the query requested no ordering/grouping/distinct.
    pub sort: Option<SortStrategy>,
    pub cost: CostEstimate,
}
