//! Cost estimation interface consumed by the enumerator and access-path
//! chooser.
//!
//! The planner never computes statistics itself; it calls a [`CostModel`]
//! to turn an access pattern or a join combination into a scalar cost plus
//! an output row estimate. By contract the model always returns some usable
//! estimate (falling back to defaults when statistics are missing), so the
//! planner performs no retry logic.

pub mod estimator;

pub use estimator::StatsCostModel;

use serde::{Deserialize, Serialize};

use crate::catalog::{IndexDef, RangeBound};
use crate::model::expr::Expr;
use crate::planner::graph::JoinKind;

/// Multi-objective cost estimate with component breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Estimated number of output rows
    pub rows_out: usize,
    /// CPU cost component
    pub cpu_cost: f64,
    /// I/O cost component (weighted higher)
    pub io_cost: f64,
    /// Memory cost component (weighted lower)
    pub memory_cost: f64,
}

impl CostEstimate {
    pub fn zero() -> Self {
        Self {
            rows_out: 0,
            cpu_cost: 0.0,
            io_cost: 0.0,
            memory_cost: 0.0,
        }
    }

    /// Calculate total weighted cost.
    ///
    /// Weights: CPU = 1.0, IO = 10.0 (IO is expensive), Memory = 0.1
    /// (memory is cheap). The total is the scalar the planner compares.
    pub fn total(&self) -> f64 {
        (self.cpu_cost * 1.0) + (self.io_cost * 10.0) + (self.memory_cost * 0.1)
    }

    /// Fold a downstream step's cost into this estimate, keeping the
    /// downstream row count.
    pub fn then(&self, next: &CostEstimate) -> CostEstimate {
        CostEstimate {
            rows_out: next.rows_out,
            cpu_cost: self.cpu_cost + next.cpu_cost,
            io_cost: self.io_cost + next.io_cost,
            memory_cost: self.memory_cost.max(next.memory_cost),
        }
    }
}

/// External cost-estimation interface.
///
/// Implementations are pure functions of their inputs: same inputs, same
/// estimate, no side effects on shared statistics.
pub trait CostModel {
    /// Scanning a table in full, no index.
    fn full_scan(&self, table: &str) -> CostEstimate;

    /// Scanning an index with `equalities` leading columns pegged and an
    /// optional range on the next column.
    fn index_scan(
        &self,
        index: &IndexDef,
        equalities: usize,
        low: Option<&RangeBound>,
        high: Option<&RangeBound>,
    ) -> CostEstimate;

    /// Filtering `input_rows` rows through residual conditions.
    fn select(&self, conditions: &[Expr], input_rows: usize) -> CostEstimate;

    /// Sorting `input_rows` rows.
    fn sort(&self, input_rows: usize) -> CostEstimate;

    /// Fetching full rows (and ancestor/descendant tables of a group) for
    /// `input_rows` index entries that did not cover the query.
    fn flatten(&self, table: &str, input_rows: usize) -> CostEstimate;

    /// Merge-intersecting two compatible index scans.
    fn intersect(&self, left: &CostEstimate, right: &CostEstimate) -> CostEstimate;

    /// Joining two planned inputs.
    fn join(
        &self,
        kind: JoinKind,
        left: &CostEstimate,
        right: &CostEstimate,
        conditions: &[Expr],
    ) -> CostEstimate;
}
