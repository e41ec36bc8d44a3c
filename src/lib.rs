//! # Hyperplan
//!
//! Cost-based join order enumeration and index selection for a SQL query
//! optimizer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        Bound join tree + WHERE list + Catalog            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [graph builder]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Join hypergraph (SES/TES, hyperedge pairs)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [DPhyp enumerator]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Best plan per connected table subset (flat DP array)   │
//! │   leaves planned by the index-goal access-path chooser   │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [goal context]
//! ┌─────────────────────────────────────────────────────────┐
//! │    QueryPlan (join order, access paths, sort strategy)   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything statistical goes through the [`planner::cost::CostModel`]
//! trait; [`planner::cost::StatsCostModel`] is the bundled reference
//! implementation.

pub mod catalog;
pub mod model;
pub mod planner;

pub use catalog::{Catalog, ColumnRanges, IndexColumn, IndexDef, RangeBound, TableDef};
pub use model::expr::{Expr, OrderByExpr};
pub use planner::cost::{CostEstimate, CostModel, StatsCostModel};
pub use planner::graph::{JoinKind, JoinTree};
pub use planner::{PlanError, PlanResult, QueryGoal, QueryPlan, QueryPlanner};
