//! Statistics-backed reference implementation of the cost model.

use std::collections::{HashMap, HashSet};

use crate::catalog::{Catalog, IndexDef, RangeBound};
use crate::model::expr::{BinaryOp, Expr};
use crate::planner::cost::{CostEstimate, CostModel};
use crate::planner::graph::JoinKind;

/// Fallback row count for tables without statistics.
const DEFAULT_ROW_COUNT: usize = 1_000_000;

/// Deterministic cost model over catalog row counts and a set of
/// known-high-cardinality columns.
#[derive(Debug, Clone, Default)]
pub struct StatsCostModel {
    rows: HashMap<String, usize>,
    high_cardinality: HashSet<String>,
}

impl StatsCostModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed row counts from catalog statistics.
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut model = Self::new();
        for table in catalog.tables() {
            if let Some(rows) = table.row_count {
                model.rows.insert(table.name.clone(), rows as usize);
            }
        }
        model
    }

    pub fn with_table(mut self, table: impl Into<String>, rows: usize) -> Self {
        self.rows.insert(table.into(), rows);
        self
    }

    /// Mark `entity.column` as high-cardinality (equality on it is very
    /// selective).
    pub fn with_high_cardinality(mut self, qualified: impl Into<String>) -> Self {
        self.high_cardinality.insert(qualified.into());
        self
    }

    fn table_rows(&self, table: &str) -> usize {
        self.rows.get(table).copied().unwrap_or(DEFAULT_ROW_COUNT)
    }

    /// Selectivity for an equality on a column.
    ///
    /// High cardinality: very selective (1 in 1000). Low cardinality or
    /// unknown: 1 in 10.
    fn equality_selectivity(&self, column: &Expr) -> f64 {
        if let Some(qualified) = Self::qualified_name(column) {
            if self.high_cardinality.contains(&qualified) {
                return 0.001;
            }
        }
        0.1
    }

    fn qualified_name(expr: &Expr) -> Option<String> {
        match expr {
            Expr::Column {
                entity: Some(entity),
                column,
            } => Some(format!("{entity}.{column}")),
            Expr::Column {
                entity: None,
                column,
            } => Some(column.clone()),
            _ => None,
        }
    }

    /// Fraction of rows passing a predicate.
    fn condition_selectivity(&self, condition: &Expr) -> f64 {
        match condition {
            Expr::BinaryOp { op, left, right } => match op {
                BinaryOp::Eq => {
                    if matches!(**left, Expr::Column { .. }) {
                        self.equality_selectivity(left)
                    } else if matches!(**right, Expr::Column { .. }) {
                        self.equality_selectivity(right)
                    } else {
                        0.1
                    }
                }
                BinaryOp::Gt | BinaryOp::Lt | BinaryOp::Gte | BinaryOp::Lte => 0.33,
                BinaryOp::And => {
                    self.condition_selectivity(left) * self.condition_selectivity(right)
                }
                BinaryOp::Or => {
                    let l = self.condition_selectivity(left);
                    let r = self.condition_selectivity(right);
                    l + r - (l * r)
                }
                _ => 0.5,
            },
            _ => 0.5,
        }
    }
}

impl CostModel for StatsCostModel {
    fn full_scan(&self, table: &str) -> CostEstimate {
        let rows = self.table_rows(table);
        CostEstimate {
            rows_out: rows,
            cpu_cost: rows as f64,
            io_cost: rows as f64,
            memory_cost: 0.0,
        }
    }

    fn index_scan(
        &self,
        index: &IndexDef,
        equalities: usize,
        low: Option<&RangeBound>,
        high: Option<&RangeBound>,
    ) -> CostEstimate {
        let base = self.table_rows(index.leaf_table());

        // A unique index fully pegged on its key returns at most one row.
        if index.unique && equalities >= index.key_columns {
            return CostEstimate {
                rows_out: 1,
                cpu_cost: (base.max(2) as f64).log2(),
                io_cost: 1.0,
                memory_cost: 0.0,
            };
        }

        let mut selectivity = 1.0;
        for column in index.columns.iter().take(equalities) {
            selectivity *= self.equality_selectivity(&column.expr);
        }
        if low.is_some() || high.is_some() {
            selectivity *= 0.33;
        }

        let rows_out = ((base as f64 * selectivity) as usize).max(1);
        CostEstimate {
            rows_out,
            // Descend the tree, then walk the qualifying entries.
            cpu_cost: (base.max(2) as f64).log2() + rows_out as f64,
            io_cost: rows_out as f64 * 0.1,
            memory_cost: 0.0,
        }
    }

    fn select(&self, conditions: &[Expr], input_rows: usize) -> CostEstimate {
        let mut selectivity = 1.0;
        for condition in conditions {
            selectivity *= self.condition_selectivity(condition);
        }
        CostEstimate {
            rows_out: ((input_rows as f64 * selectivity) as usize).max(1),
            cpu_cost: input_rows as f64,
            io_cost: 0.0,
            memory_cost: 0.0,
        }
    }

    fn sort(&self, input_rows: usize) -> CostEstimate {
        let n = input_rows.max(1) as f64;
        CostEstimate {
            rows_out: input_rows,
            cpu_cost: n * n.max(2.0).log2(),
            io_cost: 0.0,
            memory_cost: n,
        }
    }

    fn flatten(&self, _table: &str, input_rows: usize) -> CostEstimate {
        // One row lookup per index entry.
        CostEstimate {
            rows_out: input_rows,
            cpu_cost: input_rows as f64,
            io_cost: input_rows as f64,
            memory_cost: 0.0,
        }
    }

    fn intersect(&self, left: &CostEstimate, right: &CostEstimate) -> CostEstimate {
        let rows_out = (left.rows_out.min(right.rows_out) / 10).max(1);
        CostEstimate {
            rows_out,
            // Both scans plus the merge walk.
            cpu_cost: left.cpu_cost + right.cpu_cost + (left.rows_out + right.rows_out) as f64,
            io_cost: left.io_cost + right.io_cost,
            memory_cost: left.memory_cost.max(right.memory_cost),
        }
    }

    fn join(
        &self,
        _kind: JoinKind,
        left: &CostEstimate,
        right: &CostEstimate,
        conditions: &[Expr],
    ) -> CostEstimate {
        let rows_out = if conditions.is_empty() {
            left.rows_out.saturating_mul(right.rows_out)
        } else {
            // Conservative: the larger input bounds an equi-join's output.
            left.rows_out.max(right.rows_out)
        };
        CostEstimate {
            rows_out,
            // Scan both sides, build the hash table, probe.
            cpu_cost: left.cpu_cost + right.cpu_cost + rows_out as f64,
            io_cost: left.io_cost + right.io_cost,
            memory_cost: left
                .memory_cost
                .max(right.memory_cost)
                .max(left.rows_out.min(right.rows_out) as f64),
        }
    }
}
