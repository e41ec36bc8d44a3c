//! Schema inputs: tables, indexes, and pre-extracted column ranges.
//!
//! The catalog is read-only metadata handed to the planner by reference.
//! A planning invocation never mutates it.

use serde::{Deserialize, Serialize};

use crate::model::expr::Expr;
use crate::planner::graph::JoinKind;

/// A joinable unit known to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    /// Row count from statistics, if collected.
    pub row_count: Option<u64>,
}

impl TableDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            row_count: None,
        }
    }

    pub fn with_rows(name: impl Into<String>, rows: u64) -> Self {
        Self {
            name: name.into(),
            row_count: Some(rows),
        }
    }
}

/// One indexed column: expression plus stored direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexColumn {
    pub expr: Expr,
    pub ascending: bool,
}

impl IndexColumn {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            ascending: true,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            ascending: false,
        }
    }
}

/// One link in a group index's root-to-leaf table chain.
///
/// `join_kind` is the kind of the join between this link's table and its
/// parent link; the root link carries `Inner` by convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainLink {
    pub table: String,
    pub join_kind: JoinKind,
}

/// A physical index definition.
///
/// Single-table indexes have a one-link chain. Multi-table "group" indexes
/// span a chain of physically co-located tables, root-most first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    pub columns: Vec<IndexColumn>,
    pub unique: bool,
    /// Number of key columns; trailing columns are included value columns.
    pub key_columns: usize,
    pub chain: Vec<ChainLink>,
}

impl IndexDef {
    /// A single-table index with all-ascending columns.
    pub fn on_table(
        name: impl Into<String>,
        table: impl Into<String>,
        columns: Vec<IndexColumn>,
    ) -> Self {
        let key_columns = columns.len();
        Self {
            name: name.into(),
            columns,
            unique: false,
            key_columns,
            chain: vec![ChainLink {
                table: table.into(),
                join_kind: JoinKind::Inner,
            }],
        }
    }

    /// The leaf-most table of the index's span.
    pub fn leaf_table(&self) -> &str {
        &self.chain.last().expect("index chain is never empty").table
    }

    /// True if `table` is part of the index's span.
    pub fn spans_table(&self, table: &str) -> bool {
        self.chain.iter().any(|link| link.table == table)
    }

    pub fn is_group_index(&self) -> bool {
        self.chain.len() > 1
    }
}

/// Inclusive/exclusive endpoint of an index range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeBound {
    pub value: Expr,
    pub inclusive: bool,
}

impl RangeBound {
    pub fn inclusive(value: Expr) -> Self {
        Self {
            value,
            inclusive: true,
        }
    }

    pub fn exclusive(value: Expr) -> Self {
        Self {
            value,
            inclusive: false,
        }
    }
}

/// One segment of a disjoint interval set. Open ends are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeSegment {
    pub low: Option<RangeBound>,
    pub high: Option<RangeBound>,
}

/// A pre-extracted disjoint interval set for one column, e.g. from an IN
/// list or OR-of-comparisons rewrite done upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRanges {
    pub column: Expr,
    pub segments: Vec<RangeSegment>,
}

/// Active schema metadata for one planning invocation.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: Vec<TableDef>,
    indexes: Vec<IndexDef>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, table: TableDef) -> &mut Self {
        self.tables.push(table);
        self
    }

    pub fn add_index(&mut self, index: IndexDef) -> &mut Self {
        self.indexes.push(index);
        self
    }

    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    /// All indexes whose leaf table is `table`, in catalog order.
    pub fn indexes_for(&self, table: &str) -> impl Iterator<Item = &IndexDef> {
        let table = table.to_string();
        self.indexes
            .iter()
            .filter(move |idx| idx.leaf_table() == table)
    }

    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }
}
