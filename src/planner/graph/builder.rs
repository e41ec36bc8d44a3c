//! Builds the join hypergraph from a bound join tree and WHERE list.
//!
//! The builder flattens the join tree into leaf table branches, computes
//! each operator's syntactic and total eligibility sets, and emits one
//! hyperedge pair per reorderable operator. WHERE-clause comparisons that
//! cleanly connect two tables are promoted to virtual inner joins so they
//! can drive reordering too; everything else stays behind as a residual
//! filter.

use std::collections::HashMap;

use crate::model::expr::Expr;
use crate::planner::bitset::{TableSet, MAX_TABLES};
use crate::planner::graph::operator::{JoinKind, JoinOp};
use crate::planner::{PlanError, PlanResult};

/// One table of a branch, with the join kind linking it to its parent
/// within the branch. The root link carries `Inner`.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchTable {
    pub name: String,
    pub required: bool,
    pub join_kind: JoinKind,
}

/// A joinable unit: usually a single table, sometimes a chain of
/// physically co-located tables handled atomically (the unit a group index
/// can span).
#[derive(Debug, Clone, PartialEq)]
pub struct TableBranch {
    pub tables: Vec<BranchTable>,
}

impl TableBranch {
    pub fn single(name: impl Into<String>) -> Self {
        Self {
            tables: vec![BranchTable {
                name: name.into(),
                required: true,
                join_kind: JoinKind::Inner,
            }],
        }
    }

    /// The leaf-most table, used for statistics lookups.
    pub fn primary(&self) -> &str {
        &self.tables.last().expect("branch is never empty").name
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t.name == table)
    }
}

/// Bound join tree input. Non-join nodes are leaves.
#[derive(Debug, Clone)]
pub enum JoinTree {
    Leaf(TableBranch),
    Join {
        kind: JoinKind,
        left: Box<JoinTree>,
        right: Box<JoinTree>,
        condition: Option<Expr>,
    },
}

impl JoinTree {
    pub fn table(name: impl Into<String>) -> Self {
        JoinTree::Leaf(TableBranch::single(name))
    }

    pub fn join(kind: JoinKind, left: JoinTree, right: JoinTree, condition: Option<Expr>) -> Self {
        JoinTree::Join {
            kind,
            left: Box::new(left),
            right: Box::new(right),
            condition,
        }
    }

    pub fn inner(left: JoinTree, right: JoinTree, condition: Expr) -> Self {
        Self::join(JoinKind::Inner, left, right, Some(condition))
    }

    pub fn left_outer(left: JoinTree, right: JoinTree, condition: Expr) -> Self {
        Self::join(JoinKind::LeftOuter, left, right, Some(condition))
    }
}

/// One directed half of a hyperedge. Halves are stored as consecutive
/// entries; the partner of edge `e` is always `e ^ 1`.
#[derive(Debug, Clone, Copy)]
pub struct HyperEdge {
    pub required: TableSet,
    /// Arena index of the operator this edge was derived from.
    pub op: usize,
}

/// The join hypergraph: leaf branches, the operator arena, and the flat
/// edge array the enumerator searches.
#[derive(Debug)]
pub struct JoinGraph {
    branches: Vec<TableBranch>,
    /// Whether each leaf is on a non-nullable path (not under the optional
    /// side of an outer join).
    required: Vec<bool>,
    ops: Vec<JoinOp>,
    edges: Vec<HyperEdge>,
    by_name: HashMap<String, usize>,
}

impl JoinGraph {
    /// Build the hypergraph for one planning invocation.
    pub fn build(root: &JoinTree, where_list: &[Expr]) -> PlanResult<JoinGraph> {
        let mut graph = JoinGraph {
            branches: Vec::new(),
            required: Vec::new(),
            ops: Vec::new(),
            edges: Vec::new(),
            by_name: HashMap::new(),
        };
        graph.flatten(root, true)?;
        if graph.branches.len() > MAX_TABLES {
            return Err(PlanError::TooManyTables(graph.branches.len()));
        }
        graph.build_operators(root)?;
        graph.calc_tes();
        graph.emit_operator_edges();
        graph.promote_where_edges(where_list);
        Ok(graph)
    }

    pub fn table_count(&self) -> usize {
        self.branches.len()
    }

    pub fn branch(&self, index: usize) -> &TableBranch {
        &self.branches[index]
    }

    pub fn branches(&self) -> &[TableBranch] {
        &self.branches
    }

    /// Whether leaf `index` sits on a non-nullable path.
    pub fn is_required(&self, index: usize) -> bool {
        self.required[index]
    }

    pub fn ops(&self) -> &[JoinOp] {
        &self.ops
    }

    pub fn edges(&self) -> &[HyperEdge] {
        &self.edges
    }

    /// Leaf index for a table name, if the table is part of this graph.
    pub fn table_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Map an expression's referenced tables onto leaf indices. Unknown
    /// names (correlated outer references) yield `None`.
    pub fn tables_of(&self, expr: &Expr) -> Option<TableSet> {
        let mut set = TableSet::EMPTY;
        for name in expr.referenced_tables() {
            set |= TableSet::of(*self.by_name.get(&name)?);
        }
        Some(set)
    }

    // -------------------------------------------------------------------------
    // Construction passes
    // -------------------------------------------------------------------------

    fn flatten(&mut self, node: &JoinTree, required: bool) -> PlanResult<()> {
        match node {
            JoinTree::Leaf(branch) => {
                let index = self.branches.len();
                for table in &branch.tables {
                    if self.by_name.insert(table.name.clone(), index).is_some() {
                        return Err(PlanError::Internal(format!(
                            "duplicate table reference: {}",
                            table.name
                        )));
                    }
                }
                self.branches.push(branch.clone());
                self.required.push(required);
                Ok(())
            }
            JoinTree::Join {
                kind, left, right, ..
            } => {
                // Normalize RIGHT to LEFT by swapping operands.
                let (kind, left, right) = match kind {
                    JoinKind::RightOuter => (JoinKind::LeftOuter, right, left),
                    other => (*other, left, right),
                };
                let (left_req, right_req) = match kind {
                    JoinKind::LeftOuter => (required, false),
                    JoinKind::FullOuter => (false, false),
                    _ => (required, required),
                };
                self.flatten(left, left_req)?;
                self.flatten(right, right_req)
            }
        }
    }

    /// Recursive descent building the operator arena in post-order, so a
    /// linear scan over the arena visits children before parents. Returns
    /// the tables under `node` and the operator index if `node` is a join.
    ///
    /// Children are pushed before their parent, so the parent's index is
    /// only known after both subtrees are built; child `parent` links are
    /// patched once the parent record is in place.
    fn build_operators(&mut self, node: &JoinTree) -> PlanResult<(TableSet, Option<usize>)> {
        match node {
            JoinTree::Leaf(branch) => {
                let index = self.by_name[branch.primary()];
                Ok((TableSet::of(index), None))
            }
            JoinTree::Join {
                kind,
                left,
                right,
                condition,
            } => {
                let (kind, left, right) = match kind {
                    JoinKind::RightOuter => (JoinKind::LeftOuter, right, left),
                    other => (*other, left, right),
                };
                let (left_tables, left_op) = self.build_operators(left)?;
                let (right_tables, right_op) = self.build_operators(right)?;
                let op_index = self.ops.len();

                let conditions: Vec<Expr> = condition
                    .clone()
                    .map(Expr::split_conjuncts)
                    .unwrap_or_default();
                let mut predicate_tables = TableSet::EMPTY;
                for cond in &conditions {
                    if let Some(tables) = self.tables_of(cond) {
                        predicate_tables |= tables;
                    }
                }

                let all = left_tables | right_tables;
                let null_tolerant = conditions.iter().any(Expr::is_null_tolerant);
                let purely_inner = kind == JoinKind::Inner
                    && left_op.map_or(true, |i| self.ops[i].kind == JoinKind::Inner)
                    && right_op.map_or(true, |i| self.ops[i].kind == JoinKind::Inner);
                // A null-tolerant condition under a non-inner join must not
                // be moved relative to any input table.
                let ses = if null_tolerant && !purely_inner {
                    all
                } else {
                    predicate_tables & all
                };

                self.ops.push(JoinOp {
                    kind,
                    parent: None,
                    left: left_op,
                    right: right_op,
                    left_tables,
                    right_tables,
                    predicate_tables,
                    ses,
                    tes: ses,
                    conditions,
                });
                debug_assert!(left_op.map_or(true, |i| i < op_index));
                debug_assert!(right_op.map_or(true, |i| i < op_index));
                if let Some(l) = left_op {
                    self.ops[l].parent = Some(op_index);
                }
                if let Some(r) = right_op {
                    self.ops[r].parent = Some(op_index);
                }
                Ok((all, Some(op_index)))
            }
        }
    }

    /// Extend each operator's TES with the eligibility sets of conflicting
    /// descendants. The arena is in post-order, so descendants are final
    /// before their ancestors are processed.
    fn calc_tes(&mut self) {
        for o1 in 0..self.ops.len() {
            let mut merged = self.ops[o1].tes;
            let predicate_tables = self.ops[o1].predicate_tables;
            let kind = self.ops[o1].kind;

            let mut stack: Vec<(usize, bool)> = Vec::new();
            if let Some(l) = self.ops[o1].left {
                stack.push((l, true));
            }
            if let Some(r) = self.ops[o1].right {
                stack.push((r, false));
            }
            while let Some((o2, on_left)) = stack.pop() {
                let descendant = &self.ops[o2];
                // A descendant conflicts when commuting it would move
                // tables the parent's predicate touches.
                let movable = if on_left {
                    descendant.commuted_right()
                } else {
                    descendant.commuted_left()
                };
                if predicate_tables.overlaps(movable) && kind.conflicts_with(descendant.kind) {
                    merged |= descendant.tes;
                }
                if let Some(l) = descendant.left {
                    stack.push((l, on_left));
                }
                if let Some(r) = descendant.right {
                    stack.push((r, on_left));
                }
            }
            self.ops[o1].tes = merged;
        }
    }

    /// Split each operator's final TES by original side and emit the edge
    /// pair. Operators whose TES leaves a side empty (e.g. a condition-less
    /// cross join) produce no edge and cannot drive reordering.
    fn emit_operator_edges(&mut self) {
        for (op, record) in self.ops.iter().enumerate() {
            let right_part = record.tes & record.right_tables;
            let left_part = record.tes - record.right_tables;
            if left_part.is_empty() || right_part.is_empty() {
                continue;
            }
            debug_assert!(!left_part.overlaps(right_part));
            self.edges.push(HyperEdge {
                required: left_part,
                op,
            });
            self.edges.push(HyperEdge {
                required: right_part,
                op,
            });
        }
    }

    /// Promote WHERE-clause comparisons connecting exactly two tables into
    /// virtual inner-join edges. Predicates already absorbed by an existing
    /// edge pair attach their condition to that operator instead.
    /// Everything unattributable stays a residual filter.
    fn promote_where_edges(&mut self, where_list: &[Expr]) {
        for pred in where_list {
            if pred.is_null_tolerant() {
                continue;
            }
            let Some((lhs, _, rhs)) = pred.as_comparison() else {
                continue;
            };
            let (Some(column_tables), Some(comparison_tables)) =
                (self.tables_of(lhs), self.tables_of(rhs))
            else {
                continue;
            };
            if column_tables.len() != 1
                || comparison_tables.len() != 1
                || column_tables == comparison_tables
            {
                continue;
            }

            if let Some(op) = self.find_edge_pair(column_tables, comparison_tables) {
                self.ops[op].conditions.push(pred.clone());
                continue;
            }

            let op_index = self.ops.len();
            self.ops.push(JoinOp {
                kind: JoinKind::Inner,
                parent: None,
                left: None,
                right: None,
                left_tables: column_tables,
                right_tables: comparison_tables,
                predicate_tables: column_tables | comparison_tables,
                ses: column_tables | comparison_tables,
                tes: column_tables | comparison_tables,
                conditions: vec![pred.clone()],
            });
            self.edges.push(HyperEdge {
                required: column_tables,
                op: op_index,
            });
            self.edges.push(HyperEdge {
                required: comparison_tables,
                op: op_index,
            });
        }
    }

    fn find_edge_pair(&self, left: TableSet, right: TableSet) -> Option<usize> {
        for e in (0..self.edges.len()).step_by(2) {
            let a = self.edges[e].required;
            let b = self.edges[e + 1].required;
            if (a == left && b == right) || (a == right && b == left) {
                return Some(self.edges[e].op);
            }
        }
        None
    }
}
