//! Expression types for join conditions and WHERE predicates.
//!
//! This module defines the bound, type-resolved expression AST the planner
//! consumes. Parsing and binding happen upstream; the planner only inspects
//! expression shape (which tables are referenced, whether a predicate is a
//! comparison, whether it tolerates NULLs).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// Core Expression Type
// =============================================================================

/// Bound expression AST.
///
/// Expressions can represent column references, literals, function calls,
/// and unary/binary operations. Everything the planner needs is derivable
/// from this shape; evaluation is out of scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Column reference: entity.column or just column
    Column {
        entity: Option<String>,
        column: String,
    },

    /// Literal value
    Literal(Literal),

    /// Function call with typed function
    Function { func: Func, args: Vec<Expr> },

    /// Binary operation
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    /// Unary operation
    UnaryOp { op: UnaryOp, expr: Box<Expr> },
}

impl Expr {
    /// Create a column reference.
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column {
            entity: None,
            column: name.into(),
        }
    }

    /// Create a qualified column reference (entity.column).
    pub fn qualified_column(entity: impl Into<String>, column: impl Into<String>) -> Self {
        Expr::Column {
            entity: Some(entity.into()),
            column: column.into(),
        }
    }

    /// Create an integer literal.
    pub fn int(value: i64) -> Self {
        Expr::Literal(Literal::Int(value))
    }

    /// Create a string literal.
    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(value.into()))
    }

    /// Create a binary operation.
    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// left = right
    pub fn eq(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::Eq, right)
    }

    /// left < right
    pub fn lt(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::Lt, right)
    }

    /// left <= right
    pub fn lte(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::Lte, right)
    }

    /// left > right
    pub fn gt(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::Gt, right)
    }

    /// left >= right
    pub fn gte(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::Gte, right)
    }

    /// left AND right
    pub fn and(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::And, right)
    }

    /// expr IS NULL
    pub fn is_null(expr: Expr) -> Self {
        Expr::UnaryOp {
            op: UnaryOp::IsNull,
            expr: Box::new(expr),
        }
    }

    /// COALESCE(args...)
    pub fn coalesce(args: Vec<Expr>) -> Self {
        Expr::Function {
            func: Func::Coalesce,
            args,
        }
    }

    /// Collect the set of entity names referenced by this expression.
    ///
    /// Unqualified column references contribute nothing; the binder is
    /// expected to have qualified every column that belongs to a table.
    pub fn referenced_tables(&self) -> BTreeSet<String> {
        let mut tables = BTreeSet::new();
        self.collect_tables(&mut tables);
        tables
    }

    fn collect_tables(&self, tables: &mut BTreeSet<String>) {
        match self {
            Expr::Column {
                entity: Some(table),
                ..
            } => {
                tables.insert(table.clone());
            }
            Expr::Column { entity: None, .. } | Expr::Literal(_) => {}
            Expr::BinaryOp { left, right, .. } => {
                left.collect_tables(tables);
                right.collect_tables(tables);
            }
            Expr::UnaryOp { expr, .. } => {
                expr.collect_tables(tables);
            }
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.collect_tables(tables);
                }
            }
        }
    }

    /// True if the expression references no columns at all.
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Column { .. } => false,
            Expr::Literal(_) => true,
            Expr::BinaryOp { left, right, .. } => left.is_constant() && right.is_constant(),
            Expr::UnaryOp { expr, .. } => expr.is_constant(),
            Expr::Function { args, .. } => args.iter().all(Expr::is_constant),
        }
    }

    /// True if the predicate can be satisfied by a NULL input row.
    ///
    /// `IS NULL` and `COALESCE`/`IFNULL` subexpressions make a predicate
    /// null-tolerant; reordering such a predicate across an outer join would
    /// change which null-extended rows it sees.
    pub fn is_null_tolerant(&self) -> bool {
        match self {
            Expr::Column { .. } | Expr::Literal(_) => false,
            Expr::UnaryOp { op, expr } => {
                matches!(op, UnaryOp::IsNull) || expr.is_null_tolerant()
            }
            Expr::BinaryOp { left, right, .. } => {
                left.is_null_tolerant() || right.is_null_tolerant()
            }
            Expr::Function { func, args } => {
                matches!(func, Func::Coalesce | Func::IfNull)
                    || args.iter().any(Expr::is_null_tolerant)
            }
        }
    }

    /// Flatten a tree of ANDs into a list of conjuncts.
    pub fn split_conjuncts(self) -> Vec<Expr> {
        match self {
            Expr::BinaryOp {
                left,
                op: BinaryOp::And,
                right,
            } => {
                let mut conjuncts = left.split_conjuncts();
                conjuncts.extend(right.split_conjuncts());
                conjuncts
            }
            other => vec![other],
        }
    }

    /// View this expression as a comparison, if it is one.
    pub fn as_comparison(&self) -> Option<(&Expr, BinaryOp, &Expr)> {
        match self {
            Expr::BinaryOp { left, op, right } if op.is_comparison() => Some((left, *op, right)),
            _ => None,
        }
    }
}

// =============================================================================
// Literals
// =============================================================================

/// Literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// NULL
    Null,
    /// Boolean: true/false
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// String
    String(String),
}

// =============================================================================
// Operators
// =============================================================================

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,

    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,

    // Logical
    And,
    Or,
}

impl BinaryOp {
    /// True for the comparison operators (=, !=, <, >, <=, >=).
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Lt
                | BinaryOp::Gt
                | BinaryOp::Lte
                | BinaryOp::Gte
        )
    }

    /// True for inequalities usable as index range bounds (excludes !=).
    pub fn is_range_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Lte | BinaryOp::Gte
        )
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// NOT expr
    Not,
    /// -expr (negation)
    Neg,
    /// expr IS NULL
    IsNull,
    /// expr IS NOT NULL
    IsNotNull,
}

/// Typed functions the planner recognizes.
///
/// Only the null-handling functions matter to planning; everything else
/// passes through as an opaque scalar call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Func {
    Coalesce,
    IfNull,
    Lower,
    Upper,
    Abs,
}

// =============================================================================
// Ordering
// =============================================================================

/// One ORDER BY element: an expression plus direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub ascending: bool,
}

impl OrderByExpr {
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
