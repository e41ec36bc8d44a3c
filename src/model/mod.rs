//! Input data model: bound expressions consumed by the planner.

pub mod expr;

pub use expr::{BinaryOp, Expr, Func, Literal, OrderByExpr, UnaryOp};
