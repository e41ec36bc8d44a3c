//! Join operators and their eligibility sets.
//!
//! Operators are stored in an arena (`Vec<JoinOp>`) with parent/child links
//! as indices into the same arena, mirroring the original join tree without
//! ownership cycles.

use serde::{Deserialize, Serialize};

use crate::model::expr::Expr;
use crate::planner::bitset::TableSet;

/// Join kind. RIGHT joins are normalized to LEFT (operands swapped) before
/// graph construction, so the rest of the planner never sees `RightOuter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
    Semi,
    Anti,
}

impl JoinKind {
    /// Kinds whose operands may be swapped freely.
    pub fn is_commutative(self) -> bool {
        matches!(self, JoinKind::Inner | JoinKind::FullOuter)
    }

    /// Whether reordering a descendant operator of kind `child` past an
    /// operator of kind `self` would change results.
    ///
    /// Fixed classification: INNER is dominated by nothing except a
    /// FULL_OUTER below it; LEFT conflicts with anything that is not itself
    /// LEFT; FULL_OUTER conflicts only with an INNER below it; all other
    /// kinds always conflict.
    pub fn conflicts_with(self, child: JoinKind) -> bool {
        debug_assert!(self != JoinKind::RightOuter && child != JoinKind::RightOuter);
        match self {
            JoinKind::Inner => child == JoinKind::FullOuter,
            JoinKind::LeftOuter => child != JoinKind::LeftOuter,
            JoinKind::FullOuter => child == JoinKind::Inner,
            JoinKind::RightOuter | JoinKind::Semi | JoinKind::Anti => true,
        }
    }
}

/// One join operator: an explicit join node, or a WHERE-clause comparison
/// promoted to a virtual inner join.
///
/// Read-only after graph construction completes; only `tes` grows during
/// the TES pass.
#[derive(Debug, Clone)]
pub struct JoinOp {
    pub kind: JoinKind,
    /// Arena index of the parent operator, if any.
    pub parent: Option<usize>,
    /// Arena index of the left child operator; `None` when the child is a
    /// leaf table.
    pub left: Option<usize>,
    /// Arena index of the right child operator.
    pub right: Option<usize>,
    /// Tables under the operator's left input.
    pub left_tables: TableSet,
    /// Tables under the operator's right input.
    pub right_tables: TableSet,
    /// Tables referenced by the operator's own condition.
    pub predicate_tables: TableSet,
    /// Syntactic eligibility set.
    pub ses: TableSet,
    /// Total eligibility set; grows monotonically from `ses` as conflicts
    /// with descendant operators are folded in.
    pub tes: TableSet,
    /// Join conditions attached to this operator.
    pub conditions: Vec<Expr>,
}

impl JoinOp {
    /// Tables the operator's right input could contribute once
    /// commutativity is accounted for: a commutative operator may move
    /// either input to the right.
    pub fn commuted_right(&self) -> TableSet {
        if self.kind.is_commutative() {
            self.left_tables | self.right_tables
        } else {
            self.right_tables
        }
    }

    /// Mirror of [`commuted_right`](Self::commuted_right).
    pub fn commuted_left(&self) -> TableSet {
        if self.kind.is_commutative() {
            self.left_tables | self.right_tables
        } else {
            self.left_tables
        }
    }
}
