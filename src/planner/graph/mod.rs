//! Join-operator hypergraph: eligibility sets and edge construction.

pub mod builder;
pub mod operator;

pub use builder::{BranchTable, HyperEdge, JoinGraph, JoinTree, TableBranch};
pub use operator::{JoinKind, JoinOp};
