//! Index selection: per-branch access-path candidates and the chooser
//! that picks the cheapest one.

pub mod candidate;
pub mod chooser;
pub mod intersection;

pub use candidate::{IndexCandidate, RequiredColumns};
pub use chooser::AccessPathChooser;
pub use intersection::{enumerate_intersections, ConditionCounts, IntersectionCandidate};
