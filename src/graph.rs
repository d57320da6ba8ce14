//! The dependency graph derived from requirement trees.
//!
//! Trees are flattened into [`DependencyEdge`]s from each referenced subject
//! or offering to the offering it gates. The [`EdgeIndex`] stores them per
//! offering and answers "which offerings mention this target" in one lookup.

mod index;
pub use index::EdgeIndex;

pub mod materialize;
pub use materialize::{
    CycleError, DependencyEdge, EdgeKind, Materialized, materialize, materialize_all,
};
