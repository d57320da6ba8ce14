//! Course prerequisite engine
//!
//! Requirement trees gate course offerings. Trees are built from loosely
//! structured records, flattened into dependency edges, and evaluated against
//! a student's completion status.

pub mod domain;
pub use domain::{
    Catalog, CatalogProvider, Code, CompletionStatus, Condition, EngineConfig, OfferingId,
    RequirementTree, StatusProvider, StatusSnapshot, SubjectId, SubjectRef, Target,
};

/// The engine facade over stored trees and their edges.
pub mod engine;
pub use engine::{Engine, EngineError, IngestReport, UnresolvedReference};

/// Tree evaluation and unlock computation.
pub mod eval;
pub use eval::{Diagnostic, Evaluation, UnlockReport};

/// Dependency edges derived from requirement trees.
pub mod graph;
pub use graph::{DependencyEdge, EdgeKind};

/// Building trees from records and loading catalog snapshots.
pub mod ingest;
pub use ingest::{CatalogSnapshot, RequirementRecord, StatusFile, TreeBuilder};
