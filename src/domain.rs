//! Domain models for the prerequisite engine.
//!
//! This module contains the catalog entities, student completion status,
//! requirement trees and the engine configuration.

/// Programs, subjects, offerings and code resolution.
pub mod catalog;
pub use catalog::{
    Catalog, CatalogError, CatalogProvider, NewOffering, Offering, OfferingId, OfferingKind,
    Program, ProgramId, ResolutionError, Subject, SubjectId, Target, TargetKind, UnknownTagError,
};

mod code;
pub use code::{Code, InvalidCodeError, SubjectRef, SubjectRefError};

mod config;
pub use config::{ConfigError, EngineConfig};

/// Completion status records and requirement conditions.
pub mod status;
pub use status::{CompletionStatus, Condition, StatusProvider, StatusSnapshot, WithCompletion};

pub mod tree;
pub use tree::{
    ChildRef, Fallback, GroupId, ItemId, ItemTarget, NodeRef, RequirementGroup, RequirementItem,
    RequirementTree, Scope, StructureError, TreeDraft,
};
