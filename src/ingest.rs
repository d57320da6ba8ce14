//! Turning source data into requirement trees.
//!
//! [`RequirementRecord`]s are the loose, nested records requirement data
//! arrives in. The [`TreeBuilder`] interprets and resolves them against a
//! catalog, and the snapshot module reads whole catalogs and student status
//! files from disk.

pub mod builder;
pub use builder::{BuildError, BuildErrorKind, BuildOutcome, RecordPath, TreeBuilder};

pub mod record;
pub use record::{ParseError, RequirementRecord};

pub mod snapshot;
pub use snapshot::{CatalogSnapshot, LoadedCatalog, PendingRequirements, SnapshotError, StatusFile};
