//! Catalog and status snapshot files.
//!
//! A catalog snapshot lists programs with their subjects, offerings and the
//! requirement records gating each offering. A status file lists one
//! student's completion records by code. Both are YAML or JSON, chosen by
//! file extension.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::{
    domain::{
        Catalog, CatalogError, Code, CompletionStatus, InvalidCodeError, NewOffering,
        OfferingId, ProgramId, ResolutionError, StatusSnapshot, SubjectRef, SubjectRefError,
        Target, TargetKind, UnknownTagError,
    },
    ingest::record::RequirementRecord,
};

/// Errors raised while reading snapshot files.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The extension is neither YAML nor JSON.
    #[error("unsupported snapshot format for {0} (expected .yaml, .yml or .json)")]
    UnsupportedFormat(PathBuf),

    /// The YAML content is invalid.
    #[error("failed to parse {path}: {source}")]
    Yaml {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        source: serde_yaml::Error,
    },

    /// The JSON content is invalid.
    #[error("failed to parse {path}: {source}")]
    Json {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        source: serde_json::Error,
    },

    /// A code in the snapshot is invalid.
    #[error(transparent)]
    Code(#[from] InvalidCodeError),

    /// A tag in the snapshot is invalid.
    #[error(transparent)]
    Tag(#[from] UnknownTagError),

    /// The snapshot breaks a catalog rule.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// An offering names a subject its program does not have.
    #[error("offering references unknown subject {code} in program '{program}'")]
    UnknownSubject {
        /// The program key.
        program: String,
        /// The subject code.
        code: Code,
    },

    /// A status file key does not name a catalog entity.
    #[error("status entry '{key}': {source}")]
    StatusKey {
        /// The key as written.
        key: String,
        /// Why it could not be resolved.
        source: ResolutionError,
    },

    /// A status file subject key is malformed.
    #[error(transparent)]
    SubjectRef(#[from] SubjectRefError),
}

/// The contents of a catalog snapshot file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    /// Every program in the catalog.
    pub programs: Vec<ProgramRecord>,
}

/// A program in a catalog snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramRecord {
    /// Display name.
    pub name: String,

    /// Plan year, if the program has several plans.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_year: Option<u16>,

    /// Subjects of the program.
    #[serde(default)]
    pub subjects: Vec<SubjectRecord>,

    /// Offerings of the program's subjects.
    #[serde(default)]
    pub offerings: Vec<OfferingRecord>,
}

/// A subject in a catalog snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRecord {
    /// Subject code.
    pub code: String,

    /// Display name.
    pub name: String,

    /// Credit value: a number, or free text such as `OPTATIVA - 4`.
    #[serde(default)]
    pub credits: Credits,

    /// Alternative codes for the subject within the program.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

/// A credit value as found in source data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Credits {
    /// A plain number.
    Number(u32),
    /// Free text containing a number.
    Text(String),
}

impl Default for Credits {
    fn default() -> Self {
        Self::Number(0)
    }
}

static CREDITS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(?:[.,]\d+)?").expect("valid credits pattern"));

impl Credits {
    /// The whole number of credits, if one can be found.
    ///
    /// Text takes the first number it contains, so `OPTATIVA - 4` and
    /// `LDI - 6` give 4 and 6. Fractional parts are dropped.
    #[must_use]
    pub fn value(&self) -> Option<u32> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(text) => CREDITS_PATTERN
                .captures(text)
                .and_then(|captures| captures.get(1))
                .and_then(|m| m.as_str().parse().ok()),
        }
    }
}

/// An offering in a catalog snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferingRecord {
    /// Code of the subject, within the enclosing program.
    pub subject: String,

    /// `COURSE` or `EXAM`.
    pub kind: String,

    /// Academic term.
    pub term: String,

    /// Section, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    /// The registrar's external code, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Alternative external codes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,

    /// Whether the offering is active.
    #[serde(default = "default_true")]
    pub active: bool,

    /// Root requirement records gating the offering.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<RequirementRecord>,
}

const fn default_true() -> bool {
    true
}

/// Requirement records waiting to be built for one offering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequirements {
    /// The gated offering.
    pub offering: OfferingId,
    /// The offering's program, the default namespace for codes.
    pub program: ProgramId,
    /// The root records.
    pub records: Vec<RequirementRecord>,
}

/// A catalog populated from a snapshot, with the requirement records still
/// to be built.
#[derive(Debug, Clone, Default)]
pub struct LoadedCatalog {
    /// The populated catalog.
    pub catalog: Catalog,
    /// One entry per offering that has requirement records.
    pub requirements: Vec<PendingRequirements>,
}

impl CatalogSnapshot {
    /// Reads a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, has an unsupported
    /// extension, or cannot be parsed.
    #[instrument(level = "debug")]
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        read_file(path)
    }

    /// Populates a catalog.
    ///
    /// Every program, subject and offering is added before any alias, so
    /// aliases may point anywhere in the snapshot. Requirement records are
    /// returned unbuilt.
    ///
    /// # Errors
    ///
    /// Returns the first invalid code or tag, or catalog rule violation.
    pub fn into_catalog(self) -> Result<LoadedCatalog, SnapshotError> {
        let mut catalog = Catalog::default();
        let mut requirements = Vec::new();
        let mut aliases = Vec::new();

        for program in self.programs {
            let program_id = catalog.add_program(&program.name, program.plan_year)?;

            for subject in program.subjects {
                let code = Code::new(&subject.code)?;
                let credits = subject.credits.value().unwrap_or_else(|| {
                    warn!(code = %code, credits = ?subject.credits, "could not parse credits");
                    0
                });
                catalog.add_subject(program_id, code.clone(), subject.name, credits)?;
                for alias in subject.aliases {
                    aliases.push(Alias::Subject {
                        program: program_id,
                        alias: Code::new(alias)?,
                        canonical: code.clone(),
                    });
                }
            }

            for offering in program.offerings {
                let subject_code = Code::new(&offering.subject)?;
                let subject = catalog
                    .subject_by_code(program_id, &subject_code)
                    .ok_or_else(|| SnapshotError::UnknownSubject {
                        program: program.name.clone(),
                        code: subject_code,
                    })?;

                let mut new = NewOffering::new(subject, offering.kind.parse()?, offering.term)
                    .active(offering.active);
                if let Some(section) = offering.section {
                    new = new.with_section(section);
                }
                let code = offering.code.map(Code::new).transpose()?;
                if let Some(code) = &code {
                    new = new.with_code(code.clone());
                }

                let id = catalog.add_offering(new)?;

                if let Some(code) = code {
                    for alias in offering.aliases {
                        aliases.push(Alias::Offering {
                            alias: Code::new(alias)?,
                            canonical: code.clone(),
                        });
                    }
                }

                if !offering.requirements.is_empty() {
                    requirements.push(PendingRequirements {
                        offering: id,
                        program: program_id,
                        records: offering.requirements,
                    });
                }
            }
        }

        for alias in aliases {
            match alias {
                Alias::Subject {
                    program,
                    alias,
                    canonical,
                } => catalog.add_subject_alias(program, alias, canonical)?,
                Alias::Offering { alias, canonical } => {
                    catalog.add_offering_alias(alias, canonical)?;
                }
            }
        }

        debug!(
            programs = catalog.programs().count(),
            offerings = catalog.offering_count(),
            with_requirements = requirements.len(),
            "loaded catalog snapshot"
        );

        Ok(LoadedCatalog {
            catalog,
            requirements,
        })
    }
}

enum Alias {
    Subject {
        program: ProgramId,
        alias: Code,
        canonical: Code,
    },
    Offering {
        alias: Code,
        canonical: Code,
    },
}

/// The contents of a student status file.
///
/// Subject keys are subject references (`CODE` or `PROGRAM/CODE`); offering
/// keys are external offering codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusFile {
    /// Statuses by subject reference.
    #[serde(default)]
    pub subjects: BTreeMap<String, CompletionStatus>,

    /// Statuses by offering code.
    #[serde(default)]
    pub offerings: BTreeMap<String, CompletionStatus>,
}

impl StatusFile {
    /// Reads a status file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, has an unsupported
    /// extension, or cannot be parsed.
    #[instrument(level = "debug")]
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        read_file(path)
    }

    /// Resolves every key against the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first key that does not identify exactly
    /// one subject or offering.
    pub fn resolve(&self, catalog: &Catalog) -> Result<StatusSnapshot, SnapshotError> {
        let mut snapshot = StatusSnapshot::default();

        for (key, status) in &self.subjects {
            let reference: SubjectRef = key.parse()?;
            let subject = catalog
                .find_subject(&reference)
                .map_err(|source| SnapshotError::StatusKey {
                    key: key.clone(),
                    source,
                })?;
            snapshot.set(Target::Subject(subject), *status);
        }

        for (key, status) in &self.offerings {
            let code = Code::new(key)?;
            let offering = catalog.offering_by_code(&code).ok_or_else(|| {
                SnapshotError::StatusKey {
                    key: key.clone(),
                    source: ResolutionError::UnknownCode {
                        code,
                        kind: TargetKind::Offering,
                    },
                }
            })?;
            snapshot.set(Target::Offering(offering), *status);
        }

        Ok(snapshot)
    }
}

fn read_file<T: DeserializeOwned>(path: &Path) -> Result<T, SnapshotError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    let content = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match extension.as_deref() {
        Some("yaml" | "yml") => {
            serde_yaml::from_str(&content).map_err(|source| SnapshotError::Yaml {
                path: path.to_path_buf(),
                source,
            })
        }
        Some("json") => serde_json::from_str(&content).map_err(|source| SnapshotError::Json {
            path: path.to_path_buf(),
            source,
        }),
        _ => Err(SnapshotError::UnsupportedFormat(path.to_path_buf())),
    }
}
