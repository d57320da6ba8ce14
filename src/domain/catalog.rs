//! The catalog model: programs, subjects and offerings.
//!
//! The [`Catalog`] owns the canonical entities and enforces their identity
//! rules. It also maintains the alias tables used when resolving the codes
//! found in requirement records. Requirement trees reference catalog
//! entities by id only.

use std::{
    collections::{BTreeMap, HashMap},
    fmt, io,
    str::FromStr,
};

use borsh::BorshSerialize;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::code::{Code, SubjectRef};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// The underlying UUID.
            #[must_use]
            pub const fn uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl BorshSerialize for $name {
            fn serialize<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
                BorshSerialize::serialize(self.0.as_bytes(), writer)
            }
        }
    };
}

id_type!(
    /// Stable identifier of a [`Program`].
    ProgramId
);
id_type!(
    /// Stable identifier of a [`Subject`].
    SubjectId
);
id_type!(
    /// Stable identifier of an [`Offering`].
    OfferingId
);

/// Whether a requirement references a subject or a specific offering.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, BorshSerialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetKind {
    /// Any offering of a subject.
    Subject,
    /// One exact offering.
    Offering,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Subject => f.write_str("SUBJECT"),
            Self::Offering => f.write_str("OFFERING"),
        }
    }
}

impl FromStr for TargetKind {
    type Err = UnknownTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUBJECT" => Ok(Self::Subject),
            "OFFERING" => Ok(Self::Offering),
            _ => Err(UnknownTagError::new("target kind", s)),
        }
    }
}

/// A resolved reference to a catalog entity.
///
/// This is both the target of a requirement leaf and the key of a student's
/// status record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, BorshSerialize,
)]
#[serde(tag = "type", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Target {
    /// A subject.
    Subject(SubjectId),
    /// A single offering.
    Offering(OfferingId),
}

impl Target {
    /// The kind of entity this target references.
    #[must_use]
    pub const fn kind(self) -> TargetKind {
        match self {
            Self::Subject(_) => TargetKind::Subject,
            Self::Offering(_) => TargetKind::Offering,
        }
    }
}

/// Whether an offering is a course session or an exam.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, BorshSerialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferingKind {
    /// A course session.
    Course,
    /// An exam.
    Exam,
}

impl fmt::Display for OfferingKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Course => f.write_str("course"),
            Self::Exam => f.write_str("exam"),
        }
    }
}

impl FromStr for OfferingKind {
    type Err = UnknownTagError;

    /// Accepts the English tags and the registrar's Spanish ones
    /// (`CURSO`, `EXAMEN`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "COURSE" | "CURSO" => Ok(Self::Course),
            "EXAM" | "EXAMEN" => Ok(Self::Exam),
            _ => Err(UnknownTagError::new("offering kind", s)),
        }
    }
}

/// Error returned when a tag string does not name a known variant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {what} '{value}'")]
pub struct UnknownTagError {
    what: &'static str,
    value: String,
}

impl UnknownTagError {
    pub(crate) fn new(what: &'static str, value: &str) -> Self {
        Self {
            what,
            value: value.to_string(),
        }
    }

    /// The rejected value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// A study plan. Subject codes are unique within a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    id: ProgramId,
    name: String,
    plan_year: Option<u16>,
}

impl Program {
    /// The program's identifier.
    #[must_use]
    pub const fn id(&self) -> ProgramId {
        self.id
    }

    /// The program's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The plan year, if known.
    #[must_use]
    pub const fn plan_year(&self) -> Option<u16> {
        self.plan_year
    }

    /// The lookup key: `NAME` or `NAME_YEAR`.
    #[must_use]
    pub fn key(&self) -> String {
        match self.plan_year {
            Some(year) => format!("{}_{year}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Canonical course identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    id: SubjectId,
    program: ProgramId,
    code: Code,
    name: String,
    credits: u32,
}

impl Subject {
    /// The subject's identifier.
    #[must_use]
    pub const fn id(&self) -> SubjectId {
        self.id
    }

    /// The program the code is scoped to.
    #[must_use]
    pub const fn program(&self) -> ProgramId {
        self.program
    }

    /// The subject code.
    #[must_use]
    pub const fn code(&self) -> &Code {
        &self.code
    }

    /// The display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The credit value.
    #[must_use]
    pub const fn credits(&self) -> u32 {
        self.credits
    }
}

/// The identity key of an offering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct OfferingKey {
    subject: SubjectId,
    kind: OfferingKind,
    term: String,
    section: Option<String>,
}

/// A scheduled instance of a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offering {
    id: OfferingId,
    subject: SubjectId,
    kind: OfferingKind,
    term: String,
    section: Option<String>,
    code: Option<Code>,
    active: bool,
}

impl Offering {
    /// The offering's identifier.
    #[must_use]
    pub const fn id(&self) -> OfferingId {
        self.id
    }

    /// The subject this is an offering of.
    #[must_use]
    pub const fn subject(&self) -> SubjectId {
        self.subject
    }

    /// Course or exam.
    #[must_use]
    pub const fn kind(&self) -> OfferingKind {
        self.kind
    }

    /// The academic term, e.g. `2025S1`.
    #[must_use]
    pub fn term(&self) -> &str {
        &self.term
    }

    /// The section, if the offering is split into sections.
    #[must_use]
    pub fn section(&self) -> Option<&str> {
        self.section.as_deref()
    }

    /// The registrar's external code, if any.
    #[must_use]
    pub const fn code(&self) -> Option<&Code> {
        self.code.as_ref()
    }

    /// Whether the offering is currently active.
    ///
    /// Inactive offerings are kept for history but cannot be attempted.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }
}

/// Parameters for [`Catalog::add_offering`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOffering {
    /// The subject being offered.
    pub subject: SubjectId,
    /// Course or exam.
    pub kind: OfferingKind,
    /// The academic term.
    pub term: String,
    /// The section, if any.
    pub section: Option<String>,
    /// The registrar's external code, if any.
    pub code: Option<Code>,
    /// Whether the offering is active.
    pub active: bool,
}

impl NewOffering {
    /// An active offering with no section and no external code.
    #[must_use]
    pub fn new(subject: SubjectId, kind: OfferingKind, term: impl Into<String>) -> Self {
        Self {
            subject,
            kind,
            term: term.into(),
            section: None,
            code: None,
            active: true,
        }
    }

    /// Sets the external code.
    #[must_use]
    pub fn with_code(mut self, code: Code) -> Self {
        self.code = Some(code);
        self
    }

    /// Sets the section.
    #[must_use]
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    /// Sets the active flag.
    #[must_use]
    pub const fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// Errors raised while populating a [`Catalog`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// A program with the same name and plan year already exists.
    #[error("program '{0}' already exists")]
    DuplicateProgram(String),

    /// The program id is not in the catalog.
    #[error("program {0} not found")]
    UnknownProgram(ProgramId),

    /// The subject code is already used in the program.
    #[error("subject code {code} already exists in program '{program}'")]
    DuplicateSubject {
        /// The program key.
        program: String,
        /// The duplicated code.
        code: Code,
    },

    /// The subject id is not in the catalog.
    #[error("subject {0} not found")]
    UnknownSubject(SubjectId),

    /// The offering id is not in the catalog.
    #[error("offering {0} not found")]
    UnknownOffering(OfferingId),

    /// An offering with the same (subject, kind, term, section) exists.
    #[error("offering {existing} already exists for this subject, kind, term and section")]
    DuplicateOffering {
        /// The offering already holding the key.
        existing: OfferingId,
    },

    /// The external offering code is already in use.
    #[error("offering code {0} already exists")]
    DuplicateOfferingCode(Code),

    /// The alias target does not exist.
    #[error("alias {alias} points at unknown code {canonical}")]
    UnknownAliasTarget {
        /// The alias being added.
        alias: Code,
        /// The code it should resolve to.
        canonical: Code,
    },

    /// The alias is already a canonical code and would shadow it.
    #[error("alias {0} is already a canonical code")]
    AliasShadowsCode(Code),
}

/// Errors raised while resolving a code found in a requirement record.
///
/// These are non-fatal during tree building: the leaf is kept as an
/// unresolved placeholder.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    /// The program namespace named by the record does not exist.
    #[error("program namespace '{0}' not found")]
    UnknownProgram(String),

    /// No entity of the requested kind has this code, directly or by alias.
    #[error("no {kind} with code {code}")]
    UnknownCode {
        /// The code looked up.
        code: Code,
        /// What was looked for.
        kind: TargetKind,
    },

    /// The code names a subject with no active offering of the requested
    /// kind.
    #[error("subject {code} has no active {offering_kind} offering")]
    NoMatchingOffering {
        /// The subject code.
        code: Code,
        /// The requested offering kind.
        offering_kind: OfferingKind,
    },

    /// The code matches more than one candidate.
    #[error("code {code} is ambiguous ({candidates} candidates)")]
    Ambiguous {
        /// The code looked up.
        code: Code,
        /// How many candidates matched.
        candidates: usize,
    },
}

/// The catalog operations the requirement engine depends on.
pub trait CatalogProvider {
    /// Finds a program by key (`NAME_YEAR`) or, failing that, by unique name.
    fn find_program(&self, name: &str) -> Option<ProgramId>;

    /// Resolves a code to a subject or offering.
    ///
    /// Resolution order is exact code, then alias table. For offering targets
    /// an `offering_kind` hint allows the code to name a subject whose single
    /// active offering of that kind is meant.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolutionError`] when nothing (or more than one thing)
    /// matches.
    fn resolve(
        &self,
        program: ProgramId,
        code: &Code,
        kind: TargetKind,
        offering_kind: Option<OfferingKind>,
    ) -> Result<Target, ResolutionError>;

    /// All offerings of a subject.
    fn offerings_of(&self, subject: SubjectId) -> &[OfferingId];

    /// Looks up an offering.
    fn offering(&self, id: OfferingId) -> Option<&Offering>;

    /// Looks up a subject.
    fn subject(&self, id: SubjectId) -> Option<&Subject>;
}

/// An in-memory catalog of programs, subjects and offerings.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    programs: BTreeMap<ProgramId, Program>,
    program_keys: HashMap<String, ProgramId>,

    subjects: HashMap<SubjectId, Subject>,
    subject_codes: HashMap<(ProgramId, Code), SubjectId>,
    subject_aliases: HashMap<(ProgramId, Code), Code>,

    offerings: HashMap<OfferingId, Offering>,
    offering_keys: HashMap<OfferingKey, OfferingId>,
    offering_codes: HashMap<Code, OfferingId>,
    offering_aliases: HashMap<Code, Code>,
    offerings_by_subject: HashMap<SubjectId, Vec<OfferingId>>,
}

impl Catalog {
    /// Adds a program.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DuplicateProgram`] if a program with the same
    /// name and plan year exists.
    pub fn add_program(
        &mut self,
        name: impl Into<String>,
        plan_year: Option<u16>,
    ) -> Result<ProgramId, CatalogError> {
        let program = Program {
            id: ProgramId::new(),
            name: name.into().trim().to_string(),
            plan_year,
        };
        let key = program.key();
        if self.program_keys.contains_key(&key) {
            return Err(CatalogError::DuplicateProgram(key));
        }

        let id = program.id;
        self.program_keys.insert(key, id);
        self.programs.insert(id, program);
        Ok(id)
    }

    /// Adds a subject to a program.
    ///
    /// # Errors
    ///
    /// Returns an error if the program does not exist or the code is already
    /// used in that program.
    pub fn add_subject(
        &mut self,
        program: ProgramId,
        code: Code,
        name: impl Into<String>,
        credits: u32,
    ) -> Result<SubjectId, CatalogError> {
        let program_key = self
            .programs
            .get(&program)
            .ok_or(CatalogError::UnknownProgram(program))?
            .key();

        if self.subject_codes.contains_key(&(program, code.clone())) {
            return Err(CatalogError::DuplicateSubject {
                program: program_key,
                code,
            });
        }

        let id = SubjectId::new();
        self.subject_codes.insert((program, code.clone()), id);
        self.subjects.insert(
            id,
            Subject {
                id,
                program,
                code,
                name: name.into(),
                credits,
            },
        );
        Ok(id)
    }

    /// Adds an offering.
    ///
    /// # Errors
    ///
    /// Returns an error if the subject does not exist, the identity key
    /// (subject, kind, term, section) is taken, or the external code is in
    /// use.
    pub fn add_offering(&mut self, new: NewOffering) -> Result<OfferingId, CatalogError> {
        if !self.subjects.contains_key(&new.subject) {
            return Err(CatalogError::UnknownSubject(new.subject));
        }

        let key = OfferingKey {
            subject: new.subject,
            kind: new.kind,
            term: new.term.clone(),
            section: new.section.clone(),
        };
        if let Some(existing) = self.offering_keys.get(&key) {
            return Err(CatalogError::DuplicateOffering {
                existing: *existing,
            });
        }
        if let Some(code) = &new.code {
            if self.offering_codes.contains_key(code) {
                return Err(CatalogError::DuplicateOfferingCode(code.clone()));
            }
        }

        let id = OfferingId::new();
        if let Some(code) = &new.code {
            self.offering_codes.insert(code.clone(), id);
        }
        self.offering_keys.insert(key, id);
        self.offerings_by_subject
            .entry(new.subject)
            .or_default()
            .push(id);
        self.offerings.insert(
            id,
            Offering {
                id,
                subject: new.subject,
                kind: new.kind,
                term: new.term,
                section: new.section,
                code: new.code,
                active: new.active,
            },
        );
        Ok(id)
    }

    /// Soft-enables or disables an offering.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownOffering`] if the offering does not
    /// exist.
    pub fn set_active(&mut self, offering: OfferingId, active: bool) -> Result<(), CatalogError> {
        let offering = self
            .offerings
            .get_mut(&offering)
            .ok_or(CatalogError::UnknownOffering(offering))?;
        offering.active = active;
        Ok(())
    }

    /// Registers an alternative code for a subject within a program.
    ///
    /// # Errors
    ///
    /// Returns an error if the program or canonical code is unknown, or if the
    /// alias is itself a canonical code in the program.
    pub fn add_subject_alias(
        &mut self,
        program: ProgramId,
        alias: Code,
        canonical: Code,
    ) -> Result<(), CatalogError> {
        if !self.programs.contains_key(&program) {
            return Err(CatalogError::UnknownProgram(program));
        }
        if self.subject_codes.contains_key(&(program, alias.clone())) {
            return Err(CatalogError::AliasShadowsCode(alias));
        }
        if !self.subject_codes.contains_key(&(program, canonical.clone())) {
            return Err(CatalogError::UnknownAliasTarget { alias, canonical });
        }
        self.subject_aliases.insert((program, alias), canonical);
        Ok(())
    }

    /// Registers an alternative external code for an offering.
    ///
    /// # Errors
    ///
    /// Returns an error if the canonical code is unknown or the alias is
    /// itself an offering code.
    pub fn add_offering_alias(&mut self, alias: Code, canonical: Code) -> Result<(), CatalogError> {
        if self.offering_codes.contains_key(&alias) {
            return Err(CatalogError::AliasShadowsCode(alias));
        }
        if !self.offering_codes.contains_key(&canonical) {
            return Err(CatalogError::UnknownAliasTarget { alias, canonical });
        }
        self.offering_aliases.insert(alias, canonical);
        Ok(())
    }

    /// Looks up a program.
    #[must_use]
    pub fn program(&self, id: ProgramId) -> Option<&Program> {
        self.programs.get(&id)
    }

    /// Iterates over all programs, ordered by id.
    pub fn programs(&self) -> impl Iterator<Item = &Program> {
        self.programs.values()
    }

    /// Iterates over all subjects (unordered).
    pub fn subjects(&self) -> impl Iterator<Item = &Subject> {
        self.subjects.values()
    }

    /// Iterates over all offerings (unordered).
    pub fn offerings(&self) -> impl Iterator<Item = &Offering> {
        self.offerings.values()
    }

    /// Number of offerings in the catalog.
    #[must_use]
    pub fn offering_count(&self) -> usize {
        self.offerings.len()
    }

    /// Finds a subject by exact code (no alias lookup) within a program.
    #[must_use]
    pub fn subject_by_code(&self, program: ProgramId, code: &Code) -> Option<SubjectId> {
        self.subject_codes.get(&(program, code.clone())).copied()
    }

    /// Finds an offering by its external code, following aliases.
    #[must_use]
    pub fn offering_by_code(&self, code: &Code) -> Option<OfferingId> {
        self.offering_codes
            .get(code)
            .or_else(|| {
                self.offering_aliases
                    .get(code)
                    .and_then(|canonical| self.offering_codes.get(canonical))
            })
            .copied()
    }

    /// Finds a subject from a possibly program-qualified reference.
    ///
    /// An unqualified code must identify exactly one subject across all
    /// programs (exact codes first, then aliases).
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::UnknownProgram`] for an unknown qualifier,
    /// [`ResolutionError::UnknownCode`] if nothing matches, and
    /// [`ResolutionError::Ambiguous`] if an unqualified code matches subjects
    /// in several programs.
    pub fn find_subject(&self, reference: &SubjectRef) -> Result<SubjectId, ResolutionError> {
        if let Some(program) = reference.program() {
            let program = self
                .find_program(program)
                .ok_or_else(|| ResolutionError::UnknownProgram(program.to_string()))?;
            return match self.resolve(program, reference.code(), TargetKind::Subject, None)? {
                Target::Subject(subject) => Ok(subject),
                Target::Offering(_) => Err(ResolutionError::UnknownCode {
                    code: reference.code().clone(),
                    kind: TargetKind::Subject,
                }),
            };
        }

        let mut matches: Vec<SubjectId> = self
            .programs
            .keys()
            .filter_map(|program| self.resolve_subject(*program, reference.code()))
            .collect();
        matches.dedup();

        match matches.as_slice() {
            [subject] => Ok(*subject),
            [] => Err(ResolutionError::UnknownCode {
                code: reference.code().clone(),
                kind: TargetKind::Subject,
            }),
            _ => Err(ResolutionError::Ambiguous {
                code: reference.code().clone(),
                candidates: matches.len(),
            }),
        }
    }

    /// A short human-readable description of an offering, e.g.
    /// `GAL1 exam 2025S1`.
    #[must_use]
    pub fn offering_label(&self, id: OfferingId) -> String {
        let Some(offering) = self.offerings.get(&id) else {
            return id.to_string();
        };
        let code = self
            .subjects
            .get(&offering.subject)
            .map_or_else(|| offering.subject.to_string(), |s| s.code.to_string());
        match &offering.section {
            Some(section) => format!(
                "{code} {} {} ({section})",
                offering.kind, offering.term
            ),
            None => format!("{code} {} {}", offering.kind, offering.term),
        }
    }

    /// A short human-readable description of a target.
    #[must_use]
    pub fn target_label(&self, target: Target) -> String {
        match target {
            Target::Subject(id) => self
                .subjects
                .get(&id)
                .map_or_else(|| id.to_string(), |s| s.code.to_string()),
            Target::Offering(id) => self.offering_label(id),
        }
    }

    fn resolve_subject(&self, program: ProgramId, code: &Code) -> Option<SubjectId> {
        self.subject_by_code(program, code).or_else(|| {
            self.subject_aliases
                .get(&(program, code.clone()))
                .and_then(|canonical| self.subject_by_code(program, canonical))
        })
    }

    fn resolve_offering(
        &self,
        program: ProgramId,
        code: &Code,
        offering_kind: Option<OfferingKind>,
    ) -> Result<OfferingId, ResolutionError> {
        if let Some(offering) = self.offering_by_code(code) {
            return Ok(offering);
        }

        let unknown = || ResolutionError::UnknownCode {
            code: code.clone(),
            kind: TargetKind::Offering,
        };
        let offering_kind = offering_kind.ok_or_else(unknown)?;
        let subject = self.resolve_subject(program, code).ok_or_else(unknown)?;

        let candidates: Vec<OfferingId> = self
            .offerings_of(subject)
            .iter()
            .filter_map(|id| self.offerings.get(id))
            .filter(|offering| offering.active && offering.kind == offering_kind)
            .map(|offering| offering.id)
            .collect();

        match candidates.as_slice() {
            [offering] => Ok(*offering),
            [] => Err(ResolutionError::NoMatchingOffering {
                code: code.clone(),
                offering_kind,
            }),
            _ => Err(ResolutionError::Ambiguous {
                code: code.clone(),
                candidates: candidates.len(),
            }),
        }
    }
}

impl CatalogProvider for Catalog {
    fn find_program(&self, name: &str) -> Option<ProgramId> {
        let name = name.trim();
        if let Some(id) = self.program_keys.get(name) {
            return Some(*id);
        }

        let mut by_name = self.programs.values().filter(|p| p.name == name);
        match (by_name.next(), by_name.next()) {
            (Some(program), None) => Some(program.id),
            _ => None,
        }
    }

    fn resolve(
        &self,
        program: ProgramId,
        code: &Code,
        kind: TargetKind,
        offering_kind: Option<OfferingKind>,
    ) -> Result<Target, ResolutionError> {
        match kind {
            TargetKind::Subject => self
                .resolve_subject(program, code)
                .map(Target::Subject)
                .ok_or_else(|| ResolutionError::UnknownCode {
                    code: code.clone(),
                    kind,
                }),
            TargetKind::Offering => self
                .resolve_offering(program, code, offering_kind)
                .map(Target::Offering),
        }
    }

    fn offerings_of(&self, subject: SubjectId) -> &[OfferingId] {
        self.offerings_by_subject
            .get(&subject)
            .map_or(&[], Vec::as_slice)
    }

    fn offering(&self, id: OfferingId) -> Option<&Offering> {
        self.offerings.get(&id)
    }

    fn subject(&self, id: SubjectId) -> Option<&Subject> {
        self.subjects.get(&id)
    }
}
