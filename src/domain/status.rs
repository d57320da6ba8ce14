//! Student completion records and requirement conditions.

use std::{collections::HashMap, fmt, str::FromStr};

use borsh::BorshSerialize;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{Target, UnknownTagError};

/// A pre-classified completion status for a subject or offering.
///
/// How a status is derived from grades is academic policy and is decided
/// elsewhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    /// No record.
    #[default]
    None,
    /// Currently (or previously) enrolled without approval.
    Enrolled,
    /// Approved.
    Approved,
    /// Credited by recognition (e.g. transferred from another plan).
    Credited,
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Enrolled => f.write_str("enrolled"),
            Self::Approved => f.write_str("approved"),
            Self::Credited => f.write_str("credited"),
        }
    }
}

impl FromStr for CompletionStatus {
    type Err = UnknownTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "enrolled" => Ok(Self::Enrolled),
            "approved" => Ok(Self::Approved),
            "credited" => Ok(Self::Credited),
            _ => Err(UnknownTagError::new("completion status", s)),
        }
    }
}

/// The status a requirement leaf asks for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, BorshSerialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Condition {
    /// The target must be approved.
    Approved,
    /// The target must at least be enrolled.
    Enrolled,
    /// The target must be credited.
    Credited,
}

impl Condition {
    /// Whether `status` meets this condition.
    ///
    /// `ENROLLED` is met by any status past enrolment. `APPROVED` is met by
    /// `Approved`, and by `Credited` when `credited_satisfies_approved` is
    /// set. `CREDITED` is only met by `Credited`.
    #[must_use]
    pub const fn is_met_by(self, status: CompletionStatus, credited_satisfies_approved: bool) -> bool {
        match self {
            Self::Enrolled => !matches!(status, CompletionStatus::None),
            Self::Approved => match status {
                CompletionStatus::Approved => true,
                CompletionStatus::Credited => credited_satisfies_approved,
                CompletionStatus::None | CompletionStatus::Enrolled => false,
            },
            Self::Credited => matches!(status, CompletionStatus::Credited),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Approved => f.write_str("APPROVED"),
            Self::Enrolled => f.write_str("ENROLLED"),
            Self::Credited => f.write_str("CREDITED"),
        }
    }
}

impl FromStr for Condition {
    type Err = UnknownTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "APPROVED" => Ok(Self::Approved),
            "ENROLLED" => Ok(Self::Enrolled),
            "CREDITED" => Ok(Self::Credited),
            _ => Err(UnknownTagError::new("condition", s)),
        }
    }
}

/// Supplies a student's point-in-time completion status.
pub trait StatusProvider {
    /// The status recorded for a subject or offering.
    fn status(&self, target: Target) -> CompletionStatus;
}

impl<T: StatusProvider + ?Sized> StatusProvider for &T {
    fn status(&self, target: Target) -> CompletionStatus {
        (**self).status(target)
    }
}

/// A status snapshot held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    records: HashMap<Target, CompletionStatus>,
}

impl StatusSnapshot {
    /// Records a status, replacing any previous one for the target.
    pub fn set(&mut self, target: Target, status: CompletionStatus) {
        if status == CompletionStatus::None {
            self.records.remove(&target);
        } else {
            self.records.insert(target, status);
        }
    }

    /// Builder-style variant of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, target: Target, status: CompletionStatus) -> Self {
        self.set(target, status);
        self
    }

    /// Number of non-`None` records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the snapshot holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl StatusProvider for StatusSnapshot {
    fn status(&self, target: Target) -> CompletionStatus {
        self.records.get(&target).copied().unwrap_or_default()
    }
}

impl FromIterator<(Target, CompletionStatus)> for StatusSnapshot {
    fn from_iter<I: IntoIterator<Item = (Target, CompletionStatus)>>(iter: I) -> Self {
        let mut snapshot = Self::default();
        for (target, status) in iter {
            snapshot.set(target, status);
        }
        snapshot
    }
}

/// A status provider with one hypothetical record layered on top of another.
///
/// Used to ask "what if this subject were completed" without copying the
/// underlying snapshot.
#[derive(Debug, Clone, Copy)]
pub struct WithCompletion<S> {
    base: S,
    target: Target,
    status: CompletionStatus,
}

impl<S: StatusProvider> WithCompletion<S> {
    /// Layers `status` for `target` over `base`.
    pub const fn new(base: S, target: Target, status: CompletionStatus) -> Self {
        Self {
            base,
            target,
            status,
        }
    }
}

impl<S: StatusProvider> StatusProvider for WithCompletion<S> {
    fn status(&self, target: Target) -> CompletionStatus {
        if target == self.target {
            self.status
        } else {
            self.base.status(target)
        }
    }
}
