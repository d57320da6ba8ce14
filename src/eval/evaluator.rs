//! Recursive evaluation of requirement trees against a status snapshot.

use std::{collections::HashSet, fmt, ops::Not};

use serde::Serialize;
use tracing::{instrument, trace};

use crate::{
    domain::{
        CatalogProvider, EngineConfig, GroupId, ItemId, ItemTarget, NodeRef, OfferingId,
        RequirementItem, RequirementTree, Scope, StatusProvider, Target, TargetKind,
    },
    graph::CycleError,
};

/// Why an evaluation came out the way it did, beyond plain scope logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Diagnostic {
    /// An unresolved placeholder was reached. Its outcome is unknown, so
    /// nothing that depends on it is eligible.
    UnresolvedRequirement {
        /// The offering whose tree holds the placeholder.
        offering: OfferingId,
        /// The placeholder.
        item: ItemId,
        /// What it was meant to reference.
        kind: TargetKind,
        /// The code it was written with.
        code: String,
        /// Its label, if any.
        label: Option<String>,
    },

    /// A branch revisited one of its own ancestors. Its outcome is unknown.
    Cycle {
        /// The offering whose tree holds the cycle.
        offering: OfferingId,
        /// The revisited node.
        node: NodeRef,
    },

    /// The offering is not in the catalog.
    UnknownOffering {
        /// The missing offering.
        offering: OfferingId,
    },

    /// The offering is inactive and cannot be taken.
    InactiveOffering {
        /// The inactive offering.
        offering: OfferingId,
    },
}

impl From<CycleError> for Diagnostic {
    fn from(cycle: CycleError) -> Self {
        Self::Cycle {
            offering: cycle.offering,
            node: cycle.node,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnresolvedRequirement {
                kind, code, label, ..
            } => {
                write!(f, "unresolved {kind} requirement {code}")?;
                if let Some(label) = label {
                    write!(f, " ({label})")?;
                }
                Ok(())
            }
            Self::Cycle { offering, node } => CycleError {
                offering: *offering,
                node: *node,
            }
            .fmt(f),
            Self::UnknownOffering { offering } => {
                write!(f, "offering {offering} is not in the catalog")
            }
            Self::InactiveOffering { offering } => write!(f, "offering {offering} is inactive"),
        }
    }
}

/// The result of evaluating an offering's requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    /// Whether the student may take the offering.
    pub eligible: bool,
    /// Everything worth reporting about how that was decided.
    pub diagnostics: Vec<Diagnostic>,
}

/// Evaluates trees for one student.
///
/// Evaluation depends only on the tree, the status snapshot and the catalog's
/// subject-to-offering mapping. It performs no I/O and takes no locks.
#[derive(Debug)]
pub struct Evaluator<'a, C: ?Sized, S> {
    catalog: &'a C,
    status: S,
    config: &'a EngineConfig,
}

impl<'a, C: CatalogProvider + ?Sized, S: StatusProvider> Evaluator<'a, C, S> {
    /// An evaluator for the student described by `status`.
    pub const fn new(catalog: &'a C, status: S, config: &'a EngineConfig) -> Self {
        Self {
            catalog,
            status,
            config,
        }
    }

    /// Whether the student may take the offering `tree` gates.
    ///
    /// Unknown offerings are not eligible, and neither are inactive ones
    /// unless the configuration includes them.
    #[instrument(level = "trace", skip_all, fields(offering = %tree.offering()))]
    pub fn evaluate(&self, tree: &RequirementTree) -> Evaluation {
        let offering = tree.offering();
        match self.catalog.offering(offering) {
            None => {
                return Evaluation {
                    eligible: false,
                    diagnostics: vec![Diagnostic::UnknownOffering { offering }],
                };
            }
            Some(o) if !o.is_active() && !self.config.include_inactive => {
                return Evaluation {
                    eligible: false,
                    diagnostics: vec![Diagnostic::InactiveOffering { offering }],
                };
            }
            Some(_) => {}
        }
        self.evaluate_requirements(tree)
    }

    /// Evaluates the tree's logic alone, ignoring the offering's catalog
    /// state.
    ///
    /// Roots are combined conjunctively, so a tree without roots is
    /// satisfied. Unresolved leaves and cyclic branches have an unknown
    /// outcome, and the offering is eligible only when the outcome is known
    /// to be met. A NONE over an unknown branch is never satisfied.
    pub fn evaluate_requirements(&self, tree: &RequirementTree) -> Evaluation {
        let mut walk = Walk {
            evaluator: self,
            tree,
            on_path: HashSet::new(),
            diagnostics: Vec::new(),
        };
        let outcome = Outcome::all(tree.roots().map(|root| walk.group(root)));
        Evaluation {
            eligible: outcome == Outcome::Met,
            diagnostics: walk.diagnostics,
        }
    }

    fn item_satisfied(&self, item: &RequirementItem) -> bool {
        let condition = item.condition();
        let credited = self.config.credited_satisfies_approved;
        let meets = |target| condition.is_met_by(self.status.status(target), credited);

        match item.target() {
            ItemTarget::Subject(subject) => {
                meets(Target::Subject(subject))
                    || self
                        .catalog
                        .offerings_of(subject)
                        .iter()
                        .any(|offering| meets(Target::Offering(*offering)))
            }
            ItemTarget::Offering(offering) => meets(Target::Offering(offering)),
            ItemTarget::Unresolved(_) => false,
        }
    }
}

/// Three-valued result of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Met,
    Unmet,
    Unknown,
}

impl Outcome {
    /// Every outcome is met. Stops at the first unmet one.
    fn all(outcomes: impl IntoIterator<Item = Self>) -> Self {
        let mut unknown = false;
        for outcome in outcomes {
            match outcome {
                Self::Met => {}
                Self::Unmet => return Self::Unmet,
                Self::Unknown => unknown = true,
            }
        }
        if unknown { Self::Unknown } else { Self::Met }
    }

    /// At least `min` outcomes are met. Stops once the threshold is reached.
    fn at_least(min: usize, outcomes: impl IntoIterator<Item = Self>) -> Self {
        let (mut met, mut unknown) = (0, 0);
        for outcome in outcomes {
            match outcome {
                Self::Met => {
                    met += 1;
                    if met >= min {
                        return Self::Met;
                    }
                }
                Self::Unmet => {}
                Self::Unknown => unknown += 1,
            }
        }
        if met + unknown >= min {
            Self::Unknown
        } else {
            Self::Unmet
        }
    }
}

impl Not for Outcome {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            Self::Met => Self::Unmet,
            Self::Unmet => Self::Met,
            Self::Unknown => Self::Unknown,
        }
    }
}

impl From<bool> for Outcome {
    fn from(met: bool) -> Self {
        if met { Self::Met } else { Self::Unmet }
    }
}

struct Walk<'e, 'a, C: ?Sized, S> {
    evaluator: &'e Evaluator<'a, C, S>,
    tree: &'e RequirementTree,
    on_path: HashSet<GroupId>,
    diagnostics: Vec<Diagnostic>,
}

impl<C: CatalogProvider + ?Sized, S: StatusProvider> Walk<'_, '_, C, S> {
    fn node(&mut self, node: NodeRef) -> Outcome {
        match node {
            NodeRef::Group(group) => self.group(group),
            NodeRef::Item(item) => self.item(item),
        }
    }

    fn group(&mut self, id: GroupId) -> Outcome {
        let tree = self.tree;
        let Some(group) = tree.group(id) else {
            return Outcome::Unknown;
        };
        if !self.on_path.insert(id) {
            self.diagnostics.push(Diagnostic::Cycle {
                offering: tree.offering(),
                node: NodeRef::Group(id),
            });
            return Outcome::Unknown;
        }

        let children = group.children().iter().map(|child| self.node(child.node()));
        let result = match group.scope() {
            Scope::All => Outcome::all(children),
            Scope::Any { min_required } => Outcome::at_least(min_required.get(), children),
            Scope::None => !Outcome::at_least(1, children),
        };

        self.on_path.remove(&id);
        trace!(group = %id, scope = %group.scope(), ?result, "evaluated group");
        result
    }

    fn item(&mut self, id: ItemId) -> Outcome {
        let Some(item) = self.tree.item(id) else {
            return Outcome::Unknown;
        };
        if let ItemTarget::Unresolved(kind) = item.target() {
            self.diagnostics.push(Diagnostic::UnresolvedRequirement {
                offering: self.tree.offering(),
                item: id,
                kind,
                code: item.fallback().code.clone(),
                label: item.fallback().label.clone(),
            });
            return Outcome::Unknown;
        }
        let result = self.evaluator.item_satisfied(item);
        trace!(item = %id, condition = %item.condition(), result, "evaluated item");
        result.into()
    }
}
