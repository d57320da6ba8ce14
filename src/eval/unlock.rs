//! What completing a subject makes newly available.
//!
//! Edges only narrow the search. Every candidate is decided by evaluating its
//! whole tree twice: once against the student's status, and once with the
//! subject marked approved.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    num::NonZeroUsize,
    sync::Arc,
};

use serde::Serialize;
use tracing::{debug, instrument};

use crate::{
    domain::{
        CatalogProvider, CompletionStatus, EngineConfig, OfferingId, RequirementTree,
        StatusProvider, SubjectId, Target, WithCompletion,
    },
    eval::evaluator::{Diagnostic, Evaluator},
    graph::EdgeIndex,
};

/// Looks up the stored tree for an offering.
pub trait TreeSource {
    /// The tree gating `offering`, if one is stored.
    fn tree(&self, offering: OfferingId) -> Option<&RequirementTree>;
}

impl TreeSource for HashMap<OfferingId, Arc<RequirementTree>> {
    fn tree(&self, offering: OfferingId) -> Option<&RequirementTree> {
        self.get(&offering).map(AsRef::as_ref)
    }
}

impl TreeSource for HashMap<OfferingId, RequirementTree> {
    fn tree(&self, offering: OfferingId) -> Option<&RequirementTree> {
        self.get(&offering)
    }
}

/// The outcome of an unlock query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnlockReport {
    /// The hypothetically completed subject.
    pub subject: SubjectId,
    /// Offerings that become eligible, in id order.
    pub unlocked: Vec<OfferingId>,
    /// How many candidates were evaluated.
    pub candidates: usize,
    /// Diagnostics from evaluating candidates with the completion applied.
    pub diagnostics: Vec<Diagnostic>,
}

/// Offerings within `hops` edges of `subject`.
///
/// The first hop follows edges leaving the subject and each of its
/// offerings. Later hops follow edges leaving the offerings found so far and
/// their subjects.
pub fn candidates<C: CatalogProvider + ?Sized>(
    catalog: &C,
    index: &EdgeIndex,
    subject: SubjectId,
    hops: NonZeroUsize,
) -> BTreeSet<OfferingId> {
    let mut found = BTreeSet::new();
    let mut visited: HashSet<Target> = HashSet::new();
    let mut frontier: Vec<Target> = std::iter::once(Target::Subject(subject))
        .chain(catalog.offerings_of(subject).iter().copied().map(Target::Offering))
        .collect();

    for _ in 0..hops.get() {
        let mut next = Vec::new();
        for origin in frontier {
            if !visited.insert(origin) {
                continue;
            }
            for offering in index.gated_by(origin) {
                if found.insert(offering) {
                    next.push(Target::Offering(offering));
                    if let Some(o) = catalog.offering(offering) {
                        next.push(Target::Subject(o.subject()));
                    }
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    found
}

/// Offerings that are not eligible now but would be if `subject` were
/// approved.
///
/// Inactive offerings (unless configured otherwise) and offerings of
/// `subject` itself are never reported.
#[instrument(level = "debug", skip(catalog, index, trees, status, config))]
pub fn unlocked_by<C, T, S>(
    catalog: &C,
    index: &EdgeIndex,
    trees: &T,
    subject: SubjectId,
    status: &S,
    config: &EngineConfig,
) -> UnlockReport
where
    C: CatalogProvider + ?Sized,
    T: TreeSource + ?Sized,
    S: StatusProvider + ?Sized,
{
    let candidates = candidates(catalog, index, subject, config.unlock_hops());

    let before = Evaluator::new(catalog, status, config);
    let completed = WithCompletion::new(status, Target::Subject(subject), CompletionStatus::Approved);
    let after = Evaluator::new(catalog, completed, config);

    let mut unlocked = Vec::new();
    let mut diagnostics = Vec::new();
    let mut evaluated = 0;

    for offering in &candidates {
        let Some(details) = catalog.offering(*offering) else {
            continue;
        };
        if details.subject() == subject {
            continue;
        }
        if !details.is_active() && !config.include_inactive {
            continue;
        }
        let Some(tree) = trees.tree(*offering) else {
            continue;
        };

        evaluated += 1;
        let with_completion = after.evaluate(tree);
        diagnostics.extend(with_completion.diagnostics);
        if with_completion.eligible && !before.evaluate(tree).eligible {
            unlocked.push(*offering);
        }
    }

    debug!(
        candidates = evaluated,
        unlocked = unlocked.len(),
        "computed unlock set"
    );

    UnlockReport {
        subject,
        unlocked,
        candidates: evaluated,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{
            Catalog, Code, NewOffering, OfferingKind, ProgramId, StatusSnapshot,
        },
        graph::materialize,
        ingest::{RequirementRecord, TreeBuilder},
    };

    struct Fixture {
        catalog: Catalog,
        program: ProgramId,
        trees: HashMap<OfferingId, RequirementTree>,
        index: EdgeIndex,
    }

    impl Fixture {
        fn new() -> Self {
            let mut catalog = Catalog::default();
            let program = catalog.add_program("Engineering", None).unwrap();
            Self {
                catalog,
                program,
                trees: HashMap::new(),
                index: EdgeIndex::default(),
            }
        }

        fn subject(&mut self, code: &str) -> SubjectId {
            self.catalog
                .add_subject(self.program, Code::new(code).unwrap(), code, 5)
                .unwrap()
        }

        fn course(&mut self, subject: SubjectId, records: &[RequirementRecord]) -> OfferingId {
            let offering = self
                .catalog
                .add_offering(NewOffering::new(subject, OfferingKind::Course, "2025S1"))
                .unwrap();
            let outcome = TreeBuilder::new(&self.catalog, self.program).build(offering, records);
            assert!(outcome.is_clean(), "{:?}", outcome.errors);
            self.index
                .replace(offering, materialize(&outcome.tree).edges);
            self.trees.insert(offering, outcome.tree);
            offering
        }

        fn unlocked(&self, subject: SubjectId, status: &StatusSnapshot) -> Vec<OfferingId> {
            unlocked_by(
                &self.catalog,
                &self.index,
                &self.trees,
                subject,
                status,
                &EngineConfig::default(),
            )
            .unlocked
        }
    }

    fn approved(code: &str) -> RequirementRecord {
        RequirementRecord::leaf("SUBJECT", code, "APPROVED")
    }

    #[test]
    fn only_newly_eligible_offerings_are_reported() {
        let mut fx = Fixture::new();
        let (x, y) = (fx.subject("X"), fx.subject("Y"));
        let needs_x = fx.subject("A");
        let needs_x_and_y = fx.subject("B");
        let a = fx.course(
            needs_x,
            &[RequirementRecord::group("ALL").with_child(approved("X"))],
        );
        let b = fx.course(
            needs_x_and_y,
            &[RequirementRecord::group("ALL")
                .with_child(approved("X"))
                .with_child(approved("Y"))],
        );

        let nothing = StatusSnapshot::default();
        assert_eq!(fx.unlocked(x, &nothing), vec![a]);

        let with_y = StatusSnapshot::default().with(Target::Subject(y), CompletionStatus::Approved);
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(fx.unlocked(x, &with_y), expected);
    }

    #[test]
    fn already_eligible_offerings_are_not_reported() {
        let mut fx = Fixture::new();
        let (x, y) = (fx.subject("X"), fx.subject("Y"));
        let c = fx.subject("C");
        fx.course(
            c,
            &[RequirementRecord::group("ANY")
                .with_child(approved("X"))
                .with_child(approved("Y"))],
        );

        let with_y = StatusSnapshot::default().with(Target::Subject(y), CompletionStatus::Approved);
        assert!(fx.unlocked(x, &with_y).is_empty());
    }

    #[test]
    fn forbidden_subject_unlocks_nothing() {
        let mut fx = Fixture::new();
        let x = fx.subject("X");
        let c = fx.subject("C");
        fx.course(c, &[RequirementRecord::group("NONE").with_child(approved("X"))]);

        assert!(fx.unlocked(x, &StatusSnapshot::default()).is_empty());
    }

    #[test]
    fn candidates_follow_multiple_hops() {
        let mut fx = Fixture::new();
        let x = fx.subject("X");
        let (y, z) = (fx.subject("Y"), fx.subject("Z"));
        let y_course = fx.course(y, &[RequirementRecord::group("ALL").with_child(approved("X"))]);
        let z_course = fx.course(z, &[RequirementRecord::group("ALL").with_child(approved("Y"))]);

        let one_hop = candidates(&fx.catalog, &fx.index, x, NonZeroUsize::MIN);
        assert_eq!(one_hop, BTreeSet::from([y_course]));

        let two_hops = candidates(&fx.catalog, &fx.index, x, NonZeroUsize::new(2).unwrap());
        assert_eq!(two_hops, BTreeSet::from([y_course, z_course]));
    }

    #[test]
    fn own_and_inactive_offerings_are_excluded() {
        let mut fx = Fixture::new();
        let x = fx.subject("X");
        let other = fx.subject("O");
        // A course of X gated on X itself.
        fx.course(x, &[RequirementRecord::group("ALL").with_child(approved("X"))]);
        let inactive = fx.course(
            other,
            &[RequirementRecord::group("ALL").with_child(approved("X"))],
        );
        fx.catalog.set_active(inactive, false).unwrap();

        assert!(fx.unlocked(x, &StatusSnapshot::default()).is_empty());
    }
}
