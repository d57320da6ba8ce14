//! Converts nested requirement records into validated trees.
//!
//! Building is best-effort. Records that cannot be interpreted are skipped,
//! references that cannot be resolved become placeholders, and subtrees that
//! break a structural rule are dropped. Every such problem is reported in the
//! [`BuildOutcome`] next to the tree built from what remained.

use std::{fmt, num::NonZeroUsize};

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::{
    domain::{
        CatalogProvider, Fallback, ItemTarget, NodeRef, OfferingId, ProgramId, RequirementItem,
        RequirementTree, ResolutionError, Scope, StructureError, TreeDraft,
    },
    ingest::record::{LeafFields, ParseError, RecordShape, RequirementRecord, ScopeTag},
};

/// The position of a record in its source, as indices from the root list.
///
/// Displayed as `record 0.2.1`: the third child of the first root, then its
/// second child.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RecordPath(Vec<usize>);

impl RecordPath {
    fn root(index: usize) -> Self {
        Self(vec![index])
    }

    fn child(&self, index: usize) -> Self {
        let mut path = self.0.clone();
        path.push(index);
        Self(path)
    }

    /// The indices, root first.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for RecordPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("record ")?;
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{index}")?;
        }
        Ok(())
    }
}

/// What went wrong with a record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildErrorKind {
    /// The record was skipped.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The leaf was kept as an unresolved placeholder.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The record's subtree was rejected.
    #[error(transparent)]
    Structure(#[from] StructureError),
}

/// A problem found while building, located by record path.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{path}: {kind}")]
pub struct BuildError {
    path: RecordPath,
    kind: BuildErrorKind,
}

impl BuildError {
    fn new(path: RecordPath, kind: impl Into<BuildErrorKind>) -> Self {
        Self {
            path,
            kind: kind.into(),
        }
    }

    /// Where the problem was found.
    #[must_use]
    pub const fn path(&self) -> &RecordPath {
        &self.path
    }

    /// What the problem was.
    #[must_use]
    pub const fn kind(&self) -> &BuildErrorKind {
        &self.kind
    }

    /// Whether the record was kept as a placeholder rather than dropped.
    #[must_use]
    pub const fn is_resolution(&self) -> bool {
        matches!(self.kind, BuildErrorKind::Resolution(_))
    }
}

/// A tree and the problems met while building it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    /// The tree built from every acceptable record.
    pub tree: RequirementTree,
    /// Every problem, in source order.
    pub errors: Vec<BuildError>,
}

impl BuildOutcome {
    /// Whether building met no problem at all.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A node built from records but not yet placed in a tree.
///
/// Subtrees are assembled here first so a rejected group never leaves
/// orphans behind in the tree arena.
#[derive(Debug)]
enum Pending {
    Group {
        scope: Scope,
        note: Option<String>,
        children: Vec<Self>,
    },
    Item(RequirementItem),
}

/// Builds requirement trees for offerings of one program.
#[derive(Debug)]
pub struct TreeBuilder<'a, C: ?Sized> {
    catalog: &'a C,
    program: ProgramId,
}

impl<'a, C: CatalogProvider + ?Sized> TreeBuilder<'a, C> {
    /// A builder resolving codes against `catalog`, in `program` unless a
    /// record names another one.
    pub const fn new(catalog: &'a C, program: ProgramId) -> Self {
        Self { catalog, program }
    }

    /// Builds the tree gating `offering` from its root records.
    ///
    /// Each root record must be a group. Roots are combined conjunctively.
    #[instrument(level = "debug", skip(self, records), fields(roots = records.len()))]
    pub fn build(&self, offering: OfferingId, records: &[RequirementRecord]) -> BuildOutcome {
        let mut errors = Vec::new();
        let mut draft = TreeDraft::new(offering);
        let mut root_order = 0u32;

        for (index, record) in sorted(records) {
            let path = RecordPath::root(index);

            if matches!(record.shape(), Ok(RecordShape::Leaf(_))) {
                warn!(%path, "leaf record at root, skipping");
                errors.push(BuildError::new(path, StructureError::LeafAtRoot));
                continue;
            }

            let Some(pending) = self.build_node(record, &path, &mut errors) else {
                continue;
            };

            let placed = place(&mut draft, pending).and_then(|node| match node {
                NodeRef::Group(group) => draft.add_root(group, root_order),
                NodeRef::Item(_) => Err(StructureError::LeafAtRoot),
            });
            match placed {
                Ok(()) => root_order += 1,
                Err(e) => errors.push(BuildError::new(path, e)),
            }
        }

        let tree = match draft.finish() {
            Ok(tree) => tree,
            Err(e) => {
                warn!(error = %e, "built tree failed validation, discarding it");
                errors.push(BuildError::new(RecordPath::default(), e));
                RequirementTree::empty(offering)
            }
        };

        debug!(
            groups = tree.groups().count(),
            items = tree.items().count(),
            errors = errors.len(),
            "built requirement tree"
        );

        BuildOutcome { tree, errors }
    }

    fn build_node(
        &self,
        record: &RequirementRecord,
        path: &RecordPath,
        errors: &mut Vec<BuildError>,
    ) -> Option<Pending> {
        let shape = match record.shape() {
            Ok(shape) => shape,
            Err(e) => {
                warn!(%path, error = %e, "skipping malformed record");
                errors.push(BuildError::new(path.clone(), e));
                return None;
            }
        };

        let (scope, threshold, note, children) = match shape {
            RecordShape::Leaf(fields) => {
                return Some(Pending::Item(self.resolve_leaf(fields, path, errors)));
            }
            RecordShape::Group {
                scope,
                threshold,
                note,
                children,
            } => (scope, threshold, note, children),
        };

        if threshold.is_some() && scope != ScopeTag::Any {
            let scope = if scope == ScopeTag::All {
                Scope::All
            } else {
                Scope::None
            };
            warn!(%path, %scope, "threshold on a non-ANY group, rejecting subtree");
            errors.push(BuildError::new(
                path.clone(),
                StructureError::UnexpectedThreshold { scope },
            ));
            return None;
        }

        let built: Vec<Pending> = sorted(children)
            .filter_map(|(index, child)| self.build_node(child, &path.child(index), errors))
            .collect();

        let scope = match scope {
            ScopeTag::All => Scope::All,
            ScopeTag::None => Scope::None,
            ScopeTag::Any => {
                let threshold = threshold.unwrap_or(1);
                let min_required = usize::try_from(threshold)
                    .ok()
                    .filter(|n| *n <= built.len())
                    .and_then(NonZeroUsize::new);
                let Some(min_required) = min_required else {
                    warn!(%path, threshold, children = built.len(), "ANY threshold out of range, rejecting subtree");
                    errors.push(BuildError::new(
                        path.clone(),
                        StructureError::ThresholdOutOfRange {
                            threshold,
                            children: built.len(),
                        },
                    ));
                    return None;
                };
                Scope::Any { min_required }
            }
        };

        Some(Pending::Group {
            scope,
            note: note.map(str::to_string),
            children: built,
        })
    }

    fn resolve_leaf(
        &self,
        fields: LeafFields,
        path: &RecordPath,
        errors: &mut Vec<BuildError>,
    ) -> RequirementItem {
        let program = fields.program.as_deref().map_or(Ok(self.program), |name| {
            self.catalog
                .find_program(name)
                .ok_or_else(|| ResolutionError::UnknownProgram(name.to_string()))
        });

        let target = program.and_then(|program| {
            self.catalog
                .resolve(program, &fields.code, fields.kind, fields.offering_kind)
        });

        let target = match target {
            Ok(target) => ItemTarget::from(target),
            Err(e) => {
                warn!(%path, code = %fields.code, error = %e, "unresolved reference, keeping placeholder");
                errors.push(BuildError::new(path.clone(), e));
                ItemTarget::Unresolved(fields.kind)
            }
        };

        RequirementItem::new(
            target,
            fields.condition,
            Fallback {
                code: fields.code.to_string(),
                label: fields.label,
            },
        )
    }
}

/// Records in sibling order: explicit order first, array position breaking
/// ties and standing in for a missing order.
fn sorted(records: &[RequirementRecord]) -> impl Iterator<Item = (usize, &RequirementRecord)> {
    let mut indexed: Vec<(usize, &RequirementRecord)> = records.iter().enumerate().collect();
    indexed.sort_by_key(|(index, record)| {
        let order = record
            .order
            .map_or(*index, |order| usize::try_from(order).unwrap_or(usize::MAX));
        (order, *index)
    });
    indexed.into_iter()
}

fn place(draft: &mut TreeDraft, node: Pending) -> Result<NodeRef, StructureError> {
    match node {
        Pending::Item(item) => Ok(draft.add_item(item).into()),
        Pending::Group {
            scope,
            note,
            children,
        } => {
            let group = draft.add_group(scope, note);
            for (order, child) in (0u32..).zip(children) {
                let child = place(draft, child)?;
                draft.link(group, child, order)?;
            }
            Ok(group.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Catalog, Code, Condition, NewOffering, OfferingKind, SubjectId, Target, TargetKind,
    };

    struct Fixture {
        catalog: Catalog,
        program: ProgramId,
        offering: OfferingId,
        subjects: Vec<SubjectId>,
    }

    fn fixture() -> Fixture {
        let mut catalog = Catalog::default();
        let program = catalog.add_program("Computer Engineering", None).unwrap();
        let subjects = ["P1", "P2", "P3", "GAL1"]
            .into_iter()
            .map(|code| {
                catalog
                    .add_subject(program, Code::new(code).unwrap(), code, 10)
                    .unwrap()
            })
            .collect::<Vec<_>>();
        let target = catalog
            .add_subject(program, Code::new("TGT").unwrap(), "Target", 10)
            .unwrap();
        let offering = catalog
            .add_offering(NewOffering::new(target, OfferingKind::Course, "2025S1"))
            .unwrap();
        Fixture {
            catalog,
            program,
            offering,
            subjects,
        }
    }

    fn subject_leaf(code: &str) -> RequirementRecord {
        RequirementRecord::leaf("SUBJECT", code, "APPROVED")
    }

    fn build(fx: &Fixture, records: &[RequirementRecord]) -> BuildOutcome {
        TreeBuilder::new(&fx.catalog, fx.program).build(fx.offering, records)
    }

    fn root_children(outcome: &BuildOutcome) -> Vec<ItemTarget> {
        let root = outcome.tree.roots().next().unwrap();
        outcome
            .tree
            .group(root)
            .unwrap()
            .children()
            .iter()
            .filter_map(|c| match c.node() {
                NodeRef::Item(item) => Some(outcome.tree.item(item).unwrap().target()),
                NodeRef::Group(_) => None,
            })
            .collect()
    }

    #[test]
    fn any_defaults_to_a_threshold_of_one() {
        let fx = fixture();
        let record = RequirementRecord::group("ANY")
            .with_child(subject_leaf("P1"))
            .with_child(subject_leaf("P2"));

        let outcome = build(&fx, &[record]);

        assert!(outcome.is_clean());
        let root = outcome.tree.roots().next().unwrap();
        assert_eq!(outcome.tree.group(root).unwrap().scope(), Scope::ANY_ONE);
    }

    #[test]
    fn children_follow_explicit_order_then_position() {
        let fx = fixture();
        let record = RequirementRecord::group("ALL")
            .with_child(subject_leaf("P1").with_order(2))
            .with_child(subject_leaf("P2"))
            .with_child(subject_leaf("P3").with_order(0));

        let outcome = build(&fx, &[record]);

        assert_eq!(
            root_children(&outcome),
            vec![
                ItemTarget::Subject(fx.subjects[2]),
                ItemTarget::Subject(fx.subjects[1]),
                ItemTarget::Subject(fx.subjects[0]),
            ]
        );
    }

    #[test]
    fn malformed_child_is_skipped_and_siblings_kept() {
        let fx = fixture();
        let record = RequirementRecord::group("ALL")
            .with_child(subject_leaf("P1"))
            .with_child(RequirementRecord::group("MAYBE"))
            .with_child(subject_leaf("P2"));

        let outcome = build(&fx, &[record]);

        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].path().indices(), &[0, 1]);
        assert!(matches!(
            outcome.errors[0].kind(),
            BuildErrorKind::Parse(ParseError::UnknownKind(_))
        ));
        assert_eq!(root_children(&outcome).len(), 2);
    }

    #[test]
    fn unresolved_reference_becomes_placeholder() {
        let fx = fixture();
        let record = RequirementRecord::group("ALL")
            .with_child(subject_leaf("P1"))
            .with_child(subject_leaf("RETIRED").with_label("RETIRED - Old course"));

        let outcome = build(&fx, &[record]);

        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].is_resolution());

        let (_, placeholder) = outcome.tree.unresolved_items().next().unwrap();
        assert_eq!(placeholder.target(), ItemTarget::Unresolved(TargetKind::Subject));
        assert_eq!(placeholder.condition(), Condition::Approved);
        assert_eq!(placeholder.fallback().code, "RETIRED");
        assert_eq!(
            placeholder.fallback().label.as_deref(),
            Some("RETIRED - Old course")
        );
    }

    #[test]
    fn unknown_program_namespace_is_a_resolution_error() {
        let fx = fixture();
        let record = RequirementRecord::group("ALL")
            .with_child(subject_leaf("P1").with_program("Nowhere"));

        let outcome = build(&fx, &[record]);

        assert!(matches!(
            outcome.errors[0].kind(),
            BuildErrorKind::Resolution(ResolutionError::UnknownProgram(name)) if name == "Nowhere"
        ));
        assert_eq!(outcome.tree.unresolved_items().count(), 1);
    }

    #[test]
    fn offering_kind_hint_resolves_through_subject() {
        let mut fx = fixture();
        let exam = fx
            .catalog
            .add_offering(NewOffering::new(fx.subjects[3], OfferingKind::Exam, "2025S1"))
            .unwrap();
        let record = RequirementRecord::group("ALL").with_child(
            RequirementRecord::leaf("OFFERING", "GAL1", "APPROVED").with_offering_kind("EXAM"),
        );

        let outcome = build(&fx, &[record]);

        assert!(outcome.is_clean());
        assert_eq!(root_children(&outcome), vec![ItemTarget::Offering(exam)]);
    }

    #[test]
    fn threshold_on_all_rejects_the_subtree() {
        let fx = fixture();
        let bad = RequirementRecord::group("ALL")
            .with_threshold(1)
            .with_child(subject_leaf("P1"));
        let record = RequirementRecord::group("ALL")
            .with_child(bad)
            .with_child(subject_leaf("P2"));

        let outcome = build(&fx, &[record]);

        assert_eq!(
            outcome.errors[0].kind(),
            &BuildErrorKind::Structure(StructureError::UnexpectedThreshold { scope: Scope::All })
        );
        assert_eq!(
            root_children(&outcome),
            vec![ItemTarget::Subject(fx.subjects[1])]
        );
        assert_eq!(outcome.tree.groups().count(), 1, "no orphaned groups");
    }

    #[test]
    fn threshold_above_built_children_rejects_the_subtree() {
        let fx = fixture();
        let record = RequirementRecord::group("ANY")
            .with_threshold(2)
            .with_child(subject_leaf("P1"))
            .with_child(RequirementRecord::group("BROKEN"));

        let outcome = build(&fx, &[record]);

        assert!(outcome.tree.is_empty());
        assert!(outcome.errors.iter().any(|e| matches!(
            e.kind(),
            BuildErrorKind::Structure(StructureError::ThresholdOutOfRange {
                threshold: 2,
                children: 1
            })
        )));
    }

    #[test]
    fn zero_threshold_is_out_of_range() {
        let fx = fixture();
        let record = RequirementRecord::group("ANY")
            .with_threshold(0)
            .with_child(subject_leaf("P1"));

        let outcome = build(&fx, &[record]);

        assert!(outcome.tree.is_empty());
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn leaf_at_root_is_rejected() {
        let fx = fixture();
        let outcome = build(
            &fx,
            &[
                subject_leaf("P1"),
                RequirementRecord::group("ALL").with_child(subject_leaf("P2")),
            ],
        );

        assert_eq!(
            outcome.errors[0].kind(),
            &BuildErrorKind::Structure(StructureError::LeafAtRoot)
        );
        assert_eq!(outcome.tree.roots().count(), 1);
    }

    #[test]
    fn group_note_is_kept() {
        let fx = fixture();
        let mut record = RequirementRecord::group("NOT").with_child(subject_leaf("P1"));
        record.note = Some("must not have taken P1".to_string());

        let outcome = build(&fx, &[record]);

        let root = outcome.tree.roots().next().unwrap();
        let group = outcome.tree.group(root).unwrap();
        assert_eq!(group.scope(), Scope::None);
        assert_eq!(group.note(), Some("must not have taken P1"));
    }

    #[test]
    fn identical_records_build_identical_trees() {
        let fx = fixture();
        let records = [RequirementRecord::group("ANY")
            .with_threshold(2)
            .with_child(subject_leaf("P1"))
            .with_child(subject_leaf("P2"))
            .with_child(subject_leaf("P3"))];

        let first = build(&fx, &records).tree;
        let second = build(&fx, &records).tree;

        assert_eq!(first.fingerprint(), second.fingerprint());
        assert!(first.items().all(|(_, item)| matches!(
            item.target().resolved(),
            Some(Target::Subject(_))
        )));
    }

    #[test]
    fn record_path_display() {
        let path = RecordPath::root(0).child(2).child(1);
        assert_eq!(path.to_string(), "record 0.2.1");
    }
}
