//! Property tests for scope semantics, materialization and cycle checks.

#![allow(missing_docs)]

use std::num::NonZeroUsize;

use proptest::prelude::*;
use prereqs::{
    Catalog, CompletionStatus, Condition, EngineConfig, OfferingId, StatusSnapshot, SubjectId,
    Target,
    domain::{
        Fallback, GroupId, ItemTarget, NodeRef, RequirementItem, RequirementTree, Scope,
        StructureError, TreeDraft,
    },
    eval::Evaluator,
    graph::materialize,
};

fn leaf(subject: SubjectId) -> RequirementItem {
    RequirementItem::new(
        ItemTarget::Subject(subject),
        Condition::Approved,
        Fallback {
            code: "S".to_string(),
            label: None,
        },
    )
}

/// A single-group tree over fresh subjects, with the status approving the
/// subjects flagged in `approvals`.
fn flat(scope: Scope, approvals: &[bool]) -> (RequirementTree, StatusSnapshot) {
    let mut draft = TreeDraft::new(OfferingId::new());
    let root = draft.add_group(scope, None);
    let mut status = StatusSnapshot::default();
    for (order, approved) in (0u32..).zip(approvals) {
        let subject = SubjectId::new();
        let item = draft.add_item(leaf(subject));
        draft.link(root, item.into(), order).unwrap();
        if *approved {
            status.set(Target::Subject(subject), CompletionStatus::Approved);
        }
    }
    draft.add_root(root, 0).unwrap();
    (draft.finish().unwrap(), status)
}

fn eligible(tree: &RequirementTree, status: &StatusSnapshot) -> bool {
    let catalog = Catalog::default();
    let config = EngineConfig::default();
    Evaluator::new(&catalog, status, &config)
        .evaluate_requirements(tree)
        .eligible
}

fn approvals_with_threshold() -> impl Strategy<Value = (Vec<bool>, usize)> {
    prop::collection::vec(any::<bool>(), 1..10)
        .prop_flat_map(|approvals| {
            let n = approvals.len();
            (Just(approvals), 1..=n)
        })
}

#[derive(Debug, Clone)]
enum Shape {
    Leaf(usize),
    Group(u8, Vec<Shape>),
}

fn arb_shape() -> impl Strategy<Value = Shape> {
    let leaf = (0usize..6).prop_map(Shape::Leaf);
    leaf.prop_recursive(4, 32, 4, |inner| {
        (0u8..3, prop::collection::vec(inner, 1..4))
            .prop_map(|(scope, children)| Shape::Group(scope, children))
    })
}

fn build(shape: &Shape, subjects: &[SubjectId], offering: OfferingId) -> RequirementTree {
    fn add(draft: &mut TreeDraft, shape: &Shape, subjects: &[SubjectId]) -> NodeRef {
        match shape {
            Shape::Leaf(i) => draft.add_item(leaf(subjects[*i])).into(),
            Shape::Group(tag, children) => {
                let scope = match tag {
                    0 => Scope::All,
                    1 => Scope::ANY_ONE,
                    _ => Scope::None,
                };
                let group = draft.add_group(scope, None);
                for (order, child) in (0u32..).zip(children) {
                    let node = add(draft, child, subjects);
                    draft.link(group, node, order).unwrap();
                }
                group.into()
            }
        }
    }

    let mut draft = TreeDraft::new(offering);
    let root = match shape {
        Shape::Leaf(_) => Shape::Group(0, vec![shape.clone()]),
        Shape::Group(..) => shape.clone(),
    };
    if let NodeRef::Group(group) = add(&mut draft, &root, subjects) {
        draft.add_root(group, 0).unwrap();
    }
    draft.finish().unwrap()
}

proptest! {
    #[test]
    fn any_is_satisfied_by_at_least_k_children((approvals, k) in approvals_with_threshold()) {
        let scope = Scope::Any { min_required: NonZeroUsize::new(k).unwrap() };
        let (tree, status) = flat(scope, &approvals);
        let approved = approvals.iter().filter(|a| **a).count();

        prop_assert_eq!(eligible(&tree, &status), approved >= k);
    }

    #[test]
    fn none_is_satisfied_only_when_no_child_is(approvals in prop::collection::vec(any::<bool>(), 1..10)) {
        let (tree, status) = flat(Scope::None, &approvals);

        prop_assert_eq!(eligible(&tree, &status), !approvals.contains(&true));
    }

    #[test]
    fn evaluation_is_deterministic(
        shape in arb_shape(),
        approvals in prop::collection::vec(any::<bool>(), 6),
    ) {
        let subjects: Vec<SubjectId> = (0..6).map(|_| SubjectId::new()).collect();
        let tree = build(&shape, &subjects, OfferingId::new());
        let status: StatusSnapshot = subjects
            .iter()
            .zip(&approvals)
            .filter(|(_, approved)| **approved)
            .map(|(subject, _)| (Target::Subject(*subject), CompletionStatus::Approved))
            .collect();

        prop_assert_eq!(eligible(&tree, &status), eligible(&tree, &status));
    }

    #[test]
    fn materialization_is_idempotent(shape in arb_shape()) {
        let subjects: Vec<SubjectId> = (0..6).map(|_| SubjectId::new()).collect();
        let offering = OfferingId::new();
        let tree = build(&shape, &subjects, offering);
        let rebuilt = build(&shape, &subjects, offering);

        let first = materialize(&tree);
        let second = materialize(&rebuilt);

        prop_assert_eq!(tree.fingerprint(), rebuilt.fingerprint());
        prop_assert_eq!(first.fingerprint(), second.fingerprint());
        prop_assert_eq!(first.edges, second.edges);
        prop_assert!(first.cycles.is_empty());
    }

    #[test]
    fn linking_back_to_an_ancestor_is_rejected(depth in 1usize..8, back in 0usize..8) {
        let mut draft = TreeDraft::new(OfferingId::new());
        let chain: Vec<GroupId> = (0..=depth).map(|_| draft.add_group(Scope::All, None)).collect();
        for pair in chain.windows(2) {
            draft.link(pair[0], pair[1].into(), 0).unwrap();
        }
        let ancestor = chain[back.min(depth)];
        let deepest = chain[depth];

        let err = draft.link(deepest, ancestor.into(), 1).unwrap_err();

        prop_assert!(matches!(err, StructureError::Cycle { .. }), "{err:?}");
    }
}

#[test]
fn none_around_a_satisfied_leaf_is_never_satisfied() {
    let (tree, status) = flat(Scope::None, &[true]);
    assert!(!eligible(&tree, &status));
}
