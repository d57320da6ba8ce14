//! Flattening requirement trees into dependency edges.

use std::{
    borrow::Borrow,
    collections::{BTreeSet, HashSet},
    fmt,
};

use borsh::BorshSerialize;
use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::domain::{
    Condition, GroupId, ItemId, NodeRef, OfferingId, RequirementTree, Scope, Target,
};

/// How a leaf's target relates to the offering it gates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, BorshSerialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    /// The target is one of several mandatory requirements.
    RequiresAll,
    /// The target is one alternative among several.
    AlternativeAny,
    /// The target must not be completed.
    ForbiddenNone,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::RequiresAll => f.write_str("REQUIRES_ALL"),
            Self::AlternativeAny => f.write_str("ALTERNATIVE_ANY"),
            Self::ForbiddenNone => f.write_str("FORBIDDEN_NONE"),
        }
    }
}

/// A derived edge from a requirement's target to the offering it gates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, BorshSerialize,
)]
pub struct DependencyEdge {
    /// The referenced subject or offering.
    pub origin: Target,
    /// The offering whose tree contains the reference.
    pub gated: OfferingId,
    /// The group directly containing the leaf.
    pub group: GroupId,
    /// The governing scope.
    pub kind: EdgeKind,
    /// The status the leaf asks for.
    pub condition: Condition,
}

/// A node was reached again along one root-to-leaf path.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("cycle through {node} in the requirements of offering {offering}")]
pub struct CycleError {
    /// The offering whose tree holds the cycle.
    pub offering: OfferingId,
    /// The revisited node.
    pub node: NodeRef,
}

/// The edges derived from one tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    /// The gated offering.
    pub offering: OfferingId,
    /// Every edge, ordered.
    pub edges: BTreeSet<DependencyEdge>,
    /// How many unresolved leaves produced no edge.
    pub skipped_unresolved: usize,
    /// Cycles met (and skipped) during the walk.
    pub cycles: Vec<CycleError>,
}

impl Materialized {
    /// SHA-256 of the edge set's borsh encoding, hex encoded.
    ///
    /// # Panics
    ///
    /// Panics if borsh serialization fails (which should never happen for this
    /// data structure).
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let encoded = borsh::to_vec(&self.edges).expect("this should never fail");
        format!("{:x}", Sha256::digest(encoded))
    }
}

/// Walks every root-to-leaf path of `tree` and emits one edge per resolved
/// leaf.
///
/// Inside an odd number of NONE ancestors the edge forbids its target.
/// Otherwise the kind comes from the leaf's parent: ALL requires it, and ANY
/// or an even-polarity NONE make it an alternative.
#[instrument(level = "debug", skip(tree), fields(offering = %tree.offering()))]
pub fn materialize(tree: &RequirementTree) -> Materialized {
    let mut walk = Walk {
        tree,
        edges: BTreeSet::new(),
        skipped_unresolved: 0,
        cycles: Vec::new(),
        on_path: HashSet::new(),
    };

    for root in tree.roots() {
        walk.group(root, false);
    }

    debug!(
        edges = walk.edges.len(),
        skipped = walk.skipped_unresolved,
        "materialized requirement tree"
    );

    Materialized {
        offering: tree.offering(),
        edges: walk.edges,
        skipped_unresolved: walk.skipped_unresolved,
        cycles: walk.cycles,
    }
}

/// Materializes many trees in parallel.
///
/// The output is in the same order as the input.
pub fn materialize_all<T>(trees: &[T]) -> Vec<Materialized>
where
    T: Borrow<RequirementTree> + Sync,
{
    trees
        .par_iter()
        .map(|tree| materialize(tree.borrow()))
        .collect()
}

struct Walk<'a> {
    tree: &'a RequirementTree,
    edges: BTreeSet<DependencyEdge>,
    skipped_unresolved: usize,
    cycles: Vec<CycleError>,
    on_path: HashSet<GroupId>,
}

impl Walk<'_> {
    fn group(&mut self, id: GroupId, negated: bool) {
        let Some(group) = self.tree.group(id) else {
            return;
        };
        if !self.on_path.insert(id) {
            let cycle = CycleError {
                offering: self.tree.offering(),
                node: NodeRef::Group(id),
            };
            warn!(%cycle, "skipping cyclic branch");
            self.cycles.push(cycle);
            return;
        }

        let scope = group.scope();
        let negated = negated ^ matches!(scope, Scope::None);

        for child in group.children() {
            match child.node() {
                NodeRef::Group(child) => self.group(child, negated),
                NodeRef::Item(item) => self.item(item, id, scope, negated),
            }
        }

        self.on_path.remove(&id);
    }

    fn item(&mut self, id: ItemId, parent: GroupId, scope: Scope, negated: bool) {
        let Some(item) = self.tree.item(id) else {
            return;
        };
        let Some(origin) = item.target().resolved() else {
            self.skipped_unresolved += 1;
            return;
        };

        let kind = if negated {
            EdgeKind::ForbiddenNone
        } else {
            match scope {
                Scope::All => EdgeKind::RequiresAll,
                Scope::Any { .. } | Scope::None => EdgeKind::AlternativeAny,
            }
        };

        self.edges.insert(DependencyEdge {
            origin,
            gated: self.tree.offering(),
            group: parent,
            kind,
            condition: item.condition(),
        });
    }
}
