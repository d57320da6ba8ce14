//! Requirement trees: the prerequisite logic attached to one offering.
//!
//! A [`RequirementTree`] is an immutable, validated arena of
//! [`RequirementGroup`]s (internal nodes) and [`RequirementItem`]s (leaves).
//! Trees are assembled through a [`TreeDraft`] and validated when the draft
//! is finished. Structural changes to a stored tree produce a new validated
//! tree; a tree is never mutated in place.
//!
//! The parent/child relation may share nodes (a DAG) but never forms a cycle.

use std::{collections::HashSet, fmt, io, num::NonZeroUsize};

use borsh::BorshSerialize;
use petgraph::{algo::toposort, graphmap::DiGraphMap};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::instrument;

use crate::domain::{
    catalog::{OfferingId, SubjectId, Target, TargetKind},
    status::Condition,
};

/// Index of a group within its tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, BorshSerialize,
)]
#[serde(transparent)]
pub struct GroupId(usize);

/// Index of an item within its tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, BorshSerialize,
)]
#[serde(transparent)]
pub struct ItemId(usize);

impl GroupId {
    /// Wraps an arena index. Ids are only meaningful for the tree that
    /// issued them.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// The arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl ItemId {
    /// Wraps an arena index. Ids are only meaningful for the tree that
    /// issued them.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// The arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "group #{}", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "item #{}", self.0)
    }
}

/// A reference to any node of a tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, BorshSerialize,
)]
pub enum NodeRef {
    /// An internal node.
    Group(GroupId),
    /// A leaf.
    Item(ItemId),
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Group(id) => id.fmt(f),
            Self::Item(id) => id.fmt(f),
        }
    }
}

impl From<GroupId> for NodeRef {
    fn from(id: GroupId) -> Self {
        Self::Group(id)
    }
}

impl From<ItemId> for NodeRef {
    fn from(id: ItemId) -> Self {
        Self::Item(id)
    }
}

/// The boolean combinator of a group.
///
/// `min_required` only exists for [`Scope::Any`], and is at least one by
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "scope", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    /// Every child must hold.
    All,
    /// At least `min_required` children must hold.
    Any {
        /// The threshold.
        min_required: NonZeroUsize,
    },
    /// No child may hold.
    None,
}

impl Scope {
    /// An ANY scope requiring a single child.
    pub const ANY_ONE: Self = Self::Any {
        min_required: NonZeroUsize::MIN,
    };

    /// The threshold, if this is an ANY scope.
    #[must_use]
    pub const fn min_required(self) -> Option<NonZeroUsize> {
        match self {
            Self::Any { min_required } => Some(min_required),
            Self::All | Self::None => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::All => f.write_str("ALL"),
            Self::Any { min_required } => write!(f, "ANY({min_required})"),
            Self::None => f.write_str("NONE"),
        }
    }
}

impl BorshSerialize for Scope {
    fn serialize<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            Self::All => BorshSerialize::serialize(&0u8, writer),
            Self::Any { min_required } => {
                BorshSerialize::serialize(&1u8, writer)?;
                BorshSerialize::serialize(&(min_required.get() as u64), writer)
            }
            Self::None => BorshSerialize::serialize(&2u8, writer),
        }
    }
}

/// A child reference with its sibling order index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, BorshSerialize)]
pub struct ChildRef {
    order: u32,
    node: NodeRef,
}

impl ChildRef {
    /// The sibling order index.
    #[must_use]
    pub const fn order(self) -> u32 {
        self.order
    }

    /// The referenced node.
    #[must_use]
    pub const fn node(self) -> NodeRef {
        self.node
    }
}

/// An internal node of a requirement tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, BorshSerialize)]
pub struct RequirementGroup {
    scope: Scope,
    children: Vec<ChildRef>,
    note: Option<String>,
}

impl RequirementGroup {
    /// The group's combinator.
    #[must_use]
    pub const fn scope(&self) -> Scope {
        self.scope
    }

    /// Children in sibling order.
    #[must_use]
    pub fn children(&self) -> &[ChildRef] {
        &self.children
    }

    /// Free-text note carried over from the source record.
    #[must_use]
    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }
}

/// What a requirement leaf points at.
///
/// An unresolved leaf still records which kind of entity it was meant to
/// reference; the code and label it was written with live in the item's
/// [`Fallback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, BorshSerialize)]
#[serde(tag = "type", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemTarget {
    /// A subject, satisfied through any of its offerings.
    Subject(SubjectId),
    /// One exact offering.
    Offering(OfferingId),
    /// A reference that could not be resolved during ingestion.
    Unresolved(TargetKind),
}

impl ItemTarget {
    /// The kind of entity referenced.
    #[must_use]
    pub const fn kind(self) -> TargetKind {
        match self {
            Self::Subject(_) => TargetKind::Subject,
            Self::Offering(_) => TargetKind::Offering,
            Self::Unresolved(kind) => kind,
        }
    }

    /// The resolved target, if any.
    #[must_use]
    pub const fn resolved(self) -> Option<Target> {
        match self {
            Self::Subject(id) => Some(Target::Subject(id)),
            Self::Offering(id) => Some(Target::Offering(id)),
            Self::Unresolved(_) => None,
        }
    }
}

impl From<Target> for ItemTarget {
    fn from(target: Target) -> Self {
        match target {
            Target::Subject(id) => Self::Subject(id),
            Target::Offering(id) => Self::Offering(id),
        }
    }
}

/// The code and label a leaf was written with in its source record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, BorshSerialize)]
pub struct Fallback {
    /// The code as written in the source.
    pub code: String,
    /// A descriptive label, if the source had one.
    pub label: Option<String>,
}

/// A leaf of a requirement tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, BorshSerialize)]
pub struct RequirementItem {
    target: ItemTarget,
    condition: Condition,
    fallback: Fallback,
}

impl RequirementItem {
    /// Creates a leaf.
    #[must_use]
    pub const fn new(target: ItemTarget, condition: Condition, fallback: Fallback) -> Self {
        Self {
            target,
            condition,
            fallback,
        }
    }

    /// What the leaf references.
    #[must_use]
    pub const fn target(&self) -> ItemTarget {
        self.target
    }

    /// The status the target must have.
    #[must_use]
    pub const fn condition(&self) -> Condition {
        self.condition
    }

    /// The code and label from the source record.
    #[must_use]
    pub const fn fallback(&self) -> &Fallback {
        &self.fallback
    }

    /// Whether this is an unresolved placeholder.
    #[must_use]
    pub const fn is_unresolved(&self) -> bool {
        matches!(self.target, ItemTarget::Unresolved(_))
    }
}

/// Invariant violations in a requirement tree.
///
/// Violations found in a tree name the offending node; violations found in
/// source records are located by the builder's record path. Violations are
/// never repaired.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StructureError {
    /// An ANY group's threshold exceeds its number of children.
    #[error("{group} requires {min_required} of {children} children")]
    ThresholdExceedsChildren {
        /// The offending group.
        group: GroupId,
        /// The group's threshold.
        min_required: NonZeroUsize,
        /// How many children the group has.
        children: usize,
    },

    /// A node is reachable from itself.
    #[error("{node} is part of a cycle")]
    Cycle {
        /// A node on the cycle.
        node: NodeRef,
    },

    /// A group references a node that does not exist.
    #[error("{parent} references missing {child}")]
    DanglingReference {
        /// The referencing group.
        parent: GroupId,
        /// The missing node.
        child: NodeRef,
    },

    /// A group or root id does not exist in the tree.
    #[error("{0} does not exist")]
    UnknownGroup(GroupId),

    /// The same child is linked twice under one parent.
    #[error("{child} is already a child of {parent}")]
    DuplicateChild {
        /// The parent group.
        parent: GroupId,
        /// The repeated child.
        child: NodeRef,
    },

    /// A root group is also some group's child.
    #[error("root {0} has a parent")]
    RootHasParent(GroupId),

    /// The same group is registered as a root twice.
    #[error("{0} is already a root")]
    DuplicateRoot(GroupId),

    /// A threshold was given for an ALL or NONE group.
    #[error("{scope} groups take no threshold")]
    UnexpectedThreshold {
        /// The group's scope.
        scope: Scope,
    },

    /// An ANY threshold is below one or above the number of children.
    #[error("threshold {threshold} is outside 1..={children}")]
    ThresholdOutOfRange {
        /// The threshold as written.
        threshold: i64,
        /// How many children were built.
        children: usize,
    },

    /// A leaf record appears where a root group is expected.
    #[error("a root must be a group, not a leaf")]
    LeafAtRoot,
}

/// A mutable, unvalidated requirement tree under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeDraft {
    offering: OfferingId,
    groups: Vec<RequirementGroup>,
    items: Vec<RequirementItem>,
    roots: Vec<ChildRef>,
}

impl TreeDraft {
    /// Starts an empty draft for an offering.
    #[must_use]
    pub const fn new(offering: OfferingId) -> Self {
        Self {
            offering,
            groups: Vec::new(),
            items: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// Adds a leaf. It is not attached to any group yet.
    pub fn add_item(&mut self, item: RequirementItem) -> ItemId {
        self.items.push(item);
        ItemId(self.items.len() - 1)
    }

    /// Adds a childless group. It is not attached to any parent yet.
    pub fn add_group(&mut self, scope: Scope, note: Option<String>) -> GroupId {
        self.groups.push(RequirementGroup {
            scope,
            children: Vec::new(),
            note,
        });
        GroupId(self.groups.len() - 1)
    }

    /// Registers a group as a root of the tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the group does not exist or is already a root.
    pub fn add_root(&mut self, group: GroupId, order: u32) -> Result<(), StructureError> {
        if group.0 >= self.groups.len() {
            return Err(StructureError::UnknownGroup(group));
        }
        let node = NodeRef::Group(group);
        if self.roots.iter().any(|root| root.node == node) {
            return Err(StructureError::DuplicateRoot(group));
        }
        insert_ordered(&mut self.roots, ChildRef { order, node });
        Ok(())
    }

    /// Attaches `child` under `parent` at sibling position `order`.
    ///
    /// Siblings are kept sorted by order index; equal indices keep the order
    /// in which they were linked.
    ///
    /// # Errors
    ///
    /// Returns an error if either node is missing, the link already exists,
    /// or the link would make a node reachable from itself.
    pub fn link(
        &mut self,
        parent: GroupId,
        child: NodeRef,
        order: u32,
    ) -> Result<(), StructureError> {
        if parent.0 >= self.groups.len() {
            return Err(StructureError::UnknownGroup(parent));
        }
        if !self.contains(child) {
            return Err(StructureError::DanglingReference { parent, child });
        }
        if self.groups[parent.0].children.iter().any(|c| c.node == child) {
            return Err(StructureError::DuplicateChild { parent, child });
        }
        if child == NodeRef::Group(parent) || self.reaches(child, NodeRef::Group(parent)) {
            return Err(StructureError::Cycle {
                node: NodeRef::Group(parent),
            });
        }

        insert_ordered(&mut self.groups[parent.0].children, ChildRef { order, node: child });
        Ok(())
    }

    /// Validates the draft and freezes it into a [`RequirementTree`].
    ///
    /// # Errors
    ///
    /// Returns the first [`StructureError`] found.
    #[instrument(level = "trace", skip(self), fields(offering = %self.offering))]
    pub fn finish(self) -> Result<RequirementTree, StructureError> {
        self.validate()?;
        Ok(RequirementTree {
            offering: self.offering,
            groups: self.groups,
            items: self.items,
            roots: self.roots,
        })
    }

    /// Links without any checks. Lets tests build trees that validation
    /// would reject.
    #[cfg(test)]
    pub(crate) fn link_unchecked(&mut self, parent: GroupId, child: NodeRef, order: u32) {
        insert_ordered(&mut self.groups[parent.0].children, ChildRef { order, node: child });
    }

    /// Freezes the draft without validation.
    #[cfg(test)]
    pub(crate) fn finish_unchecked(self) -> RequirementTree {
        RequirementTree {
            offering: self.offering,
            groups: self.groups,
            items: self.items,
            roots: self.roots,
        }
    }

    fn contains(&self, node: NodeRef) -> bool {
        match node {
            NodeRef::Group(id) => id.0 < self.groups.len(),
            NodeRef::Item(id) => id.0 < self.items.len(),
        }
    }

    fn reaches(&self, from: NodeRef, to: NodeRef) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            let NodeRef::Group(group) = node else {
                continue;
            };
            if !seen.insert(group) {
                continue;
            }
            if let Some(group) = self.groups.get(group.0) {
                stack.extend(group.children.iter().map(|c| c.node));
            }
        }
        false
    }

    fn validate(&self) -> Result<(), StructureError> {
        let mut graph: DiGraphMap<NodeRef, ()> =
            DiGraphMap::with_capacity(self.groups.len() + self.items.len(), self.items.len());
        let mut has_parent = HashSet::new();

        for (index, group) in self.groups.iter().enumerate() {
            let id = GroupId(index);
            let parent = NodeRef::Group(id);
            graph.add_node(parent);

            let mut seen = HashSet::new();
            for child in &group.children {
                if !self.contains(child.node) {
                    return Err(StructureError::DanglingReference {
                        parent: id,
                        child: child.node,
                    });
                }
                if !seen.insert(child.node) {
                    return Err(StructureError::DuplicateChild {
                        parent: id,
                        child: child.node,
                    });
                }
                if child.node == parent {
                    return Err(StructureError::Cycle { node: parent });
                }
                graph.add_edge(parent, child.node, ());
                has_parent.insert(child.node);
            }

            if let Scope::Any { min_required } = group.scope {
                if min_required.get() > group.children.len() {
                    return Err(StructureError::ThresholdExceedsChildren {
                        group: id,
                        min_required,
                        children: group.children.len(),
                    });
                }
            }
        }

        toposort(&graph, None).map_err(|cycle| StructureError::Cycle {
            node: cycle.node_id(),
        })?;

        let mut roots = HashSet::new();
        for root in &self.roots {
            let NodeRef::Group(group) = root.node else {
                return Err(StructureError::LeafAtRoot);
            };
            if !self.contains(root.node) {
                return Err(StructureError::UnknownGroup(group));
            }
            if !roots.insert(group) {
                return Err(StructureError::DuplicateRoot(group));
            }
            if has_parent.contains(&root.node) {
                return Err(StructureError::RootHasParent(group));
            }
        }

        Ok(())
    }
}

fn insert_ordered(siblings: &mut Vec<ChildRef>, child: ChildRef) {
    let position = siblings.partition_point(|c| c.order <= child.order);
    siblings.insert(position, child);
}

/// A validated, immutable requirement tree for one offering.
///
/// Multiple roots are combined conjunctively. A tree with no roots imposes no
/// requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, BorshSerialize)]
pub struct RequirementTree {
    offering: OfferingId,
    groups: Vec<RequirementGroup>,
    items: Vec<RequirementItem>,
    roots: Vec<ChildRef>,
}

impl RequirementTree {
    /// An empty (always satisfied) tree.
    #[must_use]
    pub const fn empty(offering: OfferingId) -> Self {
        Self {
            offering,
            groups: Vec::new(),
            items: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// The offering this tree gates.
    #[must_use]
    pub const fn offering(&self) -> OfferingId {
        self.offering
    }

    /// Root groups in order.
    pub fn roots(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.roots.iter().filter_map(|root| match root.node {
            NodeRef::Group(id) => Some(id),
            NodeRef::Item(_) => None,
        })
    }

    /// Whether the tree has no roots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Looks up a group.
    #[must_use]
    pub fn group(&self, id: GroupId) -> Option<&RequirementGroup> {
        self.groups.get(id.0)
    }

    /// Looks up an item.
    #[must_use]
    pub fn item(&self, id: ItemId) -> Option<&RequirementItem> {
        self.items.get(id.0)
    }

    /// The ordered children of a group; empty if the group does not exist.
    #[must_use]
    pub fn children(&self, id: GroupId) -> &[ChildRef] {
        self.group(id).map_or(&[], RequirementGroup::children)
    }

    /// All groups with their ids.
    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &RequirementGroup)> {
        self.groups.iter().enumerate().map(|(i, g)| (GroupId(i), g))
    }

    /// All items with their ids.
    pub fn items(&self) -> impl Iterator<Item = (ItemId, &RequirementItem)> {
        self.items.iter().enumerate().map(|(i, item)| (ItemId(i), item))
    }

    /// Items that could not be resolved during ingestion.
    pub fn unresolved_items(&self) -> impl Iterator<Item = (ItemId, &RequirementItem)> {
        self.items().filter(|(_, item)| item.is_unresolved())
    }

    /// Returns a new tree with `child` linked under `parent`.
    ///
    /// # Errors
    ///
    /// Returns a [`StructureError`] if the resulting tree would be invalid;
    /// `self` is unchanged either way.
    pub fn link(&self, parent: GroupId, child: NodeRef, order: u32) -> Result<Self, StructureError> {
        let mut draft = self.clone().into_draft();
        draft.link(parent, child, order)?;
        draft.finish()
    }

    /// Reopens the tree as a draft.
    #[must_use]
    pub fn into_draft(self) -> TreeDraft {
        TreeDraft {
            offering: self.offering,
            groups: self.groups,
            items: self.items,
            roots: self.roots,
        }
    }

    /// SHA-256 of the tree's borsh encoding, hex encoded.
    ///
    /// Identical trees have identical fingerprints regardless of how they
    /// were built.
    ///
    /// # Panics
    ///
    /// Panics if borsh serialization fails (which should never happen for this
    /// data structure).
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let encoded = borsh::to_vec(self).expect("this should never fail");
        format!("{:x}", Sha256::digest(encoded))
    }
}
