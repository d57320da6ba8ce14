//! Edges stored per gated offering, with a reverse lookup by origin.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{
    domain::{OfferingId, Target},
    graph::materialize::DependencyEdge,
};

/// Materialized edges, keyed by gated offering with a reverse map by origin.
///
/// Each offering's edges are replaced as a unit, so updating one offering
/// touches only the entries that offering owns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeIndex {
    by_offering: BTreeMap<OfferingId, BTreeSet<DependencyEdge>>,
    by_origin: HashMap<Target, BTreeSet<OfferingId>>,
}

impl EdgeIndex {
    /// Replaces every edge gating `offering`.
    ///
    /// Edges whose `gated` field names another offering are ignored.
    pub fn replace(&mut self, offering: OfferingId, edges: BTreeSet<DependencyEdge>) {
        self.remove(offering);

        let edges: BTreeSet<DependencyEdge> = edges
            .into_iter()
            .filter(|edge| edge.gated == offering)
            .collect();
        if edges.is_empty() {
            return;
        }

        for edge in &edges {
            self.by_origin
                .entry(edge.origin)
                .or_default()
                .insert(offering);
        }
        self.by_offering.insert(offering, edges);
    }

    /// Drops every edge gating `offering`, returning them.
    pub fn remove(&mut self, offering: OfferingId) -> Option<BTreeSet<DependencyEdge>> {
        let edges = self.by_offering.remove(&offering)?;
        for edge in &edges {
            if let Some(gated) = self.by_origin.get_mut(&edge.origin) {
                gated.remove(&offering);
                if gated.is_empty() {
                    self.by_origin.remove(&edge.origin);
                }
            }
        }
        Some(edges)
    }

    /// Offerings whose trees reference `origin`, in id order.
    pub fn gated_by(&self, origin: Target) -> impl Iterator<Item = OfferingId> + '_ {
        self.by_origin
            .get(&origin)
            .into_iter()
            .flat_map(|gated| gated.iter().copied())
    }

    /// The edges gating `offering`.
    pub fn edges_for(&self, offering: OfferingId) -> impl Iterator<Item = &DependencyEdge> {
        self.by_offering
            .get(&offering)
            .into_iter()
            .flat_map(BTreeSet::iter)
    }

    /// The edges leaving `origin`.
    pub fn edges_from(&self, origin: Target) -> impl Iterator<Item = &DependencyEdge> {
        self.gated_by(origin)
            .flat_map(move |offering| self.edges_for(offering))
            .filter(move |edge| edge.origin == origin)
    }

    /// Every edge, grouped by gated offering in id order.
    pub fn edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.by_offering.values().flatten()
    }

    /// Total number of edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_offering.values().map(BTreeSet::len).sum()
    }

    /// Whether the index holds no edges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_offering.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{Condition, GroupId, SubjectId},
        graph::materialize::EdgeKind,
    };

    fn edge(origin: Target, gated: OfferingId) -> DependencyEdge {
        DependencyEdge {
            origin,
            gated,
            group: GroupId::from_index(0),
            kind: EdgeKind::RequiresAll,
            condition: Condition::Approved,
        }
    }

    #[test]
    fn replace_swaps_only_the_target_offering() {
        let p1 = Target::Subject(SubjectId::new());
        let p2 = Target::Subject(SubjectId::new());
        let (a, b) = (OfferingId::new(), OfferingId::new());

        let mut index = EdgeIndex::default();
        index.replace(a, BTreeSet::from([edge(p1, a)]));
        index.replace(b, BTreeSet::from([edge(p1, b)]));
        assert_eq!(index.gated_by(p1).count(), 2);

        index.replace(a, BTreeSet::from([edge(p2, a)]));

        assert_eq!(index.gated_by(p1).collect::<Vec<_>>(), vec![b]);
        assert_eq!(index.gated_by(p2).collect::<Vec<_>>(), vec![a]);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn removing_the_last_edge_clears_the_origin() {
        let p1 = Target::Subject(SubjectId::new());
        let a = OfferingId::new();
        let mut index = EdgeIndex::default();
        index.replace(a, BTreeSet::from([edge(p1, a)]));

        let removed = index.remove(a).unwrap();

        assert_eq!(removed.len(), 1);
        assert!(index.is_empty());
        assert_eq!(index.gated_by(p1).count(), 0);
        assert!(index.remove(a).is_none());
    }

    #[test]
    fn foreign_edges_are_ignored() {
        let p1 = Target::Subject(SubjectId::new());
        let (a, b) = (OfferingId::new(), OfferingId::new());
        let mut index = EdgeIndex::default();

        index.replace(a, BTreeSet::from([edge(p1, b)]));

        assert!(index.is_empty());
    }

    #[test]
    fn edges_from_filters_by_origin() {
        let p1 = Target::Subject(SubjectId::new());
        let p2 = Target::Subject(SubjectId::new());
        let a = OfferingId::new();
        let mut index = EdgeIndex::default();
        index.replace(a, BTreeSet::from([edge(p1, a), edge(p2, a)]));

        let from_p1: Vec<_> = index.edges_from(p1).collect();
        assert_eq!(from_p1.len(), 1);
        assert_eq!(from_p1[0].origin, p1);
        assert_eq!(index.edges_for(a).count(), 2);
        assert_eq!(index.edges().count(), 2);
    }
}
