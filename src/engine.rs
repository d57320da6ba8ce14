//! The engine facade: stored trees, their edges, and the queries over them.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::{
    domain::{
        Catalog, CatalogProvider, EngineConfig, GroupId, ItemId, NodeRef, OfferingId, ProgramId,
        RequirementTree, ResolutionError, StatusProvider, StructureError, SubjectId, SubjectRef,
        Target, TargetKind,
    },
    eval::{Evaluation, Evaluator, UnlockReport, unlocked_by},
    graph::{CycleError, DependencyEdge, EdgeIndex, Materialized, materialize, materialize_all},
    ingest::{BuildError, LoadedCatalog, PendingRequirements, RequirementRecord, TreeBuilder},
};

/// Errors raised by engine operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The offering is not in the catalog.
    #[error("offering {0} not found")]
    UnknownOffering(OfferingId),

    /// The offering has no stored requirement tree.
    #[error("offering {0} has no requirements")]
    NoTree(OfferingId),

    /// A subject reference could not be resolved.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// A structural change would break the tree.
    #[error(transparent)]
    Structure(#[from] StructureError),
}

/// What happened when a tree was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// The gated offering.
    pub offering: OfferingId,
    /// Problems met while building from records.
    pub errors: Vec<BuildError>,
    /// How many edges the tree produced.
    pub edges: usize,
    /// How many unresolved leaves produced no edge.
    pub skipped_unresolved: usize,
    /// Cycles met while materializing.
    pub cycles: Vec<CycleError>,
    /// Fingerprint of the tree.
    pub tree_fingerprint: String,
    /// Fingerprint of the edge set.
    pub edge_fingerprint: String,
}

impl IngestReport {
    fn new(tree: &RequirementTree, errors: Vec<BuildError>, materialized: &Materialized) -> Self {
        Self {
            offering: tree.offering(),
            errors,
            edges: materialized.edges.len(),
            skipped_unresolved: materialized.skipped_unresolved,
            cycles: materialized.cycles.clone(),
            tree_fingerprint: tree.fingerprint(),
            edge_fingerprint: materialized.fingerprint(),
        }
    }
}

/// A requirement leaf that could not be resolved during ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedReference {
    /// The placeholder item.
    pub item: ItemId,
    /// What the leaf was meant to reference.
    pub kind: TargetKind,
    /// The code as written.
    pub code: String,
    /// The label as written.
    pub label: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    trees: HashMap<OfferingId, Arc<RequirementTree>>,
    index: EdgeIndex,
}

impl State {
    fn install(
        &mut self,
        tree: RequirementTree,
        errors: Vec<BuildError>,
        materialized: Materialized,
    ) -> IngestReport {
        let report = IngestReport::new(&tree, errors, &materialized);
        self.index.replace(report.offering, materialized.edges);
        self.trees.insert(report.offering, Arc::new(tree));
        report
    }
}

/// Requirement trees for a catalog, with the edge index derived from them.
///
/// Trees are built and materialized outside the lock; the tree and its edges
/// are then swapped in under a single write lock, so readers see either the
/// old pair or the new one. Structural edits read, rebuild and swap under
/// the write lock so concurrent writers are never lost.
#[derive(Debug)]
pub struct Engine {
    catalog: Arc<Catalog>,
    config: EngineConfig,
    state: RwLock<State>,
}

impl Engine {
    /// An engine with no stored trees.
    #[must_use]
    pub fn new(catalog: impl Into<Arc<Catalog>>, config: EngineConfig) -> Self {
        Self {
            catalog: catalog.into(),
            config,
            state: RwLock::default(),
        }
    }

    /// An engine holding every tree of a loaded snapshot.
    pub fn from_snapshot(loaded: LoadedCatalog, config: EngineConfig) -> (Self, Vec<IngestReport>) {
        let engine = Self::new(loaded.catalog, config);
        let reports = engine.ingest_all(&loaded.requirements);
        (engine, reports)
    }

    /// The catalog snapshot the engine resolves against.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Builds and stores the tree gating `offering` from its root records.
    ///
    /// Codes resolve in the offering's own program unless a record names
    /// another. Build problems are reported, not fatal.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownOffering`] if the offering is not in the
    /// catalog.
    #[instrument(level = "debug", skip(self, records))]
    pub fn ingest(
        &self,
        offering: OfferingId,
        records: &[RequirementRecord],
    ) -> Result<IngestReport, EngineError> {
        let program = self.program_of(offering)?;
        let (tree, errors) = self.build(offering, program, records);
        Ok(self.store_built(tree, errors))
    }

    /// Builds and stores many trees. Building and materializing run in
    /// parallel; trees are then stored one offering at a time.
    ///
    /// Offerings missing from the catalog are skipped with a warning.
    pub fn ingest_all(&self, batch: &[PendingRequirements]) -> Vec<IngestReport> {
        let (trees, errors): (Vec<RequirementTree>, Vec<Vec<BuildError>>) = batch
            .par_iter()
            .filter(|pending| {
                let known = self.catalog.offering(pending.offering).is_some();
                if !known {
                    warn!(offering = %pending.offering, "skipping requirements of unknown offering");
                }
                known
            })
            .map(|pending| self.build(pending.offering, pending.program, &pending.records))
            .unzip();
        let materialized = materialize_all(&trees);

        let reports: Vec<IngestReport> = trees
            .into_iter()
            .zip(errors)
            .zip(materialized)
            .map(|((tree, errors), materialized)| self.swap(tree, errors, materialized))
            .collect();

        info!(
            offerings = reports.len(),
            edges = self.state.read().index.len(),
            "ingested requirement trees"
        );
        reports
    }

    /// Stores an already validated tree, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownOffering`] if the tree's offering is not
    /// in the catalog.
    pub fn store(&self, tree: RequirementTree) -> Result<IngestReport, EngineError> {
        self.program_of(tree.offering())?;
        Ok(self.store_built(tree, Vec::new()))
    }

    /// Links `child` under `parent` in the stored tree of `offering`.
    ///
    /// The new tree is validated and rematerialized before it replaces the
    /// old one.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoTree`] if nothing is stored for the offering,
    /// or a [`StructureError`] if the link would break the tree. The stored
    /// tree is unchanged on error.
    pub fn link(
        &self,
        offering: OfferingId,
        parent: GroupId,
        child: NodeRef,
        order: u32,
    ) -> Result<IngestReport, EngineError> {
        let mut state = self.state.write();
        let current = state
            .trees
            .get(&offering)
            .ok_or(EngineError::NoTree(offering))?;
        let updated = current.link(parent, child, order)?;
        let materialized = materialize(&updated);
        let report = state.install(updated, Vec::new(), materialized);
        drop(state);
        debug!(%offering, edges = report.edges, "linked into requirement tree");
        Ok(report)
    }

    /// Drops the tree of `offering` and its edges.
    pub fn remove(&self, offering: OfferingId) -> Option<Arc<RequirementTree>> {
        let mut state = self.state.write();
        state.index.remove(offering);
        state.trees.remove(&offering)
    }

    /// The stored tree of `offering`.
    #[must_use]
    pub fn tree(&self, offering: OfferingId) -> Option<Arc<RequirementTree>> {
        self.state.read().trees.get(&offering).cloned()
    }

    /// Whether a student with `status` may take `offering`.
    #[must_use]
    pub fn evaluate<S: StatusProvider + ?Sized>(&self, offering: OfferingId, status: &S) -> bool {
        self.evaluate_detailed(offering, status).eligible
    }

    /// Like [`evaluate`](Self::evaluate), with diagnostics.
    ///
    /// An offering with no stored tree has no requirements.
    #[must_use]
    pub fn evaluate_detailed<S: StatusProvider + ?Sized>(
        &self,
        offering: OfferingId,
        status: &S,
    ) -> Evaluation {
        let tree = self
            .tree(offering)
            .unwrap_or_else(|| Arc::new(RequirementTree::empty(offering)));
        Evaluator::new(self.catalog.as_ref(), status, &self.config).evaluate(&tree)
    }

    /// Offerings newly available once the referenced subject is approved.
    ///
    /// # Errors
    ///
    /// Returns an error if the reference does not identify exactly one
    /// subject.
    pub fn unlocked_by<S: StatusProvider + ?Sized>(
        &self,
        subject: &SubjectRef,
        status: &S,
    ) -> Result<Vec<OfferingId>, EngineError> {
        let subject = self.catalog.find_subject(subject)?;
        Ok(self.unlocked_by_detailed(subject, status).unlocked)
    }

    /// Like [`unlocked_by`](Self::unlocked_by), by subject id and with
    /// diagnostics.
    #[must_use]
    pub fn unlocked_by_detailed<S: StatusProvider + ?Sized>(
        &self,
        subject: SubjectId,
        status: &S,
    ) -> UnlockReport {
        let state = self.state.read();
        unlocked_by(
            self.catalog.as_ref(),
            &state.index,
            &state.trees,
            subject,
            status,
            &self.config,
        )
    }

    /// Every edge leaving `subject` or one of its offerings.
    ///
    /// This is the one-hop listing of offerings whose requirements mention
    /// the subject. It says nothing about eligibility.
    #[must_use]
    pub fn dependents(&self, subject: SubjectId) -> Vec<DependencyEdge> {
        let state = self.state.read();
        let origins = std::iter::once(Target::Subject(subject)).chain(
            self.catalog
                .offerings_of(subject)
                .iter()
                .copied()
                .map(Target::Offering),
        );
        let mut edges: Vec<DependencyEdge> = origins
            .flat_map(|origin| state.index.edges_from(origin).copied().collect::<Vec<_>>())
            .collect();
        edges.sort();
        edges
    }

    /// Every stored edge, ordered by gated offering.
    #[must_use]
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.state.read().index.edges().copied().collect()
    }

    /// Unresolved leaves of every stored tree, by offering.
    #[must_use]
    pub fn audit(&self) -> BTreeMap<OfferingId, Vec<UnresolvedReference>> {
        let state = self.state.read();
        state
            .trees
            .iter()
            .filter_map(|(offering, tree)| {
                let unresolved: Vec<UnresolvedReference> = tree
                    .unresolved_items()
                    .map(|(item, leaf)| UnresolvedReference {
                        item,
                        kind: leaf.target().kind(),
                        code: leaf.fallback().code.clone(),
                        label: leaf.fallback().label.clone(),
                    })
                    .collect();
                (!unresolved.is_empty()).then_some((*offering, unresolved))
            })
            .collect()
    }

    /// Number of stored trees.
    #[must_use]
    pub fn tree_count(&self) -> usize {
        self.state.read().trees.len()
    }

    fn program_of(&self, offering: OfferingId) -> Result<ProgramId, EngineError> {
        self.catalog
            .offering(offering)
            .and_then(|o| self.catalog.subject(o.subject()))
            .map(|s| s.program())
            .ok_or(EngineError::UnknownOffering(offering))
    }

    fn build(
        &self,
        offering: OfferingId,
        program: ProgramId,
        records: &[RequirementRecord],
    ) -> (RequirementTree, Vec<BuildError>) {
        let outcome = TreeBuilder::new(self.catalog.as_ref(), program).build(offering, records);
        (outcome.tree, outcome.errors)
    }

    fn store_built(&self, tree: RequirementTree, errors: Vec<BuildError>) -> IngestReport {
        let materialized = materialize(&tree);
        self.swap(tree, errors, materialized)
    }

    fn swap(
        &self,
        tree: RequirementTree,
        errors: Vec<BuildError>,
        materialized: Materialized,
    ) -> IngestReport {
        let report = self.state.write().install(tree, errors, materialized);
        debug!(offering = %report.offering, edges = report.edges, "stored requirement tree");
        report
    }
}
