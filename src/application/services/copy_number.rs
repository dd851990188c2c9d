//! Copy number propagation service
//!
//! Runs aggregate -> build -> propagate over fully materialized sources.

use tracing::{info, instrument, warn};

use crate::application::ApplicationResult;
use crate::domain::{
    aggregate_observations, propagate, DomainError, Edge, Lookup, PropagationOptions,
    RawObservation, RemapTable, RootStatus, StructuralIssue, TaxonomyTree, TreeBuilder,
};

/// Counters and issues collected during one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PropagationReport {
    /// Distinct tax ids with at least one usable observation
    pub observed_taxa: usize,
    pub accepted_observations: usize,
    pub dropped_observations: usize,
    pub remapped_observations: usize,
    pub structural: Vec<StructuralIssue>,
    pub conflicts: Vec<DomainError>,
    pub root: RootStatus,
    pub resolved: usize,
    pub unresolved: usize,
}

impl PropagationReport {
    /// No structural problems, no conflicts and a resolved root.
    pub fn is_clean(&self) -> bool {
        self.structural.is_empty()
            && self.conflicts.is_empty()
            && matches!(self.root, RootStatus::Resolved(_))
    }
}

/// Fully propagated taxonomy plus what happened on the way.
#[derive(Debug)]
pub struct Propagation {
    pub tree: TaxonomyTree,
    pub report: PropagationReport,
}

impl Propagation {
    pub fn lookup(&self, tax_id: &str) -> Lookup {
        self.tree.lookup(tax_id)
    }
}

/// Service computing median copy numbers for every taxonomy node.
pub struct CopyNumberService {
    options: PropagationOptions,
}

impl CopyNumberService {
    pub fn new(options: PropagationOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PropagationOptions {
        &self.options
    }

    /// Aggregate observations, build the tree from `edges` and propagate.
    ///
    /// Only a conflict under `ConflictPolicy::Abort` fails the run; everything
    /// else ends up in the report.
    #[instrument(level = "debug", skip_all)]
    pub fn run<E, O>(
        &self,
        edges: E,
        remap: &RemapTable,
        observations: O,
    ) -> ApplicationResult<Propagation>
    where
        E: IntoIterator<Item = Edge>,
        O: IntoIterator<Item = RawObservation>,
    {
        info!("updating merged tax_ids");
        let summary = aggregate_observations(observations, remap, self.options.aggregation);

        info!("building node tree");
        let mut tree = TreeBuilder::new(self.options.root_id.clone(), &summary.aggregates)
            .build(edges);

        let outcome = propagate(&mut tree, &self.options)?;

        let resolved = tree.resolved_count();
        let report = PropagationReport {
            observed_taxa: summary.aggregates.len(),
            accepted_observations: summary.accepted,
            dropped_observations: summary.dropped,
            remapped_observations: summary.remapped,
            structural: tree.issues().to_vec(),
            conflicts: outcome.conflicts,
            root: outcome.root,
            resolved,
            unresolved: tree.len() - resolved,
        };
        if !report.is_clean() {
            warn!(
                structural = report.structural.len(),
                conflicts = report.conflicts.len(),
                root = ?report.root,
                "propagation finished with issues"
            );
        }
        info!(resolved = report.resolved, unresolved = report.unresolved, "propagation done");

        Ok(Propagation { tree, report })
    }
}

impl Default for CopyNumberService {
    fn default() -> Self {
        Self::new(PropagationOptions::default())
    }
}
