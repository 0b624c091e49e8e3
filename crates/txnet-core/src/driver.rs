//! Simulation passes over the transmission DAG.
//!
//! # Passes
//!
//! 1. [`SimulationDriver::generate_timing`]: topological traversal writing
//!    `(infection_time, infection_duration)` per node.
//! 2. [`SimulationDriver::generate_genetics`]: topological traversal writing
//!    each node's latent [`Infection`].
//! 3. [`SimulationDriver::generate_observations`]: one pass in registration
//!    order writing observed genotypes. Each observation depends only on the
//!    node's own infection.
//!
//! Timing and genetics may run in either order relative to each other, but
//! observation needs the genetics pass to have finished.
//!
//! Repeated edges between the same pair count once: each distinct parent
//! contributes one draw.

use tracing::{debug, instrument, trace};

use crate::error::{Result, SimError};
use crate::genetics::{Infection, LocusFilter};
use crate::graph::NetworkGraph;
use crate::process::{
    DetectionContext, DetectionProcess, GeneticsPropagation, ObservationProcess,
    SourceGeneticsProcess, SourceTimeProcess, TimePropagation,
};
use crate::store::EntityStore;

/// Owns the [`EntityStore`] for one run and fills it pass by pass.
#[derive(Debug, Clone, Default)]
pub struct SimulationDriver {
    store: EntityStore,
    locus_filter: Option<LocusFilter>,
}

impl SimulationDriver {
    /// Driver over a fresh, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver that keeps only the loci in `filter` in every infection.
    #[must_use]
    pub fn with_locus_filter(filter: LocusFilter) -> Self {
        Self {
            store: EntityStore::new(),
            locus_filter: Some(filter),
        }
    }

    /// The locus filter applied to genetics, if any.
    #[must_use]
    pub const fn locus_filter(&self) -> Option<&LocusFilter> {
        self.locus_filter.as_ref()
    }

    /// Read access to everything written so far.
    #[must_use]
    pub const fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Hand the populated store to the caller.
    #[must_use]
    pub fn into_store(self) -> EntityStore {
        self.store
    }

    /// Write infection time and duration for every node.
    ///
    /// Roots draw from `source`; other nodes take the latest of one
    /// `propagation` draw per distinct parent. Every node then draws a fresh
    /// duration from `detection`.
    ///
    /// # Errors
    ///
    /// - [`crate::SimError::GraphCycle`] if the graph cannot be ordered.
    /// - [`crate::SimError::MissingParentState`] if a parent was not written.
    /// - [`crate::SimError::DuplicateNode`] if a node already has timing.
    /// - [`crate::SimError::InvalidParameter`] if a process returns a
    ///   non-finite time or a duration that is not finite and positive.
    /// - Any sampling error raised by a process.
    #[instrument(
        skip_all,
        fields(
            nodes = graph.node_count(),
            source = source.name(),
            propagation = propagation.name(),
            detection = detection.name(),
        )
    )]
    pub fn generate_timing(
        &mut self,
        graph: &NetworkGraph,
        source: &mut dyn SourceTimeProcess,
        propagation: &mut dyn TimePropagation,
        detection: &mut dyn DetectionProcess,
    ) -> Result<()> {
        let order = graph.topological_order()?;
        let mut roots = 0_usize;

        for node in &order {
            let parents = graph.distinct_parents(node)?;
            let time = if parents.is_empty() {
                roots += 1;
                source.sample()?
            } else {
                let mut latest = f64::NEG_INFINITY;
                for parent in parents {
                    let parent_time = *self.store.infection_times.parent_state(node, parent)?;
                    let parent_duration =
                        *self.store.infection_durations.parent_state(node, parent)?;
                    latest = latest.max(propagation.sample(parent_time, parent_duration)?);
                }
                latest
            };

            if !time.is_finite() {
                return Err(SimError::InvalidParameter {
                    name: "infection_time",
                    value: time,
                    reason: "timing process returned a non-finite time",
                });
            }
            let duration = detection.sample(&DetectionContext {
                node: node.as_str(),
                infection_time: time,
            })?;
            if !(duration.is_finite() && duration > 0.0) {
                return Err(SimError::InvalidParameter {
                    name: "infection_duration",
                    value: duration,
                    reason: "detection process must return a finite positive duration",
                });
            }
            self.store.record_timing(node, time, duration)?;
            trace!(node = %node, time, duration, "timing recorded");
        }

        debug!(nodes = order.len(), roots, "timing pass complete");
        Ok(())
    }

    /// Write the latent infection for every node.
    ///
    /// # Errors
    ///
    /// - [`crate::SimError::GraphCycle`] if the graph cannot be ordered.
    /// - [`crate::SimError::MissingParentState`] if a parent was not written.
    /// - [`crate::SimError::DuplicateNode`] if a node already has genetics.
    /// - [`crate::SimError::InvalidLocusFilter`] if the filter names a locus
    ///   the drawn strains lack.
    /// - Any error raised by a process.
    #[instrument(
        skip_all,
        fields(
            nodes = graph.node_count(),
            source = source.name(),
            propagation = propagation.name(),
        )
    )]
    pub fn generate_genetics(
        &mut self,
        graph: &NetworkGraph,
        source: &mut dyn SourceGeneticsProcess,
        propagation: &mut dyn GeneticsPropagation,
    ) -> Result<()> {
        let order = graph.topological_order()?;
        let mut total_strains = 0_usize;

        for node in &order {
            let parents = graph.distinct_parents(node)?;
            let drawn = if parents.is_empty() {
                source.sample()?
            } else {
                let parent_infections = parents
                    .iter()
                    .map(|parent| self.store.infections.parent_state(node, parent))
                    .collect::<Result<Vec<&Infection>>>()?;
                propagation.propagate(&parent_infections)?
            };

            let infection = match &self.locus_filter {
                Some(filter) => drawn.restrict(filter, node)?,
                None => drawn,
            };
            total_strains += infection.coi();
            trace!(node = %node, coi = infection.coi(), "infection recorded");
            self.store.record_infection(node, infection)?;
        }

        debug!(nodes = order.len(), total_strains, "genetics pass complete");
        Ok(())
    }

    /// Write an observed genotype for every node.
    ///
    /// Nodes are visited in registration order so a seeded observation
    /// process gives the same output on every run.
    ///
    /// # Errors
    ///
    /// - [`crate::SimError::MissingState`] if a node has no infection yet.
    /// - [`crate::SimError::DuplicateNode`] if a node was already observed.
    /// - Any error raised by the process.
    #[instrument(skip_all, fields(nodes = graph.node_count(), observation = observation.name()))]
    pub fn generate_observations(
        &mut self,
        graph: &NetworkGraph,
        observation: &mut dyn ObservationProcess,
    ) -> Result<()> {
        for node in graph.nodes() {
            let genotype = {
                let infection = self.store.infections.state(node)?;
                observation.observe(infection)?
            };
            self.store.record_observation(node, genotype)?;
        }

        debug!(nodes = graph.node_count(), "observation pass complete");
        Ok(())
    }
}
