//! End-to-end run: all passes followed by allowed-parent ranking.

use std::fmt;

use tracing::{info, instrument};

use crate::config::SimulationConfig;
use crate::distance::{AllowedParentsConfig, DistanceEngine};
use crate::error::Result;
use crate::driver::SimulationDriver;
use crate::genetics::{AlleleFrequencies, LocusFilter};
use crate::graph::NetworkGraph;
use crate::process::{
    DetectionProcess, GeneticsPropagation, ObservationProcess, SourceGeneticsProcess,
    SourceTimeProcess, TimePropagation,
};
use crate::record::SimulationReport;
use crate::store::EntityStore;

/// One instance of every process a run needs.
pub struct ProcessSet {
    pub source_time: Box<dyn SourceTimeProcess>,
    pub time_propagation: Box<dyn TimePropagation>,
    pub detection: Box<dyn DetectionProcess>,
    pub source_genetics: Box<dyn SourceGeneticsProcess>,
    pub genetics_propagation: Box<dyn GeneticsPropagation>,
    pub observation: Box<dyn ObservationProcess>,
}

impl fmt::Debug for ProcessSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSet")
            .field("source_time", &self.source_time.name())
            .field("time_propagation", &self.time_propagation.name())
            .field("detection", &self.detection.name())
            .field("source_genetics", &self.source_genetics.name())
            .field("genetics_propagation", &self.genetics_propagation.name())
            .field("observation", &self.observation.name())
            .finish()
    }
}

/// A finished run: the exported report plus the populated store.
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub report: SimulationReport,
    pub store: EntityStore,
}

/// Runs timing, genetics, observation and allowed-parent ranking over a
/// graph with one set of injected processes.
#[derive(Debug)]
pub struct Simulation {
    processes: ProcessSet,
    frequencies: AlleleFrequencies,
    allowed_parents: AllowedParentsConfig,
    locus_filter: Option<LocusFilter>,
}

impl Simulation {
    /// `frequencies` is exported as-is in the report's locus list.
    #[must_use]
    pub const fn new(
        processes: ProcessSet,
        frequencies: AlleleFrequencies,
        allowed_parents: AllowedParentsConfig,
    ) -> Self {
        Self {
            processes,
            frequencies,
            allowed_parents,
            locus_filter: None,
        }
    }

    /// Keep only `filter`'s loci in genetics, observation and distance.
    #[must_use]
    pub fn with_locus_filter(mut self, filter: Option<LocusFilter>) -> Self {
        self.locus_filter = filter;
        self
    }

    /// Build processes, allele table and filter from `config`.
    ///
    /// # Errors
    ///
    /// Returns the first invalid parameter or allele-table error.
    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        Ok(Self::new(
            config.build_processes()?,
            config.allele_frequencies()?,
            config.allowed_parents,
        )
        .with_locus_filter(config.locus_filter.clone()))
    }

    /// Run every pass over `graph` with a fresh store.
    ///
    /// Allowed parents are ranked over all nodes in registration order.
    ///
    /// # Errors
    ///
    /// Any error from the driver passes or the distance engine. Nothing is
    /// returned for a failed run.
    #[instrument(skip_all, fields(nodes = graph.node_count(), edges = graph.edge_count()))]
    pub fn run(&mut self, graph: &NetworkGraph) -> Result<SimulationOutcome> {
        let mut driver = match &self.locus_filter {
            Some(filter) => SimulationDriver::with_locus_filter(filter.clone()),
            None => SimulationDriver::new(),
        };

        let p = &mut self.processes;
        driver.generate_timing(
            graph,
            p.source_time.as_mut(),
            p.time_propagation.as_mut(),
            p.detection.as_mut(),
        )?;
        driver.generate_genetics(
            graph,
            p.source_genetics.as_mut(),
            p.genetics_propagation.as_mut(),
        )?;
        driver.generate_observations(graph, p.observation.as_mut())?;

        let store = driver.into_store();
        let nodes: Vec<&str> = graph.nodes().collect();
        let allowed = DistanceEngine::with_loci(&store, self.locus_filter.as_ref())
            .allowed_parents(&nodes, &self.allowed_parents, Some(graph))?;
        let report = SimulationReport::assemble(graph, &store, &self.frequencies, &allowed)?;

        info!(
            nodes = report.nodes.len(),
            edges = report.network.len(),
            hash = %report.network_hash,
            "simulation complete"
        );
        Ok(SimulationOutcome { report, store })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PropagationRule;
    use crate::graph::OutbreakGenerator;

    fn small_config() -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.genetics.alleles = crate::config::AlleleTable::Uniform {
            loci: 6,
            alleles: 4,
        };
        config.network.founders = 3;
        config.network.r0 = 1.5;
        config.network.max_nodes = 20;
        config.allowed_parents.max_parents = 4;
        config
    }

    fn run(config: &SimulationConfig) -> SimulationOutcome {
        let graph = OutbreakGenerator::new(config.network)
            .expect("generator")
            .generate()
            .expect("graph");
        Simulation::from_config(config)
            .expect("simulation")
            .run(&graph)
            .expect("run")
    }

    #[test]
    fn report_covers_every_node_and_edge() {
        let config = small_config();
        let outcome = run(&config);
        let report = &outcome.report;
        assert_eq!(report.loci.len(), 6);
        assert!(!report.nodes.is_empty());
        for node in &report.nodes {
            assert!(node.allowed_parents.len() <= 4);
            assert_eq!(
                node.allowed_parents.len() + node.disallowed_parents.len(),
                report.nodes.len() - 1
            );
            assert!(node.infection_duration > 0.0);
            assert_eq!(node.observed_genotype.len(), 6);
            assert!(node.latent_genotype.coi() >= 1);
        }
        assert_eq!(outcome.store.observations().len(), report.nodes.len());
    }

    #[test]
    fn same_config_same_report() {
        let config = small_config();
        assert_eq!(run(&config).report, run(&config).report);
    }

    #[test]
    fn different_seed_changes_output() {
        let config = small_config();
        let mut other = config.clone();
        other.seed += 100;
        assert_ne!(run(&config).report.nodes, run(&other).report.nodes);
    }

    #[test]
    fn locus_filter_restricts_everything() {
        let mut config = small_config();
        config.locus_filter = Some(LocusFilter::new(["L2", "L5"]));
        config.genetics.propagation = PropagationRule::Recombination {
            mean_gametocytes: 1.0,
            mean_oocysts: 1.0,
            mean_transmitted: 1.0,
        };
        let report = run(&config).report;
        assert_eq!(report.loci.len(), 2);
        for node in &report.nodes {
            assert_eq!(
                node.observed_genotype.keys().map(String::as_str).collect::<Vec<_>>(),
                vec!["L2", "L5"]
            );
        }
    }

    #[test]
    fn cyclic_graph_yields_no_report() {
        let graph = NetworkGraph::from_edges([("a", "b"), ("b", "a")]);
        let mut sim = Simulation::from_config(&small_config()).expect("simulation");
        assert!(matches!(
            sim.run(&graph),
            Err(crate::SimError::GraphCycle { .. })
        ));
    }
}
