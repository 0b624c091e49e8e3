//! Branching-process outbreak generator.
//!
//! Builds a [`NetworkGraph`] by seeding `founders` root infections and then
//! expanding infected nodes breadth-first, each producing Poisson(`r0`)
//! offspring until `max_nodes` exist. Labels are `"1"`, `"2"`, … in creation
//! order, so every edge points from a lower label to a higher one and the
//! result is acyclic.
//!
//! With `superinfection_rate > 0` a child may receive one extra parent drawn
//! uniformly from all nodes created before it.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{Result, ensure_non_negative, ensure_probability};
use crate::process::ProcessRng;

use super::NetworkGraph;

/// Shape of a generated outbreak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutbreakConfig {
    /// Number of source infections seeded from outside the network.
    #[serde(default = "default_founders")]
    pub founders: usize,
    /// Mean offspring per infected node.
    #[serde(default = "default_r0")]
    pub r0: f64,
    /// Hard cap on the total number of nodes.
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
    /// Probability that a child gets a second, earlier parent.
    #[serde(default)]
    pub superinfection_rate: f64,
    /// Seed for the offspring stream.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

const fn default_founders() -> usize {
    10
}

const fn default_r0() -> f64 {
    0.9
}

const fn default_max_nodes() -> usize {
    100
}

const fn default_seed() -> u64 {
    25
}

impl Default for OutbreakConfig {
    fn default() -> Self {
        Self {
            founders: default_founders(),
            r0: default_r0(),
            max_nodes: default_max_nodes(),
            superinfection_rate: 0.0,
            seed: default_seed(),
        }
    }
}

impl OutbreakConfig {
    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SimError::InvalidParameter`] for a negative `r0` or a
    /// `superinfection_rate` outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("r0", self.r0)?;
        ensure_probability("superinfection_rate", self.superinfection_rate)
    }
}

/// Seeded generator for branching-process transmission graphs.
#[derive(Debug, Clone)]
pub struct OutbreakGenerator {
    config: OutbreakConfig,
    rng: ProcessRng,
}

impl OutbreakGenerator {
    /// # Errors
    ///
    /// Returns an error if `config` fails [`OutbreakConfig::validate`].
    pub fn new(config: OutbreakConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            rng: ProcessRng::new(config.seed),
            config,
        })
    }

    /// Configuration this generator was built with.
    #[must_use]
    pub const fn config(&self) -> &OutbreakConfig {
        &self.config
    }

    /// Grow one outbreak.
    ///
    /// # Errors
    ///
    /// Propagates offspring sampling failures.
    #[instrument(skip_all, fields(founders = self.config.founders, r0 = self.config.r0))]
    pub fn generate(&mut self) -> Result<NetworkGraph> {
        let cap = self.config.max_nodes;
        let mut graph = NetworkGraph::new();
        let mut queue = VecDeque::new();
        let mut created = 0_usize;
        let mut superinfections = 0_usize;

        while created < self.config.founders.min(cap) {
            created += 1;
            let label = created.to_string();
            graph.add_node(&label);
            queue.push_back(label);
        }

        while let Some(parent) = queue.pop_front() {
            if created >= cap {
                break;
            }
            let offspring = self.rng.poisson(self.config.r0)?;
            for _ in 0..offspring {
                if created >= cap {
                    break;
                }
                created += 1;
                let child = created.to_string();
                graph.add_edge(&parent, &child);

                if self.rng.bernoulli(self.config.superinfection_rate) {
                    let Some(pick) = self.rng.index(created - 1) else {
                        queue.push_back(child);
                        continue;
                    };
                    let extra = (pick + 1).to_string();
                    if extra != parent {
                        graph.add_edge(&extra, &child);
                        superinfections += 1;
                    }
                }
                queue.push_back(child);
            }
        }

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            superinfections,
            "outbreak generated"
        );
        Ok(graph)
    }
}
