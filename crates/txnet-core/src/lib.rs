#![forbid(unsafe_code)]
//! txnet-core library.
//!
//! Simulates transmission networks: a DAG of infection events whose timing,
//! latent strains and noisy observed genotypes are drawn by pluggable
//! stochastic processes, followed by genetic-distance ranking of candidate
//! parents.
//!
//! # Conventions
//!
//! - **Errors**: core operations return [`Result`] over [`SimError`]; config
//!   loading uses `anyhow::Result`.
//! - **Logging**: Use `tracing` macros (`info!`, `debug!`, `trace!`).
//! - **Randomness**: every process owns a seeded [`process::ProcessRng`].

pub mod config;
pub mod distance;
pub mod driver;
pub mod error;
pub mod genetics;
pub mod graph;
pub mod pipeline;
pub mod process;
pub mod record;
pub mod store;

pub use config::{SimulationConfig, load_config};
pub use distance::{
    AllowedParents, AllowedParentsConfig, Candidate, DistanceEngine, build_allowed_parents,
    pairwise_distance,
};
pub use driver::SimulationDriver;
pub use error::{ErrorCode, Result, SimError};
pub use genetics::{AlleleFrequencies, AlleleVector, Genotype, Infection, LocusFilter, Strain};
pub use graph::{NetworkGraph, OutbreakConfig, OutbreakGenerator};
pub use pipeline::{ProcessSet, Simulation, SimulationOutcome};
pub use record::{EdgeRecord, LocusRecord, NodeRecord, SimulationReport};
pub use store::EntityStore;
