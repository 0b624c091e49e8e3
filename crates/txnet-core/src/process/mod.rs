//! Pluggable stochastic processes.
//!
//! # Overview
//!
//! Each attribute domain has a *source* process, used for graph roots, and a
//! *propagation* process, used for nodes with parents:
//!
//! | Domain       | Source                      | Propagation                    |
//! |--------------|-----------------------------|--------------------------------|
//! | timing       | [`SourceTimeProcess`]       | [`TimePropagation`]            |
//! | detection    | [`DetectionProcess`]        | (same, context-aware)          |
//! | genetics     | [`SourceGeneticsProcess`]   | [`GeneticsPropagation`]        |
//! | observation  | (none)                      | [`ObservationProcess`]         |
//!
//! Every implementation owns its [`ProcessRng`]. Processes are injected into
//! the driver by the caller; nothing here is looked up globally.

pub mod observation;
pub mod rng;
pub mod timing;
pub mod transmission;

pub use observation::SimpleObservation;
pub use rng::ProcessRng;
pub use timing::{GammaDetection, UniformSourceTime, UniformTransmissionTime};
pub use transmission::{
    LossMutationTransmission, MultinomialSource, RecombinationTransmission, SimpleLossTransmission,
};

use crate::error::Result;
use crate::genetics::{Genotype, Infection};

/// Samples the absolute infection time of a root node.
pub trait SourceTimeProcess: Send {
    /// Name used in tracing output.
    fn name(&self) -> &'static str;

    /// Draw an infection time.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying distribution cannot be sampled.
    fn sample(&mut self) -> Result<f64>;
}

/// Samples a child infection time from one parent's infectious window.
///
/// Implementations must return a value within
/// `[parent_time, parent_time + parent_duration]`.
pub trait TimePropagation: Send {
    /// Name used in tracing output.
    fn name(&self) -> &'static str;

    /// Draw a candidate child time for a single parent.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying distribution cannot be sampled.
    fn sample(&mut self, parent_time: f64, parent_duration: f64) -> Result<f64>;
}

/// What a detection process may condition on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionContext<'a> {
    pub node: &'a str,
    pub infection_time: f64,
}

/// Samples how long a node stays infectious before detection.
pub trait DetectionProcess: Send {
    /// Name used in tracing output.
    fn name(&self) -> &'static str;

    /// Draw a positive duration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying distribution cannot be sampled.
    fn sample(&mut self, context: &DetectionContext<'_>) -> Result<f64>;
}

/// Draws an initial infection for a root node.
pub trait SourceGeneticsProcess: Send {
    /// Name used in tracing output.
    fn name(&self) -> &'static str;

    /// Draw a fresh infection from the source population.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying distribution cannot be sampled.
    fn sample(&mut self) -> Result<Infection>;
}

/// Combines the infections of every parent into a child infection.
pub trait GeneticsPropagation: Send {
    /// Name used in tracing output.
    fn name(&self) -> &'static str;

    /// Produce the child's infection from its parents', in parent order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SimError::EmptyStrainPool`] when the parents carry no
    /// strains, or a sampling error.
    fn propagate(&mut self, parents: &[&Infection]) -> Result<Infection>;
}

/// Turns a latent infection into a noisy observed genotype.
pub trait ObservationProcess: Send {
    /// Name used in tracing output.
    fn name(&self) -> &'static str;

    /// Observe one infection.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying distribution cannot be sampled.
    fn observe(&mut self, infection: &Infection) -> Result<Genotype>;
}
