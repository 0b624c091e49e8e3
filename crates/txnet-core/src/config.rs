//! TOML run configuration.
//!
//! Every field has a default, so an empty file (or no file) describes a
//! complete run: 10 founders, 100 loci of 15 equally likely alleles, uniform
//! timing over `[0, 1000]`, gamma detection, loss-only transmission and 1%
//! observation noise.
//!
//! ```toml
//! seed = 25
//! locus_filter = ["L1", "L2"]
//!
//! [network]
//! founders = 10
//! r0 = 0.9
//!
//! [genetics.propagation]
//! kind = "loss_mutation"
//! loss_rate = 0.1
//! mutation_rate = 0.01
//!
//! [genetics.alleles]
//! loci = 100
//! alleles = 15
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::distance::AllowedParentsConfig;
use crate::error::SimError;
use crate::genetics::{AlleleFrequencies, LocusFilter};
use crate::graph::{OutbreakConfig, OutbreakGenerator};
use crate::pipeline::ProcessSet;
use crate::process::{
    GammaDetection, LossMutationTransmission, MultinomialSource, RecombinationTransmission,
    SimpleLossTransmission, SimpleObservation, UniformSourceTime, UniformTransmissionTime,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Base seed; each process draws from its own stream derived from it.
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub network: OutbreakConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub genetics: GeneticsConfig,
    #[serde(default)]
    pub observation: ObservationConfig,
    #[serde(default)]
    pub allowed_parents: AllowedParentsConfig,
    /// Loci kept for genetics, observation and distance. All when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locus_filter: Option<LocusFilter>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            network: OutbreakConfig::default(),
            timing: TimingConfig::default(),
            detection: DetectionConfig::default(),
            genetics: GeneticsConfig::default(),
            observation: ObservationConfig::default(),
            allowed_parents: AllowedParentsConfig::default(),
            locus_filter: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default)]
    pub source_min: f64,
    #[serde(default = "default_source_max")]
    pub source_max: f64,
    /// Minimum delay between a parent's infection and its child's.
    #[serde(default = "default_min_delay")]
    pub min_delay: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            source_min: 0.0,
            source_max: default_source_max(),
            min_delay: default_min_delay(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "default_gamma_shape")]
    pub shape: f64,
    #[serde(default = "default_gamma_scale")]
    pub scale: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            shape: default_gamma_shape(),
            scale: default_gamma_scale(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneticsConfig {
    /// Poisson mean of extra strains in a source infection.
    #[serde(default = "default_mean_coi")]
    pub mean_coi: f64,
    #[serde(default)]
    pub propagation: PropagationRule,
    #[serde(default)]
    pub alleles: AlleleTable,
}

impl Default for GeneticsConfig {
    fn default() -> Self {
        Self {
            mean_coi: default_mean_coi(),
            propagation: PropagationRule::default(),
            alleles: AlleleTable::default(),
        }
    }
}

/// How a child infection is derived from its parents' strains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropagationRule {
    Loss {
        #[serde(default = "default_loss_rate")]
        loss_rate: f64,
    },
    LossMutation {
        #[serde(default = "default_loss_rate")]
        loss_rate: f64,
        #[serde(default)]
        mutation_rate: f64,
    },
    Recombination {
        #[serde(default = "default_one")]
        mean_gametocytes: f64,
        #[serde(default = "default_one")]
        mean_oocysts: f64,
        #[serde(default = "default_one")]
        mean_transmitted: f64,
    },
}

impl Default for PropagationRule {
    fn default() -> Self {
        Self::Loss {
            loss_rate: default_loss_rate(),
        }
    }
}

/// Source allele-frequency table: generated uniform or listed per locus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AlleleTable {
    Uniform { loci: usize, alleles: usize },
    Explicit { frequencies: BTreeMap<String, Vec<f64>> },
}

impl Default for AlleleTable {
    fn default() -> Self {
        Self::Uniform {
            loci: 100,
            alleles: 15,
        }
    }
}

impl AlleleTable {
    /// Validated frequency table.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidDistribution`] or
    /// [`SimError::InvalidParameter`] for a malformed table.
    pub fn frequencies(&self) -> Result<AlleleFrequencies, SimError> {
        match self {
            Self::Uniform { loci, alleles } => AlleleFrequencies::uniform(*loci, *alleles),
            Self::Explicit { frequencies } => AlleleFrequencies::new(frequencies.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservationConfig {
    #[serde(default = "default_error_rate")]
    pub false_positive_rate: f64,
    #[serde(default = "default_error_rate")]
    pub false_negative_rate: f64,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            false_positive_rate: default_error_rate(),
            false_negative_rate: default_error_rate(),
        }
    }
}

const fn default_seed() -> u64 {
    25
}

const fn default_source_max() -> f64 {
    1000.0
}

const fn default_min_delay() -> f64 {
    9.0
}

const fn default_gamma_shape() -> f64 {
    9.0
}

const fn default_gamma_scale() -> f64 {
    10.0
}

const fn default_mean_coi() -> f64 {
    5.0
}

const fn default_loss_rate() -> f64 {
    0.1
}

const fn default_one() -> f64 {
    1.0
}

const fn default_error_rate() -> f64 {
    0.01
}

// Stream offsets from the base seed, one per process.
const SOURCE_TIME_STREAM: u64 = 1;
const TIME_PROPAGATION_STREAM: u64 = 2;
const DETECTION_STREAM: u64 = 3;
const SOURCE_GENETICS_STREAM: u64 = 4;
const GENETICS_PROPAGATION_STREAM: u64 = 5;
const OBSERVATION_STREAM: u64 = 6;

impl SimulationConfig {
    fn stream(&self, offset: u64) -> u64 {
        self.seed.wrapping_add(offset)
    }

    /// The allele table with the locus filter applied.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed table or a filter naming an unknown
    /// locus.
    pub fn allele_frequencies(&self) -> Result<AlleleFrequencies, SimError> {
        let table = self.genetics.alleles.frequencies()?;
        match &self.locus_filter {
            Some(filter) => table.restrict(filter),
            None => Ok(table),
        }
    }

    /// Instantiate every process this configuration describes.
    ///
    /// # Errors
    ///
    /// Returns the first parameter or allele-table error encountered.
    pub fn build_processes(&self) -> Result<ProcessSet, SimError> {
        let frequencies = self.allele_frequencies()?;
        let genetics_propagation: Box<dyn crate::process::GeneticsPropagation> =
            match self.genetics.propagation {
                PropagationRule::Loss { loss_rate } => Box::new(SimpleLossTransmission::new(
                    loss_rate,
                    self.stream(GENETICS_PROPAGATION_STREAM),
                )?),
                PropagationRule::LossMutation {
                    loss_rate,
                    mutation_rate,
                } => Box::new(LossMutationTransmission::new(
                    loss_rate,
                    mutation_rate,
                    self.stream(GENETICS_PROPAGATION_STREAM),
                )?),
                PropagationRule::Recombination {
                    mean_gametocytes,
                    mean_oocysts,
                    mean_transmitted,
                } => Box::new(RecombinationTransmission::new(
                    mean_gametocytes,
                    mean_oocysts,
                    mean_transmitted,
                    self.stream(GENETICS_PROPAGATION_STREAM),
                )?),
            };

        Ok(ProcessSet {
            source_time: Box::new(UniformSourceTime::new(
                self.timing.source_min,
                self.timing.source_max,
                self.stream(SOURCE_TIME_STREAM),
            )?),
            time_propagation: Box::new(UniformTransmissionTime::new(
                self.timing.min_delay,
                self.stream(TIME_PROPAGATION_STREAM),
            )?),
            detection: Box::new(GammaDetection::new(
                self.detection.shape,
                self.detection.scale,
                self.stream(DETECTION_STREAM),
            )?),
            source_genetics: Box::new(MultinomialSource::new(
                self.genetics.mean_coi,
                &frequencies,
                self.stream(SOURCE_GENETICS_STREAM),
            )?),
            genetics_propagation,
            observation: Box::new(SimpleObservation::new(
                self.observation.false_positive_rate,
                self.observation.false_negative_rate,
                self.stream(OBSERVATION_STREAM),
            )?),
        })
    }

    /// Outbreak generator for the `[network]` section.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidParameter`] for out-of-range rates.
    pub fn outbreak(&self) -> Result<OutbreakGenerator, SimError> {
        OutbreakGenerator::new(self.network)
    }

    /// Check every section before any run starts.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending section.
    pub fn validate(&self) -> Result<()> {
        self.network.validate().context("invalid [network] section")?;
        self.build_processes()
            .context("invalid process configuration")?;
        Ok(())
    }
}

/// Read and parse a configuration file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid TOML for
/// [`SimulationConfig`].
pub fn load_config(path: &Path) -> Result<SimulationConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<SimulationConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(content.as_bytes()).expect("write");
        file
    }

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.allele_frequencies().expect("table").len(), 100);
    }

    #[test]
    fn overflowing_detection_scale_fails_validation() {
        let mut config = SimulationConfig::default();
        config.detection.scale = 1e308;
        let err = config.validate().expect_err("mean duration overflows");
        assert!(
            err.chain()
                .filter_map(|e| e.downcast_ref::<SimError>())
                .any(|e| matches!(e, SimError::InvalidParameter { name: "mean_duration", .. }))
        );
    }

    #[test]
    fn unbounded_source_window_fails_validation() {
        let mut config = SimulationConfig::default();
        config.timing.source_min = -1e308;
        config.timing.source_max = 1e308;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_file_uses_defaults() {
        let file = write_config("");
        let config = load_config(file.path()).expect("load");
        assert_eq!(config, SimulationConfig::default());
    }

    #[test]
    fn sections_override_defaults() {
        let file = write_config(
            r#"
seed = 3
locus_filter = ["L1", "L2"]

[network]
founders = 2
r0 = 1.5

[genetics.propagation]
kind = "loss_mutation"
mutation_rate = 0.05

[genetics.alleles]
loci = 4
alleles = 3

[allowed_parents]
max_parents = 5
"#,
        );
        let config = load_config(file.path()).expect("load");
        assert_eq!(config.seed, 3);
        assert_eq!(config.network.founders, 2);
        assert_eq!(config.network.max_nodes, 100);
        assert_eq!(
            config.genetics.propagation,
            PropagationRule::LossMutation {
                loss_rate: 0.1,
                mutation_rate: 0.05
            }
        );
        assert_eq!(config.allowed_parents.max_parents, 5);
        assert!(!config.allowed_parents.force_true_parents);
        assert_eq!(config.allele_frequencies().expect("table").len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn explicit_allele_table_is_validated() {
        let file = write_config(
            r"
[genetics.alleles.frequencies]
L1 = [0.5, 0.6]
",
        );
        let config = load_config(file.path()).expect("load");
        assert!(matches!(
            config.allele_frequencies(),
            Err(SimError::InvalidDistribution { .. })
        ));
        assert!(config.validate().is_err());
    }

    #[test]
    fn filter_on_unknown_locus_fails_validation() {
        let config = SimulationConfig {
            locus_filter: Some(LocusFilter::new(["L999"])),
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_rates_fail_validation() {
        let mut config = SimulationConfig::default();
        config.observation.false_negative_rate = 2.0;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.network.r0 = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_config(&dir.path().join("nope.toml")).expect_err("missing");
        assert!(err.to_string().contains("Failed to read"));
    }
}
