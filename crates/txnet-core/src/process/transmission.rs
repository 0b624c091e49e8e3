//! Genetic source and propagation processes.
//!
//! # Rules
//!
//! - [`MultinomialSource`]: `1 + Poisson(λ)` strains, each locus one-hot from
//!   the locus' allele frequencies.
//! - [`SimpleLossTransmission`]: pool every parent strain, keep one chosen
//!   uniformly, keep each other strain with probability `1 − loss_rate`.
//! - [`LossMutationTransmission`]: the loss rule followed by per-locus point
//!   mutation that moves the present allele to a different one.
//! - [`RecombinationTransmission`]: gametocytes sampled from the pool, oocysts
//!   from pairwise 50/50 per-locus recombination, then a Poisson number of
//!   transmitted copies per oocyst.

use rand::distributions::{Distribution, WeightedIndex};

use crate::error::{Result, SimError, ensure_non_negative, ensure_probability};
use crate::genetics::{AlleleFrequencies, AlleleVector, Infection, Strain};

use super::{GeneticsPropagation, ProcessRng, SourceGeneticsProcess};

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct LocusSampler {
    locus: String,
    alleles: usize,
    weights: WeightedIndex<f64>,
}

/// Root infections drawn from a source population.
#[derive(Debug, Clone)]
pub struct MultinomialSource {
    mean_coi: f64,
    loci: Vec<LocusSampler>,
    rng: ProcessRng,
}

impl MultinomialSource {
    /// `mean_coi` is the Poisson mean of *extra* strains beyond the first.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidParameter`] for a negative mean, or
    /// [`SimError::InvalidDistribution`] if a locus cannot be sampled.
    pub fn new(mean_coi: f64, frequencies: &AlleleFrequencies, seed: u64) -> Result<Self> {
        ensure_non_negative("mean_coi", mean_coi)?;
        let loci = frequencies
            .iter()
            .map(|(locus, freqs)| {
                WeightedIndex::new(freqs)
                    .map(|weights| LocusSampler {
                        locus: locus.to_string(),
                        alleles: freqs.len(),
                        weights,
                    })
                    .map_err(|e| SimError::InvalidDistribution {
                        locus: locus.to_string(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            mean_coi,
            loci,
            rng: ProcessRng::new(seed),
        })
    }
}

impl SourceGeneticsProcess for MultinomialSource {
    fn name(&self) -> &'static str {
        "multinomial_source"
    }

    fn sample(&mut self) -> Result<Infection> {
        let coi = self.rng.one_plus_poisson(self.mean_coi)?;
        let strains = (0..coi)
            .map(|_| {
                self.loci
                    .iter()
                    .map(|s| {
                        let idx = s.weights.sample(&mut self.rng);
                        (s.locus.clone(), AlleleVector::one_hot(s.alleles, idx))
                    })
                    .collect::<Strain>()
            })
            .collect();
        Ok(Infection::new(strains))
    }
}

// ---------------------------------------------------------------------------
// Loss-only propagation
// ---------------------------------------------------------------------------

/// Every strain of every parent, in parent order.
fn pooled_strains(parents: &[&Infection]) -> Result<Vec<Strain>> {
    let pool: Vec<Strain> = parents
        .iter()
        .flat_map(|inf| inf.strains().iter().cloned())
        .collect();
    if pool.is_empty() {
        return Err(SimError::EmptyStrainPool);
    }
    Ok(pool)
}

fn retain_with_loss(
    rng: &mut ProcessRng,
    mut pool: Vec<Strain>,
    loss_rate: f64,
) -> Result<Vec<Strain>> {
    let kept = pool.remove(rng.index(pool.len()).ok_or(SimError::EmptyStrainPool)?);
    let mut out = Vec::with_capacity(pool.len() + 1);
    out.push(kept);
    for strain in pool {
        if rng.bernoulli(1.0 - loss_rate) {
            out.push(strain);
        }
    }
    Ok(out)
}

/// Superinfection without mutation: strains are only ever lost.
#[derive(Debug, Clone)]
pub struct SimpleLossTransmission {
    loss_rate: f64,
    rng: ProcessRng,
}

impl SimpleLossTransmission {
    /// # Errors
    ///
    /// Returns [`SimError::InvalidParameter`] unless `loss_rate` is in `[0, 1]`.
    pub fn new(loss_rate: f64, seed: u64) -> Result<Self> {
        ensure_probability("loss_rate", loss_rate)?;
        Ok(Self {
            loss_rate,
            rng: ProcessRng::new(seed),
        })
    }
}

impl GeneticsPropagation for SimpleLossTransmission {
    fn name(&self) -> &'static str {
        "simple_loss"
    }

    fn propagate(&mut self, parents: &[&Infection]) -> Result<Infection> {
        let pool = pooled_strains(parents)?;
        Ok(Infection::new(retain_with_loss(
            &mut self.rng,
            pool,
            self.loss_rate,
        )?))
    }
}

// ---------------------------------------------------------------------------
// Loss with mutation
// ---------------------------------------------------------------------------

/// Loss rule followed by point mutation of each transmitted strain.
#[derive(Debug, Clone)]
pub struct LossMutationTransmission {
    loss_rate: f64,
    mutation_rate: f64,
    rng: ProcessRng,
}

impl LossMutationTransmission {
    /// # Errors
    ///
    /// Returns [`SimError::InvalidParameter`] unless both rates are in `[0, 1]`.
    pub fn new(loss_rate: f64, mutation_rate: f64, seed: u64) -> Result<Self> {
        ensure_probability("loss_rate", loss_rate)?;
        ensure_probability("mutation_rate", mutation_rate)?;
        Ok(Self {
            loss_rate,
            mutation_rate,
            rng: ProcessRng::new(seed),
        })
    }

    fn mutate(&mut self, strain: &mut Strain) {
        for alleles in strain.values_mut() {
            if !self.rng.bernoulli(self.mutation_rate) || alleles.len() < 2 {
                continue;
            }
            let len = alleles.len();
            let target = match alleles.first_present() {
                // Skip over the current allele so the draw always moves.
                Some(current) => self
                    .rng
                    .index(len - 1)
                    .map(|r| if r >= current { r + 1 } else { r }),
                None => self.rng.index(len),
            };
            if let Some(target) = target {
                *alleles = AlleleVector::one_hot(len, target);
            }
        }
    }
}

impl GeneticsPropagation for LossMutationTransmission {
    fn name(&self) -> &'static str {
        "loss_mutation"
    }

    fn propagate(&mut self, parents: &[&Infection]) -> Result<Infection> {
        let pool = pooled_strains(parents)?;
        let mut strains = retain_with_loss(&mut self.rng, pool, self.loss_rate)?;
        for strain in &mut strains {
            self.mutate(strain);
        }
        Ok(Infection::new(strains))
    }
}

// ---------------------------------------------------------------------------
// Recombination
// ---------------------------------------------------------------------------

/// Mosquito-stage recombination between co-transmitted strains.
#[derive(Debug, Clone)]
pub struct RecombinationTransmission {
    mean_gametocytes: f64,
    mean_oocysts: f64,
    mean_transmitted: f64,
    rng: ProcessRng,
}

impl RecombinationTransmission {
    /// Means are Poisson rates: gametocytes and oocysts get `1 + Poisson`,
    /// each oocyst transmits `Poisson(mean_transmitted)` copies.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidParameter`] for any negative mean.
    pub fn new(
        mean_gametocytes: f64,
        mean_oocysts: f64,
        mean_transmitted: f64,
        seed: u64,
    ) -> Result<Self> {
        ensure_non_negative("mean_gametocytes", mean_gametocytes)?;
        ensure_non_negative("mean_oocysts", mean_oocysts)?;
        ensure_non_negative("mean_transmitted", mean_transmitted)?;
        Ok(Self {
            mean_gametocytes,
            mean_oocysts,
            mean_transmitted,
            rng: ProcessRng::new(seed),
        })
    }

    fn pick(&mut self, strains: &[Strain]) -> Result<Strain> {
        self.rng
            .index(strains.len())
            .map(|i| strains[i].clone())
            .ok_or(SimError::EmptyStrainPool)
    }

    fn recombine(&mut self, a: &Strain, b: &Strain) -> Strain {
        a.iter()
            .map(|(locus, alleles)| {
                let from_b = self.rng.bernoulli(0.5);
                let chosen = if from_b {
                    b.get(locus).unwrap_or(alleles)
                } else {
                    alleles
                };
                (locus.clone(), chosen.clone())
            })
            .collect()
    }
}

impl GeneticsPropagation for RecombinationTransmission {
    fn name(&self) -> &'static str {
        "recombination"
    }

    fn propagate(&mut self, parents: &[&Infection]) -> Result<Infection> {
        let pool = pooled_strains(parents)?;

        let gametocyte_count = self.rng.one_plus_poisson(self.mean_gametocytes)?;
        let gametocytes = (0..gametocyte_count)
            .map(|_| self.pick(&pool))
            .collect::<Result<Vec<Strain>>>()?;

        let oocyst_count = self.rng.one_plus_poisson(self.mean_oocysts)?;
        let mut oocysts = Vec::with_capacity(oocyst_count);
        for _ in 0..oocyst_count {
            let a = self.pick(&gametocytes)?;
            let b = self.pick(&gametocytes)?;
            oocysts.push(self.recombine(&a, &b));
        }

        let mut transmitted: Vec<Strain> = Vec::new();
        for oocyst in &oocysts {
            let copies = self.rng.poisson(self.mean_transmitted)?;
            if copies > 0 && !transmitted.contains(oocyst) {
                transmitted.push(oocyst.clone());
            }
        }
        if transmitted.is_empty() {
            transmitted.push(self.pick(&oocysts)?);
        }
        Ok(Infection::new(transmitted))
    }
}
