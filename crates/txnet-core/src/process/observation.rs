use crate::error::{Result, ensure_probability};
use crate::genetics::{AlleleVector, Genotype, Infection};

use super::{ObservationProcess, ProcessRng};

/// Per-allele false-positive / false-negative observation noise.
///
/// Strains are OR-flattened per locus first; each present allele is then
/// dropped with probability `false_negative_rate` and each absent allele is
/// called with probability `false_positive_rate`.
#[derive(Debug, Clone)]
pub struct SimpleObservation {
    false_positive_rate: f64,
    false_negative_rate: f64,
    rng: ProcessRng,
}

impl SimpleObservation {
    /// # Errors
    ///
    /// Returns [`crate::SimError::InvalidParameter`] unless both rates are in
    /// `[0, 1]`.
    pub fn new(false_positive_rate: f64, false_negative_rate: f64, seed: u64) -> Result<Self> {
        ensure_probability("false_positive_rate", false_positive_rate)?;
        ensure_probability("false_negative_rate", false_negative_rate)?;
        Ok(Self {
            false_positive_rate,
            false_negative_rate,
            rng: ProcessRng::new(seed),
        })
    }
}

impl ObservationProcess for SimpleObservation {
    fn name(&self) -> &'static str {
        "simple_observation"
    }

    fn observe(&mut self, infection: &Infection) -> Result<Genotype> {
        let flat = infection.flatten();
        let mut out = Genotype::new();
        for (locus, alleles) in flat {
            let observed: Vec<bool> = alleles
                .as_slice()
                .iter()
                .map(|&present| {
                    if present {
                        self.rng.bernoulli(1.0 - self.false_negative_rate)
                    } else {
                        self.rng.bernoulli(self.false_positive_rate)
                    }
                })
                .collect();
            out.insert(locus, AlleleVector::from(observed));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genetics::Strain;

    fn infection() -> Infection {
        let s1: Strain = [("L1".to_string(), "1000".parse().expect("bits"))].into();
        let s2: Strain = [("L1".to_string(), "0010".parse().expect("bits"))].into();
        Infection::new(vec![s1, s2])
    }

    #[test]
    fn noiseless_observation_is_the_flattened_genotype() {
        let mut op = SimpleObservation::new(0.0, 0.0, 1).expect("valid");
        let g = op.observe(&infection()).expect("observe");
        assert_eq!(g["L1"].to_string(), "1010");
    }

    #[test]
    fn certain_noise_inverts_every_allele() {
        let mut op = SimpleObservation::new(1.0, 1.0, 1).expect("valid");
        let g = op.observe(&infection()).expect("observe");
        assert_eq!(g["L1"].to_string(), "0101");
    }

    #[test]
    fn rates_are_validated() {
        assert!(SimpleObservation::new(-0.1, 0.0, 0).is_err());
        assert!(SimpleObservation::new(0.0, 1.1, 0).is_err());
    }
}
