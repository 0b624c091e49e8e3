//! Genetic state carried by infection events.
//!
//! A *locus* is a named position tracked as an [`AlleleVector`]: one presence
//! flag per allele. A [`Strain`] holds one vector per locus and an
//! [`Infection`] is the ordered list of strains a node carries. Observed data
//! collapses the strains into one [`Genotype`].
//!
//! Loci are stored in `BTreeMap`s so every per-locus loop, and therefore every
//! random draw made inside one, happens in the same order on every run.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Tolerance used when checking that a frequency vector sums to one.
pub const FREQUENCY_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// AlleleVector
// ---------------------------------------------------------------------------

/// Presence/absence flags for every allele of one locus.
///
/// Serialized as a bit string such as `"1001"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AlleleVector(Vec<bool>);

impl AlleleVector {
    /// All alleles absent.
    #[must_use]
    pub fn absent(len: usize) -> Self {
        Self(vec![false; len])
    }

    /// Exactly allele `index` present.
    #[must_use]
    pub fn one_hot(len: usize, index: usize) -> Self {
        let mut v = vec![false; len];
        if let Some(slot) = v.get_mut(index) {
            *slot = true;
        }
        Self(v)
    }

    /// Number of alleles tracked at this locus.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the locus tracks no alleles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of alleles marked present.
    #[must_use]
    pub fn present_count(&self) -> usize {
        self.0.iter().filter(|a| **a).count()
    }

    /// Index of the first present allele.
    #[must_use]
    pub fn first_present(&self) -> Option<usize> {
        self.0.iter().position(|a| *a)
    }

    /// Presence flags as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    /// Mark every allele present in `other` as present here.
    pub fn union_with(&mut self, other: &Self) {
        if other.0.len() > self.0.len() {
            self.0.resize(other.0.len(), false);
        }
        for (slot, allele) in self.0.iter_mut().zip(&other.0) {
            *slot |= *allele;
        }
    }

    /// Number of positions whose presence differs.
    ///
    /// Positions past the end of the shorter vector count as absent.
    #[must_use]
    pub fn hamming(&self, other: &Self) -> u32 {
        let len = self.0.len().max(other.0.len());
        let at = |v: &[bool], i: usize| v.get(i).copied().unwrap_or(false);
        let diff = (0..len)
            .filter(|&i| at(&self.0, i) != at(&other.0, i))
            .count();
        u32::try_from(diff).unwrap_or(u32::MAX)
    }
}

impl From<Vec<bool>> for AlleleVector {
    fn from(v: Vec<bool>) -> Self {
        Self(v)
    }
}

impl From<AlleleVector> for String {
    fn from(v: AlleleVector) -> Self {
        v.to_string()
    }
}

impl TryFrom<String> for AlleleVector {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl std::str::FromStr for AlleleVector {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.chars()
            .map(|c| match c {
                '1' => Ok(true),
                '0' => Ok(false),
                other => Err(format!("invalid allele flag '{other}' in '{s}'")),
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl fmt::Display for AlleleVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for allele in &self.0 {
            f.write_str(if *allele { "1" } else { "0" })?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Strains, infections, genotypes
// ---------------------------------------------------------------------------

/// One complete set of per-locus allele vectors.
pub type Strain = BTreeMap<String, AlleleVector>;

/// Observed (or flattened) per-locus allele vectors of a node.
pub type Genotype = BTreeMap<String, AlleleVector>;

/// The strains co-infecting one node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Infection {
    strains: Vec<Strain>,
}

impl Infection {
    /// Wrap a list of strains.
    #[must_use]
    pub const fn new(strains: Vec<Strain>) -> Self {
        Self { strains }
    }

    /// Complexity of infection: the number of strains carried.
    #[must_use]
    pub fn coi(&self) -> usize {
        self.strains.len()
    }

    /// The carried strains in order.
    #[must_use]
    pub fn strains(&self) -> &[Strain] {
        &self.strains
    }

    /// Consume into the strain list.
    #[must_use]
    pub fn into_strains(self) -> Vec<Strain> {
        self.strains
    }

    /// OR-combine every strain into one vector per locus.
    ///
    /// The locus set is the union over strains.
    #[must_use]
    pub fn flatten(&self) -> Genotype {
        let mut out = Genotype::new();
        for strain in &self.strains {
            for (locus, alleles) in strain {
                out.entry(locus.clone())
                    .or_insert_with(|| AlleleVector::absent(alleles.len()))
                    .union_with(alleles);
            }
        }
        out
    }

    /// Keep only the loci in `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidLocusFilter`] naming `subject` when a
    /// strain lacks a requested locus.
    pub fn restrict(&self, filter: &LocusFilter, subject: &str) -> Result<Self> {
        let strains = self
            .strains
            .iter()
            .map(|strain| {
                filter
                    .iter()
                    .map(|locus| {
                        strain
                            .get(locus)
                            .map(|alleles| (locus.to_string(), alleles.clone()))
                            .ok_or_else(|| SimError::InvalidLocusFilter {
                                locus: locus.to_string(),
                                subject: subject.to_string(),
                            })
                    })
                    .collect::<Result<Strain>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { strains })
    }
}

// ---------------------------------------------------------------------------
// LocusFilter
// ---------------------------------------------------------------------------

/// A subset of loci applied uniformly to genetics, observation and distance.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocusFilter(BTreeSet<String>);

impl LocusFilter {
    /// Build a filter from locus names.
    pub fn new<I, S>(loci: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(loci.into_iter().map(Into::into).collect())
    }

    /// Locus names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(String::as_str)
    }

    /// Whether `locus` is selected.
    #[must_use]
    pub fn contains(&self, locus: &str) -> bool {
        self.0.contains(locus)
    }

    /// Number of selected loci.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no locus is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// AlleleFrequencies
// ---------------------------------------------------------------------------

/// Validated allele-frequency table: locus → probability vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Vec<f64>>", into = "BTreeMap<String, Vec<f64>>")]
pub struct AlleleFrequencies(BTreeMap<String, Vec<f64>>);

impl AlleleFrequencies {
    /// Validate and wrap a frequency table.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidDistribution`] when a vector is empty, has
    /// an entry outside `[0, 1]`, or does not sum to 1 within
    /// [`FREQUENCY_TOLERANCE`].
    pub fn new(table: BTreeMap<String, Vec<f64>>) -> Result<Self> {
        for (locus, freqs) in &table {
            validate_distribution(locus, freqs)?;
        }
        Ok(Self(table))
    }

    /// `loci` loci named `L1..Ln`, each with `alleles` equally likely alleles.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidParameter`] when `alleles` is zero.
    pub fn uniform(loci: usize, alleles: usize) -> Result<Self> {
        if alleles == 0 {
            return Err(SimError::InvalidParameter {
                name: "alleles",
                value: 0.0,
                reason: "each locus needs at least one allele",
            });
        }
        #[allow(clippy::cast_precision_loss)]
        let p = 1.0 / alleles as f64;
        let table = (1..=loci)
            .map(|i| (format!("L{i}"), vec![p; alleles]))
            .collect();
        Ok(Self(table))
    }

    /// Keep only the loci in `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidLocusFilter`] if the filter names a locus
    /// absent from the table.
    pub fn restrict(&self, filter: &LocusFilter) -> Result<Self> {
        filter
            .iter()
            .map(|locus| {
                self.0
                    .get(locus)
                    .map(|freqs| (locus.to_string(), freqs.clone()))
                    .ok_or_else(|| SimError::InvalidLocusFilter {
                        locus: locus.to_string(),
                        subject: "allele-frequency table".to_string(),
                    })
            })
            .collect::<Result<BTreeMap<_, _>>>()
            .map(Self)
    }

    /// Iterate `(locus, frequencies)` in locus order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> + '_ {
        self.0.iter().map(|(l, f)| (l.as_str(), f.as_slice()))
    }

    /// Frequencies for one locus.
    #[must_use]
    pub fn get(&self, locus: &str) -> Option<&[f64]> {
        self.0.get(locus).map(Vec::as_slice)
    }

    /// Number of loci.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table has no loci.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<BTreeMap<String, Vec<f64>>> for AlleleFrequencies {
    type Error = SimError;

    fn try_from(table: BTreeMap<String, Vec<f64>>) -> Result<Self> {
        Self::new(table)
    }
}

impl From<AlleleFrequencies> for BTreeMap<String, Vec<f64>> {
    fn from(freqs: AlleleFrequencies) -> Self {
        freqs.0
    }
}

fn validate_distribution(locus: &str, freqs: &[f64]) -> Result<()> {
    let invalid = |reason: String| SimError::InvalidDistribution {
        locus: locus.to_string(),
        reason,
    };

    if freqs.is_empty() {
        return Err(invalid("frequency vector is empty".to_string()));
    }
    if let Some(bad) = freqs.iter().find(|p| !(0.0..=1.0).contains(*p)) {
        return Err(invalid(format!("entry {bad} is outside [0, 1]")));
    }
    let total: f64 = freqs.iter().sum();
    if (total - 1.0).abs() > FREQUENCY_TOLERANCE {
        return Err(invalid(format!("frequencies sum to {total}, expected 1")));
    }
    Ok(())
}
