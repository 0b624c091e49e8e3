//! Genetic distance and candidate-parent ranking.
//!
//! # Distance
//!
//! The only distance used anywhere is the Hamming distance between observed
//! genotypes: the number of allele positions whose presence differs, summed
//! over the compared loci. Without a filter the compared loci are those
//! present in both genotypes; with a filter every listed locus must exist on
//! both sides.
//!
//! # Allowed parents
//!
//! [`DistanceEngine::allowed_parents`] builds the full pairwise matrix and
//! keeps, for every node, the `max_parents` nearest other nodes in ascending
//! distance. Ties keep the order of the input node list. The optional
//! force-include mode adds a node's real parents after truncation; it exists
//! for evaluation harnesses and is off unless asked for.
//!
//! The matrix rows are computed in parallel with rayon. Results are gathered
//! in input order, so output does not depend on thread scheduling.

#![allow(clippy::module_name_repetitions)]

use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{Result, SimError};
use crate::genetics::{Genotype, LocusFilter};
use crate::graph::NetworkGraph;
use crate::store::EntityStore;

// ---------------------------------------------------------------------------
// Pairwise distance
// ---------------------------------------------------------------------------

/// Hamming distance between two observed genotypes.
///
/// Zero over an empty locus set.
///
/// # Errors
///
/// Returns [`SimError::InvalidLocusFilter`] if `loci` names a locus missing
/// from either genotype (`subject` is `"left"` or `"right"`).
pub fn pairwise_distance(a: &Genotype, b: &Genotype, loci: Option<&LocusFilter>) -> Result<u32> {
    match loci {
        Some(filter) => {
            let mut total = 0_u32;
            for locus in filter.iter() {
                let left = lookup(a, locus, "left")?;
                let right = lookup(b, locus, "right")?;
                total = total.saturating_add(left.hamming(right));
            }
            Ok(total)
        }
        None => Ok(a
            .iter()
            .filter_map(|(locus, left)| b.get(locus).map(|right| left.hamming(right)))
            .fold(0_u32, u32::saturating_add)),
    }
}

fn lookup<'g>(
    genotype: &'g Genotype,
    locus: &str,
    subject: &str,
) -> Result<&'g crate::genetics::AlleleVector> {
    genotype
        .get(locus)
        .ok_or_else(|| SimError::InvalidLocusFilter {
            locus: locus.to_string(),
            subject: subject.to_string(),
        })
}

// ---------------------------------------------------------------------------
// DistanceMatrix
// ---------------------------------------------------------------------------

/// Symmetric all-pairs distance matrix over a node list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceMatrix {
    labels: Vec<String>,
    index: HashMap<String, usize>,
    values: Vec<u32>,
}

impl DistanceMatrix {
    /// Node labels in input order.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the matrix covers no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Distance between the nodes at positions `i` and `j`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    #[must_use]
    pub fn at(&self, i: usize, j: usize) -> u32 {
        self.values[i * self.labels.len() + j]
    }

    /// Distance between two labelled nodes, if both are covered.
    #[must_use]
    pub fn get(&self, a: &str, b: &str) -> Option<u32> {
        Some(self.at(*self.index.get(a)?, *self.index.get(b)?))
    }
}

// ---------------------------------------------------------------------------
// Allowed parents
// ---------------------------------------------------------------------------

/// How candidate-parent lists are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllowedParentsConfig {
    /// Maximum number of nearest candidates kept per node.
    pub max_parents: usize,
    /// Append each node's true parents when they fall outside the top
    /// `max_parents`. Requires the true graph.
    pub force_true_parents: bool,
}

impl Default for AllowedParentsConfig {
    fn default() -> Self {
        Self {
            max_parents: 15,
            force_true_parents: false,
        }
    }
}

/// One ranked candidate parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub node: String,
    pub distance: u32,
}

/// Node label → candidates, ascending by distance.
pub type AllowedParents = BTreeMap<String, Vec<Candidate>>;

/// Candidate-parent lists for `nodes` from the observed genotypes in `store`.
///
/// Shorthand for [`DistanceEngine::allowed_parents`].
///
/// # Errors
///
/// See [`DistanceEngine::allowed_parents`].
pub fn build_allowed_parents<S>(
    store: &EntityStore,
    nodes: &[S],
    config: &AllowedParentsConfig,
    true_edges: Option<&NetworkGraph>,
    loci: Option<&LocusFilter>,
) -> Result<AllowedParents>
where
    S: AsRef<str> + Sync,
{
    DistanceEngine::with_loci(store, loci).allowed_parents(nodes, config, true_edges)
}

// ---------------------------------------------------------------------------
// DistanceEngine
// ---------------------------------------------------------------------------

/// Distance queries over the observed genotypes of a populated store.
#[derive(Debug, Clone, Copy)]
pub struct DistanceEngine<'a> {
    store: &'a EntityStore,
    loci: Option<&'a LocusFilter>,
}

impl<'a> DistanceEngine<'a> {
    /// Engine comparing every shared locus.
    #[must_use]
    pub const fn new(store: &'a EntityStore) -> Self {
        Self { store, loci: None }
    }

    /// Engine comparing only the loci in `filter`.
    #[must_use]
    pub const fn with_loci(store: &'a EntityStore, filter: Option<&'a LocusFilter>) -> Self {
        Self {
            store,
            loci: filter,
        }
    }

    /// Distance between two nodes' observed genotypes.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::MissingState`] if either node was not observed,
    /// or [`SimError::InvalidLocusFilter`] naming the node lacking a locus.
    pub fn distance(&self, a: &str, b: &str) -> Result<u32> {
        let ga = self.genotype(a)?;
        let gb = self.genotype(b)?;
        self.check_loci(a, ga)?;
        self.check_loci(b, gb)?;
        pairwise_distance(ga, gb, self.loci)
    }

    /// All-pairs distance matrix over `nodes`.
    ///
    /// # Errors
    ///
    /// Same as [`DistanceEngine::distance`], checked for every node up front,
    /// plus [`SimError::DuplicateNode`] if a label appears twice in `nodes`.
    #[instrument(skip_all, fields(nodes = nodes.len()))]
    pub fn matrix<S>(&self, nodes: &[S]) -> Result<DistanceMatrix>
    where
        S: AsRef<str> + Sync,
    {
        let labels: Vec<String> = nodes.iter().map(|n| n.as_ref().to_string()).collect();
        let mut index = HashMap::with_capacity(labels.len());
        for (i, label) in labels.iter().enumerate() {
            if index.insert(label.clone(), i).is_some() {
                return Err(SimError::DuplicateNode {
                    table: "distance_matrix",
                    node: label.clone(),
                });
            }
        }

        let genotypes = labels
            .iter()
            .map(|label| {
                let g = self.genotype(label)?;
                self.check_loci(label, g)?;
                Ok(g)
            })
            .collect::<Result<Vec<&Genotype>>>()?;

        let n = labels.len();
        let loci = self.loci;
        let upper: Vec<Vec<u32>> = (0..n)
            .into_par_iter()
            .map(|i| {
                ((i + 1)..n)
                    .map(|j| pairwise_distance(genotypes[i], genotypes[j], loci))
                    .collect::<Result<Vec<u32>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        let mut values = vec![0_u32; n * n];
        for (i, row) in upper.into_iter().enumerate() {
            for (offset, d) in row.into_iter().enumerate() {
                let j = i + 1 + offset;
                values[i * n + j] = d;
                values[j * n + i] = d;
            }
        }

        debug!(nodes = n, comparisons = n * n.saturating_sub(1) / 2, "distance matrix built");
        Ok(DistanceMatrix {
            labels,
            index,
            values,
        })
    }

    /// Ranked candidate-parent lists for every node in `nodes`.
    ///
    /// Each list holds at most `config.max_parents` other nodes, nearest
    /// first. With `config.force_true_parents` the node's distinct parents in
    /// `true_edges` are appended when missing and the list is re-sorted.
    ///
    /// # Errors
    ///
    /// - [`SimError::InvalidParameter`] if forcing is requested without
    ///   `true_edges`.
    /// - [`SimError::UnknownNode`] if a node is absent from `true_edges`.
    /// - Any error from [`DistanceEngine::matrix`].
    #[instrument(skip_all, fields(nodes = nodes.len(), max_parents = config.max_parents, forced = config.force_true_parents))]
    pub fn allowed_parents<S>(
        &self,
        nodes: &[S],
        config: &AllowedParentsConfig,
        true_edges: Option<&NetworkGraph>,
    ) -> Result<AllowedParents>
    where
        S: AsRef<str> + Sync,
    {
        let truth = match (config.force_true_parents, true_edges) {
            (false, _) => None,
            (true, Some(graph)) => Some(graph),
            (true, None) => {
                return Err(SimError::InvalidParameter {
                    name: "force_true_parents",
                    value: 1.0,
                    reason: "forcing true parents requires the true transmission graph",
                });
            }
        };

        let matrix = self.matrix(nodes)?;
        let n = matrix.len();
        let mut out = AllowedParents::new();
        let mut forced_total = 0_usize;

        for (i, label) in matrix.labels().iter().enumerate() {
            let mut candidates: Vec<Candidate> = (0..n)
                .filter(|&j| j != i)
                .map(|j| Candidate {
                    node: matrix.labels()[j].clone(),
                    distance: matrix.at(i, j),
                })
                .collect();
            candidates.sort_by_key(|c| c.distance);
            candidates.truncate(config.max_parents);

            if let Some(graph) = truth {
                for parent in graph.distinct_parents(label)? {
                    if candidates.iter().any(|c| c.node == parent) {
                        continue;
                    }
                    let distance = match matrix.get(label, parent) {
                        Some(d) => d,
                        None => self.distance(label, parent)?,
                    };
                    candidates.push(Candidate {
                        node: parent.to_string(),
                        distance,
                    });
                    forced_total += 1;
                }
                candidates.sort_by_key(|c| c.distance);
            }

            out.insert(label.clone(), candidates);
        }

        debug!(nodes = n, forced_total, "allowed parents built");
        Ok(out)
    }

    fn genotype(&self, node: &str) -> Result<&'a Genotype> {
        self.store.observations().state(node)
    }

    fn check_loci(&self, node: &str, genotype: &Genotype) -> Result<()> {
        if let Some(filter) = self.loci {
            if let Some(missing) = filter.iter().find(|l| !genotype.contains_key(*l)) {
                return Err(SimError::InvalidLocusFilter {
                    locus: missing.to_string(),
                    subject: node.to_string(),
                });
            }
        }
        Ok(())
    }
}
