//! Serializable per-node and per-edge views of a finished run.
//!
//! These are plain data: the caller decides how to write them out.

use serde::Serialize;

use crate::distance::{AllowedParents, Candidate};
use crate::error::{Result, SimError};
use crate::genetics::{AlleleFrequencies, Genotype, Infection};
use crate::graph::NetworkGraph;
use crate::store::EntityStore;

/// Everything known about one node after all passes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    pub id: String,
    pub latent_genotype: Infection,
    pub observed_genotype: Genotype,
    pub infection_time: f64,
    pub infection_duration: f64,
    pub observation_time: f64,
    pub allowed_parents: Vec<Candidate>,
    /// Every other node of the graph that is not an allowed parent, in
    /// registration order.
    pub disallowed_parents: Vec<String>,
}

/// A transmission edge `from → to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeRecord {
    pub from: String,
    pub to: String,
}

/// Allele-frequency summary for one locus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocusRecord {
    pub locus: String,
    pub allele_freqs: Vec<f64>,
    pub num_alleles: usize,
}

/// Full output of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    /// BLAKE3 fingerprint of the input graph.
    pub network_hash: String,
    pub loci: Vec<LocusRecord>,
    pub nodes: Vec<NodeRecord>,
    pub network: Vec<EdgeRecord>,
}

impl NodeRecord {
    /// Assemble the record for `node` from a fully populated store.
    ///
    /// Nodes missing from `allowed` get an empty candidate list, so every
    /// other node of `graph` is disallowed.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::MissingState`] naming the first table without a
    /// record for `node`.
    pub fn from_store(
        store: &EntityStore,
        graph: &NetworkGraph,
        node: &str,
        allowed: &AllowedParents,
    ) -> Result<Self> {
        let missing = |table: &'static str| SimError::MissingState {
            table,
            node: node.to_string(),
        };
        let infection_time = store
            .infection_time(node)
            .ok_or_else(|| missing("infection_time"))?;
        let infection_duration = store
            .infection_duration(node)
            .ok_or_else(|| missing("infection_duration"))?;
        let latent_genotype = store
            .infection(node)
            .cloned()
            .ok_or_else(|| missing("infection"))?;
        let observed_genotype = store
            .observed_genotype(node)
            .cloned()
            .ok_or_else(|| missing("observed_genotype"))?;

        let allowed_parents = allowed.get(node).cloned().unwrap_or_default();
        let disallowed_parents = graph
            .nodes()
            .filter(|other| *other != node && !allowed_parents.iter().any(|c| c.node == *other))
            .map(ToString::to_string)
            .collect();

        Ok(Self {
            id: node.to_string(),
            latent_genotype,
            observed_genotype,
            infection_time,
            infection_duration,
            observation_time: infection_time + infection_duration,
            allowed_parents,
            disallowed_parents,
        })
    }
}

/// Edge list of `graph` in insertion order.
#[must_use]
pub fn edge_records(graph: &NetworkGraph) -> Vec<EdgeRecord> {
    graph
        .edges()
        .into_iter()
        .map(|(from, to)| EdgeRecord {
            from: from.to_string(),
            to: to.to_string(),
        })
        .collect()
}

/// One record per locus, in locus order.
#[must_use]
pub fn locus_records(frequencies: &AlleleFrequencies) -> Vec<LocusRecord> {
    frequencies
        .iter()
        .map(|(locus, freqs)| LocusRecord {
            locus: locus.to_string(),
            allele_freqs: freqs.to_vec(),
            num_alleles: freqs.len(),
        })
        .collect()
}

impl SimulationReport {
    /// Build the report for every node of `graph`, in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::MissingState`] if any pass did not cover a node.
    pub fn assemble(
        graph: &NetworkGraph,
        store: &EntityStore,
        frequencies: &AlleleFrequencies,
        allowed: &AllowedParents,
    ) -> Result<Self> {
        let nodes = graph
            .nodes()
            .map(|node| NodeRecord::from_store(store, graph, node, allowed))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            network_hash: graph.content_hash(),
            loci: locus_records(frequencies),
            nodes,
            network: edge_records(graph),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genetics::Strain;

    fn populated() -> (NetworkGraph, EntityStore) {
        let graph = NetworkGraph::from_edges([("a", "b")]);
        let mut store = EntityStore::new();
        let strain: Strain = [("L1".to_string(), "01".parse().expect("bits"))].into();
        for (node, t) in [("a", 1.0), ("b", 4.0)] {
            store.record_timing(node, t, 2.5).expect("timing");
            let infection = Infection::new(vec![strain.clone()]);
            store
                .record_observation(node, infection.flatten())
                .expect("observation");
            store.record_infection(node, infection).expect("infection");
        }
        (graph, store)
    }

    #[test]
    fn node_record_derives_observation_time() {
        let (graph, store) = populated();
        let record =
            NodeRecord::from_store(&store, &graph, "b", &AllowedParents::new()).expect("record");
        assert!((record.observation_time - 6.5).abs() < f64::EPSILON);
        assert!(record.allowed_parents.is_empty());
        assert_eq!(record.disallowed_parents, vec!["a".to_string()]);
        assert_eq!(record.latent_genotype.coi(), 1);
    }

    #[test]
    fn disallowed_parents_complement_the_allowed_list() {
        let (graph, store) = populated();
        let allowed: AllowedParents = [(
            "a".to_string(),
            vec![Candidate {
                node: "b".into(),
                distance: 0,
            }],
        )]
        .into();
        let record = NodeRecord::from_store(&store, &graph, "a", &allowed).expect("record");
        assert_eq!(record.allowed_parents.len(), 1);
        assert!(record.disallowed_parents.is_empty());
    }

    #[test]
    fn missing_table_is_named() {
        let store = EntityStore::new();
        let graph = NetworkGraph::new();
        let err = NodeRecord::from_store(&store, &graph, "x", &AllowedParents::new())
            .expect_err("empty");
        assert_eq!(
            err,
            SimError::MissingState {
                table: "infection_time",
                node: "x".into()
            }
        );
    }

    #[test]
    fn report_serializes_with_expected_keys() {
        let (graph, store) = populated();
        let freqs = AlleleFrequencies::uniform(1, 2).expect("freqs");
        let report =
            SimulationReport::assemble(&graph, &store, &freqs, &AllowedParents::new()).expect("report");
        let json = serde_json::to_value(&report).expect("json");
        assert_eq!(json["network"][0]["from"], "a");
        assert_eq!(json["network"][0]["to"], "b");
        assert_eq!(json["loci"][0]["num_alleles"], 2);
        assert_eq!(json["nodes"][1]["id"], "b");
        assert_eq!(json["nodes"][1]["observed_genotype"]["L1"], "01");
        assert!(json["network_hash"].as_str().expect("hash").starts_with("blake3:"));
    }
}
