use proptest::prelude::*;

use txnet_core::process::{GammaDetection, UniformSourceTime, UniformTransmissionTime};
use txnet_core::{
    AllowedParentsConfig, AlleleVector, DistanceEngine, EntityStore, Genotype, LocusFilter,
    NetworkGraph, SimulationDriver, pairwise_distance,
};

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Random DAG: edges only go from a lower to a higher node number, then the
/// edge list is shuffled so registration order differs from numbering.
fn arb_dag() -> impl Strategy<Value = NetworkGraph> {
    (2_usize..12)
        .prop_flat_map(|n| {
            let pairs: Vec<(usize, usize)> = (0..n)
                .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
                .collect();
            let len = pairs.len();
            proptest::sample::subsequence(pairs, 0..=len).prop_shuffle()
        })
        .prop_map(|edges| {
            let labels: Vec<(String, String)> = edges
                .into_iter()
                .map(|(i, j)| (format!("n{i}"), format!("n{j}")))
                .collect();
            NetworkGraph::from_edges(labels.iter().map(|(a, b)| (a.as_str(), b.as_str())))
        })
}

fn arb_genotype(loci: usize, alleles: usize) -> impl Strategy<Value = Genotype> {
    proptest::collection::vec(proptest::collection::vec(any::<bool>(), alleles), loci).prop_map(
        |rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, bits)| (format!("L{}", i + 1), AlleleVector::from(bits)))
                .collect()
        },
    )
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(256))]

    #[test]
    fn topological_order_is_a_valid_permutation(graph in arb_dag()) {
        let order = graph.topological_order().expect("acyclic by construction");
        prop_assert_eq!(order.len(), graph.node_count());

        let position = |label: &str| order.iter().position(|n| n == label);
        for (parent, child) in graph.edges() {
            prop_assert!(position(parent) < position(child));
        }
    }

    #[test]
    fn child_time_never_precedes_any_parent(graph in arb_dag(), seed in any::<u64>()) {
        let mut driver = SimulationDriver::new();
        driver
            .generate_timing(
                &graph,
                &mut UniformSourceTime::new(0.0, 50.0, seed).expect("source"),
                &mut UniformTransmissionTime::new(2.0, seed ^ 1).expect("propagation"),
                &mut GammaDetection::new(3.0, 4.0, seed ^ 2).expect("detection"),
            )
            .expect("timing");
        let store = driver.store();
        for node in graph.nodes() {
            let t = store.infection_time(node).expect("time");
            prop_assert!(store.infection_duration(node).expect("duration") > 0.0);
            for parent in graph.distinct_parents(node).expect("known") {
                prop_assert!(t >= store.infection_time(parent).expect("parent time"));
            }
        }
    }

    #[test]
    fn distance_is_symmetric_with_zero_self_distance(
        a in arb_genotype(6, 5),
        b in arb_genotype(6, 5),
    ) {
        prop_assert_eq!(pairwise_distance(&a, &a, None).expect("d"), 0);
        prop_assert_eq!(
            pairwise_distance(&a, &b, None).expect("d"),
            pairwise_distance(&b, &a, None).expect("d")
        );
        if pairwise_distance(&a, &b, None).expect("d") == 0 {
            prop_assert_eq!(&a, &b);
        }
    }

    #[test]
    fn distance_grows_with_the_locus_set(
        a in arb_genotype(6, 5),
        b in arb_genotype(6, 5),
        keep in 0_usize..=6,
    ) {
        let smaller = LocusFilter::new((1..=keep).map(|i| format!("L{i}")));
        let larger = LocusFilter::new((1..=6).map(|i| format!("L{i}")));
        let d_small = pairwise_distance(&a, &b, Some(&smaller)).expect("d");
        let d_large = pairwise_distance(&a, &b, Some(&larger)).expect("d");
        prop_assert!(d_small <= d_large);
    }

    #[test]
    fn allowed_parents_are_bounded_and_sorted(
        genotypes in proptest::collection::vec(arb_genotype(3, 4), 1..10),
        max_parents in 0_usize..6,
    ) {
        let mut store = EntityStore::new();
        let labels: Vec<String> = (0..genotypes.len()).map(|i| format!("n{i}")).collect();
        for (label, g) in labels.iter().zip(genotypes) {
            store.record_observation(label, g).expect("write");
        }
        let config = AllowedParentsConfig { max_parents, force_true_parents: false };
        let allowed = DistanceEngine::new(&store)
            .allowed_parents(&labels, &config, None)
            .expect("allowed parents");

        for label in &labels {
            let candidates = &allowed[label];
            prop_assert_eq!(candidates.len(), max_parents.min(labels.len() - 1));
            prop_assert!(candidates.iter().all(|c| &c.node != label));
            prop_assert!(candidates.windows(2).all(|w| w[0].distance <= w[1].distance));
        }
    }
}
