use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use txnet_core::process::{
    MultinomialSource, ObservationProcess, SimpleObservation, SourceGeneticsProcess,
};
use txnet_core::{AlleleFrequencies, AllowedParentsConfig, DistanceEngine, EntityStore};

const SIZES: [usize; 3] = [50, 200, 800];

fn observed_store(nodes: usize) -> (EntityStore, Vec<String>) {
    let freqs = AlleleFrequencies::uniform(100, 15).expect("table");
    let mut source = MultinomialSource::new(2.0, &freqs, 0x7E57).expect("source");
    let mut observation = SimpleObservation::new(0.01, 0.01, 0x7E58).expect("observation");
    let mut store = EntityStore::new();
    let labels: Vec<String> = (1..=nodes).map(|i| i.to_string()).collect();
    for label in &labels {
        let infection = source.sample().expect("sample");
        let genotype = observation.observe(&infection).expect("observe");
        store.record_observation(label, genotype).expect("write");
    }
    (store, labels)
}

fn bench_allowed_parents(c: &mut Criterion) {
    let mut group = c.benchmark_group("distance.allowed_parents");
    let config = AllowedParentsConfig {
        max_parents: 15,
        force_true_parents: false,
    };

    for size in SIZES {
        let (store, labels) = observed_store(size);
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &labels, |b, labels| {
            b.iter(|| {
                let allowed = DistanceEngine::new(&store)
                    .allowed_parents(labels, &config, None)
                    .expect("allowed parents");
                black_box(allowed.len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_allowed_parents);
criterion_main!(benches);
