//! Full-domain DPF evaluation throughput, `Naive` vs `IterSingleBatch`,
//! mirroring the teacher's `time_benchmark`'s `BenchmarkId`/`Throughput`
//! shape.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fsswm::fss::dpf::{DpfEvaluator, DpfKeyGenerator, DpfParameters, EvalType, OutputMode};
use rand::{rngs::StdRng, SeedableRng};

fn bench_full_domain(c: &mut Criterion) {
    let min_n = 8u32;
    let max_n = 16u32;

    let mut group = c.benchmark_group("dpf_full_domain");
    for n in min_n..=max_n {
        let domain = 1u64 << n;
        group.throughput(Throughput::Elements(domain));

        for eval_type in [EvalType::IterSingleBatch, EvalType::Naive] {
            let params = DpfParameters::new(n, 64, eval_type, OutputMode::ShiftedAdditive).unwrap();
            let mut rng = StdRng::seed_from_u64(n as u64);
            let generator = DpfKeyGenerator::new(params);
            let (key0, _key1) = generator.generate_keys(domain / 2, 1, &mut rng).unwrap();
            let evaluator = DpfEvaluator::new(params);

            group.bench_with_input(BenchmarkId::new(format!("{eval_type}"), n), &key0, |b, key| {
                b.iter(|| evaluator.full_domain(key).unwrap());
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_full_domain);
criterion_main!(benches);
