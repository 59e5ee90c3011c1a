//! Throughput of the evaluation pipeline.
//!
//! 1. Model compilation (N-stage chains)
//! 2. Exact hypervolume (2 and 3 objectives)
//! 3. Uncached oracle evaluation with the analytic verifier
//! 4. A short NSGA-II run

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::prelude::*;

use tempora::indicator::{hypervolume, igd_plus};
use tempora::search::{run, Algorithm, SearchSettings};
use tempora::verifier::AnalyticVerifier;
use tempora::{compile, parse_model, Oracle, TimingModel};

/// A periodic sensor feeding `stages - 1` event-triggered stages.
fn chain_model(stages: usize) -> TimingModel {
    let mut components = vec![r#"{ "id": "S0", "period": "100ms", "wcet": "4ms", "priority": 0 }"#.to_string()];
    let mut connections = Vec::new();
    for i in 1..stages {
        components.push(format!(
            r#"{{ "id": "S{}", "wcet": "3ms", "priority": {} }}"#,
            i, i
        ));
        connections.push(format!(
            r#"{{ "source": "S{}.out", "target": "S{}.in", "latency_budget": "20ms" }}"#,
            i - 1,
            i
        ));
    }
    let source = format!(
        r#"{{
  "components": [{}],
  "connections": [{}],
  "properties": [
    {{ "id": "Pipeline", "stimulus": "S0", "response": "S{}", "within": "{}ms" }}
  ],
  "optimisation": {{
    "variables": [ {{ "target": "S0.period", "lo": "40ms", "hi": "200ms" }} ],
    "objectives": [
      {{ "direction": "min", "metric": "max_core_utilisation" }},
      {{ "direction": "min", "metric": "worst_end2end_latency" }}
    ],
    "constraints": ["property_violations == 0"]
  }}
}}"#,
        components.join(", "),
        connections.join(", "),
        stages - 1,
        stages * 10
    );
    match parse_model(&source) {
        Ok(m) => m,
        Err(e) => panic!("bench model does not load: {}", e),
    }
}

fn random_front(n: usize, m: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    (0..n)
        .map(|_| {
            let raw: Vec<f64> = (0..m).map(|_| rng.gen_range(0.05..1.0)).collect();
            let norm = raw.iter().map(|x| x * x).sum::<f64>().sqrt();
            raw.iter().map(|x| x / norm).collect()
        })
        .collect()
}

fn bench_compile(c: &mut Criterion) {
    let small = chain_model(4);
    let large = chain_model(32);

    let mut group = c.benchmark_group("compile");
    group.bench_function("4_stages", |b| b.iter(|| compile(black_box(&small))));
    group.bench_function("32_stages", |b| b.iter(|| compile(black_box(&large))));
    group.finish();
}

fn bench_indicators(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(1);
    let front2 = random_front(100, 2, &mut rng);
    let front3 = random_front(50, 3, &mut rng);
    let shifted: Vec<Vec<f64>> = front2.iter().map(|p| p.iter().map(|x| x + 0.01).collect()).collect();

    let mut group = c.benchmark_group("indicators");
    group.bench_function("hv_2d_100", |b| {
        b.iter(|| hypervolume(black_box(&front2), &[1.1, 1.1]))
    });
    group.bench_function("hv_3d_50", |b| {
        b.iter(|| hypervolume(black_box(&front3), &[1.1, 1.1, 1.1]))
    });
    group.bench_function("igd_plus_100", |b| {
        b.iter(|| igd_plus(black_box(&shifted), black_box(&front2)))
    });
    group.finish();
}

fn bench_oracle(c: &mut Criterion) {
    let model = chain_model(8);
    c.bench_function("oracle_uncached_8_stages", |b| {
        b.iter_batched(
            || match Oracle::new(model.clone(), Box::new(AnalyticVerifier::new()), 1) {
                Ok(o) => o,
                Err(e) => panic!("{}", e),
            },
            |oracle| oracle.evaluate(black_box(&[120.0])),
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_search(c: &mut Criterion) {
    let model = chain_model(6);
    let settings = SearchSettings {
        algorithm: Algorithm::Nsga2,
        population: 16,
        generations: 5,
        seed: 9,
        plateau_window: 0,
        ..SearchSettings::default()
    };
    let mut group = c.benchmark_group("search");
    group.sample_size(10);
    group.bench_function("nsga2_16x5", |b| {
        b.iter(|| {
            let oracle = match Oracle::new(model.clone(), Box::new(AnalyticVerifier::new()), 2) {
                Ok(o) => o,
                Err(e) => panic!("{}", e),
            };
            run(&oracle, settings.clone())
        })
    });
    group.finish();
}

criterion_group!(benches, bench_compile, bench_indicators, bench_oracle, bench_search);
criterion_main!(benches);
