//! Benchmarks for the structured-coalescent propagation, the per-iteration
//! cost that dominates the chain.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use migsurf::model::likelihood::expected_sharing;
use migsurf::model::{Generator, Propagator, Quadrature, RateFields};
use migsurf::utils::PropagatorWorkspace;
use migsurf::Graph;

fn bench_sidje(c: &mut Criterion) {
    let mut group = c.benchmark_group("sidje");
    for (rows, cols) in [(3, 3), (4, 5), (5, 8)] {
        let graph = Graph::grid(rows, cols, vec![0]).unwrap();
        let d = graph.n_demes();
        let rates = RateFields::uniform(d, 0.1, 1e-3);
        let gen = Generator::new(&graph, &rates);
        let quad = Quadrature::for_block_sharing(30, 1e-8, 4e6).unwrap();
        let mut ws = PropagatorWorkspace::new(gen.n_states(), 20, quad.len(), d);
        let propagator = Propagator::new(20);

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{d}demes")),
            &d,
            |b, _| {
                b.iter(|| {
                    propagator
                        .sidje(&gen, black_box(quad.times()), &mut ws)
                        .unwrap();
                    expected_sharing(d, &quad, 3e9, &mut ws).unwrap();
                    black_box(ws.lambda[(0, 0)])
                })
            },
        );
    }
    group.finish();
}

fn bench_quadrature_orders(c: &mut Criterion) {
    let graph = Graph::grid(4, 4, vec![0]).unwrap();
    let d = graph.n_demes();
    let rates = RateFields::uniform(d, 0.1, 1e-3);
    let gen = Generator::new(&graph, &rates);

    let mut group = c.benchmark_group("quadrature_order");
    for order in [30usize, 50] {
        let quad = Quadrature::for_block_sharing(order, 1e-8, 4e6).unwrap();
        let mut ws = PropagatorWorkspace::new(gen.n_states(), 20, quad.len(), d);
        let propagator = Propagator::new(20);
        group.bench_with_input(BenchmarkId::from_parameter(order), &order, |b, _| {
            b.iter(|| {
                propagator
                    .sidje(&gen, black_box(quad.times()), &mut ws)
                    .unwrap();
                expected_sharing(d, &quad, 3e9, &mut ws).unwrap();
                black_box(ws.lambda[(0, 0)])
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sidje, bench_quadrature_orders);
criterion_main!(benches);
