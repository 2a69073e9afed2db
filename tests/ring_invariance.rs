//! Uniform rate fields on a rotation-symmetric graph: the expected
//! sharing between two demes may depend only on their graph distance.

use migsurf::model::likelihood::expected_sharing;
use migsurf::model::{Generator, Propagator, Quadrature, RateFields};
use migsurf::utils::PropagatorWorkspace;
use migsurf::Graph;

const N_DEMES: usize = 8;

fn ring_graph() -> Graph {
    let coords: Vec<[f64; 2]> = (0..N_DEMES)
        .map(|k| {
            let theta = 2.0 * std::f64::consts::PI * k as f64 / N_DEMES as f64;
            [theta.cos(), theta.sin()]
        })
        .collect();
    let edges: Vec<(u32, u32)> = (0..N_DEMES)
        .map(|k| (k as u32, ((k + 1) % N_DEMES) as u32))
        .collect();
    Graph::new(coords, &edges, vec![0]).unwrap()
}

#[test]
fn sharing_depends_only_on_ring_distance() {
    let graph = ring_graph();
    let rates = RateFields::uniform(N_DEMES, 0.08, 2e-3);
    let gen = Generator::new(&graph, &rates);
    let quad = Quadrature::for_block_sharing(30, 1e-8, 4e6).unwrap();

    let mut ws = PropagatorWorkspace::new(gen.n_states(), 12, quad.len(), N_DEMES);
    Propagator::new(12).sidje(&gen, quad.times(), &mut ws).unwrap();
    expected_sharing(N_DEMES, &quad, 3e9, &mut ws).unwrap();

    // group pairs by circular distance and compare within each orbit
    for dist in 0..=N_DEMES / 2 {
        let reference = ws.lambda[(0, dist)];
        assert!(reference > 0.0 && reference.is_finite());
        for i in 0..N_DEMES {
            let j = (i + dist) % N_DEMES;
            let value = ws.lambda[(i, j)];
            let rel = (value - reference).abs() / reference;
            assert!(
                rel < 1e-9,
                "distance {dist}: pair ({i},{j}) = {value}, reference {reference}"
            );
        }
    }

    // sharing decays with ring distance
    for dist in 1..=N_DEMES / 2 {
        assert!(
            ws.lambda[(0, dist)] < ws.lambda[(0, dist - 1)],
            "sharing did not decrease from distance {} to {dist}",
            dist - 1
        );
    }
}

#[test]
fn perturbing_one_tile_breaks_the_symmetry() {
    let graph = ring_graph();
    let mut migration = vec![0.08; N_DEMES];
    migration[3] = 0.4;
    let rates = RateFields::from_parts(migration, vec![2e-3; N_DEMES]);
    let gen = Generator::new(&graph, &rates);
    let quad = Quadrature::for_block_sharing(30, 1e-8, 4e6).unwrap();

    let mut ws = PropagatorWorkspace::new(gen.n_states(), 12, quad.len(), N_DEMES);
    Propagator::new(12).sidje(&gen, quad.times(), &mut ws).unwrap();
    expected_sharing(N_DEMES, &quad, 3e9, &mut ws).unwrap();

    // neighbors across the fast corridor now share more than a pair far
    // from it at the same ring distance
    assert!(ws.lambda[(3, 4)] > ws.lambda[(6, 7)]);
}
