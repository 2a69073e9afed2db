//! # Expected Sharing and Poisson Likelihood
//!
//! Turns the propagated coalescence CDFs into the expected number of
//! shared IBD blocks per deme pair, and scores the observed counts under
//! a Poisson model with rate `counts * Lambda`. Constant factorial terms
//! are dropped; they cancel in acceptance ratios.

use std::sync::Arc;

use nalgebra::DMatrix;

use crate::data::{Graph, Observations};
use crate::error::{MigsurfError, Result};
use crate::model::ctmc::{pair_index, Generator, RateFields};
use crate::model::propagator::Propagator;
use crate::model::quadrature::Quadrature;
use crate::model::state::ChainState;
use crate::utils::PropagatorWorkspace;

/// Fill `ws.lambda` with the expected pairwise block counts from the CDFs
/// in `ws.probs`.
///
/// The coalescence-time density is approximated by finite differences of
/// the CDF over the quadrature abscissae, with `f(t_0) = 0`; the result is
/// symmetric and must be finite and non-negative.
pub fn expected_sharing(
    n_demes: usize,
    quad: &Quadrature,
    genome_size: f64,
    ws: &mut PropagatorWorkspace,
) -> Result<()> {
    let weights = quad.weights();
    let times = quad.times();
    let nq = quad.len();

    for i in 0..n_demes {
        for j in i..n_demes {
            let s = pair_index(n_demes, i, j);
            let mut total = 0.0;
            let mut prev = ws.probs[(s, 0)];
            for k in 1..nq {
                let cur = ws.probs[(s, k)];
                let density = (cur - prev) / (times[k] - times[k - 1]);
                total += weights[k] * density;
                prev = cur;
            }
            let lambda = genome_size * total;
            if !lambda.is_finite() {
                return Err(MigsurfError::numeric(format!(
                    "expected sharing for pair ({i}, {j}) is {lambda}"
                )));
            }
            if lambda < 0.0 {
                return Err(MigsurfError::numeric(format!(
                    "negative expected sharing {lambda} for pair ({i}, {j})"
                )));
            }
            ws.lambda[(i, j)] = lambda;
            ws.lambda[(j, i)] = lambda;
        }
    }
    Ok(())
}

/// Poisson log-likelihood of the observations given expected sharing over
/// all demes. Pairs with no comparisons contribute nothing.
pub fn poisson_loglik(
    lambda: &DMatrix<f64>,
    graph: &Graph,
    obs: &Observations,
) -> Result<f64> {
    let observed = graph.observed();
    let mut ll = 0.0;
    for a in 0..observed.len() {
        for b in a..observed.len() {
            let c = obs.counts()[(a, b)];
            if c == 0.0 {
                continue;
            }
            let lam = lambda[(observed[a] as usize, observed[b] as usize)];
            ll += obs.observed()[(a, b)] * lam.ln() - c * lam;
        }
    }
    if ll.is_nan() {
        return Err(MigsurfError::numeric("log-likelihood is NaN"));
    }
    Ok(ll)
}

/// Likelihood evaluator seam; the production implementation propagates the
/// CTMC, tests may substitute a flat likelihood to sample the prior.
pub trait SharingLikelihood {
    /// Log-likelihood of the observations under the given state
    fn evaluate(&mut self, state: &ChainState) -> Result<f64>;
}

/// The full IBD-sharing likelihood
pub struct IbdLikelihood {
    graph: Arc<Graph>,
    obs: Arc<Observations>,
    quad: Quadrature,
    propagator: Propagator,
    genome_size: f64,
    ws: PropagatorWorkspace,
}

impl IbdLikelihood {
    pub fn new(
        graph: Arc<Graph>,
        obs: Arc<Observations>,
        quad: Quadrature,
        propagator: Propagator,
        genome_size: f64,
    ) -> Self {
        let d = graph.n_demes();
        let n_states = crate::model::ctmc::n_states(d);
        let ws = PropagatorWorkspace::new(n_states, propagator.krylov_dim().min(n_states), quad.len(), d);
        Self {
            graph,
            obs,
            quad,
            propagator,
            genome_size,
            ws,
        }
    }

    /// Expected sharing of the last evaluation, restricted to observed demes
    pub fn fitted_sharing(&self) -> DMatrix<f64> {
        let observed = self.graph.observed();
        DMatrix::from_fn(observed.len(), observed.len(), |a, b| {
            self.ws.lambda[(observed[a] as usize, observed[b] as usize)]
        })
    }

    /// Expected sharing of the last evaluation over all demes
    pub fn lambda(&self) -> &DMatrix<f64> {
        &self.ws.lambda
    }
}

impl SharingLikelihood for IbdLikelihood {
    fn evaluate(&mut self, state: &ChainState) -> Result<f64> {
        let rates = RateFields::new(
            &state.m_tess,
            state.m_rate_mu,
            &state.q_tess,
            state.q_rate_mu,
        );
        let gen = Generator::new(&self.graph, &rates);
        self.propagator
            .sidje(&gen, self.quad.times(), &mut self.ws)?;
        expected_sharing(self.graph.n_demes(), &self.quad, self.genome_size, &mut self.ws)?;
        poisson_loglik(&self.ws.lambda, &self.graph, &self.obs)
    }
}

/// Constant likelihood; every state scores zero. Used to verify that the
/// chain samples its prior.
pub struct FlatLikelihood;

impl SharingLikelihood for FlatLikelihood {
    fn evaluate(&mut self, _state: &ChainState) -> Result<f64> {
        Ok(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::propagator::dense_reference;

    fn toy_graph() -> Arc<Graph> {
        Arc::new(Graph::new(vec![[0.0, 0.0], [1.0, 0.0]], &[(0, 1)], vec![0, 1]).unwrap())
    }

    #[test]
    fn test_expected_sharing_symmetric_nonnegative() {
        let graph = toy_graph();
        let rates = RateFields::uniform(2, 0.1, 1e-3);
        let gen = Generator::new(&graph, &rates);
        let quad = Quadrature::for_block_sharing(30, 1e-8, 4e6).unwrap();

        let mut ws = PropagatorWorkspace::new(gen.n_states(), 4, quad.len(), 2);
        ws.probs = dense_reference(&gen, quad.times()).unwrap();
        expected_sharing(2, &quad, 3e9, &mut ws).unwrap();

        for i in 0..2 {
            for j in 0..2 {
                assert!(ws.lambda[(i, j)].is_finite());
                assert!(ws.lambda[(i, j)] >= 0.0);
                assert_eq!(ws.lambda[(i, j)], ws.lambda[(j, i)]);
            }
        }
        // same-deme pairs coalesce sooner than the split pair
        assert!(ws.lambda[(0, 0)] > ws.lambda[(0, 1)]);
    }

    #[test]
    fn test_poisson_loglik_hand_computed() {
        let graph = toy_graph();
        let counts = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 0.0]);
        let observed = DMatrix::from_row_slice(2, 2, &[3.0, 1.0, 1.0, 0.0]);
        let obs = Observations::from_matrices(counts, observed).unwrap();
        let lambda = DMatrix::from_row_slice(2, 2, &[4.0, 2.0, 2.0, 5.0]);

        let ll = poisson_loglik(&lambda, &graph, &obs).unwrap();
        // pairs (0,0) and (0,1); (1,1) has no comparisons
        let expect = 3.0 * 4.0f64.ln() - 2.0 * 4.0 + 1.0 * 2.0f64.ln() - 1.0 * 2.0;
        assert!((ll - expect).abs() < 1e-12);
    }

    #[test]
    fn test_ibd_likelihood_is_finite() {
        let graph = toy_graph();
        let counts = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        let observed = DMatrix::from_row_slice(2, 2, &[10.0, 4.0, 4.0, 8.0]);
        let obs = Arc::new(Observations::from_matrices(counts, observed).unwrap());
        let quad = Quadrature::for_block_sharing(30, 1e-8, 4e6).unwrap();

        let demes = [[0.0, 0.0], [1.0, 0.0]];
        let state = ChainState {
            m_tess: crate::data::Tessellation::new(vec![[0.5, 0.0]], vec![0.0], &demes),
            q_tess: crate::data::Tessellation::new(vec![[0.5, 0.0]], vec![0.0], &demes),
            m_rate_mu: -2.0,
            q_rate_mu: -6.0,
            m_rate_s2: 0.1,
            q_rate_s2: 0.01,
            df: 10.0,
            log_prior: 0.0,
            log_lik: 0.0,
        };

        let mut lik = IbdLikelihood::new(graph, obs, quad, Propagator::new(4), 3e9);
        let ll = lik.evaluate(&state).unwrap();
        assert!(ll.is_finite());
        let fitted = lik.fitted_sharing();
        assert_eq!(fitted.nrows(), 2);
        assert!(fitted[(0, 1)] > 0.0);
    }
}
