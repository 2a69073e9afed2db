//! # Structured-Coalescent CTMC
//!
//! The pair-state space tracks two lineages on the deme graph: one state
//! per unordered deme pair (i, j) with i <= j, plus one absorbing
//! "coalesced" state. The generator is applied matrix-free: migration mass
//! moves one lineage to a neighboring deme, same-deme states leak into the
//! absorbing state at the local coalescence rate, and the diagonal is the
//! negative row sum.

use nalgebra::{DMatrix, DVector};

use crate::data::{Graph, Tessellation};

/// Number of CTMC states for `d` demes: unordered pairs plus the absorbing state
#[inline]
pub fn n_states(d: usize) -> usize {
    d * (d + 1) / 2 + 1
}

/// Index of the unordered pair (i, j) in row-major upper-triangle order.
///
/// The arguments may come in either order; the absorbing state sits at
/// `n_states(d) - 1`, after all pair states.
#[inline]
pub fn pair_index(d: usize, i: usize, j: usize) -> usize {
    let (i, j) = if i <= j { (i, j) } else { (j, i) };
    i * (2 * d + 1 - i) / 2 + (j - i)
}

/// Migration and coalescence rate fields derived from the two tessellations
#[derive(Debug, Clone)]
pub struct RateFields {
    /// Per-deme migration factor exp(mu_m + effect of the covering m-tile)
    deme_migration: Vec<f64>,
    /// Per-deme coalescence rate exp(mu_q + effect of the covering q-tile)
    coalescence: Vec<f64>,
}

impl RateFields {
    /// Evaluate both fields at every deme
    pub fn new(
        m_tess: &Tessellation,
        m_rate_mu: f64,
        q_tess: &Tessellation,
        q_rate_mu: f64,
    ) -> Self {
        let deme_migration = m_tess
            .colors
            .iter()
            .map(|&c| (m_rate_mu + m_tess.effects[c as usize]).exp())
            .collect();
        let coalescence = q_tess
            .colors
            .iter()
            .map(|&c| (q_rate_mu + q_tess.effects[c as usize]).exp())
            .collect();
        Self {
            deme_migration,
            coalescence,
        }
    }

    /// Uniform fields, for tests and benchmarks
    pub fn uniform(n_demes: usize, migration: f64, coalescence: f64) -> Self {
        Self {
            deme_migration: vec![migration; n_demes],
            coalescence: vec![coalescence; n_demes],
        }
    }

    /// Fields from explicit per-deme rates
    pub fn from_parts(deme_migration: Vec<f64>, coalescence: Vec<f64>) -> Self {
        debug_assert_eq!(deme_migration.len(), coalescence.len());
        Self {
            deme_migration,
            coalescence,
        }
    }

    /// Migration rate on the edge (u, v): the mean of the endpoint factors
    #[inline]
    pub fn edge_rate(&self, u: usize, v: usize) -> f64 {
        0.5 * (self.deme_migration[u] + self.deme_migration[v])
    }

    /// Coalescence rate within deme `d`
    #[inline]
    pub fn coalescence_rate(&self, d: usize) -> f64 {
        self.coalescence[d]
    }
}

/// Matrix-free generator over the pair-state space
pub struct Generator<'a> {
    graph: &'a Graph,
    rates: &'a RateFields,
    n_states: usize,
}

impl<'a> Generator<'a> {
    pub fn new(graph: &'a Graph, rates: &'a RateFields) -> Self {
        Self {
            graph,
            rates,
            n_states: n_states(graph.n_demes()),
        }
    }

    /// Total number of CTMC states
    pub fn n_states(&self) -> usize {
        self.n_states
    }

    /// Index of the absorbing coalesced state
    pub fn absorbing(&self) -> usize {
        self.n_states - 1
    }

    /// Apply the generator: `z = Q q`.
    ///
    /// Sweeps the pair states in index order, accumulating the off-diagonal
    /// mass and the row sum in one pass; the absorbing row stays zero.
    pub fn apply(&self, q: &DVector<f64>, z: &mut DVector<f64>) {
        debug_assert_eq!(q.len(), self.n_states);
        debug_assert_eq!(z.len(), self.n_states);

        let d = self.graph.n_demes();
        let absorbing = self.absorbing();
        let mut index = 0;
        for i in 0..d {
            for j in i..d {
                let mut row_sum = 0.0;
                let mut acc = 0.0;

                // lineage in deme i hops to a neighbor, j fixed
                for &k in self.graph.neighbors(i) {
                    let rate = self.rates.edge_rate(i, k as usize);
                    row_sum += rate;
                    acc += rate * q[pair_index(d, k as usize, j)];
                }
                // lineage in deme j hops to a neighbor, i fixed
                for &k in self.graph.neighbors(j) {
                    let rate = self.rates.edge_rate(j, k as usize);
                    row_sum += rate;
                    acc += rate * q[pair_index(d, i, k as usize)];
                }
                // both lineages in the same deme may coalesce
                if i == j {
                    let w = self.rates.coalescence_rate(i);
                    row_sum += w;
                    acc += w * q[absorbing];
                }

                z[index] = acc - row_sum * q[index];
                index += 1;
            }
        }
        z[absorbing] = 0.0;
    }

    /// Materialize the generator as a dense matrix. Quadratic in the number
    /// of states; intended for small problems and cross-checks.
    pub fn to_dense(&self) -> DMatrix<f64> {
        let d = self.graph.n_demes();
        let n = self.n_states;
        let absorbing = self.absorbing();
        let mut q = DMatrix::zeros(n, n);

        let mut row = 0;
        for i in 0..d {
            for j in i..d {
                for &k in self.graph.neighbors(i) {
                    q[(row, pair_index(d, k as usize, j))] += self.rates.edge_rate(i, k as usize);
                }
                for &k in self.graph.neighbors(j) {
                    q[(row, pair_index(d, i, k as usize))] += self.rates.edge_rate(j, k as usize);
                }
                if i == j {
                    q[(row, absorbing)] += self.rates.coalescence_rate(i);
                }
                let row_sum: f64 = q.row(row).sum();
                q[(row, row)] -= row_sum;
                row += 1;
            }
        }
        q
    }
}
