//! # Observed IBD Sharing
//!
//! Aggregates the individual-by-individual shared-block matrix into
//! observed-deme pair totals: `counts` holds the number of haplotype-pair
//! comparisons per deme pair, `observed` the summed IBD block counts.
//! Both are symmetric O x O matrices over the observed demes. Immutable.

use nalgebra::DMatrix;

use crate::data::Graph;
use crate::error::{MigsurfError, Result};

/// Pairwise IBD-sharing observations between observed demes
#[derive(Debug, Clone)]
pub struct Observations {
    /// Number of pairwise comparisons per observed-deme pair
    counts: DMatrix<f64>,
    /// Observed IBD block counts per observed-deme pair
    observed: DMatrix<f64>,
}

impl Observations {
    /// Aggregate a per-individual shared-block matrix.
    ///
    /// With `diploid` set, an individual pair contributes four haplotype
    /// comparisons and each individual's own two haplotypes contribute one
    /// within-deme comparison (the `sims` diagonal). Haploid samples
    /// contribute one comparison per pair and no self-comparisons.
    pub fn from_sims(sims: &DMatrix<f64>, graph: &Graph, diploid: bool) -> Result<Self> {
        let n = graph.sample_demes().len();
        if sims.nrows() != n || sims.ncols() != n {
            return Err(MigsurfError::config(format!(
                "sims matrix is {}x{}, expected {n}x{n}",
                sims.nrows(),
                sims.ncols()
            )));
        }

        let o = graph.n_observed();
        let mut counts = DMatrix::zeros(o, o);
        let mut observed = DMatrix::zeros(o, o);
        let pair_comparisons = if diploid { 4.0 } else { 1.0 };

        let rank = |sample: usize| -> usize {
            let deme = graph.sample_demes()[sample];
            graph
                .observed_rank(deme)
                .expect("sample deme missing from observed list")
        };

        for u in 0..n {
            for v in (u + 1)..n {
                let (a, b) = {
                    let (a, b) = (rank(u), rank(v));
                    if a <= b { (a, b) } else { (b, a) }
                };
                counts[(a, b)] += pair_comparisons;
                observed[(a, b)] += sims[(u, v)];
                if a != b {
                    counts[(b, a)] += pair_comparisons;
                    observed[(b, a)] += sims[(u, v)];
                }
            }
            if diploid {
                let a = rank(u);
                counts[(a, a)] += 1.0;
                observed[(a, a)] += sims[(u, u)];
            }
        }

        Ok(Self { counts, observed })
    }

    /// Construct directly from deme-pair totals (used by tests)
    pub fn from_matrices(counts: DMatrix<f64>, observed: DMatrix<f64>) -> Result<Self> {
        if counts.nrows() != counts.ncols()
            || observed.nrows() != observed.ncols()
            || counts.nrows() != observed.nrows()
        {
            return Err(MigsurfError::config(
                "counts and observed must be square matrices of equal size",
            ));
        }
        Ok(Self { counts, observed })
    }

    /// Number of observed demes
    pub fn n_observed(&self) -> usize {
        self.counts.nrows()
    }

    /// Comparison counts per observed-deme pair
    pub fn counts(&self) -> &DMatrix<f64> {
        &self.counts
    }

    /// Observed block counts per observed-deme pair
    pub fn observed(&self) -> &DMatrix<f64> {
        &self.observed
    }

    /// Observed mean sharing per comparison; zero where no comparisons exist
    pub fn mean_sharing(&self) -> DMatrix<f64> {
        let o = self.n_observed();
        DMatrix::from_fn(o, o, |i, j| {
            let c = self.counts[(i, j)];
            if c > 0.0 {
                self.observed[(i, j)] / c
            } else {
                0.0
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_deme_graph() -> Graph {
        // Samples 0,1 in deme 0; sample 2 in deme 1
        Graph::new(
            vec![[0.0, 0.0], [1.0, 0.0]],
            &[(0, 1)],
            vec![0, 0, 1],
        )
        .unwrap()
    }

    #[test]
    fn test_haploid_aggregation() {
        let graph = two_deme_graph();
        let sims = DMatrix::from_row_slice(
            3,
            3,
            &[
                0.0, 5.0, 2.0, //
                5.0, 0.0, 3.0, //
                2.0, 3.0, 0.0,
            ],
        );
        let obs = Observations::from_sims(&sims, &graph, false).unwrap();
        assert_eq!(obs.counts()[(0, 0)], 1.0); // pair (0,1)
        assert_eq!(obs.counts()[(0, 1)], 2.0); // pairs (0,2) and (1,2)
        assert_eq!(obs.counts()[(1, 1)], 0.0);
        assert_eq!(obs.observed()[(0, 0)], 5.0);
        assert_eq!(obs.observed()[(0, 1)], 5.0);
        assert_eq!(obs.observed()[(1, 0)], 5.0);
    }

    #[test]
    fn test_diploid_multiplier_and_diagonal() {
        let graph = two_deme_graph();
        let mut sims = DMatrix::zeros(3, 3);
        sims[(0, 1)] = 4.0;
        sims[(1, 0)] = 4.0;
        sims[(0, 0)] = 1.0;
        sims[(2, 2)] = 2.0;
        let obs = Observations::from_sims(&sims, &graph, true).unwrap();
        // pair (0,1): 4 comparisons; self pairs of 0 and 1: one each
        assert_eq!(obs.counts()[(0, 0)], 4.0 + 1.0 + 1.0);
        assert_eq!(obs.counts()[(0, 1)], 8.0);
        assert_eq!(obs.counts()[(1, 1)], 1.0);
        assert_eq!(obs.observed()[(0, 0)], 5.0);
        assert_eq!(obs.observed()[(1, 1)], 2.0);
    }

    #[test]
    fn test_mean_sharing_handles_empty_pairs() {
        let graph = two_deme_graph();
        let sims = DMatrix::zeros(3, 3);
        let obs = Observations::from_sims(&sims, &graph, false).unwrap();
        let mean = obs.mean_sharing();
        assert_eq!(mean[(1, 1)], 0.0);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let graph = two_deme_graph();
        let sims = DMatrix::zeros(2, 2);
        assert!(Observations::from_sims(&sims, &graph, false).is_err());
    }
}
