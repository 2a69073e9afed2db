//! # Log-Density Helpers
//!
//! Small statistical functions shared by the prior and the Gibbs updates.
//! Normalizing constants are kept so priors stay comparable across moves
//! that change the dimension of the parameter vector.

use rand::Rng;
use rand_distr::{Distribution, Gamma};
use statrs::function::erf::erf;
use statrs::function::gamma::ln_gamma;

use crate::error::{MigsurfError, Result};

const LN_2PI: f64 = 1.8378770664093453;
const SQRT_2: f64 = std::f64::consts::SQRT_2;

/// Log-density of Normal(mu, s2) at x
pub fn normal_lnpdf(x: f64, mu: f64, s2: f64) -> f64 {
    let z = x - mu;
    -0.5 * (LN_2PI + s2.ln()) - z * z / (2.0 * s2)
}

/// Log-density of a zero-mean Normal(0, s2) truncated to [-bound, bound]
pub fn trunc_normal_lnpdf(x: f64, s2: f64, bound: f64) -> f64 {
    if x.abs() > bound {
        return f64::NEG_INFINITY;
    }
    let sigma = s2.sqrt();
    // P(|X| <= bound) = erf(bound / (sigma * sqrt(2)))
    let mass = erf(bound / (sigma * SQRT_2));
    normal_lnpdf(x, 0.0, s2) - mass.ln()
}

/// Log-pmf of Poisson(rate) at k
pub fn poisson_lnpmf(k: usize, rate: f64) -> f64 {
    let kf = k as f64;
    kf * rate.ln() - rate - ln_gamma(kf + 1.0)
}

/// Log-density of InverseGamma(shape, scale) at x
pub fn inv_gamma_lnpdf(x: f64, shape: f64, scale: f64) -> f64 {
    if x <= 0.0 {
        return f64::NEG_INFINITY;
    }
    shape * scale.ln() - ln_gamma(shape) - (shape + 1.0) * x.ln() - scale / x
}

/// Draw from InverseGamma(shape, scale) via the reciprocal of a gamma draw
pub fn sample_inv_gamma<R: Rng>(rng: &mut R, shape: f64, scale: f64) -> Result<f64> {
    // rand_distr's Gamma takes (shape, scale theta); theta = 1/scale gives a
    // Gamma(shape, rate = scale) draw, whose reciprocal is InvGamma(shape, scale).
    let gamma = Gamma::new(shape, 1.0 / scale)
        .map_err(|e| MigsurfError::numeric(format!("invalid gamma parameters: {e}")))?;
    Ok(1.0 / gamma.sample(rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_normal_lnpdf_standard() {
        // N(0,1) at 0 is 1/sqrt(2 pi)
        assert!((normal_lnpdf(0.0, 0.0, 1.0) - (-0.5 * LN_2PI)).abs() < 1e-12);
    }

    #[test]
    fn test_trunc_normal_integrates_to_one() {
        // Trapezoid integration of the truncated density over its support
        let (s2, bound) = (0.5, 1.2);
        let n = 20_000;
        let h = 2.0 * bound / n as f64;
        let mut total = 0.0;
        for i in 0..=n {
            let x = -bound + i as f64 * h;
            let w = if i == 0 || i == n { 0.5 } else { 1.0 };
            total += w * trunc_normal_lnpdf(x, s2, bound).exp();
        }
        total *= h;
        assert!((total - 1.0).abs() < 1e-6, "integral was {total}");
    }

    #[test]
    fn test_trunc_normal_outside_support() {
        assert_eq!(trunc_normal_lnpdf(1.5, 1.0, 1.0), f64::NEG_INFINITY);
    }

    #[test]
    fn test_poisson_lnpmf_sums_to_one() {
        let rate = 3.7;
        let total: f64 = (0..200).map(|k| poisson_lnpmf(k, rate).exp()).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_inv_gamma_mean() {
        // Mean of InvGamma(shape, scale) is scale / (shape - 1)
        let mut rng = SmallRng::seed_from_u64(11);
        let (shape, scale) = (5.0, 8.0);
        let n = 50_000;
        let mean: f64 = (0..n)
            .map(|_| sample_inv_gamma(&mut rng, shape, scale).unwrap())
            .sum::<f64>()
            / n as f64;
        assert!((mean - 2.0).abs() < 0.05, "sample mean was {mean}");
    }

    #[test]
    fn test_inv_gamma_lnpdf_mode() {
        // Mode at scale / (shape + 1)
        let (shape, scale) = (3.0, 4.0);
        let mode = scale / (shape + 1.0);
        let at_mode = inv_gamma_lnpdf(mode, shape, scale);
        assert!(at_mode > inv_gamma_lnpdf(mode * 0.8, shape, scale));
        assert!(at_mode > inv_gamma_lnpdf(mode * 1.2, shape, scale));
    }
}
