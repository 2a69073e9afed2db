//! # Prior Density and Hyperparameter Updates
//!
//! The joint log-prior over the chain state, and the conjugate Gibbs draw
//! for the two effect variances. Hard constraint violations (effects out of
//! bounds, seeds outside the habitat, tile counts outside the configured
//! range, degrees of freedom outside its interval) evaluate to negative
//! infinity and reject the move outright.

use std::sync::Arc;

use rand::Rng;

use crate::config::Config;
use crate::data::{Habitat, Tessellation};
use crate::error::Result;
use crate::model::state::{ChainState, FieldKind};
use crate::utils::stats::{
    inv_gamma_lnpdf, normal_lnpdf, poisson_lnpmf, sample_inv_gamma, trunc_normal_lnpdf,
};

/// Variance of the wide normal prior on the mean log-rates
const MU_PRIOR_VARIANCE: f64 = 100.0;

/// Prior specification shared by the proposal engine and the driver
#[derive(Debug, Clone)]
pub struct Prior {
    habitat: Arc<Habitat>,
    /// Poisson mean of the tile-count prior
    tile_rate: f64,
    /// Upper bound on tiles per tessellation
    max_tiles: usize,
    /// Half interval bounding migration effects
    m_effect_bound: f64,
    /// Half interval bounding coalescence effects
    q_effect_bound: f64,
    /// Inverse-gamma shape/scale for the migration effect variance
    m_s2_shape: f64,
    m_s2_scale: f64,
    /// Inverse-gamma shape/scale for the coalescence effect variance
    q_s2_shape: f64,
    q_s2_scale: f64,
    /// Uniform interval for the degrees of freedom
    df_min: f64,
    df_max: f64,
}

impl Prior {
    pub fn from_config(config: &Config, habitat: Arc<Habitat>) -> Self {
        Self {
            habitat,
            tile_rate: config.tile_prior_mean(),
            max_tiles: config.max_tiles,
            m_effect_bound: config.m_effct_half_interval,
            q_effect_bound: config.q_effct_half_interval,
            m_s2_shape: config.mrate_shape,
            m_s2_scale: config.mrate_scale,
            q_s2_shape: config.qrate_shape,
            q_s2_scale: config.qrate_scale,
            df_min: config.dfmin,
            df_max: config.dfmax,
        }
    }

    pub fn habitat(&self) -> &Habitat {
        &self.habitat
    }

    pub fn max_tiles(&self) -> usize {
        self.max_tiles
    }

    pub fn df_interval(&self) -> (f64, f64) {
        (self.df_min, self.df_max)
    }

    pub fn effect_bound(&self, field: FieldKind) -> f64 {
        match field {
            FieldKind::Migration => self.m_effect_bound,
            FieldKind::Coalescence => self.q_effect_bound,
        }
    }

    /// Prior mean of an effect variance; falls back to the mode when the
    /// shape is too small for the mean to exist.
    pub fn s2_prior_mean(&self, field: FieldKind) -> f64 {
        let (shape, scale) = match field {
            FieldKind::Migration => (self.m_s2_shape, self.m_s2_scale),
            FieldKind::Coalescence => (self.q_s2_shape, self.q_s2_scale),
        };
        let (a, b) = (shape / 2.0, scale / 2.0);
        if a > 1.0 {
            b / (a - 1.0)
        } else {
            b / (a + 1.0)
        }
    }

    /// Poisson mean of the tile-count prior
    pub fn tile_rate(&self) -> f64 {
        self.tile_rate
    }

    /// Log-density of one tessellation given its field's variance
    fn tessellation_lnpdf(&self, tess: &Tessellation, s2: f64, bound: f64) -> f64 {
        let tiles = tess.n_tiles();
        if tiles == 0 || tiles > self.max_tiles {
            return f64::NEG_INFINITY;
        }
        let mut lp = poisson_lnpmf(tiles, self.tile_rate);
        // seeds are uniform over the habitat
        lp -= tiles as f64 * self.habitat.area().ln();
        for &[x, y] in &tess.seeds {
            if !self.habitat.contains(x, y) {
                return f64::NEG_INFINITY;
            }
        }
        for &e in &tess.effects {
            lp += trunc_normal_lnpdf(e, s2, bound);
            if lp == f64::NEG_INFINITY {
                return lp;
            }
        }
        lp
    }

    /// Joint log-prior of the full state
    pub fn eval(&self, state: &ChainState) -> f64 {
        if state.df < self.df_min || state.df > self.df_max {
            return f64::NEG_INFINITY;
        }
        if state.m_rate_s2 <= 0.0 || state.q_rate_s2 <= 0.0 {
            return f64::NEG_INFINITY;
        }

        let mut lp = self.tessellation_lnpdf(&state.m_tess, state.m_rate_s2, self.m_effect_bound);
        if lp == f64::NEG_INFINITY {
            return lp;
        }
        lp += self.tessellation_lnpdf(&state.q_tess, state.q_rate_s2, self.q_effect_bound);
        if lp == f64::NEG_INFINITY {
            return lp;
        }

        lp += normal_lnpdf(state.m_rate_mu, 0.0, MU_PRIOR_VARIANCE);
        lp += normal_lnpdf(state.q_rate_mu, 0.0, MU_PRIOR_VARIANCE);
        lp += inv_gamma_lnpdf(state.m_rate_s2, self.m_s2_shape / 2.0, self.m_s2_scale / 2.0);
        lp += inv_gamma_lnpdf(state.q_rate_s2, self.q_s2_shape / 2.0, self.q_s2_scale / 2.0);
        lp -= (self.df_max - self.df_min).ln();
        lp
    }

    /// Gibbs update of both effect variances conditional on the effects:
    /// `s2 | e ~ InvGamma((shape + T) / 2, (scale + sum e^2) / 2)`.
    pub fn gibbs_update_s2<R: Rng>(&self, state: &mut ChainState, rng: &mut R) -> Result<()> {
        let m_shape = (self.m_s2_shape + state.m_tess.n_tiles() as f64) / 2.0;
        let m_scale = (self.m_s2_scale + state.m_tess.sum_sq_effects()) / 2.0;
        state.m_rate_s2 = sample_inv_gamma(rng, m_shape, m_scale)?;

        let q_shape = (self.q_s2_shape + state.q_tess.n_tiles() as f64) / 2.0;
        let q_scale = (self.q_s2_scale + state.q_tess.sum_sq_effects()) / 2.0;
        state.q_rate_s2 = sample_inv_gamma(rng, q_shape, q_scale)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Tessellation;
    use clap::Parser;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn test_config() -> Config {
        Config::parse_from([
            "migsurf",
            "--datapath",
            "data",
            "--mcmcpath",
            "out",
            "--gridpath",
            "grid",
            "--nIndiv",
            "3",
            "--nDemes",
            "4",
        ])
    }

    fn test_state() -> ChainState {
        let demes = [[0.2, 0.2], [0.8, 0.2], [0.2, 0.8], [0.8, 0.8]];
        ChainState {
            m_tess: Tessellation::new(vec![[0.5, 0.5]], vec![0.1], &demes),
            q_tess: Tessellation::new(vec![[0.4, 0.6]], vec![0.01], &demes),
            m_rate_mu: -2.0,
            q_rate_mu: -6.0,
            m_rate_s2: 0.5,
            q_rate_s2: 0.05,
            df: 10.0,
            log_prior: 0.0,
            log_lik: 0.0,
        }
    }

    #[test]
    fn test_prior_is_finite_for_valid_state() {
        let habitat = Arc::new(Habitat::rectangle(0.0, 0.0, 1.0, 1.0).unwrap());
        let prior = Prior::from_config(&test_config(), habitat);
        let state = test_state();
        assert!(prior.eval(&state).is_finite());
    }

    #[test]
    fn test_prior_rejects_out_of_bound_effect() {
        let habitat = Arc::new(Habitat::rectangle(0.0, 0.0, 1.0, 1.0).unwrap());
        let prior = Prior::from_config(&test_config(), habitat);
        let mut state = test_state();
        state.q_tess.effects[0] = 1e3;
        assert_eq!(prior.eval(&state), f64::NEG_INFINITY);
    }

    #[test]
    fn test_prior_rejects_seed_outside_habitat() {
        let habitat = Arc::new(Habitat::rectangle(0.0, 0.0, 1.0, 1.0).unwrap());
        let prior = Prior::from_config(&test_config(), habitat);
        let mut state = test_state();
        state.m_tess.seeds[0] = [3.0, 3.0];
        assert_eq!(prior.eval(&state), f64::NEG_INFINITY);
    }

    #[test]
    fn test_prior_rejects_df_outside_interval() {
        let habitat = Arc::new(Habitat::rectangle(0.0, 0.0, 1.0, 1.0).unwrap());
        let prior = Prior::from_config(&test_config(), habitat);
        let mut state = test_state();
        state.df = 1.0;
        assert_eq!(prior.eval(&state), f64::NEG_INFINITY);
    }

    #[test]
    fn test_extra_tile_changes_prior_by_tile_terms() {
        let habitat = Arc::new(Habitat::rectangle(0.0, 0.0, 1.0, 1.0).unwrap());
        let prior = Prior::from_config(&test_config(), habitat.clone());
        let mut state = test_state();
        let before = prior.eval(&state);

        let demes = [[0.2, 0.2], [0.8, 0.2], [0.2, 0.8], [0.8, 0.8]];
        state.q_tess.birth([0.6, 0.6], 0.0, &demes);
        let after = prior.eval(&state);

        let rate = prior.tile_rate();
        let expect = poisson_lnpmf(2, rate) - poisson_lnpmf(1, rate)
            + trunc_normal_lnpdf(0.0, state.q_rate_s2, prior.effect_bound(FieldKind::Coalescence))
            - habitat.area().ln();
        assert!(((after - before) - expect).abs() < 1e-10);
    }

    #[test]
    fn test_gibbs_keeps_variances_positive() {
        let habitat = Arc::new(Habitat::rectangle(0.0, 0.0, 1.0, 1.0).unwrap());
        let prior = Prior::from_config(&test_config(), habitat);
        let mut state = test_state();
        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..100 {
            prior.gibbs_update_s2(&mut state, &mut rng).unwrap();
            assert!(state.m_rate_s2 > 0.0 && state.m_rate_s2.is_finite());
            assert!(state.q_rate_s2 > 0.0 && state.q_rate_s2.is_finite());
        }
    }
}
