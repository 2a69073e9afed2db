//! # Chain State
//!
//! The full parameter state of the RJ-MCMC chain: two tessellations, their
//! mean log-rates and effect variances, the degrees of freedom, and the
//! tracked log-prior and log-likelihood. Constructed once, mutated in
//! place by accepted proposals, snapshotted at thinning ticks.

use crate::data::Tessellation;

/// Which of the two rate fields a move touches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Between-deme migration (the m tessellation)
    Migration,
    /// Within-deme coalescence (the q tessellation)
    Coalescence,
}

/// Full chain state
#[derive(Debug, Clone)]
pub struct ChainState {
    /// Migration-effect tessellation
    pub m_tess: Tessellation,
    /// Coalescence-effect tessellation
    pub q_tess: Tessellation,
    /// Overall log migration rate
    pub m_rate_mu: f64,
    /// Overall log coalescence rate
    pub q_rate_mu: f64,
    /// Variance of migration tile effects
    pub m_rate_s2: f64,
    /// Variance of coalescence tile effects
    pub q_rate_s2: f64,
    /// Degrees of freedom; sampled but inert in the Poisson likelihood
    pub df: f64,
    /// Tracked log-prior
    pub log_prior: f64,
    /// Tracked log-likelihood
    pub log_lik: f64,
}

impl ChainState {
    /// The tessellation a move of the given field acts on
    pub fn tess(&self, field: FieldKind) -> &Tessellation {
        match field {
            FieldKind::Migration => &self.m_tess,
            FieldKind::Coalescence => &self.q_tess,
        }
    }

    /// Mutable counterpart of [`tess`](Self::tess)
    pub fn tess_mut(&mut self, field: FieldKind) -> &mut Tessellation {
        match field {
            FieldKind::Migration => &mut self.m_tess,
            FieldKind::Coalescence => &mut self.q_tess,
        }
    }

    /// Mean log-rate of the given field
    pub fn rate_mu(&self, field: FieldKind) -> f64 {
        match field {
            FieldKind::Migration => self.m_rate_mu,
            FieldKind::Coalescence => self.q_rate_mu,
        }
    }

    pub fn set_rate_mu(&mut self, field: FieldKind, mu: f64) {
        match field {
            FieldKind::Migration => self.m_rate_mu = mu,
            FieldKind::Coalescence => self.q_rate_mu = mu,
        }
    }

    /// Effect variance of the given field
    pub fn rate_s2(&self, field: FieldKind) -> f64 {
        match field {
            FieldKind::Migration => self.m_rate_s2,
            FieldKind::Coalescence => self.q_rate_s2,
        }
    }
}
