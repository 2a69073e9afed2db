//! # Inference Pipeline
//!
//! Orchestrates the RJ-MCMC chain: initialization (fresh from the prior,
//! or resumed from a checkpoint), the burn-in and sampling phases, Gibbs
//! hyperparameter updates, periodic self-checks, thinned accumulation, and
//! output writing.

use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Poisson};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::data::{Graph, Habitat, Observations, Tessellation};
use crate::error::{MigsurfError, Result};
use crate::io::input::Dataset;
use crate::io::output::{load_checkpoint, write_checkpoint, write_fitted_sharing};
use crate::io::SampleLog;
use crate::model::proposal::mh_step;
use crate::model::{
    ChainState, FieldKind, IbdLikelihood, MoveType, Prior, Propagator, ProposalEngine, Quadrature,
    SharingLikelihood,
};

/// Relative tolerance of the tracked-versus-recomputed self-check
const SELF_CHECK_RTOL: f64 = 1e-6;

/// Chain phase, driven by the iteration counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    BurnIn,
    Sampling,
}

/// The full inference run over one chain
pub struct InferencePipeline {
    config: Config,
    habitat: Arc<Habitat>,
    graph: Arc<Graph>,
    observations: Arc<Observations>,
    prior: Prior,
    engine: ProposalEngine,
    likelihood: IbdLikelihood,
    rng: SmallRng,
    log: SampleLog,
    proposed: [usize; 9],
    accepted: [usize; 9],
}

impl InferencePipeline {
    pub fn new(config: Config, dataset: Dataset) -> Result<Self> {
        let habitat = Arc::new(dataset.habitat);
        let graph = Arc::new(dataset.graph);
        let observations = Arc::new(dataset.observations);

        let prior = Prior::from_config(&config, habitat.clone());
        let engine = ProposalEngine::new(&config, graph.clone(), prior.clone())?;
        let quad = Quadrature::for_block_sharing(
            config.n_quad,
            config.recombination_rate,
            config.block_length_cutoff,
        )?;
        let likelihood = IbdLikelihood::new(
            graph.clone(),
            observations.clone(),
            quad,
            Propagator::new(config.krylov_dim),
            config.genome_size,
        );
        let rng = SmallRng::seed_from_u64(config.seed);

        Ok(Self {
            config,
            habitat,
            graph,
            observations,
            prior,
            engine,
            likelihood,
            rng,
            log: SampleLog::new(),
            proposed: [0; 9],
            accepted: [0; 9],
        })
    }

    /// Draw how many tiles a fresh tessellation starts with
    fn draw_tile_count(&mut self, dist: &Poisson<f64>) -> usize {
        loop {
            let t = dist.sample(&mut self.rng) as usize;
            if (1..=self.prior.max_tiles()).contains(&t) {
                return t;
            }
        }
    }

    /// Draw a tessellation from the prior: uniform seeds, truncated-normal
    /// effects at the given variance
    fn draw_tessellation(&mut self, tiles: usize, s2: f64, bound: f64) -> Result<Tessellation> {
        let mut seeds = Vec::with_capacity(tiles);
        let mut effects = Vec::with_capacity(tiles);
        for _ in 0..tiles {
            seeds.push(self.habitat.sample_point(&mut self.rng));
            effects.push(self.engine.sample_effect(&mut self.rng, s2, bound)?);
        }
        Ok(Tessellation::new(seeds, effects, self.graph.coords()))
    }

    /// Draw a fresh state from the prior
    fn initialize_state(&mut self) -> Result<ChainState> {
        let tile_count_dist = Poisson::new(self.prior.tile_rate())
            .map_err(|e| MigsurfError::config(format!("invalid tile-count prior: {e}")))?;
        let m_tiles = self.draw_tile_count(&tile_count_dist);
        let q_tiles = self.draw_tile_count(&tile_count_dist);

        let m_rate_s2 = self.prior.s2_prior_mean(FieldKind::Migration);
        let q_rate_s2 = self.prior.s2_prior_mean(FieldKind::Coalescence);
        let m_bound = self.prior.effect_bound(FieldKind::Migration);
        let q_bound = self.prior.effect_bound(FieldKind::Coalescence);

        let m_tess = self.draw_tessellation(m_tiles, m_rate_s2, m_bound)?;
        let q_tess = self.draw_tessellation(q_tiles, q_rate_s2, q_bound)?;

        let (df_min, df_max) = self.prior.df_interval();
        Ok(ChainState {
            m_tess,
            q_tess,
            m_rate_mu: 0.0,
            q_rate_mu: 0.0,
            m_rate_s2,
            q_rate_s2,
            df: 0.5 * (df_min + df_max),
            log_prior: 0.0,
            log_lik: 0.0,
        })
    }

    /// Load the previous chain's final state
    fn resume_state(&self) -> Result<ChainState> {
        let prev = self
            .config
            .prevpath
            .as_ref()
            .ok_or_else(|| MigsurfError::config("prevpath not set"))?;
        load_checkpoint(&prev.join("lastState.txt"), self.graph.coords())
    }

    /// Recompute the tracked log densities from scratch and abort on drift
    fn self_check(&mut self, iter: usize, state: &ChainState) -> Result<()> {
        let fresh_prior = self.prior.eval(state);
        let fresh_lik = self.likelihood.evaluate(state)?;
        // exact equality short-circuits the infinite-likelihood edge case
        let rel_drift = |fresh: f64, tracked: f64| {
            if fresh == tracked {
                0.0
            } else {
                (fresh - tracked).abs() / fresh.abs().max(1.0)
            }
        };
        let prior_drift = rel_drift(fresh_prior, state.log_prior);
        let lik_drift = rel_drift(fresh_lik, state.log_lik);
        if prior_drift > SELF_CHECK_RTOL || lik_drift > SELF_CHECK_RTOL {
            error!(
                iter,
                tracked_prior = state.log_prior,
                fresh_prior,
                tracked_lik = state.log_lik,
                fresh_lik,
                "tracked densities drifted from recomputation"
            );
            return Err(MigsurfError::invariant(format!(
                "self-check failed at iteration {iter}: \
                 prior {} vs {fresh_prior}, likelihood {} vs {fresh_lik}",
                state.log_prior, state.log_lik
            )));
        }
        Ok(())
    }

    /// Run the chain to completion and write the output directory
    pub fn run(&mut self) -> Result<()> {
        let mut state = if self.config.is_resume() {
            let state = self.resume_state()?;
            info!(
                mtiles = state.m_tess.n_tiles(),
                qtiles = state.q_tess.n_tiles(),
                "resumed from previous chain"
            );
            state
        } else {
            self.initialize_state()?
        };

        state.log_prior = self.prior.eval(&state);
        if state.log_prior == f64::NEG_INFINITY {
            return Err(MigsurfError::config(
                "initial state has zero prior density",
            ));
        }
        state.log_lik = self.likelihood.evaluate(&state)?;
        info!(
            log_prior = state.log_prior,
            log_lik = state.log_lik,
            n_demes = self.graph.n_demes(),
            n_states = crate::model::n_states(self.graph.n_demes()),
            "chain initialized"
        );

        let total = self.config.num_mcmc_iter;
        let burn = self.config.num_burn_iter;
        let thin = self.config.num_thin_iter;
        let progress_every = (total / 100).max(1);

        for iter in 0..total {
            let phase = if iter < burn { Phase::BurnIn } else { Phase::Sampling };
            // the degrees-of-freedom move stays frozen early in burn-in
            let allow_df = iter >= burn / 2;

            let (move_type, accepted) = mh_step(
                &mut state,
                &self.engine,
                &mut self.likelihood,
                &mut self.rng,
                allow_df,
            )?;
            self.proposed[move_type.index()] += 1;
            self.accepted[move_type.index()] += accepted as usize;

            // Gibbs update of the effect variances, then refresh the prior
            self.prior.gibbs_update_s2(&mut state, &mut self.rng)?;
            state.log_prior = self.prior.eval(&state);

            if self.config.testing && (iter + 1) % self.config.check_interval == 0 {
                self.self_check(iter, &state)?;
            }

            if phase == Phase::Sampling && (iter - burn + 1) % thin == 0 {
                self.log.record(&state);
            }

            if (iter + 1) % progress_every == 0 {
                info!(
                    iter = iter + 1,
                    total,
                    phase = ?phase,
                    log_prior = state.log_prior,
                    log_lik = state.log_lik,
                    mtiles = state.m_tess.n_tiles(),
                    qtiles = state.q_tess.n_tiles(),
                    "progress"
                );
            }
        }

        self.report_acceptance();
        self.write_outputs(&state)?;
        Ok(())
    }

    fn report_acceptance(&self) {
        for move_type in MoveType::ALL {
            let k = move_type.index();
            if self.proposed[k] == 0 {
                continue;
            }
            let rate = self.accepted[k] as f64 / self.proposed[k] as f64;
            info!(
                move_type = move_type.name(),
                proposed = self.proposed[k],
                rate = format!("{rate:.3}"),
                "acceptance"
            );
        }
    }

    fn write_outputs(&mut self, state: &ChainState) -> Result<()> {
        let dir = self.config.mcmcpath.clone();
        self.log.write_all(&dir)?;
        write_checkpoint(&dir, state)?;

        // refresh the fitted sharing at the final state before writing it
        let _ = self.likelihood.evaluate(state)?;
        write_fitted_sharing(
            &dir,
            &self.observations.mean_sharing(),
            &self.likelihood.fitted_sharing(),
        )?;
        debug!(samples = self.log.len(), path = %dir.display(), "outputs written");
        Ok(())
    }

    /// Per-move acceptance rates, for diagnostics and tests
    pub fn acceptance_rates(&self) -> [(MoveType, f64); 9] {
        let mut rates = [(MoveType::RateOneQ, 0.0); 9];
        for move_type in MoveType::ALL {
            let k = move_type.index();
            let rate = if self.proposed[k] > 0 {
                self.accepted[k] as f64 / self.proposed[k] as f64
            } else {
                0.0
            };
            rates[k] = (move_type, rate);
        }
        rates
    }

    /// Number of thinned samples collected so far
    pub fn n_samples(&self) -> usize {
        self.log.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use nalgebra::DMatrix;

    fn tiny_dataset() -> Dataset {
        let habitat = Habitat::rectangle(0.0, 0.0, 1.0, 1.0).unwrap();
        let graph = Graph::new(
            vec![[0.25, 0.5], [0.75, 0.5]],
            &[(0, 1)],
            vec![0, 0, 1],
        )
        .unwrap();
        let sims = DMatrix::from_row_slice(
            3,
            3,
            &[
                0.0, 30.0, 12.0, //
                30.0, 0.0, 14.0, //
                12.0, 14.0, 0.0,
            ],
        );
        let observations = Observations::from_sims(&sims, &graph, false).unwrap();
        Dataset {
            habitat,
            graph,
            observations,
            sample_coords: vec![[0.2, 0.5], [0.3, 0.5], [0.8, 0.5]],
        }
    }

    fn tiny_config(mcmcpath: &std::path::Path) -> Config {
        Config::parse_from([
            "migsurf",
            "--datapath",
            "data",
            "--mcmcpath",
            mcmcpath.to_str().unwrap(),
            "--gridpath",
            "grid",
            "--nIndiv",
            "3",
            "--nDemes",
            "2",
            "--numMCMCIter",
            "60",
            "--numBurnIter",
            "30",
            "--numThinIter",
            "5",
            "--krylovDim",
            "4",
            "--maxTiles",
            "10",
            "--seed",
            "42",
        ])
    }

    #[test]
    fn test_initial_state_has_positive_prior_density() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline =
            InferencePipeline::new(tiny_config(dir.path()), tiny_dataset()).unwrap();
        let state = pipeline.initialize_state().unwrap();
        assert!((1..=10).contains(&state.m_tess.n_tiles()));
        assert!((1..=10).contains(&state.q_tess.n_tiles()));
        assert!(pipeline.prior.eval(&state).is_finite());
    }

    #[test]
    fn test_short_chain_runs_and_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline =
            InferencePipeline::new(tiny_config(dir.path()), tiny_dataset()).unwrap();
        pipeline.run().unwrap();

        // 30 sampling iterations at thinning 5
        assert_eq!(pipeline.n_samples(), 6);
        assert!(dir.path().join("mcmcthetas.txt").exists());
        assert!(dir.path().join("lastState.txt").exists());
        assert!(dir.path().join("rdistJtDobsJtDhatJ.txt").exists());
    }
}
