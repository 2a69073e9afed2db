//! # Configuration Logic
//!
//! CLI argument parsing and validation using clap derive.
//! Parameter names follow the conventional EEMS-style keys so existing
//! data preparation scripts keep working.

use clap::Parser;
use std::path::PathBuf;

use crate::error::{MigsurfError, Result};

/// migsurf: effective migration and coalescence surfaces from IBD sharing
#[derive(Parser, Debug, Clone)]
#[command(name = "migsurf")]
#[command(version = "0.1.0")]
#[command(about = "Estimate migration/coalescence surfaces from IBD block sharing", long_about = None)]
pub struct Config {
    // ============ Paths ============
    /// Input prefix: expects <datapath>.coord, <datapath>.outer, <datapath>.sims
    #[arg(long, value_name = "PREFIX")]
    pub datapath: PathBuf,

    /// Output directory for the MCMC chain
    #[arg(long, value_name = "DIR")]
    pub mcmcpath: PathBuf,

    /// Directory with a previous chain's lastState.txt to resume from
    #[arg(long, value_name = "DIR")]
    pub prevpath: Option<PathBuf>,

    /// Grid prefix: expects <gridpath>.demes, <gridpath>.edges, <gridpath>.ipmap
    #[arg(long, value_name = "PREFIX")]
    pub gridpath: PathBuf,

    // ============ Data dimensions ============
    /// Number of sampled individuals
    #[arg(long = "nIndiv")]
    pub n_indiv: usize,

    /// Number of polymorphic sites (carried for bookkeeping; the IBD Poisson
    /// model does not use it)
    #[arg(long = "nSites", default_value = "0")]
    pub n_sites: usize,

    /// Number of demes in the habitat grid
    #[arg(long = "nDemes")]
    pub n_demes: usize,

    // ============ Chain length ============
    /// Total MCMC iterations (including burn-in)
    #[arg(long = "numMCMCIter", default_value = "2000000")]
    pub num_mcmc_iter: usize,

    /// Burn-in iterations
    #[arg(long = "numBurnIter", default_value = "1000000")]
    pub num_burn_iter: usize,

    /// Thinning interval during the sampling phase
    #[arg(long = "numThinIter", default_value = "9999")]
    pub num_thin_iter: usize,

    // ============ Hyperprior shapes/scales ============
    /// Inverse-gamma shape for the migration effect variance
    #[arg(long = "mrateShape", default_value = "0.001")]
    pub mrate_shape: f64,

    /// Inverse-gamma shape for the coalescence effect variance
    #[arg(long = "qrateShape", default_value = "0.001")]
    pub qrate_shape: f64,

    /// Inverse-gamma scale for the migration effect variance
    #[arg(long = "mrateScale", default_value = "1.0")]
    pub mrate_scale: f64,

    /// Inverse-gamma scale for the coalescence effect variance
    #[arg(long = "qrateScale", default_value = "1.0")]
    pub qrate_scale: f64,

    // ============ Proposal variances ============
    /// Proposal variance for single m-tile effect updates
    #[arg(long = "mEffctProposalS2", default_value = "0.1")]
    pub m_effct_proposal_s2: f64,

    /// Proposal variance for single q-tile effect updates
    #[arg(long = "qEffctProposalS2", default_value = "0.001")]
    pub q_effct_proposal_s2: f64,

    /// Proposal variance for m-tile seed moves
    #[arg(long = "mSeedsProposalS2", default_value = "0.01")]
    pub m_seeds_proposal_s2: f64,

    /// Proposal variance for q-tile seed moves
    #[arg(long = "qSeedsProposalS2", default_value = "0.1")]
    pub q_seeds_proposal_s2: f64,

    /// Proposal variance for the overall log migration rate
    #[arg(long = "mrateMuProposalS2", default_value = "0.01")]
    pub mrate_mu_proposal_s2: f64,

    /// Proposal variance for the overall log coalescence rate
    #[arg(long = "qrateMuProposalS2", default_value = "0.01")]
    pub qrate_mu_proposal_s2: f64,

    /// Proposal variance for the degrees-of-freedom update
    #[arg(long = "dfProposalS2", default_value = "100.0")]
    pub df_proposal_s2: f64,

    // ============ Tile-count prior ============
    /// Negative-binomial size parameter of the tile-count prior
    #[arg(long = "negBiSize", default_value = "10.0")]
    pub neg_bi_size: f64,

    /// Negative-binomial probability parameter of the tile-count prior
    #[arg(long = "negBiProb", default_value = "0.67")]
    pub neg_bi_prob: f64,

    /// Maximum tile count per tessellation
    #[arg(long = "maxTiles", default_value = "300")]
    pub max_tiles: usize,

    // ============ Effect bounds ============
    /// Half interval bounding migration tile effects
    #[arg(long = "mEffctHalfInterval", default_value = "2.4771")]
    pub m_effct_half_interval: f64,

    /// Half interval bounding coalescence tile effects
    #[arg(long = "qEffctHalfInterval", default_value = "0.1")]
    pub q_effct_half_interval: f64,

    // ============ Degrees of freedom ============
    /// Lower bound of the uniform prior on the degrees of freedom
    #[arg(long = "dfmin", default_value = "2.0")]
    pub dfmin: f64,

    /// Upper bound of the uniform prior on the degrees of freedom
    #[arg(long = "dfmax", default_value = "1000.0")]
    pub dfmax: f64,

    // ============ Genetics ============
    /// Genome size in base pairs
    #[arg(long = "genomeSize", default_value = "3e9")]
    pub genome_size: f64,

    /// Per-bp per-generation recombination rate
    #[arg(long = "recombinationRate", default_value = "1e-8")]
    pub recombination_rate: f64,

    /// IBD block length cutoff in base pairs
    #[arg(long = "blockLengthCutoff", default_value = "4e6")]
    pub block_length_cutoff: f64,

    /// Samples are diploid (each individual pair contributes four
    /// haplotype comparisons)
    #[arg(long, default_value = "true")]
    pub diploid: bool,

    // ============ Numerics ============
    /// Krylov subspace dimension for the propagator
    #[arg(long = "krylovDim", default_value = "20")]
    pub krylov_dim: usize,

    /// Gauss-Laguerre quadrature order (30 or 50)
    #[arg(long = "nQuad", default_value = "30")]
    pub n_quad: usize,

    // ============ General ============
    /// Enable periodic self-checks of the tracked log-likelihood
    #[arg(long, default_value = "false")]
    pub testing: bool,

    /// Self-check cadence in iterations (with --testing)
    #[arg(long = "checkInterval", default_value = "10000")]
    pub check_interval: usize,

    /// Random seed for reproducibility
    #[arg(long, default_value = "1")]
    pub seed: u64,

    /// Number of threads (default: all available cores)
    #[arg(long)]
    pub nthreads: Option<usize>,
}

impl Config {
    /// Parse command line arguments and validate
    pub fn parse_and_validate() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        for ext in ["coord", "outer", "sims"] {
            let path = self.datapath.with_extension(ext);
            if !path.exists() {
                return Err(MigsurfError::FileNotFound { path });
            }
        }
        for ext in ["demes", "edges", "ipmap"] {
            let path = self.gridpath.with_extension(ext);
            if !path.exists() {
                return Err(MigsurfError::FileNotFound { path });
            }
        }
        if let Some(ref prev) = self.prevpath {
            let path = prev.join("lastState.txt");
            if !path.exists() {
                return Err(MigsurfError::FileNotFound { path });
            }
        }

        if self.n_indiv == 0 || self.n_demes == 0 {
            return Err(MigsurfError::config("nIndiv and nDemes must be positive"));
        }
        if self.num_burn_iter >= self.num_mcmc_iter {
            return Err(MigsurfError::config(
                "numBurnIter must be smaller than numMCMCIter",
            ));
        }
        if self.num_thin_iter == 0 {
            return Err(MigsurfError::config("numThinIter must be positive"));
        }
        if self.n_quad != 30 && self.n_quad != 50 {
            return Err(MigsurfError::config("nQuad must be 30 or 50"));
        }
        if self.krylov_dim < 2 {
            return Err(MigsurfError::config("krylovDim must be at least 2"));
        }
        if !(0.0..1.0).contains(&self.neg_bi_prob) || self.neg_bi_size <= 0.0 {
            return Err(MigsurfError::config(
                "negBiProb must lie in (0, 1) and negBiSize must be positive",
            ));
        }
        if self.max_tiles == 0 {
            return Err(MigsurfError::config("maxTiles must be positive"));
        }
        if self.m_effct_half_interval <= 0.0 || self.q_effct_half_interval <= 0.0 {
            return Err(MigsurfError::config("effect half intervals must be positive"));
        }
        if self.dfmin >= self.dfmax || self.dfmin <= 0.0 {
            return Err(MigsurfError::config("require 0 < dfmin < dfmax"));
        }
        if self.recombination_rate <= 0.0
            || self.block_length_cutoff <= 0.0
            || self.genome_size <= 0.0
        {
            return Err(MigsurfError::config(
                "genomeSize, recombinationRate and blockLengthCutoff must be positive",
            ));
        }
        for (name, s2) in [
            ("mEffctProposalS2", self.m_effct_proposal_s2),
            ("qEffctProposalS2", self.q_effct_proposal_s2),
            ("mSeedsProposalS2", self.m_seeds_proposal_s2),
            ("qSeedsProposalS2", self.q_seeds_proposal_s2),
            ("mrateMuProposalS2", self.mrate_mu_proposal_s2),
            ("qrateMuProposalS2", self.qrate_mu_proposal_s2),
            ("dfProposalS2", self.df_proposal_s2),
        ] {
            if s2 <= 0.0 {
                return Err(MigsurfError::config(format!("{name} must be positive")));
            }
        }

        Ok(())
    }

    /// Mean of the tile-count prior implied by the negative-binomial keys
    pub fn tile_prior_mean(&self) -> f64 {
        self.neg_bi_size * self.neg_bi_prob / (1.0 - self.neg_bi_prob)
    }

    /// Get the number of threads to use
    pub fn nthreads(&self) -> usize {
        self.nthreads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Whether this run resumes a previous chain
    pub fn is_resume(&self) -> bool {
        self.prevpath.is_some()
    }
}
