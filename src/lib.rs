//! # migsurf Library
//!
//! Estimates effective migration and coalescence surfaces across a spatial
//! habitat from pairwise identity-by-descent (IBD) block-sharing counts.
//! A reversible-jump MCMC sampler explores two Voronoi tessellations of
//! the habitat; each likelihood evaluation propagates a structured-
//! coalescent CTMC with Krylov-subspace matrix exponentials and folds the
//! coalescence-time distribution through Gauss-Laguerre quadrature.
//!
//! ## Modules
//! - `config`: CLI argument parsing and validation
//! - `data`: habitat polygon, deme graph, tessellations, observations
//! - `error`: error types and result alias
//! - `io`: input parsing, output accumulators, checkpointing
//! - `model`: CTMC, propagator, quadrature, likelihood, proposals, prior
//! - `pipelines`: the chain driver
//! - `utils`: propagator workspace and density helpers

pub mod config;
pub mod data;
pub mod error;
pub mod io;
pub mod model;
pub mod pipelines;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use data::{Graph, Habitat, Observations, Tessellation};
pub use error::{MigsurfError, Result};
pub use io::{Dataset, SampleLog};
pub use model::{
    ChainState, FieldKind, Generator, IbdLikelihood, MoveType, Prior, Propagator, ProposalEngine,
    Quadrature, RateFields, SharingLikelihood,
};
pub use pipelines::InferencePipeline;
pub use utils::PropagatorWorkspace;
