//! # Inference Core
//!
//! The structured-coalescent CTMC, its Krylov/Pade propagation, the
//! Gauss-Laguerre sharing integral, the Poisson likelihood, and the
//! RJ-MCMC proposal machinery.

pub mod ctmc;
pub mod likelihood;
pub mod pade;
pub mod prior;
pub mod propagator;
pub mod proposal;
pub mod quadrature;
pub mod state;

pub use ctmc::{n_states, pair_index, Generator, RateFields};
pub use likelihood::{FlatLikelihood, IbdLikelihood, SharingLikelihood};
pub use prior::Prior;
pub use propagator::Propagator;
pub use proposal::{mh_step, MoveType, Proposal, ProposalEngine, ProposalKind};
pub use quadrature::Quadrature;
pub use state::{ChainState, FieldKind};
