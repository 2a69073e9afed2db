//! # Pipelines
//!
//! High-level workflow orchestration for the MCMC run.

pub mod inference;

pub use inference::InferencePipeline;
