//! # Data Module
//!
//! Immutable in-memory representations: the habitat polygon, the deme
//! graph, the Voronoi tessellations and the aggregated IBD observations.

pub mod graph;
pub mod habitat;
pub mod observations;
pub mod tessellation;

pub use graph::Graph;
pub use habitat::Habitat;
pub use observations::Observations;
pub use tessellation::Tessellation;
