//! # I/O Module
//!
//! File reading/writing boundaries. Converts between the line-delimited
//! disk formats and the in-memory data structures.

pub mod input;
pub mod output;

pub use input::Dataset;
pub use output::SampleLog;
