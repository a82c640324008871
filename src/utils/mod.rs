//! # Utility Functions (`utils`)
//!
//! Execution helpers shared by the stages.

pub mod parallel;

pub use parallel::ParallelConfig;
