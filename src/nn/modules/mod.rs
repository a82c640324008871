//! # Neural Network Layer Modules
//!
//! Layer objects wrapping the functional stages.

pub mod conv;
pub use conv::Conv2d;

pub mod pooling;
pub use pooling::{MaxPool2d, PoolConfig};

pub mod activation;
pub use activation::ReLU;
