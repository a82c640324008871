//! # Neural Network Module (`nn`)
//!
//! Building blocks for a CNN forward pass, similar to `torch.nn`: a
//! functional interface plus layer objects that can be chained.

use crate::tensor::{TensorData, TensorError};
use crate::utils::ParallelConfig;
use ndarray::ArrayD;
use rayon::ThreadPool;
use std::fmt::Debug;
use std::sync::Arc;

// --- Submodules ---
pub mod functional;
pub mod modules;

// Re-export common items
pub use modules::*;

// --- Core Trait: Module ---

/// Base trait for all layers (convolution, pooling, activation, containers).
/// Needs `Debug` for inspection and `Send + Sync` so a pipeline can run on
/// any rayon pool. Layers hold no mutable state; `forward` may be called
/// concurrently from several threads.
pub trait Module: Debug + Send + Sync {
    /// Performs the forward pass of the module.
    ///
    /// # Arguments
    /// * `input`: The input volume, `H × W` or `H × W × C`.
    ///
    /// # Returns
    /// * `Result<ArrayD<TensorData>, TensorError>`: A freshly allocated output
    ///   volume, or the validation error that stopped the layer. No partial
    ///   output is ever returned.
    fn forward(&self, input: &ArrayD<TensorData>) -> Result<ArrayD<TensorData>, TensorError>;

    /// Short layer name used in logs.
    fn name(&self) -> &'static str;
}

// --- Container: Sequential ---

/// Runs layers in order, feeding each output to the next layer.
#[derive(Debug, Default)]
pub struct Sequential {
    layers: Vec<Box<dyn Module>>,
    pool: Option<Arc<ThreadPool>>,
}

impl Sequential {
    pub fn new() -> Self {
        Sequential { layers: Vec::new(), pool: None }
    }

    /// Appends a layer.
    pub fn add<M: Module + 'static>(mut self, layer: M) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    /// Runs every forward pass on the pool described by `config`.
    pub fn with_parallelism(mut self, config: &ParallelConfig) -> Result<Self, TensorError> {
        self.pool = config.build_pool()?.map(Arc::new);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    fn run(&self, input: &ArrayD<TensorData>) -> Result<ArrayD<TensorData>, TensorError> {
        let mut current = input.to_owned();
        for (index, layer) in self.layers.iter().enumerate() {
            current = layer.forward(&current).map_err(|e| {
                tracing::warn!(layer = layer.name(), index, error = %e, "forward pass aborted");
                e
            })?;
            tracing::trace!(layer = layer.name(), index, shape = ?current.shape(), "layer done");
        }
        Ok(current)
    }
}

impl Module for Sequential {
    fn forward(&self, input: &ArrayD<TensorData>) -> Result<ArrayD<TensorData>, TensorError> {
        match &self.pool {
            Some(pool) => pool.install(|| self.run(input)),
            None => self.run(input),
        }
    }

    fn name(&self) -> &'static str {
        "Sequential"
    }
}
