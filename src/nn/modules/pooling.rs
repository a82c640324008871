//! # Pooling Layer Modules

use crate::nn::functional as F;
use crate::nn::Module;
use crate::tensor::{TensorData, TensorError};
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

/// Window edge and hop of a pooling layer.
///
/// Fields missing from a deserialized config take their defaults
/// (`size = 2`, `stride = 2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub size: usize,
    pub stride: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig { size: 2, stride: 2 }
    }
}

/// Max-pooling over each depth slice.
#[derive(Debug, Clone, Copy)]
pub struct MaxPool2d {
    config: PoolConfig,
}

impl MaxPool2d {
    pub fn new(config: PoolConfig) -> Result<Self, TensorError> {
        if config.size == 0 || config.stride == 0 {
            return Err(TensorError::InvalidPoolWindow { size: config.size, stride: config.stride });
        }
        Ok(MaxPool2d { config })
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }
}

impl Default for MaxPool2d {
    fn default() -> Self {
        MaxPool2d { config: PoolConfig::default() }
    }
}

impl Module for MaxPool2d {
    fn forward(&self, input: &ArrayD<TensorData>) -> Result<ArrayD<TensorData>, TensorError> {
        F::max_pool2d(input, self.config.size, self.config.stride).map(|out| out.into_dyn())
    }

    fn name(&self) -> &'static str {
        "MaxPool2d"
    }
}
