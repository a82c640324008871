//! # Activation Function Modules

use crate::nn::functional as F;
use crate::nn::Module;
use crate::tensor::{TensorData, TensorError};
use ndarray::ArrayD;

/// Applies the Rectified Linear Unit function element-wise.
/// `ReLU(x) = max(0, x)`
#[derive(Debug, Clone, Copy, Default)]
pub struct ReLU;

impl ReLU {
    pub fn new() -> Self {
        ReLU
    }
}

impl Module for ReLU {
    fn forward(&self, input: &ArrayD<TensorData>) -> Result<ArrayD<TensorData>, TensorError> {
        Ok(F::relu(input))
    }

    fn name(&self) -> &'static str {
        "ReLU"
    }
}
