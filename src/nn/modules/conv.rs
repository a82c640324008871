//! # Convolutional Layer Modules

use crate::nn::functional as F;
use crate::nn::Module;
use crate::tensor::{FilterBankShape, TensorData, TensorError};
use ndarray::ArrayD;

/// Valid-mode, stride-1 convolution against a fixed filter bank.
///
/// The bank is `N × K × K` for single-channel input or `N × K × K × C`.
#[derive(Debug, Clone)]
pub struct Conv2d {
    filters: ArrayD<TensorData>,
    shape: FilterBankShape,
}

impl Conv2d {
    /// Wraps a filter bank, rejecting non-square or even-sized filters up front.
    pub fn new(filters: ArrayD<TensorData>) -> Result<Self, TensorError> {
        let shape = F::validate_filter_bank(&filters)?;
        Ok(Conv2d { filters, shape })
    }

    pub fn num_filters(&self) -> usize {
        self.shape.num_filters
    }

    pub fn filter_size(&self) -> usize {
        self.shape.rows
    }

    pub fn in_channels(&self) -> usize {
        self.shape.channels
    }

    pub fn filters(&self) -> &ArrayD<TensorData> {
        &self.filters
    }
}

impl Module for Conv2d {
    fn forward(&self, input: &ArrayD<TensorData>) -> Result<ArrayD<TensorData>, TensorError> {
        F::conv2d(input, &self.filters).map(|out| out.into_dyn())
    }

    fn name(&self) -> &'static str {
        "Conv2d"
    }
}
