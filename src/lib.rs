//! # rconv Core Library
//!
//! Forward pass of convolutional-network building blocks over dense
//! `ndarray` volumes: valid-mode convolution against a filter bank,
//! max-pooling and ReLU. Every stage is a pure function of its inputs and
//! is data-parallel through `rayon`.
//!
//! ```
//! use ndarray::{Array, ArrayD, IxDyn};
//! use rconv_lib::nn::functional as F;
//!
//! let image = Array::from_shape_fn((5, 5), |(r, c)| (r * 5 + c) as f32).into_dyn();
//! let filters = ArrayD::<f32>::ones(IxDyn(&[1, 3, 3]));
//!
//! let maps = F::conv2d(&image, &filters)?;
//! assert_eq!(maps.dim(), (3, 3, 1));
//! assert_eq!(maps[[0, 0, 0]], 54.0);
//!
//! let pooled = F::max_pool2d(&maps.into_dyn(), 2, 2)?;
//! let activated = F::relu(&pooled);
//! assert_eq!(activated.dim(), (1, 1, 1));
//! # Ok::<(), rconv_lib::tensor::TensorError>(())
//! ```

pub mod tensor;
pub mod nn;
pub mod utils;

pub mod prelude {
    pub use crate::nn::functional::{conv2d, max_pool2d, relu};
    pub use crate::nn::{Conv2d, MaxPool2d, Module, PoolConfig, ReLU, Sequential};
    pub use crate::tensor::{TensorData, TensorError};
    pub use crate::utils::ParallelConfig;
}
