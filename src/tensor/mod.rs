//! # Tensor Module
//!
//! Element type, error taxonomy and shape inspection shared by every stage.
//! Volumes are plain `ndarray` arrays laid out as height × width × channels;
//! filter banks are laid out as filters × rows × cols (× channels).

use ndarray::{ArrayBase, ArrayView3, ArrayView4, Axis, Data, Ix3, Ix4, IxDyn, RawData};

// --- Submodules ---
pub mod ops;

// --- Re-exports ---
pub use ops::{correlate2d, max_pool_plane, pooled_extent, relu_in_place};

// --- Error Handling ---
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
    #[error("Channel mismatch: image has {image_channels} channel(s) but filters have {filter_channels}")]
    ChannelMismatch {
        image_channels: usize,
        filter_channels: usize,
    },
    #[error("Filter must be square: got {rows}x{cols}")]
    NonSquareFilter { rows: usize, cols: usize },
    #[error("Filter size must be odd: got {size}")]
    EvenFilterSize { size: usize },
    #[error("Invalid rank for {what}: expected {expected}, got shape {got:?}")]
    InvalidRank {
        what: &'static str,
        expected: &'static str,
        got: Vec<usize>,
    },
    #[error("Filter of size {filter_size} does not fit a {height}x{width} image")]
    FilterTooLarge {
        filter_size: usize,
        height: usize,
        width: usize,
    },
    #[error("Pooling window must be positive: size {size}, stride {stride}")]
    InvalidPoolWindow { size: usize, stride: usize },
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

/// Scalar type of every volume and filter.
pub type TensorData = f32;

// --- Shapes ---

/// Spatial extent and channel count of an input volume.
///
/// A rank-2 array is a single-channel volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl ImageShape {
    pub fn of<S: RawData>(image: &ArrayBase<S, IxDyn>) -> Result<Self, TensorError> {
        match *image.shape() {
            [height, width] => Ok(ImageShape { height, width, channels: 1 }),
            [height, width, channels] => Ok(ImageShape { height, width, channels }),
            _ => Err(TensorError::InvalidRank {
                what: "image",
                expected: "2 (H, W) or 3 (H, W, C)",
                got: image.shape().to_vec(),
            }),
        }
    }
}

/// Geometry of a filter bank.
///
/// A rank-3 bank holds single-channel filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterBankShape {
    pub num_filters: usize,
    pub rows: usize,
    pub cols: usize,
    pub channels: usize,
}

impl FilterBankShape {
    pub fn of<S: RawData>(filters: &ArrayBase<S, IxDyn>) -> Result<Self, TensorError> {
        match *filters.shape() {
            [num_filters, rows, cols] => Ok(FilterBankShape { num_filters, rows, cols, channels: 1 }),
            [num_filters, rows, cols, channels] => Ok(FilterBankShape { num_filters, rows, cols, channels }),
            _ => Err(TensorError::InvalidRank {
                what: "filter bank",
                expected: "3 (N, K, K) or 4 (N, K, K, C)",
                got: filters.shape().to_vec(),
            }),
        }
    }

    /// Checks that every filter is square with an odd edge and returns the edge length.
    pub fn kernel_size(&self) -> Result<usize, TensorError> {
        if self.rows != self.cols {
            return Err(TensorError::NonSquareFilter { rows: self.rows, cols: self.cols });
        }
        if self.rows % 2 == 0 {
            return Err(TensorError::EvenFilterSize { size: self.rows });
        }
        Ok(self.rows)
    }
}

// --- Views ---

/// Views an image as a rank-3 volume, adding a unit channel axis to rank-2 input.
pub(crate) fn volume_view<'a, S>(
    array: &'a ArrayBase<S, IxDyn>,
    what: &'static str,
) -> Result<ArrayView3<'a, TensorData>, TensorError>
where
    S: Data<Elem = TensorData>,
{
    let rank_error = || TensorError::InvalidRank {
        what,
        expected: "2 (H, W) or 3 (H, W, C)",
        got: array.shape().to_vec(),
    };
    let view = match array.ndim() {
        2 => array.view().insert_axis(Axis(2)),
        3 => array.view(),
        _ => return Err(rank_error()),
    };
    view.into_dimensionality::<Ix3>().map_err(|_| rank_error())
}

/// Views a filter bank as rank 4, adding a unit channel axis to rank-3 banks.
pub(crate) fn filter_bank_view<S>(filters: &ArrayBase<S, IxDyn>) -> Result<ArrayView4<'_, TensorData>, TensorError>
where
    S: Data<Elem = TensorData>,
{
    let rank_error = || TensorError::InvalidRank {
        what: "filter bank",
        expected: "3 (N, K, K) or 4 (N, K, K, C)",
        got: filters.shape().to_vec(),
    };
    let view = match filters.ndim() {
        3 => filters.view().insert_axis(Axis(3)),
        4 => filters.view(),
        _ => return Err(rank_error()),
    };
    view.into_dimensionality::<Ix4>().map_err(|_| rank_error())
}
