//! # Tensor Operations
//!
//! Leaf kernels over single planes. These do no validation: the stages in
//! `nn::functional` check shapes before calling in.

use super::TensorData;
use ndarray::{s, Array2, ArrayBase, Data, DataMut, Dimension, Ix2};

// --- Convolution ---

/// Valid-mode cross-correlation of one plane with one 2-D filter, stride 1.
///
/// Only positions where the filter lies fully inside the plane are computed,
/// so the result is `(H - k + 1) × (W - k + 1)`. A filter larger than the
/// plane yields an empty result.
pub fn correlate2d<S, T>(plane: &ArrayBase<S, Ix2>, filter: &ArrayBase<T, Ix2>) -> Array2<TensorData>
where
    S: Data<Elem = TensorData>,
    T: Data<Elem = TensorData>,
{
    let (height, width) = plane.dim();
    let (k_rows, k_cols) = filter.dim();
    let out_rows = (height + 1).saturating_sub(k_rows);
    let out_cols = (width + 1).saturating_sub(k_cols);

    Array2::from_shape_fn((out_rows, out_cols), |(r, c)| {
        let window = plane.slice(s![r..r + k_rows, c..c + k_cols]);
        window.iter().zip(filter.iter()).map(|(&x, &w)| x * w).sum()
    })
}

// --- Pooling ---

/// Number of `size`-wide windows that fit in `len` when hopping by `stride`.
pub fn pooled_extent(len: usize, size: usize, stride: usize) -> usize {
    if size == 0 || stride == 0 || len < size {
        return 0;
    }
    (len - size) / stride + 1
}

/// Max-pools one plane with square `size` windows placed every `stride` cells.
pub fn max_pool_plane<S>(plane: &ArrayBase<S, Ix2>, size: usize, stride: usize) -> Array2<TensorData>
where
    S: Data<Elem = TensorData>,
{
    let (height, width) = plane.dim();
    let out_rows = pooled_extent(height, size, stride);
    let out_cols = pooled_extent(width, size, stride);

    Array2::from_shape_fn((out_rows, out_cols), |(r, c)| {
        let (r0, c0) = (r * stride, c * stride);
        plane
            .slice(s![r0..r0 + size, c0..c0 + size])
            .iter()
            .copied()
            .reduce(TensorData::max)
            .unwrap_or(TensorData::NEG_INFINITY)
    })
}

// --- Activation ---

/// Clamps negatives to zero across the whole array, element-parallel.
/// NaN passes through unchanged.
pub fn relu_in_place<S, D>(array: &mut ArrayBase<S, D>)
where
    S: DataMut<Elem = TensorData>,
    D: Dimension,
{
    array.par_mapv_inplace(|v| if v < 0.0 { 0.0 } else { v });
}
