//! # Neural Network Functional Interface (`nn::functional`)
//!
//! Stateless forward stages, mirroring `torch.nn.functional`: valid-mode
//! convolution against a filter bank, max-pooling and ReLU. Every stage reads
//! its input and returns a freshly allocated volume.

use crate::tensor::{
    correlate2d, filter_bank_view, max_pool_plane, pooled_extent, relu_in_place, volume_view, FilterBankShape,
    ImageShape, TensorData, TensorError,
};
use ndarray::{s, Array, Array2, Array3, ArrayBase, ArrayView3, ArrayView4, Data, Dimension, IxDyn};
use rayon::prelude::*;

// --- Convolution ---

/// Validates a filter bank on its own: rank 3 or 4, square, odd edge.
///
/// Returns the bank's geometry. Matching the bank to an image's channel
/// count is left to [`conv2d`].
pub fn validate_filter_bank<S>(filters: &ArrayBase<S, IxDyn>) -> Result<FilterBankShape, TensorError>
where
    S: Data<Elem = TensorData>,
{
    let bank = FilterBankShape::of(filters)?;
    bank.kernel_size()?;
    Ok(bank)
}

/// Convolves an image volume with every filter of a bank.
///
/// `image` is `H × W` or `H × W × C`; `filters` is `N × K × K` (single
/// channel) or `N × K × K × C`. The result is `(H-K+1) × (W-K+1) × N`, one
/// feature map per filter, with channel contributions summed.
///
/// # Arguments
/// * `image`: The input volume. Owned arrays and views are both accepted.
/// * `filters`: The filter bank; every filter must be square with an odd edge
///   and carry as many channels as the image.
///
/// # Returns
/// * `Result<Array3<TensorData>, TensorError>`: The stacked feature maps.
///   Fails before computing anything with `ChannelMismatch`,
///   `NonSquareFilter`, `EvenFilterSize` (checked in that order),
///   `InvalidRank` or `FilterTooLarge`.
#[tracing::instrument(level = "debug", skip_all, fields(image = ?image.shape(), filters = ?filters.shape()))]
pub fn conv2d<S, T>(image: &ArrayBase<S, IxDyn>, filters: &ArrayBase<T, IxDyn>) -> Result<Array3<TensorData>, TensorError>
where
    S: Data<Elem = TensorData>,
    T: Data<Elem = TensorData>,
{
    let geometry = check_conv_shapes(image, filters).map_err(|e| {
        tracing::warn!(error = %e, "rejected convolution input");
        e
    })?;
    let (image, bank) = (volume_view(image, "image")?, filter_bank_view(filters)?);

    let maps: Vec<Array2<TensorData>> = (0..geometry.num_filters)
        .into_par_iter()
        .map(|f| {
            tracing::debug!(filter = f + 1, of = geometry.num_filters, "convolving filter");
            feature_map(&image, &bank, f)
        })
        .collect();

    let out_rows = geometry.image.height - geometry.kernel + 1;
    let out_cols = geometry.image.width - geometry.kernel + 1;
    Ok(stack_planes((out_rows, out_cols), &maps))
}

struct ConvGeometry {
    image: ImageShape,
    kernel: usize,
    num_filters: usize,
}

fn check_conv_shapes<S, T>(image: &ArrayBase<S, IxDyn>, filters: &ArrayBase<T, IxDyn>) -> Result<ConvGeometry, TensorError>
where
    S: Data<Elem = TensorData>,
    T: Data<Elem = TensorData>,
{
    let image = ImageShape::of(image)?;
    let bank = FilterBankShape::of(filters)?;
    if image.channels != bank.channels {
        return Err(TensorError::ChannelMismatch {
            image_channels: image.channels,
            filter_channels: bank.channels,
        });
    }
    let kernel = bank.kernel_size()?;
    if kernel > image.height || kernel > image.width {
        return Err(TensorError::FilterTooLarge {
            filter_size: kernel,
            height: image.height,
            width: image.width,
        });
    }
    Ok(ConvGeometry { image, kernel, num_filters: bank.num_filters })
}

/// One filter's output plane: per-channel correlations folded in channel order.
fn feature_map(image: &ArrayView3<'_, TensorData>, bank: &ArrayView4<'_, TensorData>, f: usize) -> Array2<TensorData> {
    let channels = image.dim().2;
    let per_channel: Vec<Array2<TensorData>> = (0..channels)
        .into_par_iter()
        .map(|ch| correlate2d(&image.slice(s![.., .., ch]), &bank.slice(s![f, .., .., ch])))
        .collect();

    let (_, k_rows, k_cols, _) = bank.dim();
    let (height, width, _) = image.dim();
    per_channel
        .into_iter()
        .reduce(|acc, plane| acc + plane)
        .unwrap_or_else(|| Array2::zeros((height + 1 - k_rows, width + 1 - k_cols)))
}

/// Stacks equally shaped planes along a new trailing depth axis.
fn stack_planes(plane_dim: (usize, usize), planes: &[Array2<TensorData>]) -> Array3<TensorData> {
    let mut out = Array3::zeros((plane_dim.0, plane_dim.1, planes.len()));
    for (depth, plane) in planes.iter().enumerate() {
        out.slice_mut(s![.., .., depth]).assign(plane);
    }
    out
}

// --- Pooling ---

/// Max-pools every depth slice of a volume independently.
///
/// `feature_map` is `H × W` or `H × W × D`. Windows are `size × size`, placed
/// every `stride` cells from the top-left corner while they fit. The result
/// is `(⌊(H-size)/stride⌋+1) × (⌊(W-size)/stride⌋+1) × D`, with zero extent
/// along an axis shorter than `size`.
///
/// # Arguments
/// * `feature_map`: The volume to downsample, usually the output of [`conv2d`].
/// * `size`: Window edge length (commonly 2).
/// * `stride`: Hop between windows (commonly 2).
///
/// # Returns
/// * `Result<Array3<TensorData>, TensorError>`: The pooled volume, or
///   `InvalidPoolWindow` if `size` or `stride` is zero.
#[tracing::instrument(level = "debug", skip(feature_map), fields(input = ?feature_map.shape()))]
pub fn max_pool2d<S>(feature_map: &ArrayBase<S, IxDyn>, size: usize, stride: usize) -> Result<Array3<TensorData>, TensorError>
where
    S: Data<Elem = TensorData>,
{
    if size == 0 || stride == 0 {
        tracing::warn!(size, stride, "rejected pooling window");
        return Err(TensorError::InvalidPoolWindow { size, stride });
    }
    let volume = volume_view(feature_map, "feature map")?;
    let (height, width, depth) = volume.dim();

    let pooled: Vec<Array2<TensorData>> = (0..depth)
        .into_par_iter()
        .map(|d| max_pool_plane(&volume.slice(s![.., .., d]), size, stride))
        .collect();

    let plane_dim = (pooled_extent(height, size, stride), pooled_extent(width, size, stride));
    Ok(stack_planes(plane_dim, &pooled))
}

// --- Activation Functions ---

/// Applies the Rectified Linear Unit function element-wise.
/// `relu(x) = max(0, x)`; the output has the input's shape.
pub fn relu<S, D>(input: &ArrayBase<S, D>) -> Array<TensorData, D>
where
    S: Data<Elem = TensorData>,
    D: Dimension,
{
    let mut out = input.to_owned();
    relu_in_place(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use ndarray::{Array4, ArrayD, Axis};
    use proptest::prelude::*;

    fn sequential_image(height: usize, width: usize) -> Array2<TensorData> {
        Array::from_shape_fn((height, width), |(r, c)| (r * width + c) as TensorData)
    }

    #[test]
    fn all_ones_filter_sums_top_left_block() {
        let image = sequential_image(5, 5).into_dyn();
        let filters = ArrayD::<TensorData>::ones(IxDyn(&[1, 3, 3]));
        let out = conv2d(&image, &filters).unwrap();

        assert_eq!(out.dim(), (3, 3, 1));
        assert_eq!(out[[0, 0, 0]], 54.0);
    }

    #[test]
    fn each_filter_fills_its_own_depth_slice() {
        let image = sequential_image(4, 6);
        let mut filters = Array3::<TensorData>::zeros((3, 3, 3));
        filters[[0, 1, 1]] = 1.0; // centre tap: picks the window centre
        filters[[1, 0, 0]] = 2.0; // doubled top-left
        filters[[2, 2, 2]] = -1.0; // negated bottom-right
        let out = conv2d(&image.clone().into_dyn(), &filters.into_dyn()).unwrap();

        assert_eq!(out.dim(), (2, 4, 3));
        for r in 0..2 {
            for c in 0..4 {
                assert_eq!(out[[r, c, 0]], image[[r + 1, c + 1]]);
                assert_eq!(out[[r, c, 1]], 2.0 * image[[r, c]]);
                assert_eq!(out[[r, c, 2]], -image[[r + 2, c + 2]]);
            }
        }
    }

    #[test]
    fn channels_are_summed_into_one_map() {
        let red = Array2::<TensorData>::from_elem((4, 4), 1.0);
        let green = Array2::<TensorData>::from_elem((4, 4), 10.0);
        let image = ndarray::stack(Axis(2), &[red.view(), green.view()]).unwrap().into_dyn();
        let filters = Array4::<TensorData>::ones((1, 3, 3, 2)).into_dyn();
        let out = conv2d(&image, &filters).unwrap();

        assert_eq!(out.dim(), (2, 2, 1));
        assert!(out.iter().all(|&v| v == 9.0 + 90.0));
    }

    #[test]
    fn multi_channel_matches_sum_of_single_channel_convolutions() {
        let image = Array::from_shape_fn((6, 5, 3), |(r, c, ch)| ((r * 7 + c * 3 + ch * 11) % 13) as TensorData - 6.0);
        let filters = Array::from_shape_fn((2, 3, 3, 3), |(f, r, c, ch)| ((f + r * 2 + c + ch * 5) % 7) as TensorData - 3.0);
        let out = conv2d(&image.clone().into_dyn(), &filters.clone().into_dyn()).unwrap();

        for f in 0..2 {
            let mut expected = Array2::<TensorData>::zeros((4, 3));
            for ch in 0..3 {
                let plane = image.index_axis(Axis(2), ch).to_owned().into_dyn();
                let single = filters.slice(s![f..f + 1, .., .., ch]).to_owned().into_dyn();
                expected = expected + conv2d(&plane, &single).unwrap().index_axis(Axis(2), 0);
            }
            assert_eq!(out.index_axis(Axis(2), f), expected);
        }
    }

    #[test]
    fn single_channel_volume_accepts_single_channel_bank() {
        let image = sequential_image(5, 5).insert_axis(Axis(2)).into_dyn();
        let filters = ArrayD::<TensorData>::ones(IxDyn(&[2, 3, 3]));
        assert_eq!(conv2d(&image, &filters).unwrap().dim(), (3, 3, 2));
    }

    #[test]
    fn channel_mismatch_is_rejected() {
        let image = ArrayD::<TensorData>::zeros(IxDyn(&[8, 8, 3]));
        let filters = ArrayD::<TensorData>::zeros(IxDyn(&[4, 3, 3, 2]));
        assert_eq!(
            conv2d(&image, &filters),
            Err(TensorError::ChannelMismatch { image_channels: 3, filter_channels: 2 })
        );

        let filters = ArrayD::<TensorData>::zeros(IxDyn(&[4, 3, 3]));
        assert_matches!(conv2d(&image, &filters), Err(TensorError::ChannelMismatch { .. }));
    }

    #[test]
    fn even_filter_is_rejected() {
        let image = sequential_image(8, 8).into_dyn();
        let filters = ArrayD::<TensorData>::ones(IxDyn(&[1, 4, 4]));
        assert_eq!(conv2d(&image, &filters), Err(TensorError::EvenFilterSize { size: 4 }));
    }

    #[test]
    fn non_square_filter_is_rejected() {
        let image = sequential_image(8, 8).into_dyn();
        let filters = ArrayD::<TensorData>::ones(IxDyn(&[1, 3, 5]));
        assert_eq!(conv2d(&image, &filters), Err(TensorError::NonSquareFilter { rows: 3, cols: 5 }));
    }

    #[test]
    fn channel_check_runs_before_kernel_checks() {
        let image = ArrayD::<TensorData>::zeros(IxDyn(&[8, 8, 3]));
        let filters = ArrayD::<TensorData>::zeros(IxDyn(&[1, 4, 4, 2]));
        assert_matches!(conv2d(&image, &filters), Err(TensorError::ChannelMismatch { .. }));
    }

    #[test]
    fn oversized_filter_is_rejected() {
        let image = sequential_image(3, 8).into_dyn();
        let filters = ArrayD::<TensorData>::ones(IxDyn(&[1, 5, 5]));
        assert_eq!(
            conv2d(&image, &filters),
            Err(TensorError::FilterTooLarge { filter_size: 5, height: 3, width: 8 })
        );
    }

    #[test]
    fn bad_ranks_are_rejected() {
        let line = ArrayD::<TensorData>::zeros(IxDyn(&[8]));
        let filters = ArrayD::<TensorData>::ones(IxDyn(&[1, 3, 3]));
        assert_matches!(conv2d(&line, &filters), Err(TensorError::InvalidRank { what: "image", .. }));

        let image = sequential_image(5, 5).into_dyn();
        let single = ArrayD::<TensorData>::ones(IxDyn(&[3, 3]));
        assert_matches!(conv2d(&image, &single), Err(TensorError::InvalidRank { what: "filter bank", .. }));
    }

    #[test]
    fn validate_filter_bank_reports_geometry() {
        let filters = ArrayD::<TensorData>::zeros(IxDyn(&[4, 5, 5, 3]));
        let bank = validate_filter_bank(&filters).unwrap();
        assert_eq!(bank, FilterBankShape { num_filters: 4, rows: 5, cols: 5, channels: 3 });

        let even = ArrayD::<TensorData>::zeros(IxDyn(&[4, 2, 2]));
        assert_eq!(validate_filter_bank(&even), Err(TensorError::EvenFilterSize { size: 2 }));
    }

    #[test]
    fn empty_bank_gives_zero_depth() {
        let image = sequential_image(5, 5).into_dyn();
        let filters = ArrayD::<TensorData>::zeros(IxDyn(&[0, 3, 3]));
        assert_eq!(conv2d(&image, &filters).unwrap().dim(), (3, 3, 0));
    }

    #[test]
    fn pool_takes_block_maxima() {
        let input = Array::from_shape_fn((4, 4, 1), |(r, c, _)| (r * 4 + c) as TensorData).into_dyn();
        let out = max_pool2d(&input, 2, 2).unwrap();

        assert_eq!(out.dim(), (2, 2, 1));
        assert_eq!(out[[0, 0, 0]], 5.0);
        assert_eq!(out[[0, 1, 0]], 7.0);
        assert_eq!(out[[1, 0, 0]], 13.0);
        assert_eq!(out[[1, 1, 0]], 15.0);
    }

    #[test]
    fn pool_keeps_depth_slices_apart() {
        let input = Array::from_shape_fn((2, 2, 3), |(r, c, d)| (d * 100 + r * 2 + c) as TensorData).into_dyn();
        let out = max_pool2d(&input, 2, 2).unwrap();
        assert_eq!(out.dim(), (1, 1, 3));
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![3.0, 103.0, 203.0]);
    }

    #[test]
    fn pool_drops_partial_windows() {
        let input = ArrayD::<TensorData>::ones(IxDyn(&[5, 7, 2]));
        assert_eq!(max_pool2d(&input, 2, 2).unwrap().dim(), (2, 3, 2));
        assert_eq!(max_pool2d(&input, 3, 1).unwrap().dim(), (3, 5, 2));
    }

    #[test]
    fn pool_of_small_input_is_empty() {
        let input = ArrayD::<TensorData>::ones(IxDyn(&[1, 6, 2]));
        assert_eq!(max_pool2d(&input, 2, 2).unwrap().dim(), (0, 3, 2));
    }

    #[test]
    fn pool_accepts_plane() {
        let input = sequential_image(4, 4).into_dyn();
        assert_eq!(max_pool2d(&input, 2, 2).unwrap().dim(), (2, 2, 1));
    }

    #[test]
    fn zero_window_is_rejected() {
        let input = ArrayD::<TensorData>::ones(IxDyn(&[4, 4, 1]));
        assert_eq!(max_pool2d(&input, 0, 2), Err(TensorError::InvalidPoolWindow { size: 0, stride: 2 }));
        assert_eq!(max_pool2d(&input, 2, 0), Err(TensorError::InvalidPoolWindow { size: 2, stride: 0 }));
    }

    #[test]
    fn relu_zeroes_negatives_and_keeps_shape() {
        let input = Array::from_shape_fn((3, 2, 2), |(r, c, d)| r as TensorData - c as TensorData - d as TensorData);
        let out = relu(&input);
        assert_eq!(out.dim(), input.dim());
        for (&x, &y) in input.iter().zip(out.iter()) {
            assert_eq!(y, if x >= 0.0 { x } else { 0.0 });
        }
    }

    fn volume(max_side: usize, max_depth: usize) -> impl Strategy<Value = Array3<TensorData>> {
        (1..=max_side, 1..=max_side, 1..=max_depth).prop_flat_map(|(h, w, d)| {
            prop::collection::vec(-100i32..100, h * w * d)
                .prop_map(move |v| Array3::from_shape_vec((h, w, d), v.into_iter().map(|x| x as TensorData / 4.0).collect::<Vec<_>>()).unwrap())
        })
    }

    proptest! {
        #[test]
        fn conv_output_shape(h in 3usize..12, w in 3usize..12, c in 1usize..4, n in 1usize..4, half in 0usize..2) {
            let k = 2 * half + 1;
            let image = ArrayD::<TensorData>::zeros(IxDyn(&[h, w, c]));
            let filters = ArrayD::<TensorData>::zeros(IxDyn(&[n, k, k, c]));
            prop_assert_eq!(conv2d(&image, &filters).unwrap().dim(), (h - k + 1, w - k + 1, n));
        }

        #[test]
        fn conv_magnitude_is_bounded(
            image in volume(9, 1),
            taps in prop::collection::vec(-20i32..20, 9),
        ) {
            prop_assume!(image.dim().0 >= 3 && image.dim().1 >= 3);
            let filter = Array::from_shape_vec((1, 3, 3), taps.into_iter().map(|t| t as TensorData / 2.0).collect::<Vec<_>>()).unwrap();
            let bound = filter.iter().map(|v| v.abs()).sum::<TensorData>()
                * image.iter().map(|v| v.abs()).fold(0.0, TensorData::max);
            let plane = image.index_axis(ndarray::Axis(2), 0).to_owned().into_dyn();
            let out = conv2d(&plane, &filter.into_dyn()).unwrap();
            prop_assert!(out.iter().all(|v| v.abs() <= bound + 1e-3));
        }

        #[test]
        fn conv_is_linear_in_the_filter(
            image in volume(8, 2),
            f1 in prop::collection::vec(-8i32..8, 18),
            f2 in prop::collection::vec(-8i32..8, 18),
            a in -4i32..4,
            b in -4i32..4,
        ) {
            let (h, w, c) = image.dim();
            prop_assume!(h >= 3 && w >= 3);
            let bank = |taps: &[i32]| Array::from_shape_vec((1, 3, 3, c), taps[..9 * c].iter().map(|&t| t as TensorData).collect::<Vec<_>>()).unwrap();
            let (f1, f2) = (bank(&f1), bank(&f2));
            let (a, b) = (a as TensorData, b as TensorData);
            let combined = &f1 * a + &f2 * b;

            let image = image.into_dyn();
            let lhs = conv2d(&image, &combined.into_dyn()).unwrap();
            let rhs = conv2d(&image, &f1.into_dyn()).unwrap() * a + conv2d(&image, &f2.into_dyn()).unwrap() * b;
            for (x, y) in lhs.iter().zip(rhs.iter()) {
                prop_assert!((x - y).abs() <= 1e-2 * (1.0 + y.abs()));
            }
        }

        #[test]
        fn pool_output_shape(input in volume(12, 3), size in 1usize..4, stride in 1usize..4) {
            let (h, w, d) = input.dim();
            let out = max_pool2d(&input.into_dyn(), size, stride).unwrap();
            prop_assert_eq!(out.dim(), (pooled_extent(h, size, stride), pooled_extent(w, size, stride), d));
        }

        #[test]
        fn relu_is_idempotent(input in volume(8, 3)) {
            let once = relu(&input);
            prop_assert_eq!(relu(&once), once.clone());
            prop_assert!(once.iter().all(|&v| v >= 0.0));
        }
    }
}
