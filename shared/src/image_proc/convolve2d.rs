//! Direct 2D convolution and elliptical Gaussian kernels
//!
//! Direct convolution is the reference implementation and is fast for the
//! small kernels of coarse grids; large kernels should go through
//! [`crate::image_proc::FftConvolver`].

use std::ops::Range;

use ndarray::{s, Array2, ArrayView2};

/// Destination and source index ranges of an axis of length `len` shifted by `shift`.
fn shifted_overlap(len: usize, shift: isize) -> Option<(Range<usize>, Range<usize>)> {
    let offset = shift.unsigned_abs();
    if offset >= len {
        return None;
    }
    if shift >= 0 {
        Some((offset..len, 0..len - offset))
    } else {
        Some((0..len - offset, offset..len))
    }
}

/// Convolve `image` with `kernel`, returning an image of the same size.
///
/// Pixels outside the image are treated as zero, so flux spread beyond the
/// border is lost. This is a true convolution (the kernel is flipped) and
/// agrees with the FFT implementation for asymmetric kernels. The kernel
/// centre is at `(rows / 2, cols / 2)`.
pub fn convolve2d(image: &ArrayView2<f64>, kernel: &ArrayView2<f64>) -> Array2<f64> {
    let (rows, cols) = image.dim();
    let (ker_rows, ker_cols) = kernel.dim();
    let mut output = Array2::zeros((rows, cols));
    if ker_rows == 0 || ker_cols == 0 {
        return output;
    }

    let center_row = (ker_rows / 2) as isize;
    let center_col = (ker_cols / 2) as isize;

    // Accumulate one shifted copy of the image per kernel tap
    for ((ki, kj), &weight) in kernel.indexed_iter() {
        if weight == 0.0 {
            continue;
        }
        let row_overlap = shifted_overlap(rows, ki as isize - center_row);
        let col_overlap = shifted_overlap(cols, kj as isize - center_col);
        if let (Some((dst_rows, src_rows)), Some((dst_cols, src_cols))) = (row_overlap, col_overlap)
        {
            output
                .slice_mut(s![dst_rows, dst_cols])
                .scaled_add(weight, &image.slice(s![src_rows, src_cols]));
        }
    }

    output
}

/// Create a normalized elliptical Gaussian kernel
///
/// The kernel is sampled at pixel centres on a square support of half-width
/// `ceil(truncate * sigma_major)` and normalized to sum to one, so convolving
/// with it conserves the total of the image (away from the edges).
///
/// # Arguments
/// * `sigma_major` - Standard deviation along the major axis, in pixels
/// * `sigma_minor` - Standard deviation along the minor axis, in pixels
/// * `position_angle` - Angle of the major axis in radians, counter-clockwise from +y
/// * `truncate` - Support half-width in units of `sigma_major`
///
/// # Returns
/// * Gaussian kernel as a 2D array with odd side length, indexed `[y, x]`
pub fn elliptical_gaussian_kernel(
    sigma_major: f64,
    sigma_minor: f64,
    position_angle: f64,
    truncate: f64,
) -> Array2<f64> {
    let half = (truncate * sigma_major).ceil().max(1.0) as usize;
    let size = 2 * half + 1;
    let center = half as f64;

    // Unit vectors along the major and minor axes in (x, y)
    let (sin_pa, cos_pa) = position_angle.sin_cos();
    let major = (-sin_pa, cos_pa);
    let minor = (cos_pa, sin_pa);

    let mut kernel = Array2::from_shape_fn((size, size), |(i, j)| {
        let dx = j as f64 - center;
        let dy = i as f64 - center;
        let u = dx * major.0 + dy * major.1;
        let w = dx * minor.0 + dy * minor.1;
        (-(u * u) / (2.0 * sigma_major * sigma_major) - (w * w) / (2.0 * sigma_minor * sigma_minor))
            .exp()
    });

    // Normalize the kernel
    let sum = kernel.sum();
    if sum > 0.0 {
        kernel.mapv_inplace(|x| x / sum);
    }

    kernel
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_box_kernel_sums_neighbours() {
        let image = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let kernel = Array2::from_elem((3, 3), 1.0);
        let result = convolve2d(&image.view(), &kernel.view());

        assert_eq!(result[[1, 1]], 45.0);
        assert_eq!(result[[0, 0]], 1.0 + 2.0 + 4.0 + 5.0);
        assert_eq!(result[[2, 1]], 4.0 + 5.0 + 6.0 + 7.0 + 8.0 + 9.0);
    }

    #[test]
    fn test_kernel_larger_than_image() {
        let image = array![[1.0, 0.0], [0.0, 0.0]];
        let kernel = Array2::from_elem((7, 7), 0.5);
        let result = convolve2d(&image.view(), &kernel.view());
        assert_eq!(result, Array2::from_elem((2, 2), 0.5));
    }

    #[test]
    fn test_convolve2d_same_flips_kernel() {
        let mut image = Array2::zeros((5, 5));
        image[[2, 2]] = 1.0;

        // Asymmetric kernel: impulse response must reproduce it unflipped
        let kernel = array![[0.0, 1.0, 0.0], [0.0, 0.0, 2.0], [0.0, 0.0, 0.0]];
        let result = convolve2d(&image.view(), &kernel.view());

        assert_eq!(result[[1, 2]], 1.0);
        assert_eq!(result[[2, 3]], 2.0);
        assert_relative_eq!(result.sum(), 3.0);
    }

    #[test]
    fn test_elliptical_kernel_normalized() {
        let kernel = elliptical_gaussian_kernel(3.0, 1.5, 0.3, 4.0);
        assert_relative_eq!(kernel.sum(), 1.0, epsilon = 1e-12);

        let (rows, cols) = kernel.dim();
        assert_eq!(rows, cols);
        assert_eq!(rows % 2, 1);
        assert_eq!(rows, 2 * 12 + 1);
    }

    #[test]
    fn test_elliptical_kernel_orientation() {
        // PA = 0: major axis along y
        let kernel = elliptical_gaussian_kernel(3.0, 1.0, 0.0, 4.0);
        let c = kernel.dim().0 / 2;
        assert!(kernel[[c + 3, c]] > kernel[[c, c + 3]]);

        // PA = 90 degrees: major axis along x
        let rotated = elliptical_gaussian_kernel(3.0, 1.0, FRAC_PI_2, 4.0);
        assert!(rotated[[c, c + 3]] > rotated[[c + 3, c]]);
        assert_relative_eq!(rotated[[c, c + 3]], kernel[[c + 3, c]], epsilon = 1e-12);
    }

    #[test]
    fn test_circular_kernel_symmetry() {
        let kernel = elliptical_gaussian_kernel(2.0, 2.0, 1.1, 4.0);
        let c = kernel.dim().0 / 2;

        assert_relative_eq!(kernel[[c + 2, c]], kernel[[c, c + 2]], epsilon = 1e-12);
        assert_relative_eq!(kernel[[c - 1, c + 1]], kernel[[c + 1, c - 1]], epsilon = 1e-12);
        assert!(kernel[[c, c]] > kernel[[c, c + 1]]);
    }
}
