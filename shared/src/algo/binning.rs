//! Block binning of oversampled arrays
//!
//! Binning reduces an oversampled array by summing non-overlapping blocks.
//! Summation (rather than averaging) keeps the total of the array unchanged,
//! which is what flux-carrying arrays need: the sum of the binned output equals
//! the sum of the input up to floating point rounding.

use ndarray::{Array2, Array3, ArrayView2, ArrayView3};
use thiserror::Error;

/// Errors raised when constructing a binning operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BinningError {
    #[error("Binning factor must be at least 1 on every axis, got {0:?}")]
    ZeroFactor(Vec<usize>),
    #[error("Axis {axis} of length {len} is not divisible by binning factor {factor}")]
    NotDivisible {
        axis: usize,
        len: usize,
        factor: usize,
    },
}

fn check_factors(dims: &[usize], factors: &[usize]) -> Result<(), BinningError> {
    if factors.iter().any(|&f| f == 0) {
        return Err(BinningError::ZeroFactor(factors.to_vec()));
    }

    for (axis, (&len, &factor)) in dims.iter().zip(factors).enumerate() {
        if len % factor != 0 {
            return Err(BinningError::NotDivisible { axis, len, factor });
        }
    }

    Ok(())
}

/// Sum non-overlapping `factors.0 x factors.1` blocks of a 2D array
///
/// # Arguments
/// * `image` - Input array, each axis must be divisible by its factor
/// * `factors` - Block size as (rows, cols)
///
/// # Returns
/// * `Ok(Array2<f64>)` - Array of shape `(rows / factors.0, cols / factors.1)`
/// * `Err(BinningError)` - Zero factor or non-divisible axis
pub fn block_sum_2d(
    image: &ArrayView2<f64>,
    factors: (usize, usize),
) -> Result<Array2<f64>, BinningError> {
    let (rows, cols) = image.dim();
    check_factors(&[rows, cols], &[factors.0, factors.1])?;

    let mut binned = Array2::zeros((rows / factors.0, cols / factors.1));
    for (dst, block) in binned.iter_mut().zip(image.exact_chunks(factors)) {
        *dst = block.sum();
    }

    Ok(binned)
}

/// Sum non-overlapping blocks of a 3D array
///
/// # Arguments
/// * `cube` - Input array, each axis must be divisible by its factor
/// * `factors` - Block size along each of the three axes
///
/// # Returns
/// * `Ok(Array3<f64>)` - Array with every axis divided by its factor
/// * `Err(BinningError)` - Zero factor or non-divisible axis
pub fn block_sum_3d(
    cube: &ArrayView3<f64>,
    factors: (usize, usize, usize),
) -> Result<Array3<f64>, BinningError> {
    let (d0, d1, d2) = cube.dim();
    check_factors(&[d0, d1, d2], &[factors.0, factors.1, factors.2])?;

    let mut binned = Array3::zeros((d0 / factors.0, d1 / factors.1, d2 / factors.2));
    for (dst, block) in binned.iter_mut().zip(cube.exact_chunks(factors)) {
        *dst = block.sum();
    }

    Ok(binned)
}
