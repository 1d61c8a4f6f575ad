//! Image processing functionality shared across the pipeline.
//!
//! Convolution of 2D planes with direct and FFT based implementations,
//! plus the kernels the instrument model needs.

pub mod convolve2d;
pub mod fft_convolve;

pub use convolve2d::{convolve2d, elliptical_gaussian_kernel};
pub use fft_convolve::{ConvolveError, FftConvolver};
