//! FFT based 2D convolution
//!
//! Linear (non-circular) convolution of many same-sized planes with one
//! kernel. The kernel spectrum and the FFT plans are computed once in
//! [`FftConvolver::new`] and shared read-only afterwards, so a single
//! convolver can serve every channel of a cube from several threads.

use ndarray::{Array2, ArrayView2};
use rustfft::{num_complex::Complex64, Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during FFT convolution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvolveError {
    #[error("Plane shape {actual:?} does not match convolver shape {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("Kernel and image must be non-empty, got kernel {kernel:?} and image {image:?}")]
    Empty {
        kernel: (usize, usize),
        image: (usize, usize),
    },
}

/// Convolver for planes of a fixed shape with a fixed kernel
pub struct FftConvolver {
    image_shape: (usize, usize),
    kernel_shape: (usize, usize),
    padded_shape: (usize, usize),
    row_forward: Arc<dyn Fft<f64>>,
    row_inverse: Arc<dyn Fft<f64>>,
    col_forward: Arc<dyn Fft<f64>>,
    col_inverse: Arc<dyn Fft<f64>>,
    kernel_spectrum: Vec<Complex64>,
}

impl fmt::Debug for FftConvolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftConvolver")
            .field("image_shape", &self.image_shape)
            .field("kernel_shape", &self.kernel_shape)
            .field("padded_shape", &self.padded_shape)
            .finish()
    }
}

/// Transpose a row-major `rows x cols` buffer
fn transpose(src: &[Complex64], rows: usize, cols: usize) -> Vec<Complex64> {
    let mut dst = vec![Complex64::new(0.0, 0.0); src.len()];
    for r in 0..rows {
        for c in 0..cols {
            dst[c * rows + r] = src[r * cols + c];
        }
    }
    dst
}

impl FftConvolver {
    /// Create a convolver for planes of `image_shape` and the given kernel
    ///
    /// The working size is `image + kernel - 1` on each axis, which is the
    /// full linear convolution, so no wrap-around ever occurs.
    ///
    /// # Arguments
    /// * `kernel` - Convolution kernel, indexed `[y, x]`
    /// * `image_shape` - Shape `(rows, cols)` of every plane to be convolved
    pub fn new(kernel: &ArrayView2<f64>, image_shape: (usize, usize)) -> Result<Self, ConvolveError> {
        let kernel_shape = kernel.dim();
        if kernel_shape.0 == 0 || kernel_shape.1 == 0 || image_shape.0 == 0 || image_shape.1 == 0
        {
            return Err(ConvolveError::Empty {
                kernel: kernel_shape,
                image: image_shape,
            });
        }

        let padded_shape = (
            image_shape.0 + kernel_shape.0 - 1,
            image_shape.1 + kernel_shape.1 - 1,
        );

        let mut planner = FftPlanner::new();
        let row_forward = planner.plan_fft_forward(padded_shape.1);
        let row_inverse = planner.plan_fft_inverse(padded_shape.1);
        let col_forward = planner.plan_fft_forward(padded_shape.0);
        let col_inverse = planner.plan_fft_inverse(padded_shape.0);

        let mut convolver = Self {
            image_shape,
            kernel_shape,
            padded_shape,
            row_forward,
            row_inverse,
            col_forward,
            col_inverse,
            kernel_spectrum: Vec::new(),
        };

        let mut spectrum = convolver.pad(kernel);
        convolver.forward_2d(&mut spectrum);
        convolver.kernel_spectrum = spectrum;

        Ok(convolver)
    }

    /// Shape of the planes this convolver accepts
    pub fn image_shape(&self) -> (usize, usize) {
        self.image_shape
    }

    /// Shape of the kernel
    pub fn kernel_shape(&self) -> (usize, usize) {
        self.kernel_shape
    }

    /// Zero-pad a plane into the top-left corner of a working buffer
    fn pad(&self, plane: &ArrayView2<f64>) -> Vec<Complex64> {
        let (rows, cols) = self.padded_shape;
        let mut buffer = vec![Complex64::new(0.0, 0.0); rows * cols];
        for ((r, c), &value) in plane.indexed_iter() {
            buffer[r * cols + c] = Complex64::new(value, 0.0);
        }
        buffer
    }

    fn forward_2d(&self, buffer: &mut Vec<Complex64>) {
        let (rows, cols) = self.padded_shape;
        self.row_forward.process(buffer);
        let mut transposed = transpose(buffer, rows, cols);
        self.col_forward.process(&mut transposed);
        *buffer = transpose(&transposed, cols, rows);
    }

    fn inverse_2d(&self, buffer: &mut Vec<Complex64>) {
        let (rows, cols) = self.padded_shape;
        self.row_inverse.process(buffer);
        let mut transposed = transpose(buffer, rows, cols);
        self.col_inverse.process(&mut transposed);
        *buffer = transpose(&transposed, cols, rows);
    }

    /// Convolve one plane, returning an output of the same shape
    ///
    /// The output is the centre crop of the full linear convolution, matching
    /// [`crate::image_proc::convolve2d`]. Flux scattered beyond the
    /// plane edges is discarded.
    pub fn convolve_same(&self, image: &ArrayView2<f64>) -> Result<Array2<f64>, ConvolveError> {
        if image.dim() != self.image_shape {
            return Err(ConvolveError::ShapeMismatch {
                expected: self.image_shape,
                actual: image.dim(),
            });
        }

        let mut buffer = self.pad(image);
        self.forward_2d(&mut buffer);
        buffer
            .iter_mut()
            .zip(&self.kernel_spectrum)
            .for_each(|(value, kernel)| *value *= *kernel);
        self.inverse_2d(&mut buffer);

        let (_, cols) = self.padded_shape;
        let norm = (self.padded_shape.0 * self.padded_shape.1) as f64;
        let row_offset = self.kernel_shape.0 / 2;
        let col_offset = self.kernel_shape.1 / 2;

        Ok(Array2::from_shape_fn(self.image_shape, |(r, c)| {
            buffer[(r + row_offset) * cols + c + col_offset].re / norm
        }))
    }
}
