//! Instrument response: beam convolution and binning to the output grid.
//!
//! The beam is an elliptical Gaussian sampled on the oversampled sky grid.
//! Each channel is convolved independently, then `k x k` blocks of
//! oversampled pixels (and, for a cube still at oversampled spectral
//! resolution, blocks of channels) are summed. The kernel is normalised and
//! binning is a plain sum, so total flux is preserved up to what the beam
//! spreads past the field edge.

use std::time::Instant;

use log::debug;
use ndarray::{Array2, Array3, ArrayView2};
use shared::algo::{block_sum_3d, try_process_planes_in_parallel};
use shared::image_proc::{convolve2d, elliptical_gaussian_kernel, FftConvolver};
use shared::CubeShape;

use crate::config::BeamInfo;
use crate::error::{CubeError, DomainError, ShapeError};
use crate::grid::Grid;
use crate::profile::fwhm_to_sigma;
use crate::units::AngleExt;

/// Kernel support half-width in units of the major-axis sigma
pub const BEAM_TRUNCATE: f64 = 4.0;

/// Kernels up to this side length are applied by direct convolution
const DIRECT_KERNEL_MAX_SIDE: usize = 15;

/// Elliptical Gaussian beam sampled at oversampled resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct BeamKernel {
    info: BeamInfo,
    oversample: usize,
    sigma_major: f64,
    sigma_minor: f64,
    kernel: Array2<f64>,
}

impl BeamKernel {
    /// # Arguments
    /// * `beam` - FWHMs in output pixels and position angle in degrees
    /// * `oversample` - Spatial oversampling factor of the grid the kernel is applied on
    pub fn new(beam: &BeamInfo, oversample: usize) -> Result<Self, DomainError> {
        beam.validate()?;
        if oversample == 0 {
            return Err(DomainError::NonPositive {
                name: "spatial_oversample",
                value: 0.0,
            });
        }
        let sigma_major = fwhm_to_sigma(beam.major_fwhm());
        let sigma_minor = fwhm_to_sigma(beam.minor_fwhm());
        let k = oversample as f64;
        let kernel = elliptical_gaussian_kernel(
            sigma_major * k,
            sigma_minor * k,
            beam.position_angle().as_radians(),
            BEAM_TRUNCATE,
        );
        Ok(Self {
            info: *beam,
            oversample,
            sigma_major,
            sigma_minor,
            kernel,
        })
    }

    pub fn info(&self) -> &BeamInfo {
        &self.info
    }

    /// Major-axis sigma in output pixels.
    pub fn sigma_major(&self) -> f64 {
        self.sigma_major
    }

    /// Minor-axis sigma in output pixels.
    pub fn sigma_minor(&self) -> f64 {
        self.sigma_minor
    }

    pub fn oversample(&self) -> usize {
        self.oversample
    }

    /// Normalised kernel at oversampled resolution, indexed `[y, x]`.
    pub fn kernel(&self) -> &Array2<f64> {
        &self.kernel
    }
}

#[derive(Debug)]
enum Convolution {
    Direct,
    Fft(FftConvolver),
}

/// Beam convolution and binning for one grid.
#[derive(Debug)]
pub struct InstrumentResponse {
    beam: BeamKernel,
    shape: CubeShape,
    spatial_oversample: usize,
    spectral_oversample: usize,
    plane_shape: (usize, usize),
    convolution: Convolution,
}

impl InstrumentResponse {
    pub fn new(beam: &BeamInfo, grid: &Grid) -> Result<Self, CubeError> {
        let beam = BeamKernel::new(beam, grid.spatial_oversample())?;
        let oversampled = grid.oversampled_shape();
        let plane_shape = oversampled.plane();
        let (kernel_rows, kernel_cols) = beam.kernel().dim();
        let convolution = if kernel_rows.max(kernel_cols) <= DIRECT_KERNEL_MAX_SIDE {
            Convolution::Direct
        } else {
            Convolution::Fft(FftConvolver::new(&beam.kernel().view(), plane_shape)?)
        };
        debug!(
            "Beam {:.2}x{:.2} px at {:.1} deg, kernel {}x{} on {}x{} planes, fft: {}",
            beam.info().bmaj,
            beam.info().bmin,
            beam.info().bpa,
            kernel_rows,
            kernel_cols,
            plane_shape.0,
            plane_shape.1,
            matches!(convolution, Convolution::Fft(_))
        );
        Ok(Self {
            beam,
            shape: grid.shape(),
            spatial_oversample: grid.spatial_oversample(),
            spectral_oversample: grid.spectral_oversample(),
            plane_shape,
            convolution,
        })
    }

    pub fn beam(&self) -> &BeamKernel {
        &self.beam
    }

    /// Output cube shape.
    pub fn output_shape(&self) -> CubeShape {
        self.shape
    }

    pub fn uses_fft(&self) -> bool {
        matches!(self.convolution, Convolution::Fft(_))
    }

    fn check_plane(&self, plane: (usize, usize)) -> Result<(), ShapeError> {
        if plane != self.plane_shape {
            return Err(ShapeError::Mismatch {
                what: "oversampled channel plane",
                expected: vec![self.plane_shape.0, self.plane_shape.1],
                actual: vec![plane.0, plane.1],
            });
        }
        Ok(())
    }

    /// Convolve one oversampled channel with the beam.
    pub fn convolve_plane(&self, plane: &ArrayView2<f64>) -> Result<Array2<f64>, ShapeError> {
        self.check_plane(plane.dim())?;
        match &self.convolution {
            Convolution::Direct => Ok(convolve2d(plane, &self.beam.kernel().view())),
            Convolution::Fft(convolver) => Ok(convolver.convolve_same(plane)?),
        }
    }

    /// Convolve every channel of an oversampled cube, in parallel.
    pub fn convolve(&self, cube: Array3<f64>) -> Result<Array3<f64>, ShapeError> {
        let start = Instant::now();
        let convolved = try_process_planes_in_parallel(cube, |_, plane| {
            let result = self.convolve_plane(&plane.view())?;
            plane.assign(&result);
            Ok::<(), ShapeError>(())
        })?;
        debug!(
            "Convolved {} channels in {:.3}s",
            convolved.dim().0,
            start.elapsed().as_secs_f64()
        );
        Ok(convolved)
    }

    /// Convolve and bin an oversampled cube to the output grid.
    ///
    /// `cube` is `(n_v_os, n_y_os, n_x_os)`, or `(n_v, n_y_os, n_x_os)` when the
    /// spectral axis is already at output resolution.
    pub fn apply(&self, cube: Array3<f64>) -> Result<Array3<f64>, ShapeError> {
        let n_channels = cube.dim().0;
        let spectral_factor = if n_channels == self.shape.n_velocity {
            1
        } else if n_channels == self.shape.n_velocity * self.spectral_oversample {
            self.spectral_oversample
        } else {
            return Err(ShapeError::Mismatch {
                what: "spectral channels",
                expected: vec![
                    self.shape.n_velocity,
                    self.shape.n_velocity * self.spectral_oversample,
                ],
                actual: vec![n_channels],
            });
        };
        let convolved = self.convolve(cube)?;
        let k = self.spatial_oversample;
        Ok(block_sum_3d(&convolved.view(), (spectral_factor, k, k))?)
    }
}
