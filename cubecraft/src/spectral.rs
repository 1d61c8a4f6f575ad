//! Projection of voxel flux onto the spectral axis.
//!
//! Each voxel's flux lands in the oversampled channel nearest its
//! line-of-sight velocity. Velocities beyond the band are clamped to the edge
//! channel, so the spectrum of every sky column keeps all of its flux. An
//! optional intrinsic dispersion then spreads each channel over its
//! neighbours, and blocks of oversampled channels are summed to the output
//! resolution.

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, ArrayViewMut2, Axis, Zip};
use shared::algo::{block_sum_2d, block_sum_3d, gaussian_bin_weights};

use crate::error::ShapeError;
use crate::grid::Grid;

/// Gaussian tails beyond this many sigma are dropped
pub const LINE_PROFILE_TRUNCATE: f64 = 4.0;

/// Channel-integrated Gaussian line profile on the oversampled spectral axis.
#[derive(Debug, Clone, PartialEq)]
pub struct LineProfile {
    weights: Vec<f64>,
}

impl LineProfile {
    /// # Arguments
    /// * `dispersion` - Line-of-sight velocity dispersion in km/s
    /// * `channel_width` - Oversampled channel width in km/s
    pub fn new(dispersion: f64, channel_width: f64) -> Self {
        Self {
            weights: gaussian_bin_weights(dispersion, channel_width, LINE_PROFILE_TRUNCATE),
        }
    }

    /// A profile that leaves every channel in place.
    pub fn delta() -> Self {
        Self { weights: vec![1.0] }
    }

    pub fn is_delta(&self) -> bool {
        self.weights.len() == 1
    }

    pub fn half_width(&self) -> usize {
        self.weights.len() / 2
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

/// Maps velocities to channels of one grid.
#[derive(Debug, Clone, Copy)]
pub struct SpectralProjector<'g> {
    grid: &'g Grid,
}

impl<'g> SpectralProjector<'g> {
    pub fn new(grid: &'g Grid) -> Self {
        Self { grid }
    }

    pub fn grid(&self) -> &Grid {
        self.grid
    }

    /// Oversampled channel nearest to `velocity`, clamped to the band.
    pub fn channel_index(&self, velocity: f64) -> usize {
        let n_channels = self.grid.velocity_axis().len();
        let position = (velocity - self.grid.velocity_min()) / self.grid.oversampled_channel_width();
        if position.is_nan() || position < 0.0 {
            0
        } else {
            (position.floor() as usize).min(n_channels - 1)
        }
    }

    /// Add voxel flux into per-column spectra.
    ///
    /// # Arguments
    /// * `flux` - Voxel flux of one sky row, shape `(n_los, n_x)`
    /// * `velocity` - Line-of-sight velocities of the same voxels
    /// * `spectra` - Accumulator of shape `(n_v_os, n_x)`
    pub fn deposit(
        &self,
        flux: &ArrayView2<f64>,
        velocity: &ArrayView2<f64>,
        spectra: &mut ArrayViewMut2<f64>,
    ) -> Result<(), ShapeError> {
        if flux.dim() != velocity.dim() {
            return Err(ShapeError::Mismatch {
                what: "voxel velocities",
                expected: flux.shape().to_vec(),
                actual: velocity.shape().to_vec(),
            });
        }
        let expected = [self.grid.velocity_axis().len(), flux.ncols()];
        if spectra.shape() != &expected[..] {
            return Err(ShapeError::Mismatch {
                what: "column spectra",
                expected: expected.to_vec(),
                actual: spectra.shape().to_vec(),
            });
        }
        Zip::indexed(flux).and(velocity).for_each(|(_, ix), f, v| {
            if *f > 0.0 {
                spectra[[self.channel_index(*v), ix]] += *f;
            }
        });
        Ok(())
    }

    /// Spread every channel of `spectra` with the line profile.
    ///
    /// Weights that would fall outside the band are dropped and the rest
    /// renormalised, so each column keeps its total flux.
    pub fn broaden(&self, spectra: &ArrayView2<f64>, profile: &LineProfile) -> Array2<f64> {
        if profile.is_delta() {
            return spectra.to_owned();
        }
        let n_channels = spectra.nrows() as isize;
        let half = profile.half_width() as isize;
        let mut broadened = Array2::zeros(spectra.raw_dim());
        for (source, row) in spectra.axis_iter(Axis(0)).enumerate() {
            let source = source as isize;
            let lo = (source - half).max(0);
            let hi = (source + half).min(n_channels - 1);
            let taps = &profile.weights()[(lo - source + half) as usize..=(hi - source + half) as usize];
            let norm: f64 = taps.iter().sum();
            if norm <= 0.0 {
                continue;
            }
            for (target, weight) in (lo..=hi).zip(taps) {
                broadened
                    .row_mut(target as usize)
                    .scaled_add(weight / norm, &row);
            }
        }
        broadened
    }

    /// Sum blocks of oversampled channels down to output channels.
    pub fn bin_spectral(&self, spectra: &ArrayView2<f64>) -> Result<Array2<f64>, ShapeError> {
        Ok(block_sum_2d(spectra, (self.grid.spectral_oversample(), 1))?)
    }

    /// Project full oversampled flux and velocity fields into a cube.
    ///
    /// `flux` and `velocity` have shape `(n_los, n_y_os, n_x_os)`; the result
    /// has shape `(n_v_os, n_y_os, n_x_os)` before any spectral binning.
    pub fn project(
        &self,
        flux: &ArrayView3<f64>,
        velocity: &ArrayView3<f64>,
        profile: &LineProfile,
    ) -> Result<Array3<f64>, ShapeError> {
        let (_, n_y, n_x) = flux.dim();
        let n_channels = self.grid.velocity_axis().len();
        let mut cube = Array3::zeros((n_channels, n_y, n_x));
        for (row, mut plane) in cube.axis_iter_mut(Axis(1)).enumerate() {
            let mut spectra = Array2::zeros((n_channels, n_x));
            self.deposit(
                &flux.index_axis(Axis(1), row),
                &velocity.index_axis(Axis(1), row),
                &mut spectra.view_mut(),
            )?;
            plane.assign(&self.broaden(&spectra.view(), profile));
        }
        Ok(cube)
    }

    /// Sum a projected cube to the output spectral resolution.
    pub fn bin_cube(&self, cube: &ArrayView3<f64>) -> Result<Array3<f64>, ShapeError> {
        Ok(block_sum_3d(cube, (self.grid.spectral_oversample(), 1, 1))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridBuilder;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};
    use shared::CubeShape;

    fn grid() -> Grid {
        // 10 output channels of 80 km/s, 3 sub-channels each
        GridBuilder::new(CubeShape::new(10, 4, 4))
            .spatial_oversample(1)
            .spectral_oversample(3)
            .velocity_range(400.0)
            .build()
            .unwrap()
    }

    #[test]
    fn test_channel_index() {
        let grid = grid();
        let projector = SpectralProjector::new(&grid);
        let axis = grid.velocity_axis();
        for (c, v) in axis.iter().enumerate() {
            assert_eq!(projector.channel_index(*v), c);
        }
        assert_eq!(projector.channel_index(-1000.0), 0);
        assert_eq!(projector.channel_index(1000.0), 29);
        assert_eq!(projector.channel_index(f64::NAN), 0);
        assert_eq!(projector.channel_index(0.1), 15);
        assert_eq!(projector.channel_index(-0.1), 14);
    }

    #[test]
    fn test_deposit_conserves_column_flux() {
        let grid = grid();
        let projector = SpectralProjector::new(&grid);
        let flux = array![[1.0, 2.0], [0.5, 0.0], [0.25, 3.0]];
        let velocity = array![[-500.0, 10.0], [0.0, 0.0], [390.0, 900.0]];
        let mut spectra = Array2::zeros((30, 2));
        projector
            .deposit(&flux.view(), &velocity.view(), &mut spectra.view_mut())
            .unwrap();
        assert_relative_eq!(spectra.column(0).sum(), 1.75);
        assert_relative_eq!(spectra.column(1).sum(), 5.0);
        assert_relative_eq!(spectra[[0, 0]], 1.0);
        assert_relative_eq!(spectra[[29, 1]], 3.0);
    }

    #[test]
    fn test_deposit_shape_checks() {
        let grid = grid();
        let projector = SpectralProjector::new(&grid);
        let flux = Array2::<f64>::ones((3, 2));
        let velocity = Array2::<f64>::zeros((3, 3));
        let mut spectra = Array2::zeros((30, 2));
        assert!(projector
            .deposit(&flux.view(), &velocity.view(), &mut spectra.view_mut())
            .is_err());
        let mut wrong = Array2::zeros((29, 2));
        assert!(projector
            .deposit(&flux.view(), &flux.view(), &mut wrong.view_mut())
            .is_err());
    }

    #[test]
    fn test_broaden_conserves_and_spreads() {
        let grid = grid();
        let projector = SpectralProjector::new(&grid);
        let profile = LineProfile::new(30.0, grid.oversampled_channel_width());
        assert!(!profile.is_delta());

        let mut spectra = Array2::zeros((30, 3));
        spectra[[15, 0]] = 2.0;
        spectra[[0, 1]] = 1.0;
        spectra[[29, 2]] = 4.0;
        let broadened = projector.broaden(&spectra.view(), &profile);

        assert_relative_eq!(broadened.column(0).sum(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(broadened.column(1).sum(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(broadened.column(2).sum(), 4.0, epsilon = 1e-12);
        assert!(broadened[[14, 0]] > 0.0);
        assert_relative_eq!(broadened[[14, 0]], broadened[[16, 0]], epsilon = 1e-12);
        assert!(broadened[[15, 0]] > broadened[[14, 0]]);
    }

    #[test]
    fn test_zero_dispersion_is_delta() {
        let grid = grid();
        let projector = SpectralProjector::new(&grid);
        let profile = LineProfile::new(0.0, grid.oversampled_channel_width());
        assert!(profile.is_delta());
        let spectra = Array2::from_shape_fn((30, 2), |(c, x)| (c * 2 + x) as f64);
        assert_eq!(projector.broaden(&spectra.view(), &profile), spectra);
        assert_eq!(LineProfile::delta(), profile);
    }

    #[test]
    fn test_bin_spectral() {
        let grid = grid();
        let projector = SpectralProjector::new(&grid);
        let spectra = Array2::ones((30, 2));
        let binned = projector.bin_spectral(&spectra.view()).unwrap();
        assert_eq!(binned.dim(), (10, 2));
        assert!(binned.iter().all(|v| *v == 3.0));
    }

    #[test]
    fn test_project_full_cube() {
        let grid = grid();
        let projector = SpectralProjector::new(&grid);
        let flux = ndarray::Array3::from_elem((5, 4, 4), 0.1);
        let velocity = ndarray::Array3::from_shape_fn((5, 4, 4), |(j, _, x)| {
            -200.0 + 40.0 * j as f64 + 10.0 * x as f64
        });
        let cube = projector
            .project(&flux.view(), &velocity.view(), &LineProfile::delta())
            .unwrap();
        assert_eq!(cube.dim(), (30, 4, 4));
        assert_relative_eq!(cube.sum(), flux.sum(), epsilon = 1e-12);
        let binned = projector.bin_cube(&cube.view()).unwrap();
        assert_eq!(binned.dim(), (10, 4, 4));
        assert_relative_eq!(binned.sum(), flux.sum(), epsilon = 1e-12);
    }
}
