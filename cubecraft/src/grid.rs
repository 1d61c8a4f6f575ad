//! Oversampled sampling grid shared by every field builder.
//!
//! Sky coordinates are in output pixels relative to the field centre: the
//! oversampled sample `i` along an axis of `n` output pixels sits at
//! `(i + 0.5) / k - n / 2`, so each block of `k` samples covers exactly one
//! output pixel. The line-of-sight axis spans the half-diagonal of the field
//! in both directions, which contains any disk that fits on the sky, and by
//! default is sampled at the same `1 / k` pitch as the sky axes.

use ndarray::Array1;
use shared::CubeShape;

use crate::config::GeneratorConfig;
use crate::error::ShapeError;

/// Immutable coordinate axes of one output shape and oversampling setting.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    shape: CubeShape,
    spatial_oversample: usize,
    spectral_oversample: usize,
    x: Array1<f64>,
    y: Array1<f64>,
    los: Array1<f64>,
    los_step: f64,
    velocity: Array1<f64>,
    channel_velocities: Array1<f64>,
    channel_width: f64,
    pixel_scale: f64,
}

/// Builder for [`Grid`].
#[derive(Debug, Clone)]
pub struct GridBuilder {
    shape: CubeShape,
    spatial_oversample: usize,
    spectral_oversample: usize,
    los_samples: Option<usize>,
    velocity_range: f64,
    pixel_scale: f64,
}

impl GridBuilder {
    pub fn new(shape: CubeShape) -> Self {
        Self {
            shape,
            spatial_oversample: 5,
            spectral_oversample: 3,
            los_samples: None,
            velocity_range: 400.0,
            pixel_scale: 1.0,
        }
    }

    /// Builder carrying the grid-related options of a configuration.
    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::new(config.shape())
            .spatial_oversample(config.spatial_oversample)
            .spectral_oversample(config.spectral_oversample)
            .los_samples(config.los_samples)
            .velocity_range(config.velocity_range)
            .pixel_scale(config.pixel_scale)
    }

    pub fn spatial_oversample(mut self, factor: usize) -> Self {
        self.spatial_oversample = factor;
        self
    }

    pub fn spectral_oversample(mut self, factor: usize) -> Self {
        self.spectral_oversample = factor;
        self
    }

    pub fn los_samples(mut self, samples: Option<usize>) -> Self {
        self.los_samples = samples;
        self
    }

    pub fn velocity_range(mut self, velocity_range: f64) -> Self {
        self.velocity_range = velocity_range;
        self
    }

    pub fn pixel_scale(mut self, pixel_scale: f64) -> Self {
        self.pixel_scale = pixel_scale;
        self
    }

    pub fn build(&self) -> Result<Grid, ShapeError> {
        let shape = self.shape;
        if shape.is_empty() {
            return Err(ShapeError::EmptyShape(shape));
        }
        if self.spatial_oversample == 0 {
            return Err(ShapeError::ZeroFactor {
                name: "spatial_oversample",
            });
        }
        if self.spectral_oversample == 0 {
            return Err(ShapeError::ZeroFactor {
                name: "spectral_oversample",
            });
        }
        for (name, value) in [
            ("velocity_range", self.velocity_range),
            ("pixel_scale", self.pixel_scale),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ShapeError::InvalidExtent { name, value });
            }
        }
        let k = self.spatial_oversample;
        let half_depth = 0.5 * ((shape.n_x.pow(2) + shape.n_y.pow(2)) as f64).sqrt();
        let n_los = self
            .los_samples
            .unwrap_or_else(|| (2.0 * half_depth * k as f64).ceil() as usize);
        if n_los == 0 {
            return Err(ShapeError::ZeroFactor {
                name: "los_samples",
            });
        }

        let x = oversampled_axis(shape.n_x, k);
        let y = oversampled_axis(shape.n_y, k);

        let los_step = 2.0 * half_depth / n_los as f64;
        let los = Array1::from_shape_fn(n_los, |j| -half_depth + (j as f64 + 0.5) * los_step);

        let channel_width = 2.0 * self.velocity_range / shape.n_velocity as f64;
        let n_v_os = shape.n_velocity * self.spectral_oversample;
        let os_width = channel_width / self.spectral_oversample as f64;
        let velocity = Array1::from_shape_fn(n_v_os, |c| {
            -self.velocity_range + (c as f64 + 0.5) * os_width
        });
        let channel_velocities = Array1::from_shape_fn(shape.n_velocity, |c| {
            -self.velocity_range + (c as f64 + 0.5) * channel_width
        });

        Ok(Grid {
            shape,
            spatial_oversample: k,
            spectral_oversample: self.spectral_oversample,
            x,
            y,
            los,
            los_step,
            velocity,
            channel_velocities,
            channel_width,
            pixel_scale: self.pixel_scale,
        })
    }
}

fn oversampled_axis(n: usize, k: usize) -> Array1<f64> {
    let half = n as f64 / 2.0;
    Array1::from_shape_fn(n * k, |i| (i as f64 + 0.5) / k as f64 - half)
}

impl Grid {
    /// Output cube shape.
    pub fn shape(&self) -> CubeShape {
        self.shape
    }

    /// Shape of the fully oversampled cube `(n_v * s, n_y * k, n_x * k)`.
    pub fn oversampled_shape(&self) -> CubeShape {
        self.shape
            .oversampled(self.spectral_oversample, self.spatial_oversample)
    }

    pub fn spatial_oversample(&self) -> usize {
        self.spatial_oversample
    }

    pub fn spectral_oversample(&self) -> usize {
        self.spectral_oversample
    }

    /// Oversampled sky x coordinates, in output pixels.
    pub fn x_axis(&self) -> &Array1<f64> {
        &self.x
    }

    /// Oversampled sky y coordinates, in output pixels.
    pub fn y_axis(&self) -> &Array1<f64> {
        &self.y
    }

    /// Line-of-sight sample positions, in output pixels.
    pub fn los_axis(&self) -> &Array1<f64> {
        &self.los
    }

    pub fn los_samples(&self) -> usize {
        self.los.len()
    }

    pub fn los_step(&self) -> f64 {
        self.los_step
    }

    /// Volume of one oversampled voxel in output-pixel units.
    ///
    /// A density evaluated at a voxel centre times this volume is the flux the
    /// voxel contributes to its oversampled sky pixel.
    pub fn voxel_volume(&self) -> f64 {
        let k = self.spatial_oversample as f64;
        self.los_step / (k * k)
    }

    /// Oversampled channel centres in km/s.
    pub fn velocity_axis(&self) -> &Array1<f64> {
        &self.velocity
    }

    /// Output channel centres in km/s.
    pub fn channel_velocities(&self) -> &Array1<f64> {
        &self.channel_velocities
    }

    /// Output channel width in km/s.
    pub fn channel_width(&self) -> f64 {
        self.channel_width
    }

    pub fn oversampled_channel_width(&self) -> f64 {
        self.channel_width / self.spectral_oversample as f64
    }

    /// Lower edge of the spectral axis in km/s.
    pub fn velocity_min(&self) -> f64 {
        -0.5 * self.channel_width * self.shape.n_velocity as f64
    }

    pub fn pixel_scale(&self) -> f64 {
        self.pixel_scale
    }
}
