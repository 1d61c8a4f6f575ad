//! Generator configuration.
//!
//! [`GeneratorConfig`] carries every option of a generation request. It is
//! plain data (serde round-trippable) and is validated once, before any cube
//! is attempted.

use serde::{Deserialize, Serialize};
use shared::CubeShape;

use crate::error::{ConfigError, DomainError, ShapeError};
use crate::profile::sersic_b_n;
use crate::sampler::ParameterSampler;
use crate::units::{Angle, AngleExt};

/// Observing beam: minor and major FWHM in output pixels, position angle in degrees.
///
/// The position angle of the major axis is measured counter-clockwise from +y.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamInfo {
    pub bmin: f64,
    pub bmaj: f64,
    pub bpa: f64,
}

impl BeamInfo {
    pub fn new(bmin: f64, bmaj: f64, bpa: f64) -> Self {
        Self { bmin, bmaj, bpa }
    }

    /// Circular beam of the given FWHM.
    pub fn circular(fwhm: f64) -> Self {
        Self::new(fwhm, fwhm, 0.0)
    }

    pub fn major_fwhm(&self) -> f64 {
        self.bmaj
    }

    pub fn minor_fwhm(&self) -> f64 {
        self.bmin
    }

    pub fn position_angle(&self) -> Angle {
        Angle::from_degrees(self.bpa)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        crate::error::require_positive("beam major FWHM", self.bmaj)?;
        crate::error::require_positive("beam minor FWHM", self.bmin)?;
        crate::error::require_finite("beam position angle", self.bpa)?;
        if self.bmin > self.bmaj {
            return Err(DomainError::BeamAxes {
                major: self.bmaj,
                minor: self.bmin,
            });
        }
        Ok(())
    }
}

impl Default for BeamInfo {
    fn default() -> Self {
        Self::new(4.0, 4.0, 0.0)
    }
}

impl From<[f64; 3]> for BeamInfo {
    fn from(values: [f64; 3]) -> Self {
        Self::new(values[0], values[1], values[2])
    }
}

/// How primary galaxy sizes relate to the beam.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionMode {
    /// Effective radius anywhere between a quarter and three beams
    #[default]
    All,
    /// Effective radius between one and three beams
    Resolved,
    /// Effective radius between a quarter and one beam
    Unresolved,
}

impl ResolutionMode {
    /// Effective radius range in units of the beam major FWHM.
    pub fn beam_fraction_bounds(&self) -> (f64, f64) {
        match self {
            ResolutionMode::All => (0.25, 3.0),
            ResolutionMode::Resolved => (1.0, 3.0),
            ResolutionMode::Unresolved => (0.25, 1.0),
        }
    }
}

/// Ranges for the random parameter draws.
///
/// Every range is `(low, high)` and drawn uniformly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingBounds {
    /// Primary effective surface brightness
    pub surface_brightness: (f64, f64),
    /// Primary Sersic index when not fixed
    pub sersic_index: (f64, f64),
    /// Satellite Sersic index when not fixed
    pub satellite_sersic_index: (f64, f64),
    /// Scale height as a fraction of the effective radius
    pub scale_height_fraction: (f64, f64),
    /// Satellite size and brightness as a fraction of the primary's
    pub satellite_scale: (f64, f64),
    /// Rotation velocity scale `v_0` in km/s
    pub velocity_scale: (f64, f64),
    /// Intrinsic velocity dispersion in km/s
    pub velocity_dispersion: (f64, f64),
    /// Largest satellite systemic velocity in km/s, either sign
    pub max_systemic_offset: f64,
    /// Effective radius below which flux is boosted, in beam major FWHMs
    pub small_source_threshold: f64,
    /// Cap on the small-source flux boost
    pub max_flux_rescale: f64,
    /// Largest effective radius as a fraction of the grid size
    pub max_radius_fraction: f64,
}

impl Default for SamplingBounds {
    fn default() -> Self {
        Self {
            surface_brightness: (0.5, 1.5),
            sersic_index: (0.5, 2.5),
            satellite_sersic_index: (0.5, 1.5),
            scale_height_fraction: (0.05, 0.2),
            satellite_scale: (1.0 / 3.0, 0.5),
            velocity_scale: (100.0, 200.0),
            velocity_dispersion: (10.0, 30.0),
            max_systemic_offset: 50.0,
            small_source_threshold: 0.5,
            max_flux_rescale: 50.0,
            max_radius_fraction: 0.125,
        }
    }
}

impl SamplingBounds {
    fn validate(&self) -> Result<(), ConfigError> {
        let positive_ranges = [
            ("surface_brightness", self.surface_brightness),
            ("sersic_index", self.sersic_index),
            ("satellite_sersic_index", self.satellite_sersic_index),
            ("scale_height_fraction", self.scale_height_fraction),
            ("satellite_scale", self.satellite_scale),
            ("velocity_scale", self.velocity_scale),
        ];
        for (name, (lo, hi)) in positive_ranges {
            if !(lo.is_finite() && hi.is_finite() && lo > 0.0 && lo <= hi) {
                return Err(ConfigError::InvalidRange { name, lo, hi });
            }
        }
        for (lo, hi) in [self.sersic_index, self.satellite_sersic_index] {
            sersic_b_n(lo)?;
            sersic_b_n(hi)?;
        }
        let (lo, hi) = self.velocity_dispersion;
        if !(lo.is_finite() && hi.is_finite() && lo >= 0.0 && lo <= hi) {
            return Err(ConfigError::InvalidRange {
                name: "velocity_dispersion",
                lo,
                hi,
            });
        }
        for (name, value) in [
            ("max_systemic_offset", self.max_systemic_offset),
            ("small_source_threshold", self.small_source_threshold),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidOption { name, value });
            }
        }
        for (name, value) in [
            ("max_flux_rescale", self.max_flux_rescale),
            ("max_radius_fraction", self.max_radius_fraction),
        ] {
            crate::error::require_positive(name, value)?;
        }
        if self.max_flux_rescale < 1.0 {
            return Err(ConfigError::InvalidOption {
                name: "max_flux_rescale",
                value: self.max_flux_rescale,
            });
        }
        Ok(())
    }
}

/// Full description of a generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Galaxies per cube, drawn from `1..=max_random_gals` when `None`
    pub n_gals: Option<usize>,
    pub max_random_gals: usize,
    pub n_cubes: usize,
    pub resolution: ResolutionMode,
    /// Largest satellite offset from the primary, in pixels
    pub offset_gals: f64,
    pub beam: BeamInfo,
    pub grid_size: usize,
    pub n_spectral_slices: usize,
    /// Fixed Sersic index for every component
    pub n_sersic: Option<f64>,
    /// Fixed stem for output files
    pub fname: Option<String>,
    pub verbose: bool,
    /// Base seed, cube `i` uses `seed + i`
    pub seed: Option<u64>,
    pub spatial_oversample: usize,
    pub spectral_oversample: usize,
    /// Line-of-sight samples, one per oversampled pixel of the field diagonal when `None`
    pub los_samples: Option<usize>,
    /// Half-width of the spectral axis in km/s
    pub velocity_range: f64,
    /// Physical size of one output pixel
    pub pixel_scale: f64,
    pub sampling: SamplingBounds,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            n_gals: None,
            max_random_gals: 3,
            n_cubes: 1,
            resolution: ResolutionMode::All,
            offset_gals: 5.0,
            beam: BeamInfo::default(),
            grid_size: 125,
            n_spectral_slices: 40,
            n_sersic: None,
            fname: None,
            verbose: true,
            seed: None,
            spatial_oversample: 5,
            spectral_oversample: 3,
            los_samples: None,
            velocity_range: 400.0,
            pixel_scale: 1.0,
            sampling: SamplingBounds::default(),
        }
    }
}

impl GeneratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_gals(mut self, n_gals: Option<usize>) -> Self {
        self.n_gals = n_gals;
        self
    }

    pub fn with_max_random_gals(mut self, max_random_gals: usize) -> Self {
        self.max_random_gals = max_random_gals;
        self
    }

    pub fn with_n_cubes(mut self, n_cubes: usize) -> Self {
        self.n_cubes = n_cubes;
        self
    }

    pub fn with_resolution(mut self, resolution: ResolutionMode) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_offset_gals(mut self, offset_gals: f64) -> Self {
        self.offset_gals = offset_gals;
        self
    }

    pub fn with_beam(mut self, beam: BeamInfo) -> Self {
        self.beam = beam;
        self
    }

    pub fn with_grid_size(mut self, grid_size: usize) -> Self {
        self.grid_size = grid_size;
        self
    }

    pub fn with_spectral_slices(mut self, n_spectral_slices: usize) -> Self {
        self.n_spectral_slices = n_spectral_slices;
        self
    }

    pub fn with_sersic_index(mut self, n_sersic: Option<f64>) -> Self {
        self.n_sersic = n_sersic;
        self
    }

    pub fn with_fname(mut self, fname: Option<String>) -> Self {
        self.fname = fname;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_spatial_oversample(mut self, factor: usize) -> Self {
        self.spatial_oversample = factor;
        self
    }

    pub fn with_spectral_oversample(mut self, factor: usize) -> Self {
        self.spectral_oversample = factor;
        self
    }

    pub fn with_los_samples(mut self, los_samples: Option<usize>) -> Self {
        self.los_samples = los_samples;
        self
    }

    pub fn with_velocity_range(mut self, velocity_range: f64) -> Self {
        self.velocity_range = velocity_range;
        self
    }

    pub fn with_pixel_scale(mut self, pixel_scale: f64) -> Self {
        self.pixel_scale = pixel_scale;
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingBounds) -> Self {
        self.sampling = sampling;
        self
    }

    /// Output cube shape `(n_spectral_slices, grid_size, grid_size)`.
    pub fn shape(&self) -> CubeShape {
        CubeShape::square(self.n_spectral_slices, self.grid_size)
    }

    /// Output channel width in km/s.
    pub fn channel_width(&self) -> f64 {
        2.0 * self.velocity_range / self.n_spectral_slices.max(1) as f64
    }

    /// Check every option, including that the size bounds admit a primary galaxy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_cubes == 0 {
            return Err(ConfigError::NoCubesRequested);
        }
        if let Some(n_gals) = self.n_gals {
            if n_gals == 0 {
                return Err(ConfigError::InvalidGalaxyCount(n_gals));
            }
        }
        if self.max_random_gals == 0 {
            return Err(ConfigError::InvalidGalaxyCount(0));
        }
        self.validate_layout()?;
        if !(self.offset_gals.is_finite() && self.offset_gals >= 0.0) {
            return Err(ConfigError::InvalidOption {
                name: "offset_gals",
                value: self.offset_gals,
            });
        }
        if let Some(n) = self.n_sersic {
            sersic_b_n(n)?;
        }
        self.sampling.validate()?;
        ParameterSampler::new(self).effective_radius_bounds()?;
        Ok(())
    }

    /// Check the options that define the grid and the beam.
    ///
    /// This is all that generation from explicit galaxy parameters needs.
    pub fn validate_layout(&self) -> Result<(), ConfigError> {
        let shape = self.shape();
        if shape.is_empty() {
            return Err(ShapeError::EmptyShape(shape).into());
        }
        for (name, factor) in [
            ("spatial_oversample", self.spatial_oversample),
            ("spectral_oversample", self.spectral_oversample),
            ("los_samples", self.los_samples.unwrap_or(1)),
        ] {
            if factor == 0 {
                return Err(ShapeError::ZeroFactor { name }.into());
            }
        }
        for (name, value) in [
            ("velocity_range", self.velocity_range),
            ("pixel_scale", self.pixel_scale),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ShapeError::InvalidExtent { name, value }.into());
            }
        }
        self.beam.validate()?;
        Ok(())
    }
}
