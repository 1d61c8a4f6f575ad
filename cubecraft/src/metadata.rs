//! Per-cube metadata record.

use serde::{Deserialize, Serialize};
use shared::CubeShape;

use crate::config::BeamInfo;
use crate::grid::Grid;
use crate::instrument::BeamKernel;
use crate::sampler::GalaxyParameters;

/// Everything needed to interpret and reproduce one generated cube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Position of the cube in its batch
    pub cube_index: usize,
    /// Seed that reproduces this cube's parameter draws
    pub seed: u64,
    pub n_gals: usize,
    pub shape: CubeShape,
    pub beam_info: BeamInfo,
    /// Beam sigmas `[major, minor]` in output pixels
    pub beam_sigma: [f64; 2],
    /// Physical size of one output pixel
    pub pixel_scale: f64,
    /// Channel width in km/s
    pub spectral_scale: f64,
    /// Channel centre velocities in km/s
    pub average_vels: Vec<f64>,
    pub spatial_oversample: usize,
    pub spectral_oversample: usize,
    pub galaxies: Vec<GalaxyParameters>,
    /// Sum of the output cube
    pub total_flux: f64,
}

impl Metadata {
    /// Start a record for cube `cube_index` on `grid`.
    pub fn new(cube_index: usize, seed: u64, grid: &Grid, beam: &BeamKernel) -> Self {
        Self {
            cube_index,
            seed,
            n_gals: 0,
            shape: grid.shape(),
            beam_info: *beam.info(),
            beam_sigma: [beam.sigma_major(), beam.sigma_minor()],
            pixel_scale: grid.pixel_scale(),
            spectral_scale: grid.channel_width(),
            average_vels: grid.channel_velocities().to_vec(),
            spatial_oversample: grid.spatial_oversample(),
            spectral_oversample: grid.spectral_oversample(),
            galaxies: Vec::new(),
            total_flux: 0.0,
        }
    }

    pub fn with_galaxies(mut self, galaxies: Vec<GalaxyParameters>) -> Self {
        self.n_gals = galaxies.len();
        self.galaxies = galaxies;
        self
    }

    pub fn with_total_flux(mut self, total_flux: f64) -> Self {
        self.total_flux = total_flux;
        self
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
