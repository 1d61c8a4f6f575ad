//! Cube assembly and the batch entry points.
//!
//! For each cube: draw (or take) the galaxy parameters, project every
//! component row by row into a composite at oversampled spatial resolution,
//! convolve with the beam, bin to the output grid and clip roundoff
//! negatives. Cubes of a batch are independent and run in parallel; results
//! come back in request order, one `Result` per cube.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use ndarray::{Array2, Array3, ArrayViewMut2, Axis};
use rand::rngs::StdRng;
use rand::{thread_rng, RngCore, SeedableRng};
use rayon::prelude::*;
use shared::CubeShape;

use crate::cache::ResponseCache;
use crate::config::GeneratorConfig;
use crate::density::DensityFieldBuilder;
use crate::error::{ConfigError, CubeError, DomainError, ShapeError};
use crate::geometry::GeometryTransform;
use crate::grid::Grid;
use crate::instrument::InstrumentResponse;
use crate::kinematics::KinematicFieldBuilder;
use crate::metadata::Metadata;
use crate::sampler::{GalaxyParameters, ParameterSampler};
use crate::spectral::{LineProfile, SpectralProjector};

/// An output cube `(n_v, n_y, n_x)` and its metadata.
#[derive(Debug, Clone)]
pub struct GeneratedCube {
    pub cube: Array3<f64>,
    pub metadata: Metadata,
}

impl GeneratedCube {
    pub fn shape(&self) -> CubeShape {
        let (n_v, n_y, n_x) = self.cube.dim();
        CubeShape::new(n_v, n_y, n_x)
    }

    pub fn into_parts(self) -> (Array3<f64>, Metadata) {
        (self.cube, self.metadata)
    }
}

/// Outcome of generating one cube.
pub type CubeResult = Result<GeneratedCube, CubeError>;

/// One disk component prepared for projection on a grid.
#[derive(Debug, Clone)]
pub struct ComponentModel {
    params: GalaxyParameters,
    transform: GeometryTransform,
    density: DensityFieldBuilder,
    kinematics: KinematicFieldBuilder,
    line_profile: LineProfile,
}

impl ComponentModel {
    pub fn new(params: &GalaxyParameters, grid: &Grid) -> Result<Self, DomainError> {
        let transform = GeometryTransform::from_parameters(params)?;
        let density = DensityFieldBuilder::new(params, grid, &transform)?;
        let kinematics = KinematicFieldBuilder::new(params)?;
        let line_profile = LineProfile::new(
            params.velocity_dispersion,
            grid.oversampled_channel_width(),
        );
        Ok(Self {
            params: *params,
            transform,
            density,
            kinematics,
            line_profile,
        })
    }

    pub fn parameters(&self) -> &GalaxyParameters {
        &self.params
    }

    /// Add this component's spectra for oversampled sky row `row`.
    ///
    /// `spectra` has shape `(n_v_os, n_x_os)`.
    pub fn project_row(
        &self,
        grid: &Grid,
        row: usize,
        spectra: &mut ArrayViewMut2<f64>,
    ) -> Result<(), ShapeError> {
        let coords = self.transform.disk_coords_row(grid, row);
        let flux = self.density.build(&coords);
        let velocity = self.kinematics.build(&coords);
        let projector = SpectralProjector::new(grid);

        if self.line_profile.is_delta() {
            return projector.deposit(&flux.view(), &velocity.view(), spectra);
        }
        let mut own = Array2::zeros(spectra.raw_dim());
        projector.deposit(&flux.view(), &velocity.view(), &mut own.view_mut())?;
        *spectra += &projector.broaden(&own.view(), &self.line_profile);
        Ok(())
    }

    /// Fully oversampled cube `(n_v_os, n_y_os, n_x_os)` of this component alone.
    ///
    /// Holds every voxel in memory at once; batch generation streams rows
    /// through [`project_components`] instead.
    pub fn project(&self, grid: &Grid) -> Result<Array3<f64>, ShapeError> {
        let coords = self.transform.disk_coords(grid);
        let flux = self.density.build(&coords);
        let velocity = self.kinematics.build(&coords);
        SpectralProjector::new(grid).project(&flux.view(), &velocity.view(), &self.line_profile)
    }
}

/// Composite of all components at output spectral and oversampled spatial resolution.
///
/// Rows of the sky are independent and projected in parallel. The result has
/// shape `(n_v, n_y_os, n_x_os)`.
pub fn project_components(
    grid: &Grid,
    components: &[ComponentModel],
) -> Result<Array3<f64>, ShapeError> {
    let oversampled = grid.oversampled_shape();
    let projector = SpectralProjector::new(grid);
    let mut composite = Array3::zeros((grid.shape().n_velocity, oversampled.n_y, oversampled.n_x));
    composite
        .axis_iter_mut(Axis(1))
        .into_par_iter()
        .enumerate()
        .try_for_each(|(row, mut plane)| -> Result<(), ShapeError> {
            let mut spectra = Array2::zeros((oversampled.n_velocity, oversampled.n_x));
            for component in components {
                component.project_row(grid, row, &mut spectra.view_mut())?;
            }
            plane.assign(&projector.bin_spectral(&spectra.view())?);
            Ok(())
        })?;
    Ok(composite)
}

/// Generates cubes for one validated configuration.
pub struct CubeAssembler<'a> {
    config: &'a GeneratorConfig,
    grid: Arc<Grid>,
    response: Arc<InstrumentResponse>,
    base_seed: u64,
}

impl<'a> CubeAssembler<'a> {
    /// Validate `config` and fetch its grid and instrument response from `cache`.
    pub fn new(config: &'a GeneratorConfig, cache: &ResponseCache) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::with_validated(config, cache)
    }

    /// Like [`CubeAssembler::new`], checking only what explicit parameters need.
    pub fn for_parameters(
        config: &'a GeneratorConfig,
        cache: &ResponseCache,
    ) -> Result<Self, ConfigError> {
        config.validate_layout()?;
        Self::with_validated(config, cache)
    }

    fn with_validated(config: &'a GeneratorConfig, cache: &ResponseCache) -> Result<Self, ConfigError> {
        let grid = cache.grid(config)?;
        let response = cache.response(config)?;
        let base_seed = config.seed.unwrap_or_else(|| thread_rng().next_u64());
        Ok(Self {
            config,
            grid,
            response,
            base_seed,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn response(&self) -> &InstrumentResponse {
        &self.response
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// Seed of cube `index`.
    pub fn cube_seed(&self, index: usize) -> u64 {
        self.base_seed.wrapping_add(index as u64)
    }

    /// Draw a galaxy system for cube `index` and generate it.
    pub fn assemble(&self, index: usize) -> CubeResult {
        let seed = self.cube_seed(index);
        let mut rng = StdRng::seed_from_u64(seed);
        let galaxies = ParameterSampler::new(self.config).sample_system(&mut rng)?;
        self.assemble_galaxies(index, seed, galaxies)
    }

    /// Generate a cube from the given galaxy parameters.
    pub fn assemble_galaxies(
        &self,
        index: usize,
        seed: u64,
        galaxies: Vec<GalaxyParameters>,
    ) -> CubeResult {
        if galaxies.is_empty() {
            return Err(ConfigError::NoGalaxies.into());
        }
        let start = Instant::now();
        let components = galaxies
            .iter()
            .map(|params| ComponentModel::new(params, &self.grid))
            .collect::<Result<Vec<_>, _>>()?;

        let composite = project_components(&self.grid, &components)?;
        debug!(
            "Cube {}: projected {} components in {:.3}s",
            index,
            components.len(),
            start.elapsed().as_secs_f64()
        );

        let mut cube = self.response.apply(composite)?;
        cube.mapv_inplace(|v| if v.is_finite() { v.max(0.0) } else { 0.0 });
        let total_flux = cube.sum();

        let metadata = Metadata::new(index, seed, &self.grid, self.response.beam())
            .with_galaxies(galaxies)
            .with_total_flux(total_flux);

        let summary = format!(
            "Cube {}: {} galaxies, shape {}, total flux {:.4e}, {:.2}s",
            index,
            metadata.n_gals,
            metadata.shape,
            total_flux,
            start.elapsed().as_secs_f64()
        );
        if self.config.verbose {
            info!("{}", summary);
        } else {
            debug!("{}", summary);
        }

        Ok(GeneratedCube { cube, metadata })
    }
}

/// Generate `config.n_cubes` cubes.
///
/// Configuration problems are reported once, before any cube is attempted.
/// Afterwards every cube gets its own `Result`, in request order.
pub fn generate(config: &GeneratorConfig) -> Result<Vec<CubeResult>, ConfigError> {
    generate_with_cache(config, &ResponseCache::new())
}

/// [`generate`] sharing grids and instrument responses through `cache`.
pub fn generate_with_cache(
    config: &GeneratorConfig,
    cache: &ResponseCache,
) -> Result<Vec<CubeResult>, ConfigError> {
    let assembler = CubeAssembler::new(config, cache)?;
    debug!(
        "Generating {} cubes of shape {} with base seed {}",
        config.n_cubes,
        config.shape(),
        assembler.base_seed()
    );
    let results = (0..config.n_cubes)
        .into_par_iter()
        .map(|index| {
            let result = assembler.assemble(index);
            if let Err(err) = &result {
                warn!("Cube {} failed: {}", index, err);
            }
            result
        })
        .collect();
    Ok(results)
}

/// Generate one cube from explicit galaxy parameters, without sampling.
///
/// The configuration supplies the grid, beam and seed; its sampling options
/// are ignored.
pub fn generate_from_parameters(
    config: &GeneratorConfig,
    galaxies: &[GalaxyParameters],
) -> CubeResult {
    if galaxies.is_empty() {
        return Err(ConfigError::NoGalaxies.into());
    }
    for params in galaxies {
        params.validate()?;
    }
    let cache = ResponseCache::new();
    let assembler = CubeAssembler::for_parameters(config, &cache)?;
    assembler.assemble_galaxies(0, assembler.base_seed(), galaxies.to_vec())
}
