//! Synthetic spectral cubes of rotating disk galaxies
//!
//! This crate generates position-position-velocity cubes of one or more
//! disk galaxies as an integral field unit would observe them: Sersic light
//! profiles with exponential vertical structure, a power-law rotation curve,
//! arbitrary orientation on the sky, projection onto a velocity axis and
//! convolution with an elliptical Gaussian beam.

pub mod assembler;
pub mod cache;
pub mod config;
pub mod density;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod instrument;
pub mod io;
pub mod kinematics;
pub mod metadata;
pub mod moments;
pub mod physical;
pub mod profile;
pub mod sampler;
pub mod shared_args;
pub mod spectral;
pub mod units;

// Re-exports for easier access
pub use assembler::{
    generate, generate_from_parameters, generate_with_cache, project_components, ComponentModel,
    CubeAssembler, CubeResult, GeneratedCube,
};
pub use cache::ResponseCache;
pub use config::{BeamInfo, GeneratorConfig, ResolutionMode, SamplingBounds};
pub use error::{ConfigError, CubeError, DomainError, ShapeError};
pub use grid::{Grid, GridBuilder};
pub use instrument::{BeamKernel, InstrumentResponse};
pub use metadata::Metadata;
pub use physical::PhysicalGalaxy;
pub use profile::{
    fwhm_to_sigma, rotation_curve, sersic_enclosed_flux, sersic_radial, sersic_total_flux,
    vertical_exponential,
};
pub use sampler::{GalaxyParameters, ParameterSampler};
pub use shared::CubeShape;
