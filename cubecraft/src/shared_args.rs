use clap::Parser;

use crate::config::{BeamInfo, GeneratorConfig, ResolutionMode};

/// Parse beam string in format "bmin,bmaj,bpa"
fn parse_beam(s: &str) -> Result<BeamInfo, String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err("Beam must be in format 'bmin,bmaj,bpa'".to_string());
    }

    let mut values = [0.0; 3];
    for (value, (part, name)) in values
        .iter_mut()
        .zip(parts.iter().zip(["bmin", "bmaj", "bpa"]))
    {
        *value = part
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("Invalid {} value", name))?;
    }

    Ok(BeamInfo::from(values))
}

/// Generation options shared by the cube-producing binaries
#[derive(Parser, Debug, Clone)]
pub struct GeneratorArgs {
    /// Galaxies per cube (random between 1 and --max-random-gals when omitted)
    #[arg(long)]
    pub n_gals: Option<usize>,

    /// Upper bound for the random galaxy count
    #[arg(long, default_value_t = 3)]
    pub max_random_gals: usize,

    /// Number of cubes to generate
    #[arg(long, default_value_t = 1)]
    pub n_cubes: usize,

    /// Primary galaxy size relative to the beam
    #[arg(long, value_enum, default_value_t = ResolutionMode::All)]
    pub resolution: ResolutionMode,

    /// Largest satellite offset from the primary, in pixels
    #[arg(long, default_value_t = 5.0)]
    pub offset_gals: f64,

    /// Beam minor and major FWHM in pixels and position angle in degrees (format: "bmin,bmaj,bpa")
    #[arg(long, default_value = "4.0,4.0,0.0", value_parser = parse_beam)]
    pub beam: BeamInfo,

    /// Output spatial size in pixels
    #[arg(long, default_value_t = 125)]
    pub grid_size: usize,

    /// Number of output spectral channels
    #[arg(long, default_value_t = 40)]
    pub n_spectral_slices: usize,

    /// Fixed Sersic index for every component
    #[arg(long)]
    pub n_sersic: Option<f64>,

    /// Fixed output file stem
    #[arg(long)]
    pub fname: Option<String>,

    /// Base random seed (cube i uses seed + i)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Spatial oversampling factor
    #[arg(long, default_value_t = 5)]
    pub spatial_oversample: usize,

    /// Spectral oversampling factor
    #[arg(long, default_value_t = 3)]
    pub spectral_oversample: usize,

    /// Line-of-sight samples (defaults to the oversampled pixel pitch)
    #[arg(long)]
    pub los_samples: Option<usize>,

    /// Half-width of the velocity axis in km/s
    #[arg(long, default_value_t = 400.0)]
    pub velocity_range: f64,

    /// Physical size of one output pixel, recorded in metadata
    #[arg(long, default_value_t = 1.0)]
    pub pixel_scale: f64,

    /// Log per-cube summaries and show progress
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl GeneratorArgs {
    pub fn to_config(&self) -> GeneratorConfig {
        GeneratorConfig::default()
            .with_n_gals(self.n_gals)
            .with_max_random_gals(self.max_random_gals)
            .with_n_cubes(self.n_cubes)
            .with_resolution(self.resolution)
            .with_offset_gals(self.offset_gals)
            .with_beam(self.beam)
            .with_grid_size(self.grid_size)
            .with_spectral_slices(self.n_spectral_slices)
            .with_sersic_index(self.n_sersic)
            .with_fname(self.fname.clone())
            .with_seed(self.seed)
            .with_spatial_oversample(self.spatial_oversample)
            .with_spectral_oversample(self.spectral_oversample)
            .with_los_samples(self.los_samples)
            .with_velocity_range(self.velocity_range)
            .with_pixel_scale(self.pixel_scale)
            .with_verbose(self.verbose)
    }
}
