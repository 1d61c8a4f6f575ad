//! Random galaxy parameters.
//!
//! A cube holds one primary disk, centred in the field, and optionally a few
//! smaller, fainter satellites scattered around it. Every draw comes from the
//! caller's RNG in a fixed order, so a seeded RNG reproduces the same system.

use std::f64::consts::{FRAC_PI_2, PI};

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::GeneratorConfig;
use crate::error::{require_finite, require_positive, DomainError};
use crate::profile::{sersic_b_n, sersic_reference_radius};

/// Parameters of one disk component, in pixel units, radians and km/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GalaxyParameters {
    /// Surface brightness `S_e` at the effective radius
    pub effective_surface_brightness: f64,
    /// Half-light radius `R_e` in pixels
    pub effective_radius: f64,
    pub sersic_index: f64,
    /// Exponential scale height `h_z` in pixels
    pub scale_height: f64,
    /// Inclination in radians, 0 is face-on
    pub inclination: f64,
    /// Major axis position angle in radians, counter-clockwise from +y
    pub position_angle: f64,
    /// Rotation velocity scale `v_0` in km/s
    pub velocity_scale: f64,
    /// Rotation curve reference radius `R_0` in pixels
    pub velocity_reference_radius: f64,
    /// Offset `(x, y)` of the centre from the field centre, in pixels
    pub center_offset: [f64; 2],
    pub systemic_velocity: f64,
    /// Intrinsic line-of-sight velocity dispersion in km/s
    pub velocity_dispersion: f64,
    /// Multiplier applied to the density of small sources
    pub flux_rescale: f64,
}

impl GalaxyParameters {
    /// A face-on, centred disk with the given light profile.
    ///
    /// The scale height defaults to a tenth of the effective radius, the
    /// rotation scale to 150 km/s and the reference radius to `R_e / b_n^n`.
    /// Use the `with_*` methods to set the rest.
    pub fn disk(
        effective_surface_brightness: f64,
        effective_radius: f64,
        sersic_index: f64,
    ) -> Result<Self, DomainError> {
        let velocity_reference_radius = sersic_reference_radius(effective_radius, sersic_index)?;
        let params = Self {
            effective_surface_brightness,
            effective_radius,
            sersic_index,
            scale_height: 0.1 * effective_radius,
            inclination: 0.0,
            position_angle: 0.0,
            velocity_scale: 150.0,
            velocity_reference_radius,
            center_offset: [0.0, 0.0],
            systemic_velocity: 0.0,
            velocity_dispersion: 0.0,
            flux_rescale: 1.0,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn with_scale_height(mut self, scale_height: f64) -> Self {
        self.scale_height = scale_height;
        self
    }

    /// Set inclination and position angle, both in radians.
    pub fn with_orientation(mut self, inclination: f64, position_angle: f64) -> Self {
        self.inclination = inclination;
        self.position_angle = position_angle;
        self
    }

    pub fn with_velocity_scale(mut self, velocity_scale: f64) -> Self {
        self.velocity_scale = velocity_scale;
        self
    }

    pub fn with_velocity_reference_radius(mut self, radius: f64) -> Self {
        self.velocity_reference_radius = radius;
        self
    }

    pub fn with_center_offset(mut self, x: f64, y: f64) -> Self {
        self.center_offset = [x, y];
        self
    }

    pub fn with_systemic_velocity(mut self, systemic_velocity: f64) -> Self {
        self.systemic_velocity = systemic_velocity;
        self
    }

    pub fn with_velocity_dispersion(mut self, velocity_dispersion: f64) -> Self {
        self.velocity_dispersion = velocity_dispersion;
        self
    }

    pub fn with_flux_rescale(mut self, flux_rescale: f64) -> Self {
        self.flux_rescale = flux_rescale;
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        require_positive(
            "effective_surface_brightness",
            self.effective_surface_brightness,
        )?;
        require_positive("effective_radius", self.effective_radius)?;
        sersic_b_n(self.sersic_index)?;
        require_positive("scale_height", self.scale_height)?;
        if !(0.0..=FRAC_PI_2).contains(&self.inclination) {
            return Err(DomainError::InclinationOutOfRange(self.inclination));
        }
        require_finite("position_angle", self.position_angle)?;
        require_positive("velocity_scale", self.velocity_scale)?;
        require_positive("velocity_reference_radius", self.velocity_reference_radius)?;
        require_finite("center_offset x", self.center_offset[0])?;
        require_finite("center_offset y", self.center_offset[1])?;
        require_finite("systemic_velocity", self.systemic_velocity)?;
        if !(self.velocity_dispersion.is_finite() && self.velocity_dispersion >= 0.0) {
            return Err(DomainError::NonFinite {
                name: "velocity_dispersion",
                value: self.velocity_dispersion,
            });
        }
        require_positive("flux_rescale", self.flux_rescale)?;
        Ok(())
    }
}

/// Uniform draw on `[lo, hi)`, or `lo` for a degenerate range.
fn draw<R: Rng + ?Sized>(rng: &mut R, (lo, hi): (f64, f64)) -> f64 {
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}

/// Draws galaxy systems for a configuration.
#[derive(Debug, Clone, Copy)]
pub struct ParameterSampler<'a> {
    config: &'a GeneratorConfig,
}

impl<'a> ParameterSampler<'a> {
    pub fn new(config: &'a GeneratorConfig) -> Self {
        Self { config }
    }

    /// Admissible primary effective radius range in pixels.
    ///
    /// The range is set by the resolution mode relative to the beam major
    /// FWHM and capped by the grid size.
    pub fn effective_radius_bounds(&self) -> Result<(f64, f64), DomainError> {
        let beam_major = self.config.beam.major_fwhm();
        let (lo_frac, hi_frac) = self.config.resolution.beam_fraction_bounds();
        let cap = self.config.sampling.max_radius_fraction * self.config.grid_size as f64;
        let min = lo_frac * beam_major;
        let max = (hi_frac * beam_major).min(cap);
        if !(min.is_finite() && min > 0.0 && max >= min) {
            return Err(DomainError::EffectiveRadiusBounds {
                min,
                max,
                beam_major,
                grid_size: self.config.grid_size,
            });
        }
        Ok((min, max))
    }

    /// Flux multiplier for a source of effective radius `r_e`.
    ///
    /// Sources smaller than the threshold fraction of the beam are boosted by
    /// the squared size ratio, capped, so they stay detectable after
    /// convolution.
    pub fn flux_rescale(&self, r_e: f64) -> f64 {
        let sampling = &self.config.sampling;
        let threshold = sampling.small_source_threshold * self.config.beam.major_fwhm();
        if r_e < threshold {
            let rescale = ((threshold / r_e).powi(2)).min(sampling.max_flux_rescale);
            debug!(
                "Source with R_e = {:.3} px below {:.3} px, flux rescaled by {:.2}",
                r_e, threshold, rescale
            );
            rescale
        } else {
            1.0
        }
    }

    pub fn sample_galaxy_count<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        match self.config.n_gals {
            Some(n) => n,
            None => rng.gen_range(1..=self.config.max_random_gals.max(1)),
        }
    }

    fn sample_sersic_index<R: Rng + ?Sized>(&self, rng: &mut R, range: (f64, f64)) -> f64 {
        match self.config.n_sersic {
            Some(n) => n,
            None => draw(rng, range),
        }
    }

    /// Draw the centred primary disk.
    pub fn sample_primary<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<GalaxyParameters, DomainError> {
        let sampling = &self.config.sampling;
        let effective_radius = draw(rng, self.effective_radius_bounds()?);
        let effective_surface_brightness = draw(rng, sampling.surface_brightness);
        let sersic_index = self.sample_sersic_index(rng, sampling.sersic_index);
        let scale_height = effective_radius * draw(rng, sampling.scale_height_fraction);
        let inclination = draw(rng, (0.0, 1.0)).acos();
        let position_angle = draw(rng, (0.0, 2.0 * PI));
        let velocity_scale = draw(rng, sampling.velocity_scale);
        let velocity_dispersion = draw(rng, sampling.velocity_dispersion);

        let params = GalaxyParameters::disk(effective_surface_brightness, effective_radius, sersic_index)?
            .with_scale_height(scale_height)
            .with_orientation(inclination, position_angle)
            .with_velocity_scale(velocity_scale)
            .with_velocity_dispersion(velocity_dispersion)
            .with_flux_rescale(self.flux_rescale(effective_radius));
        params.validate()?;
        Ok(params)
    }

    /// Draw a satellite that is smaller and fainter than `primary`.
    pub fn sample_satellite<R: Rng + ?Sized>(
        &self,
        primary: &GalaxyParameters,
        rng: &mut R,
    ) -> Result<GalaxyParameters, DomainError> {
        let sampling = &self.config.sampling;
        let effective_radius = primary.effective_radius * draw(rng, sampling.satellite_scale);
        let scale_height = primary.scale_height * draw(rng, sampling.satellite_scale);
        let effective_surface_brightness =
            primary.effective_surface_brightness * draw(rng, sampling.satellite_scale);
        let sersic_index = self.sample_sersic_index(rng, sampling.satellite_sersic_index);
        let inclination = draw(rng, (0.0, 1.0)).acos();
        let position_angle = draw(rng, (0.0, 2.0 * PI));

        // Uniform over the disk of radius offset_gals around the primary
        let offset_angle = draw(rng, (0.0, 2.0 * PI));
        let offset_radius = self.config.offset_gals * draw(rng, (0.0, 1.0)).sqrt();
        let [px, py] = primary.center_offset;
        let x = px + offset_radius * offset_angle.cos();
        let y = py + offset_radius * offset_angle.sin();

        let max_offset = sampling.max_systemic_offset;
        let systemic_velocity = draw(rng, (-max_offset, max_offset));
        let velocity_scale = draw(rng, sampling.velocity_scale);
        let velocity_dispersion = draw(rng, sampling.velocity_dispersion);

        let params = GalaxyParameters::disk(effective_surface_brightness, effective_radius, sersic_index)?
            .with_scale_height(scale_height)
            .with_orientation(inclination, position_angle)
            .with_velocity_scale(velocity_scale)
            .with_center_offset(x, y)
            .with_systemic_velocity(systemic_velocity)
            .with_velocity_dispersion(velocity_dispersion)
            .with_flux_rescale(self.flux_rescale(effective_radius));
        params.validate()?;
        Ok(params)
    }

    /// Draw a full system: the primary first, then its satellites.
    pub fn sample_system<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<Vec<GalaxyParameters>, DomainError> {
        let n_gals = self.sample_galaxy_count(rng);
        let primary = self.sample_primary(rng)?;
        let mut galaxies = Vec::with_capacity(n_gals);
        galaxies.push(primary);
        for _ in 1..n_gals {
            galaxies.push(self.sample_satellite(&primary, rng)?);
        }
        Ok(galaxies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BeamInfo, ResolutionMode};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_primary_within_bounds() {
        let config = GeneratorConfig::default().with_resolution(ResolutionMode::Resolved);
        let sampler = ParameterSampler::new(&config);
        let (lo, hi) = sampler.effective_radius_bounds().unwrap();
        assert_eq!((lo, hi), (4.0, 12.0));

        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let p = sampler.sample_primary(&mut rng).unwrap();
            assert!(p.effective_radius >= lo && p.effective_radius <= hi);
            assert!(p.scale_height >= 0.05 * p.effective_radius);
            assert!(p.scale_height <= 0.2 * p.effective_radius);
            assert!((0.5..=2.5).contains(&p.sersic_index));
            assert!((0.0..=FRAC_PI_2).contains(&p.inclination));
            assert!((0.0..2.0 * PI).contains(&p.position_angle));
            assert_eq!(p.center_offset, [0.0, 0.0]);
            assert_eq!(p.flux_rescale, 1.0);
        }
    }

    #[test]
    fn test_grid_caps_radius() {
        let config = GeneratorConfig::default()
            .with_grid_size(40)
            .with_beam(BeamInfo::circular(4.0));
        let bounds = ParameterSampler::new(&config).effective_radius_bounds().unwrap();
        assert_eq!(bounds, (1.0, 5.0));
    }

    #[test]
    fn test_satellites_smaller_and_fainter() {
        let config = GeneratorConfig::default().with_n_gals(Some(3)).with_offset_gals(6.0);
        let sampler = ParameterSampler::new(&config);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let system = sampler.sample_system(&mut rng).unwrap();
            assert_eq!(system.len(), 3);
            let primary = system[0];
            for satellite in &system[1..] {
                assert!(satellite.effective_radius <= 0.5 * primary.effective_radius + 1e-12);
                assert!(satellite.effective_radius >= primary.effective_radius / 3.0 - 1e-12);
                assert!(
                    satellite.effective_surface_brightness
                        <= 0.5 * primary.effective_surface_brightness + 1e-12
                );
                assert!(satellite.scale_height <= 0.5 * primary.scale_height + 1e-12);
                let [x, y] = satellite.center_offset;
                assert!((x * x + y * y).sqrt() <= 6.0 + 1e-12);
                assert!(satellite.systemic_velocity.abs() <= 50.0);
                assert!((0.5..=1.5).contains(&satellite.sersic_index));
            }
        }
    }

    #[test]
    fn test_random_galaxy_count() {
        let config = GeneratorConfig::default();
        let sampler = ParameterSampler::new(&config);
        let mut rng = StdRng::seed_from_u64(5);
        let counts: Vec<usize> = (0..300).map(|_| sampler.sample_galaxy_count(&mut rng)).collect();
        assert!(counts.iter().all(|n| (1..=3).contains(n)));
        for n in 1..=3 {
            assert!(counts.contains(&n));
        }
    }

    #[test]
    fn test_fixed_sersic_index_applies_to_all() {
        let config = GeneratorConfig::default()
            .with_n_gals(Some(2))
            .with_sersic_index(Some(1.0));
        let mut rng = StdRng::seed_from_u64(9);
        let system = ParameterSampler::new(&config).sample_system(&mut rng).unwrap();
        assert!(system.iter().all(|g| g.sersic_index == 1.0));
    }

    #[test]
    fn test_same_seed_same_system() {
        let config = GeneratorConfig::default();
        let sampler = ParameterSampler::new(&config);
        let a = sampler.sample_system(&mut StdRng::seed_from_u64(42)).unwrap();
        let b = sampler.sample_system(&mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_flux_rescale() {
        let config = GeneratorConfig::default().with_beam(BeamInfo::circular(4.0));
        let sampler = ParameterSampler::new(&config);
        assert_eq!(sampler.flux_rescale(2.0), 1.0);
        assert_relative_eq!(sampler.flux_rescale(1.0), 4.0);
        assert_relative_eq!(sampler.flux_rescale(0.01), 50.0);
    }

    #[test]
    fn test_reference_radius_follows_profile() {
        let p = GalaxyParameters::disk(1.0, 6.0, 1.0).unwrap();
        let b = sersic_b_n(1.0).unwrap();
        assert_relative_eq!(p.velocity_reference_radius, 6.0 / b, epsilon = 1e-12);
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        let p = GalaxyParameters::disk(1.0, 3.0, 1.0).unwrap();
        assert!(p.with_orientation(2.0, 0.0).validate().is_err());
        assert!(p.with_scale_height(0.0).validate().is_err());
        assert!(p.with_velocity_dispersion(-1.0).validate().is_err());
        assert!(p.with_center_offset(f64::NAN, 0.0).validate().is_err());
        assert!(GalaxyParameters::disk(1.0, 3.0, 0.05).is_err());
    }

    #[test]
    fn test_degenerate_range_draw() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(draw(&mut rng, (2.0, 2.0)), 2.0);
        let x = draw(&mut rng, (1.0, 2.0));
        assert!((1.0..2.0).contains(&x));
    }
}
