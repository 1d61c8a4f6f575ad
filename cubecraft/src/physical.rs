//! Galaxies described in physical units.

use crate::error::{require_positive, DomainError};
use crate::profile::sersic_reference_radius;
use crate::sampler::GalaxyParameters;
use crate::units::{Angle, AngleExt, Length, LengthExt, Speed, SpeedExt};

/// A disk component in kiloparsecs, degrees and km/s.
///
/// Converted to pixel-unit [`GalaxyParameters`] with a plate scale before
/// generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalGalaxy {
    pub effective_surface_brightness: f64,
    pub effective_radius: Length,
    pub sersic_index: f64,
    pub scale_height: Length,
    pub inclination: Angle,
    pub position_angle: Angle,
    pub velocity_scale: Speed,
    pub center_offset: (Length, Length),
    pub systemic_velocity: Speed,
    pub velocity_dispersion: Speed,
}

impl Default for PhysicalGalaxy {
    fn default() -> Self {
        Self {
            effective_surface_brightness: 0.1,
            effective_radius: Length::from_kiloparsecs(5.0),
            sersic_index: 1.0,
            scale_height: Length::from_kiloparsecs(0.8),
            inclination: Angle::from_degrees(45.0),
            position_angle: Angle::from_degrees(30.0),
            velocity_scale: Speed::from_km_per_s(200.0),
            center_offset: (Length::from_kiloparsecs(0.0), Length::from_kiloparsecs(0.0)),
            systemic_velocity: Speed::from_km_per_s(0.0),
            velocity_dispersion: Speed::from_km_per_s(40.0),
        }
    }
}

impl PhysicalGalaxy {
    /// Pixel-unit parameters at `kpc_per_pixel` kiloparsecs per output pixel.
    pub fn to_parameters(&self, kpc_per_pixel: f64) -> Result<GalaxyParameters, DomainError> {
        let scale = require_positive("kpc_per_pixel", kpc_per_pixel)?;
        let effective_radius = self.effective_radius.in_pixels(scale);
        let params = GalaxyParameters {
            effective_surface_brightness: self.effective_surface_brightness,
            effective_radius,
            sersic_index: self.sersic_index,
            scale_height: self.scale_height.in_pixels(scale),
            inclination: self.inclination.as_radians(),
            position_angle: self.position_angle.as_radians(),
            velocity_scale: self.velocity_scale.as_km_per_s(),
            velocity_reference_radius: sersic_reference_radius(effective_radius, self.sersic_index)?,
            center_offset: [
                self.center_offset.0.in_pixels(scale),
                self.center_offset.1.in_pixels(scale),
            ],
            systemic_velocity: self.systemic_velocity.as_km_per_s(),
            velocity_dispersion: self.velocity_dispersion.as_km_per_s(),
            flux_rescale: 1.0,
        };
        params.validate()?;
        Ok(params)
    }
}
