//! Line-of-sight velocity field of a rotating disk.
//!
//! Material moves on circular orbits at the rotation-curve speed. Projected
//! onto the line of sight this gives `v_c(R) * sin(i) * cos(theta) + v_sys`,
//! where `theta` is the azimuth from the major axis.

use ndarray::{Array, Dimension, Zip};

use crate::error::{require_finite, DomainError};
use crate::geometry::DiskCoords;
use crate::profile::RotationCurve;
use crate::sampler::GalaxyParameters;

#[derive(Debug, Clone, PartialEq)]
pub struct KinematicFieldBuilder {
    curve: RotationCurve,
    sin_inclination: f64,
    systemic_velocity: f64,
}

impl KinematicFieldBuilder {
    pub fn new(params: &GalaxyParameters) -> Result<Self, DomainError> {
        let curve = RotationCurve::new(params.velocity_scale, params.velocity_reference_radius)?;
        require_finite("systemic_velocity", params.systemic_velocity)?;
        Ok(Self {
            curve,
            sin_inclination: params.inclination.sin(),
            systemic_velocity: params.systemic_velocity,
        })
    }

    pub fn rotation_curve(&self) -> &RotationCurve {
        &self.curve
    }

    /// Line-of-sight velocity in km/s at disk radius `radius` and azimuth cosine `cos_azimuth`.
    pub fn line_of_sight(&self, radius: f64, cos_azimuth: f64) -> f64 {
        self.curve.evaluate(radius) * self.sin_inclination * cos_azimuth + self.systemic_velocity
    }

    /// Line-of-sight velocity at every voxel, km/s.
    pub fn build<D: Dimension>(&self, coords: &DiskCoords<D>) -> Array<f64, D> {
        Zip::from(&coords.radius)
            .and(&coords.cos_azimuth)
            .map_collect(|radius, cos_azimuth| self.line_of_sight(*radius, *cos_azimuth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeometryTransform;
    use crate::grid::GridBuilder;
    use approx::assert_relative_eq;
    use shared::CubeShape;
    use std::f64::consts::FRAC_PI_2;

    fn disk(inclination: f64) -> GalaxyParameters {
        GalaxyParameters::disk(1.0, 4.0, 1.0)
            .unwrap()
            .with_orientation(inclination, 0.0)
            .with_velocity_scale(200.0)
            .with_velocity_reference_radius(2.0)
    }

    #[test]
    fn test_face_on_has_only_systemic() {
        let params = disk(0.0).with_systemic_velocity(30.0);
        let builder = KinematicFieldBuilder::new(&params).unwrap();
        assert_relative_eq!(builder.line_of_sight(5.0, 1.0), 30.0);
        assert_relative_eq!(builder.line_of_sight(5.0, -0.3), 30.0);
    }

    #[test]
    fn test_edge_on_major_axis_speed() {
        let builder = KinematicFieldBuilder::new(&disk(FRAC_PI_2)).unwrap();
        assert_relative_eq!(builder.line_of_sight(2.0, 1.0), 1.022 * 200.0, epsilon = 1e-9);
        assert_relative_eq!(builder.line_of_sight(2.0, -1.0), -1.022 * 200.0, epsilon = 1e-9);
        assert_relative_eq!(builder.line_of_sight(2.0, 0.0), 0.0);
        assert_eq!(builder.line_of_sight(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_field_is_antisymmetric_about_minor_axis() {
        let grid = GridBuilder::new(CubeShape::new(2, 8, 8))
            .spatial_oversample(1)
            .build()
            .unwrap();
        let params = disk(0.8);
        let transform = GeometryTransform::from_parameters(&params).unwrap();
        let coords = transform.disk_coords(&grid);
        let builder = KinematicFieldBuilder::new(&params).unwrap();
        let velocity = builder.build(&coords);
        assert_eq!(velocity.dim(), coords.dim());
        // PA = 0 puts the major axis along y: mirrored rows carry opposite velocities
        let (n_los, n_y, n_x) = velocity.dim();
        for j in 0..n_los {
            for iy in 0..n_y {
                for ix in 0..n_x {
                    assert_relative_eq!(
                        velocity[[j, iy, ix]],
                        -velocity[[n_los - 1 - j, n_y - 1 - iy, n_x - 1 - ix]],
                        epsilon = 1e-9
                    );
                }
            }
        }
        let max = velocity.iter().cloned().fold(f64::MIN, f64::max);
        let fastest = coords
            .radius
            .iter()
            .map(|r| builder.rotation_curve().evaluate(*r))
            .fold(f64::MIN, f64::max);
        assert!(max <= fastest);
    }
}
