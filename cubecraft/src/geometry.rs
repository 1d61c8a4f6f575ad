//! Orientation of a disk on the sky.
//!
//! Disk frame: `x_d` along the major axis, `z_d` along the rotation axis.
//! Sky frame: `(x, y)` in the image plane and `l` along the line of sight.
//! The disk is tilted about `x_d` by the inclination, then turned about the
//! line of sight so that its major axis lies at the position angle
//! (counter-clockwise from +y), then shifted by the centre offset.
//!
//! Field builders never rotate sampled arrays. They pull back every sky voxel
//! centre into the disk frame and evaluate the profiles there, so each output
//! voxel corresponds to exactly one point of the disk and anything that falls
//! outside the grid is simply never sampled.

use std::f64::consts::FRAC_PI_2;

use nalgebra::{Rotation3, Vector3};
use ndarray::{Array, Array2, Array3, Dimension, Ix2, Ix3, Zip};

use crate::error::{require_finite, DomainError};
use crate::grid::Grid;
use crate::sampler::GalaxyParameters;

/// Below this cylindrical radius the azimuth is undefined and taken as 0.
const AXIS_EPSILON: f64 = 1e-12;

/// Cylindrical disk coordinates of a block of sky voxels.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskCoords<D: Dimension> {
    /// In-plane radius `R`
    pub radius: Array<f64, D>,
    /// Signed height `z` above the midplane
    pub height: Array<f64, D>,
    /// `cos(theta) = x_d / R`, 0 on the rotation axis
    pub cos_azimuth: Array<f64, D>,
}

impl<D: Dimension> DiskCoords<D> {
    pub fn dim(&self) -> D::Pattern {
        self.radius.dim()
    }
}

/// Cylindrical coordinates of a disk-frame point.
fn cylindrical(disk: &Vector3<f64>) -> (f64, f64, f64) {
    let radius = disk.x.hypot(disk.y);
    let cos_azimuth = if radius > AXIS_EPSILON {
        disk.x / radius
    } else {
        0.0
    };
    (radius, disk.z, cos_azimuth)
}

/// Rigid disk-to-sky transform of one component.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryTransform {
    inclination: f64,
    position_angle: f64,
    center: Vector3<f64>,
    rotation: Rotation3<f64>,
    inverse: Rotation3<f64>,
}

impl GeometryTransform {
    /// # Arguments
    /// * `inclination` - Radians in `[0, pi/2]`, 0 is face-on
    /// * `position_angle` - Radians, major axis counter-clockwise from +y
    /// * `center_offset` - `(x, y)` offset from the field centre in pixels
    pub fn new(
        inclination: f64,
        position_angle: f64,
        center_offset: [f64; 2],
    ) -> Result<Self, DomainError> {
        if !(0.0..=FRAC_PI_2).contains(&inclination) {
            return Err(DomainError::InclinationOutOfRange(inclination));
        }
        require_finite("position_angle", position_angle)?;
        require_finite("center_offset x", center_offset[0])?;
        require_finite("center_offset y", center_offset[1])?;

        let tilt = Rotation3::from_axis_angle(&Vector3::x_axis(), inclination);
        let turn = Rotation3::from_axis_angle(&Vector3::z_axis(), position_angle + FRAC_PI_2);
        let rotation = turn * tilt;
        Ok(Self {
            inclination,
            position_angle,
            center: Vector3::new(center_offset[0], center_offset[1], 0.0),
            rotation,
            inverse: rotation.inverse(),
        })
    }

    pub fn from_parameters(params: &GalaxyParameters) -> Result<Self, DomainError> {
        Self::new(
            params.inclination,
            params.position_angle,
            params.center_offset,
        )
    }

    pub fn inclination(&self) -> f64 {
        self.inclination
    }

    pub fn position_angle(&self) -> f64 {
        self.position_angle
    }

    /// Map a disk-frame point to sky coordinates `(x, y, l)`.
    pub fn disk_to_sky(&self, disk: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * disk + self.center
    }

    /// Map a sky point `(x, y, l)` back into the disk frame.
    pub fn sky_to_disk(&self, sky: &Vector3<f64>) -> Vector3<f64> {
        self.inverse * (sky - self.center)
    }

    /// Half the range of disk height swept along one voxel edge.
    ///
    /// Of the three voxel edges `(1/k, 1/k, los_step)` this takes the one
    /// whose projection onto the disk normal is longest. A vertical profile
    /// averaged over that span and sampled at the voxel centres sums to its
    /// exact integral on the voxel lattice, face-on, edge-on or in between.
    pub fn height_half_span(&self, grid: &Grid) -> f64 {
        let pixel = 1.0 / grid.spatial_oversample() as f64;
        let edges = [pixel, pixel, grid.los_step()];
        let normal = self.inverse.matrix().row(2);
        0.5 * normal
            .iter()
            .zip(edges)
            .map(|(component, edge)| component.abs() * edge)
            .fold(0.0, f64::max)
    }

    /// Disk coordinates of the voxels of one oversampled sky row.
    ///
    /// Returns arrays of shape `(n_los, n_x * k)` for row `row` of the
    /// oversampled y axis.
    pub fn disk_coords_row(&self, grid: &Grid, row: usize) -> DiskCoords<Ix2> {
        let xs = grid.x_axis();
        let los = grid.los_axis();
        let y = grid.y_axis()[row];
        let dims = (los.len(), xs.len());

        let mut coords = DiskCoords {
            radius: Array2::zeros(dims),
            height: Array2::zeros(dims),
            cos_azimuth: Array2::zeros(dims),
        };
        Zip::indexed(&mut coords.radius)
            .and(&mut coords.height)
            .and(&mut coords.cos_azimuth)
            .for_each(|(j, ix), radius, height, cos_azimuth| {
                let disk = self.sky_to_disk(&Vector3::new(xs[ix], y, los[j]));
                (*radius, *height, *cos_azimuth) = cylindrical(&disk);
            });
        coords
    }

    /// Disk coordinates of every oversampled voxel, shape `(n_los, n_y * k, n_x * k)`.
    pub fn disk_coords(&self, grid: &Grid) -> DiskCoords<Ix3> {
        let xs = grid.x_axis();
        let ys = grid.y_axis();
        let los = grid.los_axis();
        let dims = (los.len(), ys.len(), xs.len());

        let mut coords = DiskCoords {
            radius: Array3::zeros(dims),
            height: Array3::zeros(dims),
            cos_azimuth: Array3::zeros(dims),
        };
        Zip::indexed(&mut coords.radius)
            .and(&mut coords.height)
            .and(&mut coords.cos_azimuth)
            .par_for_each(|(j, iy, ix), radius, height, cos_azimuth| {
                let disk = self.sky_to_disk(&Vector3::new(xs[ix], ys[iy], los[j]));
                (*radius, *height, *cos_azimuth) = cylindrical(&disk);
            });
        coords
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridBuilder;
    use approx::assert_relative_eq;
    use shared::CubeShape;

    #[test]
    fn test_face_on_is_identity_up_to_turn() {
        let t = GeometryTransform::new(0.0, 0.0, [0.0, 0.0]).unwrap();
        // Major axis along +y at PA = 0
        let sky = t.disk_to_sky(&Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(sky, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
        // Rotation axis along the line of sight
        let axis = t.disk_to_sky(&Vector3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(axis, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_position_angle_counter_clockwise() {
        let t = GeometryTransform::new(0.3, FRAC_PI_2, [0.0, 0.0]).unwrap();
        let sky = t.disk_to_sky(&Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(sky, Vector3::new(-1.0, 0.0, 0.0), epsilon = 1e-12);
    }

    fn coarse_los_grid() -> Grid {
        // 8 line-of-sight samples over a 16-pixel diagonal: los_step = sqrt(2)
        GridBuilder::new(CubeShape::new(2, 8, 8))
            .spatial_oversample(4)
            .los_samples(Some(8))
            .build()
            .unwrap()
    }

    #[test]
    fn test_edge_on_axis_in_sky_plane() {
        let t = GeometryTransform::new(FRAC_PI_2, 0.0, [0.0, 0.0]).unwrap();
        let axis = t.disk_to_sky(&Vector3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(axis.z, 0.0, epsilon = 1e-12);
        // The normal lies along sky x, so the span is half an oversampled pixel
        assert_relative_eq!(t.height_half_span(&coarse_los_grid()), 0.125, epsilon = 1e-12);
    }

    #[test]
    fn test_round_trip_with_offset() {
        let t = GeometryTransform::new(0.7, 1.9, [3.0, -2.5]).unwrap();
        let p = Vector3::new(1.5, -0.25, 0.4);
        let back = t.sky_to_disk(&t.disk_to_sky(&p));
        assert_relative_eq!(back, p, epsilon = 1e-12);
        let centre = t.disk_to_sky(&Vector3::zeros());
        assert_relative_eq!(centre, Vector3::new(3.0, -2.5, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_half_span_follows_inclination() {
        let grid = coarse_los_grid();
        assert_relative_eq!(grid.los_step(), 2f64.sqrt(), epsilon = 1e-12);

        let face_on = GeometryTransform::new(0.0, 0.4, [0.0, 0.0]).unwrap();
        assert_relative_eq!(face_on.height_half_span(&grid), 0.5 * grid.los_step(), epsilon = 1e-12);

        // Moderately inclined: the long line-of-sight edge still dominates
        let inclined = GeometryTransform::new(1.0, 0.4, [0.0, 0.0]).unwrap();
        assert_relative_eq!(
            inclined.height_half_span(&grid),
            0.5 * grid.los_step() * 1.0f64.cos(),
            epsilon = 1e-12
        );

        // Nearly edge-on: a sky pixel edge takes over
        let steep = GeometryTransform::new(1.5, 0.0, [0.0, 0.0]).unwrap();
        assert_relative_eq!(steep.height_half_span(&grid), 0.5 * 0.25 * 1.5f64.sin(), epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_bad_orientation() {
        assert!(matches!(
            GeometryTransform::new(-0.1, 0.0, [0.0, 0.0]),
            Err(DomainError::InclinationOutOfRange(_))
        ));
        assert!(GeometryTransform::new(0.1, f64::NAN, [0.0, 0.0]).is_err());
    }

    #[test]
    fn test_row_matches_full_block() {
        let grid = GridBuilder::new(CubeShape::new(4, 6, 6))
            .spatial_oversample(2)
            .build()
            .unwrap();
        let t = GeometryTransform::new(0.9, 0.3, [0.5, -1.0]).unwrap();
        let full = t.disk_coords(&grid);
        let row = t.disk_coords_row(&grid, 5);
        let n_los = grid.los_samples();
        assert_eq!(row.dim(), (n_los, 12));
        for j in 0..n_los {
            for ix in 0..12 {
                assert_relative_eq!(row.radius[[j, ix]], full.radius[[j, 5, ix]]);
                assert_relative_eq!(row.height[[j, ix]], full.height[[j, 5, ix]]);
                assert_relative_eq!(row.cos_azimuth[[j, ix]], full.cos_azimuth[[j, 5, ix]]);
            }
        }
    }

    #[test]
    fn test_cos_azimuth_bounds() {
        let grid = GridBuilder::new(CubeShape::new(2, 5, 5))
            .spatial_oversample(1)
            .build()
            .unwrap();
        let t = GeometryTransform::new(0.0, 0.0, [0.0, 0.0]).unwrap();
        let coords = t.disk_coords(&grid);
        assert!(coords.cos_azimuth.iter().all(|c| (-1.0..=1.0).contains(c)));
        assert!(coords.radius.iter().all(|r| *r >= 0.0));
        // Face-on: the central column lies on the rotation axis
        assert_eq!(coords.radius[[0, 2, 2]], 0.0);
        assert_eq!(coords.cos_azimuth[[0, 2, 2]], 0.0);
    }
}
