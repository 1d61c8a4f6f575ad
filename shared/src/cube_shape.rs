//! Spectral cube dimensions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Shape of a spectral cube in `(n_velocity, n_y, n_x)` order.
///
/// Uses usize for direct compatibility with ndarray indexing; the field
/// order matches the memory layout of every cube produced by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CubeShape {
    /// Number of spectral channels
    pub n_velocity: usize,
    /// Number of pixels along y
    pub n_y: usize,
    /// Number of pixels along x
    pub n_x: usize,
}

impl CubeShape {
    /// Create a new CubeShape
    pub fn new(n_velocity: usize, n_y: usize, n_x: usize) -> Self {
        Self { n_velocity, n_y, n_x }
    }

    /// Square spatial field with `n_velocity` channels
    pub fn square(n_velocity: usize, size: usize) -> Self {
        Self::new(n_velocity, size, size)
    }

    /// Total number of voxels
    pub fn voxel_count(&self) -> usize {
        self.n_velocity * self.n_y * self.n_x
    }

    /// True when any axis has zero length
    pub fn is_empty(&self) -> bool {
        self.voxel_count() == 0
    }

    /// Spatial plane as `(n_y, n_x)`
    pub fn plane(&self) -> (usize, usize) {
        (self.n_y, self.n_x)
    }

    /// Convert to ndarray dimension tuple
    pub fn to_tuple(&self) -> (usize, usize, usize) {
        (self.n_velocity, self.n_y, self.n_x)
    }

    /// Shape after multiplying every axis by the given factors
    pub fn oversampled(&self, spectral: usize, spatial: usize) -> Self {
        Self::new(
            self.n_velocity * spectral,
            self.n_y * spatial,
            self.n_x * spatial,
        )
    }
}

impl From<(usize, usize, usize)> for CubeShape {
    fn from(dims: (usize, usize, usize)) -> Self {
        Self::new(dims.0, dims.1, dims.2)
    }
}

impl From<CubeShape> for (usize, usize, usize) {
    fn from(shape: CubeShape) -> Self {
        shape.to_tuple()
    }
}

impl fmt::Display for CubeShape {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}x{}", self.n_velocity, self.n_y, self.n_x)
    }
}
