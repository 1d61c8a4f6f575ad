//! Error types for cube generation.

use shared::algo::BinningError;
use shared::image_proc::ConvolveError;
use shared::CubeShape;
use thiserror::Error;

/// An invalid physical or numerical parameter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("{name} must be positive and finite, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("{name} must be finite, got {value}")]
    NonFinite { name: &'static str, value: f64 },

    #[error("Radius must be non-negative, got {0}")]
    NegativeRadius(f64),

    #[error("Sersic index {0} outside valid range (0.1, 10]")]
    SersicIndexOutOfRange(f64),

    #[error("Inclination {0} rad outside [0, pi/2]")]
    InclinationOutOfRange(f64),

    #[error("Beam minor FWHM {minor} exceeds major FWHM {major}")]
    BeamAxes { major: f64, minor: f64 },

    #[error(
        "No admissible effective radius: bounds [{min}, {max}] for beam {beam_major} px on a {grid_size} px grid"
    )]
    EffectiveRadiusBounds {
        min: f64,
        max: f64,
        beam_major: f64,
        grid_size: usize,
    },
}

/// Inconsistent array shapes or sampling factors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    #[error("Cube shape {0} has a zero-length axis")]
    EmptyShape(CubeShape),

    #[error("{name} must be at least 1")]
    ZeroFactor { name: &'static str },

    #[error("{name} must be positive and finite, got {value}")]
    InvalidExtent { name: &'static str, value: f64 },

    #[error("Expected {expected:?} along {what}, got {actual:?}")]
    Mismatch {
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error(transparent)]
    Binning(#[from] BinningError),

    #[error(transparent)]
    Convolve(#[from] ConvolveError),
}

/// A configuration record rejected before any cube is generated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("At least one cube must be requested")]
    NoCubesRequested,

    #[error("Galaxy count must be at least 1, got {0}")]
    InvalidGalaxyCount(usize),

    #[error("{name} must be finite and non-negative, got {value}")]
    InvalidOption { name: &'static str, value: f64 },

    #[error("Sampling range {name} is invalid: [{lo}, {hi}]")]
    InvalidRange { name: &'static str, lo: f64, hi: f64 },

    #[error("No galaxy parameters supplied")]
    NoGalaxies,

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Failure of a single cube generation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CubeError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<BinningError> for CubeError {
    fn from(err: BinningError) -> Self {
        CubeError::Shape(ShapeError::Binning(err))
    }
}

impl From<ConvolveError> for CubeError {
    fn from(err: ConvolveError) -> Self {
        CubeError::Shape(ShapeError::Convolve(err))
    }
}

impl From<CubeError> for ConfigError {
    fn from(err: CubeError) -> Self {
        match err {
            CubeError::Domain(err) => ConfigError::Domain(err),
            CubeError::Shape(err) => ConfigError::Shape(err),
            CubeError::Config(err) => err,
        }
    }
}

/// Require a strictly positive, finite value.
pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<f64, DomainError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(DomainError::NonPositive { name, value })
    }
}

/// Require a finite value.
pub(crate) fn require_finite(name: &'static str, value: f64) -> Result<f64, DomainError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DomainError::NonFinite { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_positive() {
        assert_eq!(require_positive("h_z", 2.0), Ok(2.0));
        assert!(matches!(
            require_positive("h_z", 0.0),
            Err(DomainError::NonPositive { name: "h_z", .. })
        ));
        assert!(require_positive("h_z", f64::INFINITY).is_err());
        assert!(require_positive("h_z", f64::NAN).is_err());
    }

    #[test]
    fn test_nested_conversion() {
        let err: CubeError = BinningError::ZeroFactor(vec![0, 1]).into();
        assert!(matches!(err, CubeError::Shape(ShapeError::Binning(_))));

        let err: CubeError = ConfigError::NoCubesRequested.into();
        assert_eq!(err.to_string(), "At least one cube must be requested");
    }
}
