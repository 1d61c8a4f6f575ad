//! Type-safe physical units for galaxy parameters
//!
//! Physical inputs (galaxy sizes in kiloparsecs, angles in degrees, speeds in
//! km/s) are carried as `uom` quantities until they are converted into the
//! pixel units the pipeline works in.

use uom::si::angle::{degree, radian};
use uom::si::f64::*;
use uom::si::length::meter;
use uom::si::velocity::{kilometer_per_second, meter_per_second};

/// Type alias for angle measurements with convenient methods
pub type Angle = uom::si::f64::Angle;

/// Type alias for length measurements with convenient methods
pub type Length = uom::si::f64::Length;

/// Type alias for speeds with convenient methods
pub type Speed = Velocity;

/// IAU parsec in meters, times one thousand
const METERS_PER_KILOPARSEC: f64 = 3.085_677_581_491_367e19;

/// Extension trait for angle conversions
pub trait AngleExt {
    /// Create angle from degrees
    fn from_degrees(degrees: f64) -> Self;

    /// Get angle in degrees
    fn as_degrees(&self) -> f64;

    /// Create angle from radians
    fn from_radians(radians: f64) -> Self;

    /// Get angle in radians
    fn as_radians(&self) -> f64;
}

/// Extension trait for galactic length scales
pub trait LengthExt {
    /// Create length from kiloparsecs
    fn from_kiloparsecs(kpc: f64) -> Self;

    /// Get length in kiloparsecs
    fn as_kiloparsecs(&self) -> f64;

    /// Length in output pixels for a given plate scale in kpc/pixel
    fn in_pixels(&self, kpc_per_pixel: f64) -> f64;
}

/// Extension trait for line-of-sight and rotation speeds
pub trait SpeedExt {
    /// Create speed from km/s
    fn from_km_per_s(km_s: f64) -> Self;

    /// Get speed in km/s
    fn as_km_per_s(&self) -> f64;

    /// Create speed from m/s
    fn from_m_per_s(m_s: f64) -> Self;

    /// Get speed in m/s
    fn as_m_per_s(&self) -> f64;
}

impl AngleExt for Angle {
    fn from_degrees(degrees: f64) -> Self {
        Angle::new::<degree>(degrees)
    }

    fn as_degrees(&self) -> f64 {
        self.get::<degree>()
    }

    fn from_radians(radians: f64) -> Self {
        Angle::new::<radian>(radians)
    }

    fn as_radians(&self) -> f64 {
        self.get::<radian>()
    }
}

impl LengthExt for Length {
    fn from_kiloparsecs(kpc: f64) -> Self {
        Length::new::<meter>(kpc * METERS_PER_KILOPARSEC)
    }

    fn as_kiloparsecs(&self) -> f64 {
        self.get::<meter>() / METERS_PER_KILOPARSEC
    }

    fn in_pixels(&self, kpc_per_pixel: f64) -> f64 {
        self.as_kiloparsecs() / kpc_per_pixel
    }
}

impl SpeedExt for Speed {
    fn from_km_per_s(km_s: f64) -> Self {
        Speed::new::<kilometer_per_second>(km_s)
    }

    fn as_km_per_s(&self) -> f64 {
        self.get::<kilometer_per_second>()
    }

    fn from_m_per_s(m_s: f64) -> Self {
        Speed::new::<meter_per_second>(m_s)
    }

    fn as_m_per_s(&self) -> f64 {
        self.get::<meter_per_second>()
    }
}
