//! Analytic profiles for disk galaxies.
//!
//! All lengths are in output pixels and all speeds in km/s. Scalar functions
//! validate their arguments on every call; the profile structs validate once on
//! construction and are what the field builders evaluate per voxel.

use std::f64::consts::PI;

use ndarray::{Array, ArrayBase, Data, Dimension};
use shared::algo::IncompleteGamma;

use crate::error::{require_positive, DomainError};

/// Ratio FWHM / sigma of a Gaussian, `2 * sqrt(2 ln 2)`
pub const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949_3;

/// Smallest Sersic index, exclusive
pub const SERSIC_INDEX_MIN: f64 = 0.1;

/// Largest Sersic index, inclusive
pub const SERSIC_INDEX_MAX: f64 = 10.0;

/// Below this index the asymptotic b_n series diverges from the exact root
const SERSIC_SERIES_THRESHOLD: f64 = 0.36;

/// Velocity at the reference radius in units of `v_0`
pub const ROTATION_CURVE_AMPLITUDE: f64 = 1.022;

/// Logarithmic slope of the rotation curve beyond the turnover
pub const ROTATION_CURVE_SLOPE: f64 = 0.0803;

/// Convert a Gaussian full width at half maximum to its standard deviation.
pub fn fwhm_to_sigma(fwhm: f64) -> f64 {
    fwhm / FWHM_PER_SIGMA
}

fn check_sersic_index(n: f64) -> Result<f64, DomainError> {
    if n.is_finite() && n > SERSIC_INDEX_MIN && n <= SERSIC_INDEX_MAX {
        Ok(n)
    } else {
        Err(DomainError::SersicIndexOutOfRange(n))
    }
}

fn check_radius(r: f64) -> Result<f64, DomainError> {
    if r.is_nan() || r < 0.0 {
        Err(DomainError::NegativeRadius(r))
    } else {
        Ok(r)
    }
}

/// The Sersic constant `b_n` for which `R_e` encloses half the total light.
///
/// Uses the Ciotti & Bertin asymptotic expansion for `n >= 0.36` and the
/// MacArthur, Courteau & Holtzman polynomial fit below it.
///
/// # Arguments
/// * `n` - Sersic index in `(0.1, 10]`
///
/// # Returns
/// * `Ok(f64)` - The constant `b_n`
/// * `Err(DomainError)` - Index outside the supported range
pub fn sersic_b_n(n: f64) -> Result<f64, DomainError> {
    let n = check_sersic_index(n)?;
    if n >= SERSIC_SERIES_THRESHOLD {
        Ok(2.0 * n - 1.0 / 3.0 + 4.0 / (405.0 * n) + 46.0 / (25_515.0 * n.powi(2))
            + 131.0 / (1_148_175.0 * n.powi(3))
            - 2_194_697.0 / (30_690_717_750.0 * n.powi(4)))
    } else {
        Ok(0.01945 - 0.8902 * n + 10.95 * n.powi(2) - 19.67 * n.powi(3) + 13.43 * n.powi(4))
    }
}

/// Radius at which the rotation curve reaches `1.022 * v_0`, `R_e / b_n^n`.
pub fn sersic_reference_radius(r_e: f64, n: f64) -> Result<f64, DomainError> {
    let r_e = require_positive("effective_radius", r_e)?;
    let b_n = sersic_b_n(n)?;
    Ok(r_e / b_n.powf(n))
}

/// Sersic surface brightness `S_e * exp(-b_n * ((r / R_e)^(1/n) - 1))`.
pub fn sersic_radial(r: f64, s_e: f64, r_e: f64, n: f64) -> Result<f64, DomainError> {
    let r = check_radius(r)?;
    Ok(SersicProfile::new(s_e, r_e, n)?.evaluate(r))
}

/// Total light of a Sersic disk, `2 pi n S_e R_e^2 e^b_n Gamma(2n) / b_n^(2n)`.
pub fn sersic_total_flux(s_e: f64, r_e: f64, n: f64) -> Result<f64, DomainError> {
    Ok(SersicProfile::new(s_e, r_e, n)?.total_flux())
}

/// Light of a Sersic disk enclosed within radius `r`.
pub fn sersic_enclosed_flux(r: f64, s_e: f64, r_e: f64, n: f64) -> Result<f64, DomainError> {
    let r = check_radius(r)?;
    Ok(SersicProfile::new(s_e, r_e, n)?.enclosed_flux(r))
}

/// Vertical exponential `exp(-|z| / h_z)`.
pub fn vertical_exponential(z: f64, h_z: f64) -> Result<f64, DomainError> {
    Ok(VerticalProfile::new(h_z)?.evaluate(z))
}

/// Mean of `exp(-|z| / h_z)` over the interval `[z - half_span, z + half_span]`.
///
/// A zero `half_span` reduces to the point value.
pub fn vertical_exponential_cell_average(
    z: f64,
    half_span: f64,
    h_z: f64,
) -> Result<f64, DomainError> {
    if !(half_span.is_finite() && half_span >= 0.0) {
        return Err(DomainError::NonFinite {
            name: "half_span",
            value: half_span,
        });
    }
    Ok(VerticalProfile::new(h_z)?.cell_average(z, half_span))
}

/// Circular speed `v_0 * 1.022 * (R / R_0)^0.0803`, zero at the centre.
pub fn rotation_curve(r: f64, v_0: f64, r_0: f64) -> Result<f64, DomainError> {
    let r = check_radius(r)?;
    Ok(RotationCurve::new(v_0, r_0)?.evaluate(r))
}

/// Element-wise [`sersic_radial`], validating the parameters once.
pub fn sersic_radial_array<S, D>(
    r: &ArrayBase<S, D>,
    s_e: f64,
    r_e: f64,
    n: f64,
) -> Result<Array<f64, D>, DomainError>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let profile = SersicProfile::new(s_e, r_e, n)?;
    if let Some(bad) = r.iter().find(|v| check_radius(**v).is_err()) {
        return Err(DomainError::NegativeRadius(*bad));
    }
    Ok(r.mapv(|v| profile.evaluate(v)))
}

/// Element-wise [`vertical_exponential`].
pub fn vertical_exponential_array<S, D>(
    z: &ArrayBase<S, D>,
    h_z: f64,
) -> Result<Array<f64, D>, DomainError>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let profile = VerticalProfile::new(h_z)?;
    Ok(z.mapv(|v| profile.evaluate(v)))
}

/// Element-wise [`rotation_curve`].
pub fn rotation_curve_array<S, D>(
    r: &ArrayBase<S, D>,
    v_0: f64,
    r_0: f64,
) -> Result<Array<f64, D>, DomainError>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let curve = RotationCurve::new(v_0, r_0)?;
    if let Some(bad) = r.iter().find(|v| check_radius(**v).is_err()) {
        return Err(DomainError::NegativeRadius(*bad));
    }
    Ok(r.mapv(|v| curve.evaluate(v)))
}

/// Validated Sersic radial profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SersicProfile {
    surface_brightness: f64,
    effective_radius: f64,
    index: f64,
    b_n: f64,
    gamma: IncompleteGamma,
    /// `2 pi n S_e R_e^2 e^b_n / b_n^(2n)`
    flux_scale: f64,
}

impl SersicProfile {
    pub fn new(s_e: f64, r_e: f64, n: f64) -> Result<Self, DomainError> {
        let surface_brightness = require_positive("effective_surface_brightness", s_e)?;
        let effective_radius = require_positive("effective_radius", r_e)?;
        let b_n = sersic_b_n(n)?;
        let gamma = IncompleteGamma::new(2.0 * n).ok_or(DomainError::SersicIndexOutOfRange(n))?;
        let flux_scale = 2.0
            * PI
            * n
            * surface_brightness
            * effective_radius.powi(2)
            * (b_n - 2.0 * n * b_n.ln()).exp();
        Ok(Self {
            surface_brightness,
            effective_radius,
            index: n,
            b_n,
            gamma,
            flux_scale,
        })
    }

    pub fn surface_brightness(&self) -> f64 {
        self.surface_brightness
    }

    pub fn effective_radius(&self) -> f64 {
        self.effective_radius
    }

    pub fn index(&self) -> f64 {
        self.index
    }

    pub fn b_n(&self) -> f64 {
        self.b_n
    }

    /// Surface brightness at radius `r >= 0`.
    pub fn evaluate(&self, r: f64) -> f64 {
        let scaled = (r / self.effective_radius).powf(1.0 / self.index);
        self.surface_brightness * (-self.b_n * (scaled - 1.0)).exp()
    }

    /// Argument of the incomplete gamma function at radius `r`
    fn gamma_argument(&self, r: f64) -> f64 {
        self.b_n * (r / self.effective_radius).powf(1.0 / self.index)
    }

    /// Light integrated over the whole disk.
    pub fn total_flux(&self) -> f64 {
        self.flux_scale * self.gamma.complete()
    }

    /// Light enclosed within radius `r`.
    pub fn enclosed_flux(&self, r: f64) -> f64 {
        if r <= 0.0 {
            return 0.0;
        }
        self.flux_scale * self.gamma.lower(self.gamma_argument(r))
    }

    /// Light between radii `inner <= outer`.
    ///
    /// Taken from the upper incomplete gamma function once the inner radius
    /// is past the turnover, so the difference keeps its precision far out in
    /// the wings.
    pub fn flux_between(&self, inner: f64, outer: f64) -> f64 {
        let x_inner = self.gamma_argument(inner.max(0.0));
        let x_outer = self.gamma_argument(outer.max(0.0));
        let light = if x_inner > self.gamma.shape() + 1.0 {
            self.gamma.upper(x_inner) - self.gamma.upper(x_outer)
        } else {
            self.gamma.lower(x_outer) - self.gamma.lower(x_inner)
        };
        (self.flux_scale * light).max(0.0)
    }

    /// Mean surface brightness over the annulus `r^2 - core^2 < R^2 < r^2 + core^2`.
    ///
    /// The annulus covers an area of `2 pi core^2` at every `r`. Where it
    /// would reach past the centre the overhang is folded back onto the
    /// inner disk, so integrating the average over the plane returns exactly
    /// the light of the profile while the central cusp is spread over a disk
    /// of radius `core`.
    pub fn annulus_average(&self, r: f64, core: f64) -> f64 {
        if core.is_nan() || core <= 0.0 {
            return self.evaluate(r);
        }
        let area = core * core;
        let r_squared = r * r;
        let outer = (r_squared + area).sqrt();
        let light = if r_squared >= area {
            self.flux_between((r_squared - area).sqrt(), outer)
        } else {
            self.enclosed_flux(outer) + self.enclosed_flux((area - r_squared).sqrt())
        };
        light / (2.0 * PI * area)
    }
}

/// Validated exponential vertical profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalProfile {
    scale_height: f64,
}

impl VerticalProfile {
    pub fn new(h_z: f64) -> Result<Self, DomainError> {
        Ok(Self {
            scale_height: require_positive("scale_height", h_z)?,
        })
    }

    pub fn scale_height(&self) -> f64 {
        self.scale_height
    }

    pub fn evaluate(&self, z: f64) -> f64 {
        (-z.abs() / self.scale_height).exp()
    }

    /// Exact mean over `[z - half_span, z + half_span]`.
    ///
    /// Line-of-sight cells that are thick compared to the disk would otherwise
    /// either miss the midplane or sample its cusp; the cell mean integrates
    /// to the right column density regardless of how the cell straddles it.
    pub fn cell_average(&self, z: f64, half_span: f64) -> f64 {
        let h = self.scale_height;
        if half_span <= 1e-9 * h {
            return self.evaluate(z);
        }
        let lo = z - half_span;
        let hi = z + half_span;
        let integral = if lo >= 0.0 {
            -h * (-lo / h).exp() * (-(hi - lo) / h).exp_m1()
        } else if hi <= 0.0 {
            -h * (hi / h).exp() * (-(hi - lo) / h).exp_m1()
        } else {
            -h * (lo / h).exp_m1() - h * (-hi / h).exp_m1()
        };
        (integral / (2.0 * half_span)).max(0.0)
    }
}

/// Validated power-law rotation curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationCurve {
    velocity_scale: f64,
    reference_radius: f64,
}

impl RotationCurve {
    pub fn new(v_0: f64, r_0: f64) -> Result<Self, DomainError> {
        Ok(Self {
            velocity_scale: require_positive("velocity_scale", v_0)?,
            reference_radius: require_positive("velocity_reference_radius", r_0)?,
        })
    }

    pub fn velocity_scale(&self) -> f64 {
        self.velocity_scale
    }

    pub fn reference_radius(&self) -> f64 {
        self.reference_radius
    }

    /// Circular speed at radius `r >= 0`.
    pub fn evaluate(&self, r: f64) -> f64 {
        if r <= 0.0 {
            return 0.0;
        }
        self.velocity_scale
            * ROTATION_CURVE_AMPLITUDE
            * (r / self.reference_radius).powf(ROTATION_CURVE_SLOPE)
    }
}
