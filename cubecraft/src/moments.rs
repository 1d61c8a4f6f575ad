//! Moment maps and spectra of generated cubes.

use ndarray::{Array1, Array2, ArrayView3, Axis, Zip};

use crate::error::ShapeError;

/// Integrated intensity map: channel sum times channel width.
pub fn moment0(cube: &ArrayView3<f64>, channel_width: f64) -> Array2<f64> {
    cube.sum_axis(Axis(0)) * channel_width
}

/// Intensity-weighted mean velocity map.
///
/// Pixels without positive flux are NaN.
///
/// # Arguments
/// * `cube` - Cube of shape `(n_v, n_y, n_x)`
/// * `velocities` - Channel centre velocities, length `n_v`
pub fn moment1(cube: &ArrayView3<f64>, velocities: &[f64]) -> Result<Array2<f64>, ShapeError> {
    let n_channels = cube.len_of(Axis(0));
    if velocities.len() != n_channels {
        return Err(ShapeError::Mismatch {
            what: "channel velocities",
            expected: vec![n_channels],
            actual: vec![velocities.len()],
        });
    }
    let total = cube.sum_axis(Axis(0));
    let mut weighted = Array2::<f64>::zeros(total.raw_dim());
    for (plane, velocity) in cube.axis_iter(Axis(0)).zip(velocities) {
        weighted.scaled_add(*velocity, &plane);
    }
    Ok(Zip::from(&weighted)
        .and(&total)
        .map_collect(|w, t| if *t > 0.0 { w / t } else { f64::NAN }))
}

/// Spectrum summed over the whole field.
pub fn integrated_spectrum(cube: &ArrayView3<f64>) -> Array1<f64> {
    cube.sum_axis(Axis(2)).sum_axis(Axis(1))
}
