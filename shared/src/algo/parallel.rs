//! Parallel processing utilities for cube operations
//!
//! This module provides functions for processing the planes of a 3D array
//! in parallel. Each plane is handled independently, so results are
//! deterministic regardless of the thread schedule.

use ndarray::{Array3, ArrayViewMut2, Axis};
use rayon::prelude::*;

/// Process every plane along axis 0 of a 3D array in parallel
///
/// The planes of a spectral cube are its channels, so this is the natural
/// unit of work for per-channel operations such as beam convolution. The
/// first error returned by `processor` stops the remaining planes and is
/// passed back to the caller.
///
/// # Arguments
/// * `array` - The 3D array to process, consumed and returned
/// * `processor` - Closure receiving the plane index and a mutable view of the plane
///
/// # Type Parameters
/// * `F` - Closure type that takes a plane index and a mutable plane view
/// * `E` - Error reported by the closure
///
/// # Returns
/// The processed array, or the error of a failing plane
pub fn try_process_planes_in_parallel<F, E>(
    mut array: Array3<f64>,
    processor: F,
) -> Result<Array3<f64>, E>
where
    F: Fn(usize, &mut ArrayViewMut2<f64>) -> Result<(), E> + Send + Sync,
    E: Send,
{
    array
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .try_for_each(|(plane_idx, mut plane)| processor(plane_idx, &mut plane))?;

    Ok(array)
}

#[cfg(test)]
mod tests {
    use super::*;

    type Never = std::convert::Infallible;

    #[test]
    fn test_planes_receive_their_index() {
        let cube = Array3::<f64>::zeros((5, 3, 4));
        let result = try_process_planes_in_parallel(cube, |idx, plane| {
            plane.fill(idx as f64);
            Ok::<(), Never>(())
        })
        .unwrap();

        for (idx, plane) in result.axis_iter(Axis(0)).enumerate() {
            assert!(plane.iter().all(|&v| v == idx as f64));
        }
    }

    fn square(_: usize, plane: &mut ArrayViewMut2<f64>) -> Result<(), Never> {
        plane.mapv_inplace(|v| v * v);
        Ok(())
    }

    #[test]
    fn test_deterministic_results() {
        let cube = Array3::from_shape_fn((8, 16, 16), |(v, y, x)| (v * y + x) as f64);

        let a = try_process_planes_in_parallel(cube.clone(), square).unwrap();
        let b = try_process_planes_in_parallel(cube, square).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_failing_plane_is_reported() {
        let cube = Array3::<f64>::zeros((6, 4, 4));
        let result = try_process_planes_in_parallel(cube, |idx, plane| {
            if idx == 3 {
                return Err(format!("plane {idx} failed"));
            }
            plane.fill(1.0);
            Ok(())
        });
        assert_eq!(result.unwrap_err(), "plane 3 failed");
    }
}
