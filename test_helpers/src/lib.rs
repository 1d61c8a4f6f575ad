//! Test helpers for the cube generator workspace
//!
//! This crate provides common fixtures and assertions for tests across the
//! workspace: synthetic cubes with known flux, flux bookkeeping, and the
//! location of the workspace root for test artifacts.

use ndarray::Array3;
use once_cell::sync::Lazy;
use std::env;
use std::path::{Path, PathBuf};

/// Error type for test helper operations
#[derive(thiserror::Error, Debug)]
pub enum TestHelperError {
    #[error("Failed to find project root: {0}")]
    ProjectRootNotFound(String),
}

/// Returns the path to the project root directory.
///
/// Searches upward from the current directory for a Cargo.toml that
/// declares a `[workspace]`.
pub fn find_project_root() -> Result<PathBuf, TestHelperError> {
    let mut current_dir = env::current_dir().map_err(|e| {
        TestHelperError::ProjectRootNotFound(format!("Failed to get current directory: {}", e))
    })?;

    loop {
        let cargo_toml = current_dir.join("Cargo.toml");
        if cargo_toml.exists() {
            let content = std::fs::read_to_string(&cargo_toml).map_err(|e| {
                TestHelperError::ProjectRootNotFound(format!("Failed to read Cargo.toml: {}", e))
            })?;

            if content.contains("[workspace]") {
                return Ok(current_dir);
            }
        }

        if !current_dir.pop() {
            break;
        }
    }

    Err(TestHelperError::ProjectRootNotFound(
        "Workspace root not found".to_string(),
    ))
}

/// Lazily initialized project root path
static PROJECT_ROOT: Lazy<PathBuf> =
    Lazy::new(|| find_project_root().expect("Failed to find project root directory"));

/// Returns the directory for test artifacts (cubes, metadata), creating it if needed.
pub fn get_output_dir() -> PathBuf {
    let output_dir = PROJECT_ROOT.join("test_output");

    if !output_dir.exists() {
        std::fs::create_dir_all(&output_dir).expect("Failed to create output directory");
    }

    output_dir
}

/// Returns a path within the output directory.
pub fn output_path<P: AsRef<Path>>(path: P) -> PathBuf {
    get_output_dir().join(path)
}

/// Build a cube containing one Gaussian blob per channel with a known total flux.
///
/// # Arguments
/// * `shape` - Cube shape `(n_velocity, n_y, n_x)`
/// * `center` - Blob centre `(y, x)` in pixels
/// * `sigma` - Blob standard deviation in pixels
/// * `flux` - Total flux of each channel's blob
pub fn gaussian_blob_cube(
    shape: (usize, usize, usize),
    center: (f64, f64),
    sigma: f64,
    flux: f64,
) -> Array3<f64> {
    let mut cube = Array3::from_shape_fn(shape, |(_, y, x)| {
        let dy = y as f64 - center.0;
        let dx = x as f64 - center.1;
        (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp()
    });

    for mut plane in cube.outer_iter_mut() {
        let total = plane.sum();
        if total > 0.0 {
            plane.mapv_inplace(|v| v * flux / total);
        }
    }

    cube
}

/// Relative difference `|a - b| / max(|a|, |b|)`, zero when both are zero.
pub fn relative_difference(a: f64, b: f64) -> f64 {
    let scale = a.abs().max(b.abs());
    if scale == 0.0 {
        0.0
    } else {
        (a - b).abs() / scale
    }
}

/// Assert that two totals agree to within a relative tolerance.
pub fn assert_flux_conserved(before: f64, after: f64, rel_tol: f64) {
    let diff = relative_difference(before, after);
    assert!(
        diff < rel_tol,
        "Flux not conserved: before={before}, after={after}, relative difference {diff:.3e} >= {rel_tol:.1e}"
    );
}
