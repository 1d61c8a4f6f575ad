//! Saving generated cubes to disk.
//!
//! Each cube is written as a `.npy` array with a sibling `.json` file holding
//! its metadata.

pub mod npy;

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::assembler::GeneratedCube;
use crate::metadata::Metadata;

pub use npy::{read_npy, write_npy};

/// Errors from writing or reading cube files
#[derive(Error, Debug)]
pub enum NpyError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid npy data: {0}")]
    Format(String),
}

/// Writes cubes and metadata into one directory.
#[derive(Debug, Clone)]
pub struct CubeWriter {
    output_dir: PathBuf,
    fname: Option<String>,
}

impl CubeWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            fname: None,
        }
    }

    /// Use a fixed file stem instead of one derived from the cube shape.
    pub fn with_fname(mut self, fname: Option<String>) -> Self {
        self.fname = fname;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `{fname}_{index:04}` or `cube_{nv}x{ny}x{nx}_{index:04}`.
    pub fn file_stem(&self, metadata: &Metadata) -> String {
        match &self.fname {
            Some(fname) => format!("{}_{:04}", fname, metadata.cube_index),
            None => format!("cube_{}_{:04}", metadata.shape, metadata.cube_index),
        }
    }

    /// Write `generated` and return the path of the `.npy` file.
    pub fn save(&self, generated: &GeneratedCube) -> Result<PathBuf, NpyError> {
        fs::create_dir_all(&self.output_dir)?;
        let stem = self.file_stem(&generated.metadata);
        let cube_path = self.output_dir.join(format!("{}.npy", stem));
        let metadata_path = self.output_dir.join(format!("{}.json", stem));

        write_npy(&cube_path, &generated.cube)?;
        fs::write(&metadata_path, generated.metadata.to_json()?)?;
        debug!("Saved {} and {}", cube_path.display(), metadata_path.display());
        Ok(cube_path)
    }

    /// Read back a cube and its metadata saved under `stem`.
    pub fn load(&self, stem: &str) -> Result<GeneratedCube, NpyError> {
        let cube = read_npy(self.output_dir.join(format!("{}.npy", stem)))?;
        let json = fs::read_to_string(self.output_dir.join(format!("{}.json", stem)))?;
        let metadata = Metadata::from_json(&json)?;
        Ok(GeneratedCube { cube, metadata })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BeamInfo, GeneratorConfig};
    use crate::sampler::GalaxyParameters;
    use tempfile::tempdir;

    fn cube() -> GeneratedCube {
        let config = GeneratorConfig::default()
            .with_grid_size(12)
            .with_spectral_slices(4)
            .with_spatial_oversample(1)
            .with_spectral_oversample(1)
            .with_beam(BeamInfo::circular(1.5))
            .with_seed(Some(1))
            .with_verbose(false);
        let galaxy = GalaxyParameters::disk(1.0, 2.0, 1.0).unwrap();
        crate::assembler::generate_from_parameters(&config, &[galaxy]).unwrap()
    }

    #[test]
    fn test_file_names() {
        let generated = cube();
        let writer = CubeWriter::new("out");
        assert_eq!(writer.file_stem(&generated.metadata), "cube_4x12x12_0000");
        let named = writer.with_fname(Some("disk".to_string()));
        assert_eq!(named.file_stem(&generated.metadata), "disk_0000");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let writer = CubeWriter::new(dir.path().join("nested"));
        let generated = cube();
        let path = writer.save(&generated).unwrap();
        assert!(path.exists());
        assert!(path.with_extension("json").exists());

        let loaded = writer.load("cube_4x12x12_0000").unwrap();
        assert_eq!(loaded.cube, generated.cube);
        assert_eq!(loaded.metadata.shape, generated.metadata.shape);
        assert_eq!(loaded.metadata.seed, 1);
    }
}
