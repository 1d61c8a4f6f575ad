//! Shared, read-only grids and instrument responses.
//!
//! Every cube of a batch uses the same grid and beam, and building the FFT
//! plan for the beam is the most expensive setup step. The cache hands out
//! `Arc`s so concurrent cube generations share one copy.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::debug;
use shared::CubeShape;

use crate::config::{BeamInfo, GeneratorConfig};
use crate::error::{CubeError, ShapeError};
use crate::grid::{Grid, GridBuilder};
use crate::instrument::InstrumentResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct GridKey {
    shape: CubeShape,
    spatial_oversample: usize,
    spectral_oversample: usize,
    los_samples: Option<usize>,
    velocity_range: u64,
    pixel_scale: u64,
}

impl GridKey {
    fn from_config(config: &GeneratorConfig) -> Self {
        Self {
            shape: config.shape(),
            spatial_oversample: config.spatial_oversample,
            spectral_oversample: config.spectral_oversample,
            los_samples: config.los_samples,
            velocity_range: config.velocity_range.to_bits(),
            pixel_scale: config.pixel_scale.to_bits(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ResponseKey {
    grid: GridKey,
    beam: [u64; 3],
}

impl ResponseKey {
    fn new(grid: GridKey, beam: &BeamInfo) -> Self {
        Self {
            grid,
            beam: [beam.bmin.to_bits(), beam.bmaj.to_bits(), beam.bpa.to_bits()],
        }
    }
}

/// Cache of grids and instrument responses keyed by shape, sampling and beam.
#[derive(Debug, Default)]
pub struct ResponseCache {
    grids: RwLock<HashMap<GridKey, Arc<Grid>>>,
    responses: RwLock<HashMap<ResponseKey, Arc<InstrumentResponse>>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grid for the configuration's shape and sampling, built on first use.
    pub fn grid(&self, config: &GeneratorConfig) -> Result<Arc<Grid>, ShapeError> {
        let key = GridKey::from_config(config);
        {
            let grids = self.grids.read().unwrap_or_else(|e| e.into_inner());
            if let Some(grid) = grids.get(&key) {
                return Ok(Arc::clone(grid));
            }
        }
        let grid = Arc::new(GridBuilder::from_config(config).build()?);
        let mut grids = self.grids.write().unwrap_or_else(|e| e.into_inner());
        Ok(Arc::clone(grids.entry(key).or_insert(grid)))
    }

    /// Instrument response for the configuration's grid and beam, built on first use.
    pub fn response(
        &self,
        config: &GeneratorConfig,
    ) -> Result<Arc<InstrumentResponse>, CubeError> {
        let key = ResponseKey::new(GridKey::from_config(config), &config.beam);
        {
            let responses = self.responses.read().unwrap_or_else(|e| e.into_inner());
            if let Some(response) = responses.get(&key) {
                return Ok(Arc::clone(response));
            }
        }
        let grid = self.grid(config)?;
        debug!("Building instrument response for {} grid", grid.shape());
        let response = Arc::new(InstrumentResponse::new(&config.beam, &grid)?);
        let mut responses = self.responses.write().unwrap_or_else(|e| e.into_inner());
        Ok(Arc::clone(responses.entry(key).or_insert(response)))
    }

    pub fn grid_count(&self) -> usize {
        self.grids.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn response_count(&self) -> usize {
        self.responses
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn clear(&self) {
        self.grids.write().unwrap_or_else(|e| e.into_inner()).clear();
        self.responses
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}
