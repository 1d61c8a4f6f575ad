//! Array algorithms used by the cube pipeline
//!
//! This module provides block binning, parallel plane processing and the
//! small statistical helpers needed for spectral line profiles.

pub mod binning;
pub mod parallel;
pub mod stats;

pub use binning::{block_sum_2d, block_sum_3d, BinningError};
pub use parallel::try_process_planes_in_parallel;
pub use stats::{gaussian_bin_weights, ln_gamma, normal_cdf, IncompleteGamma};
