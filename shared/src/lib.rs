//! Shared array utilities for the cube generator.
//!
//! This crate contains the domain-agnostic pieces of the pipeline: cube shape
//! bookkeeping, block binning, per-plane parallel mapping, Gaussian bin
//! weights and 2D convolution (direct and FFT based). Nothing in here knows
//! about galaxies.

pub mod algo;
pub mod cube_shape;
pub mod image_proc;

pub use cube_shape::CubeShape;
