//! # fdaspec
//!
//! Functional Data Analysis for spectrometric curves in pure Rust.
//!
//! The crate relates absorbance spectra to scalar chemical composition
//! (fat, water, protein) through four numerical stages:
//! - Penalized basis smoothing (B-spline or Fourier) with automatic
//!   smoothing-parameter selection by generalized cross-validation
//! - Functional principal component analysis on the smoothed objects
//! - Band-depth ranking (BD2 / MBD) for robust ordering, functional
//!   medians, and IQR-based outlier flagging
//! - Scalar-on-function linear regression with a basis-expanded
//!   coefficient function
//!
//! Dataset loading, plotting, and reporting are consumers of this crate's
//! outputs and live elsewhere; everything here is a pure, synchronous
//! computation over in-memory matrices.
//!
//! ## Data layout
//!
//! Curve collections are column-major matrices stored in flat vectors
//! ([`matrix::CurveMatrix`]): for n curves sampled at m points,
//! `data[i + j * n]` is curve `i` at evaluation point `j`. Curves are
//! always rows in the public contract.

#![allow(clippy::needless_range_loop)]
#![allow(clippy::too_many_arguments)]

pub mod analysis;
pub mod basis;
pub mod depth;
pub mod error;
pub mod fdata;
pub mod fpca;
pub mod grid;
pub mod matrix;
pub mod regression;
pub mod simulation;
pub mod smoothing;

// Re-export the types a typical analysis touches.
pub use analysis::{
    run_analysis, AnalysisConfig, AnalysisReport, BasisSpec, ScalarResponse, SpectralDataset,
};
pub use basis::Basis;
pub use depth::{band_depth, depth, modified_band_depth, DepthMethod, DepthResult};
pub use error::{FdaError, Result};
pub use fdata::Fd;
pub use fpca::{fpca, PcaResult};
pub use grid::Grid;
pub use matrix::CurveMatrix;
pub use regression::{fregre_basis, fregre_basis_with, RegressionFit};
pub use smoothing::{select_lambda, smooth_basis, LambdaGrid, LambdaSelection, SmoothingFit};
