//! End-to-end analysis pipeline for spectrometric curve datasets.
//!
//! Chains GCV-selected smoothing, functional PCA, depth-based ordering
//! with outlier flagging, and one scalar-on-function regression per named
//! response. Any stage failure aborts the run with its typed error;
//! partial results are never returned.

use crate::basis::Basis;
use crate::depth::{depth, DepthMethod, DepthResult};
use crate::error::{FdaError, Result};
use crate::fdata::Fd;
use crate::fpca::{fpca, PcaResult};
use crate::grid::Grid;
use crate::matrix::CurveMatrix;
use crate::regression::{fregre_basis, RegressionFit};
use crate::smoothing::{select_lambda, LambdaGrid, LambdaSelection};
use std::sync::Arc;

/// Basis family and size, instantiated over the dataset's grid range.
#[derive(Debug, Clone, PartialEq)]
pub enum BasisSpec {
    BSpline { nbasis: usize, order: usize },
    Fourier { nbasis: usize },
}

impl BasisSpec {
    fn build(&self, lo: f64, hi: f64) -> Result<Basis> {
        match *self {
            BasisSpec::BSpline { nbasis, order } => Basis::bspline(lo, hi, nbasis, order),
            BasisSpec::Fourier { nbasis } => Basis::fourier(lo, hi, nbasis),
        }
    }
}

/// Configuration for one analysis run; explicit, no global state.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub basis: BasisSpec,
    /// Derivative order of the roughness penalty.
    pub penalty_order: usize,
    /// Lambda candidates for the GCV search.
    pub lambda_grid: LambdaGrid,
    /// Number of principal components to retain.
    pub n_harmonics: usize,
    /// Depth method used for ordering and outlier flagging.
    pub depth_method: DepthMethod,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            basis: BasisSpec::BSpline {
                nbasis: 20,
                order: 4,
            },
            penalty_order: 2,
            lambda_grid: LambdaGrid::default(),
            n_harmonics: 3,
            depth_method: DepthMethod::ModifiedBand,
        }
    }
}

/// A named scalar response aligned with the curves (e.g. fat content).
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarResponse {
    pub name: String,
    pub values: Vec<f64>,
}

impl ScalarResponse {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Input boundary of the pipeline: a grid, an N x M sample matrix, and
/// optional scalar responses.
#[derive(Debug, Clone)]
pub struct SpectralDataset {
    pub grid: Grid,
    pub absorbance: CurveMatrix,
    pub responses: Vec<ScalarResponse>,
}

impl SpectralDataset {
    /// Validate alignment between grid, curves, and responses.
    pub fn new(
        grid: Grid,
        absorbance: CurveMatrix,
        responses: Vec<ScalarResponse>,
    ) -> Result<Self> {
        if absorbance.ncols() != grid.len() {
            return Err(FdaError::dim(
                "absorbance columns vs grid length",
                grid.len(),
                absorbance.ncols(),
            ));
        }
        let n = absorbance.nrows();
        for r in &responses {
            if r.values.len() != n {
                return Err(FdaError::dim(
                    format!("response '{}' length", r.name),
                    n,
                    r.values.len(),
                ));
            }
        }
        Ok(Self {
            grid,
            absorbance,
            responses,
        })
    }

    pub fn n_curves(&self) -> usize {
        self.absorbance.nrows()
    }
}

/// Everything one analysis run produces.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    /// GCV profile and the winning smoothing fit.
    pub selection: LambdaSelection,
    /// The smoothed functional object.
    pub fd: Fd,
    pub pca: PcaResult,
    pub depth: DepthResult,
    /// IQR-rule outlier flags aligned with the curves.
    pub outliers: Vec<bool>,
    /// One regression fit per named response, in input order.
    pub regressions: Vec<(String, RegressionFit)>,
}

/// Run the full pipeline on a dataset.
pub fn run_analysis(dataset: &SpectralDataset, config: &AnalysisConfig) -> Result<AnalysisReport> {
    let (lo, hi) = dataset.grid.range();
    let basis = Arc::new(config.basis.build(lo, hi)?);

    let selection = select_lambda(
        &dataset.absorbance,
        &dataset.grid,
        &basis,
        config.penalty_order,
        &config.lambda_grid,
    )?;
    log::debug!(
        "selected lambda {:.3e} (edf {:.2}) from {} candidates",
        selection.lambda(),
        selection.fit.edf,
        selection.lambdas.len()
    );

    let fd = selection.fit.to_fd()?;
    let pca = fpca(&fd, config.n_harmonics)?;
    let depth_result = depth(&selection.fit.fitted, config.depth_method)?;
    let outliers = depth_result.outliers();
    log::debug!(
        "median curve {} of {}, {} outlier(s) flagged",
        depth_result.median,
        dataset.n_curves(),
        outliers.iter().filter(|&&f| f).count()
    );

    let mut regressions = Vec::with_capacity(dataset.responses.len());
    for response in &dataset.responses {
        let fit = fregre_basis(&fd, &response.values)?;
        regressions.push((response.name.clone(), fit));
    }

    Ok(AnalysisReport {
        selection,
        fd,
        pca,
        depth: depth_result,
        outliers,
        regressions,
    })
}
