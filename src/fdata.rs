//! Functional objects: basis coefficients paired with their basis.

use crate::basis::Basis;
use crate::error::{FdaError, Result};
use crate::grid::Grid;
use crate::matrix::CurveMatrix;
use std::sync::Arc;

/// A collection of functional observations expressed in a shared basis.
///
/// Row `i` of the coefficient matrix holds the K basis coefficients of
/// curve `i`. The basis is shared read-only; the coefficient matrix is
/// owned. The column count always equals `basis.nbasis()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Fd {
    coefs: CurveMatrix,
    basis: Arc<Basis>,
}

impl Fd {
    /// Pair a coefficient matrix with its basis.
    pub fn new(coefs: CurveMatrix, basis: Arc<Basis>) -> Result<Self> {
        if coefs.ncols() != basis.nbasis() {
            return Err(FdaError::dim(
                "coefficient columns vs basis size",
                basis.nbasis(),
                coefs.ncols(),
            ));
        }
        Ok(Self { coefs, basis })
    }

    /// Number of functional observations.
    pub fn nobs(&self) -> usize {
        self.coefs.nrows()
    }

    /// Number of basis functions.
    pub fn nbasis(&self) -> usize {
        self.basis.nbasis()
    }

    pub fn basis(&self) -> &Arc<Basis> {
        &self.basis
    }

    pub fn coefficients(&self) -> &CurveMatrix {
        &self.coefs
    }

    /// Evaluate every curve at `points` (N x points.len()).
    pub fn eval(&self, points: &[f64]) -> Result<CurveMatrix> {
        self.eval_deriv(points, 0)
    }

    /// Evaluate the `deriv`-th derivative of every curve at `points`.
    pub fn eval_deriv(&self, points: &[f64], deriv: usize) -> Result<CurveMatrix> {
        let e = self.basis.deriv_matrix(points, deriv)?; // P x K
        let values = self.coefs.to_dmatrix() * e.transpose(); // N x P
        Ok(CurveMatrix::from_dmatrix(&values))
    }

    /// Evaluate every curve on a [`Grid`].
    pub fn eval_grid(&self, grid: &Grid) -> Result<CurveMatrix> {
        self.eval(grid.points())
    }

    /// The mean function as a rank-1 functional object.
    pub fn mean(&self) -> Fd {
        let means = self.coefs.column_means();
        let mut coefs = CurveMatrix::zeros(1, self.coefs.ncols());
        for (j, &m) in means.iter().enumerate() {
            coefs[(0, j)] = m;
        }
        Fd {
            coefs,
            basis: Arc::clone(&self.basis),
        }
    }

    /// Subtract the mean function from every curve.
    pub fn center(&self) -> Fd {
        Fd {
            coefs: self.coefs.center_rows(),
            basis: Arc::clone(&self.basis),
        }
    }

    /// Pointwise sum of two functional objects on the same basis.
    pub fn add(&self, other: &Fd) -> Result<Fd> {
        self.zip_with(other, |a, b| a + b)
    }

    /// Pointwise difference of two functional objects on the same basis.
    pub fn sub(&self, other: &Fd) -> Result<Fd> {
        self.zip_with(other, |a, b| a - b)
    }

    /// Multiply every curve by a scalar.
    pub fn scale(&self, factor: f64) -> Fd {
        let (n, k) = self.coefs.shape();
        let mut coefs = self.coefs.clone();
        for j in 0..k {
            for i in 0..n {
                coefs[(i, j)] *= factor;
            }
        }
        Fd {
            coefs,
            basis: Arc::clone(&self.basis),
        }
    }

    fn zip_with(&self, other: &Fd, op: impl Fn(f64, f64) -> f64) -> Result<Fd> {
        if self.basis.as_ref() != other.basis.as_ref() {
            return Err(FdaError::Config(format!(
                "functional arithmetic needs a shared basis, got {} (K={}) vs {} (K={})",
                self.basis.family(),
                self.basis.nbasis(),
                other.basis.family(),
                other.basis.nbasis()
            )));
        }
        if self.coefs.shape() != other.coefs.shape() {
            return Err(FdaError::dim(
                "observation count",
                self.nobs(),
                other.nobs(),
            ));
        }
        let (n, k) = self.coefs.shape();
        let mut coefs = CurveMatrix::zeros(n, k);
        for j in 0..k {
            for i in 0..n {
                coefs[(i, j)] = op(self.coefs[(i, j)], other.coefs[(i, j)]);
            }
        }
        Ok(Fd {
            coefs,
            basis: Arc::clone(&self.basis),
        })
    }
}
