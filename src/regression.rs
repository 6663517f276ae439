//! Scalar-on-function linear regression.
//!
//! Fits `y_i = intercept + ∫ X_i(t) β(t) dt + ε_i` where the functional
//! predictor X and the coefficient function β are both basis-expanded.
//! With C the predictor coefficients and J the matrix of inner products
//! between predictor and coefficient basis functions, the integral term
//! reduces to the ordinary design matrix `Z = C J`, so the fit is plain
//! least squares on `[1 | Z]`.

use crate::basis::Basis;
use crate::error::{FdaError, Result};
use crate::fdata::Fd;
use crate::grid::quad_weights;
use crate::matrix::CurveMatrix;
use crate::smoothing::solve_system;
use nalgebra::DMatrix;
use std::sync::Arc;

/// Result of a scalar-on-function regression.
#[derive(Debug, Clone)]
pub struct RegressionFit {
    /// The estimated coefficient function β as a rank-1 functional object.
    pub beta: Fd,
    /// Estimated intercept.
    pub intercept: f64,
    /// Fitted responses, length N.
    pub fitted_values: Vec<f64>,
    /// Residuals `y - fitted`, length N.
    pub residuals: Vec<f64>,
    /// Coefficient of determination.
    pub r_squared: f64,
    /// Residual standard error, `sqrt(RSS / (N - p))`; `NaN` when the fit
    /// is saturated (N <= p).
    pub residual_se: f64,
    /// Standard errors for the intercept followed by each β basis
    /// coefficient; `NaN` entries when the fit is saturated.
    pub std_errors: Vec<f64>,
}

/// Fit the functional linear model with β expanded in the predictor's own
/// basis.
pub fn fregre_basis(x: &Fd, y: &[f64]) -> Result<RegressionFit> {
    fregre_basis_with(x, y, x.basis())
}

/// Fit the functional linear model with β expanded in a separately
/// specified basis.
///
/// The β basis must share the predictor basis range; otherwise the inner
/// products `∫ X β` are not defined and the call fails with a dimension
/// error.
pub fn fregre_basis_with(x: &Fd, y: &[f64], beta_basis: &Arc<Basis>) -> Result<RegressionFit> {
    let n = x.nobs();
    if y.len() != n {
        return Err(FdaError::dim("response length vs predictor curves", n, y.len()));
    }
    if n < 2 {
        return Err(FdaError::dim("observations for regression", 2, n));
    }
    if !x.basis().same_range(beta_basis.as_ref()) {
        let (xlo, xhi) = x.basis().range();
        let (blo, bhi) = beta_basis.range();
        return Err(FdaError::Dimension {
            message: format!(
                "incompatible bases: predictor range [{}, {}] vs beta range [{}, {}]",
                xlo, xhi, blo, bhi
            ),
            expected: x.nbasis(),
            got: beta_basis.nbasis(),
        });
    }

    let kb = beta_basis.nbasis();
    let j = cross_product_matrix(x.basis().as_ref(), beta_basis.as_ref())?;
    let z = x.coefficients().to_dmatrix() * &j; // N x Kb

    // Design matrix with an intercept column.
    let p = kb + 1;
    let mut design = DMatrix::zeros(n, p);
    for i in 0..n {
        design[(i, 0)] = 1.0;
        for c in 0..kb {
            design[(i, c + 1)] = z[(i, c)];
        }
    }

    let xtx = design.transpose() * &design;
    let y_vec = DMatrix::from_fn(n, 1, |i, _| y[i]);
    let xty = design.transpose() * &y_vec;
    let coefs = solve_system(&xtx, &xty)?;

    let fitted = &design * &coefs;
    let fitted_values: Vec<f64> = (0..n).map(|i| fitted[(i, 0)]).collect();
    let residuals: Vec<f64> = (0..n).map(|i| y[i] - fitted_values[i]).collect();

    let y_mean = y.iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = y.iter().map(|&yi| (yi - y_mean).powi(2)).sum();
    let ss_res: f64 = residuals.iter().map(|&r| r * r).sum();
    let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

    let df = n as isize - p as isize;
    let (residual_se, std_errors) = if df > 0 {
        let sigma_sq = ss_res / df as f64;
        let xtx_inv = solve_system(&xtx, &DMatrix::identity(p, p))?;
        let se: Vec<f64> = (0..p)
            .map(|c| (sigma_sq * xtx_inv[(c, c)].max(0.0)).sqrt())
            .collect();
        (sigma_sq.sqrt(), se)
    } else {
        (f64::NAN, vec![f64::NAN; p])
    };

    let mut beta_coefs = CurveMatrix::zeros(1, kb);
    for c in 0..kb {
        beta_coefs[(0, c)] = coefs[(c + 1, 0)];
    }

    Ok(RegressionFit {
        beta: Fd::new(beta_coefs, Arc::clone(beta_basis))?,
        intercept: coefs[(0, 0)],
        fitted_values,
        residuals,
        r_squared,
        residual_se,
        std_errors,
    })
}

/// Inner products `J[k][l] = ∫ φ_k(t) ψ_l(t) dt` between two bases over
/// their shared range, by composite trapezoidal quadrature.
fn cross_product_matrix(a: &Basis, b: &Basis) -> Result<DMatrix<f64>> {
    if a == b {
        return Ok(a.mass_matrix());
    }
    let (lo, hi) = a.range();
    let nq = 10 * a.nbasis().max(b.nbasis()) + 1;
    let step = (hi - lo) / (nq - 1) as f64;
    let points: Vec<f64> = (0..nq).map(|i| lo + i as f64 * step).collect();
    let weights = quad_weights(&points);

    let ea = a.eval_matrix(&points)?;
    let eb = b.eval_matrix(&points)?;
    let mut j = DMatrix::zeros(a.nbasis(), b.nbasis());
    for r in 0..a.nbasis() {
        for c in 0..b.nbasis() {
            let mut sum = 0.0;
            for (q, &w) in weights.iter().enumerate() {
                sum += w * ea[(q, r)] * eb[(q, c)];
            }
            j[(r, c)] = sum;
        }
    }
    Ok(j)
}
