//! Functional principal component analysis in basis coordinates.
//!
//! The covariance operator of a centered functional sample is expressed in
//! basis coordinates and turned into an ordinary symmetric eigenproblem
//! through the Cholesky factor of the basis inner-product (mass) matrix W:
//! with G = L' ((1/N) C'C) L and W = LL', the eigenvectors u of G map back
//! to harmonic coefficients b = L⁻ᵗ u, which are orthonormal under W.

use crate::error::{FdaError, Result};
use crate::fdata::Fd;
use crate::matrix::CurveMatrix;
use nalgebra::{Cholesky, DMatrix, DVector, SymmetricEigen};
use std::sync::Arc;

/// Result of a functional PCA.
#[derive(Debug, Clone)]
pub struct PcaResult {
    /// Harmonic functions: row `j` holds the basis coefficients of the
    /// j-th eigenfunction. W-orthonormal.
    pub harmonics: Fd,
    /// Eigenvalues of the covariance operator, descending.
    pub eigenvalues: Vec<f64>,
    /// Proportion of variance explained per retained component,
    /// non-increasing, summing to at most 1.
    pub prop_var: Vec<f64>,
    /// Per-curve scores: projection of each centered curve onto each
    /// harmonic under the W inner product (N x ncomp).
    pub scores: CurveMatrix,
}

/// Compute the leading `ncomp` functional principal components.
///
/// `ncomp` must not exceed `min(N - 1, K)`: beyond that the centered
/// sample carries no additional rank.
pub fn fpca(fd: &Fd, ncomp: usize) -> Result<PcaResult> {
    let n = fd.nobs();
    let k = fd.nbasis();
    if n < 2 {
        return Err(FdaError::dim("observations for fPCA", 2, n));
    }
    if ncomp < 1 {
        return Err(FdaError::Config(
            "fPCA needs at least one component".to_string(),
        ));
    }
    let max_rank = (n - 1).min(k);
    if ncomp > max_rank {
        return Err(FdaError::Numerical(format!(
            "requested {} components but the centered sample supports at most \
             min(N - 1, K) = {}",
            ncomp, max_rank
        )));
    }

    let w = fd.basis().mass_matrix();
    let chol_w = Cholesky::new(w.clone()).ok_or_else(|| {
        FdaError::Numerical(format!(
            "mass matrix of the {} basis (K = {}) is not positive definite",
            fd.basis().family(),
            k
        ))
    })?;
    let l = chol_w.l();
    let l_t = l.transpose();

    let centered = fd.center().coefficients().to_dmatrix(); // N x K
    let cov = centered.transpose() * &centered / n as f64; // K x K
    let mut g = &l_t * cov * &l;
    // Exact symmetry before the eigensolver.
    for i in 0..k {
        for j in (i + 1)..k {
            let avg = 0.5 * (g[(i, j)] + g[(j, i)]);
            g[(i, j)] = avg;
            g[(j, i)] = avg;
        }
    }

    let eig = SymmetricEigen::new(g);

    // Descending eigenvalue order; stable sort keeps the original index
    // for ties, so the ordering is deterministic.
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| {
        eig.eigenvalues[b]
            .partial_cmp(&eig.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let total_var: f64 = eig.eigenvalues.iter().map(|&v| v.max(0.0)).sum();

    let mut harmonic_coefs = CurveMatrix::zeros(ncomp, k);
    let mut eigenvalues = Vec::with_capacity(ncomp);
    let mut prop_var = Vec::with_capacity(ncomp);
    let mut b_mat = DMatrix::zeros(k, ncomp);

    for (out, &idx) in order.iter().take(ncomp).enumerate() {
        let u: DVector<f64> = eig.eigenvectors.column(idx).clone_owned();
        let mut b = l_t.solve_upper_triangular(&u).ok_or_else(|| {
            FdaError::Numerical(
                "back-substitution through the mass-matrix factor failed".to_string(),
            )
        })?;

        // b'Wb = u'u = 1 up to rounding; renormalize exactly.
        let norm_sq = (b.transpose() * &w * &b)[(0, 0)];
        if !(norm_sq > 0.0) {
            return Err(FdaError::Numerical(format!(
                "harmonic {} collapsed to zero norm",
                out
            )));
        }
        b /= norm_sq.sqrt();

        // Deterministic sign: largest-magnitude coefficient positive.
        let mut max_abs = 0.0;
        let mut max_idx = 0;
        for (i, &v) in b.iter().enumerate() {
            if v.abs() > max_abs {
                max_abs = v.abs();
                max_idx = i;
            }
        }
        if b[max_idx] < 0.0 {
            b = -b;
        }

        for j in 0..k {
            harmonic_coefs[(out, j)] = b[j];
            b_mat[(j, out)] = b[j];
        }
        let value = eig.eigenvalues[idx];
        eigenvalues.push(value);
        prop_var.push(if total_var > 0.0 {
            value.max(0.0) / total_var
        } else {
            0.0
        });
    }

    let scores = &centered * &w * &b_mat; // N x ncomp

    Ok(PcaResult {
        harmonics: Fd::new(harmonic_coefs, Arc::clone(fd.basis()))?,
        eigenvalues,
        prop_var,
        scores: CurveMatrix::from_dmatrix(&scores),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::Basis;
    use crate::matrix::CurveMatrix;

    /// Curves whose coefficients vary along two known directions.
    fn two_factor_fd(n: usize) -> Fd {
        let basis = Arc::new(Basis::fourier(0.0, 1.0, 5).unwrap());
        let rows: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                let a = (i as f64 / n as f64 - 0.5) * 4.0;
                let b = ((i * 7 % n) as f64 / n as f64 - 0.5) * 0.6;
                vec![1.0, a, b, 0.0, 0.0]
            })
            .collect();
        Fd::new(CurveMatrix::from_rows(&rows).unwrap(), basis).unwrap()
    }

    #[test]
    fn test_fpca_shapes() {
        let fd = two_factor_fd(20);
        let pca = fpca(&fd, 3).unwrap();
        assert_eq!(pca.harmonics.nobs(), 3);
        assert_eq!(pca.harmonics.nbasis(), 5);
        assert_eq!(pca.eigenvalues.len(), 3);
        assert_eq!(pca.prop_var.len(), 3);
        assert_eq!(pca.scores.shape(), (20, 3));
    }

    #[test]
    fn test_harmonics_w_orthonormal() {
        let fd = two_factor_fd(25);
        let pca = fpca(&fd, 3).unwrap();
        let w = fd.basis().mass_matrix();
        let h = pca.harmonics.coefficients().to_dmatrix(); // 3 x 5
        let gram = &h * &w * h.transpose();
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!(
                    (gram[(i, j)] - expected).abs() < 1e-8,
                    "harmonic gram ({}, {}) = {}",
                    i,
                    j,
                    gram[(i, j)]
                );
            }
        }
    }

    #[test]
    fn test_prop_var_non_increasing_and_bounded() {
        let fd = two_factor_fd(30);
        let pca = fpca(&fd, 4).unwrap();
        let sum: f64 = pca.prop_var.iter().sum();
        assert!(sum <= 1.0 + 1e-10, "prop_var sums to {}", sum);
        for w in pca.prop_var.windows(2) {
            assert!(w[0] >= w[1] - 1e-12, "prop_var must be non-increasing");
        }
    }

    #[test]
    fn test_dominant_direction_found_first() {
        // Variation along the sin(2πt) coefficient dwarfs the rest, so the
        // first harmonic concentrates there and explains most variance.
        let fd = two_factor_fd(40);
        let pca = fpca(&fd, 2).unwrap();
        assert!(pca.prop_var[0] > 0.9, "prop_var[0] = {}", pca.prop_var[0]);
        let h0 = pca.harmonics.coefficients().row(0);
        let max_idx = h0
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().partial_cmp(&b.1.abs()).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(max_idx, 1, "first harmonic should load on the sin term");
    }

    #[test]
    fn test_score_variance_matches_eigenvalue() {
        let fd = two_factor_fd(50);
        let pca = fpca(&fd, 2).unwrap();
        let n = fd.nobs();
        for comp in 0..2 {
            let var: f64 =
                (0..n).map(|i| pca.scores[(i, comp)].powi(2)).sum::<f64>() / n as f64;
            assert!(
                (var - pca.eigenvalues[comp]).abs() < 1e-8 * pca.eigenvalues[comp].max(1.0),
                "score variance {} vs eigenvalue {}",
                var,
                pca.eigenvalues[comp]
            );
        }
    }

    #[test]
    fn test_full_rank_reconstruction() {
        let fd = two_factor_fd(12);
        let k = fd.nbasis();
        let pca = fpca(&fd, k).unwrap();
        // Centered coefficients expand exactly in the W-orthonormal
        // harmonic basis when every component is retained.
        let centered = fd.center().coefficients().to_dmatrix();
        let h = pca.harmonics.coefficients().to_dmatrix(); // k x k
        let scores = pca.scores.to_dmatrix(); // n x k
        let reconstructed = &scores * &h;
        for i in 0..fd.nobs() {
            for j in 0..k {
                assert!(
                    (reconstructed[(i, j)] - centered[(i, j)]).abs() < 1e-8,
                    "reconstruction mismatch at ({}, {})",
                    i,
                    j
                );
            }
        }
    }

    #[test]
    fn test_rank_limit_enforced() {
        let fd = two_factor_fd(4);
        // min(N - 1, K) = 3
        assert!(fpca(&fd, 3).is_ok());
        assert!(matches!(fpca(&fd, 4), Err(FdaError::Numerical(_))));
    }

    #[test]
    fn test_too_few_observations() {
        let basis = Arc::new(Basis::fourier(0.0, 1.0, 5).unwrap());
        let fd = Fd::new(CurveMatrix::zeros(1, 5), basis).unwrap();
        assert!(matches!(fpca(&fd, 1), Err(FdaError::Dimension { .. })));
    }

    #[test]
    fn test_deterministic_repeat() {
        let fd = two_factor_fd(20);
        let a = fpca(&fd, 3).unwrap();
        let b = fpca(&fd, 3).unwrap();
        assert_eq!(a.harmonics.coefficients(), b.harmonics.coefficients());
        assert_eq!(a.scores, b.scores);
    }
}
