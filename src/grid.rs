//! Evaluation grids and quadrature weights.

use crate::error::{FdaError, Result};

/// An ordered sequence of evaluation points (e.g. wavelengths), shared by
/// every curve in a dataset.
///
/// Points must be strictly increasing; the grid is immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    points: Vec<f64>,
}

impl Grid {
    /// Build a grid from strictly increasing points.
    pub fn new(points: Vec<f64>) -> Result<Self> {
        if points.len() < 2 {
            return Err(FdaError::Config(format!(
                "grid needs at least 2 points, got {}",
                points.len()
            )));
        }
        for w in points.windows(2) {
            if !(w[1] > w[0]) {
                return Err(FdaError::Config(format!(
                    "grid points must be strictly increasing, found {} followed by {}",
                    w[0], w[1]
                )));
            }
        }
        Ok(Self { points })
    }

    /// Uniform grid of `m` points over `[lo, hi]`.
    pub fn uniform(lo: f64, hi: f64, m: usize) -> Result<Self> {
        if !(hi > lo) {
            return Err(FdaError::Config(format!(
                "grid range must satisfy lo < hi, got [{}, {}]",
                lo, hi
            )));
        }
        if m < 2 {
            return Err(FdaError::Config(format!(
                "grid needs at least 2 points, got {}",
                m
            )));
        }
        let step = (hi - lo) / (m - 1) as f64;
        let points = (0..m).map(|i| lo + i as f64 * step).collect();
        Ok(Self { points })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        false // constructor enforces >= 2 points
    }

    #[inline]
    pub fn points(&self) -> &[f64] {
        &self.points
    }

    /// Grid range as `(lo, hi)`.
    #[inline]
    pub fn range(&self) -> (f64, f64) {
        (self.points[0], self.points[self.points.len() - 1])
    }

    /// Composite trapezoidal integration weights for this grid.
    ///
    /// Handles non-uniform spacing; the weights sum to `hi - lo`.
    pub fn quad_weights(&self) -> Vec<f64> {
        quad_weights(&self.points)
    }
}

/// Composite trapezoidal integration weights for arbitrary ordered points.
pub fn quad_weights(argvals: &[f64]) -> Vec<f64> {
    let n = argvals.len();
    if n < 2 {
        return vec![1.0; n];
    }

    let mut weights = vec![0.0; n];
    for i in 0..n {
        if i == 0 {
            weights[i] = (argvals[1] - argvals[0]) / 2.0;
        } else if i == n - 1 {
            weights[i] = (argvals[n - 1] - argvals[n - 2]) / 2.0;
        } else {
            weights[i] = (argvals[i + 1] - argvals[i - 1]) / 2.0;
        }
    }
    weights
}

/// Integrate function values sampled on `argvals` by the trapezoidal rule.
pub fn integrate(values: &[f64], argvals: &[f64]) -> f64 {
    if values.len() != argvals.len() || values.is_empty() {
        return 0.0;
    }
    let weights = quad_weights(argvals);
    values
        .iter()
        .zip(weights.iter())
        .map(|(&v, &w)| v * w)
        .sum()
}

/// Weighted L2 inner product of two curves sampled on `argvals`.
pub fn inner_product(curve1: &[f64], curve2: &[f64], argvals: &[f64]) -> f64 {
    if curve1.len() != curve2.len() || curve1.len() != argvals.len() || curve1.is_empty() {
        return 0.0;
    }
    let weights = quad_weights(argvals);
    curve1
        .iter()
        .zip(curve2.iter())
        .zip(weights.iter())
        .map(|((&a, &b), &w)| a * b * w)
        .sum()
}
