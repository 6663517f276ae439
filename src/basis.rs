//! Basis systems for representing functional data.
//!
//! Two families are provided: B-splines of arbitrary order with evenly
//! derived or supplied knots, and Fourier bases with an explicit period.
//! A basis evaluates its functions (and their derivatives) at arbitrary
//! points inside its range and produces the roughness and mass matrices
//! used by the smoother, fPCA, and functional regression.

use crate::error::{FdaError, Result};
use crate::grid::quad_weights;
use nalgebra::DMatrix;
use std::f64::consts::PI;

/// Derivative orders accepted by evaluation and penalty construction.
const SUPPORTED_DERIVS: [usize; 4] = [0, 1, 2, 4];

/// Quadrature resolution for penalty/mass matrices, per basis function.
const QUAD_POINTS_PER_BASIS: usize = 10;

/// A finite basis system over a fixed range.
#[derive(Debug, Clone, PartialEq)]
pub enum Basis {
    /// B-spline basis of the given order. The full knot vector extends the
    /// breakpoints uniformly beyond the range so that all `nbasis`
    /// functions are well defined on the whole range.
    BSpline {
        order: usize,
        nbasis: usize,
        range: (f64, f64),
        knots: Vec<f64>,
    },
    /// Fourier basis: 1, sin(ωt), cos(ωt), sin(2ωt), … with ω = 2π/period.
    /// `nbasis` is always odd (a constant plus whole sin/cos pairs).
    Fourier {
        nbasis: usize,
        range: (f64, f64),
        period: f64,
    },
}

impl Basis {
    /// B-spline basis with evenly spaced breakpoints.
    ///
    /// Needs `nbasis >= order + 2` so that at least two breakpoints span
    /// the range.
    pub fn bspline(lo: f64, hi: f64, nbasis: usize, order: usize) -> Result<Self> {
        if order < 1 {
            return Err(FdaError::Config("B-spline order must be >= 1".to_string()));
        }
        if !(hi > lo) {
            return Err(FdaError::Config(format!(
                "basis range must satisfy lo < hi, got [{}, {}]",
                lo, hi
            )));
        }
        if nbasis < order + 2 {
            return Err(FdaError::Config(format!(
                "B-spline basis of order {} needs nbasis >= {}, got {}",
                order,
                order + 2,
                nbasis
            )));
        }
        let nbreaks = nbasis - order;
        let dt = (hi - lo) / (nbreaks - 1) as f64;
        let breaks: Vec<f64> = (0..nbreaks).map(|i| lo + i as f64 * dt).collect();
        Ok(Self::bspline_from_breaks(lo, hi, order, breaks))
    }

    /// B-spline basis with supplied breakpoints.
    ///
    /// `breaks` must be strictly increasing with `breaks[0] == lo` and
    /// `breaks.last() == hi`; the resulting basis has
    /// `breaks.len() + order` functions.
    pub fn bspline_with_breaks(lo: f64, hi: f64, order: usize, breaks: Vec<f64>) -> Result<Self> {
        if order < 1 {
            return Err(FdaError::Config("B-spline order must be >= 1".to_string()));
        }
        if breaks.len() < 2 {
            return Err(FdaError::Config(format!(
                "B-spline basis needs at least 2 breakpoints, got {}",
                breaks.len()
            )));
        }
        for w in breaks.windows(2) {
            if !(w[1] > w[0]) {
                return Err(FdaError::Config(format!(
                    "breakpoints must be strictly increasing, found {} followed by {}",
                    w[0], w[1]
                )));
            }
        }
        let eps = 1e-10 * (hi - lo).abs().max(1.0);
        if (breaks[0] - lo).abs() > eps || (breaks[breaks.len() - 1] - hi).abs() > eps {
            return Err(FdaError::Config(format!(
                "breakpoints must span the range [{}, {}], got [{}, {}]",
                lo,
                hi,
                breaks[0],
                breaks[breaks.len() - 1]
            )));
        }
        Ok(Self::bspline_from_breaks(lo, hi, order, breaks))
    }

    fn bspline_from_breaks(lo: f64, hi: f64, order: usize, breaks: Vec<f64>) -> Self {
        let nbreaks = breaks.len();
        let nbasis = nbreaks + order;
        // Extend the breakpoints uniformly beyond the range, using the
        // first/last interval widths for the extension spacing.
        let dt_lo = breaks[1] - breaks[0];
        let dt_hi = breaks[nbreaks - 1] - breaks[nbreaks - 2];
        let mut knots = Vec::with_capacity(nbreaks + 2 * order);
        for i in 0..order {
            knots.push(lo - (order - i) as f64 * dt_lo);
        }
        knots.extend_from_slice(&breaks);
        for i in 1..=order {
            knots.push(hi + i as f64 * dt_hi);
        }
        Basis::BSpline {
            order,
            nbasis,
            range: (lo, hi),
            knots,
        }
    }

    /// Fourier basis whose period equals the range width.
    pub fn fourier(lo: f64, hi: f64, nbasis: usize) -> Result<Self> {
        if !(hi > lo) {
            return Err(FdaError::Config(format!(
                "basis range must satisfy lo < hi, got [{}, {}]",
                lo, hi
            )));
        }
        Self::fourier_with_period(lo, hi, nbasis, hi - lo)
    }

    /// Fourier basis with an explicit period.
    ///
    /// An even `nbasis` is rounded up to the next odd value so the basis
    /// holds complete sin/cos pairs.
    pub fn fourier_with_period(lo: f64, hi: f64, nbasis: usize, period: f64) -> Result<Self> {
        if !(hi > lo) {
            return Err(FdaError::Config(format!(
                "basis range must satisfy lo < hi, got [{}, {}]",
                lo, hi
            )));
        }
        if nbasis < 3 {
            return Err(FdaError::Config(format!(
                "Fourier basis needs nbasis >= 3, got {}",
                nbasis
            )));
        }
        if !(period > 0.0) {
            return Err(FdaError::Config(format!(
                "Fourier period must be positive, got {}",
                period
            )));
        }
        let nbasis = if nbasis % 2 == 0 { nbasis + 1 } else { nbasis };
        Ok(Basis::Fourier {
            nbasis,
            range: (lo, hi),
            period,
        })
    }

    /// Number of basis functions.
    pub fn nbasis(&self) -> usize {
        match self {
            Basis::BSpline { nbasis, .. } | Basis::Fourier { nbasis, .. } => *nbasis,
        }
    }

    /// Domain of the basis as `(lo, hi)`.
    pub fn range(&self) -> (f64, f64) {
        match self {
            Basis::BSpline { range, .. } | Basis::Fourier { range, .. } => *range,
        }
    }

    /// Short identifier used in diagnostics.
    pub fn family(&self) -> &'static str {
        match self {
            Basis::BSpline { .. } => "bspline",
            Basis::Fourier { .. } => "fourier",
        }
    }

    /// Whether the two bases share (to tolerance) the same range.
    pub fn same_range(&self, other: &Basis) -> bool {
        let (alo, ahi) = self.range();
        let (blo, bhi) = other.range();
        let eps = 1e-10 * (ahi - alo).abs().max(1.0);
        (alo - blo).abs() <= eps && (ahi - bhi).abs() <= eps
    }

    fn check_deriv(&self, deriv: usize) -> Result<()> {
        if !SUPPORTED_DERIVS.contains(&deriv) {
            return Err(FdaError::Config(format!(
                "unsupported derivative order {} (supported: 0, 1, 2, 4)",
                deriv
            )));
        }
        if let Basis::BSpline { order, .. } = self {
            if deriv >= *order {
                return Err(FdaError::Config(format!(
                    "derivative order {} not available for B-splines of order {} \
                     (the penalty would vanish identically)",
                    deriv, order
                )));
            }
        }
        Ok(())
    }

    fn check_in_range(&self, points: &[f64]) -> Result<()> {
        let (lo, hi) = self.range();
        let eps = 1e-10 * (hi - lo).abs().max(1.0);
        for &t in points {
            if t < lo - eps || t > hi + eps {
                return Err(FdaError::domain(
                    format!("evaluation point outside {} basis range", self.family()),
                    t,
                    lo,
                    hi,
                ));
            }
        }
        Ok(())
    }

    /// Evaluate all basis functions at `points`: a `points.len() x nbasis`
    /// matrix.
    pub fn eval_matrix(&self, points: &[f64]) -> Result<DMatrix<f64>> {
        self.deriv_matrix(points, 0)
    }

    /// Evaluate the `deriv`-th derivative of all basis functions at
    /// `points`.
    pub fn deriv_matrix(&self, points: &[f64], deriv: usize) -> Result<DMatrix<f64>> {
        self.check_deriv(deriv)?;
        self.check_in_range(points)?;
        Ok(self.deriv_matrix_unchecked(points, deriv))
    }

    /// Like [`Basis::deriv_matrix`] but without validation; callers must
    /// have checked `deriv` and the point range already.
    fn deriv_matrix_unchecked(&self, points: &[f64], deriv: usize) -> DMatrix<f64> {
        let k = self.nbasis();
        let mut out = DMatrix::zeros(points.len(), k);
        match self {
            Basis::BSpline { order, knots, range, .. } => {
                for (row, &t) in points.iter().enumerate() {
                    // Points that passed the range check may still sit a
                    // rounding error outside [lo, hi]; clamp so the
                    // indicator search always lands in an interval.
                    let t = t.clamp(range.0, range.1);
                    let vals = bspline_deriv_all(knots, *order, k, t, deriv);
                    for (col, &v) in vals.iter().enumerate() {
                        out[(row, col)] = v;
                    }
                }
            }
            Basis::Fourier { range, period, .. } => {
                let omega = 2.0 * PI / period;
                for (row, &t) in points.iter().enumerate() {
                    let u = omega * (t - range.0);
                    out[(row, 0)] = if deriv == 0 { 1.0 } else { 0.0 };
                    let mut col = 1;
                    let mut freq = 1usize;
                    while col < k {
                        let scale = (freq as f64 * omega).powi(deriv as i32);
                        let arg = freq as f64 * u;
                        let (sin_d, cos_d) = fourier_pair_deriv(arg, deriv);
                        out[(row, col)] = scale * sin_d;
                        if col + 1 < k {
                            out[(row, col + 1)] = scale * cos_d;
                        }
                        col += 2;
                        freq += 1;
                    }
                }
            }
        }
        out
    }

    /// Roughness matrix `R_d[i][j] = ∫ (D^d φ_i)(D^d φ_j) dt` by composite
    /// trapezoidal quadrature on a fine uniform grid.
    pub fn penalty_matrix(&self, deriv: usize) -> Result<DMatrix<f64>> {
        self.check_deriv(deriv)?;
        Ok(self.gram_matrix(deriv))
    }

    /// Inner-product (mass) matrix `W[i][j] = ∫ φ_i φ_j dt`.
    pub fn mass_matrix(&self) -> DMatrix<f64> {
        self.gram_matrix(0)
    }

    fn gram_matrix(&self, deriv: usize) -> DMatrix<f64> {
        let (lo, hi) = self.range();
        let nq = QUAD_POINTS_PER_BASIS * self.nbasis() + 1;
        let step = (hi - lo) / (nq - 1) as f64;
        let points: Vec<f64> = (0..nq).map(|i| lo + i as f64 * step).collect();
        let weights = quad_weights(&points);

        let e = self.deriv_matrix_unchecked(&points, deriv);
        let k = self.nbasis();
        let mut gram = DMatrix::zeros(k, k);
        for i in 0..k {
            for j in i..k {
                let mut sum = 0.0;
                for (q, &w) in weights.iter().enumerate() {
                    sum += w * e[(q, i)] * e[(q, j)];
                }
                gram[(i, j)] = sum;
                gram[(j, i)] = sum;
            }
        }
        gram
    }
}

/// Values (or `deriv`-th derivatives) of all `nbasis` B-spline functions at
/// a single point, via Cox-de Boor recursion followed by the derivative
/// recurrence applied `deriv` times.
fn bspline_deriv_all(knots: &[f64], order: usize, nbasis: usize, t: f64, deriv: usize) -> Vec<f64> {
    // Piecewise-constant (order 1) indicators. Intervals are half-open
    // except the last one inside the range, which is closed so the right
    // endpoint evaluates correctly.
    let last_inner = knots.len() - order - 2;
    let mut b = vec![0.0; knots.len() - 1];
    for j in 0..(knots.len() - 1) {
        let in_interval = if j == last_inner {
            t >= knots[j] && t <= knots[j + 1]
        } else {
            t >= knots[j] && t < knots[j + 1]
        };
        if in_interval {
            b[j] = 1.0;
            break;
        }
    }

    // Cox-de Boor up to the reduced order; the derivative recurrence then
    // raises the order back while differentiating.
    let low_order = order - deriv;
    for k in 2..=low_order {
        let mut b_next = vec![0.0; knots.len() - k];
        for j in 0..(knots.len() - k) {
            let d1 = knots[j + k - 1] - knots[j];
            let d2 = knots[j + k] - knots[j + 1];
            let left = if d1.abs() > 1e-12 {
                (t - knots[j]) / d1 * b[j]
            } else {
                0.0
            };
            let right = if d2.abs() > 1e-12 {
                (knots[j + k] - t) / d2 * b[j + 1]
            } else {
                0.0
            };
            b_next[j] = left + right;
        }
        b = b_next;
    }

    for k in (low_order + 1)..=order {
        let mut b_next = vec![0.0; knots.len() - k];
        for j in 0..(knots.len() - k) {
            let d1 = knots[j + k - 1] - knots[j];
            let d2 = knots[j + k] - knots[j + 1];
            let left = if d1.abs() > 1e-12 {
                (k - 1) as f64 * b[j] / d1
            } else {
                0.0
            };
            let right = if d2.abs() > 1e-12 {
                (k - 1) as f64 * b[j + 1] / d2
            } else {
                0.0
            };
            b_next[j] = left - right;
        }
        b = b_next;
    }

    b.truncate(nbasis);
    b
}

/// `d`-th derivatives of (sin x, cos x) evaluated at `x`, without the
/// frequency scale factor.
fn fourier_pair_deriv(x: f64, d: usize) -> (f64, f64) {
    match d % 4 {
        0 => (x.sin(), x.cos()),
        1 => (x.cos(), -x.sin()),
        2 => (-x.sin(), -x.cos()),
        _ => (-x.cos(), x.sin()),
    }
}
