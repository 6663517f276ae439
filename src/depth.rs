//! Band depths for functional data: robust ordering, median curves, and
//! outlier flagging.
//!
//! Depths are computed from curves sampled on a common grid (typically a
//! smoothed functional object evaluated on its fitting grid). Bands are
//! formed by all C(M, 2) unordered pairs drawn from the full sample,
//! including pairs touching the curve under evaluation; a curve always
//! lies inside a band formed with itself, so every depth is strictly
//! positive. Cost is O(M² · grid) per method, which is fine for the
//! hundreds of curves this crate targets but does not scale to very large
//! samples without a faster band-depth algorithm.

use crate::error::{FdaError, Result};
use crate::matrix::CurveMatrix;
use rayon::prelude::*;

/// Depth method selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthMethod {
    /// Band depth of order 2: fraction of bands fully containing the curve.
    Band,
    /// Modified band depth: average fraction of grid points inside each
    /// band.
    ModifiedBand,
    /// Modified band depth values, with plain band depth breaking ties in
    /// the ordering and median selection.
    Both,
}

impl DepthMethod {
    pub fn name(&self) -> &'static str {
        match self {
            DepthMethod::Band => "BD2",
            DepthMethod::ModifiedBand => "MBD",
            DepthMethod::Both => "MBD+BD2",
        }
    }
}

/// Per-curve depths with the induced ordering.
#[derive(Debug, Clone)]
pub struct DepthResult {
    /// Depth per curve, in [0, 1], aligned with the input row order.
    pub depths: Vec<f64>,
    /// Curve indices from deepest to shallowest (ties broken per method,
    /// then by lower index — fully deterministic).
    pub ordering: Vec<usize>,
    /// Index of the deepest (median) curve.
    pub median: usize,
    /// Method that produced these depths.
    pub method: DepthMethod,
}

impl DepthResult {
    /// IQR-based outlier flags: curve `i` is an outlier when
    /// `depths[i] < Q1 - 1.5 * IQR` of the depth distribution.
    pub fn outliers(&self) -> Vec<bool> {
        let q1 = quantile(&self.depths, 0.25);
        let q3 = quantile(&self.depths, 0.75);
        let threshold = q1 - 1.5 * (q3 - q1);
        self.depths.iter().map(|&d| d < threshold).collect()
    }

    /// Indices of central curves: depth at or above the median depth.
    pub fn central_curves(&self) -> Vec<usize> {
        let med = quantile(&self.depths, 0.5);
        self.depths
            .iter()
            .enumerate()
            .filter(|(_, &d)| d >= med)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Band depth of order 2 over a common grid.
///
/// For each curve, the fraction of unordered pairs {j, k} whose band
/// `[min(y_j, y_k), max(y_j, y_k)]` contains the curve at every grid
/// point.
pub fn band_depth(values: &CurveMatrix) -> Result<Vec<f64>> {
    let (n, m) = check_sample(values)?;
    let n_pairs = (n * (n - 1)) / 2;

    Ok((0..n)
        .into_par_iter()
        .map(|i| {
            let mut count_in_band = 0usize;
            for j in 0..n {
                for k in (j + 1)..n {
                    let mut inside = true;
                    for t in 0..m {
                        let x = values[(i, t)];
                        let a = values[(j, t)];
                        let b = values[(k, t)];
                        if x < a.min(b) || x > a.max(b) {
                            inside = false;
                            break;
                        }
                    }
                    if inside {
                        count_in_band += 1;
                    }
                }
            }
            count_in_band as f64 / n_pairs as f64
        })
        .collect())
}

/// Modified band depth over a common grid.
///
/// Relaxes [`band_depth`] by averaging, per pair, the fraction of grid
/// points at which the curve lies inside the band, which avoids the
/// near-rational clustering of plain band depth for small samples.
pub fn modified_band_depth(values: &CurveMatrix) -> Result<Vec<f64>> {
    let (n, m) = check_sample(values)?;
    let n_pairs = (n * (n - 1)) / 2;

    Ok((0..n)
        .into_par_iter()
        .map(|i| {
            let mut total = 0.0;
            for j in 0..n {
                for k in (j + 1)..n {
                    let mut inside = 0usize;
                    for t in 0..m {
                        let x = values[(i, t)];
                        let a = values[(j, t)];
                        let b = values[(k, t)];
                        if x >= a.min(b) && x <= a.max(b) {
                            inside += 1;
                        }
                    }
                    total += inside as f64 / m as f64;
                }
            }
            total / n_pairs as f64
        })
        .collect())
}

/// Compute depths with the chosen method and derive ordering and median.
pub fn depth(values: &CurveMatrix, method: DepthMethod) -> Result<DepthResult> {
    let (depths, tie_break) = match method {
        DepthMethod::Band => (band_depth(values)?, None),
        DepthMethod::ModifiedBand => (modified_band_depth(values)?, None),
        DepthMethod::Both => {
            let mbd = modified_band_depth(values)?;
            let bd = band_depth(values)?;
            (mbd, Some(bd))
        }
    };

    let mut ordering: Vec<usize> = (0..depths.len()).collect();
    ordering.sort_by(|&a, &b| {
        let primary = depths[b]
            .partial_cmp(&depths[a])
            .unwrap_or(std::cmp::Ordering::Equal);
        primary
            .then_with(|| match &tie_break {
                Some(bd) => bd[b].partial_cmp(&bd[a]).unwrap_or(std::cmp::Ordering::Equal),
                None => std::cmp::Ordering::Equal,
            })
            .then(a.cmp(&b))
    });
    let median = ordering[0];

    Ok(DepthResult {
        depths,
        ordering,
        median,
        method,
    })
}

fn check_sample(values: &CurveMatrix) -> Result<(usize, usize)> {
    let (n, m) = values.shape();
    if n < 2 {
        return Err(FdaError::dim("curves for band depth", 2, n));
    }
    if m == 0 {
        return Err(FdaError::dim("grid points for band depth", 1, 0));
    }
    Ok((n, m))
}

/// Type-7 (linear interpolation) quantile of an unsorted sample.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let h = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let frac = h - lo as f64;
    if lo + 1 < sorted.len() {
        sorted[lo] * (1.0 - frac) + sorted[lo + 1] * frac
    } else {
        sorted[lo]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    /// Sine curves with increasing vertical offsets: curve n/2 is central.
    fn shifted_sines(n: usize, m: usize) -> CurveMatrix {
        let rows: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                let offset = (i as f64 - n as f64 / 2.0) / n as f64;
                (0..m)
                    .map(|j| {
                        let t = j as f64 / (m - 1) as f64;
                        (2.0 * PI * t).sin() + offset
                    })
                    .collect()
            })
            .collect();
        CurveMatrix::from_rows(&rows).unwrap()
    }

    #[test]
    fn test_band_depth_range_and_center() {
        let data = shifted_sines(11, 30);
        let depths = band_depth(&data).unwrap();
        for &d in &depths {
            assert!((0.0..=1.0).contains(&d), "depth {} out of [0, 1]", d);
        }
        // The middle curve sits inside every band of curves around it.
        assert!(depths[5] > depths[0]);
        assert!(depths[5] > depths[10]);
    }

    #[test]
    fn test_mbd_range_and_center() {
        let data = shifted_sines(11, 30);
        let depths = modified_band_depth(&data).unwrap();
        for &d in &depths {
            assert!((0.0..=1.0).contains(&d));
        }
        assert!(depths[5] > depths[0]);
        assert!(depths[5] > depths[10]);
    }

    #[test]
    fn test_mbd_at_least_band_depth() {
        // MBD counts partial containment, so it dominates BD2 curve-wise.
        let data = shifted_sines(9, 25);
        let bd = band_depth(&data).unwrap();
        let mbd = modified_band_depth(&data).unwrap();
        for i in 0..9 {
            assert!(mbd[i] >= bd[i] - 1e-12);
        }
    }

    #[test]
    fn test_depth_median_is_argmax() {
        let data = shifted_sines(11, 30);
        let result = depth(&data, DepthMethod::ModifiedBand).unwrap();
        let max = result
            .depths
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(result.depths[result.median], max);
        assert_eq!(result.ordering[0], result.median);
        assert_eq!(result.method.name(), "MBD");
    }

    #[test]
    fn test_depth_deterministic() {
        let data = shifted_sines(10, 20);
        let a = depth(&data, DepthMethod::Both).unwrap();
        let b = depth(&data, DepthMethod::Both).unwrap();
        assert_eq!(a.depths, b.depths);
        assert_eq!(a.ordering, b.ordering);
        assert_eq!(a.median, b.median);
    }

    #[test]
    fn test_depth_permutation_invariant_multiset() {
        let data = shifted_sines(9, 25);
        let reversed = CurveMatrix::from_rows(
            &data.rows().into_iter().rev().collect::<Vec<_>>(),
        )
        .unwrap();

        let mut fwd = modified_band_depth(&data).unwrap();
        let mut rev = modified_band_depth(&reversed).unwrap();
        fwd.sort_by(|a, b| a.partial_cmp(b).unwrap());
        rev.sort_by(|a, b| a.partial_cmp(b).unwrap());
        for (a, b) in fwd.iter().zip(rev.iter()) {
            assert!((a - b).abs() < 1e-12, "depth multiset changed: {} vs {}", a, b);
        }
    }

    #[test]
    fn test_both_breaks_ties_with_band_depth() {
        let data = shifted_sines(10, 20);
        let result = depth(&data, DepthMethod::Both).unwrap();
        // Depth values are the MBD values.
        let mbd = modified_band_depth(&data).unwrap();
        assert_eq!(result.depths, mbd);
        assert_eq!(result.method, DepthMethod::Both);
    }

    #[test]
    fn test_outlier_flagging() {
        let n = 12;
        let m = 40;
        // Phase-shifted sines cross each other, so every regular curve
        // keeps a healthy depth while the shifted one does not.
        let mut rows: Vec<Vec<f64>> = (0..n - 1)
            .map(|i| {
                let phase = 0.15 * i as f64;
                (0..m)
                    .map(|j| {
                        let t = j as f64 / (m - 1) as f64;
                        (2.0 * PI * t + phase).sin()
                    })
                    .collect()
            })
            .collect();
        // One curve far outside the envelope of the rest.
        rows.push(
            (0..m)
                .map(|j| {
                    let t = j as f64 / (m - 1) as f64;
                    (2.0 * PI * t).sin() + 10.0
                })
                .collect(),
        );
        let data = CurveMatrix::from_rows(&rows).unwrap();

        let result = depth(&data, DepthMethod::ModifiedBand).unwrap();
        let flags = result.outliers();
        assert!(flags[n - 1], "shifted curve must be flagged");
        let n_flagged = flags.iter().filter(|&&f| f).count();
        assert_eq!(n_flagged, 1, "only the shifted curve should be flagged");
    }

    #[test]
    fn test_central_curves_contain_median() {
        let data = shifted_sines(11, 30);
        let result = depth(&data, DepthMethod::ModifiedBand).unwrap();
        let central = result.central_curves();
        assert!(central.contains(&result.median));
        assert!(central.len() < 11, "not every curve should be central");
    }

    #[test]
    fn test_depth_rejects_tiny_samples() {
        let data = CurveMatrix::zeros(1, 10);
        assert!(matches!(
            band_depth(&data),
            Err(FdaError::Dimension { expected: 2, got: 1, .. })
        ));
    }

    #[test]
    fn test_quantile_type7() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        assert!((quantile(&values, 0.0) - 1.0).abs() < 1e-12);
        assert!((quantile(&values, 1.0) - 4.0).abs() < 1e-12);
        assert!((quantile(&values, 0.5) - 2.5).abs() < 1e-12);
        assert!((quantile(&values, 0.25) - 1.75).abs() < 1e-12);
    }
}
