//! Seeded generators for synthetic functional data.
//!
//! Used by tests and benchmarks, and useful for downstream sanity checks.
//! Every generator takes an explicit seed; there is no global RNG state.

use crate::error::{FdaError, Result};
use crate::grid::Grid;
use crate::matrix::CurveMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Noisy sinusoidal curves on a grid.
///
/// Curve `i` is `amplitude * sin(2π t + φ_i)` with a small random phase
/// `φ_i` plus pointwise Gaussian noise of standard deviation `noise_sd`.
pub fn noisy_sine_curves(
    n: usize,
    grid: &Grid,
    amplitude: f64,
    noise_sd: f64,
    seed: u64,
) -> Result<CurveMatrix> {
    if n == 0 {
        return Err(FdaError::dim("curves to simulate", 1, 0));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let m = grid.len();
    let (lo, hi) = grid.range();
    let span = hi - lo;

    let mut data = CurveMatrix::zeros(n, m);
    for i in 0..n {
        let phase: f64 = rng.gen::<f64>() * 0.4;
        for (j, &t) in grid.points().iter().enumerate() {
            let u = (t - lo) / span;
            let noise: f64 = rng.sample::<f64, _>(StandardNormal);
            data[(i, j)] =
                amplitude * (2.0 * std::f64::consts::PI * u + phase).sin() + noise_sd * noise;
        }
    }
    Ok(data)
}

/// Add pointwise Gaussian noise to every value of a curve matrix.
pub fn add_noise(data: &CurveMatrix, sd: f64, seed: u64) -> CurveMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let (n, m) = data.shape();
    let mut noisy = data.clone();
    for j in 0..m {
        for i in 0..n {
            let eps: f64 = rng.sample::<f64, _>(StandardNormal);
            noisy[(i, j)] += sd * eps;
        }
    }
    noisy
}
