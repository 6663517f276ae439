//! Integration tests driving the full analysis pipeline on synthetic
//! spectrometric data.

use fdaspec::{
    band_depth, depth, fpca, fregre_basis, run_analysis, select_lambda, smooth_basis,
    AnalysisConfig, Basis, BasisSpec, CurveMatrix, DepthMethod, Grid, LambdaGrid, ScalarResponse,
    SpectralDataset,
};
use fdaspec::simulation::{add_noise, noisy_sine_curves};
use std::sync::Arc;

fn assert_close(a: f64, b: f64, tol: f64, label: &str) {
    assert!(
        (a - b).abs() < tol,
        "{}: {} vs {} (diff {:.2e} > tol {:.2e})",
        label,
        a,
        b,
        (a - b).abs(),
        tol
    );
}

/// Five curves on a 100-point grid: curves 0-3 are noisy unit sine waves,
/// curve 4 is a noisy sine wave scaled by 3.
fn five_curve_scenario() -> (Grid, CurveMatrix) {
    let grid = Grid::uniform(0.0, 1.0, 100).unwrap();
    let base = noisy_sine_curves(4, &grid, 1.0, 0.1, 42).unwrap();
    let scaled = noisy_sine_curves(1, &grid, 3.0, 0.1, 43).unwrap();
    let mut rows = base.rows();
    rows.extend(scaled.rows());
    (grid, CurveMatrix::from_rows(&rows).unwrap())
}

#[test]
fn scaled_curve_is_least_deep_and_flagged() {
    let (_, data) = five_curve_scenario();

    let bd = band_depth(&data).unwrap();
    for i in 0..4 {
        assert!(
            bd[4] <= bd[i],
            "the x3 curve must not out-rank any regular curve under BD2"
        );
    }
    let ranking = depth(&data, DepthMethod::Band).unwrap();
    assert_eq!(
        ranking.ordering.last(),
        Some(&4),
        "the x3 curve must rank least deep under BD2"
    );

    let result = depth(&data, DepthMethod::ModifiedBand).unwrap();
    let flags = result.outliers();
    assert!(flags[4], "the x3 curve must be IQR-flagged");
    assert!(
        !flags[..4].iter().any(|&f| f),
        "no regular curve should be flagged"
    );
    assert_ne!(result.median, 4);
}

#[test]
fn gcv_selection_smooths_noise_away() {
    let grid = Grid::uniform(0.0, 1.0, 100).unwrap();
    let clean = noisy_sine_curves(6, &grid, 1.0, 0.0, 11).unwrap();
    let noisy = add_noise(&clean, 0.25, 12);

    let basis = Arc::new(Basis::bspline(0.0, 1.0, 30, 4).unwrap());
    let lambda_grid = LambdaGrid::new(-8.0, 4.0, 25).unwrap();
    let selection = select_lambda(&noisy, &grid, &basis, 2, &lambda_grid).unwrap();

    // The smoothed curves should be closer to the clean signal than the
    // noisy observations are.
    let m = grid.len();
    let mut err_fit = 0.0;
    let mut err_raw = 0.0;
    for i in 0..6 {
        for j in 0..m {
            err_fit += (selection.fit.fitted[(i, j)] - clean[(i, j)]).powi(2);
            err_raw += (noisy[(i, j)] - clean[(i, j)]).powi(2);
        }
    }
    assert!(
        err_fit < err_raw / 2.0,
        "smoothing should beat raw noise: {} vs {}",
        err_fit,
        err_raw
    );

    // Interior minimum of the GCV profile.
    assert!(selection.best_index > 0);
    assert!(selection.best_index < selection.lambdas.len() - 1);

    // Refit idempotence.
    let refit = smooth_basis(&noisy, &grid, &basis, 2, selection.lambda()).unwrap();
    assert_eq!(refit.coefficients, selection.fit.coefficients);
}

#[test]
fn harmonics_stay_orthonormal_after_smoothing() {
    let grid = Grid::uniform(0.0, 1.0, 80).unwrap();
    let data = noisy_sine_curves(15, &grid, 1.0, 0.2, 5).unwrap();
    let basis = Arc::new(Basis::bspline(0.0, 1.0, 15, 4).unwrap());

    let fit = smooth_basis(&data, &grid, &basis, 2, 1e-4).unwrap();
    let fd = fit.to_fd().unwrap();
    let pca = fpca(&fd, 4).unwrap();

    let w = fd.basis().mass_matrix();
    let h = pca.harmonics.coefficients().to_dmatrix();
    let gram = &h * &w * h.transpose();
    for i in 0..4 {
        for j in 0..4 {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert_close(gram[(i, j)], expected, 1e-8, "harmonic W-gram");
        }
    }

    let sum: f64 = pca.prop_var.iter().sum();
    assert!(sum <= 1.0 + 1e-10);
    for pair in pca.prop_var.windows(2) {
        assert!(pair[0] >= pair[1] - 1e-12);
    }
}

#[test]
fn regression_recovers_signal_through_pipeline() {
    let grid = Grid::uniform(0.0, 1.0, 100).unwrap();
    let n = 40;

    // Amplitude-modulated sines: the response is a linear function of the
    // amplitude, which the functional model captures through β ∝ sin.
    let amplitudes: Vec<f64> = (0..n).map(|i| 0.5 + 2.0 * i as f64 / n as f64).collect();
    let clean_rows: Vec<Vec<f64>> = amplitudes
        .iter()
        .map(|&a| {
            grid.points()
                .iter()
                .map(|&t| a * (2.0 * std::f64::consts::PI * t).sin())
                .collect()
        })
        .collect();
    let curves = add_noise(&CurveMatrix::from_rows(&clean_rows).unwrap(), 0.05, 77);
    let y: Vec<f64> = amplitudes.iter().map(|&a| 2.0 + 3.0 * a).collect();

    let dataset = SpectralDataset::new(
        grid,
        curves,
        vec![ScalarResponse::new("fat", y)],
    )
    .unwrap();

    let config = AnalysisConfig {
        basis: BasisSpec::BSpline {
            nbasis: 15,
            order: 4,
        },
        n_harmonics: 3,
        ..AnalysisConfig::default()
    };
    let report = run_analysis(&dataset, &config).unwrap();

    let (name, fit) = &report.regressions[0];
    assert_eq!(name, "fat");
    assert!(
        fit.r_squared > 0.9,
        "functional signal should be captured, r² = {}",
        fit.r_squared
    );
    assert_eq!(report.pca.scores.shape(), (n, 3));
    assert_eq!(report.depth.depths.len(), n);
}

#[test]
fn direct_regression_matches_known_integral() {
    // Flat curves of height h_i: ∫ X β = h_i ∫ β, so regressing y = 4 h_i
    // on the curves must produce ∫ β ≈ 4 and a perfect fit.
    let grid = Grid::uniform(0.0, 1.0, 50).unwrap();
    let basis = Arc::new(Basis::bspline(0.0, 1.0, 10, 4).unwrap());
    let heights: Vec<f64> = (0..12).map(|i| i as f64 * 0.5 - 3.0).collect();
    let rows: Vec<Vec<f64>> = heights.iter().map(|&h| vec![h; 50]).collect();
    let data = CurveMatrix::from_rows(&rows).unwrap();

    let fit = smooth_basis(&data, &grid, &basis, 2, 1e-6).unwrap();
    let fd = fit.to_fd().unwrap();
    let y: Vec<f64> = heights.iter().map(|&h| 4.0 * h).collect();

    let reg = fregre_basis(&fd, &y).unwrap();
    assert!(reg.r_squared > 1.0 - 1e-8);

    // ∫β = <1, β>; the constant function has the all-ones coefficient
    // vector (partition of unity), so the integral is 1'Wβ.
    let beta_integral = {
        let w = basis.mass_matrix();
        let b = reg.beta.coefficients().to_dmatrix().transpose(); // K x 1
        let ones = nalgebra::DMatrix::from_element(1, basis.nbasis(), 1.0);
        (ones * w * b)[(0, 0)]
    };
    assert_close(beta_integral, 4.0, 1e-6, "integral of beta");
}

#[test]
fn pipeline_surfaces_descriptive_errors() {
    let grid = Grid::uniform(0.0, 1.0, 30).unwrap();
    let absorbance = CurveMatrix::zeros(3, 30);
    let dataset = SpectralDataset::new(grid, absorbance, vec![]).unwrap();

    // 3 curves cannot support the default 3 harmonics (min(N-1, K) = 2).
    let err = run_analysis(&dataset, &AnalysisConfig::default()).unwrap_err();
    let message = format!("{}", err);
    assert!(
        message.contains("component"),
        "error should explain the failure, got: {}",
        message
    );
}
