//! Column-major matrix type for collections of sampled curves.
//!
//! [`CurveMatrix`] carries dimensions alongside a flat column-major buffer
//! and eliminates manual `data[i + j * n]` index arithmetic. Throughout the
//! crate, rows are curves (observations) and columns are evaluation points
//! or basis coefficients.

use crate::error::{FdaError, Result};
use nalgebra::DMatrix;

/// Dimension-checked column-major matrix.
///
/// Element `(row, col)` lives at index `row + col * nrows`. For functional
/// data, row `i` is curve `i`; column `j` is evaluation point (or basis
/// coefficient) `j`.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveMatrix {
    data: Vec<f64>,
    nrows: usize,
    ncols: usize,
}

impl CurveMatrix {
    /// Build from flat column-major data.
    pub fn from_column_major(data: Vec<f64>, nrows: usize, ncols: usize) -> Result<Self> {
        if data.len() != nrows * ncols {
            return Err(FdaError::dim(
                "column-major buffer length",
                nrows * ncols,
                data.len(),
            ));
        }
        Ok(Self { data, nrows, ncols })
    }

    /// Build from per-curve rows, each of equal length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, |r| r.len());
        for (i, row) in rows.iter().enumerate() {
            if row.len() != ncols {
                return Err(FdaError::dim(
                    format!("row {} length", i),
                    ncols,
                    row.len(),
                ));
            }
        }
        let mut data = vec![0.0; nrows * ncols];
        for (i, row) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                data[i + j * nrows] = v;
            }
        }
        Ok(Self { data, nrows, ncols })
    }

    /// Zero-filled matrix.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            data: vec![0.0; nrows * ncols],
            nrows,
            ncols,
        }
    }

    #[inline]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    #[inline]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Dimensions as `(nrows, ncols)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Contiguous column slice (zero-copy).
    ///
    /// # Panics
    /// Panics if `col >= ncols`.
    #[inline]
    pub fn column(&self, col: usize) -> &[f64] {
        let start = col * self.nrows;
        &self.data[start..start + self.nrows]
    }

    /// Extract one curve as a new `Vec<f64>`.
    ///
    /// O(ncols): rows are not contiguous in column-major layout.
    pub fn row(&self, row: usize) -> Vec<f64> {
        (0..self.ncols)
            .map(|j| self.data[row + j * self.nrows])
            .collect()
    }

    /// All curves as `Vec<Vec<f64>>`.
    pub fn rows(&self) -> Vec<Vec<f64>> {
        (0..self.nrows).map(|i| self.row(i)).collect()
    }

    /// Flat column-major slice (zero-copy).
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Convert to a nalgebra `DMatrix<f64>` (both are column-major, so this
    /// is a straight copy).
    pub fn to_dmatrix(&self) -> DMatrix<f64> {
        DMatrix::from_column_slice(self.nrows, self.ncols, &self.data)
    }

    /// Build from a nalgebra `DMatrix<f64>`.
    pub fn from_dmatrix(mat: &DMatrix<f64>) -> Self {
        let (nrows, ncols) = mat.shape();
        Self {
            data: mat.as_slice().to_vec(),
            nrows,
            ncols,
        }
    }

    /// Column means, one per evaluation point.
    pub fn column_means(&self) -> Vec<f64> {
        if self.nrows == 0 {
            return vec![0.0; self.ncols];
        }
        (0..self.ncols)
            .map(|j| self.column(j).iter().sum::<f64>() / self.nrows as f64)
            .collect()
    }

    /// Subtract the column mean from every row.
    pub fn center_rows(&self) -> CurveMatrix {
        let means = self.column_means();
        let mut centered = self.clone();
        for j in 0..self.ncols {
            for i in 0..self.nrows {
                centered.data[i + j * self.nrows] -= means[j];
            }
        }
        centered
    }
}

impl std::ops::Index<(usize, usize)> for CurveMatrix {
    type Output = f64;

    #[inline]
    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        debug_assert!(
            row < self.nrows && col < self.ncols,
            "CurveMatrix index ({}, {}) out of bounds for {}x{} matrix",
            row,
            col,
            self.nrows,
            self.ncols
        );
        &self.data[row + col * self.nrows]
    }
}

impl std::ops::IndexMut<(usize, usize)> for CurveMatrix {
    #[inline]
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        debug_assert!(
            row < self.nrows && col < self.ncols,
            "CurveMatrix index ({}, {}) out of bounds for {}x{} matrix",
            row,
            col,
            self.nrows,
            self.ncols
        );
        &mut self.data[row + col * self.nrows]
    }
}

impl std::fmt::Display for CurveMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CurveMatrix({}x{})", self.nrows, self.ncols)
    }
}
