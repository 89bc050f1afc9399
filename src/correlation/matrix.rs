//! Validated correlation matrix with PSD repair and Cholesky factorization.

use nalgebra::{DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};

use crate::core::error::{PortsimError, Result};

/// Eigenvalue tolerance below which a matrix is considered non-PSD.
pub const PSD_TOLERANCE: f64 = 1e-6;

/// Floor applied to clipped eigenvalues during repair.
const EIGEN_FLOOR: f64 = 1e-8;

/// Clamp bound for off-diagonal entries.
const OFF_DIAG_CLAMP: f64 = 0.999;

/// N×N correlation matrix between asset return series.
///
/// Invariants after [`CorrelationMatrix::make_valid`]: symmetric, unit
/// diagonal, entries in [-1, 1], minimum eigenvalue above `-PSD_TOLERANCE`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    /// Tickers in row/column order.
    pub tickers: Vec<String>,
    /// Dense rows of correlation values.
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    /// Create an identity matrix (fully uncorrelated assets).
    pub fn identity(tickers: Vec<String>) -> Self {
        let n = tickers.len();
        let mut values = vec![vec![0.0; n]; n];
        for (i, row) in values.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        Self { tickers, values }
    }

    /// Create from dense rows. Fails if the rows are not square or do not
    /// match the ticker count.
    pub fn from_rows(tickers: Vec<String>, values: Vec<Vec<f64>>) -> Result<Self> {
        let n = tickers.len();
        if values.len() != n || values.iter().any(|row| row.len() != n) {
            return Err(PortsimError::invalid_matrix(format!(
                "expected {n}x{n} matrix"
            )));
        }
        Ok(Self { tickers, values })
    }

    /// Number of assets.
    #[inline]
    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    /// Check if empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Get the entry at (i, j).
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i][j]
    }

    /// Set both (i, j) and (j, i) to preserve symmetry.
    #[inline]
    pub fn set_pair(&mut self, i: usize, j: usize, value: f64) {
        self.values[i][j] = value;
        self.values[j][i] = value;
    }

    /// Index of a ticker, if present.
    pub fn index_of(&self, ticker: &str) -> Option<usize> {
        self.tickers.iter().position(|t| t == ticker)
    }

    /// Symmetrize by averaging mirrored entries.
    pub fn symmetrize(&mut self) {
        let n = self.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let avg = (self.values[i][j] + self.values[j][i]) / 2.0;
                self.values[i][j] = avg;
                self.values[j][i] = avg;
            }
        }
    }

    /// Clamp off-diagonal entries to [-0.999, 0.999] and pin the diagonal
    /// to exactly 1.
    pub fn clamp_entries(&mut self) {
        let n = self.len();
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    self.values[i][j] = 1.0;
                } else {
                    let v = self.values[i][j];
                    self.values[i][j] = if v.is_finite() {
                        v.clamp(-OFF_DIAG_CLAMP, OFF_DIAG_CLAMP)
                    } else {
                        0.0
                    };
                }
            }
        }
    }

    /// Smallest eigenvalue of the (symmetrized) matrix.
    pub fn min_eigenvalue(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let n = self.len();
        let m = DMatrix::from_fn(n, n, |i, j| (self.values[i][j] + self.values[j][i]) / 2.0);
        let eigen = SymmetricEigen::new(m);
        eigen
            .eigenvalues
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min)
    }

    /// Check all invariants: symmetric, unit diagonal, entries in [-1, 1],
    /// positive semi-definite within tolerance.
    pub fn is_valid(&self) -> bool {
        let n = self.len();
        for i in 0..n {
            if (self.values[i][i] - 1.0).abs() > 1e-9 {
                return false;
            }
            for j in 0..n {
                let v = self.values[i][j];
                if !v.is_finite() || !(-1.0..=1.0).contains(&v) {
                    return false;
                }
                if (v - self.values[j][i]).abs() > 1e-9 {
                    return false;
                }
            }
        }
        self.is_empty() || self.min_eigenvalue() >= -PSD_TOLERANCE
    }

    /// Repair into a valid correlation matrix.
    ///
    /// Symmetrizes, clamps, then clips negative eigenvalues to a small
    /// positive floor, reconstructs, and renormalizes the diagonal back to 1.
    /// Mandatory before the matrix is handed to the Monte Carlo engine.
    pub fn make_valid(&mut self) {
        if self.is_empty() {
            return;
        }
        self.symmetrize();
        self.clamp_entries();

        let n = self.len();
        let m = DMatrix::from_fn(n, n, |i, j| self.values[i][j]);
        let eigen = SymmetricEigen::new(m);
        let min_eig = eigen
            .eigenvalues
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);

        if min_eig >= EIGEN_FLOOR {
            return;
        }

        // Clip eigenvalues and reconstruct V * D * V^T.
        let clipped = eigen.eigenvalues.map(|e| e.max(EIGEN_FLOOR));
        let rebuilt =
            &eigen.eigenvectors * DMatrix::from_diagonal(&clipped) * eigen.eigenvectors.transpose();

        // Renormalize so the diagonal is exactly 1 again.
        let scale: Vec<f64> = (0..n).map(|i| rebuilt[(i, i)].max(EIGEN_FLOOR).sqrt()).collect();
        for i in 0..n {
            for j in 0..n {
                self.values[i][j] = rebuilt[(i, j)] / (scale[i] * scale[j]);
            }
        }
        self.symmetrize();
        self.clamp_entries();
    }

    /// Zero every off-diagonal entry touching a ticker's row and column,
    /// treating it as uncorrelated cash. Returns false if the ticker is
    /// not in the matrix.
    pub fn zero_cross_correlations(&mut self, ticker: &str) -> bool {
        let Some(idx) = self.index_of(ticker) else {
            return false;
        };
        let n = self.len();
        for j in 0..n {
            if j != idx {
                self.values[idx][j] = 0.0;
                self.values[j][idx] = 0.0;
            }
        }
        true
    }

    /// Cholesky decomposition: lower-triangular L with L·Lᵗ = C.
    ///
    /// Fails with `NumericInstability` on a clearly negative pivot, which
    /// indicates an upstream invariant violation (the matrix was not passed
    /// through [`CorrelationMatrix::make_valid`]). Pivots within tolerance
    /// of zero are floored, so PSD-but-singular matrices still factor.
    pub fn cholesky(&self) -> Result<Vec<Vec<f64>>> {
        let n = self.len();
        let mut l = vec![vec![0.0; n]; n];

        for i in 0..n {
            for j in 0..=i {
                let mut sum = 0.0;
                for k in 0..j {
                    sum += l[i][k] * l[j][k];
                }

                if i == j {
                    let diag = self.values[i][i] - sum;
                    if diag < -1e-8 {
                        return Err(PortsimError::numeric_instability(
                            "Cholesky decomposition: matrix is not positive semi-definite",
                        ));
                    }
                    l[i][j] = diag.max(0.0).sqrt();
                } else if l[j][j].abs() < 1e-12 {
                    l[i][j] = 0.0;
                } else {
                    l[i][j] = (self.values[i][j] - sum) / l[j][j];
                }
            }
        }

        Ok(l)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tickers(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("T{i}")).collect()
    }

    #[test]
    fn test_identity_is_valid() {
        let m = CorrelationMatrix::identity(tickers(3));
        assert!(m.is_valid());
        assert!((m.min_eigenvalue() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_from_rows_shape_check() {
        assert!(CorrelationMatrix::from_rows(tickers(2), vec![vec![1.0, 0.5]]).is_err());
        assert!(CorrelationMatrix::from_rows(
            tickers(2),
            vec![vec![1.0, 0.5], vec![0.5, 1.0]]
        )
        .is_ok());
    }

    #[test]
    fn test_repair_asymmetric_matrix() {
        let mut m = CorrelationMatrix::from_rows(
            tickers(3),
            vec![
                vec![1.0, 0.8, -0.3],
                vec![0.6, 1.0, 0.5],
                vec![-0.1, 0.3, 1.0],
            ],
        )
        .unwrap();
        assert!(!m.is_valid());

        m.make_valid();
        assert!(m.is_valid());
        // Symmetrized entries are the average of the mirrored inputs,
        // possibly perturbed slightly by the eigenvalue clip.
        assert!((m.get(0, 1) - 0.7).abs() < 0.05);
        assert!((m.get(0, 2) + 0.2).abs() < 0.05);
    }

    #[test]
    fn test_repair_non_psd_matrix() {
        // Three assets each pairwise correlated at -0.9 cannot coexist; the
        // matrix has a strongly negative eigenvalue.
        let mut m = CorrelationMatrix::from_rows(
            tickers(3),
            vec![
                vec![1.0, -0.9, -0.9],
                vec![-0.9, 1.0, -0.9],
                vec![-0.9, -0.9, 1.0],
            ],
        )
        .unwrap();
        assert!(m.min_eigenvalue() < -PSD_TOLERANCE);

        m.make_valid();
        assert!(m.is_valid());
        assert!(m.min_eigenvalue() >= -PSD_TOLERANCE);
        assert!(m.cholesky().is_ok());
    }

    #[test]
    fn test_clamp_out_of_range_entries() {
        let mut m = CorrelationMatrix::from_rows(
            tickers(2),
            vec![vec![1.0, 1.7], vec![1.7, 1.0]],
        )
        .unwrap();
        m.make_valid();
        assert!(m.is_valid());
        assert!(m.get(0, 1) <= 0.999);
    }

    #[test]
    fn test_cholesky_correlated() {
        let m = CorrelationMatrix::from_rows(
            tickers(2),
            vec![vec![1.0, 0.5], vec![0.5, 1.0]],
        )
        .unwrap();
        let l = m.cholesky().unwrap();

        // Verify L * L^T reconstructs the matrix.
        let reconstructed_01 = l[1][0] * l[0][0];
        let reconstructed_11 = l[1][0] * l[1][0] + l[1][1] * l[1][1];
        assert!((l[0][0] - 1.0).abs() < 1e-10);
        assert!((reconstructed_01 - 0.5).abs() < 1e-10);
        assert!((reconstructed_11 - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_cholesky_rejects_unrepaired_matrix() {
        let m = CorrelationMatrix::from_rows(
            tickers(3),
            vec![
                vec![1.0, -0.9, -0.9],
                vec![-0.9, 1.0, -0.9],
                vec![-0.9, -0.9, 1.0],
            ],
        )
        .unwrap();
        assert!(m.cholesky().is_err());
    }

    #[test]
    fn test_zero_cross_correlations() {
        let mut m = CorrelationMatrix::from_rows(
            tickers(3),
            vec![
                vec![1.0, 0.5, 0.4],
                vec![0.5, 1.0, 0.3],
                vec![0.4, 0.3, 1.0],
            ],
        )
        .unwrap();

        assert!(m.zero_cross_correlations("T1"));
        assert_eq!(m.get(0, 1), 0.0);
        assert_eq!(m.get(1, 2), 0.0);
        assert_eq!(m.get(1, 1), 1.0);
        assert!((m.get(0, 2) - 0.4).abs() < 1e-12);

        assert!(!m.zero_cross_correlations("MISSING"));
    }
}
