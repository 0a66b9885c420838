//! Direct solvers for symmetric systems
//!
//! - Active column: Cholesky `A = U^T U` inside the skyline profile, no
//!   fill outside it.
//! - Gauss symmetric: elimination without pivoting on the upper band,
//!   `A = U^T D^-1 U`; the packed layout is treated as a full band.

use serde::{Deserialize, Serialize};

use super::storage::{SkylineStorage, StoredMatrix};
use crate::error::{FEAError, FEAResult};
use crate::math::Vec as FEVec;

/// Relative size below which a pivot counts as zero
const PIVOT_TOL: f64 = 1e-13;

/// Direct factorization method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectMethod {
    /// Skyline Cholesky, positive definite matrices
    ActiveColumn,
    /// Symmetric Gauss elimination
    GaussSymmetric,
}

impl DirectMethod {
    pub fn name(self) -> &'static str {
        match self {
            DirectMethod::ActiveColumn => "ActiveColumn",
            DirectMethod::GaussSymmetric => "GaussSymmetric",
        }
    }
}

/// A factored matrix ready for repeated solves
#[derive(Debug, Clone)]
pub(crate) enum Factorization {
    Skyline(SkylineStorage),
    Band {
        n: usize,
        bandwidth: usize,
        /// `rows[i][k]` holds the eliminated `u[i][i + k]`
        rows: Vec<Vec<f64>>,
    },
}

impl Factorization {
    pub fn factor(method: DirectMethod, a: &StoredMatrix) -> FEAResult<Self> {
        match (method, a) {
            (DirectMethod::ActiveColumn, StoredMatrix::Skyline(sky)) => skyline_cholesky(sky.clone()),
            (DirectMethod::GaussSymmetric, StoredMatrix::Packed(_)) => {
                let n = a.dim();
                band_gauss(a, n.saturating_sub(1))
            }
            (DirectMethod::GaussSymmetric, StoredMatrix::Band(band)) => {
                band_gauss(a, band.bandwidth())
            }
            _ => Err(FEAError::incompatible(format!(
                "{} cannot factor a matrix stored as {}",
                method.name(),
                a.storage_type().abbreviation()
            ))),
        }
    }

    /// Solve A x = b with the factors
    pub fn solve(&self, b: &FEVec) -> FEVec {
        match self {
            Factorization::Skyline(u) => {
                let n = u.dim();
                let mut x = b.clone();
                // U^T y = b
                for j in 0..n {
                    let first = u.first_row(j);
                    let col = u.column(j);
                    let last = col.len() - 1;
                    let s: f64 = col[..last]
                        .iter()
                        .enumerate()
                        .map(|(k, v)| v * x[first + k])
                        .sum();
                    x[j] = (x[j] - s) / col[last];
                }
                // U x = y
                for j in (0..n).rev() {
                    let first = u.first_row(j);
                    let col = u.column(j);
                    let last = col.len() - 1;
                    x[j] /= col[last];
                    let xj = x[j];
                    for (k, v) in col[..last].iter().enumerate() {
                        x[first + k] -= v * xj;
                    }
                }
                x
            }
            Factorization::Band { n, bandwidth, rows } => {
                let n = *n;
                let mut x = b.clone();
                // forward elimination of the right-hand side
                for k in 0..n {
                    let pivot = rows[k][0];
                    let xk = x[k];
                    for i in (k + 1)..=(k + bandwidth).min(n - 1) {
                        x[i] -= rows[k][i - k] / pivot * xk;
                    }
                }
                // back substitution
                for k in (0..n).rev() {
                    let s: f64 = ((k + 1)..=(k + bandwidth).min(n - 1))
                        .map(|j| rows[k][j - k] * x[j])
                        .sum();
                    x[k] = (x[k] - s) / rows[k][0];
                }
                x
            }
        }
    }
}

fn skyline_cholesky(mut u: SkylineStorage) -> FEAResult<Factorization> {
    let n = u.dim();
    let scale = (0..n).fold(0.0_f64, |m, j| m.max(u.get(j, j).abs()));

    for j in 0..n {
        let first_j = u.first_row(j);
        // off-diagonal entries of column j, top to bottom
        for i in first_j..j {
            let first_i = u.first_row(i);
            let start = first_i.max(first_j);
            let s: f64 = (start..i).map(|k| u.get(k, i) * u.get(k, j)).sum();
            let uij = (u.get(i, j) - s) / u.get(i, i);
            u.column_mut(j)[i - first_j] = uij;
        }
        let s: f64 = u.column(j)[..j - first_j].iter().map(|v| v * v).sum();
        let d = u.get(j, j) - s;
        if d.is_nan() || d <= PIVOT_TOL * scale {
            return Err(FEAError::singular(format!(
                "matrix is not positive definite (pivot {:.3e} at equation {})",
                d, j
            )));
        }
        let ujj = d.sqrt();
        u.column_mut(j)[j - first_j] = ujj;
    }
    Ok(Factorization::Skyline(u))
}

fn band_gauss(a: &StoredMatrix, bandwidth: usize) -> FEAResult<Factorization> {
    let n = a.dim();
    let mut rows: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            (0..=bandwidth)
                .map(|k| if i + k < n { a.get(i, i + k) } else { 0.0 })
                .collect()
        })
        .collect();
    let scale = (0..n).fold(0.0_f64, |m, i| m.max(rows[i][0].abs()));

    for k in 0..n {
        let pivot = rows[k][0];
        if pivot.is_nan() || pivot.abs() <= PIVOT_TOL * scale {
            return Err(FEAError::singular(format!(
                "zero pivot {:.3e} at equation {}",
                pivot, k
            )));
        }
        let last = (k + bandwidth).min(n - 1);
        let (done, rest) = rows.split_at_mut(k + 1);
        let row_k = &done[k];
        for i in (k + 1)..=last {
            let factor = row_k[i - k] / pivot;
            if factor == 0.0 {
                continue;
            }
            let row_i = &mut rest[i - k - 1];
            for j in i..=last {
                row_i[j - i] -= factor * row_k[j - k];
            }
        }
    }
    Ok(Factorization::Band {
        n,
        bandwidth,
        rows,
    })
}
