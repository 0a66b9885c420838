//! Preconditioners for the Krylov solvers
//!
//! All of them are built from the compressed-row form of the system matrix.
//! The incomplete factorizations keep the sparsity pattern of the matrix
//! (zero fill-in).

use log::warn;
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{FEAError, FEAResult};
use crate::math::Vec as FEVec;

/// Preconditioner choice for iterative solvers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Preconditioner {
    #[default]
    None,
    /// IC(0), symmetric positive definite matrices only
    IncompleteCholesky,
    /// ILU(0)
    IncompleteLU,
    /// Jacobi
    Diagonal,
}

type SparseRows = Vec<Vec<(usize, f64)>>;

/// A preconditioner ready to apply `z = M^-1 r`
#[derive(Debug, Clone)]
pub(crate) enum PreconditionerOp {
    Identity,
    Jacobi(FEVec),
    /// Lower factor rows, diagonal stored last in every row
    Cholesky(SparseRows),
    /// Combined L\U rows sorted by column, `diag[i]` indexes the pivot of row i
    Lu { rows: SparseRows, diag: Vec<usize> },
}

fn csr_rows(csr: &CsrMatrix<f64>) -> SparseRows {
    let offsets = csr.row_offsets();
    let cols = csr.col_indices();
    let values = csr.values();
    (0..csr.nrows())
        .map(|i| {
            let mut row: Vec<(usize, f64)> = (offsets[i]..offsets[i + 1])
                .map(|k| (cols[k], values[k]))
                .collect();
            row.sort_by_key(|e| e.0);
            row
        })
        .collect()
}

impl PreconditionerOp {
    pub fn build(kind: Preconditioner, csr: &CsrMatrix<f64>) -> FEAResult<Self> {
        match kind {
            Preconditioner::None => Ok(PreconditionerOp::Identity),
            Preconditioner::Diagonal => Ok(Self::jacobi(csr)),
            Preconditioner::IncompleteCholesky => Self::incomplete_cholesky(csr),
            Preconditioner::IncompleteLU => Self::incomplete_lu(csr),
        }
    }

    /// Inverse diagonal; zero diagonal entries fall back to 1
    pub fn jacobi(csr: &CsrMatrix<f64>) -> Self {
        let mut diag = FEVec::from_element(csr.nrows(), 1.0);
        for (row, col, &val) in csr.triplet_iter() {
            if row == col && val.abs() > 1e-15 {
                diag[row] = 1.0 / val;
            }
        }
        PreconditionerOp::Jacobi(diag)
    }

    fn incomplete_cholesky(csr: &CsrMatrix<f64>) -> FEAResult<Self> {
        let lower: SparseRows = csr_rows(csr)
            .into_iter()
            .enumerate()
            .map(|(i, row)| row.into_iter().filter(|e| e.0 <= i).collect())
            .collect();

        for (i, row) in lower.iter().enumerate() {
            if row.last().map(|e| e.0) != Some(i) {
                return Err(FEAError::singular(format!(
                    "zero diagonal in row {}, incomplete Cholesky not possible",
                    i
                )));
            }
        }

        let scale = lower
            .iter()
            .filter_map(|r| r.last())
            .fold(0.0_f64, |m, e| m.max(e.1.abs()));

        // IC(0) can break down on matrices that are not M-matrices;
        // retry with a growing diagonal shift.
        let mut shift = 0.0;
        for _ in 0..8 {
            match ic0(&lower, shift) {
                Some(l) => {
                    if shift > 0.0 {
                        warn!("incomplete Cholesky needed a diagonal shift of {:.3e}", shift);
                    }
                    return Ok(PreconditionerOp::Cholesky(l));
                }
                None => shift = if shift == 0.0 { 1e-3 * scale } else { shift * 10.0 },
            }
        }
        Err(FEAError::singular(
            "incomplete Cholesky factorization broke down, matrix is not positive definite",
        ))
    }

    fn incomplete_lu(csr: &CsrMatrix<f64>) -> FEAResult<Self> {
        let mut rows = csr_rows(csr);
        let n = rows.len();
        let mut diag = Vec::with_capacity(n);
        for (i, row) in rows.iter().enumerate() {
            match row.binary_search_by_key(&i, |e| e.0) {
                Ok(p) if row[p].1 != 0.0 => diag.push(p),
                _ => {
                    return Err(FEAError::singular(format!(
                        "zero diagonal in row {}, incomplete LU not possible",
                        i
                    )))
                }
            }
        }

        for i in 1..n {
            let (done, rest) = rows.split_at_mut(i);
            let row = &mut rest[0];
            for p in 0..diag[i] {
                let k = row[p].0;
                let pivot = done[k][diag[k]].1;
                if pivot == 0.0 {
                    return Err(FEAError::singular(format!(
                        "zero pivot at row {} in incomplete LU",
                        k
                    )));
                }
                row[p].1 /= pivot;
                let lik = row[p].1;
                for q in (p + 1)..row.len() {
                    let j = row[q].0;
                    if let Ok(pos) = done[k].binary_search_by_key(&j, |e| e.0) {
                        row[q].1 -= lik * done[k][pos].1;
                    }
                }
            }
            if row[diag[i]].1 == 0.0 {
                return Err(FEAError::singular(format!(
                    "zero pivot at row {} in incomplete LU",
                    i
                )));
            }
        }

        Ok(PreconditionerOp::Lu { rows, diag })
    }

    /// z = M^-1 r
    pub fn apply(&self, r: &FEVec) -> FEVec {
        match self {
            PreconditionerOp::Identity => r.clone(),
            PreconditionerOp::Jacobi(d) => r.component_mul(d),
            PreconditionerOp::Cholesky(l) => {
                let y = lower_solve(l, r);
                lower_transpose_solve(l, y)
            }
            PreconditionerOp::Lu { rows, diag } => {
                let n = rows.len();
                // L y = r, unit diagonal
                let mut y = r.clone();
                for i in 0..n {
                    let s: f64 = rows[i][..diag[i]].iter().map(|&(k, v)| v * y[k]).sum();
                    y[i] -= s;
                }
                // U z = y
                for i in (0..n).rev() {
                    let s: f64 = rows[i][diag[i] + 1..].iter().map(|&(k, v)| v * y[k]).sum();
                    y[i] = (y[i] - s) / rows[i][diag[i]].1;
                }
                y
            }
        }
    }

    /// z = M^-T r
    pub fn apply_transpose(&self, r: &FEVec) -> FEVec {
        match self {
            PreconditionerOp::Lu { rows, diag } => {
                let n = rows.len();
                // U^T y = r
                let mut y = r.clone();
                for i in 0..n {
                    y[i] /= rows[i][diag[i]].1;
                    let yi = y[i];
                    for &(k, v) in &rows[i][diag[i] + 1..] {
                        y[k] -= v * yi;
                    }
                }
                // L^T z = y
                for i in (0..n).rev() {
                    let yi = y[i];
                    for &(k, v) in &rows[i][..diag[i]] {
                        y[k] -= v * yi;
                    }
                }
                y
            }
            _ => self.apply(r),
        }
    }
}

/// IC(0) on the lower-triangle pattern, `None` on a non-positive pivot
fn ic0(lower: &SparseRows, shift: f64) -> Option<SparseRows> {
    let mut l = lower.clone();
    for i in 0..l.len() {
        let (done, rest) = l.split_at_mut(i);
        let row = &mut rest[0];
        let last = row.len() - 1;
        if let Some(d) = row.last_mut() {
            d.1 += shift;
        }
        for p in 0..=last {
            let j = row[p].0;
            // sum of L_ik L_jk over the common pattern, k < j
            let mut s = 0.0;
            if j < i {
                let other = &done[j];
                let (mut a, mut b) = (0, 0);
                while a < p && b + 1 < other.len() {
                    match row[a].0.cmp(&other[b].0) {
                        std::cmp::Ordering::Less => a += 1,
                        std::cmp::Ordering::Greater => b += 1,
                        std::cmp::Ordering::Equal => {
                            s += row[a].1 * other[b].1;
                            a += 1;
                            b += 1;
                        }
                    }
                }
                let ljj = other[other.len() - 1].1;
                row[p].1 = (row[p].1 - s) / ljj;
            } else {
                s = row[..p].iter().map(|e| e.1 * e.1).sum();
                let d = row[p].1 - s;
                if d.is_nan() || d <= 0.0 {
                    return None;
                }
                row[p].1 = d.sqrt();
            }
        }
    }
    Some(l)
}

fn lower_solve(l: &SparseRows, r: &FEVec) -> FEVec {
    let mut y = r.clone();
    for (i, row) in l.iter().enumerate() {
        let last = row.len() - 1;
        let s: f64 = row[..last].iter().map(|&(k, v)| v * y[k]).sum();
        y[i] = (y[i] - s) / row[last].1;
    }
    y
}

fn lower_transpose_solve(l: &SparseRows, mut y: FEVec) -> FEVec {
    for i in (0..l.len()).rev() {
        let row = &l[i];
        let last = row.len() - 1;
        y[i] /= row[last].1;
        let yi = y[i];
        for &(k, v) in &row[..last] {
            y[k] -= v * yi;
        }
    }
    y
}
