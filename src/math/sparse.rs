//! Sparse matrix utilities
//!
//! Assembled stiffness matrices are typically 95-99% sparse. The iterative
//! solvers work on CSR and only ever need products with `A` and `A^T`.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Build a CSR matrix from the non-zero entries of a dense matrix
pub fn csr_from_dense(a: &DMatrix<f64>) -> CsrMatrix<f64> {
    let mut coo = CooMatrix::new(a.nrows(), a.ncols());
    for i in 0..a.nrows() {
        for j in 0..a.ncols() {
            let v = a[(i, j)];
            if v != 0.0 {
                coo.push(i, j, v);
            }
        }
    }
    CsrMatrix::from(&coo)
}

/// Sparse matrix-vector multiplication
#[inline]
pub fn sparse_matvec(csr: &CsrMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    let n = csr.nrows();
    let mut y = DVector::zeros(n);

    let row_offsets = csr.row_offsets();
    let col_indices = csr.col_indices();
    let values = csr.values();

    for row in 0..n {
        let start = row_offsets[row];
        let end = row_offsets[row + 1];

        let mut sum = 0.0;
        for idx in start..end {
            sum += values[idx] * x[col_indices[idx]];
        }
        y[row] = sum;
    }

    y
}

/// Sparse transposed matrix-vector multiplication `y = A^T x`
#[inline]
pub fn sparse_transpose_matvec(csr: &CsrMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    let mut y = DVector::zeros(csr.ncols());

    let row_offsets = csr.row_offsets();
    let col_indices = csr.col_indices();
    let values = csr.values();

    for row in 0..csr.nrows() {
        let xr = x[row];
        if xr == 0.0 {
            continue;
        }
        for idx in row_offsets[row]..row_offsets[row + 1] {
            y[col_indices[idx]] += values[idx] * xr;
        }
    }

    y
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matvec_matches_dense() {
        let a = DMatrix::from_row_slice(3, 3, &[4.0, -1.0, 0.0, 2.0, 4.0, -1.0, 0.0, -1.0, 4.0]);
        let csr = csr_from_dense(&a);
        let x = DVector::from_vec(vec![1.0, 2.0, 3.0]);

        let y = sparse_matvec(&csr, &x);
        assert!((&y - &a * &x).norm() < 1e-12);

        let yt = sparse_transpose_matvec(&csr, &x);
        assert!((&yt - a.transpose() * &x).norm() < 1e-12);
    }
}
