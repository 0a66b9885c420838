//! Mathematical utilities shared by the solvers and the analysis procedures

pub mod sparse;

use nalgebra::{Cholesky, DMatrix, DVector, Dyn, Matrix3, Matrix6};

pub use sparse::{csr_from_dense, sparse_matvec, sparse_transpose_matvec};

pub type Mat = DMatrix<f64>;
pub type Vec = DVector<f64>;
pub type Mat3 = Matrix3<f64>;
pub type Mat6 = Matrix6<f64>;

/// Cholesky factor of a symmetric positive definite matrix
///
/// Unlike a bare `cholesky()`, pivots that are tiny relative to the largest
/// one are treated as failure, so singular matrices are not accepted
/// because of round-off.
pub fn cholesky_spd(a: &Mat) -> Option<Cholesky<f64, Dyn>> {
    a.clone().cholesky().filter(|chol| {
        let d = chol.l_dirty().diagonal();
        d.len() == 0 || d.min() > 1e-10 * d.max()
    })
}

/// Check that a square matrix is symmetric within a relative tolerance
pub fn is_symmetric(a: &Mat, rel_tol: f64) -> bool {
    if a.nrows() != a.ncols() {
        return false;
    }
    let scale = a.amax().max(f64::MIN_POSITIVE);
    for i in 0..a.nrows() {
        for j in (i + 1)..a.ncols() {
            if (a[(i, j)] - a[(j, i)]).abs() > rel_tol * scale {
                return false;
            }
        }
    }
    true
}

/// Extract the sub-matrix `a[rows, cols]`
pub fn submatrix(a: &Mat, rows: &[usize], cols: &[usize]) -> Mat {
    Mat::from_fn(rows.len(), cols.len(), |i, j| a[(rows[i], cols[j])])
}

/// Extract the sub-vector `v[idx]`
pub fn subvector(v: &Vec, idx: &[usize]) -> Vec {
    Vec::from_fn(idx.len(), |i, _| v[idx[i]])
}

/// Scatter a reduced vector back into a full-length vector
///
/// Entries not listed in `idx` are taken from `fill`.
pub fn expand(reduced: &Vec, idx: &[usize], fill: &Vec) -> Vec {
    let mut full = fill.clone();
    for (i, &di) in idx.iter().enumerate() {
        full[di] = reduced[i];
    }
    full
}

/// Half bandwidth of a square matrix (largest `j - i` with a non-zero `a[i][j]`)
pub fn half_bandwidth(a: &Mat) -> usize {
    let n = a.nrows();
    let mut bw = 0;
    for i in 0..n {
        for j in (i + 1)..n {
            if a[(i, j)] != 0.0 || a[(j, i)] != 0.0 {
                bw = bw.max(j - i);
            }
        }
    }
    bw
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_partition_round_trip() {
        let a = Mat::from_row_slice(3, 3, &[4.0, 1.0, 0.0, 1.0, 3.0, 2.0, 0.0, 2.0, 5.0]);
        let sub = submatrix(&a, &[0, 2], &[0, 2]);
        assert_relative_eq!(sub[(0, 0)], 4.0);
        assert_relative_eq!(sub[(1, 1)], 5.0);
        assert_relative_eq!(sub[(0, 1)], 0.0);

        let v = Vec::from_vec(vec![1.0, 2.0, 3.0]);
        let r = subvector(&v, &[2, 0]);
        let back = expand(&r, &[2, 0], &Vec::zeros(3));
        assert_relative_eq!(back[0], 1.0);
        assert_relative_eq!(back[1], 0.0);
        assert_relative_eq!(back[2], 3.0);
    }

    #[test]
    fn test_symmetry_and_bandwidth() {
        let a = Mat::from_row_slice(3, 3, &[4.0, 1.0, 0.0, 1.0, 3.0, 2.0, 0.0, 2.0, 5.0]);
        assert!(is_symmetric(&a, 1e-12));
        assert_eq!(half_bandwidth(&a), 1);

        let x = cholesky_spd(&a).unwrap().solve(&Vec::from_vec(vec![1.0, 2.0, 3.0]));
        let r = &a * &x - Vec::from_vec(vec![1.0, 2.0, 3.0]);
        assert!(r.norm() < 1e-12);

        let singular = Mat::from_row_slice(2, 2, &[1.0, -1.0, -1.0, 1.0]);
        assert!(cholesky_spd(&a).is_some());
        assert!(cholesky_spd(&singular).is_none());
    }
}
