//! Generalized symmetric eigenproblems `K phi = lambda B phi`
//!
//! `K` is the positive definite side (stiffness). `B` is the mass matrix in
//! modal analysis or the negated geometric stiffness in buckling analysis,
//! where it may be indefinite. Only positive eigenvalues are physical and
//! the smallest ones are returned, in ascending order.
//!
//! Both methods work with `mu = 1 / lambda`, so an indefinite or
//! rank-deficient `B` only produces zero or negative `mu` that are dropped.

use nalgebra::SymmetricEigen;
use serde::{Deserialize, Serialize};

use crate::error::{FEAError, FEAResult};
use crate::math::{cholesky_spd, Mat, Vec as FEVec};

/// Relative size below which a reduced eigenvalue counts as zero
const RANK_TOL: f64 = 1e-12;

/// Eigen solution method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EigenMethod {
    /// Bathe's subspace iteration
    Subspace,
    /// Dense reduction to a standard symmetric problem
    Direct,
}

impl EigenMethod {
    pub fn name(self) -> &'static str {
        match self {
            EigenMethod::Subspace => "Subspace",
            EigenMethod::Direct => "DirectEigen",
        }
    }
}

/// Eigenvalues (ascending) and eigenvectors (columns)
#[derive(Debug, Clone)]
pub(crate) struct EigenPairs {
    pub values: Vec<f64>,
    pub vectors: Mat,
    pub iterations: usize,
    pub change: f64,
}

fn symmetrize(a: &Mat) -> Mat {
    (a + a.transpose()) * 0.5
}

fn symmetric_eigen(a: Mat, tolerance: f64, what: &str) -> FEAResult<SymmetricEigen<f64, nalgebra::Dyn>> {
    SymmetricEigen::try_new(a, tolerance.max(f64::EPSILON), 0).ok_or_else(|| {
        FEAError::SolverNonConvergence {
            solver: what.to_string(),
            iterations: 0,
            residual: f64::NAN,
        }
    })
}

/// Pairs sorted by descending `mu`, keeping only `mu > 0`
fn positive_descending(values: &FEVec) -> Vec<usize> {
    let scale = values.amax();
    let mut order: Vec<usize> = (0..values.len())
        .filter(|&i| values[i] > RANK_TOL * scale)
        .collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    order
}

/// Dense solution through the Cholesky factor of `K`
///
/// With `K = L L^T`, `C = L^-1 B L^-T` has eigenvalues `mu = 1 / lambda`
/// and eigenvectors `y = L^T phi`.
pub(crate) fn direct(k: &Mat, b: &Mat, count: usize, tolerance: f64) -> FEAResult<EigenPairs> {
    let chol = cholesky_spd(k)
        .ok_or_else(|| FEAError::singular("stiffness matrix is not positive definite"))?;
    let l = chol.l();
    let singular = || FEAError::singular("triangular solve failed in eigen reduction");

    let l_inv_b = l.solve_lower_triangular(b).ok_or_else(singular)?;
    let c = l
        .solve_lower_triangular(&l_inv_b.transpose())
        .ok_or_else(singular)?;
    let eig = symmetric_eigen(symmetrize(&c), tolerance, EigenMethod::Direct.name())?;

    let order: Vec<usize> = positive_descending(&eig.eigenvalues)
        .into_iter()
        .take(count)
        .collect();
    let mut vectors = Mat::zeros(k.nrows(), order.len());
    let mut values = Vec::with_capacity(order.len());
    for (col, &i) in order.iter().enumerate() {
        let phi = l
            .tr_solve_lower_triangular(&eig.eigenvectors.column(i).into_owned())
            .ok_or_else(singular)?;
        vectors.set_column(col, &phi);
        values.push(1.0 / eig.eigenvalues[i]);
    }

    Ok(EigenPairs {
        values,
        vectors,
        iterations: 1,
        change: 0.0,
    })
}

/// Solve the projected problem `Kr q = lambda Br q`
///
/// `Kr` is made orthonormal first, dropping directions in which it is
/// (numerically) singular. Returns `mu` in descending order and the matching
/// combination coefficients as columns.
fn projected(kr: &Mat, br: &Mat, tolerance: f64) -> FEAResult<(FEVec, Mat)> {
    let name = EigenMethod::Subspace.name();
    let ek = symmetric_eigen(symmetrize(kr), tolerance, name)?;
    let dmax = ek.eigenvalues.max();
    let keep: Vec<usize> = (0..ek.eigenvalues.len())
        .filter(|&i| ek.eigenvalues[i] > RANK_TOL * dmax)
        .collect();
    if keep.is_empty() {
        return Err(FEAError::singular("subspace collapsed to zero"));
    }

    let mut t = Mat::zeros(kr.nrows(), keep.len());
    for (col, &i) in keep.iter().enumerate() {
        t.set_column(col, &(ek.eigenvectors.column(i) / ek.eigenvalues[i].sqrt()));
    }
    let bt = t.transpose() * br * &t;
    let eb = symmetric_eigen(symmetrize(&bt), tolerance, name)?;

    let mut order: Vec<usize> = (0..eb.eigenvalues.len()).collect();
    order.sort_by(|&a, &b| eb.eigenvalues[b].total_cmp(&eb.eigenvalues[a]));
    let mu = FEVec::from_iterator(order.len(), order.iter().map(|&i| eb.eigenvalues[i]));
    let mut z = Mat::zeros(keep.len(), order.len());
    for (col, &i) in order.iter().enumerate() {
        z.set_column(col, &eb.eigenvectors.column(i));
    }
    Ok((mu, t * z))
}

/// Starting vectors: diag(B), unit vectors at the DOFs with the largest
/// |B_ii| / K_ii, and one deterministic mixed vector
fn starting_vectors(k: &Mat, b: &Mat, q: usize) -> Mat {
    let n = k.nrows();
    if q >= n {
        return Mat::identity(n, n);
    }
    let mut x = Mat::zeros(n, q);
    let diag_b: FEVec = b.diagonal().abs();
    if diag_b.amax() > 0.0 {
        x.set_column(0, &diag_b);
    } else {
        x.column_mut(0).fill(1.0);
    }

    let mut ratios: Vec<(usize, f64)> = (0..n)
        .map(|i| {
            let kii = k[(i, i)].abs().max(f64::MIN_POSITIVE);
            (i, diag_b[i] / kii)
        })
        .collect();
    ratios.sort_by(|a, b| b.1.total_cmp(&a.1));
    for (col, &(dof, _)) in (1..q.saturating_sub(1)).zip(ratios.iter()) {
        x[(dof, col)] = 1.0;
    }
    if q >= 2 {
        for i in 0..n {
            x[(i, q - 1)] = ((i as f64 + 1.0) * 0.618_033_988_75).fract() - 0.5;
        }
    }
    x
}

/// Subspace iteration
///
/// `solve_k` applies `K^-1` to a vector using a factorization of `K`.
pub(crate) fn subspace<F>(
    k: &Mat,
    b: &Mat,
    count: usize,
    tolerance: f64,
    max_iterations: usize,
    solve_k: F,
) -> FEAResult<EigenPairs>
where
    F: Fn(&FEVec) -> FEAResult<FEVec>,
{
    let n = k.nrows();
    let q = (2 * count).max(count + 8).min(n);
    let mut x = starting_vectors(k, b, q);
    let mut previous: Option<Vec<f64>> = None;
    let mut change = f64::INFINITY;

    for iter in 1..=max_iterations {
        let y = b * &x;
        let mut x_bar = Mat::zeros(n, y.ncols());
        for j in 0..y.ncols() {
            x_bar.set_column(j, &solve_k(&y.column(j).into_owned())?);
        }
        let kr = x_bar.transpose() * &y;
        let br = x_bar.transpose() * (b * &x_bar);
        let (mu, coeffs) = projected(&kr, &br, tolerance)?;
        x = &x_bar * coeffs;

        let positive = positive_descending(&mu);
        let lambdas: Vec<f64> = positive.iter().take(count).map(|&i| 1.0 / mu[i]).collect();

        if let Some(prev) = &previous {
            if prev.len() == lambdas.len() {
                change = lambdas
                    .iter()
                    .zip(prev)
                    .map(|(l, p)| ((l - p) / l).abs())
                    .fold(0.0, f64::max);
                if change <= tolerance {
                    let mut vectors = Mat::zeros(n, lambdas.len());
                    for (col, &i) in positive.iter().take(count).enumerate() {
                        vectors.set_column(col, &x.column(i));
                    }
                    return Ok(EigenPairs {
                        values: lambdas,
                        vectors,
                        iterations: iter,
                        change,
                    });
                }
            }
        }
        previous = Some(lambdas);
    }

    Err(FEAError::SolverNonConvergence {
        solver: EigenMethod::Subspace.name().to_string(),
        iterations: max_iterations,
        residual: change,
    })
}

/// Scale modes to `phi^T B phi = 1` where that is positive, otherwise to a
/// unit largest component; the largest component is made positive
pub(crate) fn normalize_modes(vectors: &mut Mat, b: &Mat) {
    for mut col in vectors.column_iter_mut() {
        let phi = col.clone_owned();
        let bnorm = phi.dot(&(b * &phi));
        let imax = phi.iamax();
        let sign = if phi[imax] < 0.0 { -1.0 } else { 1.0 };
        let scale = if bnorm > 0.0 {
            bnorm.sqrt()
        } else {
            phi[imax].abs().max(f64::MIN_POSITIVE)
        };
        col *= sign / scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Chain of `n` unit masses on springs of stiffness k, fixed at one end
    fn spring_chain(n: usize, k: f64) -> (Mat, Mat) {
        let mut kk = Mat::zeros(n, n);
        for i in 0..n {
            kk[(i, i)] = if i + 1 < n { 2.0 * k } else { k };
            if i + 1 < n {
                kk[(i, i + 1)] = -k;
                kk[(i + 1, i)] = -k;
            }
        }
        (kk, Mat::identity(n, n))
    }

    /// Exact eigenvalues of the fixed-free chain
    fn exact(n: usize, k: f64, i: usize) -> f64 {
        let angle = (2 * i + 1) as f64 * std::f64::consts::PI / (2.0 * (2 * n + 1) as f64);
        4.0 * k * angle.sin().powi(2)
    }

    #[test]
    fn test_direct_matches_closed_form() {
        let (k, m) = spring_chain(6, 100.0);
        let pairs = direct(&k, &m, 3, 1e-14).unwrap();
        for i in 0..3 {
            assert_relative_eq!(pairs.values[i], exact(6, 100.0, i), max_relative = 1e-10);
        }
    }

    #[test]
    fn test_subspace_matches_direct() {
        let (k, m) = spring_chain(30, 50.0);
        let chol = cholesky_spd(&k).unwrap();
        let pairs = subspace(&k, &m, 4, 1e-10, 200, |v| Ok(chol.solve(v))).unwrap();
        let reference = direct(&k, &m, 4, 1e-14).unwrap();
        assert_eq!(pairs.values.len(), 4);
        for i in 0..4 {
            assert_relative_eq!(pairs.values[i], reference.values[i], max_relative = 1e-8);
        }
    }

    #[test]
    fn test_indefinite_b_keeps_positive_eigenvalues() {
        let k = Mat::from_diagonal(&FEVec::from_vec(vec![2.0, 3.0, 4.0]));
        let b = Mat::from_diagonal(&FEVec::from_vec(vec![1.0, -1.0, 0.5]));
        let pairs = direct(&k, &b, 3, 1e-14).unwrap();
        assert_eq!(pairs.values.len(), 2);
        assert_relative_eq!(pairs.values[0], 2.0, max_relative = 1e-12);
        assert_relative_eq!(pairs.values[1], 8.0, max_relative = 1e-12);
    }

    #[test]
    fn test_mass_normalization() {
        let (k, m) = spring_chain(4, 10.0);
        let m = m * 2.0;
        let mut pairs = direct(&k, &m, 2, 1e-14).unwrap();
        normalize_modes(&mut pairs.vectors, &m);
        for col in pairs.vectors.column_iter() {
            let phi = col.clone_owned();
            assert_relative_eq!(phi.dot(&(&m * &phi)), 1.0, max_relative = 1e-10);
            assert!(phi[phi.iamax()] > 0.0);
        }
    }
}
