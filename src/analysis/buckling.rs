//! Linear (eigenvalue) buckling
//!
//! A static solve under the reference loads gives the displacement field
//! from which the caller's provider builds `K_G`. Critical load factors are
//! the positive eigenvalues of `K phi = lambda (-K_G) phi` on the free DOFs.

use log::info;

use super::{modal::expand_modes, static_solve};
use crate::error::{FEAError, FEAResult};
use crate::loads::CombinedBoundary;
use crate::math::submatrix;
use crate::results::BucklingResult;
use crate::solver::Solver;
use crate::system::StructuralSystem;

pub(crate) fn solve(
    system: &StructuralSystem,
    boundary: &CombinedBoundary,
    solver: &Solver,
) -> FEAResult<BucklingResult> {
    if boundary.has_no_actions() {
        return Err(FEAError::incompatible(
            "buckling analysis needs reference loads or displacements",
        ));
    }
    let n = system.dofs();
    let free = boundary.free_dofs(n);
    if free.is_empty() {
        return Err(FEAError::incompatible("every DOF is constrained"));
    }

    let reference = static_solve::solve(system, boundary, solver)?;
    let kg = system.geometric_stiffness(&reference.displacements)?;

    let k_ff = submatrix(system.stiffness(), &free, &free);
    let b = -submatrix(&kg, &free, &free);
    let eigen = solver.solve_eigen(&k_ff, &b)?;

    let mode_shapes = expand_modes(&eigen.vectors, &free, n);
    if let Some(lambda) = eigen.eigenvalues.first() {
        info!("buckling analysis: critical load factor {:.6}", lambda);
    }
    Ok(BucklingResult {
        load_factors: eigen.eigenvalues,
        mode_shapes,
        reference,
        info: eigen.info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::loads::{combine, BoundaryCase};
    use crate::math::{Mat, Vec as FEVec};
    use crate::solver::{DirectEigenSolver, EigenSettings, StorageType};
    use approx::assert_relative_eq;

    /// Two-bar column: axial DOFs 0..2, lateral DOF 3 at the joint.
    ///
    /// K_G scales with the compression in the bars, `N = EA * (u0 - u2) / L`.
    fn column() -> StructuralSystem {
        #[rustfmt::skip]
        let k = Mat::from_row_slice(4, 4, &[
             100.0, -100.0,    0.0,  0.0,
            -100.0,  200.0, -100.0,  0.0,
               0.0, -100.0,  100.0,  0.0,
               0.0,    0.0,    0.0, 50.0,
        ]);
        StructuralSystem::new(k)
            .unwrap()
            .with_geometric_stiffness(|u: &FEVec| -> FEAResult<Mat> {
                let shortening = u[2] - u[0];
                let compression = 100.0 * shortening / 2.0;
                let mut kg = Mat::zeros(4, 4);
                kg[(3, 3)] = -compression;
                Ok(kg)
            })
    }

    fn solver() -> Solver {
        DirectEigenSolver::new(EigenSettings::new(1, StorageType::UpperSymmetricPacked))
            .unwrap()
            .into()
    }

    #[test]
    fn test_critical_factor() {
        // compressive tip load 10 shortens the column by 0.2, N = 10
        let case = BoundaryCase::builder("Axial")
            .constraint(0)
            .nodal_load(2, 10.0)
            .build()
            .unwrap();
        let combined = combine(&[(&case, 1.0)]).unwrap();
        let result = solve(&column(), &combined, &solver()).unwrap();

        assert_relative_eq!(result.reference.displacements[2], 0.2, epsilon = 1e-12);
        assert_relative_eq!(result.critical_load_factor().unwrap(), 5.0, max_relative = 1e-10);
        assert!(result.mode_shapes[(3, 0)] > 0.0);
    }

    #[test]
    fn test_no_reference_load() {
        let case = BoundaryCase::builder("Supports").constraint(0).build().unwrap();
        let combined = combine(&[(&case, 1.0)]).unwrap();
        let err = solve(&column(), &combined, &solver()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompatibleConfiguration);
    }

    #[test]
    fn test_tension_has_no_buckling() {
        let case = BoundaryCase::builder("Pull")
            .constraint(0)
            .nodal_load(2, -10.0)
            .build()
            .unwrap();
        let combined = combine(&[(&case, 1.0)]).unwrap();
        assert!(solve(&column(), &combined, &solver()).is_err());
    }
}
