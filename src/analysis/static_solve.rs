//! Linear static equilibrium
//!
//! DOFs are split into free (f) and prescribed (p) sets:
//!
//! ```text
//! K_ff u_f = F_f - K_fp u_p
//! R        = K u - F
//! ```

use log::{debug, info};

use crate::error::FEAResult;
use crate::loads::CombinedBoundary;
use crate::math::{expand, submatrix, subvector};
use crate::results::StaticResult;
use crate::solver::{SolveInfo, Solver};
use crate::system::StructuralSystem;

pub(crate) fn solve(
    system: &StructuralSystem,
    boundary: &CombinedBoundary,
    solver: &Solver,
) -> FEAResult<StaticResult> {
    let n = system.dofs();
    boundary.check_dofs(n)?;
    let k = system.stiffness();
    let free = boundary.free_dofs(n);
    let prescribed = boundary.prescribed_dofs();
    let f = boundary.load_vector(n);
    let u_p = boundary.prescribed_values(n);
    debug!(
        "static solve: {} free, {} prescribed DOFs",
        free.len(),
        prescribed.len()
    );

    let (u, info) = if free.is_empty() {
        let info = SolveInfo {
            solver: solver.name().to_string(),
            iterations: 0,
            residual: 0.0,
        };
        (u_p, info)
    } else {
        let k_ff = submatrix(k, &free, &free);
        let k_fp = submatrix(k, &free, &prescribed);
        let rhs = subvector(&f, &free) - k_fp * subvector(&u_p, &prescribed);
        let (u_f, info) = solver.solve(&k_ff, &rhs)?;
        (expand(&u_f, &free, &u_p), info)
    };

    let mut reactions = k * &u - &f;
    for &dof in &free {
        reactions[dof] = 0.0;
    }
    info!(
        "static solve with {} finished ({} iterations, residual {:.3e})",
        info.solver, info.iterations, info.residual
    );

    Ok(StaticResult {
        displacements: u,
        reactions,
        info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loads::{combine, BoundaryCase};
    use crate::math::Mat;
    use crate::solver::{DirectMethod, DirectSolver, StorageType};
    use approx::assert_relative_eq;

    #[rustfmt::skip]
    fn springs() -> Mat {
        // three springs k = 100 in series, DOF 0 at the wall
        Mat::from_row_slice(4, 4, &[
             100.0, -100.0,    0.0,    0.0,
            -100.0,  200.0, -100.0,    0.0,
               0.0, -100.0,  200.0, -100.0,
               0.0,    0.0, -100.0,  100.0,
        ])
    }

    fn solver() -> Solver {
        DirectSolver::new(DirectMethod::ActiveColumn, StorageType::UpperSymmetricBanded1D)
            .unwrap()
            .into()
    }

    #[test]
    fn test_tip_load_and_reaction() {
        let case = BoundaryCase::builder("Tip")
            .constraint(0)
            .nodal_load(3, 10.0)
            .build()
            .unwrap();
        let combined = combine(&[(&case, 1.0)]).unwrap();
        let system = StructuralSystem::new(springs()).unwrap();
        let result = solve(&system, &combined, &solver()).unwrap();

        assert_relative_eq!(result.displacements[3], 0.3, epsilon = 1e-12);
        assert_relative_eq!(result.displacements[1], 0.1, epsilon = 1e-12);
        assert_relative_eq!(result.reactions[0], -10.0, epsilon = 1e-10);
        assert_eq!(result.reactions[3], 0.0);
    }

    #[test]
    fn test_prescribed_displacement() {
        let case = BoundaryCase::builder("Settlement")
            .constraint(0)
            .displacement(3, 0.03)
            .build()
            .unwrap();
        let combined = combine(&[(&case, 1.0)]).unwrap();
        let system = StructuralSystem::new(springs()).unwrap();
        let result = solve(&system, &combined, &solver()).unwrap();

        assert_relative_eq!(result.displacements[1], 0.01, epsilon = 1e-12);
        assert_relative_eq!(result.displacements[2], 0.02, epsilon = 1e-12);
        assert_relative_eq!(result.reactions[3], 1.0, epsilon = 1e-10);
        assert_relative_eq!(result.reactions[0], -1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_dof_out_of_range() {
        let case = BoundaryCase::builder("Far")
            .constraint(0)
            .nodal_load(9, 1.0)
            .build()
            .unwrap();
        let combined = combine(&[(&case, 1.0)]).unwrap();
        let system = StructuralSystem::new(springs()).unwrap();
        assert!(solve(&system, &combined, &solver()).is_err());
    }
}
