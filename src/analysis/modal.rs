//! Free vibration: `K phi = omega^2 M phi` on the free DOFs

use log::{debug, info};

use crate::error::{FEAError, FEAResult};
use crate::loads::CombinedBoundary;
use crate::math::{submatrix, Mat};
use crate::results::ModalResult;
use crate::solver::Solver;
use crate::system::StructuralSystem;

pub(crate) fn solve(
    system: &StructuralSystem,
    boundary: &CombinedBoundary,
    solver: &Solver,
) -> FEAResult<ModalResult> {
    let n = system.dofs();
    boundary.check_dofs(n)?;
    let mass = system.require_mass("Modal")?;
    let free = boundary.free_dofs(n);
    if free.is_empty() {
        return Err(FEAError::incompatible("every DOF is constrained"));
    }
    if !boundary.has_no_actions() {
        debug!("modal analysis ignores the loads of its boundary cases");
    }

    let k_ff = submatrix(system.stiffness(), &free, &free);
    let m_ff = submatrix(mass, &free, &free);
    let eigen = solver.solve_eigen(&k_ff, &m_ff)?;

    let modes = expand_modes(&eigen.vectors, &free, n);
    let result = ModalResult::new(eigen.eigenvalues, modes, eigen.info);
    if let Some(f) = result.frequencies.first() {
        info!(
            "modal analysis found {} modes, fundamental frequency {:.4} Hz",
            result.num_modes(),
            f
        );
    }
    Ok(result)
}

/// Scatter reduced mode shapes back to all `n` DOFs
pub(crate) fn expand_modes(reduced: &Mat, free: &[usize], n: usize) -> Mat {
    let mut full = Mat::zeros(n, reduced.ncols());
    for (i, &dof) in free.iter().enumerate() {
        full.row_mut(dof).copy_from(&reduced.row(i));
    }
    full
}
