//! Linear transient response by direct time integration
//!
//! Loads and prescribed displacements share the load function: prescribed
//! DOFs follow `f(t) u_p`, and the free equations see
//!
//! ```text
//! R(t) = f(t) (F_f - K_fp u_p) - f'(t) C_fp u_p - f''(t) M_fp u_p
//! ```

use log::{debug, info};

use super::TransientSettings;
use crate::dynamics::{KinematicState, TimeIntegrator};
use crate::error::{FEAError, FEAResult};
use crate::loads::CombinedBoundary;
use crate::math::{expand, submatrix, subvector};
use crate::results::TransientResult;
use crate::solver::Solver;
use crate::system::StructuralSystem;

pub(crate) fn solve(
    system: &StructuralSystem,
    boundary: &CombinedBoundary,
    solver: &Solver,
    settings: &TransientSettings,
) -> FEAResult<TransientResult> {
    let n = system.dofs();
    boundary.check_dofs(n)?;
    let mass = system.require_mass("Transient")?;
    let k = system.stiffness();
    let free = boundary.free_dofs(n);
    let prescribed = boundary.prescribed_dofs();
    if free.is_empty() {
        return Err(FEAError::incompatible("every DOF is constrained"));
    }

    let damping = settings.damping().matrix(mass, k);
    let u_p = boundary.prescribed_values(n);
    let u_p_reduced = subvector(&u_p, &prescribed);
    let static_part = subvector(&boundary.load_vector(n), &free)
        - submatrix(k, &free, &prescribed) * &u_p_reduced;
    let damping_part = submatrix(&damping, &free, &prescribed) * &u_p_reduced;
    let inertia_part = submatrix(mass, &free, &prescribed) * &u_p_reduced;

    let dt = settings.time_step();
    let steps = settings.steps();
    let function = settings.load_function();
    debug!(
        "transient: {} steps of {} with {} on {} free DOFs",
        steps,
        dt,
        settings.method().name(),
        free.len()
    );
    let load_at = |t: f64| {
        let (f, rate, accel) = function.sample_motion(t);
        &static_part * f - &damping_part * rate - &inertia_part * accel
    };

    let integrator = TimeIntegrator::new(
        settings.method(),
        dt,
        submatrix(k, &free, &free),
        submatrix(mass, &free, &free),
        submatrix(&damping, &free, &free),
        solver,
    )?;

    let u0 = subvector(&boundary.initial_displacement(n), &free);
    let v0 = subvector(&boundary.initial_velocity(n), &free);
    let mut r_t = load_at(0.0);
    let mut state = integrator.initial_state(u0, v0, &r_t)?;

    let mut result = TransientResult {
        times: Vec::with_capacity(steps + 1),
        displacements: Vec::with_capacity(steps + 1),
        velocities: Vec::with_capacity(steps + 1),
        accelerations: Vec::with_capacity(steps + 1),
        solver_iterations: 0,
    };
    let mut record = |t: f64, state: &KinematicState| {
        let (f, rate, accel) = function.sample_motion(t);
        result.times.push(t);
        result
            .displacements
            .push(expand(&state.displacement, &free, &(&u_p * f)));
        result
            .velocities
            .push(expand(&state.velocity, &free, &(&u_p * rate)));
        result
            .accelerations
            .push(expand(&state.acceleration, &free, &(&u_p * accel)));
    };
    record(0.0, &state);

    for step in 1..=steps {
        let t = step as f64 * dt;
        let r_next = load_at(t);
        state = integrator.step(&state, &r_t, &r_next)?;
        record(t, &state);
        r_t = r_next;
    }

    result.solver_iterations = integrator.iterations();
    info!(
        "transient analysis finished: {} steps, {} solver iterations",
        steps, result.solver_iterations
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::{IntegrationMethod, LoadFunction, RayleighDamping};
    use crate::loads::{combine, BoundaryCase};
    use crate::math::Mat;
    use crate::solver::{DirectMethod, DirectSolver, StorageType};
    use approx::assert_relative_eq;

    fn oscillator() -> StructuralSystem {
        // ground DOF 0, single mass on DOF 1: k = 4 pi^2, m = 1, T = 1 s
        let k = 4.0 * std::f64::consts::PI.powi(2);
        let stiffness = Mat::from_row_slice(2, 2, &[k, -k, -k, k]);
        StructuralSystem::new(stiffness)
            .unwrap()
            .with_mass(Mat::identity(2, 2))
            .unwrap()
    }

    fn solver() -> Solver {
        DirectSolver::new(DirectMethod::GaussSymmetric, StorageType::UpperSymmetricBanded2D)
            .unwrap()
            .into()
    }

    #[test]
    fn test_step_load_overshoot() {
        let case = BoundaryCase::builder("Step")
            .constraint(0)
            .nodal_load(1, 4.0 * std::f64::consts::PI.powi(2))
            .build()
            .unwrap();
        let combined = combine(&[(&case, 1.0)]).unwrap();
        let settings = TransientSettings::new(
            100,
            0.005,
            LoadFunction::constant(1.0).unwrap(),
            RayleighDamping::undamped(),
            IntegrationMethod::average_acceleration(),
        )
        .unwrap();
        let result = solve(&oscillator(), &combined, &solver(), &settings).unwrap();

        // static deflection 1, suddenly applied: peak 2 at t = T/2
        assert_eq!(result.times.len(), 101);
        let (t, peak) = result.peak_displacement(1).unwrap();
        assert_relative_eq!(peak, 2.0, epsilon = 2e-3);
        assert_relative_eq!(t, 0.5, epsilon = 0.01);
        assert!(result.displacement_history(0).iter().all(|u| *u == 0.0));
    }

    #[test]
    fn test_initial_displacement_free_vibration() {
        let case = BoundaryCase::builder("Pluck")
            .constraint(0)
            .initial_condition(1, 0.1, 0.0)
            .build()
            .unwrap();
        let combined = combine(&[(&case, 1.0)]).unwrap();
        let settings = TransientSettings::new(
            200,
            0.005,
            LoadFunction::constant(0.0).unwrap(),
            RayleighDamping::undamped(),
            IntegrationMethod::wilson(1.4).unwrap(),
        )
        .unwrap();
        let result = solve(&oscillator(), &combined, &solver(), &settings).unwrap();

        let u = result.displacement_history(1);
        assert_eq!(u[0], 0.1);
        // one full period later the mass is back near its start
        assert_relative_eq!(u[200], 0.1, epsilon = 5e-3);
        assert_relative_eq!(u[100], -0.1, epsilon = 5e-3);
    }

    #[test]
    fn test_support_translation_with_stiffness_damping() {
        // ground DOF 0 moves as u_g = t, the mass on DOF 1 follows it
        let stiffness = Mat::from_row_slice(2, 2, &[100.0, -100.0, -100.0, 100.0]);
        let system = StructuralSystem::new(stiffness)
            .unwrap()
            .with_mass(Mat::identity(2, 2))
            .unwrap();
        let case = BoundaryCase::builder("Drift")
            .displacement(0, 1.0)
            .build()
            .unwrap();
        let combined = combine(&[(&case, 1.0)]).unwrap();
        let settings = TransientSettings::new(
            2000,
            0.01,
            LoadFunction::table(vec![(0.0, 0.0), (20.0, 20.0)]).unwrap(),
            RayleighDamping::new(0.0, 0.5).unwrap(),
            IntegrationMethod::average_acceleration(),
        )
        .unwrap();
        let result = solve(&system, &combined, &solver(), &settings).unwrap();

        let support = result.displacement_history(0);
        let mass = result.displacement_history(1);
        assert_relative_eq!(support[2000], 20.0, epsilon = 1e-9);
        // the damping force beta0 K_fp u_g' is part of the load, so no lag remains
        assert_relative_eq!(mass[2000], 20.0, epsilon = 1e-6);
        assert_relative_eq!(result.velocity_history(0)[2000], 1.0, epsilon = 1e-12);
        assert_relative_eq!(result.velocity_history(1)[2000], 1.0, epsilon = 1e-6);
        assert_relative_eq!(result.acceleration_history(0)[1000], 0.0);
    }

    #[test]
    fn test_support_motion_through_consistent_mass() {
        // no elastic coupling; the support drives the mass only through M_fp
        let stiffness = Mat::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 100.0]);
        let mass = Mat::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 1.0]);
        let system = StructuralSystem::new(stiffness).unwrap().with_mass(mass).unwrap();
        let case = BoundaryCase::builder("Shake")
            .displacement(0, 1.0)
            .build()
            .unwrap();
        let combined = combine(&[(&case, 1.0)]).unwrap();
        let omega = 2.0;
        let settings = TransientSettings::new(
            1000,
            0.001,
            LoadFunction::harmonic(1.0, omega, 0.0).unwrap(),
            RayleighDamping::undamped(),
            IntegrationMethod::average_acceleration(),
        )
        .unwrap();
        let result = solve(&system, &combined, &solver(), &settings).unwrap();

        // u'' + 100 u = 0.5 omega^2 sin(omega t), starting at rest
        let b = 0.5 * omega * omega / (100.0 - omega * omega);
        let exact = |t: f64| b * ((omega * t).sin() - omega / 10.0 * (10.0 * t).sin());
        let u = result.displacement_history(1);
        for step in [250, 500, 1000] {
            assert_relative_eq!(u[step], exact(step as f64 * 0.001), epsilon = 1e-4);
        }
        assert_relative_eq!(
            result.acceleration_history(0)[500],
            -omega * omega * (omega * 0.5).sin(),
            max_relative = 1e-12
        );
    }
}
