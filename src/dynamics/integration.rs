//! Direct time integration of M*a + C*v + K*u = R(t)
//!
//! Both schemes are implicit and use the constants of Bathe's
//! step-by-step tables. The effective stiffness is formed and handed to the
//! bound linear solver once; every step is one solve with a new right-hand
//! side.

use std::cell::Cell;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::error::{FEAError, FEAResult};
use crate::math::{cholesky_spd, Mat, Vec as FEVec};
use crate::solver::{PreparedSolver, Solver};

/// Smallest Wilson theta for which the scheme is unconditionally stable
pub const WILSON_THETA_MIN: f64 = 1.37;

/// Implicit integration scheme and its parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IntegrationParameters")]
pub enum IntegrationMethod {
    /// Newmark-beta (beta, gamma); labelled "Alpha"/"Delta" in some tools
    Newmark { beta: f64, gamma: f64 },
    /// Wilson-theta
    Wilson { theta: f64 },
}

/// Serialized form of [`IntegrationMethod`], checked on conversion
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum IntegrationParameters {
    Newmark { beta: f64, gamma: f64 },
    Wilson { theta: f64 },
}

impl IntegrationMethod {
    /// Newmark scheme, valid for gamma >= 0.5 and beta >= 0.25 (0.5 + gamma)^2
    pub fn newmark(beta: f64, gamma: f64) -> FEAResult<Self> {
        let method = IntegrationMethod::Newmark { beta, gamma };
        method.validate()?;
        Ok(method)
    }

    /// Wilson scheme, valid for theta >= 1.37
    pub fn wilson(theta: f64) -> FEAResult<Self> {
        let method = IntegrationMethod::Wilson { theta };
        method.validate()?;
        Ok(method)
    }

    /// Constant average acceleration (beta = 1/4, gamma = 1/2)
    pub fn average_acceleration() -> Self {
        IntegrationMethod::Newmark {
            beta: 0.25,
            gamma: 0.5,
        }
    }

    pub fn validate(&self) -> FEAResult<()> {
        match *self {
            IntegrationMethod::Newmark { beta, gamma } => {
                if !(beta.is_finite() && gamma.is_finite()) {
                    return Err(FEAError::invalid("Newmark parameters must be finite"));
                }
                if gamma < 0.5 {
                    return Err(FEAError::invalid(format!(
                        "Newmark gamma must be >= 0.5, got {}",
                        gamma
                    )));
                }
                let beta_min = 0.25 * (0.5 + gamma).powi(2);
                if beta < beta_min {
                    return Err(FEAError::invalid(format!(
                        "Newmark beta must be >= {} for gamma = {}, got {}",
                        beta_min, gamma, beta
                    )));
                }
            }
            IntegrationMethod::Wilson { theta } => {
                if !(theta.is_finite() && theta >= WILSON_THETA_MIN) {
                    return Err(FEAError::invalid(format!(
                        "Wilson theta must be >= {}, got {}",
                        WILSON_THETA_MIN, theta
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &'static str {
        match self {
            IntegrationMethod::Newmark { .. } => "Newmark",
            IntegrationMethod::Wilson { .. } => "Wilson",
        }
    }
}

impl Default for IntegrationMethod {
    fn default() -> Self {
        Self::average_acceleration()
    }
}

impl TryFrom<IntegrationParameters> for IntegrationMethod {
    type Error = FEAError;

    fn try_from(p: IntegrationParameters) -> FEAResult<Self> {
        match p {
            IntegrationParameters::Newmark { beta, gamma } => Self::newmark(beta, gamma),
            IntegrationParameters::Wilson { theta } => Self::wilson(theta),
        }
    }
}

/// Displacement, velocity and acceleration at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct KinematicState {
    pub displacement: FEVec,
    pub velocity: FEVec,
    pub acceleration: FEVec,
}

#[derive(Debug, Clone, Copy)]
enum Constants {
    Newmark([f64; 8]),
    Wilson { theta: f64, a: [f64; 9] },
}

impl Constants {
    fn new(method: IntegrationMethod, dt: f64) -> Self {
        match method {
            IntegrationMethod::Newmark { beta, gamma } => Constants::Newmark([
                1.0 / (beta * dt * dt),
                gamma / (beta * dt),
                1.0 / (beta * dt),
                1.0 / (2.0 * beta) - 1.0,
                gamma / beta - 1.0,
                dt / 2.0 * (gamma / beta - 2.0),
                dt * (1.0 - gamma),
                gamma * dt,
            ]),
            IntegrationMethod::Wilson { theta } => {
                let a0 = 6.0 / (theta * dt).powi(2);
                let a1 = 3.0 / (theta * dt);
                let a2 = 2.0 * a1;
                Constants::Wilson {
                    theta,
                    a: [
                        a0,
                        a1,
                        a2,
                        theta * dt / 2.0,
                        a0 / theta,
                        -a2 / theta,
                        1.0 - 3.0 / theta,
                        dt / 2.0,
                        dt * dt / 6.0,
                    ],
                }
            }
        }
    }

    /// Multipliers of M and C in the effective stiffness
    fn effective(&self) -> (f64, f64) {
        match self {
            Constants::Newmark(a) => (a[0], a[1]),
            Constants::Wilson { a, .. } => (a[0], a[1]),
        }
    }
}

/// Steps a linear system through time with a fixed increment
pub struct TimeIntegrator {
    method: IntegrationMethod,
    dt: f64,
    constants: Constants,
    stiffness: Mat,
    mass: Mat,
    damping: Mat,
    effective: PreparedSolver,
    iterations: Cell<usize>,
}

impl TimeIntegrator {
    /// Form and factor the effective stiffness with `solver`
    pub fn new(
        method: IntegrationMethod,
        dt: f64,
        stiffness: Mat,
        mass: Mat,
        damping: Mat,
        solver: &Solver,
    ) -> FEAResult<Self> {
        method.validate()?;
        if !(dt.is_finite() && dt > 0.0) {
            return Err(FEAError::invalid(format!(
                "time step must be positive, got {}",
                dt
            )));
        }
        let n = stiffness.nrows();
        for (name, m) in [("mass", &mass), ("damping", &damping)] {
            if m.nrows() != n || m.ncols() != n {
                return Err(FEAError::incompatible(format!(
                    "{} matrix is {}x{}, stiffness is {}x{}",
                    name,
                    m.nrows(),
                    m.ncols(),
                    n,
                    n
                )));
            }
        }

        let constants = Constants::new(method, dt);
        let (cm, cc) = constants.effective();
        let k_hat = &stiffness + &mass * cm + &damping * cc;
        debug!(
            "{} integrator: dt = {}, {} equations, effective stiffness factored with {}",
            method.name(),
            dt,
            n,
            solver.name()
        );
        let effective = solver.prepare(&k_hat)?;

        Ok(Self {
            method,
            dt,
            constants,
            stiffness,
            mass,
            damping,
            effective,
            iterations: Cell::new(0),
        })
    }

    pub fn method(&self) -> IntegrationMethod {
        self.method
    }

    pub fn time_step(&self) -> f64 {
        self.dt
    }

    /// Solver iterations used by all steps so far
    pub fn iterations(&self) -> usize {
        self.iterations.get()
    }

    /// State at t = 0 with the acceleration that satisfies equilibrium
    ///
    /// M a0 = R0 - C v0 - K u0
    pub fn initial_state(&self, u0: FEVec, v0: FEVec, r0: &FEVec) -> FEAResult<KinematicState> {
        let rhs = r0 - &self.damping * &v0 - &self.stiffness * &u0;
        let a0 = cholesky_spd(&self.mass)
            .map(|chol| chol.solve(&rhs))
            .ok_or_else(|| {
                FEAError::singular("mass matrix is not positive definite, cannot find initial acceleration")
            })?;
        Ok(KinematicState {
            displacement: u0,
            velocity: v0,
            acceleration: a0,
        })
    }

    /// Advance one time step
    ///
    /// `r_t` and `r_next` are the external loads at `t` and `t + dt`.
    pub fn step(
        &self,
        state: &KinematicState,
        r_t: &FEVec,
        r_next: &FEVec,
    ) -> FEAResult<KinematicState> {
        let u = &state.displacement;
        let v = &state.velocity;
        let acc = &state.acceleration;

        match self.constants {
            Constants::Newmark(a) => {
                let rhs = r_next
                    + &self.mass * (u * a[0] + v * a[2] + acc * a[3])
                    + &self.damping * (u * a[1] + v * a[4] + acc * a[5]);
                let (u_next, info) = self.effective.solve(&rhs)?;
                trace!("Newmark step solved in {} iterations", info.iterations);
                self.iterations.set(self.iterations.get() + info.iterations);

                let a_next = (&u_next - u) * a[0] - v * a[2] - acc * a[3];
                let v_next = v + acc * a[6] + &a_next * a[7];
                Ok(KinematicState {
                    displacement: u_next,
                    velocity: v_next,
                    acceleration: a_next,
                })
            }
            Constants::Wilson { theta, a } => {
                let r_theta = r_t + (r_next - r_t) * theta;
                let rhs = r_theta
                    + &self.mass * (u * a[0] + v * a[2] + acc * 2.0)
                    + &self.damping * (u * a[1] + v * 2.0 + acc * a[3]);
                let (u_theta, info) = self.effective.solve(&rhs)?;
                trace!("Wilson step solved in {} iterations", info.iterations);
                self.iterations.set(self.iterations.get() + info.iterations);

                let a_next = (&u_theta - u) * a[4] + v * a[5] + acc * a[6];
                let v_next = v + (&a_next + acc) * a[7];
                let u_next = u + v * self.dt + (&a_next + acc * 2.0) * a[8];
                Ok(KinematicState {
                    displacement: u_next,
                    velocity: v_next,
                    acceleration: a_next,
                })
            }
        }
    }
}
