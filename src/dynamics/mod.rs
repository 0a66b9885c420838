//! Structural dynamics: damping, load histories and time integration

mod damping;
mod integration;
mod load_function;

pub use damping::{RayleighCoefficients, RayleighDamping};
pub use integration::{
    IntegrationMethod, IntegrationParameters, KinematicState, TimeIntegrator, WILSON_THETA_MIN,
};
pub use load_function::{LoadFunction, LoadFunctionDef};
