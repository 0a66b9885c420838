//! Boundary cases and their scaled combination

mod boundary_case;
mod combination;

pub use boundary_case::{
    BoundaryCase, BoundaryCaseBuilder, DofValue, ElementLoad, InitialCondition, TemperatureLoad,
};
pub use combination::{combine, CombinedBoundary};
