//! Combination of scaled boundary cases

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use super::BoundaryCase;
use crate::error::{FEAError, FEAResult};
use crate::math::Vec as FEVec;

/// Superposition of several boundary cases, each scaled by its factor
///
/// Constraints are the union of all constrained DOFs and are never scaled.
/// A DOF with a prescribed displacement is always part of the constrained set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombinedBoundary {
    constraints: BTreeSet<usize>,
    displacements: BTreeMap<usize, f64>,
    nodal_loads: BTreeMap<usize, f64>,
    element_loads: BTreeMap<usize, f64>,
    thermal_loads: BTreeMap<usize, f64>,
    temperature_changes: BTreeMap<String, f64>,
    initial_displacements: BTreeMap<usize, f64>,
    initial_velocities: BTreeMap<usize, f64>,
}

/// Scale and superpose boundary cases
///
/// Case order does not affect the result. Two cases with the same name are
/// rejected since a case can only take part once in a combination.
pub fn combine(cases: &[(&BoundaryCase, f64)]) -> FEAResult<CombinedBoundary> {
    let mut seen = HashSet::new();
    let mut combined = CombinedBoundary::default();

    for &(case, scale) in cases {
        if !seen.insert(case.name()) {
            return Err(FEAError::incompatible(format!(
                "boundary case '{}' appears more than once",
                case.name()
            )));
        }
        if !scale.is_finite() {
            return Err(FEAError::invalid(format!(
                "scale for boundary case '{}' must be finite, got {}",
                case.name(),
                scale
            )));
        }

        combined.constraints.extend(case.constraints().iter().copied());

        for d in case.displacement_loads() {
            combined.constraints.insert(d.dof);
            *combined.displacements.entry(d.dof).or_insert(0.0) += scale * d.value;
        }
        for d in case.nodal_loads() {
            *combined.nodal_loads.entry(d.dof).or_insert(0.0) += scale * d.value;
        }
        for load in case.element_loads() {
            for d in &load.contributions {
                *combined.element_loads.entry(d.dof).or_insert(0.0) += scale * d.value;
            }
        }
        for load in case.temperature_loads() {
            let dt = scale * load.delta_t;
            *combined
                .temperature_changes
                .entry(load.element.clone())
                .or_insert(0.0) += dt;
            for d in &load.unit_contributions {
                *combined.thermal_loads.entry(d.dof).or_insert(0.0) += dt * d.value;
            }
        }
        for c in case.initial_conditions() {
            *combined.initial_displacements.entry(c.dof).or_insert(0.0) +=
                scale * c.displacement;
            *combined.initial_velocities.entry(c.dof).or_insert(0.0) += scale * c.velocity;
        }
    }

    Ok(combined)
}

fn scatter(values: &BTreeMap<usize, f64>, v: &mut FEVec) {
    for (&dof, &value) in values {
        v[dof] += value;
    }
}

impl CombinedBoundary {
    /// Constrained DOFs, including those with prescribed displacements
    pub fn constraints(&self) -> &BTreeSet<usize> {
        &self.constraints
    }

    /// Sorted list of prescribed (constrained) DOFs
    pub fn prescribed_dofs(&self) -> Vec<usize> {
        self.constraints.iter().copied().collect()
    }

    /// Sorted list of free DOFs of an `n`-DOF system
    pub fn free_dofs(&self, n: usize) -> Vec<usize> {
        (0..n).filter(|d| !self.constraints.contains(d)).collect()
    }

    /// Combined prescribed displacement values
    pub fn displacements(&self) -> &BTreeMap<usize, f64> {
        &self.displacements
    }

    /// Combined temperature change per element
    pub fn temperature_changes(&self) -> &BTreeMap<String, f64> {
        &self.temperature_changes
    }

    /// True when nothing is applied (constraints only)
    pub fn has_no_actions(&self) -> bool {
        self.displacements.values().all(|v| *v == 0.0)
            && self.nodal_loads.values().all(|v| *v == 0.0)
            && self.element_loads.values().all(|v| *v == 0.0)
            && self.thermal_loads.values().all(|v| *v == 0.0)
    }

    /// Full load vector: nodal, element and thermal contributions
    pub fn load_vector(&self, n: usize) -> FEVec {
        let mut f = FEVec::zeros(n);
        scatter(&self.nodal_loads, &mut f);
        scatter(&self.element_loads, &mut f);
        scatter(&self.thermal_loads, &mut f);
        f
    }

    /// Full vector of prescribed displacements (zero elsewhere)
    pub fn prescribed_values(&self, n: usize) -> FEVec {
        let mut u = FEVec::zeros(n);
        scatter(&self.displacements, &mut u);
        u
    }

    pub fn initial_displacement(&self, n: usize) -> FEVec {
        let mut u = FEVec::zeros(n);
        scatter(&self.initial_displacements, &mut u);
        u
    }

    pub fn initial_velocity(&self, n: usize) -> FEVec {
        let mut v = FEVec::zeros(n);
        scatter(&self.initial_velocities, &mut v);
        v
    }

    /// Check that every referenced DOF exists in an `n`-DOF system
    pub fn check_dofs(&self, n: usize) -> FEAResult<()> {
        let max = self
            .constraints
            .iter()
            .chain(self.nodal_loads.keys())
            .chain(self.element_loads.keys())
            .chain(self.thermal_loads.keys())
            .chain(self.initial_displacements.keys())
            .max();
        match max {
            Some(&dof) if dof >= n => Err(FEAError::incompatible(format!(
                "DOF {} referenced by a boundary case is outside the system ({} DOFs)",
                dof, n
            ))),
            _ => Ok(()),
        }
    }
}
