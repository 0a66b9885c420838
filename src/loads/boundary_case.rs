//! Boundary cases
//!
//! A boundary case groups constraints, prescribed displacements, initial
//! conditions and mechanical/thermal loads under a common name. DOFs are
//! global equation indices handed over by the assembly layer; element loads
//! arrive already converted to equivalent nodal contributions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{FEAError, FEAResult};

/// A value attached to one global degree of freedom
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DofValue {
    pub dof: usize,
    pub value: f64,
}

impl DofValue {
    pub fn new(dof: usize, value: f64) -> Self {
        Self { dof, value }
    }
}

/// Initial displacement and velocity of one degree of freedom
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialCondition {
    pub dof: usize,
    pub displacement: f64,
    pub velocity: f64,
}

/// Mechanical load on an element, as equivalent nodal contributions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementLoad {
    /// Name of the loaded element
    pub element: String,
    /// Equivalent nodal loads
    pub contributions: Vec<DofValue>,
}

impl ElementLoad {
    pub fn new(element: &str, contributions: Vec<DofValue>) -> Self {
        Self {
            element: element.to_string(),
            contributions,
        }
    }
}

/// Temperature change of an element
///
/// `unit_contributions` are the equivalent nodal loads for a unit
/// temperature change; the applied load is `delta_t * unit_contributions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureLoad {
    pub element: String,
    pub delta_t: f64,
    pub unit_contributions: Vec<DofValue>,
}

impl TemperatureLoad {
    pub fn new(element: &str, delta_t: f64, unit_contributions: Vec<DofValue>) -> Self {
        Self {
            element: element.to_string(),
            delta_t,
            unit_contributions,
        }
    }
}

/// A validated, immutable boundary case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BoundaryCaseBuilder")]
pub struct BoundaryCase {
    name: String,
    description: Option<String>,
    constraints: BTreeSet<usize>,
    displacement_loads: Vec<DofValue>,
    initial_conditions: Vec<InitialCondition>,
    nodal_loads: Vec<DofValue>,
    element_loads: Vec<ElementLoad>,
    temperature_loads: Vec<TemperatureLoad>,
}

impl BoundaryCase {
    /// Start building a boundary case
    pub fn builder(name: &str) -> BoundaryCaseBuilder {
        BoundaryCaseBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn constraints(&self) -> &BTreeSet<usize> {
        &self.constraints
    }

    pub fn displacement_loads(&self) -> &[DofValue] {
        &self.displacement_loads
    }

    pub fn initial_conditions(&self) -> &[InitialCondition] {
        &self.initial_conditions
    }

    pub fn nodal_loads(&self) -> &[DofValue] {
        &self.nodal_loads
    }

    pub fn element_loads(&self) -> &[ElementLoad] {
        &self.element_loads
    }

    pub fn temperature_loads(&self) -> &[TemperatureLoad] {
        &self.temperature_loads
    }

    /// True when the case only restrains DOFs and applies nothing
    pub fn is_constraint_only(&self) -> bool {
        self.displacement_loads.is_empty()
            && self.initial_conditions.is_empty()
            && self.nodal_loads.is_empty()
            && self.element_loads.is_empty()
            && self.temperature_loads.is_empty()
    }

    /// Largest DOF index referenced by this case
    pub fn max_dof(&self) -> Option<usize> {
        let dofs = self
            .constraints
            .iter()
            .copied()
            .chain(self.displacement_loads.iter().map(|d| d.dof))
            .chain(self.initial_conditions.iter().map(|c| c.dof))
            .chain(self.nodal_loads.iter().map(|d| d.dof))
            .chain(
                self.element_loads
                    .iter()
                    .flat_map(|l| l.contributions.iter().map(|d| d.dof)),
            )
            .chain(
                self.temperature_loads
                    .iter()
                    .flat_map(|l| l.unit_contributions.iter().map(|d| d.dof)),
            );
        dofs.max()
    }
}

/// Collects boundary case contributions before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundaryCaseBuilder {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub constraints: BTreeSet<usize>,
    #[serde(default)]
    pub displacement_loads: Vec<DofValue>,
    #[serde(default)]
    pub initial_conditions: Vec<InitialCondition>,
    #[serde(default)]
    pub nodal_loads: Vec<DofValue>,
    #[serde(default)]
    pub element_loads: Vec<ElementLoad>,
    #[serde(default)]
    pub temperature_loads: Vec<TemperatureLoad>,
}

impl BoundaryCaseBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Restrain a DOF (prescribed zero displacement unless a displacement load is given)
    pub fn constraint(mut self, dof: usize) -> Self {
        self.constraints.insert(dof);
        self
    }

    /// Restrain several DOFs
    pub fn constraints(mut self, dofs: impl IntoIterator<Item = usize>) -> Self {
        self.constraints.extend(dofs);
        self
    }

    /// Prescribe a displacement value at a DOF
    pub fn displacement(mut self, dof: usize, value: f64) -> Self {
        self.displacement_loads.push(DofValue::new(dof, value));
        self
    }

    /// Initial displacement and velocity for transient analysis
    pub fn initial_condition(mut self, dof: usize, displacement: f64, velocity: f64) -> Self {
        self.initial_conditions.push(InitialCondition {
            dof,
            displacement,
            velocity,
        });
        self
    }

    /// Concentrated load at a DOF
    pub fn nodal_load(mut self, dof: usize, value: f64) -> Self {
        self.nodal_loads.push(DofValue::new(dof, value));
        self
    }

    pub fn element_load(mut self, load: ElementLoad) -> Self {
        self.element_loads.push(load);
        self
    }

    pub fn temperature_load(mut self, load: TemperatureLoad) -> Self {
        self.temperature_loads.push(load);
        self
    }

    /// Validate and freeze the boundary case
    pub fn build(self) -> FEAResult<BoundaryCase> {
        if self.name.trim().is_empty() {
            return Err(FEAError::invalid("boundary case name must not be empty"));
        }
        let name = &self.name;

        let check = |what: &str, v: f64| -> FEAResult<()> {
            if v.is_finite() {
                Ok(())
            } else {
                Err(FEAError::invalid(format!(
                    "boundary case '{}': {} must be finite, got {}",
                    name, what, v
                )))
            }
        };

        let mut prescribed = BTreeSet::new();
        for d in &self.displacement_loads {
            check("displacement load", d.value)?;
            if !prescribed.insert(d.dof) {
                return Err(FEAError::invalid(format!(
                    "boundary case '{}': DOF {} has more than one prescribed displacement",
                    name, d.dof
                )));
            }
        }

        let mut initial = BTreeSet::new();
        for c in &self.initial_conditions {
            check("initial displacement", c.displacement)?;
            check("initial velocity", c.velocity)?;
            if !initial.insert(c.dof) {
                return Err(FEAError::invalid(format!(
                    "boundary case '{}': DOF {} has more than one initial condition",
                    name, c.dof
                )));
            }
        }

        for d in &self.nodal_loads {
            check("nodal load", d.value)?;
        }
        for l in &self.element_loads {
            for d in &l.contributions {
                check("element load", d.value)?;
            }
        }
        for l in &self.temperature_loads {
            check("temperature change", l.delta_t)?;
            for d in &l.unit_contributions {
                check("thermal load", d.value)?;
            }
        }

        Ok(BoundaryCase {
            name: self.name,
            description: self.description,
            constraints: self.constraints,
            displacement_loads: self.displacement_loads,
            initial_conditions: self.initial_conditions,
            nodal_loads: self.nodal_loads,
            element_loads: self.element_loads,
            temperature_loads: self.temperature_loads,
        })
    }
}

impl TryFrom<BoundaryCaseBuilder> for BoundaryCase {
    type Error = FEAError;

    fn try_from(builder: BoundaryCaseBuilder) -> FEAResult<Self> {
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_boundary_case() {
        let case = BoundaryCase::builder("Supports")
            .constraints([0, 1, 2])
            .build()
            .unwrap();
        assert_eq!(case.name(), "Supports");
        assert!(case.is_constraint_only());
        assert_eq!(case.max_dof(), Some(2));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(BoundaryCase::builder("").build().is_err());
        assert!(BoundaryCase::builder("Dead")
            .nodal_load(3, f64::NAN)
            .build()
            .is_err());
        assert!(BoundaryCase::builder("Settlement")
            .displacement(1, 0.01)
            .displacement(1, 0.02)
            .build()
            .is_err());
    }

    #[test]
    fn test_max_dof_includes_element_loads() {
        let case = BoundaryCase::builder("Wind")
            .nodal_load(1, 5.0)
            .element_load(ElementLoad::new("B1", vec![DofValue::new(7, 1.0)]))
            .build()
            .unwrap();
        assert!(!case.is_constraint_only());
        assert_eq!(case.max_dof(), Some(7));
    }
}
