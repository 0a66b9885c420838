//! Result types for solved analyses
//!
//! All vectors are full length (one entry per global DOF); constrained DOFs
//! carry their prescribed values, or zero.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisType;
use crate::error::ErrorKind;
use crate::math::{Mat, Vec as FEVec};
use crate::solver::SolveInfo;

/// Linear static response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticResult {
    pub displacements: FEVec,
    /// `K u - F`, non-zero only at constrained DOFs
    pub reactions: FEVec,
    pub info: SolveInfo,
}

impl StaticResult {
    /// Largest absolute displacement and its DOF
    pub fn max_displacement(&self) -> Option<(usize, f64)> {
        max_abs(&self.displacements)
    }

    /// Sum of all reactions
    pub fn total_reaction(&self) -> f64 {
        self.reactions.sum()
    }
}

/// Natural frequencies and mass-normalised mode shapes, lowest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModalResult {
    /// Eigenvalues `omega^2`
    pub eigenvalues: Vec<f64>,
    /// Circular frequencies in rad/s
    pub angular_frequencies: Vec<f64>,
    /// Cyclic frequencies in Hz
    pub frequencies: Vec<f64>,
    /// One mode per column
    pub mode_shapes: Mat,
    pub info: SolveInfo,
}

impl ModalResult {
    pub(crate) fn new(eigenvalues: Vec<f64>, mode_shapes: Mat, info: SolveInfo) -> Self {
        let angular_frequencies: Vec<f64> = eigenvalues.iter().map(|l| l.sqrt()).collect();
        let frequencies = angular_frequencies.iter().map(|w| w / (2.0 * PI)).collect();
        Self {
            eigenvalues,
            angular_frequencies,
            frequencies,
            mode_shapes,
            info,
        }
    }

    pub fn num_modes(&self) -> usize {
        self.eigenvalues.len()
    }

    /// Periods in seconds
    pub fn periods(&self) -> Vec<f64> {
        self.frequencies.iter().map(|f| 1.0 / f).collect()
    }

    pub fn mode(&self, index: usize) -> Option<FEVec> {
        (index < self.num_modes()).then(|| self.mode_shapes.column(index).into_owned())
    }
}

/// Time histories of a transient analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransientResult {
    /// `0, dt, ..., n dt`
    pub times: Vec<f64>,
    pub displacements: Vec<FEVec>,
    pub velocities: Vec<FEVec>,
    pub accelerations: Vec<FEVec>,
    /// Iterations summed over all step solves
    pub solver_iterations: usize,
}

impl TransientResult {
    pub fn num_steps(&self) -> usize {
        self.times.len().saturating_sub(1)
    }

    /// Displacement history of one DOF
    pub fn displacement_history(&self, dof: usize) -> Vec<f64> {
        self.displacements.iter().map(|u| u[dof]).collect()
    }

    pub fn velocity_history(&self, dof: usize) -> Vec<f64> {
        self.velocities.iter().map(|v| v[dof]).collect()
    }

    pub fn acceleration_history(&self, dof: usize) -> Vec<f64> {
        self.accelerations.iter().map(|a| a[dof]).collect()
    }

    /// Peak absolute displacement of one DOF and when it occurs
    pub fn peak_displacement(&self, dof: usize) -> Option<(f64, f64)> {
        self.displacements
            .iter()
            .zip(&self.times)
            .map(|(u, &t)| (t, u[dof]))
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
    }
}

/// Critical load factors and buckling modes, lowest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucklingResult {
    pub load_factors: Vec<f64>,
    /// One mode per column
    pub mode_shapes: Mat,
    /// Static response to the reference loads
    pub reference: StaticResult,
    pub info: SolveInfo,
}

impl BucklingResult {
    /// Lowest critical load factor
    pub fn critical_load_factor(&self) -> Option<f64> {
        self.load_factors.first().copied()
    }
}

/// Outcome of a solved analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnalysisResult {
    Static(StaticResult),
    Modal(ModalResult),
    Transient(TransientResult),
    Buckling(BucklingResult),
}

impl AnalysisResult {
    pub fn analysis_type(&self) -> AnalysisType {
        match self {
            AnalysisResult::Static(_) => AnalysisType::LinearStatic,
            AnalysisResult::Modal(_) => AnalysisType::Modal,
            AnalysisResult::Transient(_) => AnalysisType::LinearTransient,
            AnalysisResult::Buckling(_) => AnalysisType::LinearBuckling,
        }
    }

    pub fn as_static(&self) -> Option<&StaticResult> {
        match self {
            AnalysisResult::Static(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_modal(&self) -> Option<&ModalResult> {
        match self {
            AnalysisResult::Modal(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_transient(&self) -> Option<&TransientResult> {
        match self {
            AnalysisResult::Transient(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_buckling(&self) -> Option<&BucklingResult> {
        match self {
            AnalysisResult::Buckling(r) => Some(r),
            _ => None,
        }
    }
}

/// Why an analysis ended in the Failed state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFailure {
    pub kind: ErrorKind,
    pub message: String,
}

fn max_abs(v: &FEVec) -> Option<(usize, f64)> {
    v.iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn info() -> SolveInfo {
        SolveInfo {
            solver: "DirectEigen".into(),
            iterations: 0,
            residual: 0.0,
        }
    }

    #[test]
    fn test_modal_frequencies() {
        let result = ModalResult::new(vec![4.0 * PI * PI, 16.0 * PI * PI], Mat::identity(2, 2), info());
        assert_relative_eq!(result.frequencies[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(result.periods()[1], 0.5, epsilon = 1e-12);
        assert_eq!(result.mode(1).unwrap()[1], 1.0);
        assert!(result.mode(2).is_none());
    }

    #[test]
    fn test_transient_histories() {
        let result = TransientResult {
            times: vec![0.0, 0.1, 0.2],
            displacements: vec![
                FEVec::from_vec(vec![0.0, 1.0]),
                FEVec::from_vec(vec![0.5, -3.0]),
                FEVec::from_vec(vec![0.2, 2.0]),
            ],
            velocities: vec![FEVec::zeros(2); 3],
            accelerations: vec![FEVec::zeros(2); 3],
            solver_iterations: 0,
        };
        assert_eq!(result.num_steps(), 2);
        assert_eq!(result.displacement_history(0), vec![0.0, 0.5, 0.2]);
        assert_eq!(result.peak_displacement(1), Some((0.1, -3.0)));
    }

    #[test]
    fn test_result_json_is_tagged() {
        let result = AnalysisResult::Static(StaticResult {
            displacements: FEVec::from_vec(vec![0.0, 2.0]),
            reactions: FEVec::from_vec(vec![-1.0, 0.0]),
            info: info(),
        });
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"type\":\"Static\""));
        assert_eq!(result.as_static().unwrap().max_displacement(), Some((1, 2.0)));
    }
}
