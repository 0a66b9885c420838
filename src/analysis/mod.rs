//! Analysis cases and their solution state
//!
//! An [`Analysis`] wraps an [`AnalysisCase`] with the state machine
//!
//! ```text
//! Unconfigured -> Configured -> Solving -> Solved
//!                                      \-> Failed
//! ```
//!
//! Any configuration change drops a stored result and re-evaluates whether
//! the case is complete.

mod buckling;
mod modal;
mod static_solve;
mod transient;

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::dynamics::{IntegrationMethod, LoadFunction, RayleighDamping};
use crate::error::{FEAError, FEAResult};
use crate::loads::{combine, BoundaryCase};
use crate::results::{AnalysisFailure, AnalysisResult};
use crate::solver::{ProblemType, Solver};
use crate::system::StructuralSystem;

/// Type of structural analysis to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalysisType {
    /// First-order linear static analysis
    LinearStatic,
    /// Natural frequencies and mode shapes
    Modal,
    /// Direct time integration
    LinearTransient,
    /// Eigenvalue buckling
    LinearBuckling,
}

impl AnalysisType {
    /// Problem type the bound solver must handle
    pub fn problem_type(self) -> ProblemType {
        match self {
            AnalysisType::LinearStatic | AnalysisType::LinearTransient => ProblemType::LinearSystem,
            AnalysisType::Modal | AnalysisType::LinearBuckling => ProblemType::EigenSystem,
        }
    }

    /// Whether at least one boundary case is needed to become Configured
    pub fn requires_boundary_cases(self) -> bool {
        self != AnalysisType::Modal
    }
}

/// Time stepping parameters of a transient analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TransientParameters", into = "TransientParameters")]
pub struct TransientSettings {
    steps: usize,
    time_step: f64,
    load_function: LoadFunction,
    damping: RayleighDamping,
    method: IntegrationMethod,
}

/// Unvalidated transient parameters as read from configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransientParameters {
    pub steps: usize,
    pub time_step: f64,
    #[serde(default)]
    pub load_function: LoadFunction,
    #[serde(default)]
    pub damping: RayleighDamping,
    #[serde(default = "IntegrationMethod::average_acceleration")]
    pub method: IntegrationMethod,
}

impl TransientSettings {
    pub fn new(
        steps: usize,
        time_step: f64,
        load_function: LoadFunction,
        damping: RayleighDamping,
        method: IntegrationMethod,
    ) -> FEAResult<Self> {
        if steps == 0 {
            return Err(FEAError::invalid("number of time steps must be at least 1"));
        }
        if !(time_step.is_finite() && time_step > 0.0) {
            return Err(FEAError::invalid(format!(
                "time step must be positive, got {}",
                time_step
            )));
        }
        method.validate()?;
        load_function.validate()?;
        load_function.check_grid(steps, time_step)?;
        Ok(Self {
            steps,
            time_step,
            load_function,
            damping,
            method,
        })
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    /// Total simulated time `n * dt`
    pub fn duration(&self) -> f64 {
        self.steps as f64 * self.time_step
    }

    pub fn load_function(&self) -> &LoadFunction {
        &self.load_function
    }

    pub fn damping(&self) -> RayleighDamping {
        self.damping
    }

    pub fn method(&self) -> IntegrationMethod {
        self.method
    }
}

impl TryFrom<TransientParameters> for TransientSettings {
    type Error = FEAError;

    fn try_from(p: TransientParameters) -> FEAResult<Self> {
        Self::new(p.steps, p.time_step, p.load_function, p.damping, p.method)
    }
}

impl From<TransientSettings> for TransientParameters {
    fn from(s: TransientSettings) -> Self {
        TransientParameters {
            steps: s.steps,
            time_step: s.time_step,
            load_function: s.load_function,
            damping: s.damping,
            method: s.method,
        }
    }
}

/// What to solve, with its kind-specific settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnalysisKind {
    LinearStatic,
    Modal,
    LinearTransient(TransientSettings),
    LinearBuckling,
}

impl AnalysisKind {
    pub fn analysis_type(&self) -> AnalysisType {
        match self {
            AnalysisKind::LinearStatic => AnalysisType::LinearStatic,
            AnalysisKind::Modal => AnalysisType::Modal,
            AnalysisKind::LinearTransient(_) => AnalysisType::LinearTransient,
            AnalysisKind::LinearBuckling => AnalysisType::LinearBuckling,
        }
    }
}

/// A boundary case taken into an analysis with its scale factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryRef {
    pub case: String,
    #[serde(default = "unit_scale")]
    pub scale: f64,
}

fn unit_scale() -> f64 {
    1.0
}

/// Configuration of one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisCase {
    pub name: String,
    #[serde(default)]
    pub solver: Option<Solver>,
    #[serde(default)]
    pub boundary_cases: Vec<BoundaryRef>,
    pub kind: AnalysisKind,
}

impl AnalysisCase {
    pub fn new(name: &str, kind: AnalysisKind) -> Self {
        Self {
            name: name.to_string(),
            solver: None,
            boundary_cases: Vec::new(),
            kind,
        }
    }

    pub fn linear_static(name: &str) -> Self {
        Self::new(name, AnalysisKind::LinearStatic)
    }

    pub fn modal(name: &str) -> Self {
        Self::new(name, AnalysisKind::Modal)
    }

    pub fn linear_transient(name: &str, settings: TransientSettings) -> Self {
        Self::new(name, AnalysisKind::LinearTransient(settings))
    }

    pub fn linear_buckling(name: &str) -> Self {
        Self::new(name, AnalysisKind::LinearBuckling)
    }

    pub fn with_solver(mut self, solver: impl Into<Solver>) -> Self {
        self.solver = Some(solver.into());
        self
    }

    pub fn with_boundary_case(mut self, case: &str, scale: f64) -> Self {
        self.boundary_cases.push(BoundaryRef {
            case: case.to_string(),
            scale,
        });
        self
    }

    pub fn analysis_type(&self) -> AnalysisType {
        self.kind.analysis_type()
    }

    /// Check the case for internal consistency
    ///
    /// Missing pieces leave an analysis Unconfigured; contradictions are
    /// errors.
    fn check(&self) -> FEAResult<()> {
        if let Some(solver) = &self.solver {
            check_solver(self.analysis_type(), solver)?;
        }
        let mut seen = BTreeSet::new();
        for r in &self.boundary_cases {
            if !seen.insert(r.case.as_str()) {
                return Err(FEAError::incompatible(format!(
                    "boundary case '{}' appears twice in analysis '{}'",
                    r.case, self.name
                )));
            }
            if !r.scale.is_finite() {
                return Err(FEAError::invalid(format!(
                    "scale of boundary case '{}' must be finite",
                    r.case
                )));
            }
        }
        Ok(())
    }

    fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
            && self.solver.is_some()
            && (!self.analysis_type().requires_boundary_cases() || !self.boundary_cases.is_empty())
    }
}

fn check_solver(analysis: AnalysisType, solver: &Solver) -> FEAResult<()> {
    if solver.problem_type() != analysis.problem_type() {
        return Err(FEAError::incompatible(format!(
            "{:?} analysis needs a {:?} solver, {} solves {:?}",
            analysis,
            analysis.problem_type(),
            solver.name(),
            solver.problem_type()
        )));
    }
    Ok(())
}

/// Solution state of an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisState {
    Unconfigured,
    Configured,
    Solving,
    Solved,
    Failed,
}

/// An analysis case together with its state and outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "AnalysisCase", into = "AnalysisCase")]
pub struct Analysis {
    case: AnalysisCase,
    state: AnalysisState,
    result: Option<AnalysisResult>,
    failure: Option<AnalysisFailure>,
}

impl Analysis {
    pub fn new(case: AnalysisCase) -> FEAResult<Self> {
        case.check()?;
        let mut analysis = Self {
            case,
            state: AnalysisState::Unconfigured,
            result: None,
            failure: None,
        };
        analysis.reset();
        Ok(analysis)
    }

    pub fn name(&self) -> &str {
        &self.case.name
    }

    pub fn case(&self) -> &AnalysisCase {
        &self.case
    }

    pub fn analysis_type(&self) -> AnalysisType {
        self.case.analysis_type()
    }

    pub fn state(&self) -> AnalysisState {
        self.state
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    /// Error kind and message of a failed run
    pub fn failure(&self) -> Option<&AnalysisFailure> {
        self.failure.as_ref()
    }

    /// Drop any outcome and return to Configured or Unconfigured
    pub fn reset(&mut self) {
        self.result = None;
        self.failure = None;
        self.state = if self.case.is_complete() {
            AnalysisState::Configured
        } else {
            AnalysisState::Unconfigured
        };
    }

    /// Bind a solver; its problem type must match the analysis
    pub fn set_solver(&mut self, solver: impl Into<Solver>) -> FEAResult<()> {
        let solver = solver.into();
        check_solver(self.analysis_type(), &solver)?;
        self.case.solver = Some(solver);
        self.reset();
        Ok(())
    }

    /// Append a boundary case with its scale factor
    pub fn add_boundary_case(&mut self, case: &str, scale: f64) -> FEAResult<()> {
        if self.case.boundary_cases.iter().any(|r| r.case == case) {
            return Err(FEAError::incompatible(format!(
                "boundary case '{}' is already part of analysis '{}'",
                case, self.case.name
            )));
        }
        if !scale.is_finite() {
            return Err(FEAError::invalid(format!(
                "scale of boundary case '{}' must be finite",
                case
            )));
        }
        self.case.boundary_cases.push(BoundaryRef {
            case: case.to_string(),
            scale,
        });
        self.reset();
        Ok(())
    }

    /// Remove a boundary case; returns whether it was present
    pub fn remove_boundary_case(&mut self, case: &str) -> bool {
        let before = self.case.boundary_cases.len();
        self.case.boundary_cases.retain(|r| r.case != case);
        let removed = self.case.boundary_cases.len() != before;
        if removed {
            self.reset();
        }
        removed
    }

    /// Replace the analysis kind, dropping a solver of the wrong problem type
    pub fn set_kind(&mut self, kind: AnalysisKind) {
        if let Some(solver) = &self.case.solver {
            if solver.problem_type() != kind.analysis_type().problem_type() {
                self.case.solver = None;
            }
        }
        self.case.kind = kind;
        self.reset();
    }

    /// Solve against `system`, looking boundary cases up in `cases`
    ///
    /// On failure the analysis moves to Failed and the error is returned;
    /// the error kind and message stay available through
    /// [`failure`](Self::failure).
    pub fn run(
        &mut self,
        cases: &BTreeMap<String, BoundaryCase>,
        system: &StructuralSystem,
    ) -> FEAResult<&AnalysisResult> {
        match self.state {
            AnalysisState::Configured => {}
            AnalysisState::Unconfigured => {
                return Err(FEAError::incompatible(format!(
                    "analysis '{}' is missing a solver or boundary cases",
                    self.case.name
                )))
            }
            state => {
                return Err(FEAError::incompatible(format!(
                    "analysis '{}' is {:?}, reset it before running again",
                    self.case.name, state
                )))
            }
        }

        self.state = AnalysisState::Solving;
        info!(
            "running {:?} analysis '{}'",
            self.analysis_type(),
            self.case.name
        );
        match self.solve(cases, system) {
            Ok(result) => {
                self.state = AnalysisState::Solved;
                let result: &AnalysisResult = self.result.insert(result);
                Ok(result)
            }
            Err(err) => {
                error!("analysis '{}' failed: {}", self.case.name, err);
                self.state = AnalysisState::Failed;
                self.failure = Some(AnalysisFailure {
                    kind: err.kind(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn solve(
        &self,
        cases: &BTreeMap<String, BoundaryCase>,
        system: &StructuralSystem,
    ) -> FEAResult<AnalysisResult> {
        let case = &self.case;
        let solver = case.solver.as_ref().ok_or_else(|| {
            FEAError::incompatible(format!("analysis '{}' has no solver", case.name))
        })?;
        if case.boundary_cases.is_empty() {
            return Err(FEAError::incompatible(format!(
                "analysis '{}' has no boundary cases",
                case.name
            )));
        }

        let mut selected = Vec::with_capacity(case.boundary_cases.len());
        for r in &case.boundary_cases {
            let bc = cases
                .get(&r.case)
                .ok_or_else(|| FEAError::BoundaryCaseNotFound(r.case.clone()))?;
            selected.push((bc, r.scale));
        }
        let combined = combine(&selected)?;
        debug!(
            "analysis '{}': {} boundary cases, {} constrained DOFs",
            case.name,
            selected.len(),
            combined.constraints().len()
        );

        Ok(match &case.kind {
            AnalysisKind::LinearStatic => {
                AnalysisResult::Static(static_solve::solve(system, &combined, solver)?)
            }
            AnalysisKind::Modal => AnalysisResult::Modal(modal::solve(system, &combined, solver)?),
            AnalysisKind::LinearTransient(settings) => {
                AnalysisResult::Transient(transient::solve(system, &combined, solver, settings)?)
            }
            AnalysisKind::LinearBuckling => {
                AnalysisResult::Buckling(buckling::solve(system, &combined, solver)?)
            }
        })
    }
}

impl TryFrom<AnalysisCase> for Analysis {
    type Error = FEAError;

    fn try_from(case: AnalysisCase) -> FEAResult<Self> {
        Analysis::new(case)
    }
}

impl From<Analysis> for AnalysisCase {
    fn from(a: Analysis) -> Self {
        a.case
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::math::Mat;
    use crate::solver::{
        DirectEigenSolver, DirectMethod, DirectSolver, EigenSettings, IterativeMethod,
        IterativeSettings, StorageType,
    };

    fn eigen_solver() -> DirectEigenSolver {
        DirectEigenSolver::new(EigenSettings::new(1, StorageType::UpperSymmetricPacked)).unwrap()
    }

    fn linear_solver() -> DirectSolver {
        DirectSolver::new(DirectMethod::GaussSymmetric, StorageType::UpperSymmetricPacked).unwrap()
    }

    fn system() -> StructuralSystem {
        let k = Mat::from_row_slice(2, 2, &[2.0, -1.0, -1.0, 1.0]);
        StructuralSystem::new(k)
            .unwrap()
            .with_mass(Mat::identity(2, 2))
            .unwrap()
    }

    fn cases() -> BTreeMap<String, BoundaryCase> {
        let mut map = BTreeMap::new();
        let fixed = BoundaryCase::builder("Fixed").constraint(0).build().unwrap();
        let load = BoundaryCase::builder("Load").nodal_load(1, 1.0).build().unwrap();
        map.insert("Fixed".to_string(), fixed);
        map.insert("Load".to_string(), load);
        map
    }

    #[test]
    fn test_configuration_states() {
        let mut analysis = Analysis::new(AnalysisCase::linear_static("Static")).unwrap();
        assert_eq!(analysis.state(), AnalysisState::Unconfigured);
        analysis.set_solver(linear_solver()).unwrap();
        assert_eq!(analysis.state(), AnalysisState::Unconfigured);
        analysis.add_boundary_case("Load", 1.0).unwrap();
        assert_eq!(analysis.state(), AnalysisState::Configured);

        let err = analysis.add_boundary_case("Load", 2.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompatibleConfiguration);
        let err = analysis.set_solver(eigen_solver()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompatibleConfiguration);
    }

    #[test]
    fn test_modal_needs_only_a_solver() {
        let analysis = Analysis::new(AnalysisCase::modal("Modes").with_solver(eigen_solver())).unwrap();
        assert_eq!(analysis.state(), AnalysisState::Configured);
    }

    #[test]
    fn test_run_and_reset() {
        let mut analysis = Analysis::new(
            AnalysisCase::linear_static("Static")
                .with_solver(linear_solver())
                .with_boundary_case("Fixed", 1.0)
                .with_boundary_case("Load", 2.0),
        )
        .unwrap();
        let result = analysis.run(&cases(), &system()).unwrap();
        let u = &result.as_static().unwrap().displacements;
        assert!((u[1] - 2.0).abs() < 1e-12);
        assert_eq!(analysis.state(), AnalysisState::Solved);

        assert!(analysis.run(&cases(), &system()).is_err());
        analysis.reset();
        assert_eq!(analysis.state(), AnalysisState::Configured);
        assert!(analysis.result().is_none());
    }

    #[test]
    fn test_failure_recorded() {
        // no constraint: the free-free spring is singular
        let floating = StructuralSystem::new(Mat::from_row_slice(2, 2, &[1.0, -1.0, -1.0, 1.0])).unwrap();
        let mut analysis = Analysis::new(
            AnalysisCase::linear_static("Unsupported")
                .with_solver(linear_solver())
                .with_boundary_case("Load", 1.0),
        )
        .unwrap();
        let err = analysis.run(&cases(), &floating).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SingularSystem);
        assert_eq!(analysis.state(), AnalysisState::Failed);
        assert_eq!(analysis.failure().unwrap().kind, ErrorKind::SingularSystem);

        let mut missing = Analysis::new(
            AnalysisCase::linear_static("Missing")
                .with_solver(linear_solver())
                .with_boundary_case("Wind", 1.0),
        )
        .unwrap();
        assert!(missing.run(&cases(), &system()).is_err());
        assert_eq!(
            missing.failure().unwrap().kind,
            ErrorKind::IncompatibleConfiguration
        );
    }

    #[test]
    fn test_set_kind_drops_mismatched_solver() {
        let mut analysis = Analysis::new(
            AnalysisCase::linear_static("Switch")
                .with_solver(linear_solver())
                .with_boundary_case("Fixed", 1.0),
        )
        .unwrap();
        analysis.set_kind(AnalysisKind::Modal);
        assert!(analysis.case().solver.is_none());
        assert_eq!(analysis.state(), AnalysisState::Unconfigured);
    }

    #[test]
    fn test_transient_settings_validation() {
        let ok = || {
            TransientSettings::new(
                10,
                0.1,
                LoadFunction::default(),
                RayleighDamping::undamped(),
                IntegrationMethod::average_acceleration(),
            )
        };
        assert!(ok().is_ok());
        let zero_steps = TransientSettings::new(
            0,
            0.1,
            LoadFunction::default(),
            RayleighDamping::undamped(),
            IntegrationMethod::average_acceleration(),
        );
        assert_eq!(zero_steps.unwrap_err().kind(), ErrorKind::InvalidParameter);

        let short = LoadFunction::table(vec![(0.0, 0.0), (0.5, 1.0)]).unwrap();
        let err = TransientSettings::new(
            10,
            0.1,
            short,
            RayleighDamping::undamped(),
            IntegrationMethod::average_acceleration(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompatibleConfiguration);

        for unchecked in [LoadFunction::Table(vec![]), LoadFunction::Table(vec![(0.0, 1.0)])] {
            let err = TransientSettings::new(
                10,
                0.1,
                unchecked,
                RayleighDamping::undamped(),
                IntegrationMethod::average_acceleration(),
            )
            .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        }
    }

    #[test]
    fn test_iterative_solver_json_round_trip() {
        let case = AnalysisCase::linear_static("Json")
            .with_solver(
                IterativeSettings::new(IterativeMethod::ConjugateGradient, StorageType::CompressedRow)
                    .build()
                    .unwrap(),
            )
            .with_boundary_case("Load", 1.5);
        let json = serde_json::to_string(&case).unwrap();
        let analysis: Analysis = serde_json::from_str(&json).unwrap();
        assert_eq!(analysis.case(), &case);
        assert_eq!(analysis.state(), AnalysisState::Configured);
    }
}
