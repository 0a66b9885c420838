//! Equation solvers
//!
//! A [`Solver`] is a validated configuration: method, storage scheme and
//! stopping criteria. Linear solvers are turned into a [`PreparedSolver`]
//! (factored or preconditioned operator) once per matrix and then reused
//! for every right-hand side; eigen solvers return the lowest positive
//! eigenpairs of `K phi = lambda B phi`.

mod direct;
mod eigen;
mod iterative;
mod preconditioner;
mod storage;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{FEAError, FEAResult};
use crate::math::{Mat, Vec as FEVec};

pub use direct::DirectMethod;
pub use eigen::EigenMethod;
pub use iterative::IterativeMethod;
pub use preconditioner::Preconditioner;
pub use storage::{StorageType, StoredMatrix};

use direct::Factorization;
use iterative::Krylov;
use preconditioner::PreconditionerOp;

/// Class of problem a solver handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProblemType {
    /// A x = b
    LinearSystem,
    /// K phi = lambda B phi
    EigenSystem,
}

/// Diagnostics of one solve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveInfo {
    pub solver: String,
    /// Iterations used (0 for a direct solve)
    pub iterations: usize,
    /// Relative residual, or the final relative eigenvalue change
    pub residual: f64,
}

/// Iterative solver settings as read from configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterativeSettings {
    pub method: IterativeMethod,
    #[serde(default)]
    pub preconditioner: Preconditioner,
    pub storage: StorageType,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Krylov dimension between GMRES restarts
    #[serde(default = "default_restart")]
    pub restart: usize,
}

fn default_tolerance() -> f64 {
    1e-8
}

fn default_max_iterations() -> usize {
    1000
}

fn default_restart() -> usize {
    30
}

impl IterativeSettings {
    pub fn new(method: IterativeMethod, storage: StorageType) -> Self {
        Self {
            method,
            preconditioner: Preconditioner::None,
            storage,
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
            restart: default_restart(),
        }
    }

    pub fn with_preconditioner(mut self, preconditioner: Preconditioner) -> Self {
        self.preconditioner = preconditioner;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_restart(mut self, restart: usize) -> Self {
        self.restart = restart;
        self
    }

    /// Validate into a solver
    pub fn build(self) -> FEAResult<IterativeSolver> {
        IterativeSolver::try_from(self)
    }
}

/// Validated iterative solver configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IterativeSettings", into = "IterativeSettings")]
pub struct IterativeSolver {
    settings: IterativeSettings,
}

impl IterativeSolver {
    pub const STORAGE: &'static [StorageType] =
        &[StorageType::CompressedDiagonal, StorageType::CompressedRow];

    pub fn method(&self) -> IterativeMethod {
        self.settings.method
    }

    pub fn preconditioner(&self) -> Preconditioner {
        self.settings.preconditioner
    }

    pub fn tolerance(&self) -> f64 {
        self.settings.tolerance
    }

    pub fn max_iterations(&self) -> usize {
        self.settings.max_iterations
    }

    pub fn restart(&self) -> usize {
        self.settings.restart
    }
}

impl TryFrom<IterativeSettings> for IterativeSolver {
    type Error = FEAError;

    fn try_from(s: IterativeSettings) -> FEAResult<Self> {
        check_storage(s.method.name(), s.storage, Self::STORAGE)?;
        check_tolerance(s.tolerance)?;
        if s.max_iterations == 0 {
            return Err(FEAError::invalid("maximum iterations must be at least 1"));
        }
        if s.restart == 0 {
            return Err(FEAError::invalid("GMRES restart length must be at least 1"));
        }
        Ok(Self { settings: s })
    }
}

impl From<IterativeSolver> for IterativeSettings {
    fn from(s: IterativeSolver) -> Self {
        s.settings
    }
}

/// Validated direct solver configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DirectSettings", into = "DirectSettings")]
pub struct DirectSolver {
    method: DirectMethod,
    storage: StorageType,
}

/// Direct solver settings as read from configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DirectSettings {
    pub method: DirectMethod,
    pub storage: StorageType,
}

impl DirectSolver {
    pub fn new(method: DirectMethod, storage: StorageType) -> FEAResult<Self> {
        check_storage(method.name(), storage, Self::accepted_storage(method))?;
        Ok(Self { method, storage })
    }

    pub fn accepted_storage(method: DirectMethod) -> &'static [StorageType] {
        match method {
            DirectMethod::ActiveColumn => &[StorageType::UpperSymmetricBanded1D],
            DirectMethod::GaussSymmetric => &[
                StorageType::UpperSymmetricPacked,
                StorageType::UpperSymmetricBanded2D,
            ],
        }
    }

    pub fn method(&self) -> DirectMethod {
        self.method
    }
}

impl TryFrom<DirectSettings> for DirectSolver {
    type Error = FEAError;

    fn try_from(s: DirectSettings) -> FEAResult<Self> {
        Self::new(s.method, s.storage)
    }
}

impl From<DirectSolver> for DirectSettings {
    fn from(s: DirectSolver) -> Self {
        DirectSettings {
            method: s.method,
            storage: s.storage,
        }
    }
}

/// Eigen solver settings as read from configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EigenSettings {
    pub num_eigenvalues: usize,
    pub storage: StorageType,
    #[serde(default = "default_eigen_tolerance")]
    pub tolerance: f64,
    /// Only used by subspace iteration
    #[serde(default = "default_eigen_iterations")]
    pub max_iterations: usize,
}

fn default_eigen_tolerance() -> f64 {
    1e-10
}

fn default_eigen_iterations() -> usize {
    100
}

impl EigenSettings {
    pub fn new(num_eigenvalues: usize, storage: StorageType) -> Self {
        Self {
            num_eigenvalues,
            storage,
            tolerance: default_eigen_tolerance(),
            max_iterations: default_eigen_iterations(),
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    fn validate(&self, method: EigenMethod, accepted: &[StorageType]) -> FEAResult<()> {
        check_storage(method.name(), self.storage, accepted)?;
        check_tolerance(self.tolerance)?;
        if self.num_eigenvalues == 0 {
            return Err(FEAError::invalid("at least one eigenvalue must be requested"));
        }
        if method == EigenMethod::Subspace && self.max_iterations == 0 {
            return Err(FEAError::invalid("maximum iterations must be at least 1"));
        }
        Ok(())
    }
}

/// Validated subspace iteration configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EigenSettings", into = "EigenSettings")]
pub struct SubspaceEigenSolver {
    settings: EigenSettings,
}

impl SubspaceEigenSolver {
    pub const STORAGE: &'static [StorageType] = &[
        StorageType::UpperSymmetricPacked,
        StorageType::UpperSymmetricBanded1D,
        StorageType::UpperSymmetricBanded2D,
    ];

    pub fn new(settings: EigenSettings) -> FEAResult<Self> {
        settings.validate(EigenMethod::Subspace, Self::STORAGE)?;
        Ok(Self { settings })
    }

    pub fn num_eigenvalues(&self) -> usize {
        self.settings.num_eigenvalues
    }
}

impl TryFrom<EigenSettings> for SubspaceEigenSolver {
    type Error = FEAError;

    fn try_from(s: EigenSettings) -> FEAResult<Self> {
        Self::new(s)
    }
}

impl From<SubspaceEigenSolver> for EigenSettings {
    fn from(s: SubspaceEigenSolver) -> Self {
        s.settings
    }
}

/// Validated dense eigen solver configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EigenSettings", into = "EigenSettings")]
pub struct DirectEigenSolver {
    settings: EigenSettings,
}

impl DirectEigenSolver {
    pub const STORAGE: &'static [StorageType] = &[
        StorageType::UpperSymmetricPacked,
        StorageType::UpperSymmetricBanded2D,
    ];

    pub fn new(settings: EigenSettings) -> FEAResult<Self> {
        settings.validate(EigenMethod::Direct, Self::STORAGE)?;
        Ok(Self { settings })
    }

    pub fn num_eigenvalues(&self) -> usize {
        self.settings.num_eigenvalues
    }
}

impl TryFrom<EigenSettings> for DirectEigenSolver {
    type Error = FEAError;

    fn try_from(s: EigenSettings) -> FEAResult<Self> {
        Self::new(s)
    }
}

impl From<DirectEigenSolver> for EigenSettings {
    fn from(s: DirectEigenSolver) -> Self {
        s.settings
    }
}

fn check_storage(solver: &str, storage: StorageType, accepted: &[StorageType]) -> FEAResult<()> {
    if accepted.contains(&storage) {
        Ok(())
    } else {
        let names: Vec<&str> = accepted.iter().map(|s| s.abbreviation()).collect();
        Err(FEAError::incompatible(format!(
            "{} does not support {} storage (accepted: {})",
            solver,
            storage.abbreviation(),
            names.join(", ")
        )))
    }
}

fn check_tolerance(tolerance: f64) -> FEAResult<()> {
    if tolerance.is_finite() && tolerance > 0.0 {
        Ok(())
    } else {
        Err(FEAError::invalid(format!(
            "tolerance must be positive, got {}",
            tolerance
        )))
    }
}

/// Any configured solver
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Solver {
    Iterative(IterativeSolver),
    Direct(DirectSolver),
    EigenSubspace(SubspaceEigenSolver),
    EigenDirect(DirectEigenSolver),
}

impl Solver {
    pub fn problem_type(&self) -> ProblemType {
        match self {
            Solver::Iterative(_) | Solver::Direct(_) => ProblemType::LinearSystem,
            Solver::EigenSubspace(_) | Solver::EigenDirect(_) => ProblemType::EigenSystem,
        }
    }

    pub fn storage_type(&self) -> StorageType {
        match self {
            Solver::Iterative(s) => s.settings.storage,
            Solver::Direct(s) => s.storage,
            Solver::EigenSubspace(s) => s.settings.storage,
            Solver::EigenDirect(s) => s.settings.storage,
        }
    }

    /// Storage schemes this solver accepts
    pub fn accepted_storage(&self) -> &'static [StorageType] {
        match self {
            Solver::Iterative(_) => IterativeSolver::STORAGE,
            Solver::Direct(s) => DirectSolver::accepted_storage(s.method),
            Solver::EigenSubspace(_) => SubspaceEigenSolver::STORAGE,
            Solver::EigenDirect(_) => DirectEigenSolver::STORAGE,
        }
    }

    /// Method name used in logs and diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Solver::Iterative(s) => s.settings.method.name(),
            Solver::Direct(s) => s.method.name(),
            Solver::EigenSubspace(_) => EigenMethod::Subspace.name(),
            Solver::EigenDirect(_) => EigenMethod::Direct.name(),
        }
    }

    /// Store `a` and factor or precondition it for repeated solves
    ///
    /// Eigen solvers prepare a direct factorization matching their storage,
    /// which is what buckling analysis uses for its reference solve.
    pub fn prepare(&self, a: &Mat) -> FEAResult<PreparedSolver> {
        let stored = StoredMatrix::from_dense(self.storage_type(), a)?;
        let kind = match self {
            Solver::Iterative(s) => {
                let csr = stored.to_csr();
                let mut preconditioner = s.settings.preconditioner;
                if s.settings.method == IterativeMethod::IterativeRefinement
                    && preconditioner == Preconditioner::None
                {
                    preconditioner = Preconditioner::Diagonal;
                }
                Prepared::Iterative {
                    solver: *s,
                    preconditioner: PreconditionerOp::build(preconditioner, &csr)?,
                }
            }
            Solver::Direct(s) => Prepared::Direct(Factorization::factor(s.method, &stored)?),
            Solver::EigenSubspace(_) | Solver::EigenDirect(_) => {
                Prepared::Direct(Factorization::factor(eigen_factor_method(&stored), &stored)?)
            }
        };
        debug!(
            "{} prepared a {}x{} system in {} storage",
            self.name(),
            a.nrows(),
            a.ncols(),
            self.storage_type().abbreviation()
        );
        Ok(PreparedSolver {
            name: self.name(),
            matrix: stored,
            kind,
        })
    }

    /// Prepare `a` and solve a single right-hand side
    pub fn solve(&self, a: &Mat, b: &FEVec) -> FEAResult<(FEVec, SolveInfo)> {
        self.prepare(a)?.solve(b)
    }

    /// Lowest positive eigenpairs of `K phi = lambda B phi`
    ///
    /// Modes are normalized to `phi^T B phi = 1` where that is positive.
    pub fn solve_eigen(&self, k: &Mat, b: &Mat) -> FEAResult<EigenSolution> {
        let settings = match self {
            Solver::EigenSubspace(s) => s.settings,
            Solver::EigenDirect(s) => s.settings,
            _ => {
                return Err(FEAError::incompatible(format!(
                    "{} is not an eigen solver",
                    self.name()
                )))
            }
        };
        let n = k.nrows();
        if b.nrows() != n || b.ncols() != n {
            return Err(FEAError::incompatible(format!(
                "eigenproblem matrices differ in size ({}x{} and {}x{})",
                n,
                k.ncols(),
                b.nrows(),
                b.ncols()
            )));
        }
        if settings.num_eigenvalues > n {
            return Err(FEAError::incompatible(format!(
                "{} eigenvalues requested from a system with {} DOFs",
                settings.num_eigenvalues, n
            )));
        }
        // storage validity (symmetry) is checked for both matrices
        StoredMatrix::from_dense(settings.storage, b)?;

        let mut pairs = match self {
            Solver::EigenSubspace(_) => {
                let prepared = self.prepare(k)?;
                eigen::subspace(
                    k,
                    b,
                    settings.num_eigenvalues,
                    settings.tolerance,
                    settings.max_iterations,
                    |v| prepared.solve(v).map(|(x, _)| x),
                )?
            }
            _ => {
                StoredMatrix::from_dense(settings.storage, k)?;
                eigen::direct(k, b, settings.num_eigenvalues, settings.tolerance)?
            }
        };

        if pairs.values.is_empty() {
            return Err(FEAError::incompatible(
                "eigenproblem has no positive eigenvalues",
            ));
        }
        if pairs.values.len() < settings.num_eigenvalues {
            warn!(
                "{}: {} eigenvalues requested, only {} positive ones exist",
                self.name(),
                settings.num_eigenvalues,
                pairs.values.len()
            );
        }
        eigen::normalize_modes(&mut pairs.vectors, b);
        info!(
            "{} found {} eigenvalues in {} iterations",
            self.name(),
            pairs.values.len(),
            pairs.iterations
        );

        Ok(EigenSolution {
            eigenvalues: pairs.values,
            vectors: pairs.vectors,
            info: SolveInfo {
                solver: self.name().to_string(),
                iterations: pairs.iterations,
                residual: pairs.change,
            },
        })
    }
}

fn eigen_factor_method(stored: &StoredMatrix) -> DirectMethod {
    match stored.storage_type() {
        StorageType::UpperSymmetricBanded1D => DirectMethod::ActiveColumn,
        _ => DirectMethod::GaussSymmetric,
    }
}

impl From<IterativeSolver> for Solver {
    fn from(s: IterativeSolver) -> Self {
        Solver::Iterative(s)
    }
}

impl From<DirectSolver> for Solver {
    fn from(s: DirectSolver) -> Self {
        Solver::Direct(s)
    }
}

impl From<SubspaceEigenSolver> for Solver {
    fn from(s: SubspaceEigenSolver) -> Self {
        Solver::EigenSubspace(s)
    }
}

impl From<DirectEigenSolver> for Solver {
    fn from(s: DirectEigenSolver) -> Self {
        Solver::EigenDirect(s)
    }
}

/// Eigenvalues in ascending order with their modes as columns
#[derive(Debug, Clone)]
pub struct EigenSolution {
    pub eigenvalues: Vec<f64>,
    pub vectors: Mat,
    pub info: SolveInfo,
}

#[derive(Debug, Clone)]
enum Prepared {
    Iterative {
        solver: IterativeSolver,
        preconditioner: PreconditionerOp,
    },
    Direct(Factorization),
}

/// A stored matrix with its factorization or preconditioner
#[derive(Debug, Clone)]
pub struct PreparedSolver {
    name: &'static str,
    matrix: StoredMatrix,
    kind: Prepared,
}

impl PreparedSolver {
    pub fn dim(&self) -> usize {
        self.matrix.dim()
    }

    pub fn matrix(&self) -> &StoredMatrix {
        &self.matrix
    }

    /// Solve A x = b
    pub fn solve(&self, b: &FEVec) -> FEAResult<(FEVec, SolveInfo)> {
        if b.len() != self.dim() {
            return Err(FEAError::incompatible(format!(
                "right-hand side has {} entries, system has {}",
                b.len(),
                self.dim()
            )));
        }
        let (x, iterations, residual) = match &self.kind {
            Prepared::Iterative {
                solver,
                preconditioner,
            } => Krylov {
                a: &self.matrix,
                m: preconditioner,
                tolerance: solver.tolerance(),
                max_iterations: solver.max_iterations(),
                restart: solver.restart(),
            }
            .solve(solver.method(), b)?,
            Prepared::Direct(factor) => {
                let x = factor.solve(b);
                let b_norm = b.norm();
                let residual = if b_norm > 0.0 {
                    (b - self.matrix.matvec(&x)).norm() / b_norm
                } else {
                    0.0
                };
                if !residual.is_finite() {
                    return Err(FEAError::singular(format!(
                        "{} produced a non-finite solution",
                        self.name
                    )));
                }
                (x, 0, residual)
            }
        };
        Ok((
            x,
            SolveInfo {
                solver: self.name.to_string(),
                iterations,
                residual,
            },
        ))
    }
}
