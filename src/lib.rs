//! FEA Analysis - the computational core of a structural analysis tool
//!
//! This library turns material definitions, boundary cases and an analysis
//! configuration into a solved equation system:
//! - Isotropic and orthotropic constitutive models (3D, plane stress, plane strain)
//! - Scaled superposition of boundary cases
//! - Linear static, modal, linear transient and linear buckling analysis
//! - Iterative, direct and eigen solvers over five matrix storage schemes
//! - Rayleigh damping with Newmark-beta and Wilson-theta time integration
//!
//! Element and global matrix assembly happen outside the core; the caller
//! hands in a [`StructuralSystem`](system::StructuralSystem).
//!
//! ## Example
//! ```rust
//! use fea_analysis::prelude::*;
//!
//! let mut model = AnalysisModel::new();
//!
//! // Boundary cases
//! model.add_boundary_case(BoundaryCase::builder("Supports").constraint(0).build().unwrap()).unwrap();
//! model.add_boundary_case(BoundaryCase::builder("Dead").nodal_load(1, 10.0).build().unwrap()).unwrap();
//!
//! // Analysis with a skyline Cholesky solver
//! let solver = DirectSolver::new(DirectMethod::ActiveColumn, StorageType::UpperSymmetricBanded1D).unwrap();
//! model.add_analysis(
//!     AnalysisCase::linear_static("Static")
//!         .with_solver(solver)
//!         .with_boundary_case("Supports", 1.0)
//!         .with_boundary_case("Dead", 1.5),
//! ).unwrap();
//!
//! // Assembled stiffness of one spring, k = 100
//! let k = Mat::from_row_slice(2, 2, &[100.0, -100.0, -100.0, 100.0]);
//! let system = StructuralSystem::new(k).unwrap();
//!
//! model.run("Static", &system).unwrap();
//! let result = model.result("Static").unwrap().as_static().unwrap();
//! assert!((result.displacements[1] - 0.15).abs() < 1e-12);
//! ```

pub mod analysis;
pub mod dynamics;
pub mod error;
pub mod loads;
pub mod materials;
pub mod math;
pub mod model;
pub mod results;
pub mod solver;
pub mod system;

// Re-export common types
pub mod prelude {
    pub use crate::analysis::{
        Analysis, AnalysisCase, AnalysisKind, AnalysisState, AnalysisType, TransientSettings,
    };
    pub use crate::dynamics::{IntegrationMethod, LoadFunction, RayleighDamping};
    pub use crate::error::{ErrorKind, FEAError, FEAResult};
    pub use crate::loads::{combine, BoundaryCase, ElementLoad, TemperatureLoad};
    pub use crate::materials::{IsotropicMaterial, Material, ModelState, OrthotropicMaterial};
    pub use crate::math::{Mat, Vec as FEVec};
    pub use crate::model::AnalysisModel;
    pub use crate::results::{
        AnalysisResult, BucklingResult, ModalResult, StaticResult, TransientResult,
    };
    pub use crate::solver::{
        DirectEigenSolver, DirectMethod, DirectSolver, EigenSettings, IterativeMethod,
        IterativeSettings, IterativeSolver, Preconditioner, ProblemType, Solver, StorageType,
        SubspaceEigenSolver,
    };
    pub use crate::system::{GeometricStiffness, StructuralSystem};
}
