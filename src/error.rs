//! Error types for the analysis core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for analysis operations
#[derive(Error, Debug)]
pub enum FEAError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Incompatible configuration: {0}")]
    IncompatibleConfiguration(String),

    #[error("{solver} did not converge after {iterations} iterations (residual {residual:.3e})")]
    SolverNonConvergence {
        solver: String,
        iterations: usize,
        residual: f64,
    },

    #[error("Singular system: {0}")]
    SingularSystem(String),

    #[error("Duplicate name '{0}' already exists")]
    DuplicateName(String),

    #[error("Material '{0}' not found in model")]
    MaterialNotFound(String),

    #[error("Boundary case '{0}' not found in model")]
    BoundaryCaseNotFound(String),

    #[error("Analysis '{0}' not found in model")]
    AnalysisNotFound(String),

    #[error("Analysis '{0}' has not been solved")]
    NotAnalyzed(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Coarse error classification reported with a failed analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Out-of-domain material, damping or integration parameter
    InvalidParameter,
    /// Inputs that cannot be combined into a solvable problem
    IncompatibleConfiguration,
    /// Iterative method ran out of iterations or broke down
    SolverNonConvergence,
    /// Matrix not invertible or not positive definite where required
    SingularSystem,
}

impl FEAError {
    /// Classify this error into one of the four reported kinds
    pub fn kind(&self) -> ErrorKind {
        match self {
            FEAError::InvalidParameter(_) | FEAError::SerializationError(_) => {
                ErrorKind::InvalidParameter
            }
            FEAError::IncompatibleConfiguration(_)
            | FEAError::DuplicateName(_)
            | FEAError::MaterialNotFound(_)
            | FEAError::BoundaryCaseNotFound(_)
            | FEAError::AnalysisNotFound(_)
            | FEAError::NotAnalyzed(_) => ErrorKind::IncompatibleConfiguration,
            FEAError::SolverNonConvergence { .. } => ErrorKind::SolverNonConvergence,
            FEAError::SingularSystem(_) => ErrorKind::SingularSystem,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        FEAError::InvalidParameter(msg.into())
    }

    pub(crate) fn incompatible(msg: impl Into<String>) -> Self {
        FEAError::IncompatibleConfiguration(msg.into())
    }

    pub(crate) fn singular(msg: impl Into<String>) -> Self {
        FEAError::SingularSystem(msg.into())
    }
}

/// Result type for analysis operations
pub type FEAResult<T> = Result<T, FEAError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            FEAError::invalid("nu").kind(),
            ErrorKind::InvalidParameter
        );
        assert_eq!(
            FEAError::DuplicateName("Dead".into()).kind(),
            ErrorKind::IncompatibleConfiguration
        );
        let err = FEAError::SolverNonConvergence {
            solver: "CG".into(),
            iterations: 3,
            residual: 1e-2,
        };
        assert_eq!(err.kind(), ErrorKind::SolverNonConvergence);
        assert!(err.to_string().contains("3 iterations"));
    }
}
