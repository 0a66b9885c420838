//! Assembled structural matrices handed in by the element layer

use std::fmt;

use crate::error::{FEAError, FEAResult};
use crate::math::{Mat, Vec as FEVec};

/// Supplies the geometric stiffness for a reference displacement field
///
/// Implemented for any `Fn(&Vec) -> FEAResult<Mat>` closure.
pub trait GeometricStiffness: Send + Sync {
    /// Geometric stiffness `K_G` for the full-length displacement `u`
    fn geometric_stiffness(&self, displacement: &FEVec) -> FEAResult<Mat>;
}

impl<F> GeometricStiffness for F
where
    F: Fn(&FEVec) -> FEAResult<Mat> + Send + Sync,
{
    fn geometric_stiffness(&self, displacement: &FEVec) -> FEAResult<Mat> {
        self(displacement)
    }
}

/// Global stiffness with optional mass and geometric stiffness
pub struct StructuralSystem {
    stiffness: Mat,
    mass: Option<Mat>,
    geometric: Option<Box<dyn GeometricStiffness>>,
}

impl StructuralSystem {
    pub fn new(stiffness: Mat) -> FEAResult<Self> {
        if !stiffness.is_square() {
            return Err(FEAError::incompatible(format!(
                "stiffness matrix is {}x{}, expected square",
                stiffness.nrows(),
                stiffness.ncols()
            )));
        }
        Ok(Self {
            stiffness,
            mass: None,
            geometric: None,
        })
    }

    pub fn with_mass(mut self, mass: Mat) -> FEAResult<Self> {
        let n = self.dofs();
        if mass.nrows() != n || mass.ncols() != n {
            return Err(FEAError::incompatible(format!(
                "mass matrix is {}x{}, stiffness has {} DOFs",
                mass.nrows(),
                mass.ncols(),
                n
            )));
        }
        self.mass = Some(mass);
        Ok(self)
    }

    pub fn with_geometric_stiffness(mut self, provider: impl GeometricStiffness + 'static) -> Self {
        self.geometric = Some(Box::new(provider));
        self
    }

    /// Number of global DOFs
    pub fn dofs(&self) -> usize {
        self.stiffness.nrows()
    }

    pub fn stiffness(&self) -> &Mat {
        &self.stiffness
    }

    pub fn mass(&self) -> Option<&Mat> {
        self.mass.as_ref()
    }

    pub fn geometric(&self) -> Option<&dyn GeometricStiffness> {
        self.geometric.as_deref()
    }

    pub(crate) fn require_mass(&self, analysis: &str) -> FEAResult<&Mat> {
        self.mass.as_ref().ok_or_else(|| {
            FEAError::incompatible(format!("{} analysis needs a mass matrix", analysis))
        })
    }

    /// Geometric stiffness at `displacement`, checked against the system size
    pub(crate) fn geometric_stiffness(&self, displacement: &FEVec) -> FEAResult<Mat> {
        let provider = self.geometric.as_ref().ok_or_else(|| {
            FEAError::incompatible("buckling analysis needs a geometric stiffness provider")
        })?;
        let kg = provider.geometric_stiffness(displacement)?;
        let n = self.dofs();
        if kg.nrows() != n || kg.ncols() != n {
            return Err(FEAError::incompatible(format!(
                "geometric stiffness is {}x{}, stiffness has {} DOFs",
                kg.nrows(),
                kg.ncols(),
                n
            )));
        }
        Ok(kg)
    }
}

impl fmt::Debug for StructuralSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuralSystem")
            .field("dofs", &self.dofs())
            .field("mass", &self.mass.is_some())
            .field("geometric", &self.geometric.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_dimension_checks() {
        let err = StructuralSystem::new(Mat::zeros(2, 3)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompatibleConfiguration);

        let err = StructuralSystem::new(Mat::identity(3, 3))
            .unwrap()
            .with_mass(Mat::identity(2, 2))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompatibleConfiguration);
    }

    #[test]
    fn test_geometric_provider() {
        let system = StructuralSystem::new(Mat::identity(2, 2))
            .unwrap()
            .with_geometric_stiffness(|u: &FEVec| -> FEAResult<Mat> { Ok(Mat::from_diagonal(&(-u))) });
        let kg = system
            .geometric_stiffness(&FEVec::from_vec(vec![1.0, 2.0]))
            .unwrap();
        assert_eq!(kg[(1, 1)], -2.0);

        let bad = StructuralSystem::new(Mat::identity(2, 2))
            .unwrap()
            .with_geometric_stiffness(|_: &FEVec| -> FEAResult<Mat> { Ok(Mat::zeros(3, 3)) });
        assert!(bad.geometric_stiffness(&FEVec::zeros(2)).is_err());
        assert!(StructuralSystem::new(Mat::identity(2, 2))
            .unwrap()
            .require_mass("Modal")
            .is_err());
    }
}
