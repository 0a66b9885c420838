//! Orthotropic linear elastic material
//!
//! Defined by nine independent engineering constants along the material
//! axes 1, 2, 3. The 3D compliance is assembled directly from the constants
//! and the stiffness is obtained by inverting it.

use serde::{Deserialize, Serialize};

use super::ModelState;
use crate::error::{FEAError, FEAResult};
use crate::math::{Mat, Mat3, Mat6, Vec as FEVec};

/// Near-zero threshold for the reciprocity and degeneracy checks
const DEGENERACY_TOL: f64 = 1e-12;

/// Orthotropic material properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OrthotropicParameters", into = "OrthotropicParameters")]
pub struct OrthotropicMaterial {
    /// Young's moduli [E1, E2, E3]
    e: [f64; 3],
    /// Major Poisson's ratios [nu12, nu13, nu23]
    nu: [f64; 3],
    /// Shear moduli [G12, G13, G23]
    g: [f64; 3],
    /// Thermal expansion [alpha1, alpha2, alpha3]
    alpha: Option<[f64; 3]>,
    mass_density: f64,
    weight_density: f64,
}

/// Raw orthotropic constants as entered by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrthotropicParameters {
    pub e: [f64; 3],
    pub nu: [f64; 3],
    pub g: [f64; 3],
    #[serde(default)]
    pub alpha: Option<[f64; 3]>,
    #[serde(default)]
    pub mass_density: f64,
    #[serde(default)]
    pub weight_density: f64,
}

impl TryFrom<OrthotropicParameters> for OrthotropicMaterial {
    type Error = FEAError;

    fn try_from(p: OrthotropicParameters) -> FEAResult<Self> {
        let mut mat = OrthotropicMaterial::new(p.e, p.nu, p.g)?;
        if let Some(alpha) = p.alpha {
            mat = mat.with_thermal_expansion(alpha)?;
        }
        mat.with_density(p.mass_density, p.weight_density)
    }
}

impl From<OrthotropicMaterial> for OrthotropicParameters {
    fn from(m: OrthotropicMaterial) -> Self {
        Self {
            e: m.e,
            nu: m.nu,
            g: m.g,
            alpha: m.alpha,
            mass_density: m.mass_density,
            weight_density: m.weight_density,
        }
    }
}

fn check_positive(name: &str, values: &[f64; 3]) -> FEAResult<()> {
    for (i, &v) in values.iter().enumerate() {
        if !v.is_finite() || v <= 0.0 {
            return Err(FEAError::invalid(format!(
                "{} component {} must be > 0, got {}",
                name,
                i + 1,
                v
            )));
        }
    }
    Ok(())
}

impl OrthotropicMaterial {
    /// Create an orthotropic material
    ///
    /// # Arguments
    /// * `e` - Young's moduli [E1, E2, E3]
    /// * `nu` - Poisson's ratios [nu12, nu13, nu23]
    /// * `g` - Shear moduli [G12, G13, G23]
    pub fn new(e: [f64; 3], nu: [f64; 3], g: [f64; 3]) -> FEAResult<Self> {
        let mat = Self {
            e,
            nu,
            g,
            alpha: None,
            mass_density: 0.0,
            weight_density: 0.0,
        };
        mat.validate()?;
        Ok(mat)
    }

    /// Set thermal expansion coefficients along the material axes
    pub fn with_thermal_expansion(mut self, alpha: [f64; 3]) -> FEAResult<Self> {
        check_positive("Thermal expansion", &alpha)?;
        self.alpha = Some(alpha);
        Ok(self)
    }

    /// Set mass and weight densities
    pub fn with_density(mut self, mass_density: f64, weight_density: f64) -> FEAResult<Self> {
        for (name, v) in [("Mass density", mass_density), ("Weight density", weight_density)] {
            if !v.is_finite() || v < 0.0 {
                return Err(FEAError::invalid(format!("{} must be >= 0, got {}", name, v)));
            }
        }
        self.mass_density = mass_density;
        self.weight_density = weight_density;
        Ok(self)
    }

    pub fn youngs_moduli(&self) -> [f64; 3] {
        self.e
    }

    pub fn poissons_ratios(&self) -> [f64; 3] {
        self.nu
    }

    pub fn shear_moduli(&self) -> [f64; 3] {
        self.g
    }

    pub fn thermal_expansion(&self) -> Option<[f64; 3]> {
        self.alpha
    }

    pub fn mass_density(&self) -> f64 {
        self.mass_density
    }

    pub fn weight_density(&self) -> f64 {
        self.weight_density
    }

    /// Replace the Young's moduli, keeping the old values if the result is invalid
    pub fn set_youngs_moduli(&mut self, e: [f64; 3]) -> FEAResult<()> {
        let candidate = Self { e, ..self.clone() };
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }

    /// Replace the Poisson's ratios, keeping the old values if the result is invalid
    pub fn set_poissons_ratios(&mut self, nu: [f64; 3]) -> FEAResult<()> {
        let candidate = Self { nu, ..self.clone() };
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }

    /// Replace the shear moduli
    pub fn set_shear_moduli(&mut self, g: [f64; 3]) -> FEAResult<()> {
        check_positive("Shear modulus", &g)?;
        self.g = g;
        Ok(())
    }

    /// Minor Poisson's ratios [nu21, nu31, nu32] from reciprocity
    pub fn reciprocal_ratios(&self) -> [f64; 3] {
        let [e1, e2, e3] = self.e;
        let [nu12, nu13, nu23] = self.nu;
        [nu12 * e2 / e1, nu13 * e3 / e1, nu23 * e3 / e2]
    }

    /// Poisson's ratio nu_ij for material axes i, j in 1..=3
    fn ratio(&self, i: usize, j: usize) -> f64 {
        let [nu12, nu13, nu23] = self.nu;
        let [nu21, nu31, nu32] = self.reciprocal_ratios();
        match (i, j) {
            (1, 2) => nu12,
            (1, 3) => nu13,
            (2, 3) => nu23,
            (2, 1) => nu21,
            (3, 1) => nu31,
            (3, 2) => nu32,
            _ => 0.0,
        }
    }

    fn validate(&self) -> FEAResult<()> {
        check_positive("Young's modulus", &self.e)?;
        check_positive("Poisson's ratio", &self.nu)?;
        check_positive("Shear modulus", &self.g)?;

        for (i, j) in [(1, 2), (1, 3), (2, 3)] {
            let v = 1.0 - self.ratio(i, j) * self.ratio(j, i);
            if v.abs() < DEGENERACY_TOL {
                return Err(FEAError::invalid(format!(
                    "1 - nu{i}{j}*nu{j}{i} must not vanish"
                )));
            }
        }

        for (i, j, k) in [(1, 2, 3), (2, 3, 1), (3, 1, 2)] {
            let v = self.ratio(j, i) + self.ratio(k, i) * self.ratio(k, j);
            if v.abs() < DEGENERACY_TOL {
                return Err(FEAError::invalid(format!(
                    "nu{j}{i} + nu{k}{i}*nu{k}{j} must not vanish"
                )));
            }
        }

        let [nu12, nu13, nu23] = self.nu;
        let [nu21, nu31, nu32] = self.reciprocal_ratios();
        let det = 1.0 - nu12 * nu21 - nu23 * nu32 - nu31 * nu13 - 2.0 * nu12 * nu23 * nu31;
        if det.abs() < DEGENERACY_TOL {
            return Err(FEAError::invalid(
                "compliance determinant 1 - nu12*nu21 - nu23*nu32 - nu31*nu13 - 2*nu12*nu23*nu31 vanishes",
            ));
        }

        Ok(())
    }

    /// 3D compliance in Voigt order [11, 22, 33, 12, 23, 13]
    fn compliance_3d(&self) -> Mat6 {
        let [e1, e2, e3] = self.e;
        let [nu12, nu13, nu23] = self.nu;
        let [g12, g13, g23] = self.g;
        let [nu21, nu31, nu32] = self.reciprocal_ratios();

        #[rustfmt::skip]
        let s = Mat6::new(
            1.0 / e1,    -nu21 / e2,  -nu31 / e3,  0.0,       0.0,       0.0,
            -nu12 / e1,  1.0 / e2,    -nu32 / e3,  0.0,       0.0,       0.0,
            -nu13 / e1,  -nu23 / e2,  1.0 / e3,    0.0,       0.0,       0.0,
            0.0,         0.0,         0.0,         1.0 / g12, 0.0,       0.0,
            0.0,         0.0,         0.0,         0.0,       1.0 / g23, 0.0,
            0.0,         0.0,         0.0,         0.0,       0.0,       1.0 / g13,
        );
        s
    }

    fn stiffness_3d(&self) -> FEAResult<Mat6> {
        self.compliance_3d()
            .try_inverse()
            .ok_or_else(|| FEAError::singular("orthotropic compliance is not invertible"))
    }

    /// In-plane compliance for plane stress: rows/cols [11, 22, 12] of the 3D compliance
    fn compliance_plane_stress(&self) -> Mat3 {
        let s = self.compliance_3d();
        Mat3::new(
            s[(0, 0)], s[(0, 1)], 0.0,
            s[(1, 0)], s[(1, 1)], 0.0,
            0.0, 0.0, s[(3, 3)],
        )
    }

    /// In-plane stiffness for plane strain: rows/cols [11, 22, 12] of the 3D stiffness
    fn stiffness_plane_strain(&self) -> FEAResult<Mat3> {
        let c = self.stiffness_3d()?;
        let idx = [0, 1, 3];
        Ok(Mat3::from_fn(|i, j| c[(idx[i], idx[j])]))
    }

    /// Constitutive (stiffness) matrix for the given modelling assumption
    pub fn stiffness(&self, state: ModelState) -> FEAResult<Mat> {
        match state {
            ModelState::ThreeD => Ok(to_dynamic(&self.stiffness_3d()?)),
            ModelState::PlaneStress => self
                .compliance_plane_stress()
                .try_inverse()
                .map(|c| to_dynamic(&c))
                .ok_or_else(|| FEAError::singular("plane stress compliance is not invertible")),
            ModelState::PlaneStrain => Ok(to_dynamic(&self.stiffness_plane_strain()?)),
        }
    }

    /// Compliance matrix, the inverse of [`stiffness`](Self::stiffness)
    pub fn compliance(&self, state: ModelState) -> FEAResult<Mat> {
        match state {
            ModelState::ThreeD => Ok(to_dynamic(&self.compliance_3d())),
            ModelState::PlaneStress => Ok(to_dynamic(&self.compliance_plane_stress())),
            ModelState::PlaneStrain => self
                .stiffness_plane_strain()?
                .try_inverse()
                .map(|s| to_dynamic(&s))
                .ok_or_else(|| FEAError::singular("plane strain stiffness is not invertible")),
        }
    }

    /// Thermal strain per unit temperature change
    pub fn thermal_vector(&self, state: ModelState) -> FEVec {
        let mut v = FEVec::zeros(state.strain_components());
        if let Some(alpha) = self.alpha {
            for i in 0..state.normal_components() {
                v[i] = alpha[i];
            }
        }
        v
    }
}

fn to_dynamic<const N: usize>(m: &nalgebra::SMatrix<f64, N, N>) -> Mat {
    Mat::from_fn(N, N, |i, j| m[(i, j)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn timber() -> OrthotropicMaterial {
        OrthotropicMaterial::new(
            [12000.0, 800.0, 400.0],
            [0.35, 0.4, 0.45],
            [700.0, 650.0, 60.0],
        )
        .unwrap()
    }

    #[test]
    fn test_reciprocity() {
        let mat = timber();
        let [nu21, nu31, nu32] = mat.reciprocal_ratios();
        assert_relative_eq!(nu21, 0.35 * 800.0 / 12000.0);
        assert_relative_eq!(nu31, 0.4 * 400.0 / 12000.0);
        assert_relative_eq!(nu32, 0.45 * 400.0 / 800.0);
    }

    #[test]
    fn test_stiffness_is_symmetric() {
        let mat = timber();
        for state in [ModelState::ThreeD, ModelState::PlaneStress, ModelState::PlaneStrain] {
            let c = mat.stiffness(state).unwrap();
            for i in 0..c.nrows() {
                for j in 0..c.ncols() {
                    assert_relative_eq!(c[(i, j)], c[(j, i)], max_relative = 1e-10);
                }
            }
        }
    }

    #[test]
    fn test_degenerate_set_rejected() {
        let err = OrthotropicMaterial::new([200.0; 3], [0.5; 3], [1.0; 3]).unwrap_err();
        assert!(matches!(err, FEAError::InvalidParameter(_)));
    }

    #[test]
    fn test_non_positive_constants_rejected() {
        assert!(OrthotropicMaterial::new([0.0, 1.0, 1.0], [0.3; 3], [1.0; 3]).is_err());
        assert!(OrthotropicMaterial::new([1.0; 3], [0.3, 0.0, 0.3], [1.0; 3]).is_err());
        assert!(OrthotropicMaterial::new([1.0; 3], [0.3; 3], [1.0, -1.0, 1.0]).is_err());
        assert!(timber().with_thermal_expansion([1e-5, 0.0, 1e-5]).is_err());
    }

    #[test]
    fn test_setter_keeps_valid_state() {
        let mut mat = OrthotropicMaterial::new([200.0; 3], [0.3; 3], [80.0; 3]).unwrap();
        assert!(mat.set_poissons_ratios([0.5; 3]).is_err());
        assert_eq!(mat.poissons_ratios(), [0.3; 3]);
        mat.set_youngs_moduli([100.0, 200.0, 300.0]).unwrap();
        assert_eq!(mat.youngs_moduli(), [100.0, 200.0, 300.0]);
    }

    #[test]
    fn test_thermal_vector_optional() {
        let mat = timber();
        assert_relative_eq!(mat.thermal_vector(ModelState::ThreeD).norm(), 0.0);
        let mat = mat.with_thermal_expansion([4e-6, 3e-5, 3.5e-5]).unwrap();
        let v = mat.thermal_vector(ModelState::PlaneStress);
        assert_relative_eq!(v[0], 4e-6);
        assert_relative_eq!(v[1], 3e-5);
        assert_relative_eq!(v[2], 0.0);
    }
}
