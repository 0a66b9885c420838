//! Material constitutive models
//!
//! Every material answers the same questions for a modelling assumption
//! ([`ModelState`]): the stiffness relating strain to stress, its inverse
//! (the compliance), and the thermal strain per unit temperature change.

mod isotropic;
mod orthotropic;

use serde::{Deserialize, Serialize};

use crate::error::FEAResult;
use crate::math::{Mat, Vec as FEVec};

pub use isotropic::{IsotropicMaterial, IsotropicParameters};
pub use orthotropic::{OrthotropicMaterial, OrthotropicParameters};

/// Continuum idealization used when evaluating a constitutive law
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelState {
    /// Full 3D continuum, 6 strain components
    ThreeD,
    /// Thin body with zero out-of-plane stress, 3 strain components
    PlaneStress,
    /// Constrained body with zero out-of-plane strain, 3 strain components
    PlaneStrain,
}

impl ModelState {
    /// Number of strain (and stress) components in Voigt notation
    pub fn strain_components(self) -> usize {
        match self {
            ModelState::ThreeD => 6,
            ModelState::PlaneStress | ModelState::PlaneStrain => 3,
        }
    }

    /// Number of normal (non-shear) components
    pub fn normal_components(self) -> usize {
        match self {
            ModelState::ThreeD => 3,
            ModelState::PlaneStress | ModelState::PlaneStrain => 2,
        }
    }
}

/// Kind of material, for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialType {
    Isotropic,
    Orthotropic,
}

/// A linear elastic material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Material {
    Isotropic(IsotropicMaterial),
    Orthotropic(OrthotropicMaterial),
}

impl Material {
    /// Which family this material belongs to
    pub fn material_type(&self) -> MaterialType {
        match self {
            Material::Isotropic(_) => MaterialType::Isotropic,
            Material::Orthotropic(_) => MaterialType::Orthotropic,
        }
    }

    /// Stress-strain stiffness matrix
    pub fn stiffness(&self, state: ModelState) -> FEAResult<Mat> {
        match self {
            Material::Isotropic(m) => Ok(m.stiffness(state)),
            Material::Orthotropic(m) => m.stiffness(state),
        }
    }

    /// Strain-stress compliance matrix
    pub fn compliance(&self, state: ModelState) -> FEAResult<Mat> {
        match self {
            Material::Isotropic(m) => m.compliance(state),
            Material::Orthotropic(m) => m.compliance(state),
        }
    }

    /// Thermal strain per unit temperature change
    pub fn thermal_vector(&self, state: ModelState) -> FEVec {
        match self {
            Material::Isotropic(m) => m.thermal_vector(state),
            Material::Orthotropic(m) => m.thermal_vector(state),
        }
    }

    /// Initial stress caused by a temperature change with all strain restrained
    ///
    /// sigma_0 = D * alpha * dT
    pub fn thermal_stress(&self, state: ModelState, delta_t: f64) -> FEAResult<FEVec> {
        let d = self.stiffness(state)?;
        Ok(d * self.thermal_vector(state) * delta_t)
    }

    pub fn mass_density(&self) -> f64 {
        match self {
            Material::Isotropic(m) => m.mass_density(),
            Material::Orthotropic(m) => m.mass_density(),
        }
    }

    pub fn weight_density(&self) -> f64 {
        match self {
            Material::Isotropic(m) => m.weight_density(),
            Material::Orthotropic(m) => m.weight_density(),
        }
    }
}

impl From<IsotropicMaterial> for Material {
    fn from(m: IsotropicMaterial) -> Self {
        Material::Isotropic(m)
    }
}

impl From<OrthotropicMaterial> for Material {
    fn from(m: OrthotropicMaterial) -> Self {
        Material::Orthotropic(m)
    }
}

impl Default for Material {
    fn default() -> Self {
        Material::Isotropic(IsotropicMaterial::steel())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_identity(m: &Mat) {
        for i in 0..m.nrows() {
            for j in 0..m.ncols() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(m[(i, j)], expected, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_isotropic_round_trip_all_states() {
        let mat: Material = IsotropicMaterial::new(210.0, 0.3).unwrap().into();
        for state in [ModelState::ThreeD, ModelState::PlaneStress, ModelState::PlaneStrain] {
            let c = mat.stiffness(state).unwrap();
            let s = mat.compliance(state).unwrap();
            assert_identity(&(c * s));
        }
    }

    #[test]
    fn test_orthotropic_round_trip_all_states() {
        let mat: Material = OrthotropicMaterial::new(
            [140.0, 10.0, 10.0],
            [0.3, 0.3, 0.45],
            [5.0, 5.0, 3.4],
        )
        .unwrap()
        .into();
        assert_eq!(mat.material_type(), MaterialType::Orthotropic);
        for state in [ModelState::ThreeD, ModelState::PlaneStress, ModelState::PlaneStrain] {
            let c = mat.stiffness(state).unwrap();
            let s = mat.compliance(state).unwrap();
            assert_identity(&(c * s));
        }
    }

    #[test]
    fn test_orthotropic_with_equal_constants_matches_isotropic() {
        let (e, nu) = (100.0, 0.25);
        let g = e / (2.0 * (1.0 + nu));
        let ortho = OrthotropicMaterial::new([e; 3], [nu; 3], [g; 3]).unwrap();
        let iso = IsotropicMaterial::new(e, nu).unwrap();
        for state in [ModelState::ThreeD, ModelState::PlaneStress, ModelState::PlaneStrain] {
            let a = ortho.stiffness(state).unwrap();
            let b = iso.stiffness(state);
            assert!((a - b).amax() < 1e-9);
        }
    }

    #[test]
    fn test_thermal_stress() {
        let mat: Material = IsotropicMaterial::new(200.0, 0.0)
            .unwrap()
            .with_thermal_expansion(1e-5)
            .unwrap()
            .into();
        let sigma = mat.thermal_stress(ModelState::PlaneStress, 10.0).unwrap();
        assert_relative_eq!(sigma[0], 200.0 * 1e-5 * 10.0, max_relative = 1e-12);
        assert_relative_eq!(sigma[2], 0.0);
    }

    #[test]
    fn test_material_json_validation() {
        let ok = r#"{"type":"Isotropic","e":200.0,"nu":0.3}"#;
        let mat: Material = serde_json::from_str(ok).unwrap();
        assert_eq!(mat.material_type(), MaterialType::Isotropic);

        let bad = r#"{"type":"Isotropic","e":200.0,"nu":0.7}"#;
        assert!(serde_json::from_str::<Material>(bad).is_err());

        let degenerate = r#"{"type":"Orthotropic","e":[200,200,200],"nu":[0.5,0.5,0.5],"g":[1,1,1]}"#;
        assert!(serde_json::from_str::<Material>(degenerate).is_err());
    }
}
