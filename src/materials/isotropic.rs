//! Isotropic linear elastic material

use serde::{Deserialize, Serialize};

use super::ModelState;
use crate::error::{FEAError, FEAResult};
use crate::math::{Mat, Vec as FEVec};

/// Isotropic material properties
///
/// The shear modulus is derived from `E` and `nu` and kept in sync by the
/// setters; it is never set directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IsotropicParameters", into = "IsotropicParameters")]
pub struct IsotropicMaterial {
    e: f64,
    nu: f64,
    g: f64,
    alpha: f64,
    mass_density: f64,
    weight_density: f64,
}

/// Raw isotropic constants as entered by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsotropicParameters {
    /// Young's modulus
    pub e: f64,
    /// Poisson's ratio
    pub nu: f64,
    /// Thermal expansion coefficient
    #[serde(default)]
    pub alpha: f64,
    /// Mass density
    #[serde(default)]
    pub mass_density: f64,
    /// Weight density
    #[serde(default)]
    pub weight_density: f64,
}

impl TryFrom<IsotropicParameters> for IsotropicMaterial {
    type Error = FEAError;

    fn try_from(p: IsotropicParameters) -> FEAResult<Self> {
        IsotropicMaterial::new(p.e, p.nu)?
            .with_thermal_expansion(p.alpha)?
            .with_density(p.mass_density, p.weight_density)
    }
}

impl From<IsotropicMaterial> for IsotropicParameters {
    fn from(m: IsotropicMaterial) -> Self {
        Self {
            e: m.e,
            nu: m.nu,
            alpha: m.alpha,
            mass_density: m.mass_density,
            weight_density: m.weight_density,
        }
    }
}

fn check_e(e: f64) -> FEAResult<()> {
    if !e.is_finite() || e < 0.0 {
        return Err(FEAError::invalid(format!(
            "Young's modulus must be >= 0, got {}",
            e
        )));
    }
    Ok(())
}

fn check_nu(nu: f64) -> FEAResult<()> {
    if !(0.0..0.5).contains(&nu) {
        return Err(FEAError::invalid(format!(
            "Poisson's ratio must be in [0, 0.5), got {}",
            nu
        )));
    }
    Ok(())
}

fn check_non_negative(name: &str, value: f64) -> FEAResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(FEAError::invalid(format!(
            "{} must be >= 0, got {}",
            name, value
        )));
    }
    Ok(())
}

impl IsotropicMaterial {
    /// Create a new isotropic material from E and nu
    /// G is calculated as E / (2 * (1 + nu))
    pub fn new(e: f64, nu: f64) -> FEAResult<Self> {
        check_e(e)?;
        check_nu(nu)?;
        Ok(Self {
            e,
            nu,
            g: e / (2.0 * (1.0 + nu)),
            alpha: 0.0,
            mass_density: 0.0,
            weight_density: 0.0,
        })
    }

    /// Set the thermal expansion coefficient
    pub fn with_thermal_expansion(mut self, alpha: f64) -> FEAResult<Self> {
        self.set_thermal_expansion(alpha)?;
        Ok(self)
    }

    /// Set mass and weight densities
    pub fn with_density(mut self, mass_density: f64, weight_density: f64) -> FEAResult<Self> {
        self.set_mass_density(mass_density)?;
        self.set_weight_density(weight_density)?;
        Ok(self)
    }

    /// Create a standard steel material (kN, m, °C)
    pub fn steel() -> Self {
        let (e, nu) = (2.1e8, 0.3);
        Self {
            e,
            nu,
            g: e / (2.0 * (1.0 + nu)),
            alpha: 1.2e-5,
            mass_density: 7.85,
            weight_density: 78.5,
        }
    }

    /// Create a standard concrete material from its compressive strength (kN/m²)
    pub fn concrete(fc: f64) -> FEAResult<Self> {
        check_non_negative("Compressive strength", fc)?;
        // ACI estimate: E = 4700 * sqrt(f'c in MPa) MPa
        let fc_mpa = fc / 1e3;
        let e = 4700.0 * fc_mpa.sqrt() * 1e3;
        Self::new(e, 0.2)?
            .with_thermal_expansion(1.0e-5)?
            .with_density(2.4, 24.0)
    }

    /// Create an aluminum material (6061-T6, kN, m, °C)
    pub fn aluminum() -> Self {
        let (e, nu) = (6.89e7, 0.33);
        Self {
            e,
            nu,
            g: e / (2.0 * (1.0 + nu)),
            alpha: 2.3e-5,
            mass_density: 2.7,
            weight_density: 26.5,
        }
    }

    pub fn youngs_modulus(&self) -> f64 {
        self.e
    }

    pub fn poissons_ratio(&self) -> f64 {
        self.nu
    }

    /// Shear modulus G = E / (2(1 + nu))
    pub fn shear_modulus(&self) -> f64 {
        self.g
    }

    pub fn thermal_expansion(&self) -> f64 {
        self.alpha
    }

    pub fn mass_density(&self) -> f64 {
        self.mass_density
    }

    pub fn weight_density(&self) -> f64 {
        self.weight_density
    }

    /// Update Young's modulus; the shear modulus follows
    pub fn set_youngs_modulus(&mut self, e: f64) -> FEAResult<()> {
        check_e(e)?;
        self.e = e;
        self.g = e / (2.0 * (1.0 + self.nu));
        Ok(())
    }

    /// Update Poisson's ratio; the shear modulus follows
    pub fn set_poissons_ratio(&mut self, nu: f64) -> FEAResult<()> {
        check_nu(nu)?;
        self.nu = nu;
        self.g = self.e / (2.0 * (1.0 + nu));
        Ok(())
    }

    pub fn set_thermal_expansion(&mut self, alpha: f64) -> FEAResult<()> {
        check_non_negative("Thermal expansion coefficient", alpha)?;
        self.alpha = alpha;
        Ok(())
    }

    pub fn set_mass_density(&mut self, rho: f64) -> FEAResult<()> {
        check_non_negative("Mass density", rho)?;
        self.mass_density = rho;
        Ok(())
    }

    pub fn set_weight_density(&mut self, gamma: f64) -> FEAResult<()> {
        check_non_negative("Weight density", gamma)?;
        self.weight_density = gamma;
        Ok(())
    }

    /// Constitutive (stiffness) matrix for the given modelling assumption
    pub fn stiffness(&self, state: ModelState) -> Mat {
        let e = self.e;
        let nu = self.nu;

        match state {
            ModelState::ThreeD => {
                let f = e / ((1.0 + nu) * (1.0 - 2.0 * nu));
                let d = 1.0 - nu;
                let s = 0.5 * (1.0 - 2.0 * nu);
                #[rustfmt::skip]
                let data = [
                    d,   nu,  nu,  0.0, 0.0, 0.0,
                    nu,  d,   nu,  0.0, 0.0, 0.0,
                    nu,  nu,  d,   0.0, 0.0, 0.0,
                    0.0, 0.0, 0.0, s,   0.0, 0.0,
                    0.0, 0.0, 0.0, 0.0, s,   0.0,
                    0.0, 0.0, 0.0, 0.0, 0.0, s,
                ];
                Mat::from_row_slice(6, 6, &data) * f
            }
            ModelState::PlaneStress => {
                let f = e / (1.0 - nu * nu);
                #[rustfmt::skip]
                let data = [
                    1.0, nu,  0.0,
                    nu,  1.0, 0.0,
                    0.0, 0.0, 0.5 * (1.0 - nu),
                ];
                Mat::from_row_slice(3, 3, &data) * f
            }
            ModelState::PlaneStrain => {
                let f = e / ((1.0 + nu) * (1.0 - 2.0 * nu));
                #[rustfmt::skip]
                let data = [
                    1.0 - nu, nu,       0.0,
                    nu,       1.0 - nu, 0.0,
                    0.0,      0.0,      0.5 * (1.0 - 2.0 * nu),
                ];
                Mat::from_row_slice(3, 3, &data) * f
            }
        }
    }

    /// Compliance matrix, the inverse of [`stiffness`](Self::stiffness)
    pub fn compliance(&self, state: ModelState) -> FEAResult<Mat> {
        if self.e <= 0.0 {
            return Err(FEAError::singular(
                "compliance undefined for a material with zero Young's modulus",
            ));
        }
        let e = self.e;
        let nu = self.nu;

        let s = match state {
            ModelState::ThreeD => {
                let sh = 2.0 * (1.0 + nu);
                #[rustfmt::skip]
                let data = [
                    1.0, -nu, -nu, 0.0, 0.0, 0.0,
                    -nu, 1.0, -nu, 0.0, 0.0, 0.0,
                    -nu, -nu, 1.0, 0.0, 0.0, 0.0,
                    0.0, 0.0, 0.0, sh,  0.0, 0.0,
                    0.0, 0.0, 0.0, 0.0, sh,  0.0,
                    0.0, 0.0, 0.0, 0.0, 0.0, sh,
                ];
                Mat::from_row_slice(6, 6, &data) / e
            }
            ModelState::PlaneStress => {
                #[rustfmt::skip]
                let data = [
                    1.0, -nu, 0.0,
                    -nu, 1.0, 0.0,
                    0.0, 0.0, 2.0 * (1.0 + nu),
                ];
                Mat::from_row_slice(3, 3, &data) / e
            }
            ModelState::PlaneStrain => {
                #[rustfmt::skip]
                let data = [
                    1.0 - nu, -nu,      0.0,
                    -nu,      1.0 - nu, 0.0,
                    0.0,      0.0,      2.0,
                ];
                Mat::from_row_slice(3, 3, &data) * ((1.0 + nu) / e)
            }
        };
        Ok(s)
    }

    /// Thermal strain per unit temperature change
    pub fn thermal_vector(&self, state: ModelState) -> FEVec {
        let mut v = FEVec::zeros(state.strain_components());
        for i in 0..state.normal_components() {
            v[i] = self.alpha;
        }
        v
    }
}
