//! Rayleigh damping
//!
//! C = alpha0 * M + beta0 * K
//!
//! The modal damping ratio at circular frequency w is
//! xi(w) = alpha0 / (2 w) + beta0 * w / 2.

use serde::{Deserialize, Serialize};

use crate::error::{FEAError, FEAResult};
use crate::math::Mat;

/// Mass- and stiffness-proportional damping coefficients
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "RayleighCoefficients")]
pub struct RayleighDamping {
    alpha0: f64,
    beta0: f64,
}

/// Unvalidated coefficients as read from configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RayleighCoefficients {
    pub alpha0: f64,
    pub beta0: f64,
}

impl RayleighDamping {
    /// Damping given directly by its coefficients
    pub fn new(alpha0: f64, beta0: f64) -> FEAResult<Self> {
        if !alpha0.is_finite() || !beta0.is_finite() {
            return Err(FEAError::invalid(format!(
                "Rayleigh coefficients must be finite, got alpha0={}, beta0={}",
                alpha0, beta0
            )));
        }
        Ok(Self { alpha0, beta0 })
    }

    /// No damping
    pub fn undamped() -> Self {
        Self::default()
    }

    /// Coefficients that give damping ratio `xi1` at `omega1` and `xi2` at
    /// `omega2` (circular frequencies, rad/s)
    pub fn from_frequencies(omega1: f64, xi1: f64, omega2: f64, xi2: f64) -> FEAResult<Self> {
        for (name, w) in [("omega1", omega1), ("omega2", omega2)] {
            if !(w.is_finite() && w > 0.0) {
                return Err(FEAError::invalid(format!(
                    "{} must be a positive frequency, got {}",
                    name, w
                )));
            }
        }
        if omega1 == omega2 {
            return Err(FEAError::invalid(
                "two distinct frequencies are needed to fit Rayleigh damping",
            ));
        }

        let beta0 = 2.0 * (omega1 * xi1 - omega2 * xi2) / (omega1 * omega1 - omega2 * omega2);
        let alpha0 = 2.0 * omega1 * xi1 - beta0 * omega1 * omega1;
        Self::new(alpha0, beta0)
    }

    /// Same as [`from_frequencies`](Self::from_frequencies) with frequencies in Hz
    pub fn from_frequencies_hz(f1: f64, xi1: f64, f2: f64, xi2: f64) -> FEAResult<Self> {
        let two_pi = 2.0 * std::f64::consts::PI;
        Self::from_frequencies(two_pi * f1, xi1, two_pi * f2, xi2)
    }

    pub fn alpha0(&self) -> f64 {
        self.alpha0
    }

    pub fn beta0(&self) -> f64 {
        self.beta0
    }

    pub fn is_undamped(&self) -> bool {
        self.alpha0 == 0.0 && self.beta0 == 0.0
    }

    /// Damping ratio at circular frequency `omega`
    pub fn damping_ratio(&self, omega: f64) -> f64 {
        self.alpha0 / (2.0 * omega) + self.beta0 * omega / 2.0
    }

    /// Damping matrix from mass and stiffness
    pub fn matrix(&self, mass: &Mat, stiffness: &Mat) -> Mat {
        mass * self.alpha0 + stiffness * self.beta0
    }
}

impl TryFrom<RayleighCoefficients> for RayleighDamping {
    type Error = FEAError;

    fn try_from(c: RayleighCoefficients) -> FEAResult<Self> {
        Self::new(c.alpha0, c.beta0)
    }
}
