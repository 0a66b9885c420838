//! Load-time functions
//!
//! A transient analysis applies its combined load pattern scaled by `f(t)`.

use serde::{Deserialize, Serialize};

use crate::error::{FEAError, FEAResult};

/// Time history multiplier of a load pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LoadFunctionDef")]
pub enum LoadFunction {
    /// Same value at every time
    Constant(f64),
    /// Piecewise linear through `(time, value)` points
    Table(Vec<(f64, f64)>),
    /// `amplitude * sin(omega * t + phase)`
    Harmonic { amplitude: f64, omega: f64, phase: f64 },
}

/// Serialized form of [`LoadFunction`], checked on conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LoadFunctionDef {
    Constant(f64),
    Table(Vec<(f64, f64)>),
    Harmonic { amplitude: f64, omega: f64, phase: f64 },
}

impl LoadFunction {
    pub fn constant(value: f64) -> FEAResult<Self> {
        LoadFunctionDef::Constant(value).try_into()
    }

    /// Tabulated function, at least two points with strictly increasing time
    pub fn table(points: Vec<(f64, f64)>) -> FEAResult<Self> {
        LoadFunctionDef::Table(points).try_into()
    }

    pub fn harmonic(amplitude: f64, omega: f64, phase: f64) -> FEAResult<Self> {
        LoadFunctionDef::Harmonic {
            amplitude,
            omega,
            phase,
        }
        .try_into()
    }

    /// Re-check the parameters of a function built from its variants
    pub fn validate(&self) -> FEAResult<()> {
        match self {
            LoadFunction::Constant(v) => {
                if !v.is_finite() {
                    return Err(FEAError::invalid("constant load function must be finite"));
                }
            }
            LoadFunction::Harmonic {
                amplitude,
                omega,
                phase,
            } => {
                if !(amplitude.is_finite() && omega.is_finite() && phase.is_finite()) {
                    return Err(FEAError::invalid(
                        "harmonic load function parameters must be finite",
                    ));
                }
            }
            LoadFunction::Table(points) => {
                if points.len() < 2 {
                    return Err(FEAError::invalid(
                        "tabulated load function needs at least two points",
                    ));
                }
                if points.iter().any(|(t, v)| !t.is_finite() || !v.is_finite()) {
                    return Err(FEAError::invalid(
                        "tabulated load function points must be finite",
                    ));
                }
                if points.windows(2).any(|w| w[1].0 <= w[0].0) {
                    return Err(FEAError::invalid(
                        "tabulated load function times must be strictly increasing",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Time interval on which the function is defined
    ///
    /// An empty table has an empty support.
    pub fn support(&self) -> (f64, f64) {
        match self {
            LoadFunction::Table(points) => match (points.first(), points.last()) {
                (Some(first), Some(last)) => (first.0, last.0),
                _ => (f64::INFINITY, f64::NEG_INFINITY),
            },
            _ => (f64::NEG_INFINITY, f64::INFINITY),
        }
    }

    /// Function value at time `t`, `None` outside the support
    pub fn value_at(&self, t: f64) -> Option<f64> {
        match self {
            LoadFunction::Constant(v) => Some(*v),
            LoadFunction::Harmonic {
                amplitude,
                omega,
                phase,
            } => Some(amplitude * (omega * t + phase).sin()),
            LoadFunction::Table(points) => {
                let (t0, t1) = self.support();
                if t < t0 || t > t1 {
                    return None;
                }
                // first point at or after t
                let idx = points.partition_point(|p| p.0 < t);
                let &(tb, vb) = points.get(idx)?;
                if tb == t {
                    return Some(vb);
                }
                let &(ta, va) = points.get(idx.checked_sub(1)?)?;
                Some(va + (vb - va) * (t - ta) / (tb - ta))
            }
        }
    }

    /// First time derivative at `t`, `None` outside the support
    ///
    /// A table is differentiated segment by segment; at a knot the slope of
    /// the segment starting there is used, at the last point the slope of
    /// the last segment.
    pub fn derivative_at(&self, t: f64) -> Option<f64> {
        match self {
            LoadFunction::Constant(_) => Some(0.0),
            LoadFunction::Harmonic {
                amplitude,
                omega,
                phase,
            } => Some(amplitude * omega * (omega * t + phase).cos()),
            LoadFunction::Table(points) => {
                let (t0, t1) = self.support();
                if t < t0 || t > t1 {
                    return None;
                }
                let start = points
                    .partition_point(|p| p.0 <= t)
                    .min(points.len().saturating_sub(1))
                    .max(1);
                match (points.get(start - 1), points.get(start)) {
                    (Some(&(ta, va)), Some(&(tb, vb))) => Some((vb - va) / (tb - ta)),
                    _ => Some(0.0),
                }
            }
        }
    }

    /// Second time derivative at `t`, `None` outside the support
    ///
    /// Zero inside every segment of a table; the slope jumps at knots are
    /// not represented.
    pub fn second_derivative_at(&self, t: f64) -> Option<f64> {
        match self {
            LoadFunction::Harmonic {
                amplitude,
                omega,
                phase,
            } => Some(-amplitude * omega * omega * (omega * t + phase).sin()),
            _ => self.value_at(t).map(|_| 0.0),
        }
    }

    /// Check that every sample `k * dt` for `k = 0..=n` lies in the support
    pub fn check_grid(&self, n: usize, dt: f64) -> FEAResult<()> {
        let (t0, t1) = self.support();
        let end = n as f64 * dt;
        // grid times are computed as k*dt, allow rounding at the last sample
        let slack = 1e-9 * end.abs().max(dt.abs());
        if t0 > slack || end > t1 + slack {
            return Err(FEAError::incompatible(format!(
                "load function defined on [{}, {}] does not cover [0, {}]",
                t0, t1, end
            )));
        }
        Ok(())
    }

    /// Value at a grid time, clamped to the support
    ///
    /// Used after [`check_grid`](Self::check_grid) so that rounding at the
    /// ends of the grid does not fall outside a table.
    pub(crate) fn sample(&self, t: f64) -> f64 {
        self.value_at(self.clamp(t)).unwrap_or(0.0)
    }

    /// Value and first two derivatives at a grid time, clamped like [`sample`](Self::sample)
    pub(crate) fn sample_motion(&self, t: f64) -> (f64, f64, f64) {
        let t = self.clamp(t);
        (
            self.value_at(t).unwrap_or(0.0),
            self.derivative_at(t).unwrap_or(0.0),
            self.second_derivative_at(t).unwrap_or(0.0),
        )
    }

    fn clamp(&self, t: f64) -> f64 {
        let (t0, t1) = self.support();
        if t0 <= t1 {
            t.clamp(t0, t1)
        } else {
            t
        }
    }
}

impl Default for LoadFunction {
    fn default() -> Self {
        LoadFunction::Constant(1.0)
    }
}

impl TryFrom<LoadFunctionDef> for LoadFunction {
    type Error = FEAError;

    fn try_from(def: LoadFunctionDef) -> FEAResult<Self> {
        let function = match def {
            LoadFunctionDef::Constant(v) => LoadFunction::Constant(v),
            LoadFunctionDef::Table(points) => LoadFunction::Table(points),
            LoadFunctionDef::Harmonic {
                amplitude,
                omega,
                phase,
            } => LoadFunction::Harmonic {
                amplitude,
                omega,
                phase,
            },
        };
        function.validate()?;
        Ok(function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_table_interpolation() {
        let f = LoadFunction::table(vec![(0.0, 0.0), (1.0, 10.0), (2.0, 0.0)]).unwrap();
        assert_relative_eq!(f.value_at(0.0).unwrap(), 0.0);
        assert_relative_eq!(f.value_at(0.5).unwrap(), 5.0);
        assert_relative_eq!(f.value_at(1.0).unwrap(), 10.0);
        assert_relative_eq!(f.value_at(1.5).unwrap(), 5.0);
        assert_relative_eq!(f.value_at(2.0).unwrap(), 0.0);
        assert!(f.value_at(2.5).is_none());
    }

    #[test]
    fn test_table_validation() {
        assert!(LoadFunction::table(vec![(0.0, 1.0)]).is_err());
        assert!(LoadFunction::table(vec![(0.0, 1.0), (0.0, 2.0)]).is_err());
        assert!(LoadFunction::table(vec![(0.0, 1.0), (1.0, f64::NAN)]).is_err());
        assert!(serde_json::from_str::<LoadFunction>(r#"{"Table":[[1.0,0.0],[0.5,1.0]]}"#).is_err());
    }

    #[test]
    fn test_grid_coverage() {
        let f = LoadFunction::table(vec![(0.0, 0.0), (1.0, 1.0)]).unwrap();
        assert!(f.check_grid(10, 0.1).is_ok());
        assert!(f.check_grid(20, 0.1).is_err());

        let late = LoadFunction::table(vec![(0.5, 0.0), (2.0, 1.0)]).unwrap();
        assert!(late.check_grid(10, 0.1).is_err());

        assert!(LoadFunction::default().check_grid(1000, 0.5).is_ok());
    }

    #[test]
    fn test_unchecked_tables_do_not_panic() {
        let empty = LoadFunction::Table(vec![]);
        assert!(empty.validate().is_err());
        assert!(empty.value_at(0.0).is_none());
        assert!(empty.derivative_at(0.0).is_none());
        assert!(empty.check_grid(10, 0.1).is_err());
        assert_eq!(empty.sample(0.0), 0.0);

        let single = LoadFunction::Table(vec![(0.0, 1.0)]);
        assert!(single.validate().is_err());
        assert_eq!(single.value_at(0.0), Some(1.0));
        assert_eq!(single.derivative_at(0.0), Some(0.0));
        assert!(single.value_at(0.5).is_none());

        assert!(LoadFunction::Constant(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_derivatives() {
        let f = LoadFunction::table(vec![(0.0, 0.0), (1.0, 10.0), (3.0, 0.0)]).unwrap();
        assert_relative_eq!(f.derivative_at(0.5).unwrap(), 10.0);
        // a knot takes the slope of the segment that starts there
        assert_relative_eq!(f.derivative_at(1.0).unwrap(), -5.0);
        assert_relative_eq!(f.derivative_at(3.0).unwrap(), -5.0);
        assert_relative_eq!(f.second_derivative_at(2.0).unwrap(), 0.0);
        assert!(f.derivative_at(3.5).is_none());

        let h = LoadFunction::harmonic(2.0, 3.0, 0.0).unwrap();
        let (value, rate, accel) = h.sample_motion(0.0);
        assert_relative_eq!(value, 0.0);
        assert_relative_eq!(rate, 6.0);
        assert_relative_eq!(accel, 0.0);
        assert_relative_eq!(h.second_derivative_at(0.5).unwrap(), -18.0 * 1.5f64.sin());
    }

    #[test]
    fn test_harmonic() {
        let f = LoadFunction::harmonic(2.0, std::f64::consts::PI, 0.0).unwrap();
        assert_relative_eq!(f.value_at(0.5).unwrap(), 2.0, max_relative = 1e-12);
    }
}
