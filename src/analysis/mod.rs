//! Physical characteristics of second-order systems.
//!
//! A mass-spring-damper `m x'' + c x' + k x = F` and a series RLC circuit
//! `L q'' + R q' + q / C = V` share the normalised form
//! `x'' + 2 ζ ωn x' + ωn² x = u`. The pair `(ωn, ζ)` is what a free response
//! actually determines, which is why `(m, c, k)` cannot be recovered from it.

pub mod identifiability;

use serde::{Deserialize, Serialize};

use crate::optimize::parameters::ParameterError;

/// Damping ratios closer than this to 1 are treated as critically damped
const CRITICAL_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DampingRegime {
    Undamped,
    Underdamped,
    CriticallyDamped,
    Overdamped,
}

/// Normalised second-order dynamics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SecondOrder {
    natural_frequency: f64,
    damping_ratio: f64,
}

impl SecondOrder {
    pub fn new(natural_frequency: f64, damping_ratio: f64) -> Result<Self, ParameterError> {
        if !(natural_frequency.is_finite() && natural_frequency > 0.0) {
            return Err(ParameterError::NonPositive {
                name: "natural_frequency".to_string(),
                value: natural_frequency,
            });
        }
        if !(damping_ratio.is_finite() && damping_ratio >= 0.0) {
            return Err(ParameterError::Negative {
                name: "damping_ratio".to_string(),
                value: damping_ratio,
            });
        }
        Ok(Self {
            natural_frequency,
            damping_ratio,
        })
    }

    /// ωn = √(k/m), ζ = c / (2√(km))
    pub fn from_mass_spring_damper(m: f64, c: f64, k: f64) -> Result<Self, ParameterError> {
        positive("m", m)?;
        positive("k", k)?;
        Self::new((k / m).sqrt(), c / (2.0 * (k * m).sqrt()))
    }

    /// ωn = 1/√(LC), ζ = (R/2)·√(C/L)
    pub fn from_series_rlc(r: f64, l: f64, c: f64) -> Result<Self, ParameterError> {
        positive("l", l)?;
        positive("c", c)?;
        Self::new(1.0 / (l * c).sqrt(), 0.5 * r * (c / l).sqrt())
    }

    /// Natural frequency in rad/s
    pub fn natural_frequency(&self) -> f64 {
        self.natural_frequency
    }

    pub fn damping_ratio(&self) -> f64 {
        self.damping_ratio
    }

    pub fn regime(&self) -> DampingRegime {
        let zeta = self.damping_ratio;
        if zeta == 0.0 {
            DampingRegime::Undamped
        } else if (zeta - 1.0).abs() <= CRITICAL_TOLERANCE {
            DampingRegime::CriticallyDamped
        } else if zeta < 1.0 {
            DampingRegime::Underdamped
        } else {
            DampingRegime::Overdamped
        }
    }

    /// Damped frequency ωd = ωn √(1 − ζ²) in rad/s, `None` unless oscillatory
    pub fn damped_frequency(&self) -> Option<f64> {
        match self.regime() {
            DampingRegime::Undamped | DampingRegime::Underdamped => {
                Some(self.natural_frequency * (1.0 - self.damping_ratio.powi(2)).sqrt())
            }
            _ => None,
        }
    }

    /// Q = 1 / (2ζ), infinite for an undamped system
    pub fn quality_factor(&self) -> f64 {
        1.0 / (2.0 * self.damping_ratio)
    }

    /// Exponential decay rate ζ ωn of the envelope
    pub fn decay_rate(&self) -> f64 {
        self.damping_ratio * self.natural_frequency
    }

    /// Percent overshoot of the unit step response, zero when not oscillatory
    pub fn overshoot(&self) -> f64 {
        let zeta = self.damping_ratio;
        match self.regime() {
            DampingRegime::Undamped => 100.0,
            DampingRegime::Underdamped => {
                100.0 * (-std::f64::consts::PI * zeta / (1.0 - zeta * zeta).sqrt()).exp()
            }
            _ => 0.0,
        }
    }

    /// Approximate time for the envelope to fall within `band` (e.g. 0.02) of its final value.
    ///
    /// Uses the slowest pole, `None` for an undamped system.
    pub fn settling_time(&self, band: f64) -> Option<f64> {
        let zeta = self.damping_ratio;
        let wn = self.natural_frequency;
        let rate = match self.regime() {
            DampingRegime::Undamped => return None,
            DampingRegime::Underdamped | DampingRegime::CriticallyDamped => zeta * wn,
            DampingRegime::Overdamped => wn * (zeta - (zeta * zeta - 1.0).sqrt()),
        };
        Some(-band.ln() / rate)
    }

    /// Exact free response `(x, v)` at time `t` from initial displacement `x0` and velocity `v0`
    pub fn free_response(&self, x0: f64, v0: f64, t: f64) -> (f64, f64) {
        let wn = self.natural_frequency;
        let zeta = self.damping_ratio;
        match self.regime() {
            DampingRegime::Undamped | DampingRegime::Underdamped => {
                let a = -zeta * wn;
                let wd = wn * (1.0 - zeta * zeta).sqrt();
                let c1 = x0;
                let c2 = (v0 - a * x0) / wd;
                let (sin, cos) = (wd * t).sin_cos();
                let envelope = (a * t).exp();
                let x = envelope * (c1 * cos + c2 * sin);
                let v = envelope * ((a * c1 + wd * c2) * cos + (a * c2 - wd * c1) * sin);
                (x, v)
            }
            DampingRegime::CriticallyDamped => {
                let c1 = x0;
                let c2 = v0 + wn * x0;
                let envelope = (-wn * t).exp();
                let x = envelope * (c1 + c2 * t);
                let v = envelope * (c2 - wn * (c1 + c2 * t));
                (x, v)
            }
            DampingRegime::Overdamped => {
                let root = (zeta * zeta - 1.0).sqrt();
                let r1 = -wn * (zeta - root);
                let r2 = -wn * (zeta + root);
                let a = (v0 - r2 * x0) / (r1 - r2);
                let b = x0 - a;
                let (e1, e2) = ((r1 * t).exp(), (r2 * t).exp());
                (a * e1 + b * e2, a * r1 * e1 + b * r2 * e2)
            }
        }
    }

    /// Response to a constant input whose static solution is `x_static`
    pub fn step_response(&self, x_static: f64, x0: f64, v0: f64, t: f64) -> (f64, f64) {
        let (x, v) = self.free_response(x0 - x_static, v0, t);
        (x + x_static, v)
    }
}

fn positive(name: &str, value: f64) -> Result<(), ParameterError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ParameterError::NonPositive {
            name: name.to_string(),
            value,
        })
    }
}
