use serde::{Deserialize, Serialize};

use crate::LumpfitError;

/// Tolerances and limits for the ODE solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Relative tolerance
    pub rtol: f64,
    /// Absolute tolerance, applied to every state
    pub atol: f64,
    /// Initial step size
    pub h0: f64,
    /// Maximum number of internal steps per simulation
    pub max_steps: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-8,
            h0: 1e-4,
            max_steps: 100_000,
        }
    }
}

impl SolverSettings {
    pub fn from_json_str(json: &str) -> Result<Self, LumpfitError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_tolerances(mut self, rtol: f64, atol: f64) -> Self {
        self.rtol = rtol;
        self.atol = atol;
        self
    }

    /// Bit pattern used to tell apart cached simulations with different settings
    pub(crate) fn fingerprint(&self) -> [u64; 4] {
        [
            self.rtol.to_bits(),
            self.atol.to_bits(),
            self.h0.to_bits(),
            self.max_steps as u64,
        ]
    }
}
