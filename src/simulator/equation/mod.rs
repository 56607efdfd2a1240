pub mod analytical;
pub mod ode;
pub use analytical::*;
pub use ode::*;

use crate::{data::Trace, simulator::Predictions, LumpfitError};

/// Trait for model equations that can be simulated.
///
/// This trait defines the interface for the different kinds of model equations
/// (ODE, analytical) so that calibration and analysis code can work with either.
pub trait Equation: 'static + Clone + Sync + Send {
    /// Get the number of state variables in the model.
    fn nstates(&self) -> usize;

    /// Get the number of output equations in the model.
    fn nouteqs(&self) -> usize;

    /// Number of parameters the model expects, if it declares one
    fn nparams(&self) -> Option<usize> {
        None
    }

    fn kind() -> EqnKind;

    /// Simulate the trace with the given parameters, always solving the model.
    ///
    /// # Parameters
    /// - `trace`: Observation times and inputs
    /// - `params`: The parameter values
    ///
    /// # Returns
    /// One prediction per observation in the trace
    fn simulate(&self, trace: &Trace, params: &[f64]) -> Result<Predictions, LumpfitError>;

    /// Generate predictions for a trace, optionally serving repeated requests from a cache.
    fn estimate_predictions(
        &self,
        trace: &Trace,
        params: &[f64],
        cache: bool,
    ) -> Result<Predictions, LumpfitError> {
        let _ = cache;
        self.simulate(trace, params)
    }

    /// Check a parameter vector against [Equation::nparams]
    fn check_params(&self, params: &[f64]) -> Result<(), LumpfitError> {
        match self.nparams() {
            Some(expected) if expected != params.len() => Err(LumpfitError::ParameterLength {
                expected,
                got: params.len(),
            }),
            _ => Ok(()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EqnKind {
    ODE,
    Analytical,
}

impl EqnKind {
    pub fn to_str(&self) -> &'static str {
        match self {
            Self::ODE => "EqnKind::ODE",
            Self::Analytical => "EqnKind::Analytical",
        }
    }
}

/// Check that no observation precedes the trace start
pub(crate) fn check_trace(trace: &Trace) -> Result<(), LumpfitError> {
    match trace.observations().first() {
        Some(first) if first.time() < trace.start() => Err(LumpfitError::ObservationBeforeStart {
            time: first.time(),
            start: trace.start(),
        }),
        _ => Ok(()),
    }
}
