//! Least-squares calibration of model parameters.
//!
//! Parameters are optimised in an unconstrained space derived from their bounds
//! (see [parameters::Transform]) with argmin's Nelder-Mead simplex.

pub mod calibration;
pub mod cost;
pub mod observer;
pub mod parameters;

pub use calibration::{Calibration, CalibrationResult, CalibrationSettings};
pub use cost::LeastSquares;
pub use observer::LossHistory;
pub use parameters::{Parameter, ParameterError, ParameterSet, Transform};
