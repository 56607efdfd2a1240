use thiserror::Error;

use crate::data::noise::NoiseError;
use crate::optimize::parameters::ParameterError;

#[derive(Error, Debug)]
pub enum LumpfitError {
    #[error("ODE solver error: {0}")]
    Solver(String),
    #[error("Expected {expected} parameters, got {got}")]
    ParameterLength { expected: usize, got: usize },
    #[error("Input channel {channel} does not exist for a model with {nstates} states")]
    InputChannel { channel: usize, nstates: usize },
    #[error("Table signal on input channel {channel} is invalid: {reason}")]
    InvalidTable { channel: usize, reason: &'static str },
    #[error("Output equation {outeq} does not exist for a model with {nouteqs} outputs")]
    OutputEquation { outeq: usize, nouteqs: usize },
    #[error("Observation at time {time} lies before the trace start time {start}")]
    ObservationBeforeStart { time: f64, start: f64 },
    #[error("The integrator exceeded {limit} steps before reaching time {time}")]
    StepLimit { limit: usize, time: f64 },
    #[error("The trace does not contain any observed values")]
    NoObservations,
    #[error("Error in the noise model: {0}")]
    Noise(#[from] NoiseError),
    #[error("Error in the parameter set: {0}")]
    Parameter(#[from] ParameterError),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("Optimizer error: {0}")]
    Optimizer(String),
}

impl From<diffsol::error::DiffsolError> for LumpfitError {
    fn from(err: diffsol::error::DiffsolError) -> Self {
        LumpfitError::Solver(err.to_string())
    }
}
