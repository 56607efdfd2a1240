//! Model predictions paired with the observations they were made for.

use std::io::Write;

use serde::Serialize;

use crate::data::{NoiseModels, Observation, Trace};
use crate::LumpfitError;

/// Prediction holds an observation and its prediction at a single time point.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub(crate) time: f64,
    pub(crate) outeq: usize,
    pub(crate) observation: Option<f64>,
    pub(crate) prediction: f64,
    pub(crate) state: Vec<f64>,
}

impl Prediction {
    pub(crate) fn new(observation: &Observation, prediction: f64, state: Vec<f64>) -> Self {
        Self {
            time: observation.time(),
            outeq: observation.outeq(),
            observation: observation.value(),
            prediction,
            state,
        }
    }

    /// Get the time point of this prediction.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Get the output equation index.
    pub fn outeq(&self) -> usize {
        self.outeq
    }

    /// Get the observed value.
    pub fn observation(&self) -> Option<f64> {
        self.observation
    }

    /// Get the predicted value.
    pub fn prediction(&self) -> f64 {
        self.prediction
    }

    /// Get the state vector at this prediction point (empty for analytical models)
    pub fn state(&self) -> &[f64] {
        &self.state
    }

    /// Calculate the raw prediction error (prediction - observation).
    pub fn prediction_error(&self) -> Option<f64> {
        self.observation.map(|obs| self.prediction - obs)
    }

    /// Calculate the squared error (prediction - observation)².
    pub fn squared_error(&self) -> Option<f64> {
        self.prediction_error().map(|e| e * e)
    }
}

impl std::fmt::Display for Prediction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let obs_str = match self.observation {
            Some(obs) => format!("{:.6}", obs),
            None => "NA".to_string(),
        };
        write!(
            f,
            "Time: {:.4}\tObs: {}\tPred: {:.6}\tOuteq: {}",
            self.time, obs_str, self.prediction, self.outeq
        )
    }
}

#[derive(Serialize)]
struct PredictionRow {
    time: f64,
    outeq: usize,
    observation: Option<f64>,
    prediction: f64,
}

/// All predictions for one trace, in observation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predictions {
    predictions: Vec<Prediction>,
}

impl Predictions {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            predictions: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn add_prediction(&mut self, prediction: Prediction) {
        self.predictions.push(prediction);
    }

    pub fn predictions(&self) -> &[Prediction] {
        &self.predictions
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    pub fn flat_times(&self) -> Vec<f64> {
        self.predictions.iter().map(|p| p.time).collect()
    }

    pub fn flat_predictions(&self) -> Vec<f64> {
        self.predictions.iter().map(|p| p.prediction).collect()
    }

    pub fn flat_observations(&self) -> Vec<Option<f64>> {
        self.predictions.iter().map(|p| p.observation).collect()
    }

    /// Predictions of a single output equation
    pub fn outeq(&self, outeq: usize) -> Vec<&Prediction> {
        self.predictions
            .iter()
            .filter(|p| p.outeq == outeq)
            .collect()
    }

    /// Prediction minus observation for every observed point
    pub fn residuals(&self) -> Vec<f64> {
        self.predictions
            .iter()
            .filter_map(|p| p.prediction_error())
            .collect()
    }

    /// Sum of squared residuals over observed points
    pub fn sum_of_squares(&self) -> f64 {
        self.predictions
            .iter()
            .filter_map(|p| p.squared_error())
            .sum()
    }

    /// Root mean squared residual, `None` if nothing was observed
    pub fn rmse(&self) -> Option<f64> {
        let n = self
            .predictions
            .iter()
            .filter(|p| p.observation.is_some())
            .count();
        if n == 0 {
            return None;
        }
        Some((self.sum_of_squares() / n as f64).sqrt())
    }

    /// Sum of squared residuals, each scaled by the noise variance at the prediction
    pub fn weighted_sum_of_squares(&self, noise: &NoiseModels) -> Result<f64, LumpfitError> {
        let mut sum = 0.0;
        for p in &self.predictions {
            let Some(err) = p.prediction_error() else {
                continue;
            };
            let sigma = noise.sigma(p.outeq, p.prediction)?;
            if sigma == 0.0 {
                return Err(crate::data::NoiseError::InvalidSigma(sigma).into());
            }
            sum += (err / sigma).powi(2);
        }
        Ok(sum)
    }

    /// Build a noiseless trace whose observations are these predictions.
    ///
    /// The id, start time and excitation are taken from `template`.
    pub fn to_trace(&self, template: &Trace) -> Trace {
        let observations = self
            .predictions
            .iter()
            .map(|p| Observation::new(p.time, Some(p.prediction), p.outeq))
            .collect();
        Trace::new(
            template.id(),
            template.start(),
            observations,
            template.excitation().clone(),
        )
    }

    /// Write predictions as CSV with columns `time,outeq,observation,prediction`
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), LumpfitError> {
        let mut writer = csv::Writer::from_writer(writer);
        for p in &self.predictions {
            writer.serialize(PredictionRow {
                time: p.time,
                outeq: p.outeq,
                observation: p.observation,
                prediction: p.prediction,
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Display for Predictions {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for p in &self.predictions {
            writeln!(f, "{}", p)?;
        }
        Ok(())
    }
}
