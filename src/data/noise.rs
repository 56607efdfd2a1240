use std::collections::BTreeMap;

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::trace::Trace;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NoiseError {
    #[error("A noise model for output equation {0} is already registered")]
    DuplicateOuteq(usize),
    #[error("No noise model registered for output equation {0}")]
    MissingOuteq(usize),
    #[error("Noise coefficients must be finite and non-negative, got {0}")]
    InvalidCoefficient(f64),
    #[error("The computed standard deviation is invalid (SD = {0})")]
    InvalidSigma(f64),
}

/// Measurement noise on a single output.
///
/// The standard deviation at a true value `y` is `sqrt(sigma^2 + (fraction * y)^2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NoiseModel {
    /// Constant standard deviation, independent of the signal level
    Additive { sigma: f64 },
    /// Standard deviation proportional to the signal level
    Proportional { fraction: f64 },
    /// Both terms combined in quadrature
    Combined { sigma: f64, fraction: f64 },
}

impl NoiseModel {
    pub fn additive(sigma: f64) -> Self {
        NoiseModel::Additive { sigma }
    }

    pub fn proportional(fraction: f64) -> Self {
        NoiseModel::Proportional { fraction }
    }

    pub fn combined(sigma: f64, fraction: f64) -> Self {
        NoiseModel::Combined { sigma, fraction }
    }

    fn coefficients(&self) -> (f64, f64) {
        match *self {
            NoiseModel::Additive { sigma } => (sigma, 0.0),
            NoiseModel::Proportional { fraction } => (0.0, fraction),
            NoiseModel::Combined { sigma, fraction } => (sigma, fraction),
        }
    }

    fn validate(&self) -> Result<(), NoiseError> {
        let (sigma, fraction) = self.coefficients();
        for coefficient in [sigma, fraction] {
            if !coefficient.is_finite() || coefficient < 0.0 {
                return Err(NoiseError::InvalidCoefficient(coefficient));
            }
        }
        Ok(())
    }

    /// Standard deviation of the noise at true value `y`
    pub fn sigma(&self, y: f64) -> f64 {
        let (sigma, fraction) = self.coefficients();
        (sigma.powi(2) + (fraction * y).powi(2)).sqrt()
    }
}

/// Noise models keyed by output equation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoiseModels {
    models: BTreeMap<usize, NoiseModel>,
}

impl NoiseModels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `model` for `outeq`
    pub fn add(mut self, outeq: usize, model: NoiseModel) -> Result<Self, NoiseError> {
        model.validate()?;
        if self.models.contains_key(&outeq) {
            return Err(NoiseError::DuplicateOuteq(outeq));
        }
        self.models.insert(outeq, model);
        Ok(self)
    }

    pub fn get(&self, outeq: usize) -> Option<&NoiseModel> {
        self.models.get(&outeq)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Standard deviation for output `outeq` at true value `y`
    pub fn sigma(&self, outeq: usize, y: f64) -> Result<f64, NoiseError> {
        let model = self
            .models
            .get(&outeq)
            .ok_or(NoiseError::MissingOuteq(outeq))?;
        let sigma = model.sigma(y);
        if sigma.is_nan() || sigma < 0.0 {
            return Err(NoiseError::InvalidSigma(sigma));
        }
        Ok(sigma)
    }

    /// Return a copy of `trace` with every observed value perturbed by Gaussian noise.
    ///
    /// Missing observations stay missing. Use a seeded generator such as
    /// `StdRng::seed_from_u64` for reproducible results.
    pub fn perturb<R: Rng + ?Sized>(&self, trace: &Trace, rng: &mut R) -> Result<Trace, NoiseError> {
        let mut noisy = trace.clone();
        for obs in noisy.observations_mut() {
            let Some(value) = obs.value() else {
                continue;
            };
            let sigma = self.sigma(obs.outeq(), value)?;
            if sigma == 0.0 {
                continue;
            }
            let normal = Normal::new(0.0, sigma).map_err(|_| NoiseError::InvalidSigma(sigma))?;
            obs.set_value(Some(value + normal.sample(rng)));
        }
        tracing::debug!(
            "Perturbed {} observations of trace {}",
            noisy.n_observed(),
            noisy.id()
        );
        Ok(noisy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn flat_trace(n: usize, value: f64) -> Trace {
        Trace::builder("flat")
            .observation(0.0, value, 0)
            .repeat(n - 1, 0.1)
            .missing_observation(0.05, 0)
            .build()
    }

    #[test]
    fn test_sigma_combines_in_quadrature() {
        let model = NoiseModel::combined(3.0, 0.5);
        assert_relative_eq!(model.sigma(8.0), 5.0);
        assert_relative_eq!(NoiseModel::additive(0.2).sigma(100.0), 0.2);
        assert_relative_eq!(NoiseModel::proportional(0.1).sigma(-20.0), 2.0);
    }

    #[test]
    fn test_duplicate_and_invalid_models() {
        let models = NoiseModels::new()
            .add(0, NoiseModel::additive(0.1))
            .unwrap();
        assert_eq!(
            models.clone().add(0, NoiseModel::additive(0.2)),
            Err(NoiseError::DuplicateOuteq(0))
        );
        assert_eq!(
            NoiseModels::new().add(1, NoiseModel::additive(-1.0)),
            Err(NoiseError::InvalidCoefficient(-1.0))
        );
        assert_eq!(models.sigma(3, 1.0), Err(NoiseError::MissingOuteq(3)));
    }

    #[test]
    fn test_perturb_is_reproducible_and_unbiased() {
        let trace = flat_trace(2000, 1.0);
        let models = NoiseModels::new()
            .add(0, NoiseModel::additive(0.1))
            .unwrap();

        let a = models
            .perturb(&trace, &mut StdRng::seed_from_u64(42))
            .unwrap();
        let b = models
            .perturb(&trace, &mut StdRng::seed_from_u64(42))
            .unwrap();
        assert_eq!(a, b);

        let values: Vec<f64> = a.observed().filter_map(|o| o.value()).collect();
        assert_eq!(values.len(), 2000);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        assert!((mean - 1.0).abs() < 0.02, "mean was {}", mean);
        assert!((var.sqrt() - 0.1).abs() < 0.01, "sd was {}", var.sqrt());

        // The missing sample is left untouched
        assert_eq!(a.observations().iter().filter(|o| o.value().is_none()).count(), 1);
    }

    #[test]
    fn test_zero_noise_returns_identical_trace() {
        let trace = flat_trace(10, 2.0);
        let models = NoiseModels::new()
            .add(0, NoiseModel::proportional(0.0))
            .unwrap();
        let noisy = models
            .perturb(&trace, &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(noisy, trace);
    }
}
