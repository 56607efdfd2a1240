//! Named model parameters with bounds and the free-space mapping used by the optimizer.
//!
//! The optimizer works on an unconstrained vector that holds only the free
//! parameters. Each free parameter is mapped through a [Transform] chosen from
//! its bounds, so every point the simplex visits maps back inside the bounds.

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Parameter {name} must be positive, got {value}")]
    NonPositive { name: String, value: f64 },
    #[error("Parameter {name} must be non-negative, got {value}")]
    Negative { name: String, value: f64 },
    #[error("Parameter {name} has invalid bounds [{lower}, {upper}]")]
    InvalidBounds { name: String, lower: f64, upper: f64 },
    #[error("Parameter {name} = {value} lies outside [{lower}, {upper}]")]
    OutOfBounds {
        name: String,
        value: f64,
        lower: f64,
        upper: f64,
    },
    #[error("Unknown parameter {0}")]
    Unknown(String),
    #[error("Parameter {0} is defined twice")]
    Duplicate(String),
    #[error("Expected {expected} values, got {got}")]
    Length { expected: usize, got: usize },
    #[error("Every parameter is fixed, there is nothing to calibrate")]
    NoFreeParameters,
}

/// Map between a bounded parameter and an unbounded optimizer coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    Identity,
    /// `p = lower + exp(z)`
    Log { lower: f64 },
    /// `p = upper - exp(z)`
    LogUpper { upper: f64 },
    /// `p = lower + (upper - lower) / (1 + exp(-z))`
    Logit { lower: f64, upper: f64 },
}

impl Transform {
    pub fn from_bounds(lower: f64, upper: f64) -> Self {
        match (lower.is_finite(), upper.is_finite()) {
            (true, true) => Transform::Logit { lower, upper },
            (true, false) => Transform::Log { lower },
            (false, true) => Transform::LogUpper { upper },
            (false, false) => Transform::Identity,
        }
    }

    /// Natural value to optimizer coordinate.
    ///
    /// Values sitting on a bound are nudged inside so the coordinate stays finite.
    pub fn to_free(&self, value: f64) -> f64 {
        match *self {
            Transform::Identity => value,
            Transform::Log { lower } => {
                let offset = (value - lower).max(f64::MIN_POSITIVE.sqrt());
                offset.ln()
            }
            Transform::LogUpper { upper } => {
                let offset = (upper - value).max(f64::MIN_POSITIVE.sqrt());
                offset.ln()
            }
            Transform::Logit { lower, upper } => {
                let margin = (upper - lower) * 1e-12;
                let value = value.clamp(lower + margin, upper - margin);
                ((value - lower) / (upper - value)).ln()
            }
        }
    }

    /// Optimizer coordinate to natural value
    pub fn from_free(&self, z: f64) -> f64 {
        match *self {
            Transform::Identity => z,
            Transform::Log { lower } => lower + z.exp(),
            Transform::LogUpper { upper } => upper - z.exp(),
            Transform::Logit { lower, upper } => lower + (upper - lower) / (1.0 + (-z).exp()),
        }
    }
}

/// A named model parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    name: String,
    value: f64,
    lower: f64,
    upper: f64,
    fixed: bool,
}

impl Parameter {
    /// An unbounded free parameter
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
            fixed: false,
        }
    }

    /// A free parameter constrained to be positive
    pub fn positive(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, value).bounds(0.0, f64::INFINITY)
    }

    pub fn bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lower = lower;
        self.upper = upper;
        self
    }

    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn transform(&self) -> Transform {
        Transform::from_bounds(self.lower, self.upper)
    }

    fn validate(&self) -> Result<(), ParameterError> {
        if self.lower.is_nan() || self.upper.is_nan() || self.lower >= self.upper {
            return Err(ParameterError::InvalidBounds {
                name: self.name.clone(),
                lower: self.lower,
                upper: self.upper,
            });
        }
        self.check_value(self.value)
    }

    fn check_value(&self, value: f64) -> Result<(), ParameterError> {
        if !value.is_finite() || value < self.lower || value > self.upper {
            return Err(ParameterError::OutOfBounds {
                name: self.name.clone(),
                value,
                lower: self.lower,
                upper: self.upper,
            });
        }
        Ok(())
    }
}

/// An ordered set of parameters, in the order the model expects them.
///
/// # Examples
///
/// ```
/// use lumpfit::prelude::*;
///
/// let params = ParameterSet::new()
///     .add(Parameter::positive("m", 1.0)).unwrap()
///     .add(Parameter::positive("c", 0.5)).unwrap()
///     .add(Parameter::positive("k", 20.0)).unwrap()
///     .fix("m").unwrap();
/// assert_eq!(params.free_names(), vec!["c", "k"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterSet {
    parameters: Vec<Parameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, parameter: Parameter) -> Result<Self, ParameterError> {
        parameter.validate()?;
        if self.parameters.iter().any(|p| p.name == parameter.name) {
            return Err(ParameterError::Duplicate(parameter.name));
        }
        self.parameters.push(parameter);
        Ok(self)
    }

    /// Positive, free parameters with the given names and starting values
    pub fn positive(names: &[&str], values: &[f64]) -> Result<Self, ParameterError> {
        if names.len() != values.len() {
            return Err(ParameterError::Length {
                expected: names.len(),
                got: values.len(),
            });
        }
        names
            .iter()
            .zip(values)
            .try_fold(Self::new(), |set, (name, &value)| {
                set.add(Parameter::positive(*name, value))
            })
    }

    fn position(&self, name: &str) -> Result<usize, ParameterError> {
        self.parameters
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| ParameterError::Unknown(name.to_string()))
    }

    /// Hold a parameter at its current value during calibration
    pub fn fix(mut self, name: &str) -> Result<Self, ParameterError> {
        let idx = self.position(name)?;
        self.parameters[idx].fixed = true;
        Ok(self)
    }

    /// Release a fixed parameter
    pub fn free(mut self, name: &str) -> Result<Self, ParameterError> {
        let idx = self.position(name)?;
        self.parameters[idx].fixed = false;
        Ok(self)
    }

    pub fn set_value(&mut self, name: &str, value: f64) -> Result<(), ParameterError> {
        let idx = self.position(name)?;
        self.parameters[idx].check_value(value)?;
        self.parameters[idx].value = value;
        Ok(())
    }

    /// Replace every value at once, in model order
    pub fn with_values(mut self, values: &[f64]) -> Result<Self, ParameterError> {
        if values.len() != self.parameters.len() {
            return Err(ParameterError::Length {
                expected: self.parameters.len(),
                got: values.len(),
            });
        }
        for (parameter, &value) in self.parameters.iter_mut().zip(values) {
            parameter.check_value(value)?;
            parameter.value = value;
        }
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value)
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.parameters.iter().map(|p| p.value).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn free_names(&self) -> Vec<&str> {
        self.free_parameters().map(|p| p.name.as_str()).collect()
    }

    pub fn n_free(&self) -> usize {
        self.free_parameters().count()
    }

    fn free_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| !p.fixed)
    }

    /// Optimizer coordinates of the free parameters at their current values
    pub fn to_free(&self) -> Vec<f64> {
        self.free_parameters()
            .map(|p| p.transform().to_free(p.value))
            .collect()
    }

    /// Full natural-space parameter vector for optimizer coordinates `z`.
    ///
    /// Fixed parameters keep their current value.
    pub fn from_free(&self, z: &[f64]) -> Result<Vec<f64>, ParameterError> {
        if z.len() != self.n_free() {
            return Err(ParameterError::Length {
                expected: self.n_free(),
                got: z.len(),
            });
        }
        let mut free = z.iter();
        Ok(self
            .parameters
            .iter()
            .map(|p| {
                if p.fixed {
                    return p.value;
                }
                match free.next() {
                    Some(&z) => p.transform().from_free(z),
                    None => p.value,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transform_choice() {
        assert_eq!(
            Transform::from_bounds(f64::NEG_INFINITY, f64::INFINITY),
            Transform::Identity
        );
        assert_eq!(
            Transform::from_bounds(0.0, f64::INFINITY),
            Transform::Log { lower: 0.0 }
        );
        assert_eq!(
            Transform::from_bounds(f64::NEG_INFINITY, 1.0),
            Transform::LogUpper { upper: 1.0 }
        );
        assert_eq!(
            Transform::from_bounds(1.0, 2.0),
            Transform::Logit {
                lower: 1.0,
                upper: 2.0
            }
        );
    }

    #[test]
    fn test_transforms_invert() {
        for transform in [
            Transform::Identity,
            Transform::Log { lower: -1.0 },
            Transform::LogUpper { upper: 4.0 },
            Transform::Logit {
                lower: 0.5,
                upper: 4.0,
            },
        ] {
            for value in [0.6, 1.0, 3.5] {
                assert_relative_eq!(
                    transform.from_free(transform.to_free(value)),
                    value,
                    max_relative = 1e-12
                );
            }
        }
    }

    #[test]
    fn test_from_free_stays_within_bounds() {
        let set = ParameterSet::new()
            .add(Parameter::new("a", 0.5).bounds(0.0, 1.0))
            .unwrap()
            .add(Parameter::positive("b", 2.0))
            .unwrap()
            .add(Parameter::new("c", 0.5).bounds(f64::NEG_INFINITY, 1.0))
            .unwrap();
        for z in [-1e3, -10.0, 0.0, 5.0, 10.0, 700.0] {
            let values = set.from_free(&[z, z, z]).unwrap();
            assert!((0.0..=1.0).contains(&values[0]));
            assert!(values[1] >= 0.0);
            assert!(values[2] <= 1.0, "c = {}", values[2]);
        }
    }

    #[test]
    fn test_fixed_parameters_are_skipped() {
        let set = ParameterSet::positive(&["m", "c", "k"], &[1.0, 0.5, 20.0])
            .unwrap()
            .fix("m")
            .unwrap();
        assert_eq!(set.n_free(), 2);
        assert_eq!(set.free_names(), vec!["c", "k"]);

        let z = set.to_free();
        assert_relative_eq!(z[0], 0.5f64.ln());
        assert_relative_eq!(z[1], 20.0f64.ln());

        let values = set.from_free(&[0.0, 1.0f64.ln()]).unwrap();
        assert_relative_eq!(values[0], 1.0);
        assert_relative_eq!(values[1], 1.0);
        assert_relative_eq!(values[2], 1.0, max_relative = 1e-12);

        assert!(matches!(
            set.from_free(&[0.0]),
            Err(ParameterError::Length {
                expected: 2,
                got: 1
            })
        ));
    }

    #[test]
    fn test_invalid_definitions() {
        assert!(matches!(
            ParameterSet::new().add(Parameter::positive("m", -1.0)),
            Err(ParameterError::OutOfBounds { .. })
        ));
        assert!(matches!(
            ParameterSet::new().add(Parameter::new("m", 1.0).bounds(2.0, 1.0)),
            Err(ParameterError::InvalidBounds { .. })
        ));
        assert!(matches!(
            ParameterSet::positive(&["m", "m"], &[1.0, 1.0]),
            Err(ParameterError::Duplicate(_))
        ));
        assert!(matches!(
            ParameterSet::new().fix("nope"),
            Err(ParameterError::Unknown(_))
        ));
    }

    #[test]
    fn test_set_value_checks_bounds() {
        let mut set = ParameterSet::positive(&["k"], &[1.0]).unwrap();
        set.set_value("k", 3.0).unwrap();
        assert_eq!(set.get("k"), Some(3.0));
        assert!(set.set_value("k", -3.0).is_err());
        assert_eq!(set.get("k"), Some(3.0));
    }
}
